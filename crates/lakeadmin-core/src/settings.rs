//! Connection settings and desired state, loaded from TOML plus environment.

use std::collections::HashSet;
use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::client::DEFAULT_PAGE_SIZE;
use crate::error::{ProvisionError, ProvisionResult};
use crate::group::GroupSpec;
use crate::job::JobSpec;
use crate::volume::{VolumeSpec, VolumeType};

/// Prefix for environment overrides, e.g. `LAKEADMIN__WORKSPACE__TOKEN`.
pub const ENV_PREFIX: &str = "LAKEADMIN";

const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub workspace: WorkspaceSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub paging: PagingSettings,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkspaceSettings {
    /// Workspace URL, e.g. `https://dbc-1234.cloud.databricks.com`.
    #[serde(default)]
    pub host: String,
    /// Personal access token sent as a bearer credential.
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingSettings {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for PagingSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Where to read settings from and which values to force.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// TOML file; must exist when given.
    pub path: Option<PathBuf>,
    pub host: Option<String>,
    pub token: Option<String>,
    pub log_level: Option<String>,
}

impl Settings {
    /// Layers the TOML file, `LAKEADMIN__*` environment variables and the
    /// explicit overrides (highest precedence), then validates the result.
    pub fn load(options: &LoadOptions) -> ProvisionResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = &options.path {
            builder = builder.add_source(File::from(path.clone()).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__"),
        );
        builder = builder
            .set_override_option("workspace.host", options.host.clone())
            .and_then(|b| b.set_override_option("workspace.token", options.token.clone()))
            .and_then(|b| b.set_override_option("logging.level", options.log_level.clone()))
            .map_err(|e| ProvisionError::InvalidConfig(format!("config override error: {e}")))?;

        let cfg = builder
            .build()
            .map_err(|e| ProvisionError::InvalidConfig(format!("config build error: {e}")))?;
        let settings: Settings = cfg.try_deserialize().map_err(|e| {
            ProvisionError::InvalidConfig(format!("config deserialize error: {e}"))
        })?;
        settings.validate().map_err(ProvisionError::InvalidConfig)?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.workspace.host.trim().is_empty() {
            return Err("workspace.host must be set".into());
        }
        let url = url::Url::parse(&self.workspace.host)
            .map_err(|e| format!("workspace.host is not a valid URL: {e}"))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err("workspace.host must be an http(s) URL".into());
        }
        if self.workspace.token.trim().is_empty() {
            return Err("workspace.token must be set".into());
        }
        if self.paging.page_size == 0 || self.paging.page_size > MAX_PAGE_SIZE {
            return Err(format!("paging.page_size must be between 1 and {MAX_PAGE_SIZE}"));
        }

        let mut seen = HashSet::new();
        for group in &self.groups {
            if group.name.trim().is_empty() {
                return Err("groups: name must not be empty".into());
            }
            if !seen.insert(group.name.as_str()) {
                return Err(format!("groups: '{}' is declared twice", group.name));
            }
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if job.name.trim().is_empty() || job.notebook_path.trim().is_empty() {
                return Err("jobs: name and notebook_path must not be empty".into());
            }
            let key = crate::reconcile::Reconcilable::natural_key(job);
            if !seen.insert(key.clone()) {
                return Err(format!("jobs: '{key}' is declared twice"));
            }
        }

        let mut seen = HashSet::new();
        for volume in &self.volumes {
            if volume.catalog_name.trim().is_empty()
                || volume.schema_name.trim().is_empty()
                || volume.name.trim().is_empty()
            {
                return Err("volumes: catalog_name, schema_name and name must not be empty".into());
            }
            let full_name = volume.full_name();
            match (volume.volume_type, &volume.storage_location) {
                (VolumeType::External, None) => {
                    return Err(format!(
                        "volumes: '{full_name}' is EXTERNAL and needs a storage_location"
                    ));
                }
                (VolumeType::Managed, Some(_)) => {
                    return Err(format!(
                        "volumes: '{full_name}' is MANAGED and must not set storage_location"
                    ));
                }
                _ => {}
            }
            if !seen.insert(full_name.clone()) {
                return Err(format!("volumes: '{full_name}' is declared twice"));
            }
        }

        Ok(())
    }
}
