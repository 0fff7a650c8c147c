//! Notebook jobs: lookup by name or notebook path, create/update, job ACLs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::WorkspaceClient;
use crate::directory;
use crate::error::{LookupKind, ProvisionError, ProvisionResult};
use crate::paging::{PageRequest, paginate};
use crate::permissions::{
    AclTarget, PermissionEntry, PermissionSet, Principal, reconcile_permissions,
};
use crate::reconcile::{Action, Reconcilable, Reconciled, create_or_update};

const JOBS_LIST: &str = "2.1/jobs/list";
const JOBS_CREATE: &str = "2.1/jobs/create";
const JOBS_UPDATE: &str = "2.1/jobs/update";

/// `jobs/list` rejects a larger `limit`.
pub const JOBS_LIST_MAX_LIMIT: usize = 100;

const TASK_KEY: &str = "notebook_task_1";
const JOB_CLUSTER_KEY: &str = "default_cluster";

/// How an existing job is recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobLookup {
    /// Match on the job name.
    #[default]
    Name,
    /// Match on the notebook path of any of the job's tasks.
    NotebookPath,
}

/// Compute the notebook task runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterSpec {
    Existing {
        cluster_id: String,
    },
    New {
        spark_version: String,
        node_type_id: String,
        num_workers: u32,
    },
}

/// Job-level parameter with its default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParameter {
    pub name: String,
    pub default: String,
}

/// Notebook widget value passed to the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseParameter {
    pub name: String,
    pub value: String,
}

/// Desired state of a single-notebook job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    #[serde(default)]
    pub lookup: JobLookup,
    #[serde(default)]
    pub description: Option<String>,
    pub notebook_path: String,
    /// Display name of the service principal the job runs as.
    #[serde(default)]
    pub run_as: Option<String>,
    pub cluster: ClusterSpec,
    #[serde(default)]
    pub parameters: Vec<JobParameter>,
    /// Overrides on top of the job parameter defaults.
    #[serde(default)]
    pub base_parameters: Vec<BaseParameter>,
    #[serde(default)]
    pub permissions: Vec<PermissionEntry>,
}

impl JobSpec {
    pub fn permission_set(&self) -> PermissionSet {
        self.permissions.iter().cloned().collect()
    }

    /// Principals that must exist before the job is created or updated.
    fn dependencies(&self) -> Vec<Principal> {
        let mut deps: Vec<Principal> = self
            .run_as
            .iter()
            .map(|sp| Principal::ServicePrincipal(sp.clone()))
            .collect();
        for principal in self.permission_set().principals() {
            if !deps.contains(principal) {
                deps.push(principal.clone());
            }
        }
        deps
    }

    /// Notebook base parameters: every job parameter default, overridden by
    /// explicit entries.
    fn notebook_parameters(&self) -> BTreeMap<&str, &str> {
        let mut params: BTreeMap<&str, &str> = self
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.default.as_str()))
            .collect();
        for p in &self.base_parameters {
            params.insert(&p.name, &p.value);
        }
        params
    }

    pub fn settings(&self) -> JobSettings<'_> {
        let (job_clusters, job_cluster_key, existing_cluster_id) = match &self.cluster {
            ClusterSpec::Existing { cluster_id } => (Vec::new(), None, Some(cluster_id.as_str())),
            ClusterSpec::New {
                spark_version,
                node_type_id,
                num_workers,
            } => (
                vec![JobClusterDef {
                    job_cluster_key: JOB_CLUSTER_KEY,
                    new_cluster: NewCluster {
                        spark_version,
                        node_type_id,
                        num_workers: *num_workers,
                    },
                }],
                Some(JOB_CLUSTER_KEY),
                None,
            ),
        };

        JobSettings {
            name: &self.name,
            description: self.description.as_deref(),
            run_as: self.run_as.as_deref().map(|sp| RunAs {
                service_principal_name: sp,
            }),
            tasks: vec![Task {
                task_key: TASK_KEY,
                notebook_task: NotebookTask {
                    notebook_path: &self.notebook_path,
                    base_parameters: self.notebook_parameters(),
                },
                job_cluster_key,
                existing_cluster_id,
            }],
            job_clusters,
            parameters: self
                .parameters
                .iter()
                .map(|p| ParameterDef {
                    name: &p.name,
                    default: &p.default,
                })
                .collect(),
        }
    }

    fn matches(&self, job: &ListedJob) -> bool {
        match self.lookup {
            JobLookup::Name => job.settings.name.as_deref() == Some(self.name.as_str()),
            JobLookup::NotebookPath => job.settings.tasks.iter().any(|t| {
                t.notebook_task
                    .as_ref()
                    .is_some_and(|n| n.notebook_path == self.notebook_path)
            }),
        }
    }
}

/// Request payload for `jobs/create` and `new_settings` of `jobs/update`.
#[derive(Debug, Serialize)]
pub struct JobSettings<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_as: Option<RunAs<'a>>,
    tasks: Vec<Task<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    job_clusters: Vec<JobClusterDef<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<ParameterDef<'a>>,
}

#[derive(Debug, Serialize)]
struct RunAs<'a> {
    service_principal_name: &'a str,
}

#[derive(Debug, Serialize)]
struct Task<'a> {
    task_key: &'static str,
    notebook_task: NotebookTask<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_cluster_key: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    existing_cluster_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct NotebookTask<'a> {
    notebook_path: &'a str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    base_parameters: BTreeMap<&'a str, &'a str>,
}

#[derive(Debug, Serialize)]
struct JobClusterDef<'a> {
    job_cluster_key: &'static str,
    new_cluster: NewCluster<'a>,
}

#[derive(Debug, Serialize)]
struct NewCluster<'a> {
    spark_version: &'a str,
    node_type_id: &'a str,
    num_workers: u32,
}

#[derive(Debug, Serialize)]
struct ParameterDef<'a> {
    name: &'a str,
    default: &'a str,
}

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<ListedJob>,
}

#[derive(Debug, Deserialize)]
struct ListedJob {
    job_id: i64,
    #[serde(default)]
    settings: ListedSettings,
}

#[derive(Debug, Default, Deserialize)]
struct ListedSettings {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tasks: Vec<ListedTask>,
}

#[derive(Debug, Deserialize)]
struct ListedTask {
    #[serde(default)]
    notebook_task: Option<ListedNotebookTask>,
}

#[derive(Debug, Deserialize)]
struct ListedNotebookTask {
    notebook_path: String,
}

#[derive(Debug, Deserialize)]
struct CreatedJob {
    job_id: i64,
}

#[async_trait]
impl Reconcilable for JobSpec {
    type Id = i64;

    const KIND: LookupKind = LookupKind::Job;

    fn natural_key(&self) -> String {
        match self.lookup {
            JobLookup::Name => self.name.clone(),
            JobLookup::NotebookPath => self.notebook_path.clone(),
        }
    }

    async fn find(&self, client: &WorkspaceClient) -> ProvisionResult<Option<i64>> {
        let limit = client.page_size().min(JOBS_LIST_MAX_LIMIT);
        let pages = paginate(limit, |page: PageRequest| async move {
            let list: JobList = client
                .get(
                    JOBS_LIST,
                    &[
                        ("offset", page.offset.to_string()),
                        ("limit", page.limit.to_string()),
                        ("expand_tasks", "true".to_string()),
                    ],
                )
                .await?;
            Ok::<_, ProvisionError>(list.jobs)
        });
        futures_util::pin_mut!(pages);
        while let Some(page) = pages.try_next().await? {
            if let Some(job) = page.iter().find(|job| self.matches(job)) {
                return Ok(Some(job.job_id));
            }
        }
        Ok(None)
    }

    async fn create(&self, client: &WorkspaceClient) -> ProvisionResult<i64> {
        let created: CreatedJob = client
            .send_as(Method::POST, JOBS_CREATE, &self.settings())
            .await?;
        Ok(created.job_id)
    }

    async fn update(&self, client: &WorkspaceClient, id: &i64) -> ProvisionResult<Action> {
        let body = json!({
            "job_id": id,
            "new_settings": self.settings(),
        });
        client.send(Method::POST, JOBS_UPDATE, &body).await?;
        Ok(Action::Updated)
    }
}

/// Everything `reconcile_job` changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub name: String,
    pub reconciled: Reconciled<i64>,
    pub permissions_changed: bool,
}

/// Full job workflow: resolve the run-as service principal and every
/// principal named in the ACL, create or update the job, then grant missing
/// job permissions.
pub async fn reconcile_job(client: &WorkspaceClient, spec: &JobSpec) -> ProvisionResult<JobReport> {
    directory::require_all(client, &spec.dependencies()).await?;

    let reconciled = create_or_update(client, spec).await?;
    let permissions_changed =
        reconcile_permissions(client, &AclTarget::job(reconciled.id), &spec.permission_set())
            .await?;

    Ok(JobReport {
        name: spec.name.clone(),
        reconciled,
        permissions_changed,
    })
}
