use lakeadmin_core::settings::{Settings, WorkspaceSettings};
use lakeadmin_core::{
    Action, GroupSpec, ResourceKind, VolumeSpec, VolumeType, WorkspaceClient, apply,
};
use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(host: &str) -> Settings {
    Settings {
        workspace: WorkspaceSettings {
            host: host.to_string(),
            token: "test-token".into(),
        },
        groups: vec![GroupSpec::new("data-engineers")],
        volumes: vec![VolumeSpec {
            catalog_name: "main".into(),
            schema_name: "raw".into(),
            name: "landing".into(),
            volume_type: VolumeType::Managed,
            storage_location: None,
            comment: None,
            grants: Vec::new(),
        }],
        ..Settings::default()
    }
}

#[tokio::test]
async fn only_filter_skips_other_kinds() {
    let server = MockServer::start().await;
    let settings = settings(&server.uri());
    let client = WorkspaceClient::from_settings(&settings);

    Mock::given(path_regex("^/api/2.0/preview/scim/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Resources": [] })))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/volumes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "volumes": [] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/2.0/volumes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "volume_id": "v-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let report = apply(&client, &settings, Some(ResourceKind::Volume)).await.unwrap();
    assert!(report.groups.is_empty());
    let rows = report.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, ResourceKind::Volume);
    assert_eq!(rows[0].key, "main.raw.landing");
    assert_eq!(rows[0].id, "v-1");
    assert_eq!(rows[0].action, Action::Created);
}

#[tokio::test]
async fn first_failure_aborts_remaining_kinds() {
    let server = MockServer::start().await;
    let settings = settings(&server.uri());
    let client = WorkspaceClient::from_settings(&settings);

    Mock::given(method("GET"))
        .and(path("/api/2.0/preview/scim/v2/Groups"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path_regex("^/api/2.0/volumes"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = apply(&client, &settings, None).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
}
