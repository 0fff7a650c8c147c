use lakeadmin_core::{
    Action, ClusterSpec, JobLookup, JobSpec, PermissionEntry, Principal, WorkspaceClient,
    create_or_update, reconcile_job,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JOBS_LIST: &str = "/api/2.1/jobs/list";
const JOBS_CREATE: &str = "/api/2.1/jobs/create";
const JOBS_UPDATE: &str = "/api/2.1/jobs/update";

fn nightly_report() -> JobSpec {
    JobSpec {
        name: "Nightly report".into(),
        lookup: JobLookup::Name,
        description: None,
        notebook_path: "/Repos/Analytics/Reports/MyNotebook".into(),
        run_as: None,
        cluster: ClusterSpec::Existing {
            cluster_id: "0801-123456-abc".into(),
        },
        parameters: Vec::new(),
        base_parameters: Vec::new(),
        permissions: Vec::new(),
    }
}

fn listed(job_id: i64, name: &str, notebook_path: &str) -> serde_json::Value {
    json!({
        "job_id": job_id,
        "settings": {
            "name": name,
            "tasks": [{ "task_key": "t", "notebook_task": { "notebook_path": notebook_path } }]
        }
    })
}

#[tokio::test]
async fn second_run_updates_instead_of_creating() {
    let server = MockServer::start().await;
    let client = WorkspaceClient::new(&server.uri(), "test-token");

    // First listing sees nothing, every later one sees the created job.
    Mock::given(method("GET"))
        .and(path(JOBS_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "has_more": false })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(JOBS_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobs": [listed(42, "Nightly report", "/Repos/Analytics/Reports/MyNotebook")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(JOBS_CREATE))
        .and(body_partial_json(json!({ "name": "Nightly report" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": 42 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(JOBS_UPDATE))
        .and(body_partial_json(json!({
            "job_id": 42,
            "new_settings": {
                "name": "Nightly report",
                "tasks": [{ "existing_cluster_id": "0801-123456-abc" }]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let spec = nightly_report();
    let first = create_or_update(&client, &spec).await.unwrap();
    let second = create_or_update(&client, &spec).await.unwrap();

    assert_eq!(first.action, Action::Created);
    assert_eq!(second.action, Action::Updated);
    assert_eq!(first.id, 42);
    assert_eq!(second.id, first.id);
}

#[tokio::test]
async fn lookup_by_notebook_path_follows_pages_and_stops_at_match() {
    let server = MockServer::start().await;
    let client = WorkspaceClient::new(&server.uri(), "test-token").with_page_size(2);

    Mock::given(method("GET"))
        .and(path(JOBS_LIST))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobs": [listed(1, "a", "/a"), listed(2, "b", "/b")],
            "has_more": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(JOBS_LIST))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobs": [listed(3, "renamed", "/Repos/Analytics/Reports/MyNotebook"), listed(4, "d", "/d")],
            "has_more": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(JOBS_LIST))
        .and(query_param("offset", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jobs": [] })))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(JOBS_UPDATE))
        .and(body_partial_json(json!({ "job_id": 3 })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut spec = nightly_report();
    spec.lookup = JobLookup::NotebookPath;
    let reconciled = create_or_update(&client, &spec).await.unwrap();
    assert_eq!(reconciled.id, 3);
    assert_eq!(reconciled.action, Action::Updated);
}

#[tokio::test]
async fn job_workflow_resolves_principals_then_grants_missing_acl() {
    let server = MockServer::start().await;
    let client = WorkspaceClient::new(&server.uri(), "test-token");

    Mock::given(method("GET"))
        .and(path("/api/2.0/preview/scim/v2/ServicePrincipals"))
        .and(query_param("filter", "displayName eq \"xvy\""))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Resources": [{ "id": "sp-1" }] })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/preview/scim/v2/Groups"))
        .and(query_param("filter", "displayName eq \"data-engineers\""))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Resources": [{ "id": "g-1" }] })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(JOBS_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jobs": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(JOBS_CREATE))
        .and(body_partial_json(json!({ "run_as": { "service_principal_name": "xvy" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": 77 })))
        .expect(1)
        .mount(&server)
        .await;

    // Owner is already in place; only the group grant is sent.
    Mock::given(method("GET"))
        .and(path("/api/2.0/permissions/jobs/77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object_id": "/jobs/77",
            "access_control_list": [{
                "service_principal_name": "xvy",
                "all_permissions": [{ "permission_level": "IS_OWNER", "inherited": false }]
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/2.0/permissions/jobs/77"))
        .and(wiremock::matchers::body_json(json!({
            "access_control_list": [
                { "group_name": "data-engineers", "permission_level": "CAN_MANAGE_RUN" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut spec = nightly_report();
    spec.run_as = Some("xvy".into());
    spec.permissions = vec![
        PermissionEntry::new(Principal::Group("data-engineers".into()), "CAN_MANAGE_RUN"),
        PermissionEntry::new(Principal::ServicePrincipal("xvy".into()), "IS_OWNER"),
    ];

    let report = reconcile_job(&client, &spec).await.unwrap();
    assert_eq!(report.reconciled.id, 77);
    assert_eq!(report.reconciled.action, Action::Created);
    assert!(report.permissions_changed);
}

#[tokio::test]
async fn missing_run_as_principal_aborts_before_job_calls() {
    let server = MockServer::start().await;
    let client = WorkspaceClient::new(&server.uri(), "test-token");

    Mock::given(method("GET"))
        .and(path("/api/2.0/preview/scim/v2/ServicePrincipals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "totalResults": 0 })))
        .mount(&server)
        .await;
    Mock::given(path(JOBS_LIST))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut spec = nightly_report();
    spec.run_as = Some("ghost".into());
    let err = reconcile_job(&client, &spec).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn create_failure_surfaces_status_and_body() {
    let server = MockServer::start().await;
    let client = WorkspaceClient::new(&server.uri(), "test-token");

    Mock::given(method("GET"))
        .and(path(JOBS_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(JOBS_CREATE))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string(r#"{"error_code":"INVALID_PARAMETER_VALUE"}"#),
        )
        .mount(&server)
        .await;

    let err = create_or_update(&client, &nightly_report()).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("INVALID_PARAMETER_VALUE"));
}
