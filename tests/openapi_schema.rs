mod common;

use anyhow::Result;
use axum::http::StatusCode;

#[tokio::test]
async fn openapi_document_is_served() -> Result<()> {
    let t = common::setup().await?;

    let (status, doc) = t.send("GET", "/api-docs/openapi.json", None, None).await?;
    assert_eq!(status, StatusCode::OK);

    let paths = doc["paths"].as_object().cloned().unwrap_or_default();
    for path in [
        "/auth/login",
        "/projects",
        "/projects/{id}/members/{user_id}",
        "/projects/{project_id}/tasks",
        "/tasks/{id}/status",
        "/tasks/{task_id}/comments/{id}",
        "/admin/users/{id}/role",
        "/audit",
        "/api/health",
    ] {
        assert!(paths.contains_key(path), "missing path {path}");
    }

    assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
    assert!(doc["components"]["schemas"]["Task"].is_object());
    assert_eq!(doc["paths"]["/tasks/{id}"]["delete"]["tags"][0], "Tasks");
    assert!(doc["servers"][0]["url"].as_str().unwrap_or_default().starts_with("http"));

    let (status, _) = t.send("GET", "/docs/", None, None).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}
