mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use project_manager::authz::Role;

#[tokio::test]
async fn comment_thread_access_and_authorship() -> Result<()> {
    let t = common::setup().await?;
    let admin = t.account("root@example.com", Role::Admin).await?;
    let owner = t.account("owner@example.com", Role::Manager).await?;
    let assignee = t.account("assignee@example.com", Role::Member).await?;
    let bystander = t.account("bystander@example.com", Role::Member).await?;

    let project_id = t.create_project(&owner.token, "Apollo").await?;
    t.add_member(&owner.token, project_id, &assignee.id).await?;
    t.add_member(&owner.token, project_id, &bystander.id).await?;
    let task_id = t
        .create_task(&owner.token, project_id, json!({ "title": "Discuss", "assigned_user_id": assignee.id }))
        .await?;
    let thread = format!("/tasks/{task_id}/comments");

    let (status, first) = t
        .send("POST", &thread, Some(&assignee.token), Some(json!({ "content": "Blocked on vendor" })))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["author_id"], assignee.id.as_str());
    assert_eq!(first["author_name"], "assignee Tester");
    let first_id = first["id"].as_i64().unwrap_or_default();

    let (status, _) = t
        .send("POST", &thread, Some(&owner.token), Some(json!({ "content": "Escalating" })))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    // members who cannot see the task cannot see or join its thread
    let (status, _) = t.send("GET", &thread, Some(&bystander.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t
        .send("POST", &thread, Some(&bystander.token), Some(json!({ "content": "hi" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .send("POST", &thread, Some(&assignee.token), Some(json!({ "content": "   " })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, listed) = t.send("GET", &thread, Some(&assignee.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let contents: Vec<_> = listed.as_array().into_iter().flatten().map(|c| c["content"].clone()).collect();
    assert_eq!(contents, vec![json!("Escalating"), json!("Blocked on vendor")], "newest first");

    let comment_uri = format!("{thread}/{first_id}");

    // only the author edits or deletes, not even the project owner
    let (status, _) = t
        .send("PUT", &comment_uri, Some(&owner.token), Some(json!({ "content": "rewritten" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, edited) = t
        .send("PUT", &comment_uri, Some(&assignee.token), Some(json!({ "content": "Vendor replied" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["content"], "Vendor replied");
    assert!(!edited["updated_at"].is_null());

    let (status, fetched) = t.send("GET", &comment_uri, Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["content"], "Vendor replied");

    let (status, _) = t.send("DELETE", &comment_uri, Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.send("DELETE", &comment_uri, Some(&admin.token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t.send("GET", &comment_uri, Some(&assignee.token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn comments_are_scoped_to_their_task() -> Result<()> {
    let t = common::setup().await?;
    let owner = t.account("owner@example.com", Role::Manager).await?;

    let project_id = t.create_project(&owner.token, "Apollo").await?;
    let first_task = t.create_task(&owner.token, project_id, json!({ "title": "One" })).await?;
    let second_task = t.create_task(&owner.token, project_id, json!({ "title": "Two" })).await?;

    let (_, comment) = t
        .send(
            "POST",
            &format!("/tasks/{first_task}/comments"),
            Some(&owner.token),
            Some(json!({ "content": "on one" })),
        )
        .await?;
    let comment_id = comment["id"].as_i64().unwrap_or_default();

    let (status, _) = t
        .send("GET", &format!("/tasks/{second_task}/comments/{comment_id}"), Some(&owner.token), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.send("GET", "/tasks/9999/comments", Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}
