mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use project_manager::authz::Role;

#[tokio::test]
async fn only_admins_and_managers_create_projects() -> Result<()> {
    let t = common::setup().await?;
    let manager = t.account("mgr@example.com", Role::Manager).await?;
    let member = t.account("mem@example.com", Role::Member).await?;

    let (status, _) = t
        .send("POST", "/projects", Some(&member.token), Some(json!({ "name": "Nope" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t
        .send("POST", "/projects", Some(&manager.token), Some(json!({ "name": "  " })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = t
        .send(
            "POST",
            "/projects",
            Some(&manager.token),
            Some(json!({ "name": "Launch", "description": "Q4 launch" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["creator_id"], manager.id.as_str());
    assert_eq!(body["status"], "Active");
    let members = body["members"].as_array().cloned().unwrap_or_default();
    assert_eq!(members.len(), 1, "creator is enrolled as a member");
    assert_eq!(members[0]["user_id"], manager.id.as_str());

    Ok(())
}

#[tokio::test]
async fn project_visibility_follows_membership() -> Result<()> {
    let t = common::setup().await?;
    let admin = t.account("root@example.com", Role::Admin).await?;
    let owner = t.account("owner@example.com", Role::Manager).await?;
    let other_manager = t.account("other@example.com", Role::Manager).await?;
    let member = t.account("mem@example.com", Role::Member).await?;
    let outsider = t.account("out@example.com", Role::Member).await?;

    let project_id = t.create_project(&owner.token, "Apollo").await?;
    t.create_project(&other_manager.token, "Gemini").await?;
    t.add_member(&owner.token, project_id, &member.id).await?;

    let uri = format!("/projects/{project_id}");
    for token in [&admin.token, &owner.token, &other_manager.token, &member.token] {
        let (status, body) = t.send("GET", &uri, Some(token), None).await?;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["name"], "Apollo");
    }

    let (status, body) = t.send("GET", &uri, Some(&outsider.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (_, listed) = t.send("GET", "/projects", Some(&member.token), None).await?;
    let names: Vec<_> = listed.as_array().into_iter().flatten().map(|p| p["name"].clone()).collect();
    assert_eq!(names, vec![json!("Apollo")]);

    let (_, listed) = t.send("GET", "/projects", Some(&outsider.token), None).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(0));

    let (_, listed) = t.send("GET", "/projects", Some(&other_manager.token), None).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(2));

    let (status, _) = t.send("GET", "/projects/9999", Some(&admin.token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn only_the_creator_or_admin_updates_and_manages_members() -> Result<()> {
    let t = common::setup().await?;
    let admin = t.account("root@example.com", Role::Admin).await?;
    let owner = t.account("owner@example.com", Role::Manager).await?;
    let other_manager = t.account("other@example.com", Role::Manager).await?;
    let member = t.account("mem@example.com", Role::Member).await?;

    let project_id = t.create_project(&owner.token, "Apollo").await?;
    let uri = format!("/projects/{project_id}");

    let (status, _) = t
        .send("PUT", &uri, Some(&other_manager.token), Some(json!({ "name": "Hijacked" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t
        .send("PUT", &uri, Some(&owner.token), Some(json!({ "name": "Apollo 11", "status": "On Hold" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Apollo 11");
    assert_eq!(body["status"], "On Hold");

    let (status, body) = t
        .send("PUT", &uri, Some(&admin.token), Some(json!({ "description": "admin edit" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Apollo 11");

    let members_uri = format!("/projects/{project_id}/members");
    let (status, _) = t
        .send("POST", &members_uri, Some(&other_manager.token), Some(json!({ "user_id": member.id })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    t.add_member(&owner.token, project_id, &member.id).await?;

    let (status, _) = t
        .send("POST", &members_uri, Some(&owner.token), Some(json!({ "user_id": member.id })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "already a member");

    let (status, _) = t
        .send("POST", &members_uri, Some(&owner.token), Some(json!({ "user_id": "no-such-user" })))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // a plain member cannot manage the member list
    let (status, _) = t
        .send(
            "DELETE",
            &format!("/projects/{project_id}/members/{}", owner.id),
            Some(&member.token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn member_removal_guards() -> Result<()> {
    let t = common::setup().await?;
    let admin = t.account("root@example.com", Role::Admin).await?;
    let owner = t.account("owner@example.com", Role::Manager).await?;
    let busy = t.account("busy@example.com", Role::Member).await?;
    let idle = t.account("idle@example.com", Role::Member).await?;
    let stranger = t.account("stranger@example.com", Role::Member).await?;

    let project_id = t.create_project(&owner.token, "Apollo").await?;
    t.add_member(&owner.token, project_id, &busy.id).await?;
    t.add_member(&owner.token, project_id, &idle.id).await?;

    let task_id = t
        .create_task(&owner.token, project_id, json!({ "title": "Wire", "assigned_user_id": busy.id }))
        .await?;

    let member_uri = |user_id: &str| format!("/projects/{project_id}/members/{user_id}");

    let (status, body) = t.send("DELETE", &member_uri(&owner.id), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "creator cannot be removed: {body}");
    let (status, _) = t.send("DELETE", &member_uri(&owner.id), Some(&admin.token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "not even by an admin");

    let (status, body) = t.send("DELETE", &member_uri(&busy.id), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "unfinished assignment: {body}");

    let (status, _) = t.send("DELETE", &member_uri(&stranger.id), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.send("DELETE", &member_uri(&idle.id), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // once the assignment is done the member can go
    let (status, _) = t
        .send("PUT", &format!("/tasks/{task_id}/status"), Some(&busy.token), Some(json!({ "status": "Done" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t.send("DELETE", &member_uri(&busy.id), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, project) = t.send("GET", &format!("/projects/{project_id}"), Some(&owner.token), None).await?;
    assert_eq!(project["members"].as_array().map(Vec::len), Some(1));

    Ok(())
}

#[tokio::test]
async fn project_delete_requires_finished_tasks() -> Result<()> {
    let t = common::setup().await?;
    let admin = t.account("root@example.com", Role::Admin).await?;
    let owner = t.account("owner@example.com", Role::Manager).await?;
    let other_manager = t.account("other@example.com", Role::Manager).await?;

    let project_id = t.create_project(&owner.token, "Apollo").await?;
    let task_id = t.create_task(&owner.token, project_id, json!({ "title": "Launch" })).await?;
    let uri = format!("/projects/{project_id}");

    // unfinished work blocks every caller before ownership is considered
    for token in [&other_manager.token, &owner.token, &admin.token] {
        let (status, body) = t.send("DELETE", &uri, Some(token), None).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "open task keeps the project: {body}");
        assert_eq!(body["error"], "bad_request");
    }

    let (status, _) = t
        .send("PUT", &format!("/tasks/{task_id}/status"), Some(&owner.token), Some(json!({ "status": "done" })))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t.send("DELETE", &uri, Some(&other_manager.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.send("DELETE", &uri, Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t.send("GET", &format!("/tasks/{task_id}"), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "tasks cascade with the project");

    Ok(())
}
