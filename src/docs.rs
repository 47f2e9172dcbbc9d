use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::Role;
use crate::errors::ErrorResponse;
use crate::models;
use crate::routes::{admin, audit, auth, comments, health, projects, tags, tasks};

#[derive(OpenApi)]
#[openapi(
	paths(
		auth::register,
		auth::login,
		auth::me,
		auth::update_profile,
		auth::logout,
		projects::list_projects,
		projects::create_project,
		projects::get_project,
		projects::update_project,
		projects::delete_project,
		projects::add_member,
		projects::remove_member,
		tasks::list_tasks,
		tasks::create_task,
		tasks::get_task,
		tasks::update_task,
		tasks::assign_task,
		tasks::update_status,
		tasks::add_tags,
		tasks::delete_task,
		comments::list_comments,
		comments::create_comment,
		comments::get_comment,
		comments::update_comment,
		comments::delete_comment,
		tags::list_tags,
		tags::create_tag,
		admin::create_user,
		admin::list_users,
		admin::delete_user,
		admin::change_role,
		audit::list_audit,
		health::health
	),
	components(
		schemas(
			Role,
			ErrorResponse,
			auth::MessageResponse,
			health::HealthResponse,
			models::user::User,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::RegisterRequest,
			models::user::ProfileUpdateRequest,
			models::user::AdminCreateUserRequest,
			models::user::RoleUpdateRequest,
			models::project::Project,
			models::project::ProjectMember,
			models::project::ProjectCreateRequest,
			models::project::ProjectUpdateRequest,
			models::project::AddMemberRequest,
			models::task::Task,
			models::task::TaskCreateRequest,
			models::task::TaskUpdateRequest,
			models::task::AssignTaskRequest,
			models::task::TaskStatusRequest,
			models::task::TaskTagsRequest,
			models::comment::Comment,
			models::comment::CommentRequest,
			models::tag::Tag,
			models::tag::TagCreateRequest,
			models::audit::ActivityLogEntry,
			models::audit::AuditPage
		)
	),
	modifiers(&BearerAuth),
	tags(
		(name = "Auth", description = "Registration, login and the caller's profile"),
		(name = "Projects", description = "Projects and their member lists"),
		(name = "Tasks", description = "Tasks, assignment, status and tags"),
		(name = "Comments", description = "Discussion threads on tasks"),
		(name = "Tags", description = "Shared task labels"),
		(name = "Admin", description = "User and role administration"),
		(name = "Audit", description = "Tamper-evident activity trail"),
		(name = "Health", description = "Liveness probe")
	)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		let components = openapi.components.get_or_insert_with(Default::default);
		components.add_security_scheme(
			"bearer_auth",
			SecurityScheme::Http(
				HttpBuilder::new()
					.scheme(HttpAuthScheme::Bearer)
					.bearer_format("JWT")
					.build(),
			),
		);
	}
}

/// Builds the served document: the derived paths plus request examples and a
/// server entry matching how the binary is started.
pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	add_request_examples(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes<S>(doc: utoipa::openapi::OpenApi) -> Router<S>
where
	S: Clone + Send + Sync + 'static,
{
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let doc_json = Arc::new(doc);
	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config))
}

fn add_request_examples(doc: &mut Value) {
	let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) else { return; };

	for item in paths.values_mut() {
		let Some(operations) = item.as_object_mut() else { continue; };
		for operation in operations.values_mut() {
			let Some(app_json) = operation
				.pointer_mut("/requestBody/content/application~1json")
				.and_then(Value::as_object_mut)
			else {
				continue;
			};
			let Some(reference) = app_json.get("schema").and_then(|s| s.get("$ref")).and_then(Value::as_str) else {
				continue;
			};
			if let Some(example) = request_example(reference) {
				app_json.entry("example").or_insert(example);
			}
		}
	}
}

fn request_example(reference: &str) -> Option<Value> {
	let example = match reference.rsplit('/').next()? {
		"LoginRequest" => json!({
			"email": "ada@example.com",
			"password": "S3cureP@ssw0rd"
		}),
		"RegisterRequest" => json!({
			"email": "ada@example.com",
			"password": "S3cureP@ssw0rd",
			"first_name": "Ada",
			"last_name": "Lovelace"
		}),
		"AdminCreateUserRequest" => json!({
			"email": "grace@example.com",
			"password": "S3cureP@ssw0rd",
			"first_name": "Grace",
			"last_name": "Hopper",
			"role": "Manager"
		}),
		"ProjectCreateRequest" => json!({
			"name": "Launch Planning",
			"description": "Prepare milestones for the product launch.",
			"start_date": "2025-10-01T09:00:00Z",
			"end_date": "2025-12-15T17:00:00Z"
		}),
		"TaskCreateRequest" => json!({
			"title": "Define launch checklist",
			"priority": "High",
			"status": "To Do",
			"due_date": "2025-10-10T10:00:00Z",
			"tag_ids": [1]
		}),
		"TaskStatusRequest" => json!({ "status": "In Progress" }),
		_ => return None,
	};
	Some(example)
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let tls_enabled = std::env::var("TLS_CERT_PATH").is_ok() && std::env::var("TLS_KEY_PATH").is_ok();
	let scheme = if tls_enabled { "https" } else { "http" };
	let server_url = format!("{}://localhost:{}", scheme, port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_protected_path_references_the_bearer_scheme() {
		let doc = serde_json::to_value(build_openapi(8000).unwrap()).unwrap();

		assert!(doc.pointer("/components/securitySchemes/bearer_auth").is_some());
		let me = doc.pointer("/paths/~1auth~1me/get/security").unwrap();
		assert_eq!(me, &json!([{ "bearer_auth": [] }]));
	}

	#[test]
	fn request_examples_are_attached() {
		let doc = serde_json::to_value(build_openapi(8000).unwrap()).unwrap();
		let example = doc
			.pointer("/paths/~1auth~1login/post/requestBody/content/application~1json/example/email")
			.and_then(Value::as_str);
		assert_eq!(example, Some("ada@example.com"));
	}
}
