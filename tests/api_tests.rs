mod common;

use std::net::SocketAddr;

use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use common::As;
use wishdesk::access::PermissionActions;

fn actions(create: bool, read: bool, update: bool, delete: bool) -> PermissionActions {
    PermissionActions {
        create,
        read,
        update,
        delete,
    }
}

#[tokio::test]
async fn health_returns_ok() {
    let Some(app) = common::spawn_app().await else { return };

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    assert_eq!(resp.text().await.unwrap(), "ok");

    common::cleanup(app).await;
}

#[tokio::test]
async fn oversized_body_is_rejected_and_cors_applies() {
    let Some(app) = common::spawn_app_with(|config| config.max_body_size = 1024).await else {
        return;
    };
    let (_, admin) = app.bootstrap().await;

    let resp = app
        .client
        .post(app.url("/api/docs"))
        .header("x-user-id", admin.to_string())
        .json(&json!({ "title": "Big", "content": "x".repeat(4096) }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let resp = app
        .client
        .get(app.url("/health"))
        .header("origin", "https://desk.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");

    common::cleanup(app).await;
}

#[tokio::test]
async fn register_bootstrap_user_is_admin() {
    let Some(app) = common::spawn_app().await else { return };

    let (token, _) = app.bootstrap().await;
    let (me, status) = app.get("/api/auth/me", As::Bearer(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"], "admin");
    assert!(me.get("password_hash").is_none());

    common::cleanup(app).await;
}

#[tokio::test]
async fn register_rejects_second_user() {
    let Some(app) = common::spawn_app().await else { return };
    app.bootstrap().await;

    let (body, status) = app
        .post(
            "/api/auth/register",
            As::Anonymous,
            &json!({ "email": "other@test.com", "password": "password123", "name": "Other" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("disabled"));

    common::cleanup(app).await;
}

#[tokio::test]
async fn register_rejects_short_password() {
    let Some(app) = common::spawn_app().await else { return };

    let (_, status) = app
        .post(
            "/api/auth/register",
            As::Anonymous,
            &json!({ "email": "admin@test.com", "password": "short", "name": "Admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let Some(app) = common::spawn_app().await else { return };

    let resp = app
        .client
        .post(app.url("/api/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    common::cleanup(app).await;
}

#[tokio::test]
async fn login_valid_and_invalid_credentials() {
    let Some(app) = common::spawn_app().await else { return };
    app.bootstrap().await;

    let (body, status) = app
        .post(
            "/api/auth/login",
            As::Anonymous,
            &json!({ "email": common::ADMIN_EMAIL, "password": common::ADMIN_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());

    let (_, status) = app
        .post(
            "/api/auth/login",
            As::Anonymous,
            &json!({ "email": common::ADMIN_EMAIL, "password": "wrongpassword" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, status) = app
        .post(
            "/api/auth/login",
            As::Anonymous,
            &json!({ "email": "nobody@test.com", "password": "password123" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    common::cleanup(app).await;
}

#[tokio::test]
async fn login_rate_limited_after_repeated_failures() {
    let Some(app) = common::spawn_app().await else { return };
    app.bootstrap().await;

    let wrong = json!({ "email": common::ADMIN_EMAIL, "password": "wrongpassword" });
    for _ in 0..wishdesk::rate_limit::MAX_LOGIN_FAILURES {
        let (_, status) = app.post("/api/auth/login", As::Anonymous, &wrong).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // Even the right password is refused inside the window
    let (_, status) = app
        .post(
            "/api/auth/login",
            As::Anonymous,
            &json!({ "email": common::ADMIN_EMAIL, "password": common::ADMIN_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    common::cleanup(app).await;
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let Some(app) = common::spawn_app().await else { return };

    let (_, status) = app.get("/api/tasks", As::Anonymous).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, status) = app.get("/api/tasks", As::Bearer("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, status) = app.get("/api/tasks", As::User(Uuid::now_v7())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    common::cleanup(app).await;
}

#[tokio::test]
async fn dev_header_ignored_when_disabled() {
    let Some(app) = common::spawn_app_with(|config| config.dev_auth = false).await else {
        return;
    };
    let (_, admin_id) = app.bootstrap().await;

    let (_, status) = app.get("/api/tasks", As::User(admin_id)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    common::cleanup(app).await;
}

#[tokio::test]
async fn gc_task_lifecycle_with_audit() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;
    let gc = app.create_user("gc").await;
    app.grant("gc", "tasks", actions(true, true, true, false)).await;

    let (task, status) = app
        .post("/api/tasks", As::User(gc), &json!({ "title": "Call supplier" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{task}");
    assert_eq!(task["status"], "todo");
    assert_eq!(task["priority"], "medium");
    let task_id = task["id"].as_str().unwrap().to_string();

    let created = common::eventually(|| async {
        let rows = app.audit_rows("create", "task").await;
        (!rows.is_empty()).then_some(rows)
    })
    .await
    .expect("create audit row never appeared");
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].1.as_ref().unwrap()["title"], "Call supplier");

    // gc may not delete
    let (body, status) = app.delete(&format!("/api/tasks/{task_id}"), As::User(gc)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Permission denied: cannot delete tasks");

    // admin bypasses the matrix
    let (_, status) = app.delete(&format!("/api/tasks/{task_id}"), As::User(admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let deleted = common::eventually(|| async {
        let rows = app.audit_rows("delete", "task").await;
        (!rows.is_empty()).then_some(rows)
    })
    .await
    .expect("delete audit row never appeared");
    assert_eq!(deleted.len(), 1, "denied delete must not be audited");
    assert_eq!(deleted[0].0.as_deref(), Some(task_id.as_str()));

    common::cleanup(app).await;
}

#[tokio::test]
async fn missing_permission_row_denies() {
    let Some(app) = common::spawn_app().await else { return };
    app.bootstrap().await;
    let viewer = app.create_user("view_only").await;

    let (body, status) = app.get("/api/opportunities", As::User(viewer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "access denied");

    app.grant("view_only", "opportunities", actions(false, true, false, false)).await;
    let (_, status) = app.get("/api/opportunities", As::User(viewer)).await;
    assert_eq!(status, StatusCode::OK);

    common::cleanup(app).await;
}

#[tokio::test]
async fn failed_mutations_are_not_audited() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    let (_, status) = app
        .post("/api/tasks", As::User(admin), &json!({ "title": "x", "status": "bogus" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, status) = app
        .put(&format!("/api/tasks/{}", Uuid::now_v7()), As::User(admin), &json!({ "title": "y" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A later successful write proves the queue has drained past the failures
    let (_, status) = app
        .post("/api/docs", As::User(admin), &json!({ "title": "Runbook" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    common::eventually(|| async {
        (!app.audit_rows("create", "doc").await.is_empty()).then_some(())
    })
    .await
    .expect("doc audit row never appeared");

    assert!(app.audit_rows("create", "task").await.is_empty());
    assert!(app.audit_rows("update", "task").await.is_empty());

    common::cleanup(app).await;
}

#[tokio::test]
async fn gc_without_create_is_denied_and_not_audited() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;
    let gc = app.create_user("gc").await;
    app.grant("gc", "tasks", actions(false, true, true, false)).await;

    let (body, status) = app
        .post("/api/tasks", As::User(gc), &json!({ "title": "Not allowed" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Permission denied: cannot create tasks");

    let (_, status) = app
        .post("/api/docs", As::User(admin), &json!({ "title": "Barrier" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    common::eventually(|| async {
        (!app.audit_rows("create", "doc").await.is_empty()).then_some(())
    })
    .await
    .expect("doc audit row never appeared");

    let (tasks, _) = app.get("/api/tasks", As::User(admin)).await;
    assert!(tasks.as_array().unwrap().is_empty());
    assert!(app.audit_rows("create", "task").await.is_empty());

    common::cleanup(app).await;
}

#[tokio::test]
async fn server_errors_are_not_audited() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    sqlx::query("ALTER TABLE documents ADD CONSTRAINT reject_all CHECK (false) NOT VALID")
        .execute(&app.pool)
        .await
        .unwrap();
    let (_, status) = app
        .post("/api/docs", As::User(admin), &json!({ "title": "Doomed" }))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    sqlx::query("ALTER TABLE documents DROP CONSTRAINT reject_all")
        .execute(&app.pool)
        .await
        .unwrap();

    let (_, status) = app
        .post("/api/opportunities", As::User(admin), &json!({ "title": "Barrier", "company": "Acme" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    common::eventually(|| async {
        (!app.audit_rows("create", "opportunity").await.is_empty()).then_some(())
    })
    .await
    .expect("opportunity audit row never appeared");

    assert!(app.audit_rows("create", "doc").await.is_empty());

    common::cleanup(app).await;
}

#[tokio::test]
async fn enum_columns_reject_unknown_values() {
    let Some(app) = common::spawn_app().await else { return };

    for sql in [
        "INSERT INTO tasks (title, status) VALUES ('x', 'finished')",
        "INSERT INTO tasks (title, priority) VALUES ('x', 'someday')",
        "INSERT INTO opportunities (title, company, stage) VALUES ('x', 'y', 'dreaming')",
        "INSERT INTO emails (to_address, subject, body, status) VALUES ('a@b.co', 's', 'b', 'opened')",
    ] {
        let err = sqlx::query(sql).execute(&app.pool).await.unwrap_err();
        let db_err = err.as_database_error().expect("database error");
        assert!(db_err.is_check_violation(), "{sql}: {db_err}");
    }

    common::cleanup(app).await;
}

#[tokio::test]
async fn audit_redacts_passwords() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    let (_, status) = app
        .post(
            "/api/users",
            As::User(admin),
            &json!({ "email": "mod@test.com", "password": "supersecret", "name": "Mod", "role": "mod" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let rows = common::eventually(|| async {
        let rows = app.audit_rows("create", "user").await;
        (!rows.is_empty()).then_some(rows)
    })
    .await
    .expect("user audit row never appeared");
    let values = rows[0].1.as_ref().unwrap();
    assert_eq!(values["password"], "[redacted]");
    assert_eq!(values["email"], "mod@test.com");

    common::cleanup(app).await;
}

#[tokio::test]
async fn task_status_sets_and_clears_completed_at() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    let (task, _) = app
        .post("/api/tasks", As::User(admin), &json!({ "title": "Ship it", "priority": "high" }))
        .await;
    let path = format!("/api/tasks/{}/status", task["id"].as_str().unwrap());

    let (done, status) = app.patch(&path, As::User(admin), &json!({ "status": "done" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(done["completed_at"].is_string());

    let (reopened, _) = app.patch(&path, As::User(admin), &json!({ "status": "todo" })).await;
    assert!(reopened["completed_at"].is_null());

    let (_, status) = app.patch(&path, As::User(admin), &json!({ "status": "finished" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

#[tokio::test]
async fn task_update_null_clears_and_absent_keeps() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    let (task, _) = app
        .post(
            "/api/tasks",
            As::User(admin),
            &json!({
                "title": "Renew lease",
                "description": "Call the landlord",
                "assigned_to": admin,
                "due_date": "2026-12-01T09:00:00Z"
            }),
        )
        .await;
    let path = format!("/api/tasks/{}", task["id"].as_str().unwrap());

    let (kept, status) = app.put(&path, As::User(admin), &json!({ "title": "Renew office lease" })).await;
    assert_eq!(status, StatusCode::OK, "{kept}");
    assert_eq!(kept["title"], "Renew office lease");
    assert_eq!(kept["description"], "Call the landlord");
    assert_eq!(kept["assigned_to"], admin.to_string());
    assert!(kept["due_date"].is_string());

    let (cleared, status) = app
        .put(
            &path,
            As::User(admin),
            &json!({ "assigned_to": null, "due_date": null, "description": null }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{cleared}");
    assert!(cleared["assigned_to"].is_null());
    assert!(cleared["due_date"].is_null());
    assert!(cleared["description"].is_null());
    assert_eq!(cleared["title"], "Renew office lease");

    let (fetched, _) = app.get(&path, As::User(admin)).await;
    assert!(fetched["assigned_to"].is_null());

    common::cleanup(app).await;
}

#[tokio::test]
async fn opportunity_update_null_clears_optional_fields() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    let (opp, status) = app
        .post(
            "/api/opportunities",
            As::User(admin),
            &json!({
                "title": "Renewal", "company": "Acme",
                "notes": "Champion is the CFO", "expected_close": "2026-11-30"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{opp}");
    let path = format!("/api/opportunities/{}", opp["id"].as_str().unwrap());

    let (updated, status) = app
        .put(&path, As::User(admin), &json!({ "notes": null, "value": 5000 }))
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert!(updated["notes"].is_null());
    assert_eq!(updated["expected_close"], "2026-11-30");
    assert_eq!(updated["value"], 5000);

    common::cleanup(app).await;
}

#[tokio::test]
async fn task_list_filters() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    for (title, priority) in [("Quarterly review", "high"), ("Order toner", "low"), ("Review contract", "low")] {
        let (_, status) = app
            .post("/api/tasks", As::User(admin), &json!({ "title": title, "priority": priority }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (all, _) = app.get("/api/tasks", As::User(admin)).await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (low, _) = app.get("/api/tasks?priority=low", As::User(admin)).await;
    assert_eq!(low.as_array().unwrap().len(), 2);

    let (found, _) = app.get("/api/tasks?search=REVIEW", As::User(admin)).await;
    assert_eq!(found.as_array().unwrap().len(), 2);

    let (both, _) = app.get("/api/tasks?search=review&priority=low", As::User(admin)).await;
    assert_eq!(both.as_array().unwrap().len(), 1);
    assert_eq!(both[0]["title"], "Review contract");

    common::cleanup(app).await;
}

#[tokio::test]
async fn task_categories_readable_by_all_writable_by_admin() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;
    let viewer = app.create_user("view_only").await;

    let body = json!({ "name": "Sales", "color": "#ff8800" });
    let (_, status) = app.post("/api/task-categories", As::User(viewer), &body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, status) = app.post("/api/task-categories", As::User(admin), &body).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, status) = app.post("/api/task-categories", As::User(admin), &body).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (list, status) = app.get("/api/task-categories", As::User(viewer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list[0]["name"], "Sales");

    common::cleanup(app).await;
}

#[tokio::test]
async fn doc_content_served_as_markdown() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    let (doc, status) = app
        .post(
            "/api/docs",
            As::User(admin),
            &json!({ "title": "Onboarding", "category": "hr", "content": "# Welcome\n" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let resp = app
        .client
        .get(app.url(&format!("/api/docs/{}/content", doc["id"].as_str().unwrap())))
        .header("x-user-id", admin.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"].to_str().unwrap().starts_with("text/markdown"));
    assert_eq!(resp.text().await.unwrap(), "# Welcome\n");

    let (hr, _) = app.get("/api/docs?category=hr", As::User(admin)).await;
    assert_eq!(hr.as_array().unwrap().len(), 1);
    let (none, _) = app.get("/api/docs?category=legal", As::User(admin)).await;
    assert!(none.as_array().unwrap().is_empty());

    common::cleanup(app).await;
}

#[tokio::test]
async fn opportunity_validation_and_stage_filter() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    let (_, status) = app
        .post(
            "/api/opportunities",
            As::User(admin),
            &json!({ "title": "Big deal", "company": "Acme", "probability": 150 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (opp, status) = app
        .post(
            "/api/opportunities",
            As::User(admin),
            &json!({ "title": "Big deal", "company": "Acme", "value": 500000, "stage": "proposal", "probability": 40 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(opp["owner_id"], admin.to_string());

    let (proposals, _) = app.get("/api/opportunities?stage=proposal", As::User(admin)).await;
    assert_eq!(proposals.as_array().unwrap().len(), 1);
    let (won, _) = app.get("/api/opportunities?stage=won", As::User(admin)).await;
    assert!(won.as_array().unwrap().is_empty());

    common::cleanup(app).await;
}

#[tokio::test]
async fn user_management_is_admin_only() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;
    let moderator = app.create_user("mod").await;

    let (_, status) = app.get("/api/users", As::User(moderator)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (user, status) = app
        .post(
            "/api/users",
            As::User(admin),
            &json!({ "email": "gc@test.com", "password": "password123", "name": "GC", "role": "gc" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id: Uuid = user["id"].as_str().unwrap().parse().unwrap();

    let (_, status) = app
        .post(
            "/api/users",
            As::User(admin),
            &json!({ "email": "x@test.com", "password": "password123", "name": "X", "role": "owner" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (toggled, status) = app
        .patch(&format!("/api/users/{user_id}/active"), As::User(admin), &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(toggled["is_active"], false);

    let (body, status) = app.get("/api/auth/me", As::User(user_id)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Account is deactivated");

    let (_, status) = app
        .patch(&format!("/api/users/{admin}/active"), As::User(admin), &json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

#[tokio::test]
async fn role_permission_upsert() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;
    let gc = app.create_user("gc").await;

    let (_, status) = app
        .put(
            "/api/role-permissions",
            As::User(admin),
            &json!({ "role": "admin", "resource": "tasks", "actions": { "read": true } }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, status) = app
        .put(
            "/api/role-permissions",
            As::User(admin),
            &json!({ "role": "gc", "resource": "widgets", "actions": { "read": true } }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for read in [true, false] {
        let (row, status) = app
            .put(
                "/api/role-permissions",
                As::User(admin),
                &json!({ "role": "gc", "resource": "docs", "actions": { "read": read } }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(row["actions"]["read"], read);
    }

    let (rows, _) = app.get("/api/role-permissions", As::User(admin)).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);

    let (_, status) = app.get("/api/docs", As::User(gc)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    common::cleanup(app).await;
}

#[tokio::test]
async fn audit_log_listing_is_paginated() {
    let Some(app) = common::spawn_app_with(|config| config.audit_page_size = 2).await else {
        return;
    };
    let (_, admin) = app.bootstrap().await;

    for title in ["a", "b", "c"] {
        app.post("/api/tasks", As::User(admin), &json!({ "title": title })).await;
    }
    common::eventually(|| async {
        (app.audit_rows("create", "task").await.len() == 3).then_some(())
    })
    .await
    .expect("audit rows never appeared");

    let (first, status) = app.get("/api/audit-logs", As::User(admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["total"], 3);
    assert_eq!(first["entries"].as_array().unwrap().len(), 2);

    let (second, _) = app.get("/api/audit-logs?page=2", As::User(admin)).await;
    assert_eq!(second["entries"].as_array().unwrap().len(), 1);

    let gc = app.create_user("gc").await;
    let (_, status) = app.get("/api/audit-logs", As::User(gc)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    common::cleanup(app).await;
}

#[tokio::test]
async fn report_generated_in_background() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    app.post("/api/tasks", As::User(admin), &json!({ "title": "Write report" })).await;

    let (types, _) = app.get("/api/report-types", As::User(admin)).await;
    assert_eq!(types.as_array().unwrap().len(), 5);

    let (report, status) = app
        .post("/api/reports", As::User(admin), &json!({ "report_type": "task-summary" }))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(report["status"], "pending");
    let path = format!("/api/reports/{}", report["id"].as_str().unwrap());

    let settled = common::eventually(|| async {
        let (body, _) = app.get(&path, As::User(admin)).await;
        matches!(body["status"].as_str(), Some("completed" | "failed")).then_some(body)
    })
    .await
    .expect("report never settled");
    assert_eq!(settled["status"], "completed", "{settled}");
    assert_eq!(settled["page_count"], 1);
    assert!(settled["completed_at"].is_string());

    let resp = app
        .client
        .get(app.url(&format!("{path}/content")))
        .header("x-user-id", admin.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let content = resp.text().await.unwrap();
    assert!(content.starts_with("# Task Summary Report"));
    assert!(content.contains("Total tasks: 1"));

    let (_, status) = app.delete(&path, As::User(admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let file = settled["file_path"].as_str().unwrap();
    assert!(!std::path::Path::new(file).exists());

    common::cleanup(app).await;
}

#[tokio::test]
async fn report_rejects_unknown_type_and_bad_params() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    let (_, status) = app
        .post("/api/reports", As::User(admin), &json!({ "report_type": "weather" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, status) = app
        .post(
            "/api/reports",
            As::User(admin),
            &json!({ "report_type": "sales-pipeline", "parameters": { "period_days": -3 } }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, status) = app
        .post(
            "/api/reports",
            As::User(admin),
            &json!({ "report_type": "sales-pipeline", "parameters": { "period_days": 200_000_000 } }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (reports, _) = app.get("/api/reports", As::User(admin)).await;
    assert!(reports.as_array().unwrap().is_empty());

    common::cleanup(app).await;
}

#[tokio::test]
async fn run_generation_settles_once() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    let report = wishdesk::db::reports::create(
        &app.pool,
        "Direct",
        "email-performance",
        &json!({ "top_n": 3 }),
        admin,
    )
    .await
    .unwrap();

    let first = wishdesk::reports::lifecycle::run_generation(&app.state, &report)
        .await
        .unwrap();
    assert_eq!(first.status, "completed");
    assert!(first.file_path.is_some());

    // A settled report is not regenerated
    let second = wishdesk::reports::lifecycle::run_generation(&app.state, &report)
        .await
        .unwrap();
    assert!(second.is_settled());
    assert_eq!(second.status, "completed");
    assert_eq!(second.completed_at, first.completed_at);

    common::cleanup(app).await;
}

#[tokio::test]
async fn run_generation_marks_unknown_type_failed() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    let report = wishdesk::db::reports::create(&app.pool, "Stale", "retired-type", &json!({}), admin)
        .await
        .unwrap();

    let settled = wishdesk::reports::lifecycle::run_generation(&app.state, &report)
        .await
        .unwrap();
    assert_eq!(settled.status, "failed");
    assert!(settled.error.unwrap().contains("retired-type"));
    assert!(settled.file_path.is_none());

    common::cleanup(app).await;
}

#[tokio::test]
async fn email_sent_from_template() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    let (email, status) = app
        .post(
            "/api/emails",
            As::User(admin),
            &json!({
                "to": "client@example.com",
                "template_id": "task-assignment",
                "variables": { "task_title": "Fix invoice", "assignee_name": "Dana" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{email}");
    assert_eq!(email["status"], "pending");
    assert_eq!(email["subject"], "New task assigned: Fix invoice");

    let path = format!("/api/emails/{}", email["id"].as_str().unwrap());
    let sent = common::eventually(|| async {
        let (body, _) = app.get(&path, As::User(admin)).await;
        (body["status"] == "sent").then_some(body)
    })
    .await
    .expect("email never sent");
    assert!(sent["sent_at"].is_string());

    common::cleanup(app).await;
}

#[tokio::test]
async fn slow_simulated_sends_do_not_hold_up_audit() {
    let Some(app) = common::spawn_app_with(|config| {
        config.worker_count = 1;
        config.email.send_delay = std::time::Duration::from_secs(30);
    })
    .await
    else {
        return;
    };
    let (_, admin) = app.bootstrap().await;

    let mut emails = Vec::new();
    for to in ["one@example.com", "two@example.com"] {
        let (email, status) = app
            .post("/api/emails", As::User(admin), &json!({ "to": to, "subject": "Hi", "body": "Hello" }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{email}");
        emails.push(format!("/api/emails/{}", email["id"].as_str().unwrap()));
    }

    let (_, status) = app
        .post("/api/docs", As::User(admin), &json!({ "title": "Runbook" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    common::eventually(|| async {
        (!app.audit_rows("create", "doc").await.is_empty()).then_some(())
    })
    .await
    .expect("doc audit stuck behind simulated sends");

    // Still waiting out the send delay
    for path in &emails {
        let (body, _) = app.get(path, As::User(admin)).await;
        assert_eq!(body["status"], "pending");
    }

    common::cleanup(app).await;
}

#[tokio::test]
async fn email_validation_errors() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    let (_, status) = app
        .post("/api/emails", As::User(admin), &json!({ "to": "nobody", "subject": "Hi", "body": "Hello" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, status) = app
        .post(
            "/api/emails",
            As::User(admin),
            &json!({ "to": "a@example.com", "template_id": "does-not-exist" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, status) = app
        .post("/api/emails", As::User(admin), &json!({ "to": "a@example.com", "subject": "Hi" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (templates, status) = app.get("/api/email-templates", As::User(admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(templates.as_array().unwrap().len(), 7);

    common::cleanup(app).await;
}

fn remote_repos() -> Value {
    json!([
        {
            "id": 1, "name": "api", "full_name": "acme/api", "description": "Backend",
            "html_url": "https://github.com/acme/api", "language": "Rust",
            "stargazers_count": 12, "forks_count": 2, "open_issues_count": 3,
            "private": false, "default_branch": "main", "pushed_at": "2026-01-05T10:00:00Z"
        },
        {
            "id": 2, "name": "web", "full_name": "acme/web", "description": null,
            "html_url": "https://github.com/acme/web", "language": "TypeScript",
            "stargazers_count": 4, "forks_count": 0, "open_issues_count": 1,
            "private": true, "default_branch": "main", "pushed_at": null
        }
    ])
}

/// Serve `/user/repos` with a fixed status and body. Returns the base URL.
async fn fake_github(status: StatusCode, body: Value) -> String {
    let app = Router::new().route(
        "/user/repos",
        get(move |headers: HeaderMap| {
            let body = body.clone();
            async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer test-token");
                if !authorized {
                    return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Bad credentials" })));
                }
                (status, Json(body))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn github_sync_is_idempotent() {
    let api_url = fake_github(StatusCode::OK, remote_repos()).await;
    let Some(app) = common::spawn_app_with(|config| {
        config.github.api_url = api_url;
        config.github.token = Some("test-token".to_string());
    })
    .await
    else {
        return;
    };
    let (_, admin) = app.bootstrap().await;

    let (first, status) = app.post("/api/github/sync", As::User(admin), &json!({})).await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first, json!({ "fetched": 2, "created": 2, "updated": 0 }));

    let (second, _) = app.post("/api/github/sync", As::User(admin), &json!({})).await;
    assert_eq!(second, json!({ "fetched": 2, "created": 0, "updated": 2 }));

    let (repos, _) = app.get("/api/github/repos", As::User(admin)).await;
    let repos = repos.as_array().unwrap();
    assert_eq!(repos.len(), 2);
    let api = repos.iter().find(|r| r["full_name"] == "acme/api").unwrap();
    assert_eq!(api["stars"], 12);

    let (_, status) = app
        .delete(&format!("/api/github/repos/{}", api["id"].as_str().unwrap()), As::User(admin))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    common::cleanup(app).await;
}

#[tokio::test]
async fn github_failure_leaves_table_untouched() {
    let api_url = fake_github(StatusCode::INTERNAL_SERVER_ERROR, json!({ "message": "boom" })).await;
    let Some(app) = common::spawn_app_with(|config| {
        config.github.api_url = api_url;
        config.github.token = Some("test-token".to_string());
    })
    .await
    else {
        return;
    };
    let (_, admin) = app.bootstrap().await;

    let (body, status) = app.post("/api/github/sync", As::User(admin), &json!({})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Upstream service request failed");

    let (repos, _) = app.get("/api/github/repos", As::User(admin)).await;
    assert!(repos.as_array().unwrap().is_empty());

    common::cleanup(app).await;
}

#[tokio::test]
async fn github_sync_requires_token() {
    let Some(app) = common::spawn_app().await else { return };
    let (_, admin) = app.bootstrap().await;

    let (_, status) = app.post("/api/github/sync", As::User(admin), &json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

#[tokio::test]
async fn side_effect_routes_are_audited_once() {
    let api_url = fake_github(StatusCode::OK, remote_repos()).await;
    let Some(app) = common::spawn_app_with(|config| {
        config.github.api_url = api_url;
        config.github.token = Some("test-token".to_string());
    })
    .await
    else {
        return;
    };
    let (_, admin) = app.bootstrap().await;

    async fn audited_once(app: &common::TestApp, action: &str, resource: &str) {
        let rows = common::eventually(|| async {
            let rows = app.audit_rows(action, resource).await;
            (!rows.is_empty()).then_some(rows)
        })
        .await
        .unwrap_or_else(|| panic!("no {action} {resource} audit row"));
        assert_eq!(rows.len(), 1, "{action} {resource}");
    }

    let (report, status) = app
        .post("/api/reports", As::User(admin), &json!({ "report_type": "task-summary" }))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let report_path = format!("/api/reports/{}", report["id"].as_str().unwrap());
    common::eventually(|| async {
        let (body, _) = app.get(&report_path, As::User(admin)).await;
        matches!(body["status"].as_str(), Some("completed" | "failed")).then_some(())
    })
    .await
    .expect("report never settled");
    audited_once(&app, "create", "report").await;
    let (_, status) = app.delete(&report_path, As::User(admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    audited_once(&app, "delete", "report").await;

    let (email, status) = app
        .post(
            "/api/emails",
            As::User(admin),
            &json!({ "to": "client@example.com", "subject": "Hi", "body": "Hello" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    audited_once(&app, "create", "email").await;
    let (_, status) = app
        .delete(&format!("/api/emails/{}", email["id"].as_str().unwrap()), As::User(admin))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    audited_once(&app, "delete", "email").await;

    let (_, status) = app.post("/api/github/sync", As::User(admin), &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    audited_once(&app, "sync", "github_repo").await;
    let (repos, _) = app.get("/api/github/repos", As::User(admin)).await;
    let repo_id = repos[0]["id"].as_str().unwrap().to_string();
    let (_, status) = app
        .delete(&format!("/api/github/repos/{repo_id}"), As::User(admin))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    audited_once(&app, "delete", "github_repo").await;

    let (_, status) = app
        .post(
            "/api/auth/change-password",
            As::User(admin),
            &json!({ "current_password": common::ADMIN_PASSWORD, "new_password": "newpassword456" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    audited_once(&app, "update", "user").await;

    common::cleanup(app).await;
}
