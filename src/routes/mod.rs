pub mod audit_logs;
pub mod auth;
pub mod docs;
pub mod emails;
pub mod github;
pub mod opportunities;
pub mod reports;
pub mod role_permissions;
pub mod task_categories;
pub mod tasks;
pub mod users;

use axum::routing::{delete, get, patch, post, put, MethodRouter};
use axum::Router;
use serde::{Deserialize, Deserializer};

use crate::access::{Action, Role};
use crate::middleware::pipeline::{attach, Pipeline};
use crate::state::SharedState;

pub fn api_routes(state: &SharedState) -> Router<SharedState> {
    let guarded = |pipeline: Pipeline, route: MethodRouter<SharedState>| attach(state, pipeline, route);
    let can = |resource: &'static str, action: Action| {
        Pipeline::authenticated().require_permission(resource, action)
    };
    let admin = || Pipeline::authenticated().require_role(Role::Admin);

    Router::new()
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", guarded(Pipeline::authenticated(), get(auth::me)))
        .route(
            "/api/auth/change-password",
            guarded(
                Pipeline::authenticated().audited("update", "user"),
                post(auth::change_password),
            ),
        )
        // Tasks
        .route("/api/tasks", guarded(can("tasks", Action::Read), get(tasks::list)))
        .route(
            "/api/tasks",
            guarded(
                can("tasks", Action::Create).audited("create", "task"),
                post(tasks::create),
            ),
        )
        .route("/api/tasks/{id}", guarded(can("tasks", Action::Read), get(tasks::get)))
        .route(
            "/api/tasks/{id}",
            guarded(
                can("tasks", Action::Update).audited("update", "task"),
                put(tasks::update),
            ),
        )
        .route(
            "/api/tasks/{id}",
            guarded(
                can("tasks", Action::Delete).audited("delete", "task"),
                delete(tasks::delete),
            ),
        )
        .route(
            "/api/tasks/{id}/status",
            guarded(
                can("tasks", Action::Update).audited("update", "task"),
                patch(tasks::update_status),
            ),
        )
        // Task categories
        .route(
            "/api/task-categories",
            guarded(
                Pipeline::authenticated().require_role(Role::ViewOnly),
                get(task_categories::list),
            ),
        )
        .route(
            "/api/task-categories",
            guarded(
                admin().audited("create", "task_category"),
                post(task_categories::create),
            ),
        )
        .route(
            "/api/task-categories/{id}",
            guarded(
                admin().audited("update", "task_category"),
                put(task_categories::update),
            ),
        )
        .route(
            "/api/task-categories/{id}",
            guarded(
                admin().audited("delete", "task_category"),
                delete(task_categories::delete),
            ),
        )
        // Opportunities
        .route(
            "/api/opportunities",
            guarded(can("opportunities", Action::Read), get(opportunities::list)),
        )
        .route(
            "/api/opportunities",
            guarded(
                can("opportunities", Action::Create).audited("create", "opportunity"),
                post(opportunities::create),
            ),
        )
        .route(
            "/api/opportunities/{id}",
            guarded(can("opportunities", Action::Read), get(opportunities::get)),
        )
        .route(
            "/api/opportunities/{id}",
            guarded(
                can("opportunities", Action::Update).audited("update", "opportunity"),
                put(opportunities::update),
            ),
        )
        .route(
            "/api/opportunities/{id}",
            guarded(
                can("opportunities", Action::Delete).audited("delete", "opportunity"),
                delete(opportunities::delete),
            ),
        )
        // Docs
        .route("/api/docs", guarded(can("docs", Action::Read), get(docs::list)))
        .route(
            "/api/docs",
            guarded(
                can("docs", Action::Create).audited("create", "doc"),
                post(docs::create),
            ),
        )
        .route("/api/docs/{id}", guarded(can("docs", Action::Read), get(docs::get)))
        .route(
            "/api/docs/{id}",
            guarded(
                can("docs", Action::Update).audited("update", "doc"),
                put(docs::update),
            ),
        )
        .route(
            "/api/docs/{id}",
            guarded(
                can("docs", Action::Delete).audited("delete", "doc"),
                delete(docs::delete),
            ),
        )
        .route(
            "/api/docs/{id}/content",
            guarded(can("docs", Action::Read), get(docs::content)),
        )
        // Reports
        .route(
            "/api/report-types",
            guarded(can("reports", Action::Read), get(reports::list_types)),
        )
        .route("/api/reports", guarded(can("reports", Action::Read), get(reports::list)))
        .route(
            "/api/reports",
            guarded(
                can("reports", Action::Create).audited("create", "report"),
                post(reports::create),
            ),
        )
        .route("/api/reports/{id}", guarded(can("reports", Action::Read), get(reports::get)))
        .route(
            "/api/reports/{id}",
            guarded(
                can("reports", Action::Delete).audited("delete", "report"),
                delete(reports::delete),
            ),
        )
        .route(
            "/api/reports/{id}/content",
            guarded(can("reports", Action::Read), get(reports::content)),
        )
        // Emails
        .route(
            "/api/email-templates",
            guarded(can("emails", Action::Read), get(emails::list_templates)),
        )
        .route("/api/emails", guarded(can("emails", Action::Read), get(emails::list)))
        .route(
            "/api/emails",
            guarded(
                can("emails", Action::Create).audited("create", "email"),
                post(emails::send),
            ),
        )
        .route("/api/emails/{id}", guarded(can("emails", Action::Read), get(emails::get)))
        .route(
            "/api/emails/{id}",
            guarded(
                can("emails", Action::Delete).audited("delete", "email"),
                delete(emails::delete),
            ),
        )
        // GitHub
        .route(
            "/api/github/repos",
            guarded(can("github", Action::Read), get(github::list_repos)),
        )
        .route(
            "/api/github/sync",
            guarded(
                can("github", Action::Update).audited("sync", "github_repo"),
                post(github::sync),
            ),
        )
        .route(
            "/api/github/repos/{id}",
            guarded(
                can("github", Action::Delete).audited("delete", "github_repo"),
                delete(github::delete_repo),
            ),
        )
        // Users
        .route("/api/users", guarded(admin(), get(users::list)))
        .route(
            "/api/users",
            guarded(admin().audited("create", "user"), post(users::create)),
        )
        .route("/api/users/{id}", guarded(admin(), get(users::get)))
        .route(
            "/api/users/{id}",
            guarded(admin().audited("update", "user"), put(users::update)),
        )
        .route(
            "/api/users/{id}/active",
            guarded(admin().audited("update", "user"), patch(users::toggle_active)),
        )
        // Role permissions
        .route("/api/role-permissions", guarded(admin(), get(role_permissions::list)))
        .route(
            "/api/role-permissions",
            guarded(
                admin().audited("update", "role_permission"),
                put(role_permissions::upsert),
            ),
        )
        // Audit log
        .route("/api/audit-logs", guarded(admin(), get(audit_logs::list)))
}

/// Keeps an explicit `null` apart from a missing key in partial updates:
/// absent is `None`, `null` is `Some(None)`. Pair with `#[serde(default)]`.
pub(crate) fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
