pub mod audit_log;
pub mod document;
pub mod email;
pub mod github_repo;
pub mod opportunity;
pub mod report;
pub mod role_permission;
pub mod task;
pub mod task_category;
pub mod user;

pub use audit_log::AuditLogEntry;
pub use document::Document;
pub use email::Email;
pub use github_repo::GithubRepo;
pub use opportunity::Opportunity;
pub use report::Report;
pub use role_permission::RolePermission;
pub use task::Task;
pub use task_category::TaskCategory;
pub use user::User;
