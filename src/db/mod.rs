pub mod audit;
pub mod documents;
pub mod emails;
pub mod github_repos;
pub mod opportunities;
pub mod reports;
pub mod role_permissions;
pub mod task_categories;
pub mod tasks;
pub mod users;
