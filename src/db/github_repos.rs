use sqlx::PgPool;
use uuid::Uuid;

use crate::github::RemoteRepo;
use crate::models::GithubRepo;

pub async fn list_all<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
) -> Result<Vec<GithubRepo>, sqlx::Error> {
    sqlx::query_as::<_, GithubRepo>("SELECT * FROM github_repos ORDER BY pushed_at DESC NULLS LAST")
        .fetch_all(executor)
        .await
}

pub async fn insert<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    repo: &RemoteRepo,
) -> Result<GithubRepo, sqlx::Error> {
    sqlx::query_as::<_, GithubRepo>(
        "INSERT INTO github_repos
             (github_id, name, full_name, description, html_url, language, stars, forks,
              open_issues, is_private, default_branch, pushed_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING *",
    )
    .bind(repo.id)
    .bind(&repo.name)
    .bind(&repo.full_name)
    .bind(&repo.description)
    .bind(&repo.html_url)
    .bind(&repo.language)
    .bind(repo.stargazers_count)
    .bind(repo.forks_count)
    .bind(repo.open_issues_count)
    .bind(repo.private)
    .bind(&repo.default_branch)
    .bind(repo.pushed_at)
    .fetch_one(executor)
    .await
}

/// Overwrite every mutable field with the remote values.
pub async fn update<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    repo: &RemoteRepo,
) -> Result<GithubRepo, sqlx::Error> {
    sqlx::query_as::<_, GithubRepo>(
        "UPDATE github_repos SET
             github_id = $2, name = $3, description = $4, html_url = $5, language = $6,
             stars = $7, forks = $8, open_issues = $9, is_private = $10,
             default_branch = $11, pushed_at = $12, last_synced_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(repo.id)
    .bind(&repo.name)
    .bind(&repo.description)
    .bind(&repo.html_url)
    .bind(&repo.language)
    .bind(repo.stargazers_count)
    .bind(repo.forks_count)
    .bind(repo.open_issues_count)
    .bind(repo.private)
    .bind(&repo.default_branch)
    .bind(repo.pushed_at)
    .fetch_one(executor)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM github_repos WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
