use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::{GithubClient, RemoteRepo};
use crate::db;
use crate::error::AppError;
use crate::models::GithubRepo;

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOp {
    Insert(RemoteRepo),
    Update(Uuid, RemoteRepo),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
}

/// Match each remote repository to a local row by `full_name`. Matches become
/// unconditional updates, everything else an insert.
pub fn plan_upsert(existing: &[GithubRepo], remote: Vec<RemoteRepo>) -> Vec<UpsertOp> {
    remote
        .into_iter()
        .map(|repo| {
            match existing.iter().find(|local| local.full_name == repo.full_name) {
                Some(local) => UpsertOp::Update(local.id, repo),
                None => UpsertOp::Insert(repo),
            }
        })
        .collect()
}

/// Pull the remote listing and upsert it. The listing is fetched before any
/// write and all writes share one transaction, so a failure leaves the local
/// table untouched.
pub async fn sync(pool: &PgPool, client: &GithubClient) -> Result<SyncSummary, AppError> {
    let remote = client.list_repos().await?;
    let mut summary = SyncSummary {
        fetched: remote.len(),
        ..Default::default()
    };

    let mut tx = pool.begin().await?;
    let existing = db::github_repos::list_all(&mut *tx).await?;

    for op in plan_upsert(&existing, remote) {
        match op {
            UpsertOp::Insert(repo) => {
                db::github_repos::insert(&mut *tx, &repo).await?;
                summary.created += 1;
            }
            UpsertOp::Update(id, repo) => {
                db::github_repos::update(&mut *tx, id, &repo).await?;
                summary.updated += 1;
            }
        }
    }

    tx.commit().await?;

    tracing::info!(
        fetched = summary.fetched,
        created = summary.created,
        updated = summary.updated,
        "GitHub sync finished"
    );

    Ok(summary)
}
