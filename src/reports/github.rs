use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{count_by, Markdown, ReportError, ReportGenerator, ReportParams};
use crate::db;
use crate::models::GithubRepo;

pub struct GithubActivityReport;

#[async_trait]
impl ReportGenerator for GithubActivityReport {
    fn id(&self) -> &str {
        "github-activity"
    }

    fn name(&self) -> &str {
        "GitHub Activity"
    }

    fn description(&self) -> &str {
        "Synced repositories by language, stars, forks and open issues"
    }

    async fn generate(&self, pool: &PgPool, params: &ReportParams) -> Result<String, ReportError> {
        let repos = db::github_repos::list_all(pool).await?;
        Ok(render_github_activity(&repos, params, Utc::now()))
    }
}

pub fn render_github_activity(
    repos: &[GithubRepo],
    params: &ReportParams,
    now: DateTime<Utc>,
) -> String {
    // The period applies to last push, not to when the row was synced
    let repos: Vec<GithubRepo> = repos
        .iter()
        .filter(|r| match (params.period_days, r.pushed_at) {
            (None, _) => true,
            (Some(_), Some(pushed)) => params.includes(pushed, now),
            (Some(_), None) => false,
        })
        .cloned()
        .collect();

    let total_stars: i64 = repos.iter().map(|r| r.stars as i64).sum();
    let total_forks: i64 = repos.iter().map(|r| r.forks as i64).sum();
    let total_issues: i64 = repos.iter().map(|r| r.open_issues as i64).sum();
    let private = repos.iter().filter(|r| r.is_private).count();

    let mut doc = Markdown::new("GitHub Activity Report", params, now);

    doc.section("Overview")
        .bullet(format!("Repositories: {}", repos.len()))
        .bullet(format!("Private: {private}, public: {}", repos.len() - private))
        .bullet(format!("Total stars: {total_stars}"))
        .bullet(format!("Total forks: {total_forks}"))
        .bullet(format!("Open issues: {total_issues}"));

    doc.section("By Language").counts(
        &count_by(&repos, |r| {
            r.language.clone().unwrap_or_else(|| "Unknown".to_string())
        }),
        repos.len(),
    );

    let mut by_stars: Vec<&GithubRepo> = repos.iter().collect();
    by_stars.sort_by(|a, b| b.stars.cmp(&a.stars).then_with(|| a.full_name.cmp(&b.full_name)));

    doc.section(&format!("Top {} by Stars", params.top_n));
    if by_stars.is_empty() {
        doc.bullet("No repositories synced");
    }
    for (rank, repo) in by_stars.iter().take(params.top_n).enumerate() {
        doc.line(format!(
            "{}. {} ({} stars, {} forks)",
            rank + 1,
            repo.full_name,
            repo.stars,
            repo.forks
        ));
    }

    let mut by_issues: Vec<&GithubRepo> = repos.iter().filter(|r| r.open_issues > 0).collect();
    by_issues.sort_by(|a, b| {
        b.open_issues
            .cmp(&a.open_issues)
            .then_with(|| a.full_name.cmp(&b.full_name))
    });

    doc.section("Most Open Issues");
    if by_issues.is_empty() {
        doc.bullet("None");
    }
    for repo in by_issues.iter().take(params.top_n) {
        doc.bullet(format!("{}: {} open", repo.full_name, repo.open_issues));
    }

    doc.finish()
}
