use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{rate, Markdown, ReportError, ReportGenerator, ReportParams};
use crate::db;
use crate::models::opportunity::{Opportunity, STAGES};

pub struct SalesPipelineReport;

#[async_trait]
impl ReportGenerator for SalesPipelineReport {
    fn id(&self) -> &str {
        "sales-pipeline"
    }

    fn name(&self) -> &str {
        "Sales Pipeline"
    }

    fn description(&self) -> &str {
        "Opportunities by stage with pipeline value, weighted forecast and win rate"
    }

    async fn generate(&self, pool: &PgPool, params: &ReportParams) -> Result<String, ReportError> {
        let opportunities = db::opportunities::list_all(pool).await?;
        Ok(render_sales_pipeline(&opportunities, params, Utc::now()))
    }
}

/// Minor units rendered as `1234.56`.
pub fn format_money(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

fn is_open(o: &Opportunity) -> bool {
    o.stage != "won" && o.stage != "lost"
}

pub fn render_sales_pipeline(
    opportunities: &[Opportunity],
    params: &ReportParams,
    now: DateTime<Utc>,
) -> String {
    let opportunities: Vec<&Opportunity> = opportunities
        .iter()
        .filter(|o| params.includes(o.created_at, now))
        .collect();

    let open: Vec<&Opportunity> = opportunities.iter().copied().filter(|o| is_open(o)).collect();
    let won = opportunities.iter().filter(|o| o.stage == "won").count();
    let lost = opportunities.iter().filter(|o| o.stage == "lost").count();

    let pipeline_value: i64 = open.iter().map(|o| o.value).sum();
    let weighted_value: i64 = open
        .iter()
        .map(|o| o.value * o.probability.clamp(0, 100) as i64 / 100)
        .sum();
    let won_value: i64 = opportunities
        .iter()
        .filter(|o| o.stage == "won")
        .map(|o| o.value)
        .sum();

    let mut doc = Markdown::new("Sales Pipeline Report", params, now);

    doc.section("Overview")
        .bullet(format!("Opportunities: {}", opportunities.len()))
        .bullet(format!("Open: {}", open.len()))
        .bullet(format!("Pipeline value: {}", format_money(pipeline_value)))
        .bullet(format!("Weighted forecast: {}", format_money(weighted_value)))
        .bullet(format!("Won value: {}", format_money(won_value)))
        .bullet(format!("Win rate: {:.1}%", rate(won, won + lost)));

    doc.section("By Stage");
    for stage in STAGES {
        let in_stage: Vec<&&Opportunity> =
            opportunities.iter().filter(|o| o.stage == *stage).collect();
        let value: i64 = in_stage.iter().map(|o| o.value).sum();
        doc.bullet(format!(
            "{stage}: {} ({})",
            in_stage.len(),
            format_money(value)
        ));
    }

    let mut largest = open.clone();
    largest.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.title.cmp(&b.title)));

    doc.section(&format!("Top {} Open Deals", params.top_n));
    if largest.is_empty() {
        doc.bullet("No open opportunities");
    }
    for (rank, o) in largest.iter().take(params.top_n).enumerate() {
        let close = o
            .expected_close
            .map(|d| format!(", closes {d}"))
            .unwrap_or_default();
        doc.line(format!(
            "{}. {} / {}: {} at {}%{close}",
            rank + 1,
            o.company,
            o.title,
            format_money(o.value),
            o.probability
        ));
    }

    doc.finish()
}
