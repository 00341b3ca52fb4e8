pub mod emails;
pub mod github;
pub mod lifecycle;
pub mod sales;
pub mod store;
pub mod tasks;

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sqlx::PgPool;

/// Characters per estimated page.
pub const CHARS_PER_PAGE: usize = 3000;

/// Longest accepted `period_days`, roughly a century.
pub const MAX_PERIOD_DAYS: i64 = 36_500;

#[derive(Debug)]
pub enum ReportError {
    InvalidParameters(String),
    UnknownType(String),
    Database(sqlx::Error),
    Storage(String),
    TimedOut,
    Panicked,
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::InvalidParameters(msg) => write!(f, "Invalid parameters: {msg}"),
            ReportError::UnknownType(id) => write!(f, "Unknown report type: {id}"),
            ReportError::Database(err) => write!(f, "Database error: {err}"),
            ReportError::Storage(msg) => write!(f, "Storage error: {msg}"),
            ReportError::TimedOut => write!(f, "Report generation timed out"),
            ReportError::Panicked => write!(f, "Report generator crashed"),
        }
    }
}

impl From<sqlx::Error> for ReportError {
    fn from(err: sqlx::Error) -> Self {
        ReportError::Database(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReportParams {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub period_days: Option<i64>,
}

fn default_top_n() -> usize {
    5
}

impl Default for ReportParams {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            period_days: None,
        }
    }
}

impl ReportParams {
    pub fn parse(value: &serde_json::Value) -> Result<Self, ReportError> {
        let mut params = if value.is_null() {
            ReportParams::default()
        } else {
            serde_json::from_value::<ReportParams>(value.clone())
                .map_err(|e| ReportError::InvalidParameters(e.to_string()))?
        };

        if params
            .period_days
            .is_some_and(|days| !(1..=MAX_PERIOD_DAYS).contains(&days))
        {
            return Err(ReportError::InvalidParameters(format!(
                "period_days must be between 1 and {MAX_PERIOD_DAYS}"
            )));
        }
        params.top_n = params.top_n.clamp(1, 50);
        Ok(params)
    }

    /// Whether `timestamp` falls inside the requested period ending at `now`.
    pub fn includes(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.period_days {
            // A window reaching past the representable range covers everything
            Some(days) => Duration::try_days(days)
                .and_then(|span| now.checked_sub_signed(span))
                .is_none_or(|start| timestamp >= start),
            None => true,
        }
    }

    pub fn period_label(&self) -> String {
        match self.period_days {
            Some(days) => format!("Last {days} days"),
            None => "All time".to_string(),
        }
    }
}

#[async_trait]
pub trait ReportGenerator: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn generate(&self, pool: &PgPool, params: &ReportParams) -> Result<String, ReportError>;
}

pub struct ReportRegistry {
    generators: HashMap<String, Arc<dyn ReportGenerator>>,
}

impl ReportRegistry {
    pub fn new() -> Self {
        Self {
            generators: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(tasks::TaskSummaryReport));
        registry.register(Arc::new(tasks::TeamProductivityReport));
        registry.register(Arc::new(github::GithubActivityReport));
        registry.register(Arc::new(emails::EmailPerformanceReport));
        registry.register(Arc::new(sales::SalesPipelineReport));
        registry
    }

    pub fn register(&mut self, generator: Arc<dyn ReportGenerator>) {
        self.generators.insert(generator.id().to_string(), generator);
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn ReportGenerator>> {
        self.generators.get(id)
    }

    /// Generators sorted by id.
    pub fn list(&self) -> Vec<&Arc<dyn ReportGenerator>> {
        let mut generators: Vec<_> = self.generators.values().collect();
        generators.sort_by(|a, b| a.id().cmp(b.id()));
        generators
    }
}

impl Default for ReportRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// `numerator / denominator * 100`, or 0 when there is nothing to divide by.
pub fn rate(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

pub fn page_count(content: &str) -> i32 {
    content.chars().count().div_ceil(CHARS_PER_PAGE) as i32
}

/// Count items per key, largest first, ties broken by key.
pub fn count_by<T, F>(items: &[T], key: F) -> Vec<(String, usize)>
where
    F: Fn(&T) -> String,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for item in items {
        *counts.entry(key(item)).or_default() += 1;
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Markdown document assembled section by section.
pub(crate) struct Markdown {
    out: String,
}

impl Markdown {
    pub(crate) fn new(title: &str, params: &ReportParams, now: DateTime<Utc>) -> Self {
        let mut out = String::new();
        let _ = writeln!(out, "# {title}");
        let _ = writeln!(out);
        let _ = writeln!(out, "Generated: {}", now.format("%Y-%m-%d %H:%M UTC"));
        let _ = writeln!(out, "Period: {}", params.period_label());
        Self { out }
    }

    pub(crate) fn section(&mut self, heading: &str) -> &mut Self {
        let _ = writeln!(self.out);
        let _ = writeln!(self.out, "## {heading}");
        let _ = writeln!(self.out);
        self
    }

    pub(crate) fn bullet(&mut self, text: impl AsRef<str>) -> &mut Self {
        let _ = writeln!(self.out, "- {}", text.as_ref());
        self
    }

    pub(crate) fn counts(&mut self, counts: &[(String, usize)], total: usize) -> &mut Self {
        if counts.is_empty() {
            return self.bullet("None");
        }
        for (key, count) in counts {
            self.bullet(format!("{key}: {count} ({:.1}%)", rate(*count, total)));
        }
        self
    }

    pub(crate) fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        let _ = writeln!(self.out, "{}", text.as_ref());
        self
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}
