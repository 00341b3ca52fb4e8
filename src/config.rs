use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use ipnet::IpNet;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub max_body_size: usize,
    pub trusted_proxies: Vec<IpNet>,
    pub dev_auth: bool,
    pub report_dir: PathBuf,
    pub worker_count: usize,
    pub audit_page_size: i64,
    pub github: GithubConfig,
    pub email: EmailSimulationConfig,
    pub log_level: String,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub api_url: String,
    pub token: Option<String>,
}

/// Timings for the simulated transport used when no SMTP relay is configured.
#[derive(Debug, Clone)]
pub struct EmailSimulationConfig {
    pub send_delay: Duration,
    pub open_delay_max: Duration,
    pub open_rate: f64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let jwt_secret = env_required("JWT_SECRET")?;

        let host: IpAddr = env_or("WISHDESK_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid WISHDESK_HOST: {e}"))?;

        let port: u16 = env_or("WISHDESK_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid WISHDESK_PORT: {e}"))?;

        let max_body_size: usize = env_or("WISHDESK_MAX_BODY_SIZE", "1048576")
            .parse()
            .map_err(|e| format!("Invalid WISHDESK_MAX_BODY_SIZE: {e}"))?;

        let trusted_proxies: Vec<IpNet> = env_or("WISHDESK_TRUSTED_PROXIES", "")
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.trim()
                    .parse()
                    .map_err(|e| format!("Invalid WISHDESK_TRUSTED_PROXIES entry '{s}': {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let dev_auth = matches!(
            env_or("WISHDESK_DEV_AUTH", "false").to_lowercase().as_str(),
            "1" | "true" | "yes"
        );

        let report_dir = PathBuf::from(env_or("WISHDESK_REPORT_DIR", "./data/reports"));

        let worker_count: usize = env_or("WISHDESK_WORKER_COUNT", "2")
            .parse()
            .map_err(|e| format!("Invalid WISHDESK_WORKER_COUNT: {e}"))?;

        let audit_page_size: i64 = env_or("WISHDESK_AUDIT_PAGE_SIZE", "50")
            .parse()
            .map_err(|e| format!("Invalid WISHDESK_AUDIT_PAGE_SIZE: {e}"))?;

        let github = GithubConfig {
            api_url: env_or("GITHUB_API_URL", "https://api.github.com"),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
        };

        let email = EmailSimulationConfig {
            send_delay: Duration::from_millis(env_millis("WISHDESK_EMAIL_SEND_DELAY_MS", "2000")?),
            open_delay_max: Duration::from_millis(env_millis(
                "WISHDESK_EMAIL_OPEN_DELAY_MAX_MS",
                "10000",
            )?),
            open_rate: env_or("WISHDESK_EMAIL_OPEN_RATE", "0.7")
                .parse::<f64>()
                .map_err(|e| format!("Invalid WISHDESK_EMAIL_OPEN_RATE: {e}"))?
                .clamp(0.0, 1.0),
        };

        let log_level = env_or("WISHDESK_LOG_LEVEL", "info");

        let smtp = match (
            std::env::var("WISHDESK_SMTP_HOST").ok(),
            std::env::var("WISHDESK_SMTP_PORT").ok(),
            std::env::var("WISHDESK_SMTP_USER").ok(),
            std::env::var("WISHDESK_SMTP_PASS").ok(),
            std::env::var("WISHDESK_SMTP_FROM").ok(),
        ) {
            (Some(host), Some(port), Some(user), Some(pass), Some(from)) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e| format!("Invalid WISHDESK_SMTP_PORT: {e}"))?,
                user,
                pass,
                from,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            max_body_size,
            trusted_proxies,
            dev_auth,
            report_dir,
            worker_count: worker_count.max(1),
            audit_page_size: audit_page_size.clamp(1, 500),
            github,
            email,
            log_level,
            smtp,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_millis(key: &str, default: &str) -> Result<u64, String> {
    env_or(key, default)
        .parse()
        .map_err(|e| format!("Invalid {key}: {e}"))
}
