pub mod dispatcher;
pub mod templates;

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use rand::Rng;

use crate::config::{EmailSimulationConfig, SmtpConfig};

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// What the transport observed after handing the message off.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryReceipt {
    /// Time until the message counts as sent. Zero for real transports.
    pub sent_after: Duration,
    /// Set when an open event will follow this long after sending.
    pub opened_after: Option<Duration>,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    fn name(&self) -> &str;
    async fn deliver(&self, email: &OutgoingEmail) -> Result<DeliveryReceipt, String>;
}

/// Stand-in transport: reports a fixed send delay and a synthetic open for a
/// fixed share of messages. The delays are carried out by the caller, never
/// slept here.
pub struct SimulatedTransport {
    config: EmailSimulationConfig,
}

impl SimulatedTransport {
    pub fn new(config: EmailSimulationConfig) -> Self {
        Self { config }
    }

    /// Decide whether a message gets opened, and after how long.
    pub fn plan_open<R: Rng>(&self, rng: &mut R) -> Option<Duration> {
        if !roll_open(rng, self.config.open_rate) {
            return None;
        }
        let max_ms = self.config.open_delay_max.as_millis() as u64;
        Some(Duration::from_millis(rng.random_range(0..=max_ms)))
    }
}

/// True with probability `rate`.
pub fn roll_open<R: Rng>(rng: &mut R, rate: f64) -> bool {
    rng.random_bool(rate.clamp(0.0, 1.0))
}

#[async_trait]
impl EmailTransport for SimulatedTransport {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn deliver(&self, email: &OutgoingEmail) -> Result<DeliveryReceipt, String> {
        let opened_after = self.plan_open(&mut rand::rng());
        tracing::debug!(to = %email.to, opened = opened_after.is_some(), "Simulated email delivery");
        Ok(DeliveryReceipt {
            sent_after: self.config.send_delay,
            opened_after,
        })
    }
}

pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpTransport {
    pub fn new(config: &SmtpConfig) -> Result<Self, String> {
        let creds = Credentials::new(config.user.clone(), config.pass.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("SMTP error: {e}"))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl EmailTransport for SmtpTransport {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn deliver(&self, email: &OutgoingEmail) -> Result<DeliveryReceipt, String> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| format!("Invalid from address: {e}"))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|e| format!("Invalid to address: {e}"))?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| format!("Failed to build email: {e}"))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| format!("Failed to send email: {e}"))?;

        // Real opens would come from a provider callback
        Ok(DeliveryReceipt::default())
    }
}
