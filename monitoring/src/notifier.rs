//! Alert notification pipeline
//!
//! Per-alert state machine: raised -> queued-for-notification -> sent, or
//! failed-to-send after a small fixed number of retries, then logged and
//! dropped. Delivery is a best-effort side effect running in its own task;
//! it never blocks or fails a validation call. Fatal alerts are handed to
//! the durable review store before any delivery attempt, so a broken SMTP
//! relay cannot lose them.

use crate::review::FatalAlertStore;
use crate::rules::MonitorFinding;
use anyhow::{Context, Result};
use async_trait::async_trait;
use common::ValidationAlert;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

/// Delivery lifecycle for one alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryState {
    Raised,
    QueuedForNotification,
    Sent,
    FailedToSend,
}

/// What actually goes out on a channel
#[derive(Debug, Clone)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl From<&ValidationAlert> for Notification {
    fn from(alert: &ValidationAlert) -> Self {
        Self {
            subject: format!("[veritas:{}] {} alert", alert.domain, alert.severity),
            body: format!(
                "{}\n\nSources: {}\nRecommendation: {}\nAlert ID: {}\nRaised: {}",
                alert.message,
                alert.affected_sources.join(", "),
                alert.recommendation,
                alert.id,
                alert.timestamp
            ),
        }
    }
}

impl From<&MonitorFinding> for Notification {
    fn from(finding: &MonitorFinding) -> Self {
        Self {
            subject: format!("[veritas:ops] {} rule breached", finding.rule),
            body: format!(
                "{}\n\nValue: {:.4}\nThreshold: {:.4}\nAt: {}",
                finding.message, finding.value, finding.threshold, finding.timestamp
            ),
        }
    }
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// SMTP delivery to the fixed operational address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    pub from: String,
    /// Fixed operations address; alerts are never routed per-symbol
    pub to: String,
}

pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailChannel {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .context("Invalid SMTP relay host")?;
        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from.parse().context("Invalid from address")?,
            to: config.to.parse().context("Invalid to address")?,
        })
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(notification.subject.clone())
            .body(notification.body.clone())
            .context("Failed to build email")?;

        self.transport
            .send(email)
            .await
            .context("SMTP delivery failed")?;
        Ok(())
    }
}

/// Log-only channel for tests and environments without SMTP
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        info!("NOTIFY {} | {}", notification.subject, notification.body.replace('\n', " "));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Redelivery attempts after the first failure
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Ingest channel depth fed by the orchestrator
    pub channel_buffer: usize,
    /// How many recent alerts the dashboard surface keeps
    pub active_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            channel_buffer: 64,
            active_capacity: 100,
        }
    }
}

pub struct AlertNotifier {
    config: NotifierConfig,
    channel: Arc<dyn NotificationChannel>,
    review: Option<Arc<dyn FatalAlertStore>>,
    active: Arc<RwLock<VecDeque<ValidationAlert>>>,
}

impl AlertNotifier {
    pub fn new(config: NotifierConfig, channel: Arc<dyn NotificationChannel>) -> Self {
        Self {
            config,
            channel,
            review: None,
            active: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    /// Persist fatal alerts for the human-review workflow, decoupled from
    /// in-process notification
    pub fn with_review_store(mut self, store: Arc<dyn FatalAlertStore>) -> Self {
        self.review = Some(store);
        self
    }

    /// Recent alerts for the read-only metrics surface, newest first
    pub async fn active_alerts(&self) -> Vec<ValidationAlert> {
        self.active.read().await.iter().rev().cloned().collect()
    }

    /// Spawn the delivery task; the returned sender is the orchestrator's
    /// alert sink
    pub fn spawn(&self) -> mpsc::Sender<ValidationAlert> {
        let (tx, mut rx) = mpsc::channel::<ValidationAlert>(self.config.channel_buffer);
        let channel = self.channel.clone();
        let review = self.review.clone();
        let active = self.active.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            info!("Alert notifier started");
            while let Some(alert) = rx.recv().await {
                debug!("Alert {} {:?}", alert.id, DeliveryState::Raised);

                {
                    let mut active = active.write().await;
                    if active.len() == config.active_capacity {
                        active.pop_front();
                    }
                    active.push_back(alert.clone());
                }

                // Durable record first: the review workflow must survive a
                // dead notification channel.
                if alert.is_fatal() {
                    if let Some(store) = &review {
                        if let Err(e) = store.persist(&alert).await {
                            error!("Failed to persist fatal alert {}: {}", alert.id, e);
                        }
                    }
                }

                let state = deliver_with_retries(
                    channel.as_ref(),
                    &Notification::from(&alert),
                    config.max_retries,
                    config.retry_delay,
                )
                .await;

                match state {
                    DeliveryState::Sent => debug!("Alert {} sent", alert.id),
                    DeliveryState::FailedToSend => {
                        // Logged and dropped; never surfaced to the caller.
                        error!(
                            "Alert {} dropped after {} retries",
                            alert.id, config.max_retries
                        );
                    }
                    _ => unreachable!("delivery ends in a terminal state"),
                }
            }
            debug!("Alert notifier stopped");
        });

        tx
    }

    /// One-shot delivery for operational rule findings
    pub fn notify_finding(&self, finding: &MonitorFinding) {
        let channel = self.channel.clone();
        let notification = Notification::from(finding);
        let max_retries = self.config.max_retries;
        let retry_delay = self.config.retry_delay;

        tokio::spawn(async move {
            let state =
                deliver_with_retries(channel.as_ref(), &notification, max_retries, retry_delay)
                    .await;
            if state == DeliveryState::FailedToSend {
                error!("Operational finding dropped: {}", notification.subject);
            }
        });
    }
}

/// Queued -> Sent | FailedToSend with bounded redelivery
async fn deliver_with_retries(
    channel: &dyn NotificationChannel,
    notification: &Notification,
    max_retries: u32,
    retry_delay: Duration,
) -> DeliveryState {
    let mut state = DeliveryState::QueuedForNotification;
    for attempt in 0..=max_retries {
        match channel.deliver(notification).await {
            Ok(()) => {
                state = DeliveryState::Sent;
                break;
            }
            Err(e) => {
                warn!(
                    "Delivery attempt {} failed for '{}': {}",
                    attempt + 1,
                    notification.subject,
                    e
                );
                state = DeliveryState::FailedToSend;
                if attempt < max_retries {
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::InMemoryFatalAlertStore;
    use anyhow::anyhow;
    use common::{Domain, Severity};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` deliveries, then succeeds
    struct FlakyChannel {
        failures: u32,
        attempts: AtomicU32,
        delivered: Arc<RwLock<Vec<Notification>>>,
    }

    impl FlakyChannel {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                attempts: AtomicU32::new(0),
                delivered: Arc::new(RwLock::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl NotificationChannel for FlakyChannel {
        async fn deliver(&self, notification: &Notification) -> Result<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(anyhow!("smtp 451, try again"));
            }
            self.delivered.write().await.push(notification.clone());
            Ok(())
        }
    }

    fn alert(severity: Severity) -> ValidationAlert {
        ValidationAlert::new(severity, Domain::Social, "sentiment mismatch")
            .with_sources(vec!["lunarcrush".into()])
            .with_recommendation("review provider")
    }

    fn fast_config() -> NotifierConfig {
        NotifierConfig {
            max_retries: 3,
            retry_delay: Duration::from_millis(1),
            channel_buffer: 8,
            active_capacity: 100,
        }
    }

    #[tokio::test]
    async fn delivery_succeeds_after_transient_failures() {
        let channel = Arc::new(FlakyChannel::new(2));
        let state = deliver_with_retries(
            channel.as_ref(),
            &Notification::from(&alert(Severity::Warning)),
            3,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(state, DeliveryState::Sent);
        assert_eq!(channel.delivered.read().await.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_end_in_failed_to_send() {
        let channel = FlakyChannel::new(10);
        let state = deliver_with_retries(
            &channel,
            &Notification::from(&alert(Severity::Warning)),
            3,
            Duration::from_millis(1),
        )
        .await;

        // 1 attempt + 3 retries, then dropped.
        assert_eq!(state, DeliveryState::FailedToSend);
        assert_eq!(channel.attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn fatal_alerts_are_persisted_before_delivery() {
        let store = Arc::new(InMemoryFatalAlertStore::new());
        let notifier = AlertNotifier::new(fast_config(), Arc::new(LogChannel))
            .with_review_store(store.clone());
        let tx = notifier.spawn();

        let fatal = alert(Severity::Fatal);
        tx.send(fatal.clone()).await.unwrap();

        // Give the delivery task a moment.
        for _ in 0..50 {
            if !store.pending().await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let pending = store.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        // Immutable once emitted: persisted verbatim.
        assert_eq!(pending[0].alert, fatal);
        assert_eq!(notifier.active_alerts().await.len(), 1);
    }

    #[tokio::test]
    async fn non_fatal_alerts_skip_the_review_store() {
        let store = Arc::new(InMemoryFatalAlertStore::new());
        let notifier = AlertNotifier::new(fast_config(), Arc::new(LogChannel))
            .with_review_store(store.clone());
        let tx = notifier.spawn();

        tx.send(alert(Severity::Warning)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.pending().await.unwrap().is_empty());
        assert_eq!(notifier.active_alerts().await.len(), 1);
    }

    #[test]
    fn notification_carries_alert_context() {
        let notification = Notification::from(&alert(Severity::Fatal));
        assert!(notification.subject.contains("fatal"));
        assert!(notification.subject.contains("social"));
        assert!(notification.body.contains("lunarcrush"));
    }
}
