//! Monitoring subsystem for the validation pipeline
//!
//! Side channel fed by the orchestrator, never in its hot path:
//! - Every validation attempt lands in a bounded in-memory ring buffer
//! - A fixed rule set over the recent window decides operational health
//! - Alerts move through a raised -> queued -> sent/failed state machine
//!   with bounded retries; fatal alerts are additionally persisted for a
//!   human-review workflow

pub mod metrics;
pub mod notifier;
pub mod review;
pub mod rules;

pub use metrics::{MonitorConfig, ValidationMonitor};
pub use notifier::{
    AlertNotifier, DeliveryState, EmailChannel, EmailConfig, LogChannel, Notification,
    NotificationChannel, NotifierConfig,
};
pub use review::{
    FatalAlertStore, InMemoryFatalAlertStore, PgFatalAlertStore, ReviewRecord, ReviewStatus,
};
pub use rules::{HealthStatus, MonitorFinding, RuleConfig, RuleEngine};

// Re-export from common
pub use common::{AggregatedMetrics, ValidationAlert, ValidationMetricsRecord};
