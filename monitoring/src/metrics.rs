//! Validation metrics ring buffer
//!
//! Ingests every validation attempt through an mpsc channel so the
//! validation hot path only ever does a `try_send`; an unbounded blocking
//! lock here is the one thing this design must avoid. A collector task owns
//! the append side of a bounded ring buffer (oldest dropped past capacity),
//! readers take a short read lock for aggregation. Process-lifetime only,
//! nothing is persisted.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use common::{AggregatedMetrics, ValidationMetricsRecord};
use prometheus::{IntCounter, Registry};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Ring buffer capacity; oldest records dropped beyond this
    pub capacity: usize,
    /// Ingest channel depth; overflow is dropped by the sender
    pub channel_buffer: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000,
            channel_buffer: 256,
        }
    }
}

struct Counters {
    validations_total: IntCounter,
    failures_total: IntCounter,
    alerts_total: IntCounter,
    fatal_alerts_total: IntCounter,
}

impl Counters {
    fn register(registry: &Registry) -> Result<Self> {
        let validations_total =
            IntCounter::new("veritas_validations_total", "Validation attempts ingested")?;
        let failures_total =
            IntCounter::new("veritas_validation_failures_total", "Validations not marked valid")?;
        let alerts_total = IntCounter::new("veritas_alerts_total", "Alerts raised by validators")?;
        let fatal_alerts_total =
            IntCounter::new("veritas_fatal_alerts_total", "Fatal alerts raised")?;

        registry
            .register(Box::new(validations_total.clone()))
            .context("Failed to register validations counter")?;
        registry.register(Box::new(failures_total.clone()))?;
        registry.register(Box::new(alerts_total.clone()))?;
        registry.register(Box::new(fatal_alerts_total.clone()))?;

        Ok(Self {
            validations_total,
            failures_total,
            alerts_total,
            fatal_alerts_total,
        })
    }
}

/// Owns the metrics ring buffer and its ingest task
pub struct ValidationMonitor {
    config: MonitorConfig,
    buffer: Arc<RwLock<VecDeque<ValidationMetricsRecord>>>,
    registry: Registry,
    counters: Counters,
}

impl ValidationMonitor {
    pub fn new(config: MonitorConfig) -> Result<Self> {
        let registry = Registry::new();
        let counters = Counters::register(&registry)?;
        Ok(Self {
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(config.capacity))),
            config,
            registry,
            counters,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(MonitorConfig::default())
    }

    /// Spawn the ingest task and return the sender handed to the
    /// orchestrator as its metrics sink
    pub fn sink(&self) -> mpsc::Sender<ValidationMetricsRecord> {
        let (tx, mut rx) = mpsc::channel::<ValidationMetricsRecord>(self.config.channel_buffer);
        let buffer = self.buffer.clone();
        let capacity = self.config.capacity;
        let validations = self.counters.validations_total.clone();
        let failures = self.counters.failures_total.clone();
        let alerts = self.counters.alerts_total.clone();
        let fatals = self.counters.fatal_alerts_total.clone();

        tokio::spawn(async move {
            info!("Metrics collector started (capacity {})", capacity);
            while let Some(record) = rx.recv().await {
                validations.inc();
                if !record.success {
                    failures.inc();
                }
                alerts.inc_by(record.alert_count as u64);
                fatals.inc_by(record.fatal_count as u64);

                let mut buffer = buffer.write().await;
                if buffer.len() == capacity {
                    buffer.pop_front();
                }
                buffer.push_back(record);
            }
            debug!("Metrics collector stopped");
        });

        tx
    }

    /// Aggregate counters over the trailing window
    pub async fn aggregate(&self, window: Duration) -> AggregatedMetrics {
        let cutoff = Utc::now()
            - ChronoDuration::from_std(window).unwrap_or_else(|_| ChronoDuration::hours(1));
        let buffer = self.buffer.read().await;

        let recent: Vec<&ValidationMetricsRecord> =
            buffer.iter().filter(|r| r.timestamp >= cutoff).collect();
        if recent.is_empty() {
            return AggregatedMetrics::default();
        }

        let total = recent.len() as u64;
        let successes = recent.iter().filter(|r| r.success).count() as u64;
        let alert_count: u64 = recent.iter().map(|r| r.alert_count as u64).sum();
        let fatal_count: u64 = recent.iter().map(|r| r.fatal_count as u64).sum();
        let with_fatal = recent.iter().filter(|r| r.fatal_count > 0).count() as u64;

        AggregatedMetrics {
            total_validations: total,
            success_rate: successes as f64 / total as f64,
            avg_duration_ms: recent.iter().map(|r| r.duration_ms as f64).sum::<f64>()
                / total as f64,
            avg_confidence: recent.iter().map(|r| r.confidence).sum::<f64>() / total as f64,
            alert_count,
            fatal_count,
            error_rate: (total - successes) as f64 / total as f64,
            fatal_rate: with_fatal as f64 / total as f64,
            window_start: recent.iter().map(|r| r.timestamp).min(),
            window_end: recent.iter().map(|r| r.timestamp).max(),
        }
    }

    /// Most recent records, newest first
    pub async fn recent(&self, limit: usize) -> Vec<ValidationMetricsRecord> {
        let buffer = self.buffer.read().await;
        buffer.iter().rev().take(limit).cloned().collect()
    }

    /// Prometheus exposition of the operational counters
    pub fn prometheus_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut out = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut out)
            .context("Failed to encode metrics")?;
        String::from_utf8(out).context("Metrics were not valid UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(success: bool, confidence: f64, fatal: u32) -> ValidationMetricsRecord {
        ValidationMetricsRecord {
            symbol: "BTC".into(),
            success,
            duration_ms: 40,
            confidence,
            alert_count: if success { 0 } else { 2 },
            fatal_count: fatal,
            timestamp: Utc::now(),
        }
    }

    async fn drain(monitor: &ValidationMonitor, expected: u64) {
        // The collector task runs concurrently; poll briefly until it has
        // ingested everything we sent.
        for _ in 0..50 {
            if monitor.aggregate(Duration::from_secs(3600)).await.total_validations == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("collector never ingested {} records", expected);
    }

    #[tokio::test]
    async fn aggregates_over_ingested_records() {
        let monitor = ValidationMonitor::with_defaults().unwrap();
        let sink = monitor.sink();

        sink.send(record(true, 90.0, 0)).await.unwrap();
        sink.send(record(true, 80.0, 0)).await.unwrap();
        sink.send(record(false, 20.0, 1)).await.unwrap();
        drain(&monitor, 3).await;

        let agg = monitor.aggregate(Duration::from_secs(3600)).await;
        assert_eq!(agg.total_validations, 3);
        assert!((agg.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((agg.avg_confidence - 190.0 / 3.0).abs() < 1e-9);
        assert_eq!(agg.fatal_count, 1);
        assert!((agg.fatal_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn ring_buffer_drops_oldest_past_capacity() {
        let monitor = ValidationMonitor::new(MonitorConfig {
            capacity: 5,
            channel_buffer: 64,
        })
        .unwrap();
        let sink = monitor.sink();

        for i in 0..8u64 {
            let mut r = record(true, i as f64, 0);
            r.duration_ms = i;
            sink.send(r).await.unwrap();
        }
        // Capacity is 5, so only the newest 5 survive. Poll until the last
        // record sent has landed.
        for _ in 0..50 {
            if monitor.recent(1).await.first().map(|r| r.duration_ms) == Some(7) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let recent = monitor.recent(10).await;
        assert_eq!(recent.len(), 5);
        assert_eq!(recent.first().unwrap().duration_ms, 7);
        assert_eq!(recent.last().unwrap().duration_ms, 3);
    }

    #[tokio::test]
    async fn empty_window_aggregates_to_default() {
        let monitor = ValidationMonitor::with_defaults().unwrap();
        let agg = monitor.aggregate(Duration::from_secs(3600)).await;
        assert_eq!(agg, AggregatedMetrics::default());
    }

    #[tokio::test]
    async fn prometheus_counters_track_ingest() {
        let monitor = ValidationMonitor::with_defaults().unwrap();
        let sink = monitor.sink();
        sink.send(record(false, 10.0, 2)).await.unwrap();
        drain(&monitor, 1).await;

        let text = monitor.prometheus_text().unwrap();
        assert!(text.contains("veritas_validations_total 1"));
        assert!(text.contains("veritas_fatal_alerts_total 2"));
    }
}
