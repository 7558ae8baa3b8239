//! Tier scheduling: the periodic collection loops and their lifecycle.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::{AgentConfig, IntervalsConfig};

use super::aggregator::Aggregator;
use super::envelope::{Envelope, Tier};
use super::transport::Transporter;

/// Cadence of the offline backlog report.
const BACKLOG_REPORT_INTERVAL_MS: u64 = 60_000;

/// Drives one collection task per tier plus a backlog reporter.
/// Ticks that overrun their interval delay the next tick instead of
/// bursting to catch up.
pub struct Scheduler {
    aggregator: Arc<Aggregator>,
    transporter: Arc<Transporter>,
    device_id: String,
    intervals: IntervalsConfig,
    tasks: Vec<JoinHandle<()>>,
    running: bool,
}

impl Scheduler {
    pub fn new(config: &AgentConfig, aggregator: Aggregator, transporter: Transporter) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            transporter: Arc::new(transporter),
            device_id: config.device_id.clone(),
            intervals: config.intervals.clone(),
            tasks: Vec::new(),
            running: false,
        }
    }

    /// Collect and send one round for every tier, then spawn the
    /// periodic tasks. Calling this on a running scheduler is a
    /// logged no-op.
    pub async fn start(&mut self) {
        if self.running {
            warn!("Scheduler already running");
            return;
        }
        self.running = true;

        join_all(Tier::ALL.iter().map(|tier| {
            run_tick(
                Arc::clone(&self.aggregator),
                Arc::clone(&self.transporter),
                self.device_id.clone(),
                *tier,
            )
        }))
        .await;

        for tier in Tier::ALL {
            let aggregator = Arc::clone(&self.aggregator);
            let transporter = Arc::clone(&self.transporter);
            let device_id = self.device_id.clone();
            let period = period_for(&self.intervals, tier);

            self.tasks.push(tokio::spawn(async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick fires immediately; the initial round
                // above already covered it.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    run_tick(
                        Arc::clone(&aggregator),
                        Arc::clone(&transporter),
                        device_id.clone(),
                        tier,
                    )
                    .await;
                }
            }));
        }

        let reporter = self.spawn_backlog_reporter();
        self.tasks.push(reporter);

        info!(
            "Scheduler started (high {}ms, medium {}ms, low {}ms)",
            self.intervals.high_ms, self.intervals.medium_ms, self.intervals.low_ms
        );
    }

    /// Abort all periodic tasks. An in-flight tick is abandoned; no
    /// new tick starts once this returns.
    pub fn stop(&mut self) {
        if !self.running {
            warn!("Scheduler is not running");
            return;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.running = false;
        info!("Scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn spawn_backlog_reporter(&self) -> JoinHandle<()> {
        let transporter = Arc::clone(&self.transporter);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(BACKLOG_REPORT_INTERVAL_MS));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let queued = transporter.buffer_len().await;
                if queued > 0 {
                    info!("Offline buffer backlog: {} envelopes", queued);
                }
            }
        })
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

fn period_for(intervals: &IntervalsConfig, tier: Tier) -> Duration {
    let ms = match tier {
        Tier::High => intervals.high_ms,
        Tier::Medium => intervals.medium_ms,
        Tier::Low => intervals.low_ms,
    };
    Duration::from_millis(ms)
}

/// One collection round for one tier: probe, wrap, deliver.
async fn run_tick(
    aggregator: Arc<Aggregator>,
    transporter: Arc<Transporter>,
    device_id: String,
    tier: Tier,
) {
    let data = aggregator.collect(tier).await;
    let envelope = Envelope::new(device_id, tier, data);
    if !transporter.send(envelope).await {
        warn!("{} collection round failed to deliver", tier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> AgentConfig {
        let mut config = AgentConfig::default();
        config.dry_run = true;
        config.max_processes = 5;
        // Long enough that no periodic tick fires during a test.
        config.intervals = IntervalsConfig {
            high_ms: 3_600_000,
            medium_ms: 3_600_000,
            low_ms: 3_600_000,
        };
        config
    }

    fn build_scheduler(config: &AgentConfig) -> Scheduler {
        let aggregator = Aggregator::new(config);
        let transporter = Transporter::new(config).unwrap();
        Scheduler::new(config, aggregator, transporter)
    }

    #[test]
    fn test_period_for_matches_tier() {
        let intervals = IntervalsConfig {
            high_ms: 5000,
            medium_ms: 60_000,
            low_ms: 300_000,
        };
        assert_eq!(period_for(&intervals, Tier::High), Duration::from_secs(5));
        assert_eq!(period_for(&intervals, Tier::Medium), Duration::from_secs(60));
        assert_eq!(period_for(&intervals, Tier::Low), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_start_and_stop_lifecycle() {
        let config = quiet_config();
        let mut scheduler = build_scheduler(&config);

        assert!(!scheduler.is_running());
        scheduler.start().await;
        assert!(scheduler.is_running());

        scheduler.stop();
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let config = quiet_config();
        let mut scheduler = build_scheduler(&config);

        scheduler.start().await;
        scheduler.start().await;
        assert!(scheduler.is_running());
        scheduler.stop();
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let config = quiet_config();
        let mut scheduler = build_scheduler(&config);

        scheduler.stop();
        assert!(!scheduler.is_running());
    }
}
