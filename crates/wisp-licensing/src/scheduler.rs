//! Background cadences for the licensing subsystem.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use crate::commands::CommandChannel;
use crate::config::LicensingConfig;
use crate::heartbeat::HeartbeatService;

/// Runs the four independent licensing cadences: hourly heartbeat, daily
/// usage report, weekly deep re-validation, and the five-minute command
/// poll. Each tick failure is logged and the tick skipped; a failing
/// authority never terminates the host process.
pub struct LicenseScheduler {
    heartbeat: Arc<HeartbeatService>,
    commands: Arc<CommandChannel>,
    config: LicensingConfig,
}

impl LicenseScheduler {
    pub fn new(
        heartbeat: Arc<HeartbeatService>,
        commands: Arc<CommandChannel>,
        config: LicensingConfig,
    ) -> Self {
        Self {
            heartbeat,
            commands,
            config,
        }
    }

    /// Spawn all cadences. Tasks run until the shutdown channel flips true.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        info!(
            heartbeat_secs = self.config.heartbeat_interval_secs,
            metrics_secs = self.config.metrics_interval_secs,
            deep_validation_secs = self.config.deep_validation_interval_secs,
            command_poll_secs = self.config.command_poll_interval_secs,
            "Starting license scheduler"
        );

        let hourly = {
            let heartbeat = self.heartbeat.clone();
            spawn_cadence(
                "heartbeat",
                self.config.heartbeat_interval_secs,
                shutdown.clone(),
                move || {
                    let heartbeat = heartbeat.clone();
                    async move { heartbeat.run_heartbeat().await.map(|_| ()) }
                },
            )
        };

        let daily = {
            let heartbeat = self.heartbeat.clone();
            spawn_cadence(
                "usage-metrics",
                self.config.metrics_interval_secs,
                shutdown.clone(),
                move || {
                    let heartbeat = heartbeat.clone();
                    async move { heartbeat.run_metrics_report().await.map(|_| ()) }
                },
            )
        };

        let weekly = {
            let heartbeat = self.heartbeat.clone();
            spawn_cadence(
                "deep-validation",
                self.config.deep_validation_interval_secs,
                shutdown.clone(),
                move || {
                    let heartbeat = heartbeat.clone();
                    async move { heartbeat.run_deep_validation().await }
                },
            )
        };

        let poll = {
            let commands = self.commands.clone();
            spawn_cadence(
                "command-poll",
                self.config.command_poll_interval_secs,
                shutdown,
                move || {
                    let commands = commands.clone();
                    async move { commands.poll_once().await.map(|_| ()) }
                },
            )
        };

        vec![hourly, daily, weekly, poll]
    }
}

fn spawn_cadence<F, Fut>(
    name: &'static str,
    interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
    tick: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = wisp_core::Result<()>> + Send,
{
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_secs));
        // A tick still running when the next fires is skipped, not stacked.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Skip the immediate first tick; cadences start one interval in.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = tick().await {
                        error!(cadence = name, error = %e, "Scheduled licensing task failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(cadence = name, "License scheduler task shutting down");
                        break;
                    }
                }
            }
        }
    })
}
