//! Remote administrative command channel.

use std::sync::Arc;
use tracing::{debug, info, warn};
use wisp_core::authority::{CommandResult, RemoteCommand};
use wisp_core::license::PlanType;
use wisp_core::ports::{AuthorityApi, LicenseRepository};
use wisp_core::Result;

use crate::gate::SuspensionCache;
use crate::heartbeat::HeartbeatService;

/// Polls the authority for pending commands and executes them.
///
/// Every command is acknowledged back with a result keyed by its id, so the
/// authority can detect undelivered or unexecuted commands. Execution is
/// idempotent against the current license state: re-delivering a `block` to
/// an already-suspended installation is a no-op that still acknowledges.
pub struct CommandChannel {
    repo: Arc<dyn LicenseRepository>,
    authority: Arc<dyn AuthorityApi>,
    heartbeat: Arc<HeartbeatService>,
    cache: Arc<SuspensionCache>,
}

impl CommandChannel {
    pub fn new(
        repo: Arc<dyn LicenseRepository>,
        authority: Arc<dyn AuthorityApi>,
        heartbeat: Arc<HeartbeatService>,
        cache: Arc<SuspensionCache>,
    ) -> Self {
        Self {
            repo,
            authority,
            heartbeat,
            cache,
        }
    }

    /// One poll cycle: fetch, execute, acknowledge. Returns the number of
    /// commands processed.
    pub async fn poll_once(&self) -> Result<usize> {
        let Some(record) = self.repo.current().await? else {
            return Ok(0);
        };
        if record.plan_type == PlanType::Master {
            return Ok(0);
        }

        let commands = self.authority.pending_commands(&record.license_key).await?;
        if commands.is_empty() {
            return Ok(0);
        }
        debug!(count = commands.len(), "Processing pending remote commands");

        let mut processed = 0;
        for command in &commands {
            let result = self.execute(command).await;
            if let Err(e) = self
                .authority
                .report_command_result(&command.id, &result)
                .await
            {
                warn!(command_id = %command.id, error = %e, "Failed to acknowledge command");
            }
            processed += 1;
        }
        Ok(processed)
    }

    async fn execute(&self, command: &RemoteCommand) -> CommandResult {
        info!(command_id = %command.id, command = %command.command, "Executing remote command");
        match command.command.as_str() {
            "heartbeat" => match self.heartbeat.force_heartbeat().await {
                Ok(_) => CommandResult::ok("heartbeat sent"),
                Err(e) => CommandResult::failed(e.to_string()),
            },
            "block" => {
                let reason = command
                    .parameters
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Blocked by licensing authority")
                    .to_string();
                match self.apply_block(reason).await {
                    Ok(applied) => {
                        if applied {
                            CommandResult::ok("installation blocked")
                        } else {
                            CommandResult::ok("already suspended")
                        }
                    }
                    Err(e) => CommandResult::failed(e.to_string()),
                }
            }
            "unblock" => match self.apply_unblock().await {
                Ok(applied) => {
                    if applied {
                        CommandResult::ok("installation unblocked")
                    } else {
                        CommandResult::ok("already active")
                    }
                }
                Err(e) => CommandResult::failed(e.to_string()),
            },
            "message" => {
                let text = command
                    .parameters
                    .get("message")
                    .or_else(|| command.parameters.get("text"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                info!(message = %text, "Operator message from licensing authority");
                CommandResult::ok("message delivered")
            }
            // Acknowledged but deliberately not implemented.
            "restart" | "collect_logs" => CommandResult::unsupported(&command.command),
            other => CommandResult::unsupported(other),
        }
    }

    /// Suspend locally with the supplied reason. Returns false when the
    /// installation was already suspended.
    async fn apply_block(&self, reason: String) -> Result<bool> {
        let Some(mut record) = self.repo.current().await? else {
            return Ok(false);
        };
        if record.is_suspended() {
            return Ok(false);
        }
        record.suspend(reason);
        self.repo.update(&record).await?;
        self.cache.invalidate().await;
        Ok(true)
    }

    /// Reactivate and clear suspension metadata. Returns false when the
    /// installation was not suspended.
    async fn apply_unblock(&self) -> Result<bool> {
        let Some(mut record) = self.repo.current().await? else {
            return Ok(false);
        };
        if !record.is_suspended() {
            return Ok(false);
        }
        record.reactivate();
        self.repo.update(&record).await?;
        self.cache.invalidate().await;
        Ok(true)
    }
}
