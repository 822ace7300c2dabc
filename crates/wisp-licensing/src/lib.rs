//! License enforcement core for Wisp.
//!
//! A self-hosted installation periodically proves its legitimacy to the
//! remote licensing authority ("the Store"), enforces plan limits locally,
//! detects clock rollback, tolerates loss of connectivity within a bounded
//! grace period, and applies remote administrative commands.

pub mod authority;
pub mod commands;
pub mod config;
pub mod gate;
pub mod hardware;
pub mod heartbeat;
pub mod master;
pub mod scheduler;
pub mod service;
pub mod tamper;

pub use authority::HttpAuthorityClient;
pub use commands::CommandChannel;
pub use config::LicensingConfig;
pub use gate::{GateDecision, SuspensionCache, SuspensionGate};
pub use hardware::HardwareIdentity;
pub use heartbeat::HeartbeatService;
pub use master::MasterOverride;
pub use scheduler::LicenseScheduler;
pub use service::{LicenseService, LicenseSummary};
pub use tamper::{ExpirationStatus, TamperGuard};
