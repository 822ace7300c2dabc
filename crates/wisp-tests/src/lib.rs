//! Test infrastructure for the Wisp licensing subsystem.

pub mod fixtures;
pub mod helpers;
