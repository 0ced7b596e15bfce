//! Status-change detection: probe each target, compare with the stored
//! status, persist, and notify on notable changes.

pub mod policy;
pub mod prober;
pub mod runner;

pub use policy::should_notify;
pub use prober::{HttpProber, ProbeError, ProbeOutcome};
pub use runner::{CheckError, CheckOutcome, RunSummary, StatusMonitor};
