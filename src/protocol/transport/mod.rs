//! CAN transport layer: frame representations, 11-bit identifier filters,
//! and bus abstraction traits.
//!
//! ## Fault handling defaults
//!
//! These constants define the default fault-recovery thresholds. Both are
//! exposed as configuration through
//! [`FaultRecoveryConfig`](crate::protocol::driver::fault_recovery::FaultRecoveryConfig).

pub mod can_frame;
pub mod can_id;
pub mod traits;

/// Consecutive unacknowledged transmissions tolerated before the interface
/// is reset. The reset fires on the first error frame above this count.
///
/// A node alone on the bus never sees an acknowledgment and never reaches
/// bus-off either: the controller keeps retrying and reports a continuous
/// no-ACK stream instead.
pub const DEFAULT_NO_ACK_THRESHOLD: u8 = 10;

/// Time spent in listen-only after an interface reset before transmissions
/// are attempted again without having received anything (ms).
///
/// Every listener acknowledges frames, so a transmission that succeeds after
/// the dwell also proves the bus is usable.
pub const DEFAULT_LISTEN_ONLY_DWELL_MS: u64 = 5_000;
