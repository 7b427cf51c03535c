//! Per-interface fault state machine.
//!
//! ```text
//!            bus-off / no-ACK storm
//!   Active ─────────────────────────▶ BusOff (link cycling)
//!     ▲                                  │ reset complete
//!     │ frame received / dwell elapsed   ▼
//!     └───────────────────────────── ListenOnly
//! ```
//!
//! A lone node never reaches bus-off: its frames stay unacknowledged and the
//! controller reports a continuous no-ACK stream. Both conditions share the
//! same reset-and-retry action and there is no terminal state, so a node
//! recovers from a re-plugged bus without restarting.
use embassy_time::{Duration, Instant};

use crate::protocol::transport::can_frame::{ControllerProblem, ErrorFrame};
use crate::protocol::transport::{DEFAULT_LISTEN_ONLY_DWELL_MS, DEFAULT_NO_ACK_THRESHOLD};

//==================================================================================CONFIG
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Fault recovery tuning.
pub struct FaultRecoveryConfig {
    /// Consecutive no-ACK error frames tolerated; one more triggers a reset.
    pub no_ack_threshold: u8,
    /// Listen-only time after which sending is attempted again.
    pub listen_only_dwell: Duration,
}

impl Default for FaultRecoveryConfig {
    fn default() -> Self {
        Self {
            no_ack_threshold: DEFAULT_NO_ACK_THRESHOLD,
            listen_only_dwell: Duration::from_millis(DEFAULT_LISTEN_ONLY_DWELL_MS),
        }
    }
}

impl FaultRecoveryConfig {
    pub fn with_no_ack_threshold(mut self, threshold: u8) -> Self {
        self.no_ack_threshold = threshold;
        self
    }

    pub fn with_listen_only_dwell(mut self, dwell: Duration) -> Self {
        self.listen_only_dwell = dwell;
        self
    }
}

//==================================================================================STATE
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterfaceMode {
    Active,
    /// Sends are suppressed until traffic is seen or the dwell elapses.
    ListenOnly,
    /// Interface reset in progress.
    BusOff,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Action the interface owner must carry out.
pub enum FaultAction {
    /// Cycle the link, drop queued receptions, then call
    /// [`InterfaceFaultState::reset_complete`].
    ResetInterface,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Why the interface is being reset.
pub enum FaultCause {
    BusOff,
    NoAckStorm,
}

/// Fault state of one physical interface.
#[derive(Clone, Debug)]
pub struct InterfaceFaultState {
    config: FaultRecoveryConfig,
    mode: InterfaceMode,
    last_transition: Instant,
    consecutive_no_ack: u8,
    last_cause: Option<FaultCause>,
}

impl Default for InterfaceFaultState {
    fn default() -> Self {
        Self::new(FaultRecoveryConfig::default())
    }
}

impl InterfaceFaultState {
    pub fn new(config: FaultRecoveryConfig) -> Self {
        Self {
            config,
            mode: InterfaceMode::Active,
            last_transition: Instant::from_ticks(0),
            consecutive_no_ack: 0,
            last_cause: None,
        }
    }

    pub fn config(&self) -> &FaultRecoveryConfig {
        &self.config
    }

    pub fn mode(&self) -> InterfaceMode {
        self.mode
    }

    pub fn last_transition(&self) -> Instant {
        self.last_transition
    }

    pub fn consecutive_no_ack(&self) -> u8 {
        self.consecutive_no_ack
    }

    /// Cause of the most recent reset.
    pub fn last_cause(&self) -> Option<FaultCause> {
        self.last_cause
    }

    /// Interpret an error frame. Bus-off is checked first, then controller
    /// status, then acknowledgment.
    pub fn on_error_frame(&mut self, frame: &ErrorFrame) -> Option<FaultAction> {
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "CAN error frame: class={=u32:#x} data={:x}",
            frame.class,
            frame.data
        );

        if frame.is_bus_off() {
            #[cfg(feature = "defmt")]
            defmt::warn!("CAN interface went bus-off, resetting");
            return Some(self.begin_reset(FaultCause::BusOff));
        }

        if let Some(problem) = frame.controller_problem() {
            log_controller_problem(problem);
        }

        if frame.is_no_ack() {
            self.consecutive_no_ack = self.consecutive_no_ack.saturating_add(1);
            if self.consecutive_no_ack > self.config.no_ack_threshold {
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "{} unacknowledged transmissions, no other node on the bus? resetting",
                    self.consecutive_no_ack
                );
                self.consecutive_no_ack = 0;
                return Some(self.begin_reset(FaultCause::NoAckStorm));
            }
        } else {
            self.consecutive_no_ack = 0;
        }
        None
    }

    /// A data frame was received: the bus carries traffic again.
    pub fn on_frame_received(&mut self) {
        self.consecutive_no_ack = 0;
        if self.mode == InterfaceMode::ListenOnly {
            #[cfg(feature = "defmt")]
            defmt::info!("Traffic seen, leaving listen-only");
            self.mode = InterfaceMode::Active;
        }
    }

    /// The reset requested by [`FaultAction::ResetInterface`] finished.
    pub fn reset_complete(&mut self, now: Instant) {
        self.mode = InterfaceMode::ListenOnly;
        self.last_transition = now;
    }

    /// Whether a transmission may be attempted at `now`.
    ///
    /// Leaves listen-only once the dwell has strictly elapsed.
    pub fn permit_send(&mut self, now: Instant) -> bool {
        match self.mode {
            InterfaceMode::Active => true,
            InterfaceMode::BusOff => false,
            InterfaceMode::ListenOnly => {
                if now > self.last_transition + self.config.listen_only_dwell {
                    #[cfg(feature = "defmt")]
                    defmt::info!("Listen-only dwell elapsed, retrying transmission");
                    self.mode = InterfaceMode::Active;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Return to the initial state (used when the interface is rebuilt).
    pub fn clear(&mut self) {
        *self = Self::new(self.config);
    }

    fn begin_reset(&mut self, cause: FaultCause) -> FaultAction {
        self.mode = InterfaceMode::BusOff;
        self.last_cause = Some(cause);
        FaultAction::ResetInterface
    }
}

#[allow(unused_variables)]
fn log_controller_problem(problem: ControllerProblem) {
    match problem {
        ControllerProblem::RxWarning | ControllerProblem::TxWarning => {
            #[cfg(feature = "defmt")]
            defmt::info!("CAN controller: {}", problem);
        }
        _ => {
            #[cfg(feature = "defmt")]
            defmt::warn!("CAN controller: {}", problem);
        }
    }
}
