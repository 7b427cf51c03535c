//! Dispatch engine: owns the CAN interface, the buffer tables and the
//! fault state of one interface.
//!
//! Each [`CanModule::poll`] reads at most one frame. Data frames are routed to
//! the first matching receive descriptor, error frames feed the fault state
//! machine which may cycle the interface link. Link faults are recovered here
//! and never reported to callers as errors.
use embassy_time::Duration;
use embedded_can::{Error as _, ErrorKind};
use futures_util::{
    future::{select, Either},
    pin_mut,
};

use crate::error::{PollError, RegistrationError, SendError};
use crate::protocol::driver::buffer_table::{BufferTable, RxHandler, SlotId, TxHandle};
use crate::protocol::driver::fault_recovery::{
    FaultAction, FaultRecoveryConfig, InterfaceFaultState, InterfaceMode,
};
use crate::protocol::transport::can_frame::BusFrame;
use crate::protocol::transport::traits::{can_bus::CanBus, node_timer::NodeTimer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// What a successful poll did with the frame it read.
pub enum PollOutcome {
    /// Handler of the given slot consumed the frame.
    Dispatched(SlotId),
    /// No descriptor matched (traffic for other nodes, extended identifier).
    Unmatched,
    /// Error frame handled without state change.
    ErrorFrame,
    /// Error frame caused an interface reset.
    InterfaceReset,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Interface runtime counters.
pub struct InterfaceStats {
    pub rx_frames: u64,
    pub rx_bytes: u64,
    /// Frames discarded while the interface was being reset.
    pub rx_dropped: u32,
    pub rx_unmatched: u32,
    pub tx_frames: u64,
    pub tx_bytes: u64,
    /// Transmissions refused or failed.
    pub tx_dropped: u32,
    pub error_frames: u32,
    pub interface_resets: u32,
}

/// CAN interface with its buffer tables and fault state.
pub struct CanModule<'a, C: CanBus, T: NodeTimer, const RX: usize, const TX: usize> {
    can_bus: C,
    timer: T,
    table: BufferTable<'a, RX, TX>,
    fault: InterfaceFaultState,
    stats: InterfaceStats,
}

impl<'a, C, T, const RX: usize, const TX: usize> CanModule<'a, C, T, RX, TX>
where
    C: CanBus,
    T: NodeTimer,
{
    pub fn new(can_bus: C, timer: T, config: FaultRecoveryConfig) -> Self {
        Self {
            can_bus,
            timer,
            table: BufferTable::new(),
            fault: InterfaceFaultState::new(config),
            stats: InterfaceStats::default(),
        }
    }

    //==============================================================================REGISTRATION
    /// Bind `handler` to frames matching `identifier`/`mask`.
    pub fn register_receive(
        &mut self,
        identifier: u16,
        mask: u16,
        rtr: bool,
        handler: &'a dyn RxHandler,
    ) -> Result<SlotId, RegistrationError> {
        self.table.register_receive(identifier, mask, rtr, handler)
    }

    /// Same as [`CanModule::register_receive`] for a fixed slot.
    pub fn register_receive_at(
        &mut self,
        index: usize,
        identifier: u16,
        mask: u16,
        rtr: bool,
        handler: &'a dyn RxHandler,
    ) -> Result<SlotId, RegistrationError> {
        self.table
            .register_receive_at(index, identifier, mask, rtr, handler)
    }

    pub fn register_transmit(
        &mut self,
        identifier: u16,
        rtr: bool,
        len: usize,
    ) -> Result<TxHandle, RegistrationError> {
        self.table.register_transmit(identifier, rtr, len)
    }

    /// Tear down both tables and the fault state before a new bring-up
    /// (node-id or bit-rate change). Requires the poll loop to be stopped,
    /// which `&mut self` guarantees.
    pub fn rebuild(&mut self) {
        self.table.clear();
        self.fault.clear();
    }

    //==============================================================================RECEIVE
    /// Wait up to `timeout` for one frame and process it.
    pub async fn poll(&mut self, timeout: Duration) -> Result<PollOutcome, PollError<C::Error>> {
        let received = {
            let recv = self.can_bus.recv();
            let delay = self.timer.delay(timeout);
            pin_mut!(recv);
            pin_mut!(delay);

            match select(recv, delay).await {
                Either::Left((result, _)) => result,
                Either::Right(_) => return Err(PollError::Timeout),
            }
        };

        match received.map_err(PollError::Transport)? {
            BusFrame::Data(frame) => {
                self.stats.rx_frames = self.stats.rx_frames.saturating_add(1);
                self.stats.rx_bytes = self.stats.rx_bytes.saturating_add(frame.len as u64);
                self.fault.on_frame_received();

                match self.table.dispatch(&frame) {
                    Some(slot) => Ok(PollOutcome::Dispatched(slot)),
                    None => {
                        #[cfg(feature = "defmt")]
                        defmt::trace!("No receiver for frame {=u32:#x}", frame.raw_id());
                        self.stats.rx_unmatched = self.stats.rx_unmatched.saturating_add(1);
                        Ok(PollOutcome::Unmatched)
                    }
                }
            }
            BusFrame::Error(error_frame) => {
                self.stats.error_frames = self.stats.error_frames.saturating_add(1);
                match self.fault.on_error_frame(&error_frame) {
                    Some(FaultAction::ResetInterface) => {
                        self.reset_interface().await;
                        Ok(PollOutcome::InterfaceReset)
                    }
                    None => Ok(PollOutcome::ErrorFrame),
                }
            }
        }
    }

    /// Sleep for `period` on the module timer. Loops call this after a
    /// transport error so a failing controller cannot monopolize the executor.
    pub async fn pace(&mut self, period: Duration) {
        self.timer.delay(period).await;
    }

    /// Cycle the link and drop receptions queued meanwhile. Best effort: a
    /// failing link keeps producing bus-off frames and the cycle repeats.
    async fn reset_interface(&mut self) {
        if let Err(_err) = self.can_bus.set_link(false).await {
            #[cfg(feature = "defmt")]
            defmt::error!("Failed to bring CAN link down");
        }

        let dropped = self.can_bus.discard_pending();
        self.stats.rx_dropped = self.stats.rx_dropped.saturating_add(dropped as u32);
        #[cfg(feature = "defmt")]
        defmt::info!("Dropped {} frames during interface reset", dropped);

        if let Err(_err) = self.can_bus.set_link(true).await {
            #[cfg(feature = "defmt")]
            defmt::error!("Failed to bring CAN link up");
        }

        self.stats.interface_resets = self.stats.interface_resets.saturating_add(1);
        self.fault.reset_complete(self.timer.now());
    }

    //==============================================================================TRANSMIT
    /// Copy `payload` into the transmit buffer and hand it to the interface.
    pub async fn send(&mut self, handle: TxHandle, payload: &[u8]) -> Result<(), SendError<C::Error>> {
        let now = self.timer.now();

        let descriptor = self
            .table
            .transmit_mut(handle)
            .ok_or(SendError::InvalidHandle)?;
        if payload.len() != descriptor.len {
            return Err(SendError::LengthMismatch {
                expected: descriptor.len,
                actual: payload.len(),
            });
        }
        if !self.fault.permit_send(now) {
            self.stats.tx_dropped = self.stats.tx_dropped.saturating_add(1);
            return Err(SendError::Busy);
        }

        descriptor.data[..payload.len()].copy_from_slice(payload);
        descriptor.full = true;
        let frame = descriptor.frame();

        let result = self.can_bus.send(&frame).await;

        if let Some(descriptor) = self.table.transmit_mut(handle) {
            descriptor.full = false;
        }

        match result {
            Ok(()) => {
                self.stats.tx_frames = self.stats.tx_frames.saturating_add(1);
                self.stats.tx_bytes = self.stats.tx_bytes.saturating_add(frame.len as u64);
                Ok(())
            }
            Err(err) => {
                self.stats.tx_dropped = self.stats.tx_dropped.saturating_add(1);
                match err.kind() {
                    ErrorKind::Overrun => Err(SendError::Overflow),
                    _ => Err(SendError::Transport(err)),
                }
            }
        }
    }

    //==============================================================================ACCESSORS
    pub fn mode(&self) -> InterfaceMode {
        self.fault.mode()
    }

    pub fn fault_state(&self) -> &InterfaceFaultState {
        &self.fault
    }

    pub fn stats(&self) -> &InterfaceStats {
        &self.stats
    }

    pub fn table(&self) -> &BufferTable<'a, RX, TX> {
        &self.table
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn can_bus_mut(&mut self) -> &mut C {
        &mut self.can_bus
    }

    /// Release the interface and timer.
    pub fn into_inner(self) -> (C, T) {
        (self.can_bus, self.timer)
    }
}
