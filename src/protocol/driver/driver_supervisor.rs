//! Driver supervisor built on top of [`CanModule`].
//!
//! It keeps the dispatch engine polled and optionally offers a transmission
//! handle (`DriverHandle`) through which other tasks queue frames, suspend,
//! resume, or stop the loop.
//!
//! Firmware decides which features it needs by providing a pre-allocated
//! [`embassy_sync::Channel`]. No allocation is performed by the library and
//! there is no dependency on a particular BSP.
//!
//! Commands are drained between polls, never while a poll is in flight, so
//! an interface reset is always carried to completion.
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, Sender},
};
use embassy_time::Duration;

use crate::error::PollError;
use crate::protocol::driver::buffer_table::TxHandle;
use crate::protocol::driver::can_module::CanModule;
use crate::protocol::driver::Housekeeping;
use crate::protocol::transport::traits::{can_bus::CanBus, node_timer::NodeTimer};

/// Default bound of a single poll inside the runner loop.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Commands queued by producer tasks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriverCommand {
    Send {
        handle: TxHandle,
        len: usize,
        payload: [u8; 8],
    },
    /// Stop polling; buffers stay registered.
    Suspend,
    Resume,
    /// Leave the loop and hand the module back for a rebuild.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverHandleError {
    /// Classic CAN payloads are limited to eight bytes.
    PayloadTooLong,
    /// Command queue is full (non-blocking variants only).
    QueueFull,
}

/// Service assembling the supervisor components.
pub struct DriverService<'a, 'b, C, T, const RX: usize, const TX: usize, const CMD_CAP: usize>
where
    C: CanBus,
    T: NodeTimer,
{
    module: CanModule<'a, C, T, RX, TX>,
    command_channel: Option<&'b Channel<CriticalSectionRawMutex, DriverCommand, CMD_CAP>>,
    poll_timeout: Duration,
}

impl<'a, 'b, C, T, const RX: usize, const TX: usize, const CMD_CAP: usize>
    DriverService<'a, 'b, C, T, RX, TX, CMD_CAP>
where
    C: CanBus,
    T: NodeTimer,
{
    /// Wrap a module whose buffers are already registered.
    pub fn new(
        module: CanModule<'a, C, T, RX, TX>,
        command_channel: Option<&'b Channel<CriticalSectionRawMutex, DriverCommand, CMD_CAP>>,
    ) -> Self {
        Self {
            module,
            command_channel,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Bound of each poll, which is also the worst-case command latency.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Split into handle/runner components.
    pub fn into_parts(self) -> DriverServiceParts<'a, 'b, C, T, RX, TX, CMD_CAP> {
        let handle = self.command_channel.map(|channel| DriverHandle {
            sender: channel.sender(),
        });
        DriverServiceParts {
            handle,
            runner: DriverRunner {
                module: self.module,
                command_channel: self.command_channel,
                poll_timeout: self.poll_timeout,
                suspended: false,
            },
        }
    }
}

/// Bundle returned by [`DriverService::into_parts`].
pub struct DriverServiceParts<'a, 'b, C, T, const RX: usize, const TX: usize, const CMD_CAP: usize>
where
    C: CanBus,
    T: NodeTimer,
{
    pub handle: Option<DriverHandle<'b, CMD_CAP>>,
    pub runner: DriverRunner<'a, 'b, C, T, RX, TX, CMD_CAP>,
}

/// Runner that drives the poll loop.
pub struct DriverRunner<'a, 'b, C, T, const RX: usize, const TX: usize, const CMD_CAP: usize>
where
    C: CanBus,
    T: NodeTimer,
{
    module: CanModule<'a, C, T, RX, TX>,
    command_channel: Option<&'b Channel<CriticalSectionRawMutex, DriverCommand, CMD_CAP>>,
    poll_timeout: Duration,
    suspended: bool,
}

impl<'a, 'b, C, T, const RX: usize, const TX: usize, const CMD_CAP: usize>
    DriverRunner<'a, 'b, C, T, RX, TX, CMD_CAP>
where
    C: CanBus,
    T: NodeTimer,
{
    /// Poll forever, servicing `housekeeping` on every iteration.
    ///
    /// Returns the module once a [`DriverCommand::Stop`] is processed.
    pub async fn drive<H: Housekeeping>(mut self, housekeeping: &mut H) -> CanModule<'a, C, T, RX, TX> {
        loop {
            housekeeping.run();

            if let Some(channel) = self.command_channel {
                if self.suspended {
                    let command = channel.receive().await;
                    if self.handle_command(command).await {
                        return self.module;
                    }
                    continue;
                }
                while let Ok(command) = channel.try_receive() {
                    if self.handle_command(command).await {
                        return self.module;
                    }
                }
                if self.suspended {
                    continue;
                }
            }

            match self.module.poll(self.poll_timeout).await {
                Ok(_outcome) => {}
                Err(PollError::Timeout) => {}
                Err(PollError::Transport(_err)) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("CAN receive failed, retrying on next poll");
                    self.module.pace(self.poll_timeout).await;
                }
            }
        }
    }

    /// Apply one command. Returns `true` when the loop must stop.
    async fn handle_command(&mut self, command: DriverCommand) -> bool {
        match command {
            DriverCommand::Send {
                handle,
                len,
                payload,
            } => {
                if self.suspended {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Driver suspended, dropping queued frame");
                    return false;
                }
                if let Err(_err) = self.module.send(handle, &payload[..len]).await {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Queued transmission on {} failed", handle);
                }
                false
            }
            DriverCommand::Suspend => {
                #[cfg(feature = "defmt")]
                defmt::info!("CAN driver suspended");
                self.suspended = true;
                false
            }
            DriverCommand::Resume => {
                #[cfg(feature = "defmt")]
                defmt::info!("CAN driver resumed");
                self.suspended = false;
                false
            }
            DriverCommand::Stop => true,
        }
    }
}

/// Transmission and control handle (optional).
pub struct DriverHandle<'b, const CMD_CAP: usize> {
    sender: Sender<'b, CriticalSectionRawMutex, DriverCommand, CMD_CAP>,
}

impl<'b, const CMD_CAP: usize> DriverHandle<'b, CMD_CAP> {
    fn command(handle: TxHandle, payload: &[u8]) -> Result<DriverCommand, DriverHandleError> {
        if payload.len() > 8 {
            return Err(DriverHandleError::PayloadTooLong);
        }
        let mut buffer = [0u8; 8];
        buffer[..payload.len()].copy_from_slice(payload);
        Ok(DriverCommand::Send {
            handle,
            len: payload.len(),
            payload: buffer,
        })
    }

    /// Queue a transmission, waiting for room in the queue.
    pub async fn send(&self, handle: TxHandle, payload: &[u8]) -> Result<(), DriverHandleError> {
        let command = Self::command(handle, payload)?;
        self.sender.send(command).await;
        Ok(())
    }

    /// Queue a transmission without waiting.
    pub fn try_send(&self, handle: TxHandle, payload: &[u8]) -> Result<(), DriverHandleError> {
        let command = Self::command(handle, payload)?;
        self.sender
            .try_send(command)
            .map_err(|_| DriverHandleError::QueueFull)
    }

    pub async fn suspend(&self) {
        self.sender.send(DriverCommand::Suspend).await;
    }

    pub async fn resume(&self) {
        self.sender.send(DriverCommand::Resume).await;
    }

    pub async fn stop(&self) {
        self.sender.send(DriverCommand::Stop).await;
    }
}
