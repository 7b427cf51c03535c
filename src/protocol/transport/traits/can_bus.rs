//! Minimal abstraction for an asynchronous CAN interface. Allows the library to
//! plug into various implementations (embedded HAL, SocketCAN, test doubles).
use crate::protocol::transport::can_frame::{BusFrame, CanFrame};
use futures_util::Future;

/// Contract to send and receive CAN frames asynchronously and to cycle the
/// interface link during fault recovery.
pub trait CanBus {
    /// `ErrorKind::Overrun` on send is reported to callers as a saturated queue.
    type Error: embedded_can::Error;
    /// Emit a frame on the bus. Asynchronous to accommodate non-blocking drivers.
    fn send<'a>(
        &'a mut self,
        frame: &'a CanFrame,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;
    /// Retrieve the next data or error frame.
    ///
    /// Must be cancel-safe: the future is dropped when a poll times out.
    fn recv<'a>(&'a mut self) -> impl Future<Output = Result<BusFrame, Self::Error>> + 'a;
    /// Bring the interface link down (`false`) or up (`true`).
    fn set_link<'a>(&'a mut self, up: bool) -> impl Future<Output = Result<(), Self::Error>> + 'a;
    /// Drop every frame already queued for reception without blocking.
    /// Returns the number of discarded frames.
    fn discard_pending(&mut self) -> usize;
}
