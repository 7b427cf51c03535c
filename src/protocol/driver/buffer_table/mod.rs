//! Fixed-capacity receive and transmit descriptor tables.
//!
//! Receive descriptors are scanned linearly in slot order and the first
//! matching filter consumes the frame: slot order is a priority order.
//! Tables are only populated during bring-up and cleared as a whole before
//! a rebuild; a live entry is never edited in place.
use embedded_can::Id;

use crate::error::RegistrationError;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::{standard_id, IdFilter};

/// Receiver bound to a receive descriptor.
///
/// Called synchronously from the poll loop: implementations must be short
/// and must not block.
pub trait RxHandler {
    fn on_frame(&self, frame: &CanFrame);
}

impl<F: Fn(&CanFrame)> RxHandler for F {
    fn on_frame(&self, frame: &CanFrame) {
        self(frame)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Position of a receive descriptor.
pub struct SlotId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Reference to a transmit descriptor.
pub struct TxHandle(pub usize);

//==================================================================================RECEIVE
/// Filter plus handler binding.
pub struct ReceiveDescriptor<'a> {
    pub filter: IdFilter,
    handler: &'a dyn RxHandler,
}

impl<'a> ReceiveDescriptor<'a> {
    pub fn handler(&self) -> &'a dyn RxHandler {
        self.handler
    }
}

//==================================================================================TRANSMIT
#[derive(Clone, Debug, PartialEq, Eq)]
/// Outgoing buffer. The payload must not change while `full` is set.
pub struct TransmitDescriptor {
    pub identifier: u16,
    pub rtr: bool,
    pub len: usize,
    pub data: [u8; 8],
    /// Transmission requested and not yet completed.
    pub full: bool,
}

impl TransmitDescriptor {
    /// Frame as it goes on the wire.
    pub fn frame(&self) -> CanFrame {
        CanFrame {
            id: Id::Standard(standard_id(self.identifier)),
            rtr: self.rtr,
            data: self.data,
            len: self.len,
        }
    }
}

//==================================================================================TABLE
/// Receive and transmit descriptors of one interface generation.
pub struct BufferTable<'a, const RX: usize, const TX: usize> {
    rx: [Option<ReceiveDescriptor<'a>>; RX],
    tx: [Option<TransmitDescriptor>; TX],
}

impl<'a, const RX: usize, const TX: usize> Default for BufferTable<'a, RX, TX> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const RX: usize, const TX: usize> BufferTable<'a, RX, TX> {
    pub fn new() -> Self {
        Self {
            rx: core::array::from_fn(|_| None),
            tx: core::array::from_fn(|_| None),
        }
    }

    /// Append a receive descriptor in the first free slot.
    pub fn register_receive(
        &mut self,
        identifier: u16,
        mask: u16,
        rtr: bool,
        handler: &'a dyn RxHandler,
    ) -> Result<SlotId, RegistrationError> {
        let index = self
            .rx
            .iter()
            .position(Option::is_none)
            .ok_or(RegistrationError::CapacityExceeded)?;
        self.register_receive_at(index, identifier, mask, rtr, handler)
    }

    /// Install a receive descriptor into a given slot, replacing its previous
    /// binding. Used by stacks that assign fixed slots per network object.
    pub fn register_receive_at(
        &mut self,
        index: usize,
        identifier: u16,
        mask: u16,
        rtr: bool,
        handler: &'a dyn RxHandler,
    ) -> Result<SlotId, RegistrationError> {
        let slot = self
            .rx
            .get_mut(index)
            .ok_or(RegistrationError::InvalidSlot { index })?;
        *slot = Some(ReceiveDescriptor {
            filter: IdFilter::new(identifier, mask, rtr),
            handler,
        });
        Ok(SlotId(index))
    }

    /// Reserve a transmit buffer of `len` bytes.
    pub fn register_transmit(
        &mut self,
        identifier: u16,
        rtr: bool,
        len: usize,
    ) -> Result<TxHandle, RegistrationError> {
        if len > 8 {
            return Err(RegistrationError::InvalidLength { len });
        }
        let index = self
            .tx
            .iter()
            .position(Option::is_none)
            .ok_or(RegistrationError::CapacityExceeded)?;
        self.tx[index] = Some(TransmitDescriptor {
            identifier: identifier & crate::protocol::transport::can_id::STD_ID_MASK,
            rtr,
            len,
            data: [0u8; 8],
            full: false,
        });
        Ok(TxHandle(index))
    }

    /// First receive descriptor accepting `frame`, in slot order.
    ///
    /// Extended identifiers never match.
    pub fn find_receiver(&self, frame: &CanFrame) -> Option<(SlotId, &ReceiveDescriptor<'a>)> {
        self.rx.iter().enumerate().find_map(|(index, slot)| {
            slot.as_ref()
                .filter(|descriptor| descriptor.filter.matches_id(frame.id, frame.rtr))
                .map(|descriptor| (SlotId(index), descriptor))
        })
    }

    /// Route `frame` to its receiver and invoke the handler.
    pub fn dispatch(&self, frame: &CanFrame) -> Option<SlotId> {
        let (slot, descriptor) = self.find_receiver(frame)?;
        descriptor.handler.on_frame(frame);
        Some(slot)
    }

    pub fn receive(&self, slot: SlotId) -> Option<&ReceiveDescriptor<'a>> {
        self.rx.get(slot.0).and_then(Option::as_ref)
    }

    pub fn transmit(&self, handle: TxHandle) -> Option<&TransmitDescriptor> {
        self.tx.get(handle.0).and_then(Option::as_ref)
    }

    pub fn transmit_mut(&mut self, handle: TxHandle) -> Option<&mut TransmitDescriptor> {
        self.tx.get_mut(handle.0).and_then(Option::as_mut)
    }

    pub fn receive_count(&self) -> usize {
        self.rx.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn transmit_count(&self) -> usize {
        self.tx.iter().filter(|slot| slot.is_some()).count()
    }

    /// Drop every descriptor.
    pub fn clear(&mut self) {
        self.rx.iter_mut().for_each(|slot| *slot = None);
        self.tx.iter_mut().for_each(|slot| *slot = None);
    }
}
