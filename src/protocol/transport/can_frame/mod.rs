//! In-memory representation of classic CAN frames as delivered by the
//! transport: data/remote frames and controller error frames.
use embedded_can::{Frame, Id};

use crate::protocol::transport::can_id::standard_id;

//==================================================================================CAN_FRAME
#[derive(Clone, Debug, PartialEq, Eq)]
/// Data or remote frame.
pub struct CanFrame {
    /// Standard or extended identifier.
    pub id: Id,
    /// Remote transmission request.
    pub rtr: bool,
    /// Payload buffer. Classic CAN frames always provide eight bytes.
    pub data: [u8; 8],
    /// Number of valid payload bytes (Data Length Code, 0 to 8).
    pub len: usize,
}

impl CanFrame {
    /// Standard data frame. `None` when the payload exceeds eight bytes.
    pub fn standard(id: u16, payload: &[u8]) -> Option<Self> {
        Self::new(standard_id(id), payload)
    }

    /// Identifier without its standard/extended tag.
    pub fn raw_id(&self) -> u32 {
        match self.id {
            Id::Standard(id) => id.as_raw() as u32,
            Id::Extended(id) => id.as_raw(),
        }
    }

    /// Valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len.min(8)]
    }
}

impl Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        let mut buffer = [0u8; 8];
        buffer[..data.len()].copy_from_slice(data);
        Some(Self {
            id: id.into(),
            rtr: false,
            data: buffer,
            len: data.len(),
        })
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > 8 {
            return None;
        }
        Some(Self {
            id: id.into(),
            rtr: true,
            data: [0u8; 8],
            len: dlc,
        })
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.rtr
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.len
    }

    fn data(&self) -> &[u8] {
        self.payload()
    }
}

//==================================================================================ERROR_FRAME
/// Error class bits carried in the identifier of an error frame
/// (Linux `can/error.h` numbering).
pub mod error_class {
    /// Controller problem, details in `data[1]`.
    pub const CONTROLLER: u32 = 0x0000_0004;
    /// Transmission not acknowledged.
    pub const NO_ACK: u32 = 0x0000_0020;
    /// Controller went bus-off.
    pub const BUS_OFF: u32 = 0x0000_0040;
}

/// Controller status bits carried in `data[1]` of a controller error frame.
pub mod controller_status {
    pub const RX_OVERFLOW: u8 = 0x01;
    pub const TX_OVERFLOW: u8 = 0x02;
    pub const RX_WARNING: u8 = 0x04;
    pub const TX_WARNING: u8 = 0x08;
    pub const RX_PASSIVE: u8 = 0x10;
    pub const TX_PASSIVE: u8 = 0x20;
    pub const ACTIVE: u8 = 0x40;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Most significant controller condition reported by an error frame.
pub enum ControllerProblem {
    RxPassive,
    TxPassive,
    RxOverflow,
    TxOverflow,
    RxWarning,
    TxWarning,
    /// Controller recovered to error-active.
    Active,
    /// Controller class set without a known status bit.
    Unspecified,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Error frame reported by the controller.
pub struct ErrorFrame {
    /// Error class bits (see [`error_class`]).
    pub class: u32,
    /// Class-specific details.
    pub data: [u8; 8],
}

impl ErrorFrame {
    pub fn new(class: u32, data: [u8; 8]) -> Self {
        Self { class, data }
    }

    pub fn bus_off() -> Self {
        Self::new(error_class::BUS_OFF, [0; 8])
    }

    pub fn no_ack() -> Self {
        Self::new(error_class::NO_ACK, [0; 8])
    }

    /// Controller error frame carrying `status` (see [`controller_status`]).
    pub fn controller(status: u8) -> Self {
        let mut data = [0u8; 8];
        data[1] = status;
        Self::new(error_class::CONTROLLER, data)
    }

    pub fn is_bus_off(&self) -> bool {
        self.class & error_class::BUS_OFF != 0
    }

    pub fn is_no_ack(&self) -> bool {
        self.class & error_class::NO_ACK != 0
    }

    /// Controller condition, checked from the most to the least severe.
    pub fn controller_problem(&self) -> Option<ControllerProblem> {
        use controller_status::*;

        if self.class & error_class::CONTROLLER == 0 {
            return None;
        }
        let status = self.data[1];
        let problem = if status & RX_PASSIVE != 0 {
            ControllerProblem::RxPassive
        } else if status & TX_PASSIVE != 0 {
            ControllerProblem::TxPassive
        } else if status & RX_OVERFLOW != 0 {
            ControllerProblem::RxOverflow
        } else if status & TX_OVERFLOW != 0 {
            ControllerProblem::TxOverflow
        } else if status & RX_WARNING != 0 {
            ControllerProblem::RxWarning
        } else if status & TX_WARNING != 0 {
            ControllerProblem::TxWarning
        } else if status & ACTIVE != 0 {
            ControllerProblem::Active
        } else {
            ControllerProblem::Unspecified
        };
        Some(problem)
    }
}

//==================================================================================BUS_FRAME
#[derive(Clone, Debug, PartialEq, Eq)]
/// Anything the transport can hand over on receive.
pub enum BusFrame {
    Data(CanFrame),
    Error(ErrorFrame),
}
