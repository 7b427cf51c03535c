//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (buffer registration, frame
//! I/O, persistent storage, dictionary layout, object access).
use thiserror_no_std::Error;

//==================================================================================REGISTRATION_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors raised while populating the receive/transmit buffer tables.
pub enum RegistrationError {
    /// Every slot of the table is already taken.
    #[error("Buffer table capacity exceeded")]
    CapacityExceeded,
    /// Explicit slot index lies outside the table.
    #[error("Slot index out of range: {index}")]
    InvalidSlot { index: usize },
    /// Classic CAN frames carry at most eight bytes.
    #[error("Invalid payload length: {len}")]
    InvalidLength { len: usize },
}

//==================================================================================DRIVER_ERRORS
#[derive(Error, Debug)]
/// Outcome of a bounded poll that did not deliver a frame.
pub enum PollError<E: core::fmt::Debug> {
    /// No frame arrived before the timeout expired.
    #[error("Poll timeout")]
    Timeout,
    /// The CAN transport failed to deliver a frame.
    #[error("CAN bus receive error: {0:?}")]
    Transport(E),
}

#[derive(Error, Debug)]
/// Errors encountered when requesting a transmission.
pub enum SendError<E: core::fmt::Debug> {
    /// Interface is in listen-only or bus-off.
    #[error("Interface busy")]
    Busy,
    /// The transport queue is saturated.
    #[error("Transmit queue overflow")]
    Overflow,
    /// Handle does not refer to a registered transmit buffer.
    #[error("Unknown transmit handle")]
    InvalidHandle,
    /// Payload length differs from the registered buffer length.
    #[error("Payload length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    /// Any other transport failure.
    #[error("CAN bus send error: {0:?}")]
    Transport(E),
}

//==================================================================================STORAGE_ERRORS
#[derive(Error, Debug)]
/// Failures of the non-volatile memory backing the parameter store.
pub enum StorageError<E: core::fmt::Debug> {
    /// The device reported a read or write failure.
    #[error("Storage hardware error: {0:?}")]
    Hardware(E),
    /// The configured regions do not fit into the device.
    #[error("Storage too small -> required: {required}, capacity: {capacity}")]
    OutOfMemory { required: usize, capacity: usize },
    /// The group has no region in the configured layout.
    #[error("Group not present in layout")]
    UnknownGroup,
}

#[derive(Error, Debug)]
/// Outcome of loading a group that did not overlay stored values.
///
/// Every variant leaves the live values at their defaults.
pub enum LoadError<E: core::fmt::Debug> {
    /// Nothing stored yet, or stored by another firmware.
    #[error("No stored record")]
    Absent,
    /// Stored record failed its integrity check and was invalidated.
    #[error("Stored record corrupt")]
    Corrupt,
    /// Storage device failure.
    #[error("Storage error: {0}")]
    Storage(StorageError<E>),
}

impl<E: core::fmt::Debug> From<StorageError<E>> for LoadError<E> {
    fn from(err: StorageError<E>) -> Self {
        LoadError::Storage(err)
    }
}

//==================================================================================LAYOUT_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Inconsistencies detected while validating a dictionary layout.
pub enum LayoutError {
    /// A group range exceeds the dictionary image.
    #[error("Group exceeds image -> end: {end}, image: {image}")]
    GroupOutOfBounds { end: usize, image: usize },
    /// Two groups share bytes of the image.
    #[error("Overlapping groups")]
    GroupOverlap,
    /// A group is declared twice.
    #[error("Duplicate group")]
    DuplicateGroup,
    /// An entry does not fit into the group it claims to belong to.
    #[error("Entry {index:#06x}:{sub_index} outside its group")]
    EntryOutOfBounds { index: u16, sub_index: u8 },
    /// An entry references a group that the layout does not declare.
    #[error("Entry {index:#06x}:{sub_index} references an undeclared group")]
    MissingGroup { index: u16, sub_index: u8 },
    /// A write-once entry points to a validity flag that is not a boolean entry.
    #[error("Entry {index:#06x}:{sub_index} has an invalid validity flag")]
    InvalidValidityFlag { index: u16, sub_index: u8 },
    /// A write-once entry and its validity flag live in different groups,
    /// so saving the entry would not persist the flag.
    #[error("Entry {index:#06x}:{sub_index} has its validity flag in another group")]
    ValidityFlagGroupMismatch { index: u16, sub_index: u8 },
    /// Command entries must be declared as `U32`.
    #[error("Command entry {index:#06x}:{sub_index} must be U32")]
    InvalidCommandEntry { index: u16, sub_index: u8 },
}

//==================================================================================NODE_ID_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Node identifiers are restricted to 1..=127.
pub enum NodeIdError {
    #[error("Node id out of range: {0}")]
    OutOfRange(u8),
}

//==================================================================================SDO_ABORT
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Abort reasons returned by the object access path (CiA 301 abort codes).
pub enum SdoAbort {
    /// Access type not supported for this object.
    #[error("Unsupported access to an object")]
    UnsupportedAccess,
    /// Attempt to write a read-only object.
    #[error("Attempt to write a read only object")]
    ReadOnly,
    /// Object does not exist in the dictionary.
    #[error("Object does not exist")]
    ObjectUnknown,
    /// Data type or length does not match.
    #[error("Length of service parameter does not match")]
    LengthMismatch,
    /// Sub-index does not exist.
    #[error("Sub-index does not exist")]
    SubUnknown,
    /// Access failed because of a hardware error.
    #[error("Access failed due to a hardware error")]
    Hardware,
    /// Data cannot be transferred or stored (wrong signature, locked field).
    #[error("Data cannot be transferred or stored")]
    InvalidData,
}

impl SdoAbort {
    /// Numeric abort code as transmitted in an SDO abort frame.
    pub const fn code(self) -> u32 {
        match self {
            SdoAbort::UnsupportedAccess => 0x0601_0000,
            SdoAbort::ReadOnly => 0x0601_0002,
            SdoAbort::ObjectUnknown => 0x0602_0000,
            SdoAbort::LengthMismatch => 0x0607_0010,
            SdoAbort::SubUnknown => 0x0609_0011,
            SdoAbort::Hardware => 0x0606_0000,
            SdoAbort::InvalidData => 0x0800_0020,
        }
    }
}
