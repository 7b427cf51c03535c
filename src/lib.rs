//! `korri-canopen` library: platform layer of a CANopen node in a `no_std`
//! environment. The crate exposes the infrastructure modules (checksum,
//! non-volatile storage), the CAN driver (buffer tables, dispatch, fault
//! recovery), node management (node-id negotiation, NMT events) and the
//! persistent parameter store.
#![no_std]
//==================================================================================
/// Static descriptors of the object dictionary image.
pub mod core;
/// Domain and low-level errors (buffer registration, frame I/O, storage,
/// dictionary layout, SDO aborts).
pub mod error;
/// Checksum and non-volatile storage primitives.
pub mod infra;
/// CAN transport, driver, network management and parameter store.
pub mod protocol;
//==================================================================================
