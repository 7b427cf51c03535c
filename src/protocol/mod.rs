//! High-level components of the node: CAN transport, the driver built on it,
//! network management and the persistent parameter store.
pub mod driver;
pub mod managment;
pub mod parameters;
pub mod transport;
