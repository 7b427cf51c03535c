//! Abstraction traits used by the transport layer (CAN bus and timer).
pub mod can_bus;
pub mod node_timer;
