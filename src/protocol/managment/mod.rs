//! Network management: node-id negotiation, node bring-up, NMT state
//! notifications and reset requests.
pub mod address_negotiation;
pub mod boot;
pub mod nmt_events;
