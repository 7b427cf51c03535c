//! Node-id negotiation at bring-up.
//!
//! Strategy:
//! 1. A nonzero explicit node id from the caller wins, no negotiation.
//! 2. A valid persisted node id becomes the working id. The claim protocol
//!    gets one chance to override it, without any bus wait.
//! 3. Otherwise the node is unassigned and loops until the claim protocol
//!    (LSS slave) resolves an id: housekeeping, one bounded poll of the bus,
//!    one claim step. There is no timeout, a node without id cannot work.
use embassy_time::Duration;

use crate::error::{NodeIdError, PollError};
use crate::protocol::driver::can_module::CanModule;
use crate::protocol::driver::Housekeeping;
use crate::protocol::transport::traits::{can_bus::CanBus, node_timer::NodeTimer};

/// Raw value of an unassigned node id.
pub const UNASSIGNED_NODE_ID: u8 = 0xFF;

//==================================================================================NODE_ID
/// Node id in 1..=127.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeId(u8);

impl NodeId {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 127;

    pub const fn new(raw: u8) -> Result<Self, NodeIdError> {
        if raw >= Self::MIN && raw <= Self::MAX {
            Ok(Self(raw))
        } else {
            Err(NodeIdError::OutOfRange(raw))
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for NodeId {
    type Error = NodeIdError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

/// Working address handed to the claim protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeAddress {
    Assigned(NodeId),
    Unassigned,
}

impl NodeAddress {
    /// Any value outside 1..=127 reads as unassigned.
    pub fn from_raw(raw: u8) -> Self {
        NodeId::new(raw).map_or(NodeAddress::Unassigned, NodeAddress::Assigned)
    }

    pub fn raw(self) -> u8 {
        match self {
            NodeAddress::Assigned(id) => id.get(),
            NodeAddress::Unassigned => UNASSIGNED_NODE_ID,
        }
    }
}

//==================================================================================CLAIM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClaimStatus {
    Pending,
    Resolved(NodeId),
}

/// Processing step of the upstream claim protocol.
pub trait AddressClaim {
    fn process(&mut self, working: NodeAddress, timeout_hint: Duration) -> ClaimStatus;
}

impl<F: FnMut(NodeAddress, Duration) -> ClaimStatus> AddressClaim for F {
    fn process(&mut self, working: NodeAddress, timeout_hint: Duration) -> ClaimStatus {
        self(working, timeout_hint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationConfig {
    /// Bound of each bus poll inside the negotiation loop.
    pub poll_timeout: Duration,
    /// Passed on to every claim step.
    pub claim_timeout_hint: Duration,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(50),
            claim_timeout_hint: Duration::from_millis(50),
        }
    }
}

//==================================================================================NEGOTIATION
/// Resolve the node id of this node. Returns only once an id is known.
pub async fn negotiate_node_id<'a, C, T, A, H, const RX: usize, const TX: usize>(
    explicit: u8,
    persisted: Option<u8>,
    module: &mut CanModule<'a, C, T, RX, TX>,
    claim: &mut A,
    housekeeping: &mut H,
    config: &NegotiationConfig,
) -> NodeId
where
    C: CanBus,
    T: NodeTimer,
    A: AddressClaim,
    H: Housekeeping,
{
    if explicit != 0 {
        match NodeId::new(explicit) {
            Ok(id) => {
                #[cfg(feature = "defmt")]
                defmt::info!("Using explicit node id {}", id.get());
                return id;
            }
            Err(_err) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Ignoring invalid explicit node id {}", explicit);
            }
        }
    }

    if let NodeAddress::Assigned(id) = NodeAddress::from_raw(persisted.unwrap_or(UNASSIGNED_NODE_ID)) {
        return match claim.process(NodeAddress::Assigned(id), config.claim_timeout_hint) {
            ClaimStatus::Resolved(resolved) => {
                #[cfg(feature = "defmt")]
                if resolved != id {
                    defmt::info!("Node id overridden: {} -> {}", id.get(), resolved.get());
                }
                resolved
            }
            ClaimStatus::Pending => id,
        };
    }

    #[cfg(feature = "defmt")]
    defmt::info!("No node id, waiting for assignment");
    loop {
        housekeeping.run();
        if let Err(PollError::Transport(_err)) = module.poll(config.poll_timeout).await {
            #[cfg(feature = "defmt")]
            defmt::warn!("CAN receive failed while waiting for a node id");
            module.pace(config.poll_timeout).await;
        }
        if let ClaimStatus::Resolved(id) =
            claim.process(NodeAddress::Unassigned, config.claim_timeout_hint)
        {
            #[cfg(feature = "defmt")]
            defmt::info!("Node id assigned: {}", id.get());
            return id;
        }
    }
}
