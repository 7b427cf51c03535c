//! Node bring-up: restore the dictionary, then settle the node id.
use crate::error::LoadError;
use crate::infra::storage::NvStorage;
use crate::protocol::driver::can_module::CanModule;
use crate::protocol::driver::Housekeeping;
use crate::protocol::managment::address_negotiation::{
    negotiate_node_id, AddressClaim, NegotiationConfig, NodeAddress, NodeId,
};
use crate::protocol::parameters::store::{LssSettings, ParameterStore};
use crate::protocol::transport::traits::{can_bus::CanBus, node_timer::NodeTimer};

/// Bit rate recorded with a node id when no LSS record exists yet (kbit/s).
pub const DEFAULT_BIT_RATE_KBPS: u16 = 250;

/// Persisted LSS settings, `None` when absent or unreadable.
pub fn persisted_lss<S: NvStorage, const N: usize>(
    store: &mut ParameterStore<'_, S, N>,
) -> Option<LssSettings> {
    match store.load_lss() {
        Ok(settings) => Some(settings),
        Err(LoadError::Absent) => None,
        Err(_err) => {
            #[cfg(feature = "defmt")]
            defmt::warn!("LSS record unreadable, node id unassigned");
            None
        }
    }
}

/// Load every group, negotiate the node id and persist a negotiated id that
/// differs from the stored one. An explicit id is used as is and never stored.
///
/// Storage failures are logged; the node keeps running on its defaults.
pub async fn boot_node<'a, S, C, T, A, H, const N: usize, const RX: usize, const TX: usize>(
    store: &mut ParameterStore<'_, S, N>,
    first_boot: bool,
    explicit: u8,
    module: &mut CanModule<'a, C, T, RX, TX>,
    claim: &mut A,
    housekeeping: &mut H,
    config: &NegotiationConfig,
) -> NodeId
where
    S: NvStorage,
    C: CanBus,
    T: NodeTimer,
    A: AddressClaim,
    H: Housekeeping,
{
    store.load_all(first_boot);

    let lss = persisted_lss(store);
    let persisted = lss.map(|settings| settings.node_id);
    let node_id = negotiate_node_id(explicit, persisted, module, claim, housekeeping, config).await;

    let explicit_used = NodeAddress::from_raw(explicit) == NodeAddress::Assigned(node_id);
    if !explicit_used && persisted != Some(node_id.get()) {
        let settings = LssSettings {
            node_id: node_id.get(),
            bit_rate: lss.map_or(DEFAULT_BIT_RATE_KBPS, |settings| settings.bit_rate),
        };
        if let Err(_err) = store.save_lss(settings) {
            #[cfg(feature = "defmt")]
            defmt::error!("Failed to persist node id {}", node_id.get());
        }
    }
    node_id
}
