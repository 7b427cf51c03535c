//! Durable records for the dictionary groups.
//!
//! The storage device is split into fixed regions, one per group present in
//! the layout plus one for the LSS settings:
//!
//! ```text
//! 0 ─▶ | Serial | Test | Calibration | Runtime | ... free ... | LSS | Communication | Params | ◀─ capacity
//! ```
//!
//! Groups surviving firmware updates are packed from the start of the device
//! and sealed under [`PERSISTENT_RECORD_TAG`]; the others are packed from the
//! end and sealed under the firmware identity, so a new firmware finds them
//! absent and starts from its compiled-in defaults.
use embassy_sync::channel::DynamicSender;

use crate::core::GroupId;
use crate::error::{LoadError, StorageError};
use crate::infra::storage::{
    invalidate_record, read_record, write_record, NvStorage, RecordStatus, Region,
    RECORD_OVERHEAD,
};
use crate::protocol::parameters::dictionary::ObjectDictionary;

/// Tag of records that stay valid across firmware updates ("KPRM").
pub const PERSISTENT_RECORD_TAG: u32 = 0x4D52_504B;
/// Tag of the LSS record ("KLSS").
pub const LSS_RECORD_TAG: u32 = 0x5353_4C4B;
/// Region reserved for the LSS record.
pub const LSS_REGION_LEN: usize = 16;
const LSS_PAYLOAD_LEN: usize = 3;

//==================================================================================EVENTS
/// A notified entry was written through the object access path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OdEvent {
    pub index: u16,
    pub sub_index: u8,
}

//==================================================================================LSS
/// Node identity negotiated through layer setting services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LssSettings {
    /// Raw node id, `0xFF` when unassigned.
    pub node_id: u8,
    /// Bit rate in kbit/s.
    pub bit_rate: u16,
}

impl LssSettings {
    fn encode(&self) -> [u8; LSS_PAYLOAD_LEN] {
        let rate = self.bit_rate.to_be_bytes();
        [self.node_id, rate[0], rate[1]]
    }

    fn decode(raw: &[u8; LSS_PAYLOAD_LEN]) -> Self {
        Self {
            node_id: raw[0],
            bit_rate: u16::from_be_bytes([raw[1], raw[2]]),
        }
    }
}

//==================================================================================STORE
/// Object dictionary bound to its non-volatile storage.
pub struct ParameterStore<'a, S: NvStorage, const N: usize> {
    dictionary: ObjectDictionary<N>,
    storage: S,
    firmware_id: u32,
    regions: [Option<Region>; GroupId::ALL.len()],
    lss_region: Region,
    events: Option<DynamicSender<'a, OdEvent>>,
}

impl<'a, S: NvStorage, const N: usize> ParameterStore<'a, S, N> {
    /// Assign a storage region to every group of the dictionary layout.
    ///
    /// `firmware_id` seals the groups that firmware updates discard; it must
    /// not be zero.
    pub fn new(
        dictionary: ObjectDictionary<N>,
        storage: S,
        firmware_id: u32,
    ) -> Result<Self, StorageError<S::Error>> {
        let capacity = storage.capacity();
        let layout = *dictionary.layout();
        let mut regions = [None; GroupId::ALL.len()];

        let mut low = 0usize;
        for id in [
            GroupId::Serial,
            GroupId::Test,
            GroupId::Calibration,
            GroupId::Runtime,
        ] {
            if let Some(group) = layout.group(id) {
                check_reserved(group.len, group.reserved)?;
                regions[id.index()] = Some(Region {
                    address: low,
                    reserved: group.reserved,
                });
                low += group.reserved;
            }
        }

        let mut high = capacity;
        for id in [GroupId::Params, GroupId::Communication] {
            if let Some(group) = layout.group(id) {
                check_reserved(group.len, group.reserved)?;
                high = high.checked_sub(group.reserved).ok_or(StorageError::OutOfMemory {
                    required: low + capacity - high + group.reserved,
                    capacity,
                })?;
                regions[id.index()] = Some(Region {
                    address: high,
                    reserved: group.reserved,
                });
            }
        }

        let required = low + (capacity - high) + LSS_REGION_LEN;
        if required > capacity {
            return Err(StorageError::OutOfMemory { required, capacity });
        }
        let lss_region = Region {
            address: high - LSS_REGION_LEN,
            reserved: LSS_REGION_LEN,
        };

        Ok(Self {
            dictionary,
            storage,
            firmware_id,
            regions,
            lss_region,
            events: None,
        })
    }

    //==============================================================================RECORDS
    fn record(&self, group: GroupId) -> Result<(Region, u32), StorageError<S::Error>> {
        let region = self.regions[group.index()].ok_or(StorageError::UnknownGroup)?;
        let tag = if group.survives_firmware_update() {
            PERSISTENT_RECORD_TAG
        } else {
            self.firmware_id
        };
        Ok((region, tag))
    }

    /// Persist the live values of `group`.
    pub fn save(&mut self, group: GroupId) -> Result<(), StorageError<S::Error>> {
        let (region, tag) = self.record(group)?;
        let payload = self
            .dictionary
            .group_bytes(group)
            .ok_or(StorageError::UnknownGroup)?;

        match write_record(&mut self.storage, &region, tag, payload) {
            Ok(true) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("Saved group {}", group);
                Ok(())
            }
            Ok(false) => {
                #[cfg(feature = "defmt")]
                defmt::trace!("Group {} unchanged, save skipped", group);
                Ok(())
            }
            Err(err) => {
                #[cfg(feature = "defmt")]
                defmt::error!("Failed to save group {}", group);
                Err(err)
            }
        }
    }

    /// Reinstate the defaults of `group`, then overlay its stored record.
    ///
    /// On first boot the current live values become the defaults. Any error
    /// leaves the group at its defaults; a corrupt record is invalidated.
    pub fn load(&mut self, group: GroupId, first_boot: bool) -> Result<(), LoadError<S::Error>> {
        let (region, tag) = self.record(group)?;
        if first_boot {
            self.dictionary.capture_defaults(group);
        }
        self.dictionary.apply_defaults(group);

        // The record is verified before anything reaches the live bytes.
        let live = self
            .dictionary
            .group_bytes_mut(group)
            .ok_or(StorageError::UnknownGroup)?;
        match read_record(&mut self.storage, &region, tag, live)? {
            RecordStatus::Valid => Ok(()),
            RecordStatus::Absent => {
                #[cfg(feature = "defmt")]
                defmt::info!("No stored record for group {}, using defaults", group);
                Err(LoadError::Absent)
            }
            RecordStatus::Corrupt => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Corrupt record for group {}, using defaults", group);
                invalidate_record(&mut self.storage, &region)?;
                Err(LoadError::Corrupt)
            }
        }
    }

    /// Discard the stored record of `group`. Live values are untouched; the
    /// defaults apply from the next [`ParameterStore::load`].
    pub fn restore(&mut self, group: GroupId) -> Result<(), StorageError<S::Error>> {
        let (region, _) = self.record(group)?;
        invalidate_record(&mut self.storage, &region)
    }

    /// Load every group of the layout, logging failures.
    pub fn load_all(&mut self, first_boot: bool) {
        for group in GroupId::ALL {
            if self.dictionary.layout().group(group).is_none() {
                continue;
            }
            if let Err(_err) = self.load(group, first_boot) {
                #[cfg(feature = "defmt")]
                defmt::info!("Group {} kept its defaults", group);
            }
        }
    }

    /// Save every externally storable group of the layout.
    pub fn save_externally_storable(&mut self) -> Result<(), StorageError<S::Error>> {
        for group in GroupId::ALL {
            if group.is_externally_storable() && self.dictionary.layout().group(group).is_some() {
                self.save(group)?;
            }
        }
        Ok(())
    }

    /// Discard every record in a way that write-once fields can be set again.
    ///
    /// Live values return to their defaults immediately.
    pub fn factory_reset(&mut self) -> Result<(), StorageError<S::Error>> {
        #[cfg(feature = "defmt")]
        defmt::warn!("Factory reset");
        self.dictionary.clear_validity_flags();
        for group in GroupId::ALL {
            if let Some(region) = self.regions[group.index()] {
                self.dictionary.apply_defaults(group);
                invalidate_record(&mut self.storage, &region)?;
            }
        }
        invalidate_record(&mut self.storage, &self.lss_region)
    }

    //==============================================================================LSS
    pub fn load_lss(&mut self) -> Result<LssSettings, LoadError<S::Error>> {
        let mut raw = [0u8; LSS_PAYLOAD_LEN];
        match read_record(&mut self.storage, &self.lss_region, LSS_RECORD_TAG, &mut raw)? {
            RecordStatus::Valid => Ok(LssSettings::decode(&raw)),
            RecordStatus::Absent => Err(LoadError::Absent),
            RecordStatus::Corrupt => {
                invalidate_record(&mut self.storage, &self.lss_region)?;
                Err(LoadError::Corrupt)
            }
        }
    }

    pub fn save_lss(&mut self, settings: LssSettings) -> Result<(), StorageError<S::Error>> {
        write_record(
            &mut self.storage,
            &self.lss_region,
            LSS_RECORD_TAG,
            &settings.encode(),
        )
        .map(|_| ())
    }

    //==============================================================================NOTIFICATIONS
    /// Register the sink receiving write notifications, or detach it with `None`.
    pub fn set_event_sink(&mut self, sink: Option<DynamicSender<'a, OdEvent>>) {
        self.events = sink;
    }

    pub(crate) fn notify(&self, index: u16, sub_index: u8) {
        if let Some(sink) = &self.events {
            if sink.try_send(OdEvent { index, sub_index }).is_err() {
                #[cfg(feature = "defmt")]
                defmt::warn!("Event queue full, dropped {=u16:#x}:{}", index, sub_index);
            }
        }
    }

    //==============================================================================ACCESSORS
    pub fn dictionary(&self) -> &ObjectDictionary<N> {
        &self.dictionary
    }

    /// Direct access for local code. Writes made here bypass access rights
    /// and notifications.
    pub fn dictionary_mut(&mut self) -> &mut ObjectDictionary<N> {
        &mut self.dictionary
    }

    pub fn region(&self, group: GroupId) -> Option<Region> {
        self.regions[group.index()]
    }

    pub fn lss_region(&self) -> Region {
        self.lss_region
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}

fn check_reserved<E: core::fmt::Debug>(len: usize, reserved: usize) -> Result<(), StorageError<E>> {
    if len + RECORD_OVERHEAD > reserved {
        Err(StorageError::OutOfMemory {
            required: len + RECORD_OVERHEAD,
            capacity: reserved,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
