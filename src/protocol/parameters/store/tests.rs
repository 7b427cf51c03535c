use super::*;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::infra::storage::{RamStorage, RamStorageError, RECORD_HEADER_LEN};
use crate::protocol::parameters::fixtures::*;

const FIRMWARE_ID: u32 = 0x0001_0203;

type Store<'a> = ParameterStore<'a, RamStorage<256>, IMAGE_LEN>;

fn store_on(storage: RamStorage<256>, firmware_id: u32) -> Store<'static> {
    let dictionary = ObjectDictionary::new(layout(), image()).unwrap();
    ParameterStore::new(dictionary, storage, firmware_id).unwrap()
}

fn fresh_store() -> Store<'static> {
    store_on(RamStorage::new(), FIRMWARE_ID)
}

fn output_delay(store: &Store<'_>) -> u16 {
    store.dictionary().get(OUTPUT_DELAY.0, OUTPUT_DELAY.1)
}

//==================================================================================LAYOUT
#[test]
/// Surviving groups from the start, the others and LSS from the end.
fn test_region_layout() {
    let store = fresh_store();
    assert_eq!(store.region(GroupId::Serial), Some(Region { address: 0, reserved: 32 }));
    assert_eq!(store.region(GroupId::Calibration), Some(Region { address: 32, reserved: 32 }));
    assert_eq!(store.region(GroupId::Runtime), Some(Region { address: 64, reserved: 16 }));
    assert_eq!(store.region(GroupId::Params), Some(Region { address: 192, reserved: 64 }));
    assert_eq!(store.region(GroupId::Communication), Some(Region { address: 144, reserved: 48 }));
    assert_eq!(store.lss_region(), Region { address: 128, reserved: 16 });
    assert_eq!(store.region(GroupId::Test), None);
}

#[test]
fn test_storage_too_small() {
    let dictionary = ObjectDictionary::new(layout(), image()).unwrap();
    let result = ParameterStore::new(dictionary, RamStorage::<128>::new(), FIRMWARE_ID);
    assert!(matches!(
        result,
        Err(StorageError::OutOfMemory { required: 208, capacity: 128 })
    ));
}

//==================================================================================SAVE_LOAD
#[test]
/// Saved values survive a simulated restart.
fn test_save_load_across_restart() {
    let mut store = fresh_store();
    store.dictionary_mut().set(OUTPUT_DELAY.0, OUTPUT_DELAY.1, 777u16);
    store.dictionary_mut().set_str(DEVICE_NAME.0, DEVICE_NAME.1, "pump");
    store.save(GroupId::Params).unwrap();

    let mut restarted = store_on(store.into_storage(), FIRMWARE_ID);
    assert_eq!(output_delay(&restarted), 250);
    restarted.load(GroupId::Params, false).unwrap();
    assert_eq!(output_delay(&restarted), 777);
    assert_eq!(restarted.dictionary().get_str(DEVICE_NAME.0, DEVICE_NAME.1), "pump");
}

#[test]
fn test_load_absent_keeps_defaults() {
    let mut store = fresh_store();
    store.dictionary_mut().set(OUTPUT_DELAY.0, OUTPUT_DELAY.1, 9u16);
    assert!(matches!(store.load(GroupId::Params, false), Err(LoadError::Absent)));
    assert_eq!(output_delay(&store), 250);
}

#[test]
/// A damaged record reports corrupt once, then reads as absent.
fn test_corrupt_record_invalidated() {
    let mut store = fresh_store();
    store.dictionary_mut().set(OUTPUT_DELAY.0, OUTPUT_DELAY.1, 777u16);
    store.save(GroupId::Params).unwrap();
    let payload = store.region(GroupId::Params).unwrap().address + RECORD_HEADER_LEN;

    let mut storage = store.into_storage();
    storage.as_bytes_mut()[payload] ^= 0x01;

    let mut restarted = store_on(storage, FIRMWARE_ID);
    assert!(matches!(restarted.load(GroupId::Params, false), Err(LoadError::Corrupt)));
    assert_eq!(output_delay(&restarted), 250);
    assert!(matches!(restarted.load(GroupId::Params, false), Err(LoadError::Absent)));
}

#[test]
/// A record with an intact payload but a bad checksum never reaches the live image.
fn test_bad_checksum_keeps_live_defaults() {
    let mut store = fresh_store();
    store.dictionary_mut().set(OUTPUT_DELAY.0, OUTPUT_DELAY.1, 777u16);
    store.save(GroupId::Params).unwrap();
    let payload_len = store.dictionary().group_bytes(GroupId::Params).unwrap().len();
    let crc = store.region(GroupId::Params).unwrap().address + RECORD_HEADER_LEN + payload_len;

    let mut storage = store.into_storage();
    storage.as_bytes_mut()[crc] ^= 0x80;

    let mut restarted = store_on(storage, FIRMWARE_ID);
    assert!(matches!(restarted.load(GroupId::Params, false), Err(LoadError::Corrupt)));
    assert_eq!(output_delay(&restarted), 250);
}

#[test]
/// Restore never touches live values; the next load falls back to defaults.
fn test_restore_applies_on_next_load() {
    let mut store = fresh_store();
    store.dictionary_mut().set(OUTPUT_DELAY.0, OUTPUT_DELAY.1, 777u16);
    store.save(GroupId::Params).unwrap();

    store.restore(GroupId::Params).unwrap();
    assert_eq!(output_delay(&store), 777);

    assert!(matches!(store.load(GroupId::Params, false), Err(LoadError::Absent)));
    assert_eq!(output_delay(&store), 250);
}

#[test]
/// First boot adopts the live values as defaults.
fn test_first_boot_captures_defaults() {
    let mut store = fresh_store();
    store.dictionary_mut().set(OUTPUT_DELAY.0, OUTPUT_DELAY.1, 300u16);
    assert!(matches!(store.load(GroupId::Params, true), Err(LoadError::Absent)));
    assert_eq!(output_delay(&store), 300);

    store.dictionary_mut().set(OUTPUT_DELAY.0, OUTPUT_DELAY.1, 5u16);
    let _ = store.load(GroupId::Params, false);
    assert_eq!(output_delay(&store), 300);
}

#[test]
/// Saving unchanged values does not write the device again.
fn test_unchanged_save_skipped() {
    let mut store = fresh_store();
    store.save(GroupId::Params).unwrap();
    let writes = store.storage().write_count();
    store.save(GroupId::Params).unwrap();
    assert_eq!(store.storage().write_count(), writes);

    store.dictionary_mut().set(ENABLED.0, ENABLED.1, true);
    store.save(GroupId::Params).unwrap();
    assert!(store.storage().write_count() > writes);
}

#[test]
/// A new firmware discards application parameters but keeps calibration.
fn test_firmware_update() {
    let mut store = fresh_store();
    store.dictionary_mut().set(OUTPUT_DELAY.0, OUTPUT_DELAY.1, 777u16);
    store.dictionary_mut().set(CAL_OFFSET.0, CAL_OFFSET.1, -12i32);
    store.save(GroupId::Params).unwrap();
    store.save(GroupId::Calibration).unwrap();

    let mut updated = store_on(store.into_storage(), FIRMWARE_ID + 1);
    assert!(matches!(updated.load(GroupId::Params, false), Err(LoadError::Absent)));
    updated.load(GroupId::Calibration, false).unwrap();
    assert_eq!(output_delay(&updated), 250);
    assert_eq!(updated.dictionary().get::<i32>(CAL_OFFSET.0, CAL_OFFSET.1), -12);
}

#[test]
fn test_save_hardware_failure() {
    let mut store = fresh_store();
    store.storage_mut().set_write_protected(true);
    assert!(matches!(
        store.save(GroupId::Params),
        Err(StorageError::Hardware(RamStorageError::WriteProtected))
    ));
}

#[test]
fn test_unknown_group() {
    let mut store = fresh_store();
    assert!(matches!(store.save(GroupId::Test), Err(StorageError::UnknownGroup)));
    assert!(matches!(
        store.load(GroupId::Test, false),
        Err(LoadError::Storage(StorageError::UnknownGroup))
    ));
}

//==================================================================================LSS
#[test]
fn test_lss_round_trip() {
    let mut store = fresh_store();
    assert!(matches!(store.load_lss(), Err(LoadError::Absent)));

    let settings = LssSettings { node_id: 5, bit_rate: 250 };
    store.save_lss(settings).unwrap();

    let mut restarted = store_on(store.into_storage(), FIRMWARE_ID + 1);
    assert_eq!(restarted.load_lss().unwrap(), settings);
}

#[test]
/// Factory reset unlocks write-once fields and discards every record.
fn test_factory_reset() {
    let mut store = fresh_store();
    store.dictionary_mut().set(SERIAL_NUMBER.0, SERIAL_NUMBER.1, 4242u32);
    store.dictionary_mut().set(SERIAL_VALID.0, SERIAL_VALID.1, true);
    store.save(GroupId::Serial).unwrap();
    store.save_lss(LssSettings { node_id: 9, bit_rate: 500 }).unwrap();

    store.factory_reset().unwrap();
    assert!(!store.dictionary().get::<bool>(SERIAL_VALID.0, SERIAL_VALID.1));
    assert_eq!(store.dictionary().get::<u32>(SERIAL_NUMBER.0, SERIAL_NUMBER.1), 0);
    assert!(matches!(store.load(GroupId::Serial, false), Err(LoadError::Absent)));
    assert!(matches!(store.load_lss(), Err(LoadError::Absent)));
}

//==================================================================================EVENTS
#[test]
/// Notifications never block: a full queue drops the event.
fn test_event_sink_drops_when_full() {
    let channel: Channel<CriticalSectionRawMutex, OdEvent, 1> = Channel::new();
    let mut store: ParameterStore<'_, RamStorage<256>, IMAGE_LEN> = ParameterStore::new(
        ObjectDictionary::new(layout(), image()).unwrap(),
        RamStorage::new(),
        FIRMWARE_ID,
    )
    .unwrap();
    store.set_event_sink(Some(channel.dyn_sender()));

    store.notify(OUTPUT_DELAY.0, OUTPUT_DELAY.1);
    store.notify(SERIAL_NUMBER.0, SERIAL_NUMBER.1);

    assert_eq!(
        channel.try_receive().ok(),
        Some(OdEvent { index: OUTPUT_DELAY.0, sub_index: OUTPUT_DELAY.1 })
    );
    assert!(channel.try_receive().is_err());

    store.set_event_sink(None);
    store.notify(OUTPUT_DELAY.0, OUTPUT_DELAY.1);
    assert!(channel.try_receive().is_err());
}
