//! Parameter store behavior across simulated power cycles.
mod helpers;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use helpers::{od_image, od_layout, IMAGE_LEN, OUTPUT_DELAY, OUTPUT_MODE, SERIAL_NUMBER, SERIAL_VALID, STORAGE_LEN};
use korri_canopen::core::GroupId;
use korri_canopen::error::{LoadError, SdoAbort};
use korri_canopen::infra::storage::RamStorage;
use korri_canopen::protocol::parameters::access::{Direction, ObjectAccess};
use korri_canopen::protocol::parameters::dictionary::ObjectDictionary;
use korri_canopen::protocol::parameters::shared::SharedParameters;
use korri_canopen::protocol::parameters::store::{OdEvent, ParameterStore};
use korri_canopen::protocol::parameters::{
    LOAD_SIGNATURE, RESTORE_DEFAULTS_INDEX, SAVE_SIGNATURE, STORE_PARAMETERS_INDEX,
};

const FIRMWARE_ID: u32 = 0x0102_0304;

type Store<'a> = ParameterStore<'a, RamStorage<STORAGE_LEN>, IMAGE_LEN>;

/// Build a store on `storage` and run the boot-time load of every group.
fn power_up<'a>(storage: RamStorage<STORAGE_LEN>, first_boot: bool) -> Store<'a> {
    let dictionary = ObjectDictionary::new(od_layout(), od_image()).unwrap();
    let mut store = ParameterStore::new(dictionary, storage, FIRMWARE_ID).unwrap();
    store.load_all(first_boot);
    store
}

fn write_u16(store: &mut impl ObjectAccess, (index, sub_index): (u16, u8), value: u16) -> Result<usize, SdoAbort> {
    store.access(Direction::Write, index, sub_index, &mut value.to_le_bytes())
}

fn write_u32(store: &mut impl ObjectAccess, (index, sub_index): (u16, u8), value: u32) -> Result<usize, SdoAbort> {
    store.access(Direction::Write, index, sub_index, &mut value.to_le_bytes())
}

#[test]
/// Store command persists application parameters across power cycles.
fn test_store_command_survives_power_cycle() {
    let mut store = power_up(RamStorage::new(), true);
    write_u16(&mut store, OUTPUT_DELAY, 640).unwrap();
    write_u16(&mut store, OUTPUT_MODE, 3).unwrap();
    assert_eq!(write_u32(&mut store, (STORE_PARAMETERS_INDEX, 1), SAVE_SIGNATURE), Ok(4));

    let store = power_up(store.into_storage(), false);
    assert_eq!(store.dictionary().get::<u16>(OUTPUT_DELAY.0, OUTPUT_DELAY.1), 640);
    assert_eq!(store.dictionary().get::<u16>(OUTPUT_MODE.0, OUTPUT_MODE.1), 3);
}

#[test]
/// Without the signature nothing is persisted.
fn test_unsigned_store_is_lost_on_power_cycle() {
    let mut store = power_up(RamStorage::new(), true);
    write_u16(&mut store, OUTPUT_DELAY, 640).unwrap();
    assert_eq!(
        write_u32(&mut store, (STORE_PARAMETERS_INDEX, 1), LOAD_SIGNATURE),
        Err(SdoAbort::InvalidData)
    );

    let store = power_up(store.into_storage(), false);
    assert_eq!(store.dictionary().get::<u16>(OUTPUT_DELAY.0, OUTPUT_DELAY.1), 100);
}

#[test]
/// Restore defaults takes effect at the next power-up only.
fn test_restore_command_applies_after_power_cycle() {
    let mut store = power_up(RamStorage::new(), true);
    write_u16(&mut store, OUTPUT_DELAY, 640).unwrap();
    write_u32(&mut store, (STORE_PARAMETERS_INDEX, 1), SAVE_SIGNATURE).unwrap();
    assert_eq!(write_u32(&mut store, (RESTORE_DEFAULTS_INDEX, 1), LOAD_SIGNATURE), Ok(4));
    assert_eq!(store.dictionary().get::<u16>(OUTPUT_DELAY.0, OUTPUT_DELAY.1), 640);

    let mut store = power_up(store.into_storage(), false);
    assert_eq!(store.dictionary().get::<u16>(OUTPUT_DELAY.0, OUTPUT_DELAY.1), 100);
    assert!(matches!(store.load(GroupId::Params, false), Err(LoadError::Absent)));
}

#[test]
/// The serial number is written once, persisted at once, and stays locked.
fn test_serial_number_locked_across_power_cycles() {
    let mut store = power_up(RamStorage::new(), true);
    assert_eq!(write_u32(&mut store, SERIAL_NUMBER, 0x00C0_FFEE), Ok(4));

    let mut store = power_up(store.into_storage(), false);
    assert_eq!(store.dictionary().get::<u32>(SERIAL_NUMBER.0, SERIAL_NUMBER.1), 0x00C0_FFEE);
    assert!(store.dictionary().get::<bool>(SERIAL_VALID.0, SERIAL_VALID.1));

    let mut buffer = 0x0BAD_F00Du32.to_le_bytes();
    assert_eq!(
        store.access(Direction::Write, SERIAL_NUMBER.0, SERIAL_NUMBER.1, &mut buffer),
        Err(SdoAbort::InvalidData)
    );
    assert_eq!(u32::from_le_bytes(buffer), 0x00C0_FFEE);

    store.factory_reset().unwrap();
    let mut store = power_up(store.into_storage(), false);
    assert_eq!(write_u32(&mut store, SERIAL_NUMBER, 7), Ok(4));
}

#[test]
/// A new firmware starts from its defaults but keeps the serial number.
fn test_firmware_update_keeps_manufacturing_data() {
    let mut store = power_up(RamStorage::new(), true);
    write_u16(&mut store, OUTPUT_DELAY, 640).unwrap();
    write_u32(&mut store, (STORE_PARAMETERS_INDEX, 1), SAVE_SIGNATURE).unwrap();
    write_u32(&mut store, SERIAL_NUMBER, 77).unwrap();

    let dictionary = ObjectDictionary::new(od_layout(), od_image()).unwrap();
    let mut updated: Store<'_> =
        ParameterStore::new(dictionary, store.into_storage(), FIRMWARE_ID + 1).unwrap();
    updated.load_all(false);
    assert_eq!(updated.dictionary().get::<u16>(OUTPUT_DELAY.0, OUTPUT_DELAY.1), 100);
    assert_eq!(updated.dictionary().get::<u32>(SERIAL_NUMBER.0, SERIAL_NUMBER.1), 77);
}

#[test]
/// Shared access from several call paths, with write notifications.
fn test_shared_store_notifies_writes() {
    let events: Channel<CriticalSectionRawMutex, OdEvent, 2> = Channel::new();
    let mut store = power_up(RamStorage::new(), true);
    store.set_event_sink(Some(events.dyn_sender()));
    let shared = SharedParameters::new(store);

    let mut access = &shared;
    write_u16(&mut access, OUTPUT_MODE, 1).unwrap();
    write_u16(&mut access, OUTPUT_DELAY, 250).unwrap();

    assert_eq!(
        events.try_receive().ok(),
        Some(OdEvent { index: OUTPUT_DELAY.0, sub_index: OUTPUT_DELAY.1 })
    );
    assert!(events.try_receive().is_err());
    assert_eq!(
        shared.lock(|store| store.dictionary().get::<u16>(OUTPUT_DELAY.0, OUTPUT_DELAY.1)),
        250
    );
}
