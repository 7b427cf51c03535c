//! Small dictionary shared by the parameter unit tests.
use crate::core::{Access, EntryDescriptor, GroupDescriptor, GroupId, OdLayout, ValueKind};

pub const IMAGE_LEN: usize = 64;

pub const HEARTBEAT: (u16, u8) = (0x1017, 0);
pub const OUTPUT_DELAY: (u16, u8) = (0x2000, 1);
pub const GAIN: (u16, u8) = (0x2000, 2);
pub const ENABLED: (u16, u8) = (0x2000, 3);
pub const DEVICE_NAME: (u16, u8) = (0x2001, 0);
pub const OPERATING_HOURS: (u16, u8) = (0x2100, 0);
pub const SERIAL_NUMBER: (u16, u8) = (0x1018, 4);
pub const SERIAL_VALID: (u16, u8) = (0x2200, 1);
pub const CAL_OFFSET: (u16, u8) = (0x2300, 1);

const fn entry(
    (index, sub_index): (u16, u8),
    name: &'static str,
    kind: ValueKind,
    group: GroupId,
    offset: usize,
    access: Access,
    notify: bool,
) -> EntryDescriptor {
    EntryDescriptor {
        index,
        sub_index,
        name,
        kind,
        group,
        offset,
        access,
        notify,
    }
}

pub static GROUPS: [GroupDescriptor; 5] = [
    GroupDescriptor { id: GroupId::Communication, offset: 0, len: 24, reserved: 48 },
    GroupDescriptor { id: GroupId::Params, offset: 24, len: 16, reserved: 64 },
    GroupDescriptor { id: GroupId::Runtime, offset: 40, len: 4, reserved: 16 },
    GroupDescriptor { id: GroupId::Serial, offset: 44, len: 8, reserved: 32 },
    GroupDescriptor { id: GroupId::Calibration, offset: 52, len: 8, reserved: 32 },
];

pub static ENTRIES: [EntryDescriptor; 15] = [
    entry(HEARTBEAT, "Producer heartbeat time", ValueKind::U16, GroupId::Communication, 0, Access::ReadWrite, false),
    entry((0x1010, 1), "Save all parameters", ValueKind::U32, GroupId::Communication, 4, Access::StoreCommand, false),
    entry((0x1010, 2), "Save communication parameters", ValueKind::U32, GroupId::Communication, 8, Access::StoreCommand, false),
    entry((0x1010, 3), "Save application parameters", ValueKind::U32, GroupId::Communication, 12, Access::StoreCommand, false),
    entry((0x1011, 1), "Restore all default parameters", ValueKind::U32, GroupId::Communication, 16, Access::RestoreCommand, false),
    entry((0x1011, 3), "Restore application default parameters", ValueKind::U32, GroupId::Communication, 20, Access::RestoreCommand, false),
    entry(OUTPUT_DELAY, "Output delay", ValueKind::U16, GroupId::Params, 24, Access::ReadWrite, true),
    entry(GAIN, "Gain", ValueKind::F32, GroupId::Params, 26, Access::ReadWrite, false),
    entry(ENABLED, "Enabled", ValueKind::Bool, GroupId::Params, 30, Access::ReadWrite, false),
    entry(DEVICE_NAME, "Device name", ValueKind::VisibleString(8), GroupId::Params, 31, Access::ReadWrite, false),
    entry(OPERATING_HOURS, "Operating hours", ValueKind::U32, GroupId::Runtime, 40, Access::ReadOnly, false),
    entry(SERIAL_NUMBER, "Serial number", ValueKind::U32, GroupId::Serial, 44, Access::WriteOnce { flag: SERIAL_VALID }, true),
    entry(SERIAL_VALID, "Serial number valid", ValueKind::Bool, GroupId::Serial, 48, Access::ReadOnly, false),
    entry(CAL_OFFSET, "Calibration offset", ValueKind::I32, GroupId::Calibration, 52, Access::ReadWrite, false),
    entry((0x2300, 2), "Calibration scale", ValueKind::F32, GroupId::Calibration, 56, Access::ReadWrite, false),
];

pub fn layout() -> OdLayout {
    OdLayout {
        groups: &GROUPS,
        entries: &ENTRIES,
    }
}

/// Compiled-in values: heartbeat 1000 ms, command objects reporting
/// "saves on command", output delay 250, device name "io8".
pub fn image() -> [u8; IMAGE_LEN] {
    let mut image = [0u8; IMAGE_LEN];
    image[0..2].copy_from_slice(&1000u16.to_le_bytes());
    for offset in [4, 8, 12, 16, 20] {
        image[offset..offset + 4].copy_from_slice(&1u32.to_le_bytes());
    }
    image[24..26].copy_from_slice(&250u16.to_le_bytes());
    image[26..30].copy_from_slice(&1.5f32.to_le_bytes());
    image[31..34].copy_from_slice(b"io8");
    image
}
