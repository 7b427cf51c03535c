//! Defines the "data contract" between the firmware's object dictionary
//! tables and the parameter store.
//!
//! Firmware describes every addressable parameter with static descriptors.
//! The `parameters` module consumes those descriptors to read, write and
//! persist the raw bytes of the dictionary image.

/// Semantic type of a dictionary entry.
///
/// Closed set of storable values; typed accessors check the requested type
/// against this tag instead of reinterpreting raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValueKind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    /// Fixed-length, NUL padded string. Carries the capacity in bytes.
    VisibleString(usize),
}

impl ValueKind {
    /// Number of bytes the entry occupies in the image.
    pub const fn size(&self) -> usize {
        match self {
            ValueKind::Bool | ValueKind::U8 | ValueKind::I8 => 1,
            ValueKind::U16 | ValueKind::I16 => 2,
            ValueKind::U32 | ValueKind::I32 | ValueKind::F32 => 4,
            ValueKind::U64 | ValueKind::I64 => 8,
            ValueKind::VisibleString(len) => *len,
        }
    }
}

/// Named parameter groups, each persisted as one independent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GroupId {
    /// Communication parameters, managed by the protocol stack.
    Communication,
    /// Application parameters.
    Params,
    /// Runtime counters (operating hours, boot count...).
    Runtime,
    /// Manufacturing identity (serial number and its validity flag).
    Serial,
    /// End-of-line test results.
    Test,
    /// Calibration data.
    Calibration,
}

impl GroupId {
    pub const ALL: [GroupId; 6] = [
        GroupId::Communication,
        GroupId::Params,
        GroupId::Runtime,
        GroupId::Serial,
        GroupId::Test,
        GroupId::Calibration,
    ];

    /// Position in [`GroupId::ALL`].
    pub const fn index(self) -> usize {
        match self {
            GroupId::Communication => 0,
            GroupId::Params => 1,
            GroupId::Runtime => 2,
            GroupId::Serial => 3,
            GroupId::Test => 4,
            GroupId::Calibration => 5,
        }
    }

    /// Sub-index of the store (0x1010) and restore (0x1011) commands that
    /// addresses this group. Sub-index 1 addresses every externally storable group.
    pub const fn command_sub_index(self) -> u8 {
        match self {
            GroupId::Communication => 2,
            GroupId::Params => 3,
            GroupId::Runtime => 4,
            GroupId::Serial => 5,
            GroupId::Test => 6,
            GroupId::Calibration => 7,
        }
    }

    /// Inverse of [`GroupId::command_sub_index`].
    pub fn from_command_sub_index(sub_index: u8) -> Option<Self> {
        GroupId::ALL
            .into_iter()
            .find(|group| group.command_sub_index() == sub_index)
    }

    /// Whether the store/restore commands may act on this group.
    ///
    /// Communication and runtime data are owned by internal logic, the serial
    /// group only changes through its write-once fields.
    pub const fn is_externally_storable(self) -> bool {
        matches!(self, GroupId::Params | GroupId::Test | GroupId::Calibration)
    }

    /// Groups whose records stay valid across firmware updates.
    pub const fn survives_firmware_update(self) -> bool {
        matches!(
            self,
            GroupId::Runtime | GroupId::Serial | GroupId::Test | GroupId::Calibration
        )
    }
}

/// Byte range of a group inside the dictionary image.
#[derive(Debug, Clone, Copy)]
pub struct GroupDescriptor {
    /// 1. Group identity.
    pub id: GroupId,
    /// 2. Offset of the first byte in the image.
    pub offset: usize,
    /// 3. Number of payload bytes.
    pub len: usize,
    /// 4. Bytes reserved in non-volatile storage, record overhead included.
    pub reserved: usize,
}

impl GroupDescriptor {
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Access rights and special handling of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Access {
    /// Compile-time constant.
    Const,
    /// Readable, updated only by local code.
    ReadOnly,
    ReadWrite,
    /// Write-once field guarded by the boolean entry at `(index, sub_index)`.
    WriteOnce { flag: (u16, u8) },
    /// Signature-gated "store parameters" command.
    StoreCommand,
    /// Signature-gated "restore default parameters" command.
    RestoreCommand,
}

/// Descriptor for a single dictionary entry.
#[derive(Debug, Clone, Copy)]
pub struct EntryDescriptor {
    /// 1. Object index.
    pub index: u16,
    /// 2. Sub-index.
    pub sub_index: u8,
    /// 3. Human-readable name.
    pub name: &'static str,
    /// 4. Stored type.
    pub kind: ValueKind,
    /// 5. Owning group.
    pub group: GroupId,
    /// 6. Absolute offset of the first byte in the image.
    pub offset: usize,
    /// 7. Access rights.
    pub access: Access,
    /// 8. Emit a write notification after a successful external write.
    pub notify: bool,
}

impl EntryDescriptor {
    pub const fn end(&self) -> usize {
        self.offset + self.kind.size()
    }
}

/// Complete static description of a dictionary image.
#[derive(Debug, Clone, Copy)]
pub struct OdLayout {
    pub groups: &'static [GroupDescriptor],
    pub entries: &'static [EntryDescriptor],
}

impl OdLayout {
    pub fn group(&self, id: GroupId) -> Option<&GroupDescriptor> {
        self.groups.iter().find(|group| group.id == id)
    }

    pub fn entry(&self, index: u16, sub_index: u8) -> Option<&EntryDescriptor> {
        self.entries
            .iter()
            .find(|entry| entry.index == index && entry.sub_index == sub_index)
    }

    /// True when at least one entry uses `index`, whatever its sub-index.
    pub fn has_index(&self, index: u16) -> bool {
        self.entries.iter().any(|entry| entry.index == index)
    }
}
