//! Persistent parameter store: typed access to the object dictionary image,
//! durable records per parameter group, and the signature-gated object access
//! path used by the protocol stack.
pub mod access;
pub mod dictionary;
pub mod shared;
pub mod store;

/// "save" in little-endian ASCII, required by the store parameters command.
pub const SAVE_SIGNATURE: u32 = 0x6576_6173;
/// "load" in little-endian ASCII, required by the restore defaults command.
pub const LOAD_SIGNATURE: u32 = 0x6461_6F6C;

/// Store parameters command object.
pub const STORE_PARAMETERS_INDEX: u16 = 0x1010;
/// Restore default parameters command object.
pub const RESTORE_DEFAULTS_INDEX: u16 = 0x1011;
/// Command sub-index addressing every externally storable group at once.
pub const ALL_GROUPS_SUB_INDEX: u8 = 1;

#[cfg(test)]
pub(crate) mod fixtures;
