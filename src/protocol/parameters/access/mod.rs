//! Object access path used by the protocol stack (SDO server, PDO mapping).
//!
//! Reads and writes address entries by `(index, sub_index)` and honor the
//! declared [`Access`] rights. Two kinds of entries get special handling:
//!
//! - store/restore commands (0x1010/0x1011) only act when the written value
//!   is the matching signature, and always keep their reported value;
//! - write-once fields accept a single write, guarded by a boolean validity
//!   flag, and are persisted immediately.
//!
//! On every rejected write the previous bytes of the entry are copied back
//! into the caller's buffer.
use crate::core::{Access, EntryDescriptor, GroupId, ValueKind};
use crate::error::SdoAbort;
use crate::infra::storage::NvStorage;
use crate::protocol::parameters::store::ParameterStore;
use crate::protocol::parameters::{ALL_GROUPS_SUB_INDEX, LOAD_SIGNATURE, SAVE_SIGNATURE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Read,
    Write,
}

/// Callback signature binding protocol services to dictionary entries.
pub trait ObjectAccess {
    /// Read into `buffer` or write from `buffer`. Returns the number of bytes
    /// transferred.
    fn access(
        &mut self,
        direction: Direction,
        index: u16,
        sub_index: u8,
        buffer: &mut [u8],
    ) -> Result<usize, SdoAbort>;
}

#[derive(Clone, Copy)]
enum Command {
    Store,
    Restore,
}

impl<'a, S: NvStorage, const N: usize> ParameterStore<'a, S, N> {
    fn lookup(&self, index: u16, sub_index: u8) -> Result<EntryDescriptor, SdoAbort> {
        let layout = self.dictionary().layout();
        match layout.entry(index, sub_index) {
            Some(entry) => Ok(*entry),
            None if layout.has_index(index) => Err(SdoAbort::SubUnknown),
            None => Err(SdoAbort::ObjectUnknown),
        }
    }

    fn read_entry(&self, entry: &EntryDescriptor, buffer: &mut [u8]) -> Result<usize, SdoAbort> {
        let bytes = self.dictionary().entry_bytes(entry);
        let len = match entry.kind {
            ValueKind::VisibleString(_) => bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len()),
            _ => bytes.len(),
        };
        let target = buffer.get_mut(..len).ok_or(SdoAbort::LengthMismatch)?;
        target.copy_from_slice(&bytes[..len]);
        Ok(len)
    }

    /// Copy `buffer` into the entry, zero padding strings.
    fn store_bytes(&mut self, entry: &EntryDescriptor, buffer: &[u8]) -> Result<usize, SdoAbort> {
        let valid_len = match entry.kind {
            ValueKind::VisibleString(capacity) => buffer.len() <= capacity,
            kind => buffer.len() == kind.size(),
        };
        if !valid_len {
            return Err(SdoAbort::LengthMismatch);
        }
        let target = self.dictionary_mut().entry_bytes_mut(entry);
        target[..buffer.len()].copy_from_slice(buffer);
        target[buffer.len()..].fill(0);
        Ok(buffer.len())
    }

    fn reinstate(&self, entry: &EntryDescriptor, buffer: &mut [u8]) {
        let bytes = self.dictionary().entry_bytes(entry);
        let len = bytes.len().min(buffer.len());
        buffer[..len].copy_from_slice(&bytes[..len]);
    }

    fn write_command(
        &mut self,
        entry: &EntryDescriptor,
        command: Command,
        buffer: &mut [u8],
    ) -> Result<usize, SdoAbort> {
        if buffer.len() != 4 {
            return Err(SdoAbort::LengthMismatch);
        }
        let signature = u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
        // The command object keeps reporting its capabilities, not the signature.
        self.reinstate(entry, buffer);

        let expected = match command {
            Command::Store => SAVE_SIGNATURE,
            Command::Restore => LOAD_SIGNATURE,
        };
        if signature != expected {
            return Err(SdoAbort::InvalidData);
        }

        let layout = *self.dictionary().layout();
        if entry.sub_index == ALL_GROUPS_SUB_INDEX {
            for group in GroupId::ALL {
                if group.is_externally_storable() && layout.group(group).is_some() {
                    self.run_command(command, group)?;
                }
            }
            return Ok(4);
        }

        let group = GroupId::from_command_sub_index(entry.sub_index)
            .filter(|group| layout.group(*group).is_some())
            .ok_or(SdoAbort::SubUnknown)?;
        if !group.is_externally_storable() {
            return Err(SdoAbort::UnsupportedAccess);
        }
        self.run_command(command, group)?;
        Ok(4)
    }

    fn run_command(&mut self, command: Command, group: GroupId) -> Result<(), SdoAbort> {
        let result = match command {
            Command::Store => self.save(group),
            Command::Restore => self.restore(group),
        };
        result.map_err(|_| SdoAbort::Hardware)
    }

    /// Write a field guarded by `flag`, then persist its group at once.
    ///
    /// A failing save is reported but the field stays written and locked for
    /// the rest of the session.
    fn write_once(
        &mut self,
        entry: &EntryDescriptor,
        flag: (u16, u8),
        buffer: &mut [u8],
    ) -> Result<usize, SdoAbort> {
        if self.dictionary().get::<bool>(flag.0, flag.1) {
            self.reinstate(entry, buffer);
            return Err(SdoAbort::InvalidData);
        }
        let written = self.store_bytes(entry, buffer)?;
        self.dictionary_mut().set(flag.0, flag.1, true);
        if let Err(_err) = self.save(entry.group) {
            #[cfg(feature = "defmt")]
            defmt::error!(
                "Failed to persist write-once {=u16:#x}:{}",
                entry.index,
                entry.sub_index
            );
            return Err(SdoAbort::Hardware);
        }
        Ok(written)
    }
}

impl<'a, S: NvStorage, const N: usize> ObjectAccess for ParameterStore<'a, S, N> {
    fn access(
        &mut self,
        direction: Direction,
        index: u16,
        sub_index: u8,
        buffer: &mut [u8],
    ) -> Result<usize, SdoAbort> {
        let entry = self.lookup(index, sub_index)?;
        if direction == Direction::Read {
            return self.read_entry(&entry, buffer);
        }

        let written = match entry.access {
            Access::Const | Access::ReadOnly => return Err(SdoAbort::ReadOnly),
            Access::StoreCommand => return self.write_command(&entry, Command::Store, buffer),
            Access::RestoreCommand => return self.write_command(&entry, Command::Restore, buffer),
            Access::WriteOnce { flag } => self.write_once(&entry, flag, buffer)?,
            Access::ReadWrite => self.store_bytes(&entry, buffer)?,
        };
        if entry.notify {
            self.notify(index, sub_index);
        }
        Ok(written)
    }
}
