//! Non-volatile storage abstraction and the record framing used to persist
//! parameter groups.
//!
//! A record occupies a fixed region of the device:
//!
//! ```text
//! | tag: u32 LE | len: u16 LE | payload (len bytes) | crc32: u32 LE |
//! ```
//!
//! The CRC covers the length field and the payload. The tag is written last,
//! so a record interrupted mid-write never reads back as valid. Overwriting the
//! tag with [`INVALID_RECORD_TAG`] discards a record without erasing it.
use crate::error::StorageError;
use crate::infra::checksum::Crc32;

/// Tag value that never identifies a valid record.
pub const INVALID_RECORD_TAG: u32 = 0;
/// Tag + length prefix.
pub const RECORD_HEADER_LEN: usize = 6;
/// Trailing CRC.
pub const RECORD_TRAILER_LEN: usize = 4;
/// Bytes a record needs on top of its payload.
pub const RECORD_OVERHEAD: usize = RECORD_HEADER_LEN + RECORD_TRAILER_LEN;

const SCRATCH_LEN: usize = 32;

/// Byte-addressable non-volatile memory (EEPROM, flash emulation, file...).
pub trait NvStorage {
    type Error: core::fmt::Debug;
    /// Total number of addressable bytes.
    fn capacity(&self) -> usize;
    /// Fill `buf` with the bytes stored at `address`.
    fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), Self::Error>;
    /// Persist `data` at `address`.
    fn write(&mut self, address: usize, data: &[u8]) -> Result<(), Self::Error>;
}

/// Fixed window of the storage device dedicated to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Region {
    pub address: usize,
    pub reserved: usize,
}

/// Result of inspecting a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordStatus {
    /// Record is sealed and its payload was copied out.
    Valid,
    /// Tag is invalid or belongs to another owner.
    Absent,
    /// Tag matches but length or CRC does not.
    Corrupt,
}

fn payload_crc(payload: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(&(payload.len() as u16).to_le_bytes());
    crc.update(payload);
    crc.value()
}

fn read_u32<S: NvStorage>(storage: &mut S, address: usize) -> Result<u32, StorageError<S::Error>> {
    let mut raw = [0u8; 4];
    storage
        .read(address, &mut raw)
        .map_err(StorageError::Hardware)?;
    Ok(u32::from_le_bytes(raw))
}

fn check_fits(region: &Region, payload_len: usize) -> Result<(), ()> {
    if payload_len + RECORD_OVERHEAD > region.reserved || payload_len > u16::MAX as usize {
        Err(())
    } else {
        Ok(())
    }
}

/// Seal `payload` into `region` under `tag`.
///
/// Returns `Ok(false)` without touching the device when the stored record
/// already carries the same tag and CRC.
pub fn write_record<S: NvStorage>(
    storage: &mut S,
    region: &Region,
    tag: u32,
    payload: &[u8],
) -> Result<bool, StorageError<S::Error>> {
    check_fits(region, payload.len()).map_err(|_| StorageError::OutOfMemory {
        required: payload.len() + RECORD_OVERHEAD,
        capacity: region.reserved,
    })?;

    let crc = payload_crc(payload);
    let crc_address = region.address + RECORD_HEADER_LEN + payload.len();

    let stored_tag = read_u32(storage, region.address)?;
    let stored_crc = read_u32(storage, crc_address)?;
    if stored_tag == tag && stored_crc == crc {
        return Ok(false);
    }

    // Drop the old tag first so a torn write cannot resurrect stale data.
    storage
        .write(region.address, &INVALID_RECORD_TAG.to_le_bytes())
        .map_err(StorageError::Hardware)?;
    storage
        .write(region.address + 4, &(payload.len() as u16).to_le_bytes())
        .map_err(StorageError::Hardware)?;
    storage
        .write(region.address + RECORD_HEADER_LEN, payload)
        .map_err(StorageError::Hardware)?;
    storage
        .write(crc_address, &crc.to_le_bytes())
        .map_err(StorageError::Hardware)?;
    storage
        .write(region.address, &tag.to_le_bytes())
        .map_err(StorageError::Hardware)?;
    Ok(true)
}

/// Copy the payload of the record in `region` into `out`.
///
/// `out` is only written when the record is [`RecordStatus::Valid`]; its
/// length must equal the stored payload length.
pub fn read_record<S: NvStorage>(
    storage: &mut S,
    region: &Region,
    tag: u32,
    out: &mut [u8],
) -> Result<RecordStatus, StorageError<S::Error>> {
    let mut header = [0u8; RECORD_HEADER_LEN];
    storage
        .read(region.address, &mut header)
        .map_err(StorageError::Hardware)?;
    let stored_tag = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let stored_len = u16::from_le_bytes([header[4], header[5]]) as usize;

    if stored_tag == INVALID_RECORD_TAG || stored_tag != tag {
        return Ok(RecordStatus::Absent);
    }
    if stored_len != out.len() || check_fits(region, stored_len).is_err() {
        return Ok(RecordStatus::Corrupt);
    }

    // Verify before copying so a corrupt record never reaches `out`.
    let mut crc = Crc32::new();
    crc.update(&header[4..6]);
    let mut scratch = [0u8; SCRATCH_LEN];
    let mut cursor = 0;
    while cursor < stored_len {
        let chunk = (stored_len - cursor).min(SCRATCH_LEN);
        storage
            .read(region.address + RECORD_HEADER_LEN + cursor, &mut scratch[..chunk])
            .map_err(StorageError::Hardware)?;
        crc.update(&scratch[..chunk]);
        cursor += chunk;
    }
    let stored_crc = read_u32(storage, region.address + RECORD_HEADER_LEN + stored_len)?;
    if stored_crc != crc.value() {
        return Ok(RecordStatus::Corrupt);
    }

    storage
        .read(region.address + RECORD_HEADER_LEN, out)
        .map_err(StorageError::Hardware)?;
    Ok(RecordStatus::Valid)
}

/// Discard the record in `region` by overwriting its tag.
pub fn invalidate_record<S: NvStorage>(
    storage: &mut S,
    region: &Region,
) -> Result<(), StorageError<S::Error>> {
    storage
        .write(region.address, &INVALID_RECORD_TAG.to_le_bytes())
        .map_err(StorageError::Hardware)
}

//==================================================================================RAM_STORAGE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failures reported by [`RamStorage`].
pub enum RamStorageError {
    OutOfRange { address: usize, len: usize },
    WriteProtected,
}

/// Storage backed by a RAM array, starting erased (`0xFF`).
///
/// Useful for hosts without non-volatile memory and for simulating a
/// power cycle: hand the same instance to a freshly built store.
#[derive(Debug, Clone)]
pub struct RamStorage<const N: usize> {
    bytes: [u8; N],
    write_protected: bool,
    writes: usize,
}

impl<const N: usize> Default for RamStorage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RamStorage<N> {
    pub const fn new() -> Self {
        Self {
            bytes: [0xFF; N],
            write_protected: false,
            writes: 0,
        }
    }

    /// Reject every following write, emulating a failing device.
    pub fn set_write_protected(&mut self, protected: bool) {
        self.write_protected = protected;
    }

    /// Number of successful write operations so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn range(&self, address: usize, len: usize) -> Result<core::ops::Range<usize>, RamStorageError> {
        let end = address
            .checked_add(len)
            .filter(|end| *end <= N)
            .ok_or(RamStorageError::OutOfRange { address, len })?;
        Ok(address..end)
    }
}

impl<const N: usize> NvStorage for RamStorage<N> {
    type Error = RamStorageError;

    fn capacity(&self) -> usize {
        N
    }

    fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(address, buf.len())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write(&mut self, address: usize, data: &[u8]) -> Result<(), Self::Error> {
        if self.write_protected {
            return Err(RamStorageError::WriteProtected);
        }
        let range = self.range(address, data.len())?;
        self.bytes[range].copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }
}
