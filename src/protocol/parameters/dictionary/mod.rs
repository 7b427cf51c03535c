//! Object dictionary image with typed accessors.
//!
//! The image is one byte array holding every group back to back, as laid out
//! by the [`OdLayout`] descriptors. A second array keeps the defaults every
//! load starts from.
//!
//! Accessors never fail: reading an absent entry, or an entry whose declared
//! kind differs from the requested type, yields the type's zero value, and
//! writing one is ignored. Use [`ObjectDictionary::contains`] to tell a zero
//! value from a missing entry.
use crate::core::{Access, EntryDescriptor, GroupId, OdLayout, ValueKind};
use crate::error::LayoutError;

//==================================================================================OD_VALUE
/// Scalar types storable in the dictionary.
pub trait OdValue: Copy + Default {
    const KIND: ValueKind;
    /// Decode from exactly `KIND.size()` bytes.
    fn read(bytes: &[u8]) -> Self;
    /// Encode into exactly `KIND.size()` bytes.
    fn write(self, bytes: &mut [u8]);
}

impl OdValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn read(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn write(self, bytes: &mut [u8]) {
        bytes[0] = self as u8;
    }
}

macro_rules! le_od_value {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl OdValue for $ty {
                const KIND: ValueKind = ValueKind::$kind;

                fn read(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; core::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..core::mem::size_of::<$ty>()]);
                    <$ty>::from_le_bytes(raw)
                }

                fn write(self, bytes: &mut [u8]) {
                    bytes[..core::mem::size_of::<$ty>()].copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

le_od_value!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
);

/// Tagged view of an entry value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    VisibleString(&'a str),
}

/// Text up to the first NUL. Invalid UTF-8 is cut at the last valid character.
fn decode_str(bytes: &[u8]) -> &str {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    match core::str::from_utf8(&bytes[..end]) {
        Ok(text) => text,
        Err(err) => core::str::from_utf8(&bytes[..err.valid_up_to()]).unwrap_or(""),
    }
}

//==================================================================================DICTIONARY
/// Live and default images of a validated layout.
pub struct ObjectDictionary<const N: usize> {
    layout: OdLayout,
    live: [u8; N],
    defaults: [u8; N],
}

impl<const N: usize> ObjectDictionary<N> {
    /// Validate `layout` against an image of `N` bytes. `image` provides the
    /// compiled-in values, which also become the initial defaults.
    pub fn new(layout: OdLayout, image: [u8; N]) -> Result<Self, LayoutError> {
        validate(&layout, N)?;
        Ok(Self {
            layout,
            live: image,
            defaults: image,
        })
    }

    pub fn layout(&self) -> &OdLayout {
        &self.layout
    }

    pub fn entry(&self, index: u16, sub_index: u8) -> Option<&EntryDescriptor> {
        self.layout.entry(index, sub_index)
    }

    /// Whether `(index, sub_index)` names an entry.
    pub fn contains(&self, index: u16, sub_index: u8) -> bool {
        self.entry(index, sub_index).is_some()
    }

    fn typed_entry(&self, index: u16, sub_index: u8, kind: ValueKind) -> Option<EntryDescriptor> {
        self.entry(index, sub_index)
            .filter(|entry| entry.kind == kind)
            .copied()
    }

    /// Typed read. Zero when absent or declared with another kind.
    pub fn get<T: OdValue>(&self, index: u16, sub_index: u8) -> T {
        self.typed_entry(index, sub_index, T::KIND)
            .map(|entry| T::read(&self.live[entry.offset..entry.end()]))
            .unwrap_or_default()
    }

    /// Typed write. Ignored when absent or declared with another kind.
    pub fn set<T: OdValue>(&mut self, index: u16, sub_index: u8, value: T) {
        if let Some(entry) = self.typed_entry(index, sub_index, T::KIND) {
            value.write(&mut self.live[entry.offset..entry.end()]);
        }
    }

    /// String read. Empty when absent or not a string entry.
    pub fn get_str(&self, index: u16, sub_index: u8) -> &str {
        match self.entry(index, sub_index) {
            Some(entry) if matches!(entry.kind, ValueKind::VisibleString(_)) => {
                decode_str(&self.live[entry.offset..entry.end()])
            }
            _ => "",
        }
    }

    /// String write, truncated to the entry capacity on a character boundary
    /// and NUL padded. Ignored when absent or not a string entry.
    pub fn set_str(&mut self, index: u16, sub_index: u8, value: &str) {
        let Some(entry) = self.entry(index, sub_index).copied() else {
            return;
        };
        let ValueKind::VisibleString(capacity) = entry.kind else {
            return;
        };
        let mut len = value.len().min(capacity);
        while !value.is_char_boundary(len) {
            len -= 1;
        }
        let target = &mut self.live[entry.offset..entry.end()];
        target[..len].copy_from_slice(&value.as_bytes()[..len]);
        target[len..].fill(0);
    }

    /// Tagged read of any entry.
    pub fn value(&self, index: u16, sub_index: u8) -> Option<Value<'_>> {
        let entry = self.entry(index, sub_index)?;
        let bytes = &self.live[entry.offset..entry.end()];
        let value = match entry.kind {
            ValueKind::Bool => Value::Bool(bool::read(bytes)),
            ValueKind::U8 => Value::U8(u8::read(bytes)),
            ValueKind::U16 => Value::U16(u16::read(bytes)),
            ValueKind::U32 => Value::U32(u32::read(bytes)),
            ValueKind::U64 => Value::U64(u64::read(bytes)),
            ValueKind::I8 => Value::I8(i8::read(bytes)),
            ValueKind::I16 => Value::I16(i16::read(bytes)),
            ValueKind::I32 => Value::I32(i32::read(bytes)),
            ValueKind::I64 => Value::I64(i64::read(bytes)),
            ValueKind::F32 => Value::F32(f32::read(bytes)),
            ValueKind::VisibleString(_) => Value::VisibleString(decode_str(bytes)),
        };
        Some(value)
    }

    /// Raw bytes of an entry of this layout.
    pub fn entry_bytes(&self, entry: &EntryDescriptor) -> &[u8] {
        &self.live[entry.offset..entry.end()]
    }

    pub(crate) fn entry_bytes_mut(&mut self, entry: &EntryDescriptor) -> &mut [u8] {
        &mut self.live[entry.offset..entry.end()]
    }

    /// Live bytes of a group.
    pub fn group_bytes(&self, group: GroupId) -> Option<&[u8]> {
        let descriptor = self.layout.group(group)?;
        Some(&self.live[descriptor.offset..descriptor.end()])
    }

    pub(crate) fn group_bytes_mut(&mut self, group: GroupId) -> Option<&mut [u8]> {
        let descriptor = *self.layout.group(group)?;
        Some(&mut self.live[descriptor.offset..descriptor.end()])
    }

    /// Default bytes of a group.
    pub fn default_bytes(&self, group: GroupId) -> Option<&[u8]> {
        let descriptor = self.layout.group(group)?;
        Some(&self.defaults[descriptor.offset..descriptor.end()])
    }

    /// Take the current live values of `group` as its defaults.
    pub(crate) fn capture_defaults(&mut self, group: GroupId) {
        if let Some(descriptor) = self.layout.group(group).copied() {
            let range = descriptor.offset..descriptor.end();
            self.defaults[range.clone()].copy_from_slice(&self.live[range]);
        }
    }

    /// Overwrite the live values of `group` with its defaults.
    pub(crate) fn apply_defaults(&mut self, group: GroupId) {
        if let Some(descriptor) = self.layout.group(group).copied() {
            let range = descriptor.offset..descriptor.end();
            self.live[range.clone()].copy_from_slice(&self.defaults[range]);
        }
    }

    /// Clear every write-once validity flag, in live and default images.
    pub(crate) fn clear_validity_flags(&mut self) {
        let layout = self.layout;
        for entry in layout.entries {
            if let Access::WriteOnce { flag } = entry.access {
                if let Some(flag_entry) = layout.entry(flag.0, flag.1) {
                    self.live[flag_entry.offset] = 0;
                    self.defaults[flag_entry.offset] = 0;
                }
            }
        }
    }
}

//==================================================================================VALIDATION
fn validate(layout: &OdLayout, image_len: usize) -> Result<(), LayoutError> {
    for (position, group) in layout.groups.iter().enumerate() {
        if group.end() > image_len {
            return Err(LayoutError::GroupOutOfBounds {
                end: group.end(),
                image: image_len,
            });
        }
        for other in &layout.groups[position + 1..] {
            if other.id == group.id {
                return Err(LayoutError::DuplicateGroup);
            }
            if group.offset < other.end() && other.offset < group.end() {
                return Err(LayoutError::GroupOverlap);
            }
        }
    }

    for entry in layout.entries {
        let (index, sub_index) = (entry.index, entry.sub_index);
        let group = layout
            .group(entry.group)
            .ok_or(LayoutError::MissingGroup { index, sub_index })?;
        if entry.offset < group.offset || entry.end() > group.end() {
            return Err(LayoutError::EntryOutOfBounds { index, sub_index });
        }
        match entry.access {
            Access::WriteOnce { flag } => {
                let flag_entry = layout
                    .entry(flag.0, flag.1)
                    .filter(|flag_entry| flag_entry.kind == ValueKind::Bool)
                    .ok_or(LayoutError::InvalidValidityFlag { index, sub_index })?;
                if flag_entry.group != entry.group {
                    return Err(LayoutError::ValidityFlagGroupMismatch { index, sub_index });
                }
            }
            Access::StoreCommand | Access::RestoreCommand => {
                if entry.kind != ValueKind::U32 {
                    return Err(LayoutError::InvalidCommandEntry { index, sub_index });
                }
            }
            Access::Const | Access::ReadOnly | Access::ReadWrite => {}
        }
    }
    Ok(())
}
