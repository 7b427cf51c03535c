//! 11-bit identifier handling: masked identifier filters as used by the
//! receive buffer table.
use embedded_can::{Id, StandardId};

/// Valid bits of a standard identifier.
pub const STD_ID_MASK: u16 = 0x07FF;

// Remote-request flag folded above the 11 identifier bits so that it is
// always part of the comparison.
const RTR_BIT: u16 = 0x0800;

//==================================================================================ID_FILTER
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Identifier/mask pair matching standard frames.
///
/// A frame matches when every bit selected by the mask equals the stored
/// identifier. The remote-request flag is always compared, whatever the mask.
pub struct IdFilter {
    ident: u16,
    mask: u16,
}

impl IdFilter {
    /// Build a filter. Bits above the 11-bit range are ignored.
    pub fn new(identifier: u16, mask: u16, rtr: bool) -> Self {
        let rtr_bit = if rtr { RTR_BIT } else { 0 };
        Self {
            ident: (identifier & STD_ID_MASK) | rtr_bit,
            mask: (mask & STD_ID_MASK) | RTR_BIT,
        }
    }

    /// Filter accepting exactly one identifier.
    pub fn exact(identifier: u16, rtr: bool) -> Self {
        Self::new(identifier, STD_ID_MASK, rtr)
    }

    pub fn identifier(&self) -> u16 {
        self.ident & STD_ID_MASK
    }

    pub fn mask(&self) -> u16 {
        self.mask & STD_ID_MASK
    }

    pub fn rtr(&self) -> bool {
        self.ident & RTR_BIT != 0
    }

    /// Mask-compare against a received identifier.
    pub fn matches(&self, id: StandardId, rtr: bool) -> bool {
        let raw = id.as_raw() | if rtr { RTR_BIT } else { 0 };
        ((raw ^ self.ident) & self.mask) == 0
    }

    /// Same as [`IdFilter::matches`], extended identifiers never match.
    pub fn matches_id(&self, id: Id, rtr: bool) -> bool {
        match id {
            Id::Standard(standard) => self.matches(standard, rtr),
            Id::Extended(_) => false,
        }
    }
}

/// Build a standard identifier from its raw value, truncating to 11 bits.
pub fn standard_id(raw: u16) -> StandardId {
    // Masked value is always within range.
    StandardId::new(raw & STD_ID_MASK).unwrap_or(StandardId::ZERO)
}
