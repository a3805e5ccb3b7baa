//! Advertising payload construction.
//!
//! A payload is at most [`MAX_PAYLOAD_LEN`] bytes, the legacy advertising data limit. Extended
//! sets use the same limit so any set can fall back to legacy advertising without rebuilding.
use crate::ad_structure::AdStructure;
use crate::codec;
use crate::cursor::WriteCursor;
use crate::Error;

/// Maximum advertising payload length.
pub const MAX_PAYLOAD_LEN: usize = 31;

const FLAGS_LEN: usize = 3;
const TX_POWER_LEN: usize = 3;
const NAME_HEADER_LEN: usize = 2;

/// Encoded advertising payload.
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD_LEN>;

/// Builds payloads from flags, a device name and an optional advertised TX power.
///
/// Fields are always written in the same order: flags, name, TX power. A flags value of 0 and
/// an empty name are left out.
pub struct PayloadBuilder {
    scratch: [u8; MAX_PAYLOAD_LEN],
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadBuilder {
    pub const fn new() -> Self {
        Self {
            scratch: [0; MAX_PAYLOAD_LEN],
        }
    }

    /// Encode a payload with the name as a complete local name.
    ///
    /// Returns [`Error::PayloadTooLarge`] if the fields don't fit. Nothing is returned in that
    /// case, callers shorten the name (see [`PayloadBuilder::fit_name`]) or drop the TX power.
    pub fn build(&mut self, flags: u8, name: &str, tx_power: Option<i8>) -> Result<Payload, Error> {
        self.encode(flags, AdStructure::CompleteLocalName(name.as_bytes()), tx_power)
    }

    /// Encode a payload with the name as a shortened local name.
    pub fn build_shortened(&mut self, flags: u8, name: &str, tx_power: Option<i8>) -> Result<Payload, Error> {
        self.encode(flags, AdStructure::ShortenedLocalName(name.as_bytes()), tx_power)
    }

    /// Encode a payload, shortening the name if it doesn't fit as-is.
    pub fn build_fitted(&mut self, flags: u8, name: &str, tx_power: Option<i8>) -> Result<Payload, Error> {
        let fitted = Self::fit_name(flags, name, tx_power);
        if fitted.len() == name.len() {
            self.build(flags, name, tx_power)
        } else {
            trace!("[adv] name shortened to {} bytes", fitted.len());
            self.build_shortened(flags, fitted, tx_power)
        }
    }

    /// Number of name bytes that fit next to the other fields.
    pub const fn name_budget(flags: u8, tx_power: bool) -> usize {
        let mut used = NAME_HEADER_LEN;
        if flags != 0 {
            used += FLAGS_LEN;
        }
        if tx_power {
            used += TX_POWER_LEN;
        }
        MAX_PAYLOAD_LEN - used
    }

    /// Longest prefix of `name` that fits, cut on a character boundary.
    pub fn fit_name(flags: u8, name: &str, tx_power: Option<i8>) -> &str {
        let budget = Self::name_budget(flags, tx_power.is_some());
        if name.len() <= budget {
            return name;
        }
        let mut end = budget;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        &name[..end]
    }

    fn encode(&mut self, flags: u8, name: AdStructure<'_>, tx_power: Option<i8>) -> Result<Payload, Error> {
        let mut w = WriteCursor::new(&mut self.scratch[..]);
        if let Err(e) = write_fields(&mut w, flags, name, tx_power) {
            debug!("[adv] payload does not fit: {:?}", e);
            return Err(Error::PayloadTooLarge);
        }
        Payload::from_slice(w.finish()).map_err(|_| Error::PayloadTooLarge)
    }
}

fn write_fields(
    w: &mut WriteCursor<'_>,
    flags: u8,
    name: AdStructure<'_>,
    tx_power: Option<i8>,
) -> Result<(), codec::Error> {
    if flags != 0 {
        AdStructure::Flags(flags).encode(w)?;
    }
    match name {
        AdStructure::CompleteLocalName(n) | AdStructure::ShortenedLocalName(n) if n.is_empty() => {}
        name => name.encode(w)?,
    }
    if let Some(power) = tx_power {
        AdStructure::TxPowerLevel(power).encode(w)?;
    }
    Ok(())
}
