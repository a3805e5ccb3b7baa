//! Advertising data structures.
//!
//! Every structure is encoded as length, type and value, where the length byte covers the type
//! byte and the value.
use crate::codec;
use crate::cursor::{ReadCursor, WriteCursor};

pub const AD_FLAG_LE_LIMITED_DISCOVERABLE: u8 = 0b00000001;
pub const LE_GENERAL_DISCOVERABLE: u8 = 0b00000010;
pub const BR_EDR_NOT_SUPPORTED: u8 = 0b00000100;
pub const SIMUL_LE_BR_CONTROLLER: u8 = 0b00001000;
pub const SIMUL_LE_BR_HOST: u8 = 0b00010000;

pub(crate) const AD_TYPE_FLAGS: u8 = 0x01;
pub(crate) const AD_TYPE_SHORTENED_LOCAL_NAME: u8 = 0x08;
pub(crate) const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
pub(crate) const AD_TYPE_TX_POWER_LEVEL: u8 = 0x0a;
pub(crate) const AD_TYPE_MANUFACTURER_SPECIFIC_DATA: u8 = 0xff;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdStructure<'a> {
    /// Device flags and baseband capabilities.
    ///
    /// This should be sent if any flags apply to the device. If not (ie. the value sent would be
    /// 0), this may be omitted.
    ///
    /// Must not be used in scan response data.
    Flags(u8),

    /// Sets the full (unabbreviated) device name.
    ///
    /// This will be shown to the user when this device is found.
    CompleteLocalName(&'a [u8]),

    /// Sets the shortened device name.
    ShortenedLocalName(&'a [u8]),

    /// Transmit power level in dBm, as radiated by the advertiser.
    TxPowerLevel(i8),

    /// Set manufacturer specific data
    ManufacturerSpecificData {
        company_identifier: u16,
        payload: &'a [u8],
    },

    /// An unknown or unimplemented AD structure stored as raw bytes.
    Unknown {
        /// Type byte.
        ty: u8,
        /// Raw data transmitted after the type.
        data: &'a [u8],
    },
}

impl<'d> AdStructure<'d> {
    pub fn encode_slice(data: &[AdStructure<'_>], dest: &mut [u8]) -> Result<usize, codec::Error> {
        let mut w = WriteCursor::new(dest);
        for item in data.iter() {
            item.encode(&mut w)?;
        }
        Ok(w.len())
    }

    /// Number of bytes this structure occupies once encoded.
    pub fn encoded_len(&self) -> usize {
        2 + match self {
            AdStructure::Flags(_) | AdStructure::TxPowerLevel(_) => 1,
            AdStructure::CompleteLocalName(name) | AdStructure::ShortenedLocalName(name) => name.len(),
            AdStructure::ManufacturerSpecificData { payload, .. } => 2 + payload.len(),
            AdStructure::Unknown { data, .. } => data.len(),
        }
    }

    pub fn encode(&self, w: &mut WriteCursor<'_>) -> Result<(), codec::Error> {
        // The length byte can't describe more than 254 bytes of value.
        if self.encoded_len() - 1 > u8::MAX as usize {
            return Err(codec::Error::InvalidValue);
        }
        if w.available() < self.encoded_len() {
            return Err(codec::Error::InsufficientSpace);
        }
        match self {
            AdStructure::Flags(flags) => {
                w.append(&[0x02, AD_TYPE_FLAGS, *flags])?;
            }
            AdStructure::ShortenedLocalName(name) => {
                w.append(&[(name.len() + 1) as u8, AD_TYPE_SHORTENED_LOCAL_NAME])?;
                w.append(name)?;
            }
            AdStructure::CompleteLocalName(name) => {
                w.append(&[(name.len() + 1) as u8, AD_TYPE_COMPLETE_LOCAL_NAME])?;
                w.append(name)?;
            }
            AdStructure::TxPowerLevel(power) => {
                w.append(&[0x02, AD_TYPE_TX_POWER_LEVEL])?;
                w.write(*power)?;
            }
            AdStructure::ManufacturerSpecificData {
                company_identifier,
                payload,
            } => {
                w.append(&[(payload.len() + 3) as u8, AD_TYPE_MANUFACTURER_SPECIFIC_DATA])?;
                w.write(*company_identifier)?;
                w.append(payload)?;
            }
            AdStructure::Unknown { ty, data } => {
                w.append(&[(data.len() + 1) as u8, *ty])?;
                w.append(data)?;
            }
        }
        Ok(())
    }

    pub fn decode(data: &[u8]) -> impl Iterator<Item = Result<AdStructure<'_>, codec::Error>> {
        AdStructureIter {
            cursor: ReadCursor::new(data),
        }
    }
}

pub struct AdStructureIter<'d> {
    cursor: ReadCursor<'d>,
}

impl<'d> AdStructureIter<'d> {
    fn read(&mut self) -> Result<AdStructure<'d>, codec::Error> {
        let len: u8 = self.cursor.read()?;
        if len == 0 {
            return Err(codec::Error::InvalidValue);
        }
        let code: u8 = self.cursor.read()?;
        let data = self.cursor.slice(len as usize - 1)?;
        match code {
            AD_TYPE_FLAGS => match data {
                [flags] => Ok(AdStructure::Flags(*flags)),
                _ => Err(codec::Error::InvalidValue),
            },
            AD_TYPE_SHORTENED_LOCAL_NAME => Ok(AdStructure::ShortenedLocalName(data)),
            AD_TYPE_COMPLETE_LOCAL_NAME => Ok(AdStructure::CompleteLocalName(data)),
            AD_TYPE_TX_POWER_LEVEL => match data {
                [power] => Ok(AdStructure::TxPowerLevel(*power as i8)),
                _ => Err(codec::Error::InvalidValue),
            },
            AD_TYPE_MANUFACTURER_SPECIFIC_DATA => {
                let mut r = ReadCursor::new(data);
                let company_identifier: u16 = r.read()?;
                let payload = r.slice(r.available())?;
                Ok(AdStructure::ManufacturerSpecificData {
                    company_identifier,
                    payload,
                })
            }
            ty => Ok(AdStructure::Unknown { ty, data }),
        }
    }
}

impl<'d> Iterator for AdStructureIter<'d> {
    type Item = Result<AdStructure<'d>, codec::Error>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.available() == 0 {
            return None;
        }
        let item = self.read();
        if item.is_err() {
            // Malformed input: stop after reporting it once.
            let rest = self.cursor.available();
            let _ = self.cursor.slice(rest);
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_in_declared_order() {
        let mut buf = [0u8; 31];
        let len = AdStructure::encode_slice(
            &[
                AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
                AdStructure::CompleteLocalName(b"beacon"),
                AdStructure::TxPowerLevel(-8),
            ],
            &mut buf[..],
        )
        .unwrap();
        assert_eq!(
            &buf[..len],
            &[0x02, 0x01, 0x06, 0x07, 0x09, b'b', b'e', b'a', b'c', b'o', b'n', 0x02, 0x0a, 0xf8]
        );
    }

    #[test]
    fn structure_that_does_not_fit_writes_nothing() {
        let mut buf = [0u8; 6];
        let mut w = WriteCursor::new(&mut buf[..]);
        AdStructure::Flags(0x06).encode(&mut w).unwrap();
        let err = AdStructure::CompleteLocalName(b"toolong").encode(&mut w);
        assert_eq!(err, Err(codec::Error::InsufficientSpace));
        assert_eq!(w.len(), 3);
    }

    #[test]
    fn decodes_known_and_unknown_structures() {
        let data = [
            0x02, 0x01, 0x06, 0x03, 0x08, b'a', b'b', 0x02, 0x0a, 0x04, 0x05, 0xff, 0x59, 0x00, 0xaa, 0xbb, 0x02, 0x19,
            0x40,
        ];
        let mut it = AdStructure::decode(&data[..]);
        assert_eq!(it.next(), Some(Ok(AdStructure::Flags(0x06))));
        assert_eq!(it.next(), Some(Ok(AdStructure::ShortenedLocalName(b"ab"))));
        assert_eq!(it.next(), Some(Ok(AdStructure::TxPowerLevel(4))));
        assert_eq!(
            it.next(),
            Some(Ok(AdStructure::ManufacturerSpecificData {
                company_identifier: 0x0059,
                payload: &[0xaa, 0xbb],
            }))
        );
        assert_eq!(
            it.next(),
            Some(Ok(AdStructure::Unknown {
                ty: 0x19,
                data: &[0x40]
            }))
        );
        assert_eq!(it.next(), None);
    }

    #[test]
    fn truncated_input_is_reported_once() {
        let data = [0x05, 0x09, b'a'];
        let mut it = AdStructure::decode(&data[..]);
        assert_eq!(it.next(), Some(Err(codec::Error::InsufficientSpace)));
        assert_eq!(it.next(), None);
    }
}
