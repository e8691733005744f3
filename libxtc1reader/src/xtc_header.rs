use bitvec::prelude::*;
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::Write;

use super::constants::*;
use super::error::XtcHeaderError;
use super::type_id::TypeId;

/// Named damage bits (bit positions within the 24 flag bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DamageFlag {
    DroppedContribution = 1,
    Uninitialized = 11,
    OutOfOrder = 12,
    OutOfSynch = 13,
    UserDefined = 14,
    IncompleteContribution = 15,
    ContainsIncomplete = 16,
}

impl DamageFlag {
    pub fn from_bit(bit: usize) -> Option<Self> {
        match bit {
            1 => Some(Self::DroppedContribution),
            11 => Some(Self::Uninitialized),
            12 => Some(Self::OutOfOrder),
            13 => Some(Self::OutOfSynch),
            14 => Some(Self::UserDefined),
            15 => Some(Self::IncompleteContribution),
            16 => Some(Self::ContainsIncomplete),
            _ => None,
        }
    }
}

/// Data quality word: 24 status flag bits, 8 user bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Damage(pub u32);

impl Damage {
    pub fn flags(&self) -> u32 {
        self.0 & DAMAGE_FLAGS_MASK
    }

    pub fn user_bits(&self) -> u8 {
        (self.0 >> DAMAGE_USER_SHIFT) as u8
    }

    pub fn has_damage(&self, flag: DamageFlag) -> bool {
        self.flags() & (1 << flag as u32) != 0
    }

    pub fn is_damaged(&self) -> bool {
        self.flags() != 0
    }

    /// Positions of every set flag bit, lowest first
    pub fn set_bits(&self) -> Vec<usize> {
        let flags = self.flags();
        flags.view_bits::<Lsb0>().iter_ones().collect()
    }

    /// The set flags which have a name. Unnamed bits are only visible through set_bits.
    pub fn named_flags(&self) -> Vec<DamageFlag> {
        self.set_bits()
            .into_iter()
            .filter_map(DamageFlag::from_bit)
            .collect()
    }
}

/// Source identifier. The logical word carries level and process id, the
/// physical word carries detector and device identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Src {
    pub log: u32,
    pub phy: u32,
}

impl Src {
    pub fn level(&self) -> u8 {
        (self.log >> 24) as u8
    }

    pub fn process_id(&self) -> u32 {
        self.log & 0x00FF_FFFF
    }

    pub fn detector_type(&self) -> u8 {
        (self.phy >> 24) as u8
    }

    pub fn detector_id(&self) -> u8 {
        ((self.phy >> 16) & 0xFF) as u8
    }

    pub fn device_type(&self) -> u8 {
        ((self.phy >> 8) & 0xFF) as u8
    }

    pub fn device_id(&self) -> u8 {
        (self.phy & 0xFF) as u8
    }
}

/// Type tag: id[0:16] | version[16:31] | compressed[31]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TypeIdInfo(pub u32);

impl TypeIdInfo {
    pub fn new(type_id: u16, version: u16, compressed: bool) -> Self {
        let mut value = type_id as u32 | ((version as u32 & VERSION_MASK) << VERSION_SHIFT);
        if compressed {
            value |= COMPRESSED_BIT;
        }
        Self(value)
    }

    pub fn type_id(&self) -> u16 {
        (self.0 & TYPE_ID_MASK) as u16
    }

    pub fn version(&self) -> u16 {
        ((self.0 >> VERSION_SHIFT) & VERSION_MASK) as u16
    }

    pub fn compressed(&self) -> bool {
        self.0 & COMPRESSED_BIT != 0
    }

    pub fn kind(&self) -> TypeId {
        TypeId::from(self.type_id())
    }
}

/// The 20 byte header in front of every Xtc container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XtcHeader {
    pub damage: Damage,
    pub src: Src,
    pub contains: TypeIdInfo,
    /// Total size including this header
    pub extent: u32,
}

impl XtcHeader {
    /// Decode the header found at `offset` in `bytes`
    pub fn decode(bytes: &[u8], offset: usize) -> Result<Self, XtcHeaderError> {
        let available = bytes.len().saturating_sub(offset);
        if available < XTC_HEADER_SIZE {
            return Err(XtcHeaderError::TruncatedHeader { offset, available });
        }
        let buf = &bytes[offset..offset + XTC_HEADER_SIZE];
        Ok(Self {
            damage: Damage(LittleEndian::read_u32(&buf[0..4])),
            src: Src {
                log: LittleEndian::read_u32(&buf[4..8]),
                phy: LittleEndian::read_u32(&buf[8..12]),
            },
            contains: TypeIdInfo(LittleEndian::read_u32(&buf[12..16])),
            extent: LittleEndian::read_u32(&buf[16..20]),
        })
    }

    /// Complete a header whose damage word was read separately from the other 16 bytes
    pub fn from_split(damage: Damage, remainder: &[u8]) -> Result<Self, XtcHeaderError> {
        if remainder.len() < XTC_HEADER_REMAINDER {
            return Err(XtcHeaderError::TruncatedHeader {
                offset: DAMAGE_SIZE,
                available: remainder.len() + DAMAGE_SIZE,
            });
        }
        Ok(Self {
            damage,
            src: Src {
                log: LittleEndian::read_u32(&remainder[0..4]),
                phy: LittleEndian::read_u32(&remainder[4..8]),
            },
            contains: TypeIdInfo(LittleEndian::read_u32(&remainder[8..12])),
            extent: LittleEndian::read_u32(&remainder[12..16]),
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), std::io::Error> {
        writer.write_u32::<LittleEndian>(self.damage.0)?;
        writer.write_u32::<LittleEndian>(self.src.log)?;
        writer.write_u32::<LittleEndian>(self.src.phy)?;
        writer.write_u32::<LittleEndian>(self.contains.0)?;
        writer.write_u32::<LittleEndian>(self.extent)?;
        Ok(())
    }

    pub fn encode(&self) -> [u8; XTC_HEADER_SIZE] {
        let mut buf = [0u8; XTC_HEADER_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.damage.0);
        LittleEndian::write_u32(&mut buf[4..8], self.src.log);
        LittleEndian::write_u32(&mut buf[8..12], self.src.phy);
        LittleEndian::write_u32(&mut buf[12..16], self.contains.0);
        LittleEndian::write_u32(&mut buf[16..20], self.extent);
        buf
    }

    /// Size of the data following the header. Zero for a malformed extent.
    pub fn payload_size(&self) -> usize {
        (self.extent as usize).saturating_sub(XTC_HEADER_SIZE)
    }

    pub fn is_container(&self) -> bool {
        self.contains.kind() == TypeId::Xtc
    }
}

/// Serialize one complete container: a header whose extent covers `data`, then `data`
pub fn encode_xtc(damage: Damage, src: Src, contains: TypeIdInfo, data: &[u8]) -> Vec<u8> {
    let header = XtcHeader {
        damage,
        src,
        contains,
        extent: (XTC_HEADER_SIZE + data.len()) as u32,
    };
    let mut bytes = Vec::with_capacity(XTC_HEADER_SIZE + data.len());
    bytes.extend_from_slice(&header.encode());
    bytes.extend_from_slice(data);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> XtcHeader {
        XtcHeader {
            damage: Damage(0x0201_8002),
            src: Src {
                log: 0x0100_0ABC,
                phy: 0x1A02_0304,
            },
            contains: TypeIdInfo::new(28, 2, true),
            extent: 155_292,
        }
    }

    #[test]
    fn test_header_round_trip() {
        let header = sample_header();
        let bytes = header.encode();
        assert_eq!(XtcHeader::decode(&bytes, 0).unwrap(), header);

        let mut written: Vec<u8> = Vec::new();
        header.write_to(&mut written).unwrap();
        assert_eq!(written.as_slice(), &bytes);
    }

    #[test]
    fn test_decode_at_offset_and_truncation() {
        let mut bytes = vec![0xFFu8; 7];
        bytes.extend_from_slice(&sample_header().encode());
        assert_eq!(XtcHeader::decode(&bytes, 7).unwrap(), sample_header());
        assert_eq!(
            XtcHeader::decode(&bytes, 8),
            Err(XtcHeaderError::TruncatedHeader {
                offset: 8,
                available: 19
            })
        );
        assert!(XtcHeader::decode(&bytes, 100).is_err());
    }

    #[test]
    fn test_type_tag_bits() {
        let tag = TypeIdInfo(0x8005_001C);
        assert_eq!(tag.type_id(), 28);
        assert_eq!(tag.version(), 5);
        assert!(tag.compressed());
        assert_eq!(tag.kind(), TypeId::CspadElement);

        let tag = TypeIdInfo(0x7FFF_0001);
        assert_eq!(tag.version(), 0x7FFF);
        assert!(!tag.compressed());
        assert_eq!(TypeIdInfo::new(1, 0x7FFF, false), tag);
    }

    #[test]
    fn test_src_fields() {
        let src = sample_header().src;
        assert_eq!(src.level(), 1);
        assert_eq!(src.process_id(), 0xABC);
        assert_eq!(src.detector_type(), 0x1A);
        assert_eq!(src.detector_id(), 2);
        assert_eq!(src.device_type(), 3);
        assert_eq!(src.device_id(), 4);
    }

    #[test]
    fn test_damage_flags() {
        let damage = sample_header().damage;
        assert_eq!(damage.user_bits(), 0x02);
        assert_eq!(damage.flags(), 0x01_8002);
        assert!(damage.has_damage(DamageFlag::DroppedContribution));
        assert!(damage.has_damage(DamageFlag::IncompleteContribution));
        assert!(damage.has_damage(DamageFlag::ContainsIncomplete));
        assert!(!damage.has_damage(DamageFlag::OutOfOrder));
        assert_eq!(damage.set_bits(), vec![1, 15, 16]);
        assert_eq!(
            damage.named_flags(),
            vec![
                DamageFlag::DroppedContribution,
                DamageFlag::IncompleteContribution,
                DamageFlag::ContainsIncomplete
            ]
        );
        assert!(!Damage(0xFF00_0000).is_damaged());
    }

    #[test]
    fn test_split_header() {
        let header = sample_header();
        let bytes = header.encode();
        let rebuilt = XtcHeader::from_split(header.damage, &bytes[4..]).unwrap();
        assert_eq!(rebuilt, header);
        assert!(XtcHeader::from_split(header.damage, &bytes[4..12]).is_err());
    }
}
