use byteorder::{ByteOrder, LittleEndian};
use std::io::Write;

use super::constants::*;
use super::error::XtcHeaderError;
use super::sequence::{ClockTime, Env, Sequence, TimeStamp};
use super::walker::{walk, XtcWalker};
use super::xtc_header::{Damage, Src, TypeIdInfo, XtcHeader};

/// The decoded outer header of one event record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatagramHeader {
    pub seq: Sequence,
    pub env: Env,
    pub xtc: XtcHeader,
}

/// The fixed 24 byte chunk at the start of every record. It ends with only the
/// damage word of the outer Xtc; the other 16 header bytes follow it on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatagramChunk {
    pub seq: Sequence,
    pub env: Env,
    pub damage: Damage,
}

impl DatagramChunk {
    pub fn parse(buffer: &[u8; DATAGRAM_CHUNK_SIZE]) -> Self {
        let clock = ClockTime {
            nanoseconds: LittleEndian::read_u32(&buffer[0..4]),
            seconds: LittleEndian::read_u32(&buffer[4..8]),
        };
        let stamp = TimeStamp::from_words(
            LittleEndian::read_u32(&buffer[8..12]),
            LittleEndian::read_u32(&buffer[12..16]),
        );
        Self {
            seq: Sequence { clock, stamp },
            env: Env(LittleEndian::read_u32(&buffer[16..20])),
            damage: Damage(LittleEndian::read_u32(&buffer[20..24])),
        }
    }

    /// Merge with the remaining 16 header bytes to get the full datagram header
    pub fn complete(&self, remainder: &[u8]) -> Result<DatagramHeader, XtcHeaderError> {
        Ok(DatagramHeader {
            seq: self.seq,
            env: self.env,
            xtc: XtcHeader::from_split(self.damage, remainder)?,
        })
    }
}

/// One event record.
///
/// The payload holds the last 16 bytes of the outer Xtc header followed by the
/// outer Xtc data, so every payload has its child containers at the same offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub header: DatagramHeader,
    pub payload: Vec<u8>,
}

impl Datagram {
    /// Build a datagram around the data of its outer Xtc
    pub fn new(seq: Sequence, env: Env, damage: Damage, src: Src, contains: TypeIdInfo, data: &[u8]) -> Self {
        let xtc = XtcHeader {
            damage,
            src,
            contains,
            extent: (XTC_HEADER_SIZE + data.len()) as u32,
        };
        let mut payload = Vec::with_capacity(XTC_HEADER_REMAINDER + data.len());
        payload.extend_from_slice(&xtc.encode()[DAMAGE_SIZE..]);
        payload.extend_from_slice(data);
        Self {
            header: DatagramHeader { seq, env, xtc },
            payload,
        }
    }

    /// The data of the outer Xtc, i.e. its child containers
    pub fn contents(&self) -> &[u8] {
        self.payload.get(XTC_HEADER_REMAINDER..).unwrap_or(&[])
    }

    /// Walk the container tree below the outer Xtc. Yields nothing when the
    /// outer Xtc holds a detector payload instead of child containers.
    pub fn walk(&self, depth_limit: usize) -> XtcWalker<'_> {
        if self.header.xtc.is_container() {
            walk(self.contents(), depth_limit)
        } else {
            walk(&[], depth_limit)
        }
    }

    /// Total size of the record on disk
    pub fn record_size(&self) -> usize {
        SEQUENCE_SIZE + ENV_SIZE + DAMAGE_SIZE + self.payload.len()
    }

    /// Write the record in wire format
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), std::io::Error> {
        self.header.seq.write_to(writer)?;
        self.header.env.write_to(writer)?;
        self.header.xtc.write_to(writer)?;
        writer.write_all(self.contents())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_parse_and_complete() {
        let seq = Sequence {
            clock: ClockTime::new(1_600_000_000, 123),
            stamp: TimeStamp {
                ticks: 42,
                control: 3,
                fiducials: 0x1_0001,
                vector: 77,
            },
        };
        let dgram = Datagram::new(
            seq,
            Env(0xDEAD),
            Damage(0x4000),
            Src { log: 1, phy: 2 },
            TypeIdInfo::new(1, 1, false),
            &[9, 9, 9, 9],
        );
        let mut bytes: Vec<u8> = Vec::new();
        dgram.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), dgram.record_size());
        assert_eq!(bytes.len(), 24 + 16 + 4);

        let chunk_bytes: [u8; DATAGRAM_CHUNK_SIZE] = bytes[..24].try_into().unwrap();
        let chunk = DatagramChunk::parse(&chunk_bytes);
        assert_eq!(chunk.seq, seq);
        assert_eq!(chunk.env, Env(0xDEAD));
        assert_eq!(chunk.damage, Damage(0x4000));

        let header = chunk.complete(&bytes[24..40]).unwrap();
        assert_eq!(header, dgram.header);
        assert_eq!(header.xtc.extent, 24);
        assert_eq!(&bytes[24..], dgram.payload.as_slice());
        assert_eq!(dgram.contents(), &[9, 9, 9, 9]);
    }

    #[test]
    fn test_walk_only_below_containers() {
        // A complete 20 byte child header, so the bytes would parse as a container
        let child = crate::xtc_header::encode_xtc(
            Damage(0),
            Src::default(),
            TypeIdInfo::new(17, 1, false),
            &[],
        );
        let outer = |type_id| {
            Datagram::new(
                Sequence::default(),
                Env(0),
                Damage(0),
                Src::default(),
                TypeIdInfo::new(type_id, 1, false),
                &child,
            )
        };
        assert_eq!(outer(1).walk(10).count(), 1);
        assert_eq!(outer(2).walk(10).count(), 0);
    }
}
