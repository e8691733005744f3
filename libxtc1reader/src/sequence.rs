use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt::Display;
use std::io::{Read, Write};
use time::OffsetDateTime;

use super::constants::*;

/// Wall clock time of a datagram, as written by the DAQ (nanoseconds first)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockTime {
    pub nanoseconds: u32,
    pub seconds: u32,
}

impl ClockTime {
    pub fn new(seconds: u32, nanoseconds: u32) -> Self {
        Self {
            nanoseconds,
            seconds,
        }
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, std::io::Error> {
        let nanoseconds = reader.read_u32::<LittleEndian>()?;
        let seconds = reader.read_u32::<LittleEndian>()?;
        Ok(Self {
            nanoseconds,
            seconds,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), std::io::Error> {
        writer.write_u32::<LittleEndian>(self.nanoseconds)?;
        writer.write_u32::<LittleEndian>(self.seconds)?;
        Ok(())
    }

    /// Seconds since the epoch as a float
    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + self.nanoseconds as f64 / 1.0e9
    }

    /// Convert to a UTC date-time. None if the nanoseconds field is out of range.
    pub fn to_datetime(&self) -> Option<OffsetDateTime> {
        let nanos = self.seconds as i128 * 1_000_000_000 + self.nanoseconds as i128;
        OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
    }
}

/// Pulse timing packed into two words:
/// low = ticks[0:24] | control[24:32], high = fiducials[0:17] | vector[17:32]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeStamp {
    pub ticks: u32,
    pub control: u8,
    pub fiducials: u32,
    pub vector: u16,
}

impl TimeStamp {
    pub fn from_words(low: u32, high: u32) -> Self {
        Self {
            ticks: low & TICKS_MASK,
            control: (low >> CONTROL_SHIFT) as u8,
            fiducials: high & FIDUCIALS_MASK,
            vector: ((high >> VECTOR_SHIFT) & VECTOR_MASK) as u16,
        }
    }

    pub fn to_words(&self) -> (u32, u32) {
        let low = (self.ticks & TICKS_MASK) | ((self.control as u32) << CONTROL_SHIFT);
        let high =
            (self.fiducials & FIDUCIALS_MASK) | (((self.vector as u32) & VECTOR_MASK) << VECTOR_SHIFT);
        (low, high)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, std::io::Error> {
        let low = reader.read_u32::<LittleEndian>()?;
        let high = reader.read_u32::<LittleEndian>()?;
        Ok(Self::from_words(low, high))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), std::io::Error> {
        let (low, high) = self.to_words();
        writer.write_u32::<LittleEndian>(low)?;
        writer.write_u32::<LittleEndian>(high)?;
        Ok(())
    }
}

/// DAQ state transition that produced a datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransitionId {
    Unknown,
    Reset,
    Map,
    Unmap,
    Configure,
    Unconfigure,
    BeginRun,
    EndRun,
    BeginCalibCycle,
    EndCalibCycle,
    Enable,
    Disable,
    L1Accept,
    Other(u8),
}

impl From<u8> for TransitionId {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Unknown,
            1 => Self::Reset,
            2 => Self::Map,
            3 => Self::Unmap,
            4 => Self::Configure,
            5 => Self::Unconfigure,
            6 => Self::BeginRun,
            7 => Self::EndRun,
            8 => Self::BeginCalibCycle,
            9 => Self::EndCalibCycle,
            10 => Self::Enable,
            11 => Self::Disable,
            12 => Self::L1Accept,
            other => Self::Other(other),
        }
    }
}

impl Display for TransitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(id) => write!(f, "Unknown_{id}"),
            named => write!(f, "{named:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sequence {
    pub clock: ClockTime,
    pub stamp: TimeStamp,
}

impl Sequence {
    /// The transition this datagram records
    pub fn service(&self) -> TransitionId {
        TransitionId::from(self.stamp.control & SERVICE_MASK)
    }

    /// True for L1Accept datagrams, the ones that carry detector data
    pub fn is_event(&self) -> bool {
        self.service() == TransitionId::L1Accept
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, std::io::Error> {
        let clock = ClockTime::read_from(reader)?;
        let stamp = TimeStamp::read_from(reader)?;
        Ok(Self { clock, stamp })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), std::io::Error> {
        self.clock.write_to(writer)?;
        self.stamp.write_to(writer)
    }
}

/// Environment/configuration tag of a datagram
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Env(pub u32);

impl Env {
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, std::io::Error> {
        Ok(Self(reader.read_u32::<LittleEndian>()?))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), std::io::Error> {
        writer.write_u32::<LittleEndian>(self.0)
    }
}
