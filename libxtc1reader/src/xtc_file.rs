use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use super::constants::*;
use super::datagram::{Datagram, DatagramChunk};
use super::error::XtcFileError;

const READ_BUFFER_SIZE: usize = 1 << 20;

/// Read until `buffer` is full or the reader runs dry. Returns the number of bytes read.
fn read_fully<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<usize, std::io::Error> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// A single .xtc file, read one datagram at a time.
///
/// The reader is either at a record boundary or ended. Any framing error ends
/// it for good; only `EndOfFile` at a boundary is a clean finish.
#[derive(Debug)]
pub struct XtcFile {
    file_handle: BufReader<File>,
    file_path: PathBuf,
    size_bytes: u64,
    bytes_read: u64,
    is_ended: bool,
}

impl XtcFile {
    /// Open an xtc file
    pub fn new(path: &Path) -> Result<Self, XtcFileError> {
        if !path.exists() {
            return Err(XtcFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let size_bytes = file.metadata()?.len();
        spdlog::info!(
            "Opened xtc file {} with size {}",
            path.to_string_lossy(),
            human_bytes::human_bytes(size_bytes as f64)
        );
        Ok(Self {
            file_handle: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            file_path: path.to_path_buf(),
            size_bytes,
            bytes_read: 0,
            is_ended: size_bytes == 0,
        })
    }

    /// Read the next datagram.
    ///
    /// Returns `XtcFileError::EndOfFile` once the file is exhausted or after any
    /// previous error.
    pub fn get_next_datagram(&mut self) -> Result<Datagram, XtcFileError> {
        if self.is_ended {
            return Err(XtcFileError::EndOfFile);
        }
        let result = self.read_datagram();
        if result.is_err() {
            self.is_ended = true;
        }
        result
    }

    fn read_datagram(&mut self) -> Result<Datagram, XtcFileError> {
        let position = self.bytes_read;

        let mut chunk_bytes = [0u8; DATAGRAM_CHUNK_SIZE];
        let n_read = read_fully(&mut self.file_handle, &mut chunk_bytes)?;
        self.bytes_read += n_read as u64;
        if n_read == 0 {
            return Err(XtcFileError::EndOfFile);
        } else if n_read < DATAGRAM_CHUNK_SIZE {
            return Err(XtcFileError::TruncatedHeader {
                position,
                read: n_read,
                expected: DATAGRAM_CHUNK_SIZE,
            });
        }
        let chunk = DatagramChunk::parse(&chunk_bytes);

        // The rest of the outer Xtc header sits where the payload would start
        let mut payload = vec![0u8; XTC_HEADER_REMAINDER];
        let n_read = read_fully(&mut self.file_handle, &mut payload)?;
        self.bytes_read += n_read as u64;
        if n_read < XTC_HEADER_REMAINDER {
            return Err(XtcFileError::TruncatedHeader {
                position,
                read: DATAGRAM_CHUNK_SIZE + n_read,
                expected: DATAGRAM_CHUNK_SIZE + XTC_HEADER_REMAINDER,
            });
        }
        let header = chunk
            .complete(&payload)
            .map_err(|_| XtcFileError::TruncatedHeader {
                position,
                read: DATAGRAM_CHUNK_SIZE + n_read,
                expected: DATAGRAM_CHUNK_SIZE + XTC_HEADER_REMAINDER,
            })?;

        if (header.xtc.extent as usize) < XTC_HEADER_SIZE {
            return Err(XtcFileError::BadExtent {
                position,
                extent: header.xtc.extent,
            });
        }

        let payload_size = header.xtc.payload_size();
        let remaining = self.size_bytes.saturating_sub(self.bytes_read);
        if payload_size as u64 > remaining {
            return Err(XtcFileError::TruncatedRecord {
                position,
                read: remaining as usize,
                expected: payload_size,
            });
        }

        payload.resize(XTC_HEADER_REMAINDER + payload_size, 0);
        let n_read = read_fully(&mut self.file_handle, &mut payload[XTC_HEADER_REMAINDER..])?;
        self.bytes_read += n_read as u64;
        if n_read < payload_size {
            return Err(XtcFileError::TruncatedRecord {
                position,
                read: n_read,
                expected: payload_size,
            });
        }

        Ok(Datagram { header, payload })
    }

    pub fn is_eof(&self) -> bool {
        self.is_ended
    }

    pub fn get_filename(&self) -> &Path {
        &self.file_path
    }

    pub fn get_size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn get_bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Fraction of the file consumed, 0.0 to 1.0
    pub fn progress(&self) -> f64 {
        if self.size_bytes == 0 {
            return 1.0;
        }
        (self.bytes_read as f64 / self.size_bytes as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{ClockTime, Env, Sequence, TimeStamp};
    use crate::xtc_header::{encode_xtc, Damage, Src, TypeIdInfo};
    use std::io::Write;

    fn sample_datagram(fiducials: u32, data: &[u8]) -> Datagram {
        let seq = Sequence {
            clock: ClockTime::new(1_500_000_000 + fiducials, 0),
            stamp: TimeStamp {
                fiducials,
                ..Default::default()
            },
        };
        let child = encode_xtc(Damage(0), Src::default(), TypeIdInfo::new(2, 1, false), data);
        Datagram::new(
            seq,
            Env(0),
            Damage(0),
            Src::default(),
            TypeIdInfo::new(1, 1, false),
            &child,
        )
    }

    fn write_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_two_datagrams() {
        let first = sample_datagram(1, &[1, 2, 3, 4]);
        let second = sample_datagram(2, &[]);
        let mut bytes = Vec::new();
        first.write_to(&mut bytes).unwrap();
        second.write_to(&mut bytes).unwrap();
        let file = write_file(&bytes);

        let mut xtc = XtcFile::new(file.path()).unwrap();
        assert_eq!(xtc.get_next_datagram().unwrap(), first);
        assert!(xtc.progress() < 1.0);
        assert_eq!(xtc.get_next_datagram().unwrap(), second);
        assert!(matches!(xtc.get_next_datagram(), Err(XtcFileError::EndOfFile)));
        assert!(xtc.is_eof());
        assert_eq!(xtc.progress(), 1.0);
    }

    #[test]
    fn test_truncated_payload_is_fatal() {
        let dgram = sample_datagram(1, &[7; 32]);
        let mut bytes = Vec::new();
        dgram.write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 5);
        let file = write_file(&bytes);

        let mut xtc = XtcFile::new(file.path()).unwrap();
        match xtc.get_next_datagram() {
            Err(XtcFileError::TruncatedRecord {
                position,
                read,
                expected,
            }) => {
                assert_eq!(position, 0);
                assert_eq!(expected, 20 + 32);
                assert_eq!(read, 20 + 32 - 5);
            }
            other => panic!("expected TruncatedRecord, got {other:?}"),
        }
        assert!(matches!(xtc.get_next_datagram(), Err(XtcFileError::EndOfFile)));
    }

    #[test]
    fn test_truncated_headers() {
        let dgram = sample_datagram(1, &[]);
        let mut bytes = Vec::new();
        dgram.write_to(&mut bytes).unwrap();

        let file = write_file(&bytes[..10]);
        let mut xtc = XtcFile::new(file.path()).unwrap();
        assert!(matches!(
            xtc.get_next_datagram(),
            Err(XtcFileError::TruncatedHeader { read: 10, .. })
        ));

        let file = write_file(&bytes[..30]);
        let mut xtc = XtcFile::new(file.path()).unwrap();
        assert!(matches!(
            xtc.get_next_datagram(),
            Err(XtcFileError::TruncatedHeader {
                read: 30,
                expected: 40,
                ..
            })
        ));
    }

    #[test]
    fn test_bad_extent() {
        let dgram = sample_datagram(1, &[]);
        let mut bytes = Vec::new();
        dgram.write_to(&mut bytes).unwrap();
        bytes[36..40].copy_from_slice(&12u32.to_le_bytes());
        let file = write_file(&bytes);
        let mut xtc = XtcFile::new(file.path()).unwrap();
        assert!(matches!(
            xtc.get_next_datagram(),
            Err(XtcFileError::BadExtent { extent: 12, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let path = Path::new("/definitely/not/here.xtc");
        assert!(matches!(
            XtcFile::new(path),
            Err(XtcFileError::BadFilePath(_))
        ));
    }
}
