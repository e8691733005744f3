use std::path::PathBuf;
use thiserror::Error;

use super::constants::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XtcHeaderError {
    #[error("Truncated Xtc header at offset {offset}: {available} bytes available, {size} required", size=XTC_HEADER_SIZE)]
    TruncatedHeader { offset: usize, available: usize },
}

#[derive(Debug, Error)]
pub enum XtcFileError {
    #[error("Could not open XtcFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Reached end of XtcFile")]
    EndOfFile,
    #[error("XtcFile found a truncated datagram header at byte {position}: read {read} of {expected} bytes")]
    TruncatedHeader {
        position: u64,
        read: usize,
        expected: usize,
    },
    #[error("XtcFile found a truncated datagram at byte {position}: payload has {read} of {expected} bytes")]
    TruncatedRecord {
        position: u64,
        read: usize,
        expected: usize,
    },
    #[error("XtcFile found a datagram with extent {extent} at byte {position}; extent must be at least {size}", size=XTC_HEADER_SIZE)]
    BadExtent { position: u64, extent: u32 },
    #[error("XtcFile failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum XtcStackError {
    #[error("XtcStack did not find any matching xtc files at {0:?}")]
    NoMatchingFiles(PathBuf),
    #[error("XtcStack failed due to XtcFile error: {0}")]
    FileError(#[from] XtcFileError),
    #[error("XtcStack failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

/// A nested Xtc whose declared extent does not fit in its enclosing buffer.
///
/// This is a report, not a hard failure: the walker stops the affected level and
/// carries on with whatever enclosing levels remain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Xtc at depth {depth}, offset {offset} declares extent {extent} but only {available} bytes remain")]
pub struct BoundsViolation {
    pub depth: usize,
    pub offset: usize,
    pub extent: u32,
    pub available: usize,
}

#[derive(Debug, Error)]
pub enum GeometryParseError {
    #[error("Could not load geometry because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Geometry parsing failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Error parsing geometry line {line_number}: {line}\nexpected 13 fields, found {found}")]
    FieldCount {
        line_number: usize,
        line: String,
        found: usize,
    },
    #[error("Error parsing geometry line {line_number}: {line}\ninvalid value {value:?} for field {field}")]
    BadField {
        line_number: usize,
        line: String,
        field: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataDecodeError {
    #[error("{type_name} data too short: {found} < {expected} bytes")]
    Truncated {
        type_name: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Unsupported version {version} for type id {type_id}")]
    UnsupportedVersion { type_id: u16, version: u16 },
    #[error("No decoder registered for type id {0}")]
    UnknownType(u16),
    #[error("Frame has an invalid layout: {0}")]
    InvalidFrame(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("Data shape {found:?} does not match the expected shape {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("Cannot assemble an image from a geometry without panels")]
    EmptyGeometry,
}

#[derive(Debug, Error)]
pub enum NpyWriterError {
    #[error("Could not create output directory {0:?}: {1}")]
    BadOutputPath(PathBuf, std::io::Error),
    #[error("NpyWriter failed to write an array: {0}")]
    WriteError(#[from] ndarray_npy::WriteNpyError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Pixel scale size must be a positive number of micrometers, found {0}")]
    BadPixelScale(f64),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to XtcStack error: {0}")]
    StackError(#[from] XtcStackError),
    #[error("Processor failed due to geometry error: {0}")]
    GeometryError(#[from] GeometryParseError),
    #[error("Processor failed due to assembly error: {0}")]
    AssemblyError(#[from] AssemblyError),
    #[error("Processor failed due to NpyWriter error: {0}")]
    WriterError(#[from] NpyWriterError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed to write the summary as YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
