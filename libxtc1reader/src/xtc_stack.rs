use super::datagram::Datagram;
use super::error::{XtcFileError, XtcStackError};
use super::xtc_file::XtcFile;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// The DAQ splits a run into chunk files (`e<exp>-r<run>-s<stream>-c<chunk>.xtc`).
///
/// The stack is the ordered collection of all files for a run, read back as one
/// continuous stream of datagrams. A path to a single file gives a stack of one.
#[derive(Debug)]
pub struct XtcStack {
    pub file_stack: VecDeque<PathBuf>,
    active_file: XtcFile,
    pub total_stack_size_bytes: u64,
    finished_bytes: u64,
    is_ended: bool,
    parent_path: PathBuf,
}

impl XtcStack {
    /// Create a new XtcStack from a file or from a directory of chunk files.
    ///
    /// With a directory, `run_number` restricts the stack to that run's chunks.
    pub fn new(path: &Path, run_number: Option<u32>) -> Result<Self, XtcStackError> {
        let (mut stack, bytes) = if path.is_file() {
            let size = path.metadata()?.len();
            (VecDeque::from(vec![path.to_path_buf()]), size)
        } else {
            Self::get_file_stack(path, run_number)?
        };
        if let Some(file_path) = stack.pop_front() {
            spdlog::info!(
                "XtcStack at {} holds {} file(s), {} total",
                path.to_string_lossy(),
                stack.len() + 1,
                human_bytes::human_bytes(bytes as f64)
            );
            let active_file = XtcFile::new(&file_path)?;
            let is_ended = active_file.is_eof() && stack.is_empty();
            let mut xtc_stack = XtcStack {
                file_stack: stack,
                active_file,
                total_stack_size_bytes: bytes,
                finished_bytes: 0,
                is_ended,
                parent_path: PathBuf::from(path),
            };
            if xtc_stack.active_file.is_eof() && !xtc_stack.is_ended {
                xtc_stack.move_to_next_file()?;
            }
            Ok(xtc_stack)
        } else {
            Err(XtcStackError::NoMatchingFiles(path.to_path_buf()))
        }
    }

    /// Get the next datagram in the file stack
    ///
    /// Returns a `Result<Option<Datagram>>`. The Option is None if the stack has
    /// no more data. Any error ends the stack.
    pub fn get_next_event(&mut self) -> Result<Option<Datagram>, XtcStackError> {
        loop {
            if self.is_ended {
                return Ok(None);
            }

            match self.active_file.get_next_datagram() {
                Ok(dgram) => return Ok(Some(dgram)),
                Err(XtcFileError::EndOfFile) => {
                    if let Err(e) = self.move_to_next_file() {
                        self.is_ended = true;
                        return Err(e);
                    }
                }
                Err(e) => {
                    spdlog::error!(
                        "Stopped reading {}: {}",
                        self.active_file.get_filename().to_string_lossy(),
                        e
                    );
                    self.is_ended = true;
                    return Err(XtcStackError::FileError(e));
                }
            };
        }
    }

    /// Get all of the associated .xtc files and put them in the stack
    fn get_file_stack(
        parent_path: &Path,
        run_number: Option<u32>,
    ) -> Result<(VecDeque<PathBuf>, u64), XtcStackError> {
        let mut file_list: Vec<PathBuf> = Vec::new();
        let run_pattern = run_number.map(|run| format!("-r{run:04}-"));
        let end_pattern = ".xtc";
        for item in parent_path.read_dir()? {
            let item_path = item?.path();
            let name = match item_path.file_name() {
                Some(name) => name.to_string_lossy().to_string(),
                None => continue,
            };
            let run_matches = match &run_pattern {
                Some(pattern) => name.contains(pattern.as_str()),
                None => true,
            };
            if run_matches && name.ends_with(end_pattern) && item_path.is_file() {
                file_list.push(item_path);
            }
        }

        if file_list.is_empty() {
            return Err(XtcStackError::NoMatchingFiles(parent_path.to_path_buf()));
        }

        let mut total_stack_size_bytes = 0;
        for path in file_list.iter() {
            total_stack_size_bytes += path.metadata()?.len();
        }

        file_list.sort(); // Zero padded stream and chunk numbers sort lexically
        let stack = file_list.into();

        Ok((stack, total_stack_size_bytes))
    }

    /// Move to the next file in the stack
    fn move_to_next_file(&mut self) -> Result<(), XtcStackError> {
        loop {
            self.finished_bytes += self.active_file.get_size_bytes();
            if let Some(next_file_path) = self.file_stack.pop_front() {
                let next_file = XtcFile::new(&next_file_path)?;
                self.active_file = next_file;
                if !self.active_file.is_eof() {
                    return Ok(());
                }
            } else {
                self.is_ended = true;
                return Ok(());
            }
        }
    }

    pub fn is_ended(&self) -> bool {
        self.is_ended
    }

    pub fn get_parent_path(&self) -> &Path {
        &self.parent_path
    }

    /// The file currently being read
    pub fn get_active_file(&self) -> &Path {
        self.active_file.get_filename()
    }

    /// Fraction of the whole stack consumed, 0.0 to 1.0
    pub fn progress(&self) -> f64 {
        if self.is_ended || self.total_stack_size_bytes == 0 {
            return 1.0;
        }
        let done = self.finished_bytes + self.active_file.get_bytes_read();
        (done as f64 / self.total_stack_size_bytes as f64).min(1.0)
    }
}

impl Iterator for XtcStack {
    type Item = Result<Datagram, XtcStackError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.get_next_event() {
            Ok(Some(dgram)) => Some(Ok(dgram)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl std::iter::FusedIterator for XtcStack {}

/// Run number from a chunk file name such as `e1234-r0042-s00-c00.xtc`.
/// None if the name has no `-r<digits>-` field.
pub fn run_number_from_path(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_string_lossy().to_string();
    let fields: Vec<&str> = name.split('-').collect();
    // The run field sits between two dashes
    let inner = fields.get(1..fields.len().checked_sub(1)?)?;
    inner.iter().find_map(|field| {
        let digits = field.strip_prefix('r')?;
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            digits.parse().ok()
        } else {
            None
        }
    })
}
