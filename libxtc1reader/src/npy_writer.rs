use fxhash::FxHashMap;
use ndarray::Array2;
use ndarray_npy::{write_npy, WriteNpyExt};
use std::path::{Path, PathBuf};

use super::data_types::{DetectorData, FramePixels};
use super::error::NpyWriterError;
use super::type_id::TypeId;

const ASSEMBLED_SUFFIX: &str = "assembled";

/// Writes decoded detector arrays as NumPy .npy files.
///
/// One file per image container, named `event_NNNN_<type>_v<version>.npy`. A
/// second container with the same name in one event gets `_1`, `_2`, ... appended
/// instead of replacing the first. Assembled images get an `_assembled` suffix.
#[derive(Debug)]
pub struct NpyWriter {
    output_path: PathBuf,
    current_event: u64,
    names_in_event: FxHashMap<String, u32>,
    files_written: u64,
}

impl NpyWriter {
    /// Create the writer, making the output directory if needed
    pub fn new(output_path: &Path) -> Result<Self, NpyWriterError> {
        std::fs::create_dir_all(output_path)
            .map_err(|e| NpyWriterError::BadOutputPath(output_path.to_path_buf(), e))?;
        spdlog::info!("Writing arrays to {}", output_path.to_string_lossy());
        Ok(Self {
            output_path: output_path.to_path_buf(),
            current_event: 0,
            names_in_event: FxHashMap::default(),
            files_written: 0,
        })
    }

    pub fn get_output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn get_files_written(&self) -> u64 {
        self.files_written
    }

    fn file_path(&mut self, event: u64, kind: TypeId, version: u16, suffix: Option<&str>) -> PathBuf {
        if event != self.current_event {
            self.current_event = event;
            self.names_in_event.clear();
        }
        let mut stem = format!("event_{event:04}_{kind}_v{version}");
        if let Some(suffix) = suffix {
            stem = format!("{stem}_{suffix}");
        }
        let repeats = self.names_in_event.entry(stem.clone()).or_insert(0);
        if *repeats > 0 {
            stem = format!("{stem}_{repeats}");
        }
        *repeats += 1;
        self.output_path.join(format!("{stem}.npy"))
    }

    fn write<T: WriteNpyExt>(&mut self, path: PathBuf, array: &T) -> Result<PathBuf, NpyWriterError> {
        write_npy(&path, array)?;
        self.files_written += 1;
        Ok(path)
    }

    /// Write the array of a decoded container. Containers without pixel data
    /// (configurations) write nothing and return None.
    pub fn write_detector_data(
        &mut self,
        event: u64,
        kind: TypeId,
        version: u16,
        data: &DetectorData,
    ) -> Result<Option<PathBuf>, NpyWriterError> {
        if matches!(data, DetectorData::CspadConfig(_)) {
            return Ok(None);
        }
        let path = self.file_path(event, kind, version, None);
        let written = match data {
            DetectorData::Camera(frame) => match &frame.pixels {
                FramePixels::U8(pixels) => self.write(path, pixels)?,
                FramePixels::U16(pixels) => self.write(path, pixels)?,
                FramePixels::U32(pixels) => self.write(path, pixels)?,
            },
            DetectorData::Cspad(element) => self.write(path, &element.data)?,
            DetectorData::Epix10ka2M(epix) => self.write(path, &epix.frames)?,
            DetectorData::CspadConfig(_) => return Ok(None),
        };
        Ok(Some(written))
    }

    /// Write an assembled detector image
    pub fn write_image(
        &mut self,
        event: u64,
        kind: TypeId,
        version: u16,
        image: &Array2<f32>,
    ) -> Result<PathBuf, NpyWriterError> {
        let path = self.file_path(event, kind, version, Some(ASSEMBLED_SUFFIX));
        self.write(path, image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::{CameraFrame, CspadConfig, CspadElement};
    use ndarray::arr2;
    use ndarray_npy::read_npy;

    #[test]
    fn test_names_and_contents() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("arrays");
        let mut writer = NpyWriter::new(&out).unwrap();
        assert!(out.is_dir());

        let element = |value: u16| {
            DetectorData::Cspad(CspadElement {
                quad: 0,
                section: 0,
                data: Array2::from_elem((2, 3), value),
            })
        };
        let first = writer
            .write_detector_data(3, TypeId::CspadElement, 2, &element(1))
            .unwrap()
            .unwrap();
        let second = writer
            .write_detector_data(3, TypeId::CspadElement, 2, &element(2))
            .unwrap()
            .unwrap();
        assert_eq!(first, out.join("event_0003_Id_CspadElement_v2.npy"));
        assert_eq!(second, out.join("event_0003_Id_CspadElement_v2_1.npy"));
        let read_back: Array2<u16> = read_npy(&second).unwrap();
        assert_eq!(read_back, Array2::from_elem((2, 3), 2));

        // The repeat counter starts over with each event
        let next = writer
            .write_detector_data(4, TypeId::CspadElement, 2, &element(3))
            .unwrap()
            .unwrap();
        assert_eq!(next, out.join("event_0004_Id_CspadElement_v2.npy"));

        let camera = DetectorData::Camera(CameraFrame {
            width: 2,
            height: 1,
            depth: 8,
            offset: 0,
            pixels: FramePixels::U8(arr2(&[[5, 6]])),
        });
        let path = writer
            .write_detector_data(4, TypeId::Frame, 1, &camera)
            .unwrap()
            .unwrap();
        let pixels: Array2<u8> = read_npy(path).unwrap();
        assert_eq!(pixels, arr2(&[[5, 6]]));

        let image = writer
            .write_image(4, TypeId::Epix10kaArray6193, 1, &arr2(&[[0.5f32, 1.5]]))
            .unwrap();
        assert_eq!(image, out.join("event_0004_Id_Epix10kaArray6193_v1_assembled.npy"));

        let config = DetectorData::CspadConfig(CspadConfig {
            quad_mask: 0xF,
            asic_mask: 0,
            run_delay: 0,
            event_code: 0,
        });
        assert_eq!(
            writer.write_detector_data(4, TypeId::CspadConfig, 1, &config).unwrap(),
            None
        );
        assert_eq!(writer.get_files_written(), 5);
    }

    #[test]
    fn test_output_path_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        std::fs::write(&blocker, b"not a directory").unwrap();
        assert!(matches!(
            NpyWriter::new(&blocker),
            Err(NpyWriterError::BadOutputPath(..))
        ));
    }
}
