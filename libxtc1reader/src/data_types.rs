use byteorder::{ByteOrder, LittleEndian};
use fxhash::FxHashMap;
use ndarray::{Array2, Array3};

use super::constants::*;
use super::error::DataDecodeError;
use super::type_id::TypeId;
use super::walker::XtcNode;

const FRAME_HEADER_SIZE: usize = 16;
const PNCCD_ROWS: usize = 512;
const PNCCD_COLS: usize = 512;
const CSPAD_ELEMENT_HEADER_SIZE: usize = 20;
const CSPAD_ROWS: usize = 185;
const CSPAD_COLS: usize = 388;
const CSPAD_CONFIG_SIZE: usize = 16;
const PRINCETON_HEADER_SIZE: usize = 16;
const EPIX_FRAME_NUMBER_SIZE: usize = 4;

/// Pixel storage of a generic camera frame, chosen from the bit depth
#[derive(Debug, Clone, PartialEq)]
pub enum FramePixels {
    U8(Array2<u8>),
    U16(Array2<u16>),
    U32(Array2<u32>),
}

impl FramePixels {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::U8(a) => a.dim(),
            Self::U16(a) => a.dim(),
            Self::U32(a) => a.dim(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Bits per pixel
    pub depth: u32,
    pub offset: u32,
    pub pixels: FramePixels,
}

/// One CSPad 2x1 section
#[derive(Debug, Clone, PartialEq)]
pub struct CspadElement {
    pub quad: u32,
    pub section: u32,
    pub data: Array2<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CspadConfig {
    pub quad_mask: u32,
    pub asic_mask: u32,
    pub run_delay: u32,
    pub event_code: u32,
}

/// One Epix10ka2M readout: every panel of the detector, shape (panels, rows, cols)
#[derive(Debug, Clone, PartialEq)]
pub struct Epix10ka2MData {
    pub frame_number: u32,
    pub frames: Array3<u16>,
}

impl Epix10ka2MData {
    pub fn num_panels(&self) -> usize {
        self.frames.dim().0
    }

    pub fn panel_shape(&self) -> (usize, usize) {
        let (_, rows, cols) = self.frames.dim();
        (rows, cols)
    }
}

/// Typed payload of a decoded container
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorData {
    Camera(CameraFrame),
    Cspad(CspadElement),
    CspadConfig(CspadConfig),
    Epix10ka2M(Epix10ka2MData),
}

/// Decode the data bytes of a container with the given version
pub type DecodeFn = fn(u16, &[u8]) -> Result<DetectorData, DataDecodeError>;

fn check_len(type_name: &'static str, data: &[u8], expected: usize) -> Result<(), DataDecodeError> {
    if data.len() < expected {
        Err(DataDecodeError::Truncated {
            type_name,
            expected,
            found: data.len(),
        })
    } else {
        Ok(())
    }
}

fn read_u16_array(bytes: &[u8], count: usize) -> Vec<u16> {
    let mut values = vec![0u16; count];
    LittleEndian::read_u16_into(&bytes[..count * 2], &mut values);
    values
}

fn frame_size(width: u32, height: u32, bytes_per_pixel: usize) -> Result<usize, DataDecodeError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(bytes_per_pixel))
        .ok_or_else(|| DataDecodeError::InvalidFrame(format!("{width}x{height} frame is too large")))
}

/// Generic camera frame: width, height, depth, offset then packed little-endian pixels
pub fn decode_camera_frame(_version: u16, data: &[u8]) -> Result<DetectorData, DataDecodeError> {
    check_len("Frame", data, FRAME_HEADER_SIZE)?;
    let width = LittleEndian::read_u32(&data[0..4]);
    let height = LittleEndian::read_u32(&data[4..8]);
    let depth = LittleEndian::read_u32(&data[8..12]);
    let offset = LittleEndian::read_u32(&data[12..16]);
    if depth == 0 || depth > 32 {
        return Err(DataDecodeError::InvalidFrame(format!("bit depth {depth}")));
    }

    let bytes_per_pixel = depth.div_ceil(8) as usize;
    let size = frame_size(width, height, bytes_per_pixel)?;
    check_len("Frame", data, FRAME_HEADER_SIZE + size)?;

    let shape = (height as usize, width as usize);
    let n_pixels = shape.0 * shape.1;
    let pixel_bytes = &data[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + size];
    let shape_error = |e: ndarray::ShapeError| DataDecodeError::InvalidFrame(e.to_string());
    let pixels = if depth <= 8 {
        FramePixels::U8(Array2::from_shape_vec(shape, pixel_bytes.to_vec()).map_err(shape_error)?)
    } else if depth <= 16 {
        FramePixels::U16(
            Array2::from_shape_vec(shape, read_u16_array(pixel_bytes, n_pixels)).map_err(shape_error)?,
        )
    } else {
        let mut values = vec![0u32; n_pixels];
        LittleEndian::read_u32_into(pixel_bytes, &mut values);
        FramePixels::U32(Array2::from_shape_vec(shape, values).map_err(shape_error)?)
    };

    Ok(DetectorData::Camera(CameraFrame {
        width,
        height,
        depth,
        offset,
        pixels,
    }))
}

/// pnCCD frame: bare 512x512 16 bit pixels
pub fn decode_pnccd_frame(version: u16, data: &[u8]) -> Result<DetectorData, DataDecodeError> {
    if version != 1 {
        return Err(DataDecodeError::UnsupportedVersion {
            type_id: TypeId::PnccdFrame.into(),
            version,
        });
    }
    let n_pixels = PNCCD_ROWS * PNCCD_COLS;
    check_len("pnCCD frame", data, n_pixels * 2)?;
    let image = Array2::from_shape_vec((PNCCD_ROWS, PNCCD_COLS), read_u16_array(data, n_pixels))
        .map_err(|e| DataDecodeError::InvalidFrame(e.to_string()))?;
    Ok(DetectorData::Camera(CameraFrame {
        width: PNCCD_COLS as u32,
        height: PNCCD_ROWS as u32,
        depth: 16,
        offset: 0,
        pixels: FramePixels::U16(image),
    }))
}

/// CSPad 2x1 element: five word header (tid, acquisition count, op code, quad, section)
/// then 185x388 16 bit pixels
pub fn decode_cspad_element(version: u16, data: &[u8]) -> Result<DetectorData, DataDecodeError> {
    if version != 1 && version != 2 {
        return Err(DataDecodeError::UnsupportedVersion {
            type_id: TypeId::CspadElement.into(),
            version,
        });
    }
    let n_pixels = CSPAD_ROWS * CSPAD_COLS;
    check_len("CSPad element", data, CSPAD_ELEMENT_HEADER_SIZE + n_pixels * 2)?;
    let quad = LittleEndian::read_u32(&data[12..16]);
    let section = LittleEndian::read_u32(&data[16..20]);
    let pixels = read_u16_array(&data[CSPAD_ELEMENT_HEADER_SIZE..], n_pixels);
    let image = Array2::from_shape_vec((CSPAD_ROWS, CSPAD_COLS), pixels)
        .map_err(|e| DataDecodeError::InvalidFrame(e.to_string()))?;
    Ok(DetectorData::Cspad(CspadElement {
        quad,
        section,
        data: image,
    }))
}

/// CSPad configuration, leading fields only
pub fn decode_cspad_config(_version: u16, data: &[u8]) -> Result<DetectorData, DataDecodeError> {
    check_len("CSPad config", data, CSPAD_CONFIG_SIZE)?;
    Ok(DetectorData::CspadConfig(CspadConfig {
        quad_mask: LittleEndian::read_u32(&data[0..4]),
        asic_mask: LittleEndian::read_u32(&data[4..8]),
        run_delay: LittleEndian::read_u32(&data[8..12]),
        event_code: LittleEndian::read_u32(&data[12..16]),
    }))
}

/// Princeton frame: shot id, readout time, width, height then 16 bit pixels
pub fn decode_princeton_frame(version: u16, data: &[u8]) -> Result<DetectorData, DataDecodeError> {
    if version != 1 {
        return Err(DataDecodeError::UnsupportedVersion {
            type_id: TypeId::PrincetonFrame.into(),
            version,
        });
    }
    check_len("Princeton frame", data, PRINCETON_HEADER_SIZE)?;
    let width = LittleEndian::read_u32(&data[8..12]);
    let height = LittleEndian::read_u32(&data[12..16]);
    let size = frame_size(width, height, 2)?;
    check_len("Princeton frame", data, PRINCETON_HEADER_SIZE + size)?;
    let n_pixels = size / 2;
    let image = Array2::from_shape_vec(
        (height as usize, width as usize),
        read_u16_array(&data[PRINCETON_HEADER_SIZE..], n_pixels),
    )
    .map_err(|e| DataDecodeError::InvalidFrame(e.to_string()))?;
    Ok(DetectorData::Camera(CameraFrame {
        width,
        height,
        depth: 16,
        offset: 0,
        pixels: FramePixels::U16(image),
    }))
}

/// Epix10ka2M array: frame number then 16x352x384 16 bit pixels. Trailing
/// environmental data is ignored.
pub fn decode_epix10ka2m_array(_version: u16, data: &[u8]) -> Result<DetectorData, DataDecodeError> {
    let n_pixels = EPIX10KA2M_NUM_PANELS * EPIX10KA2M_PANEL_ROWS * EPIX10KA2M_PANEL_COLS;
    check_len("Epix10ka2M", data, EPIX_FRAME_NUMBER_SIZE + n_pixels * 2)?;
    let frame_number = LittleEndian::read_u32(&data[0..4]);
    let frames = Array3::from_shape_vec(
        (EPIX10KA2M_NUM_PANELS, EPIX10KA2M_PANEL_ROWS, EPIX10KA2M_PANEL_COLS),
        read_u16_array(&data[EPIX_FRAME_NUMBER_SIZE..], n_pixels),
    )
    .map_err(|e| DataDecodeError::InvalidFrame(e.to_string()))?;
    Ok(DetectorData::Epix10ka2M(Epix10ka2MData {
        frame_number,
        frames,
    }))
}

/// Dispatch table from type id to decoder.
///
/// Supporting a new type id is one `register` call.
#[derive(Debug, Clone)]
pub struct DecoderRegistry {
    decoders: FxHashMap<u16, DecodeFn>,
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(TypeId::Frame, decode_camera_frame);
        registry.register(TypeId::PnccdFrame, decode_pnccd_frame);
        registry.register(TypeId::CspadElement, decode_cspad_element);
        registry.register(TypeId::CspadConfig, decode_cspad_config);
        registry.register(TypeId::PrincetonFrame, decode_princeton_frame);
        registry.register(TypeId::Epix10kaData117, decode_epix10ka2m_array);
        registry.register(TypeId::Epix10kaData118, decode_epix10ka2m_array);
        registry.register(TypeId::Epix10kaArray6193, decode_epix10ka2m_array);
        registry
    }
}

impl DecoderRegistry {
    pub fn empty() -> Self {
        Self {
            decoders: FxHashMap::default(),
        }
    }

    /// Add or replace the decoder for a type id
    pub fn register<T: Into<u16>>(&mut self, type_id: T, decoder: DecodeFn) {
        self.decoders.insert(type_id.into(), decoder);
    }

    pub fn supports(&self, type_id: u16) -> bool {
        self.decoders.contains_key(&type_id)
    }

    pub fn decode(&self, type_id: u16, version: u16, data: &[u8]) -> Result<DetectorData, DataDecodeError> {
        match self.decoders.get(&type_id) {
            Some(decoder) => decoder(version, data),
            None => Err(DataDecodeError::UnknownType(type_id)),
        }
    }

    /// Decode the data of a container found by the walker
    pub fn decode_node(&self, node: &XtcNode) -> Result<DetectorData, DataDecodeError> {
        self.decode(
            node.header.contains.type_id(),
            node.header.contains.version(),
            node.data,
        )
    }
}

pub fn is_image_type(type_id: u16) -> bool {
    TypeId::from(type_id).is_image()
}

pub fn type_description(type_id: u16) -> String {
    TypeId::from(type_id).description()
}

pub fn expected_shape(type_id: u16) -> Option<&'static [usize]> {
    TypeId::from(type_id).expected_shape()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_camera_frame_depths() {
        let mut data = words(&[3, 2, 12, 7]);
        for v in 0u16..6 {
            data.extend_from_slice(&(v * 1000).to_le_bytes());
        }
        let registry = DecoderRegistry::default();
        let decoded = registry.decode(2, 1, &data).unwrap();
        match decoded {
            DetectorData::Camera(frame) => {
                assert_eq!(frame.offset, 7);
                assert_eq!(frame.pixels.shape(), (2, 3));
                match frame.pixels {
                    FramePixels::U16(pixels) => assert_eq!(pixels[[1, 2]], 5000),
                    other => panic!("expected u16 pixels, got {other:?}"),
                }
            }
            other => panic!("expected a camera frame, got {other:?}"),
        }

        let mut data = words(&[2, 2, 8, 0]);
        data.extend_from_slice(&[1, 2, 3, 4]);
        match registry.decode(2, 1, &data).unwrap() {
            DetectorData::Camera(CameraFrame {
                pixels: FramePixels::U8(pixels),
                ..
            }) => assert_eq!(pixels[[1, 0]], 3),
            other => panic!("expected u8 pixels, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_and_invalid_frames() {
        let registry = DecoderRegistry::default();
        let mut data = words(&[4, 4, 16, 0]);
        data.extend_from_slice(&[0; 10]);
        assert_eq!(
            registry.decode(2, 1, &data),
            Err(DataDecodeError::Truncated {
                type_name: "Frame",
                expected: 16 + 32,
                found: 26
            })
        );
        assert!(matches!(
            registry.decode(2, 1, &words(&[1, 1, 0, 0])),
            Err(DataDecodeError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_version_checks() {
        let registry = DecoderRegistry::default();
        assert_eq!(
            registry.decode(11, 2, &[]),
            Err(DataDecodeError::UnsupportedVersion {
                type_id: 11,
                version: 2
            })
        );
        assert!(matches!(
            registry.decode(28, 3, &[]),
            Err(DataDecodeError::UnsupportedVersion { type_id: 28, .. })
        ));
    }

    #[test]
    fn test_cspad_element() {
        let mut data = words(&[1, 2, 3, 2, 5]);
        let mut pixels = vec![0u8; 185 * 388 * 2];
        pixels[2..4].copy_from_slice(&513u16.to_le_bytes());
        data.extend_from_slice(&pixels);
        match DecoderRegistry::default().decode(28, 2, &data).unwrap() {
            DetectorData::Cspad(element) => {
                assert_eq!(element.quad, 2);
                assert_eq!(element.section, 5);
                assert_eq!(element.data.dim(), (185, 388));
                assert_eq!(element.data[[0, 1]], 513);
            }
            other => panic!("expected a CSPad element, got {other:?}"),
        }
    }

    #[test]
    fn test_princeton_frame() {
        let mut data = words(&[11, 22, 2, 1]);
        data.extend_from_slice(&[1, 0, 2, 0]);
        match DecoderRegistry::default().decode(17, 1, &data).unwrap() {
            DetectorData::Camera(frame) => {
                assert_eq!((frame.width, frame.height), (2, 1));
                assert_eq!(frame.pixels, FramePixels::U16(ndarray::arr2(&[[1, 2]])));
            }
            other => panic!("expected a camera frame, got {other:?}"),
        }
    }

    #[test]
    fn test_epix_array_under_every_id() {
        let n_pixels = 16 * 352 * 384;
        let mut data = 42u32.to_le_bytes().to_vec();
        data.resize(4 + n_pixels * 2, 0);
        let last = data.len() - 2;
        data[last..].copy_from_slice(&777u16.to_le_bytes());
        data.extend_from_slice(&[0xEE; 8]);

        let registry = DecoderRegistry::default();
        for id in [117u16, 118, 6193] {
            match registry.decode(id, 0, &data).unwrap() {
                DetectorData::Epix10ka2M(epix) => {
                    assert_eq!(epix.frame_number, 42);
                    assert_eq!(epix.num_panels(), 16);
                    assert_eq!(epix.panel_shape(), (352, 384));
                    assert_eq!(epix.frames[[15, 351, 383]], 777);
                }
                other => panic!("expected Epix10ka2M data, got {other:?}"),
            }
        }
        assert!(matches!(
            registry.decode(117, 0, &data[..100]),
            Err(DataDecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_registry_extension() {
        fn decode_marker(version: u16, _data: &[u8]) -> Result<DetectorData, DataDecodeError> {
            Ok(DetectorData::CspadConfig(CspadConfig {
                quad_mask: version as u32,
                asic_mask: 0,
                run_delay: 0,
                event_code: 0,
            }))
        }

        let mut registry = DecoderRegistry::empty();
        assert_eq!(registry.decode(4242, 1, &[]), Err(DataDecodeError::UnknownType(4242)));
        registry.register(4242u16, decode_marker);
        assert!(registry.supports(4242));
        assert!(matches!(
            registry.decode(4242, 9, &[]),
            Ok(DetectorData::CspadConfig(CspadConfig { quad_mask: 9, .. }))
        ));
    }

    #[test]
    fn test_catalogue_functions() {
        assert!(is_image_type(6193));
        assert!(!is_image_type(29));
        assert_eq!(expected_shape(28), Some(&[185usize, 388][..]));
        assert_eq!(type_description(2), "Generic camera frame");
    }
}
