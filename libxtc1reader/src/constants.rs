// Sizes of the fixed wire-format records, in bytes
pub const CLOCK_TIME_SIZE: usize = 8;
pub const TIME_STAMP_SIZE: usize = 8;
pub const SEQUENCE_SIZE: usize = CLOCK_TIME_SIZE + TIME_STAMP_SIZE;
pub const ENV_SIZE: usize = 4;
pub const DAMAGE_SIZE: usize = 4;
pub const XTC_HEADER_SIZE: usize = 20;
/// The outer chunk read first: sequence + env + the damage word of the outer xtc
pub const DATAGRAM_CHUNK_SIZE: usize = SEQUENCE_SIZE + ENV_SIZE + DAMAGE_SIZE;
/// What is left of the outer xtc header after the damage word
pub const XTC_HEADER_REMAINDER: usize = XTC_HEADER_SIZE - DAMAGE_SIZE;

// Bit layouts
pub const TYPE_ID_MASK: u32 = 0xFFFF;
pub const VERSION_SHIFT: u32 = 16;
pub const VERSION_MASK: u32 = 0x7FFF;
pub const COMPRESSED_BIT: u32 = 0x8000_0000;
pub const DAMAGE_FLAGS_MASK: u32 = 0x00FF_FFFF;
pub const DAMAGE_USER_SHIFT: u32 = 24;
pub const TICKS_MASK: u32 = 0x00FF_FFFF;
pub const CONTROL_SHIFT: u32 = 24;
pub const FIDUCIALS_MASK: u32 = 0x1_FFFF;
pub const VECTOR_SHIFT: u32 = 17;
pub const VECTOR_MASK: u32 = 0x7FFF;
/// Transition id held in the low bits of the timestamp control byte
pub const SERVICE_MASK: u8 = 0x1F;

/// Walker recursion limit used when the caller does not supply one
pub const DEFAULT_MAX_DEPTH: usize = 10;

// Epix10ka2M reference detector
pub const EPIX10KA2M_NAME: &str = "epix10ka2m";
pub const EPIX10KA_PANEL_OBJECT: &str = "EPIX10KA:V1";
pub const EPIX10KA2M_NUM_PANELS: usize = 16;
pub const EPIX10KA2M_PANEL_ROWS: usize = 352;
pub const EPIX10KA2M_PANEL_COLS: usize = 384;
pub const EPIX10KA2M_PIXEL_SIZE_UM: f64 = 100.0;
pub const EPIX10KA2M_WIDE_PIXEL_SIZE_UM: f64 = 250.0;

/// Scale of one pixel in an assembled image
pub const DEFAULT_PIXEL_SCALE_SIZE_UM: f64 = 100.0;

// Plausibility windows used by the validators (micrometers)
pub const MIN_DETECTOR_RANGE_UM: f64 = 50_000.0;
pub const MAX_DETECTOR_RANGE_UM: f64 = 200_000.0;
pub const MIN_PANEL_RANGE_UM: f64 = 30_000.0;
pub const MAX_PANEL_RANGE_UM: f64 = 50_000.0;
pub const MAX_COORDINATE_UM: f64 = 1.0e6;
