//! # xtc1reader
//!
//! xtc1reader reads the legacy XTC (eXtended Tagged Container) event streams written by
//! the LCLS-I data acquisition, written in Rust. It walks the nested, self describing
//! containers of every event, decodes the detector payloads it knows about and turns
//! Epix10ka2M panel data into assembled 2D detector images using a panel geometry file.
//!
//! ## Installation
//!
//! The only method of install is from source. If you have not used Rust before, you
//! will most likely need to install the Rust tool chain. See the
//! [Rust docs](https://www.rust-lang.org/tools/install) for installation instructions.
//!
//! To build and install the CLI use `cargo install --path ./xtc1reader_cli` from the top
//! level repository. To use the CLI see the `xtc1reader_cli` README.
//!
//! ## Data Format
//!
//! An XTC file is a plain sequence of datagrams, all little endian:
//!
//! ```text
//! datagram
//! |---- sequence: clock (nanoseconds, seconds), timestamp (ticks/control, fiducials/vector)
//! |---- env
//! |---- xtc: damage, src (log, phy), type id, extent
//! |    |---- xtc ... (extent - 20 bytes of child containers)
//! |    |    |---- xtc ...
//! ```
//!
//! A container of type `Xtc` holds more containers; any other type holds a detector
//! payload. Large runs are split into chunk files named `e<exp>-r<run>-s<stream>-c<chunk>.xtc`,
//! which [`xtc_stack::XtcStack`] reads back as a single stream.
//!
//! ## Configuration
//!
//! The CLI and [`process::process_file`] are driven by a YAML configuration:
//!
//! ```yml
//! xtc_path: /path/to/e1234-r0042-s00-c00.xtc
//! run_number: null
//! geometry_path: null
//! max_events: null
//! max_depth: 10
//! pixel_scale_size_um: 100.0
//! do_tilt: true
//! summary_path: null
//! output_path: null
//! ```
//!
//! When `xtc_path` is a directory, `run_number` selects the chunk files of a single run.
//! If `geometry_path` is `null`, the Epix10ka2M geometry bundled with the code base is used.
//! When `output_path` is set, every decoded detector array and every assembled image is
//! written there as a NumPy `.npy` file named `event_NNNN_<type>_v<version>.npy`.
//!
//! ### Geometry Format
//!
//! Geometry files are whitespace separated text with one object per line:
//!
//! ```text
//! PARENT IND OBJECT IND X0[um] Y0[um] Z0[um] ROT-Z ROT-Y ROT-X TILT-Z TILT-Y TILT-X
//! ```
//!
//! Lines starting with `#` are comments; `# KEY: value` comments are kept as metadata.
pub mod assembler;
pub mod calibration;
pub mod config;
pub mod constants;
pub mod data_types;
pub mod datagram;
pub mod error;
pub mod geometry;
pub mod geometry_parser;
pub mod npy_writer;
pub mod pixel_coords;
pub mod process;
pub mod sequence;
pub mod transform;
pub mod type_id;
pub mod walker;
pub mod xtc_file;
pub mod xtc_header;
pub mod xtc_stack;
