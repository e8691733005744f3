use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::assembler::ImageAssembler;
use super::calibration::{calibrate_or_raw, CalibrationProvider, NoCalibration};
use super::config::Config;
use super::data_types::{DecoderRegistry, DetectorData};
use super::datagram::Datagram;
use super::error::{ConfigError, ProcessorError};
use super::geometry::DetectorModel;
use super::geometry_parser::{load_geometry, validate_geometry};
use super::npy_writer::NpyWriter;
use super::walker::{format_xtc_tree, XtcNode};
use super::xtc_stack::XtcStack;

const PROGRESS_STEP: f32 = 0.01;

/// What a pass over a file (or chunk stack) found. Written as YAML when the
/// config asks for a summary file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileSummary {
    pub source: PathBuf,
    pub total_size_bytes: u64,
    pub events_analyzed: u64,
    pub damaged_events: u64,
    /// Datagrams per DAQ transition (Configure, BeginRun, L1Accept, ...)
    pub transition_counts: BTreeMap<String, u64>,
    /// Containers seen per type, over every level of every tree
    pub type_counts: BTreeMap<String, u64>,
    pub damage_counts: BTreeMap<String, u64>,
    pub bounds_violations: u64,
    pub frames_decoded: u64,
    pub decode_errors: u64,
    pub images_assembled: u64,
    pub assembly_errors: u64,
    pub image_shape: Option<(usize, usize)>,
    /// Number of .npy files written to the output path
    pub arrays_written: u64,
    /// Clock time of the first and last event, seconds since the epoch
    pub first_time: Option<f64>,
    pub last_time: Option<f64>,
    /// Set when a framing error cut the stream short
    pub stream_error: Option<String>,
}

impl FileSummary {
    /// Count one event and its tree. Returns the containers that were found.
    fn tally<'a>(&mut self, datagram: &'a Datagram, max_depth: usize) -> Vec<XtcNode<'a>> {
        self.events_analyzed += 1;
        let time = datagram.header.seq.clock.as_secs_f64();
        self.first_time.get_or_insert(time);
        self.last_time = Some(time);
        if datagram.header.xtc.damage.is_damaged() {
            self.damaged_events += 1;
        }
        *self
            .transition_counts
            .entry(datagram.header.seq.service().to_string())
            .or_default() += 1;

        let mut nodes = Vec::new();
        for item in datagram.walk(max_depth) {
            match item {
                Ok(node) => {
                    *self
                        .type_counts
                        .entry(node.header.contains.kind().to_string())
                        .or_default() += 1;
                    for flag in node.header.damage.named_flags() {
                        *self.damage_counts.entry(format!("{flag:?}")).or_default() += 1;
                    }
                    nodes.push(node);
                }
                // Already logged by the walker
                Err(_) => self.bounds_violations += 1,
            }
        }
        nodes
    }

    pub fn write_yaml(&self, path: &Path) -> Result<(), ProcessorError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml_str)?;
        spdlog::info!("Wrote summary to {}", path.to_string_lossy());
        Ok(())
    }
}

/// Shared event loop: read datagrams until the stack ends, the event limit is
/// reached or a framing error occurs, handing each event's index and containers
/// to `handle_nodes`. An error from `handle_nodes` ends the loop and is returned.
fn scan_stack<F, P>(config: &Config, mut handle_nodes: F, mut on_progress: P) -> Result<FileSummary, ProcessorError>
where
    F: FnMut(&mut FileSummary, u64, &[XtcNode]) -> Result<(), ProcessorError>,
    P: FnMut(f32),
{
    let mut stack = XtcStack::new(&config.xtc_path, config.run_number)?;
    spdlog::info!("Processing {}...", config.xtc_path.to_string_lossy());
    let mut summary = FileSummary {
        source: config.xtc_path.clone(),
        total_size_bytes: stack.total_stack_size_bytes,
        ..Default::default()
    };

    let mut last_progress: f32 = 0.0;
    on_progress(last_progress);
    while !config.is_event_limit_reached(summary.events_analyzed) {
        let datagram = match stack.get_next_event() {
            Ok(Some(datagram)) => datagram,
            Ok(None) => break,
            Err(e) => {
                spdlog::warn!("Event stream ended early: {e}");
                summary.stream_error = Some(e.to_string());
                break;
            }
        };

        let event = summary.events_analyzed;
        let nodes = summary.tally(&datagram, config.max_depth);
        handle_nodes(&mut summary, event, &nodes)?;

        let progress = stack.progress() as f32;
        if progress - last_progress >= PROGRESS_STEP {
            last_progress = progress;
            on_progress(progress);
        }
    }
    on_progress(1.0);

    spdlog::info!(
        "Analyzed {} events with {} bounds violations",
        summary.events_analyzed,
        summary.bounds_violations
    );
    Ok(summary)
}

/// The main loop of xtc1reader.
///
/// Reads every event of the configured data, walks each container tree, decodes
/// the image containers and assembles Epix10ka2M frames into detector images.
/// With an output path, the decoded arrays and assembled images are written as
/// .npy files. Framing errors end the pass early and are recorded in the summary;
/// errors in single containers are logged and counted. Failing to write an
/// output file is fatal.
pub fn process_file<P: FnMut(f32)>(
    config: &Config,
    calibration: &dyn CalibrationProvider,
    on_progress: P,
) -> Result<FileSummary, ProcessorError> {
    if !config.is_pixel_scale_valid() {
        return Err(ConfigError::BadPixelScale(config.pixel_scale_size_um).into());
    }

    let geometry = load_geometry(config.geometry_path.as_deref(), &DetectorModel::epix10ka2m())?;
    for issue in validate_geometry(&geometry) {
        spdlog::warn!("Geometry {}: {issue}", geometry.detector_name);
    }
    let assembler = ImageAssembler::new(&geometry, &config.assembly_options())?;
    let registry = DecoderRegistry::default();
    let run_number = config.resolved_run_number();
    spdlog::info!("Calibrating as run {run_number}");
    let mut writer = match &config.output_path {
        Some(path) => Some(NpyWriter::new(path)?),
        None => None,
    };

    let summary = scan_stack(
        config,
        |summary, event, nodes| {
            for node in nodes.iter().filter(|n| n.header.contains.kind().is_image()) {
                let kind = node.header.contains.kind();
                let version = node.header.contains.version();
                let data = match registry.decode_node(node) {
                    Ok(data) => data,
                    Err(e) => {
                        spdlog::warn!("Skipping {kind} container: {e}");
                        summary.decode_errors += 1;
                        continue;
                    }
                };
                summary.frames_decoded += 1;
                if let Some(writer) = writer.as_mut() {
                    if writer.write_detector_data(event, kind, version, &data)?.is_some() {
                        summary.arrays_written += 1;
                    }
                }

                let DetectorData::Epix10ka2M(epix) = &data else {
                    continue;
                };
                let calibrated = calibrate_or_raw(
                    calibration,
                    &geometry.detector_name,
                    run_number,
                    epix.frames.view(),
                );
                match assembler.assemble(calibrated.view()) {
                    Ok(image) => {
                        summary.images_assembled += 1;
                        summary.image_shape = Some(image.dim());
                        if let Some(writer) = writer.as_mut() {
                            writer.write_image(event, kind, version, &image)?;
                            summary.arrays_written += 1;
                        }
                    }
                    Err(e) => {
                        spdlog::warn!("Could not assemble frame {}: {e}", epix.frame_number);
                        summary.assembly_errors += 1;
                    }
                }
            }
            Ok(())
        },
        on_progress,
    )?;

    if let Some(writer) = &writer {
        spdlog::info!(
            "Wrote {} arrays to {}",
            writer.get_files_written(),
            writer.get_output_path().to_string_lossy()
        );
    }
    if let Some(path) = &config.summary_path {
        summary.write_yaml(path)?;
    }
    Ok(summary)
}

/// Entry point for running on a separate thread: progress is published through `status`
pub fn process(config: Config, status: Arc<Mutex<f32>>) -> Result<FileSummary, ProcessorError> {
    process_file(&config, &NoCalibration, |progress| {
        if let Ok(mut stat) = status.lock() {
            *stat = progress;
        }
    })
}

/// Count events, container types, damage and bounds violations without decoding anything
pub fn xtc_info<P: FnMut(f32)>(config: &Config, on_progress: P) -> Result<FileSummary, ProcessorError> {
    scan_stack(config, |_, _, _| Ok(()), on_progress)
}

/// Text dump of the first `n_events` events: one line per datagram followed by its container tree
pub fn dump_events(config: &Config, n_events: u64) -> Result<String, ProcessorError> {
    let mut stack = XtcStack::new(&config.xtc_path, config.run_number)?;
    let mut out = String::new();
    let mut event = 0;
    while event < n_events {
        let Some(datagram) = stack.get_next_event()? else {
            break;
        };
        let header = &datagram.header;
        let _ = writeln!(
            out,
            "Event {event}: {} {} v{} time={:.9} fiducials={} damage=0x{:08x} extent={}",
            header.seq.service(),
            header.xtc.contains.kind(),
            header.xtc.contains.version(),
            header.seq.clock.as_secs_f64(),
            header.seq.stamp.fiducials,
            header.xtc.damage.0,
            header.xtc.extent,
        );
        if header.xtc.is_container() {
            out.push_str(&format_xtc_tree(datagram.contents(), config.max_depth));
        }
        event += 1;
    }
    Ok(out)
}
