use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use bit_set::BitSet;

use super::constants::*;
use super::error::GeometryParseError;
use super::geometry::{DetectorGeometry, DetectorModel, GeometryObject};

const FIELDS_PER_LINE: usize = 13;
const HEADER_PREFIX: &str = "HDR";
const COMMENT_PREFIX: &str = "#";

/// Load the default geometry for windows
#[cfg(target_family = "windows")]
fn load_default_geometry() -> &'static str {
    include_str!("data\\geometry-def-epix10ka2m.data")
}

/// Load the default geometry for macos and linux
#[cfg(target_family = "unix")]
fn load_default_geometry() -> &'static str {
    include_str!("data/geometry-def-epix10ka2m.data")
}

/// Detector name from a `geometry-def-<name>.data` file name, else the file stem
pub fn detector_name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if let Some(name) = file_name
        .strip_prefix("geometry-def-")
        .and_then(|rest| rest.strip_suffix(".data"))
    {
        if !name.is_empty() {
            return String::from(name);
        }
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Parse a geometry definition file, keeping the objects that are panels of `model`
pub fn parse_geometry(path: &Path, model: &DetectorModel) -> Result<DetectorGeometry, GeometryParseError> {
    if !path.exists() {
        return Err(GeometryParseError::BadFilePath(path.to_path_buf()));
    }
    let mut contents = String::new();
    let mut file = File::open(path)?;
    file.read_to_string(&mut contents)?;
    let geometry = parse_geometry_str(&contents, &detector_name_from_path(path), model)?;
    spdlog::info!(
        "Loaded geometry {} from {} with {} panels",
        geometry.detector_name,
        path.to_string_lossy(),
        geometry.num_panels()
    );
    Ok(geometry)
}

/// The Epix10ka2M geometry bundled with the library
pub fn load_default_epix10ka2m_geometry() -> Result<DetectorGeometry, GeometryParseError> {
    parse_geometry_str(
        load_default_geometry(),
        EPIX10KA2M_NAME,
        &DetectorModel::epix10ka2m(),
    )
}

/// Parse the file at `path`, or the bundled default geometry if there is no path
pub fn load_geometry(path: Option<&Path>, model: &DetectorModel) -> Result<DetectorGeometry, GeometryParseError> {
    match path {
        Some(p) => parse_geometry(p, model),
        None => {
            spdlog::info!("No geometry file given, using the bundled Epix10ka2M geometry");
            load_default_epix10ka2m_geometry()
        }
    }
}

/// Parse geometry definitions from text
pub fn parse_geometry_str(
    contents: &str,
    detector_name: &str,
    model: &DetectorModel,
) -> Result<DetectorGeometry, GeometryParseError> {
    let mut geometry = DetectorGeometry::new(detector_name, model.clone());

    for (index, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(content) = line.strip_prefix(COMMENT_PREFIX) {
            parse_comment_line(content.trim(), &mut geometry.comments);
            continue;
        }
        if line.starts_with(HEADER_PREFIX) {
            continue;
        }

        let object = parse_geometry_line(line, index + 1)?;
        if model.is_panel(&object) {
            // A repeated panel id replaces the earlier definition
            geometry
                .panels
                .insert(object.object_index, model.make_panel(&object));
        }
    }

    Ok(geometry)
}

/// Record a comment. `COMMENT:NN text` and `KEY: value` are keyed, anything else is numbered.
fn parse_comment_line(content: &str, comments: &mut BTreeMap<String, String>) {
    if !content.contains(':') {
        let key = format!("comment_{}", comments.len());
        comments.insert(key, String::from(content));
        return;
    }

    if let Some(rest) = content.strip_prefix("COMMENT:") {
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        let text = &rest[digits.len()..];
        let value = text.trim_start();
        if !digits.is_empty() && text.starts_with(char::is_whitespace) && !value.is_empty() {
            comments.insert(format!("COMMENT_{digits:0>2}"), String::from(value));
        }
    } else if let Some((key, value)) = content.split_once(':') {
        comments.insert(String::from(key.trim()), String::from(value.trim()));
    }
}

fn parse_geometry_line(line: &str, line_number: usize) -> Result<GeometryObject, GeometryParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != FIELDS_PER_LINE {
        return Err(GeometryParseError::FieldCount {
            line_number,
            line: String::from(line),
            found: fields.len(),
        });
    }

    let bad_field = |field: &'static str, value: &str| GeometryParseError::BadField {
        line_number,
        line: String::from(line),
        field,
        value: String::from(value),
    };
    let int_field = |i: usize, field: &'static str| -> Result<usize, GeometryParseError> {
        fields[i].parse::<usize>().map_err(|_| bad_field(field, fields[i]))
    };
    let float_field = |i: usize, field: &'static str| -> Result<f64, GeometryParseError> {
        fields[i].parse::<f64>().map_err(|_| bad_field(field, fields[i]))
    };

    Ok(GeometryObject {
        parent: String::from(fields[0]),
        parent_index: int_field(1, "parent_index")?,
        object_name: String::from(fields[2]),
        object_index: int_field(3, "object_index")?,
        position_um: [
            float_field(4, "x0")?,
            float_field(5, "y0")?,
            float_field(6, "z0")?,
        ],
        rotation_deg: [
            float_field(7, "rot_z")?,
            float_field(8, "rot_y")?,
            float_field(9, "rot_x")?,
        ],
        tilt_deg: [
            float_field(10, "tilt_z")?,
            float_field(11, "tilt_y")?,
            float_field(12, "tilt_x")?,
        ],
    })
}

/// Sanity checks on a parsed geometry. Returns every issue found; an empty list is a pass.
pub fn validate_geometry(geometry: &DetectorGeometry) -> Vec<String> {
    let model = &geometry.model;
    let mut issues = Vec::new();

    if geometry.num_panels() != model.num_panels {
        issues.push(format!(
            "Expected {} panels for {}, got {}",
            model.num_panels,
            model.name,
            geometry.num_panels()
        ));
    }

    let mut seen = BitSet::with_capacity(model.num_panels);
    let mut extra_ids = Vec::new();
    for id in geometry.panels.keys() {
        if *id < model.num_panels {
            seen.insert(*id);
        } else {
            extra_ids.push(*id);
        }
    }
    let missing_ids: Vec<usize> = (0..model.num_panels).filter(|id| !seen.contains(*id)).collect();
    if !missing_ids.is_empty() {
        issues.push(format!("Missing panel IDs: {missing_ids:?}"));
    }
    if !extra_ids.is_empty() {
        issues.push(format!("Unexpected panel IDs: {extra_ids:?}"));
    }

    for (id, panel) in geometry.panels.iter() {
        if panel.shape != model.panel_shape {
            issues.push(format!(
                "Panel {id} has wrong shape: {:?} (expected {:?})",
                panel.shape, model.panel_shape
            ));
        }
    }

    let ((xmin, xmax), (ymin, ymax)) = geometry.coordinate_bounds();
    for (axis, range) in [("X", xmax - xmin), ("Y", ymax - ymin)] {
        if !(MIN_DETECTOR_RANGE_UM..=MAX_DETECTOR_RANGE_UM).contains(&range) {
            issues.push(format!("{axis} coordinate range seems unreasonable: {range:.0} um"));
        }
    }

    issues
}
