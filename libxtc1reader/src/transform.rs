use std::collections::BTreeMap;

use ndarray::{Array2, Zip};

use super::constants::MAX_COORDINATE_UM;
use super::geometry::{DetectorGeometry, PanelGeometry};
use super::pixel_coords::{generate_panel_coordinates, CoordinateArrays};

/// a' = a cos - b sin, b' = a sin + b cos, applied element wise
fn rotate_plane(a: &mut Array2<f64>, b: &mut Array2<f64>, cos_a: f64, sin_a: f64) {
    Zip::from(a).and(b).for_each(|a, b| {
        let (a0, b0) = (*a, *b);
        *a = a0 * cos_a - b0 * sin_a;
        *b = a0 * sin_a + b0 * cos_a;
    });
}

/// Rotate about Z: x' = x cos - y sin, y' = x sin + y cos
pub fn rotate_z(x: &mut Array2<f64>, y: &mut Array2<f64>, angle_deg: f64) {
    if angle_deg == 0.0 {
        return;
    }
    let angle = angle_deg.to_radians();
    rotate_plane(x, y, angle.cos(), angle.sin());
}

/// Rotate about Y: x' = x cos + z sin, z' = -x sin + z cos
pub fn rotate_y(x: &mut Array2<f64>, z: &mut Array2<f64>, angle_deg: f64) {
    if angle_deg == 0.0 {
        return;
    }
    let angle = angle_deg.to_radians();
    rotate_plane(x, z, angle.cos(), -angle.sin());
}

/// Rotate about X: y' = y cos - z sin, z' = y sin + z cos
pub fn rotate_x(y: &mut Array2<f64>, z: &mut Array2<f64>, angle_deg: f64) {
    if angle_deg == 0.0 {
        return;
    }
    let angle = angle_deg.to_radians();
    rotate_plane(y, z, angle.cos(), angle.sin());
}

/// Move panel frame coordinates into the detector frame: rotate about Z, then
/// Y, then X, then translate to the panel position. With `do_tilt` the tilt
/// corrections are added to the design rotation angles.
pub fn transform_panel_coordinates(
    coords: &CoordinateArrays,
    panel: &PanelGeometry,
    do_tilt: bool,
) -> CoordinateArrays {
    let mut out = coords.clone();
    let [rot_z, rot_y, rot_x] = panel.rotation_deg;
    let [tilt_z, tilt_y, tilt_x] = if do_tilt { panel.tilt_deg } else { [0.0; 3] };

    rotate_z(&mut out.x, &mut out.y, rot_z + tilt_z);
    rotate_y(&mut out.x, &mut out.z, rot_y + tilt_y);
    rotate_x(&mut out.y, &mut out.z, rot_x + tilt_x);

    let [dx, dy, dz] = panel.position_um;
    out.x += dx;
    out.y += dy;
    out.z += dz;
    out
}

/// Detector frame coordinates of every panel, keyed by panel id
pub fn generate_detector_coordinates(
    geometry: &DetectorGeometry,
    do_tilt: bool,
) -> BTreeMap<usize, CoordinateArrays> {
    geometry
        .panels
        .iter()
        .map(|(id, panel)| {
            let local = generate_panel_coordinates(panel);
            (*id, transform_panel_coordinates(&local, panel, do_tilt))
        })
        .collect()
}

/// Extent of a whole detector and a rough image size for it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub x_range: f64,
    pub y_range: f64,
    /// (ceil(x_range / scale) + 1, ceil(y_range / scale) + 1). The assembler
    /// derives the exact shape from the binned indices instead.
    pub image_shape: (usize, usize),
}

pub fn detector_bounds(panels: &BTreeMap<usize, CoordinateArrays>, pixel_scale_size_um: f64) -> DetectorBounds {
    if panels.is_empty() {
        return DetectorBounds {
            x_min: 0.0,
            x_max: 0.0,
            y_min: 0.0,
            y_max: 0.0,
            x_range: 0.0,
            y_range: 0.0,
            image_shape: (0, 0),
        };
    }

    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for coords in panels.values() {
        let bounds = coords.bounds();
        x_min = x_min.min(bounds.x_min);
        x_max = x_max.max(bounds.x_max);
        y_min = y_min.min(bounds.y_min);
        y_max = y_max.max(bounds.y_max);
    }
    let x_range = x_max - x_min;
    let y_range = y_max - y_min;
    DetectorBounds {
        x_min,
        x_max,
        y_min,
        y_max,
        x_range,
        y_range,
        image_shape: (
            (x_range / pixel_scale_size_um).ceil() as usize + 1,
            (y_range / pixel_scale_size_um).ceil() as usize + 1,
        ),
    }
}

/// Check that coordinate arrays agree in shape, are finite and lie within a
/// meter of the origin. Returns every issue found.
pub fn validate_coordinate_arrays(arrays: &[&Array2<f64>]) -> Vec<String> {
    let mut issues = Vec::new();
    let Some(first) = arrays.first() else {
        return issues;
    };

    let reference = first.dim();
    for (i, array) in arrays.iter().enumerate().skip(1) {
        if array.dim() != reference {
            issues.push(format!(
                "Coordinate array {i} has shape {:?}, expected {:?}",
                array.dim(),
                reference
            ));
        }
    }

    for (i, array) in arrays.iter().enumerate() {
        if !array.iter().all(|v| v.is_finite()) {
            issues.push(format!("Coordinate array {i} contains non-finite values"));
            continue;
        }
        let largest = array.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if largest > MAX_COORDINATE_UM {
            issues.push(format!(
                "Coordinate array {i} contains unreasonably large values (max: {largest:.0} um)"
            ));
        }
    }

    issues
}
