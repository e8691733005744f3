use ndarray::Array2;

use super::constants::*;
use super::geometry::PanelGeometry;

/// Per pixel coordinates in micrometers, each array shaped (rows, cols)
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateArrays {
    pub x: Array2<f64>,
    pub y: Array2<f64>,
    pub z: Array2<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
}

fn min_max(values: &Array2<f64>) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
}

impl CoordinateArrays {
    pub fn shape(&self) -> (usize, usize) {
        self.x.dim()
    }

    pub fn bounds(&self) -> CoordinateBounds {
        let (x_min, x_max) = min_max(&self.x);
        let (y_min, y_max) = min_max(&self.y);
        let (z_min, z_max) = min_max(&self.z);
        CoordinateBounds {
            x_min,
            x_max,
            y_min,
            y_max,
            z_min,
            z_max,
        }
    }
}

/// Pixel centers on one side of a seam, nearest first. The pixel touching the
/// seam is wide, so its center sits half a wide pixel out and every later
/// center is shifted by the extra width.
fn half_axis(half: usize, pitch: f64, wide: f64) -> Vec<f64> {
    let mut rhs: Vec<f64> = (0..half)
        .map(|i| i as f64 * pitch + wide - pitch / 2.0)
        .collect();
    if let Some(first) = rhs.first_mut() {
        *first = wide / 2.0;
    }
    rhs
}

/// Column axis: [-reverse(rhs), rhs]
fn x_axis(cols: usize, pitch: f64, wide: f64) -> Vec<f64> {
    let rhs = half_axis(cols / 2, pitch, wide);
    rhs.iter().rev().map(|v| -v).chain(rhs.iter().copied()).collect()
}

/// Row axis: [reverse(rhs), -rhs]. Rows run from +y down to -y.
fn y_axis(rows: usize, pitch: f64, wide: f64) -> Vec<f64> {
    let rhs = half_axis(rows / 2, pitch, wide);
    rhs.iter().rev().copied().chain(rhs.iter().map(|v| -v)).collect()
}

/// Pixel centers of a panel in its own frame, origin at the panel center.
///
/// The panel is four sensor tiles meeting at a cross shaped seam in the middle;
/// the pixel rows and columns on each side of the seam are wide. `rows` and
/// `cols` must be even: an odd axis comes out one pixel short, and
/// `ImageAssembler::new` refuses such panels.
pub fn generate_panel_coordinates(panel: &PanelGeometry) -> CoordinateArrays {
    let (rows, cols) = panel.shape;
    let xs = x_axis(cols, panel.pixel_size_um, panel.wide_pixel_size_um);
    let ys = y_axis(rows, panel.pixel_size_um, panel.wide_pixel_size_um);
    let shape = (ys.len(), xs.len());
    CoordinateArrays {
        x: Array2::from_shape_fn(shape, |(_, c)| xs[c]),
        y: Array2::from_shape_fn(shape, |(r, _)| ys[r]),
        z: Array2::zeros(shape),
    }
}

/// Pixel area relative to a regular pixel: 1 for regular pixels, wide/pitch
/// along the seams and (wide/pitch)^2 where the seams cross.
pub fn pixel_areas(panel: &PanelGeometry) -> Array2<f32> {
    let (rows, cols) = panel.shape;
    let ratio = (panel.wide_pixel_size_um / panel.pixel_size_um) as f32;
    let seam = |index: usize, len: usize| len >= 2 && (index == len / 2 - 1 || index == len / 2);
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let row_factor = if seam(r, rows) { ratio } else { 1.0 };
        let col_factor = if seam(c, cols) { ratio } else { 1.0 };
        row_factor * col_factor
    })
}

/// Sanity checks on the coordinates of a single panel. Returns every issue found.
pub fn validate_panel_coordinates(coords: &CoordinateArrays, expected_shape: (usize, usize)) -> Vec<String> {
    let mut issues = Vec::new();

    if coords.shape() != expected_shape {
        issues.push(format!(
            "Coordinate shape {:?} != expected {:?}",
            coords.shape(),
            expected_shape
        ));
    }

    for (name, values) in [("X", &coords.x), ("Y", &coords.y), ("Z", &coords.z)] {
        if !values.iter().all(|v| v.is_finite()) {
            issues.push(format!("{name} coordinates contain non-finite values"));
        }
    }

    let bounds = coords.bounds();
    for (name, range) in [
        ("X", bounds.x_max - bounds.x_min),
        ("Y", bounds.y_max - bounds.y_min),
    ] {
        if !(MIN_PANEL_RANGE_UM..=MAX_PANEL_RANGE_UM).contains(&range) {
            issues.push(format!(
                "{name} coordinate range {range:.0} um seems unreasonable for panel"
            ));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::DetectorModel;

    fn epix_panel() -> PanelGeometry {
        let model = DetectorModel::epix10ka2m();
        PanelGeometry {
            panel_id: 0,
            shape: model.panel_shape,
            pixel_size_um: model.pixel_size_um,
            wide_pixel_size_um: model.wide_pixel_size_um,
            position_um: [0.0; 3],
            rotation_deg: [0.0; 3],
            tilt_deg: [0.0; 3],
        }
    }

    #[test]
    fn test_half_axis() {
        assert_eq!(half_axis(4, 100.0, 250.0), vec![125.0, 300.0, 400.0, 500.0]);
        assert!(half_axis(0, 100.0, 250.0).is_empty());
    }

    #[test]
    fn test_epix_axes() {
        let coords = generate_panel_coordinates(&epix_panel());
        assert_eq!(coords.shape(), (352, 384));

        // Columns: -19300 .. -125 | 125 .. 19300
        assert_eq!(coords.x[[0, 0]], -19_300.0);
        assert_eq!(coords.x[[0, 191]], -125.0);
        assert_eq!(coords.x[[0, 192]], 125.0);
        assert_eq!(coords.x[[0, 193]], 300.0);
        assert_eq!(coords.x[[351, 383]], 19_300.0);

        // Rows run the other way: 17700 .. 125 | -125 .. -17700
        assert_eq!(coords.y[[0, 0]], 17_700.0);
        assert_eq!(coords.y[[175, 10]], 125.0);
        assert_eq!(coords.y[[176, 10]], -125.0);
        assert_eq!(coords.y[[351, 0]], -17_700.0);

        // Meshgrid: x constant down a column, y constant along a row
        assert_eq!(coords.x[[0, 17]], coords.x[[300, 17]]);
        assert_eq!(coords.y[[42, 0]], coords.y[[42, 383]]);
        assert!(coords.z.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_panel_extent_is_plausible() {
        let coords = generate_panel_coordinates(&epix_panel());
        let bounds = coords.bounds();
        let x_extent = bounds.x_max - bounds.x_min;
        let y_extent = bounds.y_max - bounds.y_min;
        assert!((30_000.0..=50_000.0).contains(&x_extent));
        assert!((30_000.0..=50_000.0).contains(&y_extent));
        assert!(validate_panel_coordinates(&coords, (352, 384)).is_empty());
    }

    #[test]
    fn test_validation_flags_problems() {
        let mut coords = generate_panel_coordinates(&epix_panel());
        coords.z[[3, 3]] = f64::NAN;
        let issues = validate_panel_coordinates(&coords, (10, 10));
        assert!(issues[0].starts_with("Coordinate shape (352, 384)"));
        assert!(issues.iter().any(|i| i == "Z coordinates contain non-finite values"));

        let mut tiny = epix_panel();
        tiny.shape = (4, 4);
        let issues = validate_panel_coordinates(&generate_panel_coordinates(&tiny), (4, 4));
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_pixel_areas() {
        let areas = pixel_areas(&epix_panel());
        assert_eq!(areas.dim(), (352, 384));
        assert_eq!(areas[[0, 0]], 1.0);
        assert_eq!(areas[[10, 191]], 2.5);
        assert_eq!(areas[[10, 192]], 2.5);
        assert_eq!(areas[[175, 10]], 2.5);
        assert_eq!(areas[[176, 192]], 6.25);
        assert_eq!(areas.iter().filter(|a| **a == 6.25).count(), 4);
    }
}
