use std::collections::BTreeMap;

use super::constants::*;

/// One data line of a geometry definition file
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryObject {
    pub parent: String,
    pub parent_index: usize,
    pub object_name: String,
    pub object_index: usize,
    /// (x0, y0, z0) in micrometers
    pub position_um: [f64; 3],
    /// (z, y, x) in degrees
    pub rotation_deg: [f64; 3],
    /// (z, y, x) in degrees
    pub tilt_deg: [f64; 3],
}

/// The fixed properties of a detector type: which geometry objects are its
/// panels and what every panel looks like.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorModel {
    pub name: String,
    pub panel_object: String,
    pub num_panels: usize,
    /// (rows, cols)
    pub panel_shape: (usize, usize),
    pub pixel_size_um: f64,
    pub wide_pixel_size_um: f64,
}

impl Default for DetectorModel {
    fn default() -> Self {
        Self::epix10ka2m()
    }
}

impl DetectorModel {
    pub fn epix10ka2m() -> Self {
        Self {
            name: String::from(EPIX10KA2M_NAME),
            panel_object: String::from(EPIX10KA_PANEL_OBJECT),
            num_panels: EPIX10KA2M_NUM_PANELS,
            panel_shape: (EPIX10KA2M_PANEL_ROWS, EPIX10KA2M_PANEL_COLS),
            pixel_size_um: EPIX10KA2M_PIXEL_SIZE_UM,
            wide_pixel_size_um: EPIX10KA2M_WIDE_PIXEL_SIZE_UM,
        }
    }

    pub fn is_panel(&self, object: &GeometryObject) -> bool {
        object.object_name == self.panel_object
    }

    pub fn make_panel(&self, object: &GeometryObject) -> PanelGeometry {
        PanelGeometry {
            panel_id: object.object_index,
            shape: self.panel_shape,
            pixel_size_um: self.pixel_size_um,
            wide_pixel_size_um: self.wide_pixel_size_um,
            position_um: object.position_um,
            rotation_deg: object.rotation_deg,
            tilt_deg: object.tilt_deg,
        }
    }

    pub fn pixels_per_panel(&self) -> usize {
        self.panel_shape.0 * self.panel_shape.1
    }
}

/// Placement of a single panel in the detector frame
#[derive(Debug, Clone, PartialEq)]
pub struct PanelGeometry {
    pub panel_id: usize,
    /// (rows, cols)
    pub shape: (usize, usize),
    pub pixel_size_um: f64,
    /// Size of the pixels along the internal sensor-tile seams
    pub wide_pixel_size_um: f64,
    pub position_um: [f64; 3],
    /// (z, y, x) in degrees
    pub rotation_deg: [f64; 3],
    /// (z, y, x) in degrees
    pub tilt_deg: [f64; 3],
}

impl PanelGeometry {
    pub fn num_pixels(&self) -> usize {
        self.shape.0 * self.shape.1
    }
}

/// A complete detector: its panels keyed by panel id plus the metadata
/// found in the comments of the geometry file.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorGeometry {
    pub detector_name: String,
    pub model: DetectorModel,
    pub panels: BTreeMap<usize, PanelGeometry>,
    pub comments: BTreeMap<String, String>,
    /// Size of one pixel of an assembled image
    pub pixel_scale_size_um: f64,
}

impl DetectorGeometry {
    pub fn new(detector_name: &str, model: DetectorModel) -> Self {
        Self {
            detector_name: String::from(detector_name),
            model,
            panels: BTreeMap::new(),
            comments: BTreeMap::new(),
            pixel_scale_size_um: DEFAULT_PIXEL_SCALE_SIZE_UM,
        }
    }

    pub fn num_panels(&self) -> usize {
        self.panels.len()
    }

    pub fn total_pixels(&self) -> usize {
        self.panels.values().map(|p| p.num_pixels()).sum()
    }

    pub fn get_panel(&self, panel_id: usize) -> Option<&PanelGeometry> {
        self.panels.get(&panel_id)
    }

    /// Rough ((xmin, xmax), (ymin, ymax)) of the detector in micrometers: the
    /// extremes of the panel positions widened by one panel height. The exact
    /// extent needs the full coordinate transform.
    pub fn coordinate_bounds(&self) -> ((f64, f64), (f64, f64)) {
        if self.panels.is_empty() {
            return ((0.0, 0.0), (0.0, 0.0));
        }
        let panel_size_um = self
            .panels
            .values()
            .map(|p| p.shape.0 as f64 * p.pixel_size_um)
            .fold(0.0, f64::max);

        let mut x_bounds = (f64::INFINITY, f64::NEG_INFINITY);
        let mut y_bounds = (f64::INFINITY, f64::NEG_INFINITY);
        for panel in self.panels.values() {
            let [x, y, _] = panel.position_um;
            x_bounds = (x_bounds.0.min(x), x_bounds.1.max(x));
            y_bounds = (y_bounds.0.min(y), y_bounds.1.max(y));
        }
        (
            (x_bounds.0 - panel_size_um, x_bounds.1 + panel_size_um),
            (y_bounds.0 - panel_size_um, y_bounds.1 + panel_size_um),
        )
    }

    /// Multi-line description for logs and the CLI
    pub fn summary(&self) -> String {
        let ((xmin, xmax), (ymin, ymax)) = self.coordinate_bounds();
        let mut text = format!(
            "Detector: {}\nPanels: {}\nTotal pixels: {}\nCoordinate bounds:\n  X: {:.0} to {:.0} um\n  Y: {:.0} to {:.0} um",
            self.detector_name,
            self.num_panels(),
            self.total_pixels(),
            xmin,
            xmax,
            ymin,
            ymax
        );
        for (key, value) in self.comments.iter() {
            text.push_str(&format!("\n  {key}: {value}"));
        }
        text
    }
}
