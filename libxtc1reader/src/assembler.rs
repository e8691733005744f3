use ndarray::{s, Array2, ArrayView2, ArrayView3, Axis};

use super::constants::DEFAULT_PIXEL_SCALE_SIZE_UM;
use super::error::AssemblyError;
use super::geometry::DetectorGeometry;
use super::transform::generate_detector_coordinates;

// Gaps of the simple quad layout, in pixels
const PANEL_GAP_COLS: usize = 20;
const PANEL_GAP_ROWS: usize = 20;
const QUAD_GAP_COLS: usize = 50;
const PANELS_PER_QUAD: usize = 4;

/// Options for turning coordinates into an image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyOptions {
    pub pixel_scale_size_um: f64,
    /// Extra margin (x, y) in pixels; only positive values are applied
    pub xy_offset_pix: (f64, f64),
    pub do_tilt: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            pixel_scale_size_um: DEFAULT_PIXEL_SCALE_SIZE_UM,
            xy_offset_pix: (0.0, 0.0),
            do_tilt: true,
        }
    }
}

/// Image row and column of every pixel, in the order the coordinates were given
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelIndices {
    pub rows: Vec<u32>,
    pub cols: Vec<u32>,
}

impl PixelIndices {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// (max(row) + 1, max(col) + 1)
    pub fn image_shape(&self) -> (usize, usize) {
        let max_row = self.rows.iter().max().map_or(0, |r| *r as usize);
        let max_col = self.cols.iter().max().map_or(0, |c| *c as usize);
        (max_row + 1, max_col + 1)
    }
}

/// Bin physical coordinates into image pixels.
///
/// The origin is placed half a pixel below the smallest coordinate, so the
/// pixel at the minimum lands in the middle of bin 0 rather than on its edge.
/// Indices are truncated, not rounded. X selects the row, Y the column.
pub fn coordinates_to_pixel_indices(
    x: &[f64],
    y: &[f64],
    pixel_scale_size_um: f64,
    xy_offset_pix: (f64, f64),
) -> PixelIndices {
    let x_min = x.iter().copied().fold(f64::INFINITY, f64::min);
    let y_min = y.iter().copied().fold(f64::INFINITY, f64::min);

    let mut x_min_adjusted = x_min - pixel_scale_size_um / 2.0;
    let mut y_min_adjusted = y_min - pixel_scale_size_um / 2.0;
    if xy_offset_pix.0 > 0.0 {
        x_min_adjusted -= xy_offset_pix.0 * pixel_scale_size_um;
    }
    if xy_offset_pix.1 > 0.0 {
        y_min_adjusted -= xy_offset_pix.1 * pixel_scale_size_um;
    }

    PixelIndices {
        rows: x
            .iter()
            .map(|v| ((v - x_min_adjusted) / pixel_scale_size_um) as u32)
            .collect(),
        cols: y
            .iter()
            .map(|v| ((v - y_min_adjusted) / pixel_scale_size_um) as u32)
            .collect(),
    }
}

/// Scatter `values` into a zeroed image. Where pixels share a bin the last one wins.
pub fn img_from_pixel_arrays<T, I>(indices: &PixelIndices, values: I) -> Array2<T>
where
    T: Copy + Default,
    I: IntoIterator<Item = T>,
{
    let mut image = Array2::from_elem(indices.image_shape(), T::default());
    for ((row, col), value) in indices.rows.iter().zip(indices.cols.iter()).zip(values) {
        image[[*row as usize, *col as usize]] = value;
    }
    image
}

/// Assembles detector images for one geometry.
///
/// Pixel indices depend only on the geometry, so they are computed once here
/// and reused for every frame.
#[derive(Debug, Clone)]
pub struct ImageAssembler {
    indices: PixelIndices,
    panel_ids: Vec<usize>,
    panel_shape: (usize, usize),
    image_shape: (usize, usize),
}

impl ImageAssembler {
    pub fn new(geometry: &DetectorGeometry, options: &AssemblyOptions) -> Result<Self, AssemblyError> {
        let panel_shape = match geometry.panels.values().next() {
            Some(panel) => panel.shape,
            None => return Err(AssemblyError::EmptyGeometry),
        };
        if let Some(odd) = geometry.panels.values().find(|p| p.shape != panel_shape) {
            return Err(AssemblyError::ShapeMismatch {
                expected: vec![panel_shape.0, panel_shape.1],
                found: vec![odd.shape.0, odd.shape.1],
            });
        }

        // The pixel grid is built from the two halves of each axis
        if panel_shape.0 % 2 != 0 || panel_shape.1 % 2 != 0 {
            return Err(AssemblyError::ShapeMismatch {
                expected: vec![panel_shape.0 + panel_shape.0 % 2, panel_shape.1 + panel_shape.1 % 2],
                found: vec![panel_shape.0, panel_shape.1],
            });
        }

        let coordinates = generate_detector_coordinates(geometry, options.do_tilt);
        let mut x_all = Vec::with_capacity(geometry.total_pixels());
        let mut y_all = Vec::with_capacity(geometry.total_pixels());
        for coords in coordinates.values() {
            x_all.extend(coords.x.iter());
            y_all.extend(coords.y.iter());
        }

        let indices = coordinates_to_pixel_indices(
            &x_all,
            &y_all,
            options.pixel_scale_size_um,
            options.xy_offset_pix,
        );
        if indices.len() != geometry.total_pixels() {
            return Err(AssemblyError::ShapeMismatch {
                expected: vec![geometry.total_pixels()],
                found: vec![indices.len()],
            });
        }
        let image_shape = indices.image_shape();
        spdlog::info!(
            "Image assembler for {} ready: {} panels into a {}x{} image",
            geometry.detector_name,
            coordinates.len(),
            image_shape.0,
            image_shape.1
        );

        Ok(Self {
            indices,
            panel_ids: coordinates.keys().copied().collect(),
            panel_shape,
            image_shape,
        })
    }

    pub fn image_shape(&self) -> (usize, usize) {
        self.image_shape
    }

    pub fn indices(&self) -> &PixelIndices {
        &self.indices
    }

    /// Shape the frame stack must have: frames are indexed by panel id
    pub fn expected_frames_shape(&self) -> (usize, usize, usize) {
        let n_frames = self.panel_ids.last().map_or(0, |id| id + 1);
        (n_frames, self.panel_shape.0, self.panel_shape.1)
    }

    /// Place a (panels, rows, cols) frame stack into the detector image
    pub fn assemble<T: Copy + Default>(&self, frames: ArrayView3<T>) -> Result<Array2<T>, AssemblyError> {
        let expected = self.expected_frames_shape();
        if frames.dim() != expected {
            let (n, r, c) = frames.dim();
            return Err(AssemblyError::ShapeMismatch {
                expected: vec![expected.0, expected.1, expected.2],
                found: vec![n, r, c],
            });
        }

        let values = self
            .panel_ids
            .iter()
            .flat_map(|id| frames.index_axis(Axis(0), *id).into_iter().copied());
        Ok(img_from_pixel_arrays(&self.indices, values))
    }
}

/// One shot assembly. Prefer an `ImageAssembler` when assembling many frames.
pub fn assemble_image<T: Copy + Default>(
    frames: ArrayView3<T>,
    geometry: &DetectorGeometry,
    options: &AssemblyOptions,
) -> Result<Array2<T>, AssemblyError> {
    ImageAssembler::new(geometry, options)?.assemble(frames)
}

fn place<T: Copy>(image: &mut Array2<T>, panel: ArrayView2<T>, row: usize, col: usize) {
    let (rows, cols) = panel.dim();
    image
        .slice_mut(s![row..row + rows, col..col + cols])
        .assign(&panel);
}

/// Quick look tiling without a geometry. Each quad of four panels is laid out as
///
/// ```text
/// 3 2
/// 1 0
/// ```
///
/// and the quads are placed side by side. Accepts 4 or 16 panels.
pub fn simple_layout_image<T: Copy + Default>(
    frames: ArrayView3<T>,
    include_gaps: bool,
) -> Result<Array2<T>, AssemblyError> {
    let (n_panels, rows, cols) = frames.dim();
    if n_panels != PANELS_PER_QUAD && n_panels != 4 * PANELS_PER_QUAD {
        return Err(AssemblyError::ShapeMismatch {
            expected: vec![4 * PANELS_PER_QUAD, rows, cols],
            found: vec![n_panels, rows, cols],
        });
    }
    let (gap_rows, gap_cols, quad_gap) = if include_gaps {
        (PANEL_GAP_ROWS, PANEL_GAP_COLS, QUAD_GAP_COLS)
    } else {
        (0, 0, 0)
    };

    let n_quads = n_panels / PANELS_PER_QUAD;
    let quad_rows = 2 * rows + gap_rows;
    let quad_cols = 2 * cols + gap_cols;
    let width = n_quads * quad_cols + (n_quads - 1) * quad_gap;
    let mut image = Array2::from_elem((quad_rows, width), T::default());

    for quad in 0..n_quads {
        let col0 = quad * (quad_cols + quad_gap);
        let first = quad * PANELS_PER_QUAD;
        let layout = [
            (first + 3, 0, 0),
            (first + 2, 0, cols + gap_cols),
            (first + 1, rows + gap_rows, 0),
            (first, rows + gap_rows, cols + gap_cols),
        ];
        for (panel, row, col) in layout {
            place(&mut image, frames.index_axis(Axis(0), panel), row, col0 + col);
        }
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{DetectorModel, PanelGeometry};
    use crate::geometry_parser::load_default_epix10ka2m_geometry;
    use ndarray::{Array3, arr2};

    #[test]
    fn test_half_pixel_offset() {
        let x = [0.0, 60.0];
        let y = [0.0, 0.0];
        let indices = coordinates_to_pixel_indices(&x, &y, 100.0, (0.0, 0.0));
        assert_eq!(indices.rows, vec![0, 1]);
        assert_eq!(indices.image_shape(), (2, 1));

        // Binning from the raw minimum would fold both pixels into one row
        let naive_rows: Vec<u32> = x.iter().map(|v| ((v - 0.0) / 100.0) as u32).collect();
        assert_eq!(naive_rows, vec![0, 0]);
        assert_ne!(naive_rows, indices.rows);
    }

    #[test]
    fn test_extra_offset_only_when_positive() {
        let x = [0.0, 100.0];
        let y = [0.0, 100.0];
        let shifted = coordinates_to_pixel_indices(&x, &y, 100.0, (2.0, -3.0));
        assert_eq!(shifted.rows, vec![2, 3]);
        assert_eq!(shifted.cols, vec![0, 1]);
        assert_eq!(shifted.image_shape(), (4, 2));
    }

    #[test]
    fn test_shape_is_max_index_plus_one_and_last_write_wins() {
        let indices = PixelIndices {
            rows: vec![0, 2, 2],
            cols: vec![1, 0, 0],
        };
        let image = img_from_pixel_arrays(&indices, [5u16, 6, 7]);
        assert_eq!(image.dim(), (3, 2));
        assert_eq!(image, arr2(&[[0, 5], [0, 0], [7, 0]]));
    }

    fn small_geometry() -> DetectorGeometry {
        let model = DetectorModel {
            name: String::from("mini"),
            panel_object: String::from("MINI:V1"),
            num_panels: 2,
            panel_shape: (2, 2),
            pixel_size_um: 100.0,
            wide_pixel_size_um: 100.0,
        };
        let mut geometry = DetectorGeometry::new("mini", model);
        for (id, y0) in [(0usize, 0.0), (1, 1000.0)] {
            geometry.panels.insert(
                id,
                PanelGeometry {
                    panel_id: id,
                    shape: (2, 2),
                    pixel_size_um: 100.0,
                    wide_pixel_size_um: 100.0,
                    position_um: [0.0, y0, 0.0],
                    rotation_deg: [0.0; 3],
                    tilt_deg: [0.0; 3],
                },
            );
        }
        geometry
    }

    #[test]
    fn test_assembler_places_panels() {
        // Local pixel centers are at +-50 um, panel 1 sits 1 mm further along y
        let geometry = small_geometry();
        let assembler = ImageAssembler::new(&geometry, &AssemblyOptions::default()).unwrap();
        assert_eq!(assembler.expected_frames_shape(), (2, 2, 2));
        assert_eq!(assembler.image_shape(), (2, 12));

        let frames = Array3::from_shape_vec((2, 2, 2), vec![1u16, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let image = assembler.assemble(frames.view()).unwrap();
        // x runs along columns of the panel and selects the image row, y selects the column
        assert_eq!(image[[0, 1]], 1);
        assert_eq!(image[[1, 1]], 2);
        assert_eq!(image[[0, 0]], 3);
        assert_eq!(image[[1, 0]], 4);
        assert_eq!(image[[0, 11]], 5);
        assert_eq!(image[[1, 10]], 8);
        assert_eq!(image.iter().filter(|v| **v == 0).count(), 2 * 12 - 8);

        let one_shot = assemble_image(frames.view(), &geometry, &AssemblyOptions::default()).unwrap();
        assert_eq!(one_shot, image);
    }

    #[test]
    fn test_assembler_errors() {
        let geometry = small_geometry();
        let assembler = ImageAssembler::new(&geometry, &AssemblyOptions::default()).unwrap();
        let wrong = Array3::<u16>::zeros((2, 3, 2));
        assert_eq!(
            assembler.assemble(wrong.view()),
            Err(AssemblyError::ShapeMismatch {
                expected: vec![2, 2, 2],
                found: vec![2, 3, 2]
            })
        );

        let empty = DetectorGeometry::new("empty", DetectorModel::epix10ka2m());
        assert!(matches!(
            ImageAssembler::new(&empty, &AssemblyOptions::default()),
            Err(AssemblyError::EmptyGeometry)
        ));
    }

    #[test]
    fn test_odd_panel_shape_is_rejected() {
        let mut geometry = small_geometry();
        for panel in geometry.panels.values_mut() {
            panel.shape = (3, 3);
        }
        assert_eq!(
            ImageAssembler::new(&geometry, &AssemblyOptions::default()).err(),
            Some(AssemblyError::ShapeMismatch {
                expected: vec![4, 4],
                found: vec![3, 3]
            })
        );

        let frames = Array3::from_shape_vec((2, 3, 3), (1u16..=18).collect()).unwrap();
        assert!(assemble_image(frames.view(), &geometry, &AssemblyOptions::default()).is_err());

        for panel in geometry.panels.values_mut() {
            panel.shape = (2, 3);
        }
        assert!(ImageAssembler::new(&geometry, &AssemblyOptions::default()).is_err());
    }

    #[test]
    fn test_default_geometry_assembly() {
        let geometry = load_default_epix10ka2m_geometry().unwrap();
        let assembler = ImageAssembler::new(&geometry, &AssemblyOptions::default()).unwrap();
        let frames = Array3::<f32>::from_elem((16, 352, 384), 1.0);
        let image = assembler.assemble(frames.view()).unwrap();
        assert_eq!(image.dim(), assembler.image_shape());
        assert_eq!(assembler.indices().len(), 16 * 352 * 384);
        let (rows, cols) = image.dim();
        assert!(rows > 1500 && rows < 1700);
        assert!(cols > 1500 && cols < 1700);
    }

    #[test]
    fn test_simple_layout() {
        let mut frames = Array3::<u8>::zeros((4, 2, 3));
        for p in 0..4 {
            frames.index_axis_mut(Axis(0), p).fill(p as u8 + 1);
        }
        let image = simple_layout_image(frames.view(), false).unwrap();
        assert_eq!(image.dim(), (4, 6));
        assert_eq!(image[[0, 0]], 4);
        assert_eq!(image[[0, 3]], 3);
        assert_eq!(image[[2, 0]], 2);
        assert_eq!(image[[3, 5]], 1);

        let full = Array3::<u16>::ones((16, 352, 384));
        let image = simple_layout_image(full.view(), true).unwrap();
        assert_eq!(image.dim(), (2 * 352 + 20, 4 * (2 * 384 + 20) + 3 * 50));

        let odd = Array3::<u16>::ones((3, 2, 2));
        assert!(simple_layout_image(odd.view(), true).is_err());
    }
}
