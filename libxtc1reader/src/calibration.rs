use ndarray::{Array3, ArrayView3};

/// Turns raw detector counts into calibrated values, e.g. pedestal and gain corrections
pub trait Calibrator {
    fn apply(&self, raw: ArrayView3<u16>) -> Array3<f32>;
}

/// Source of calibrators, looked up per detector and run
pub trait CalibrationProvider {
    fn calibrator(&self, detector: &str, run_number: u32) -> Option<Box<dyn Calibrator>>;
}

/// Passes raw counts through as floats
#[derive(Debug, Clone, Copy, Default)]
pub struct Uncalibrated;

impl Calibrator for Uncalibrated {
    fn apply(&self, raw: ArrayView3<u16>) -> Array3<f32> {
        raw.mapv(f32::from)
    }
}

/// Provider used when no calibration constants are available
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCalibration;

impl CalibrationProvider for NoCalibration {
    fn calibrator(&self, _detector: &str, _run_number: u32) -> Option<Box<dyn Calibrator>> {
        None
    }
}

/// Calibrate with the provider's calibrator if it has one, otherwise pass the raw counts through
pub fn calibrate_or_raw(
    provider: &dyn CalibrationProvider,
    detector: &str,
    run_number: u32,
    raw: ArrayView3<u16>,
) -> Array3<f32> {
    match provider.calibrator(detector, run_number) {
        Some(calibrator) => calibrator.apply(raw),
        None => Uncalibrated.apply(raw),
    }
}
