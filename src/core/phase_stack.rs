use crate::core::stacking::{coherent_summation, linspace};
use crate::types::{LosarComplex, PowerSurface};
use ndarray::ArrayView2;
use std::f64::consts::PI;

/// Number of candidates in the default phase-ramp grid
pub const DEFAULT_CANDIDATE_COUNT: usize = 100;

/// Default candidate grid: 100 phase increments evenly spaced over [-pi, pi].
///
/// Built fresh on every call so no two parameter sets share storage.
pub fn default_nus() -> Vec<f64> {
    linspace(-PI, PI, DEFAULT_CANDIDATE_COUNT)
}

/// Phase-stack power surface for one synthetic aperture.
///
/// Every candidate in `nus` is applied as a linear phase ramp through
/// [`coherent_summation`] and the stacked power `|sum|^2` becomes one column.
/// Column order follows `nus`, so the caller keeps `nus` as the wavenumber axis.
///
/// # Arguments
/// * `image` - Sub-image within a single aperture, shaped (depth, traces)
/// * `nus` - Candidate phase increments per trace
///
/// # Returns
/// * Power surface shaped (depth, nus.len())
pub fn layer_optimization(image: &ArrayView2<LosarComplex>, nus: &[f64]) -> PowerSurface {
    let mut surface = PowerSurface::zeros((image.nrows(), nus.len()));

    for (&nu, mut column) in nus.iter().zip(surface.columns_mut()) {
        let stacked = coherent_summation(image, nu);
        column.zip_mut_with(&stacked, |power, sample| *power = sample.norm_sqr());
    }

    surface
}
