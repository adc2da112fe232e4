use crate::types::LosarComplex;
use ndarray::{Array1, ArrayView2, Axis};

/// Evenly spaced values over `[start, end]`, both endpoints included.
///
/// A single sample yields `start`, an empty request yields an empty vector.
pub fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (num - 1) as f64;
            let mut values: Vec<f64> = (0..num).map(|i| start + step * i as f64).collect();
            values[num - 1] = end;
            values
        }
    }
}

/// Sum the complex image across traces, coherently (accounting for phase).
///
/// A non-zero `phi` applies a linear phase ramp running from `+tnum/2 * phi`
/// on the first trace to `-tnum/2 * phi` on the last. The ramp is added to the
/// phase of every depth sample while the magnitude is kept, then the rotated
/// samples are summed. `phi == 0` is a plain sum with no trigonometry.
///
/// # Arguments
/// * `image` - Sub-image shaped (depth, traces)
/// * `phi` - Phase increment per trace in radians
///
/// # Returns
/// * Complex stack, one value per depth sample
pub fn coherent_summation(image: &ArrayView2<LosarComplex>, phi: f64) -> Array1<LosarComplex> {
    if phi == 0.0 {
        return image.sum_axis(Axis(1));
    }

    let (snum, tnum) = image.dim();
    let half = tnum as f64 / 2.0;
    let ramp = linspace(half * phi, -half * phi, tnum);

    let mut stacked = Array1::<LosarComplex>::zeros(snum);
    for (row, out) in image.outer_iter().zip(stacked.iter_mut()) {
        *out = row
            .iter()
            .zip(ramp.iter())
            .map(|(sample, &offset)| LosarComplex::from_polar(sample.norm(), sample.arg() + offset))
            .sum();
    }

    stacked
}

/// Incoherent average: mean squared magnitude across traces, phase ignored.
///
/// An image with no traces produces NaN for every depth sample.
pub fn incoherent_average(image: &ArrayView2<LosarComplex>) -> Array1<f64> {
    let tnum = image.ncols() as f64;
    image
        .map_axis(Axis(1), |row| row.iter().map(|sample| sample.norm_sqr()).sum::<f64>())
        / tnum
}
