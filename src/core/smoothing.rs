use crate::types::{LosarError, LosarResult, PowerSurface};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Gaussian smoothing parameters for power surfaces
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianSmoothingParams {
    /// Kernel size along (depth, wavenumber); a size of 1 leaves that axis untouched
    pub window: [usize; 2],
}

impl Default for GaussianSmoothingParams {
    fn default() -> Self {
        Self { window: [5, 5] }
    }
}

/// Separable 2D Gaussian blur for real-valued power surfaces
pub struct GaussianSmoother {
    kernels: [Vec<f64>; 2],
}

impl GaussianSmoother {
    /// Build the two 1D kernels for the configured window
    pub fn new(params: GaussianSmoothingParams) -> LosarResult<Self> {
        if params.window.iter().any(|&size| size == 0) {
            return Err(LosarError::Configuration(format!(
                "Gaussian window sizes must be positive, got {:?}",
                params.window
            )));
        }

        Ok(Self {
            kernels: [
                gaussian_kernel_1d(params.window[0]),
                gaussian_kernel_1d(params.window[1]),
            ],
        })
    }

    /// Smooth a power surface along both axes.
    ///
    /// Edges use half-sample symmetric reflection (`d c b a | a b c d | d c b a`),
    /// which stays valid when the kernel is wider than the axis.
    pub fn apply(&self, surface: &ArrayView2<f64>) -> PowerSurface {
        let along_depth = convolve_axis(surface, Axis(0), &self.kernels[0]);
        convolve_axis(&along_depth.view(), Axis(1), &self.kernels[1])
    }
}

/// Normalized 1D Gaussian kernel with `2 * (size / 2) + 1` taps.
///
/// Sigma follows the usual size-to-sigma rule `0.3 * ((size - 1) / 2 - 1) + 0.8`.
pub fn gaussian_kernel_1d(size: usize) -> Vec<f64> {
    if size <= 1 {
        return vec![1.0];
    }

    let radius = size / 2;
    let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }

    kernel
}

/// Map a possibly out-of-range index back into `[0, len)` by reflection
fn reflect_index(mut idx: isize, len: usize) -> usize {
    let len = len as isize;
    loop {
        if idx < 0 {
            idx = -idx - 1;
        } else if idx >= len {
            idx = 2 * len - idx - 1;
        } else {
            return idx as usize;
        }
    }
}

fn convolve_axis(input: &ArrayView2<f64>, axis: Axis, kernel: &[f64]) -> Array2<f64> {
    if kernel.len() == 1 {
        return input.to_owned();
    }

    let radius = (kernel.len() / 2) as isize;
    let mut output = Array2::<f64>::zeros(input.dim());

    for (lane_in, mut lane_out) in input.lanes(axis).into_iter().zip(output.lanes_mut(axis)) {
        let len = lane_in.len();
        for (i, out) in lane_out.iter_mut().enumerate() {
            *out = kernel
                .iter()
                .enumerate()
                .map(|(k, &weight)| {
                    let src = reflect_index(i as isize + k as isize - radius, len);
                    lane_in[src] * weight
                })
                .sum();
        }
    }

    output
}
