use crate::types::{LosarComplex, LosarError, LosarResult, PowerSurface, WavenumberAxis};
use ndarray::ArrayView2;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Two-sided periodogram for complex sequences of a fixed length.
///
/// Boxcar window, constant detrend and density scaling: the power in bin `k`
/// is `|X_k|^2 / (fs * n)`. Frequencies follow FFT order, `k / (n * dx)`
/// with bins above `n / 2` folded to negative frequencies.
pub struct Periodogram {
    fft: Arc<dyn Fft<f64>>,
    len: usize,
    sampling_rate: f64,
}

impl Periodogram {
    /// Plan a periodogram for `len` samples at `sampling_rate`
    pub fn new(len: usize, sampling_rate: f64) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            fft: planner.plan_fft_forward(len),
            len,
            sampling_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sample frequencies in FFT order (equivalent to `fftfreq(n, 1/fs)`)
    pub fn frequencies(&self) -> Vec<f64> {
        let n = self.len as i64;
        let scale = self.sampling_rate / self.len as f64;
        (0..n)
            .map(|k| {
                let folded = if k < (n + 1) / 2 { k } else { k - n };
                folded as f64 * scale
            })
            .collect()
    }

    /// Power spectral density of `samples`, in FFT order
    pub fn power(&self, samples: &[LosarComplex]) -> LosarResult<Vec<f64>> {
        if samples.len() != self.len {
            return Err(LosarError::InvalidFormat(format!(
                "Periodogram planned for {} samples, got {}",
                self.len,
                samples.len()
            )));
        }
        if self.len == 0 {
            return Ok(Vec::new());
        }

        let mean = samples.iter().sum::<LosarComplex>() / self.len as f64;
        let mut buffer: Vec<LosarComplex> = samples.iter().map(|&z| z - mean).collect();
        self.fft.process(&mut buffer);

        let scale = 1.0 / (self.sampling_rate * self.len as f64);
        Ok(buffer.iter().map(|bin| bin.norm_sqr() * scale).collect())
    }
}

/// One-shot periodogram, returning `(frequencies, power)` in FFT order
pub fn periodogram(samples: &[LosarComplex], sampling_rate: f64) -> LosarResult<(Vec<f64>, Vec<f64>)> {
    let estimator = Periodogram::new(samples.len(), sampling_rate);
    let power = estimator.power(samples)?;
    Ok((estimator.frequencies(), power))
}

/// Doppler centroid power surface for one synthetic aperture.
///
/// Each depth row gets its own periodogram over the trace axis with sampling
/// rate `1 / dx`. The DC bin is dropped and the remaining bins are sorted by
/// ascending frequency, so every row shares the returned wavenumber axis.
///
/// # Arguments
/// * `image` - Sub-image within a single aperture, shaped (depth, traces)
/// * `dx` - Spatial step between traces
///
/// # Returns
/// * Power surface shaped (depth, traces - 1) and its sorted wavenumber axis
pub fn doppler_centroid(
    image: &ArrayView2<LosarComplex>,
    dx: f64,
) -> LosarResult<(PowerSurface, WavenumberAxis)> {
    let (snum, tnum) = image.dim();

    if tnum < 2 {
        return Err(LosarError::InsufficientData(format!(
            "Doppler estimate needs at least 2 traces, window has {}",
            tnum
        )));
    }
    if !(dx.is_finite() && dx > 0.0) {
        return Err(LosarError::Configuration(format!(
            "Trace spacing must be positive, got {}",
            dx
        )));
    }

    let estimator = Periodogram::new(tnum, 1.0 / dx);
    let frequencies = estimator.frequencies();

    // Same ordering for every row since n and fs are fixed
    let mut order: Vec<usize> = (1..tnum).collect();
    order.sort_by(|&a, &b| frequencies[a].total_cmp(&frequencies[b]));

    let axis: WavenumberAxis = order.iter().map(|&k| frequencies[k]).collect();
    let mut surface = PowerSurface::zeros((snum, tnum - 1));

    let mut row_buffer = Vec::with_capacity(tnum);
    for (row, mut out) in image.outer_iter().zip(surface.outer_iter_mut()) {
        row_buffer.clear();
        row_buffer.extend(row.iter().copied());
        let power = estimator.power(&row_buffer)?;
        for (dst, &k) in out.iter_mut().zip(order.iter()) {
            *dst = power[k];
        }
    }

    log::debug!(
        "Doppler surface {}x{} over wavenumbers [{:.4}, {:.4}]",
        snum,
        tnum - 1,
        axis[0],
        axis[axis.len() - 1]
    );

    Ok((surface, axis))
}
