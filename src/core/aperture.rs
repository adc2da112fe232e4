use crate::core::doppler::doppler_centroid;
use crate::core::phase_stack::{default_nus, layer_optimization};
use crate::core::smoothing::{GaussianSmoother, GaussianSmoothingParams};
use crate::core::wavenumber::{get_optimal_wavenumbers, DEFAULT_THRESHOLD_DB};
use crate::types::{
    LosarComplex, LosarCube, LosarError, LosarImage, LosarResult, PowerSurface, WavenumberAxis,
};
use chrono::{DateTime, Utc};
use ndarray::{s, Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Layer-finding estimator applied inside each aperture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum LayerFinding {
    /// Periodogram over the trace axis; the wavenumber axis is derived per window
    Doppler {
        /// Spatial step between traces
        dx: f64,
    },
    /// Explicit phase-ramp search over caller-supplied candidates
    Stack {
        /// Candidate phase increments per trace, kept in the given order
        nus: Vec<f64>,
    },
}

impl LayerFinding {
    /// Literal mode name, `"doppler"` or `"stack"`
    pub fn name(&self) -> &'static str {
        match self {
            LayerFinding::Doppler { .. } => "doppler",
            LayerFinding::Stack { .. } => "stack",
        }
    }

    /// Resolve a literal mode name together with its mode-specific inputs.
    ///
    /// Doppler mode requires `dx` and ignores `nus`. Stack mode uses `nus`,
    /// falling back to [`default_nus`] when none are given, and ignores `dx`.
    pub fn from_name(name: &str, nus: Option<Vec<f64>>, dx: Option<f64>) -> LosarResult<Self> {
        match name {
            "doppler" => {
                let dx = dx.ok_or_else(|| {
                    LosarError::Configuration(
                        "Doppler layer finding requires a trace spacing (dx)".to_string(),
                    )
                })?;
                Ok(LayerFinding::Doppler { dx })
            }
            "stack" => Ok(LayerFinding::Stack {
                nus: nus.unwrap_or_else(default_nus),
            }),
            other => Err(LosarError::Configuration(format!(
                "Unrecognized layer finding mode '{}', expected 'doppler' or 'stack'",
                other
            ))),
        }
    }
}

impl fmt::Display for LayerFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// LoSAR processing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LosarParams {
    /// Aperture width in traces (N)
    pub aperture: usize,
    /// Estimator used inside each aperture
    pub layer_finding: LayerFinding,
    /// Gaussian smoothing of each power surface before peak picking
    pub smoothing: Option<GaussianSmoothingParams>,
    /// Picks whose best power falls below this level (dB) get a NaN wavenumber
    pub threshold_db: f64,
    /// Print the trace index of each aperture position to stdout
    pub verbose: bool,
}

impl LosarParams {
    /// Phase-stack search over the default candidate grid
    pub fn stack(aperture: usize) -> Self {
        Self::with_layer_finding(aperture, LayerFinding::Stack { nus: default_nus() })
    }

    /// Doppler periodogram with trace spacing `dx`
    pub fn doppler(aperture: usize, dx: f64) -> Self {
        Self::with_layer_finding(aperture, LayerFinding::Doppler { dx })
    }

    pub fn with_layer_finding(aperture: usize, layer_finding: LayerFinding) -> Self {
        Self {
            aperture,
            layer_finding,
            smoothing: None,
            threshold_db: DEFAULT_THRESHOLD_DB,
            verbose: false,
        }
    }

    /// Build parameters from the loose option set used by scripting front ends.
    ///
    /// # Arguments
    /// * `aperture` - Aperture width in traces
    /// * `nus` - Stack candidates (default grid when `None`), ignored for Doppler
    /// * `dx` - Trace spacing, required for Doppler, ignored for Stack
    /// * `layer_finding` - `"doppler"` or `"stack"`
    /// * `gaussian_filter` - Smooth power surfaces with a `gf_window` kernel
    /// * `gf_window` - Kernel size along (depth, wavenumber)
    /// * `verbose` - Per-trace progress on stdout
    pub fn from_options(
        aperture: usize,
        nus: Option<Vec<f64>>,
        dx: Option<f64>,
        layer_finding: &str,
        gaussian_filter: bool,
        gf_window: [usize; 2],
        verbose: bool,
    ) -> LosarResult<Self> {
        let layer_finding = LayerFinding::from_name(layer_finding, nus, dx)?;
        let mut params = Self::with_layer_finding(aperture, layer_finding);
        if gaussian_filter {
            params.smoothing = Some(GaussianSmoothingParams { window: gf_window });
        }
        params.verbose = verbose;
        params.validate()?;
        Ok(params)
    }

    pub fn with_smoothing(mut self, window: [usize; 2]) -> Self {
        self.smoothing = Some(GaussianSmoothingParams { window });
        self
    }

    pub fn with_threshold_db(mut self, threshold_db: f64) -> Self {
        self.threshold_db = threshold_db;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check the parameters before any aperture is processed
    pub fn validate(&self) -> LosarResult<()> {
        if self.aperture < 2 {
            return Err(LosarError::Configuration(format!(
                "Aperture must span at least 2 traces, got {}",
                self.aperture
            )));
        }

        match &self.layer_finding {
            LayerFinding::Doppler { dx } => {
                if !(dx.is_finite() && *dx > 0.0) {
                    return Err(LosarError::Configuration(format!(
                        "Trace spacing must be positive and finite, got {}",
                        dx
                    )));
                }
            }
            LayerFinding::Stack { nus } => {
                if nus.is_empty() {
                    return Err(LosarError::Configuration(
                        "Stack layer finding needs at least one candidate".to_string(),
                    ));
                }
                if nus.iter().any(|nu| !nu.is_finite()) {
                    return Err(LosarError::Configuration(
                        "Stack candidates must be finite".to_string(),
                    ));
                }
            }
        }

        if let Some(smoothing) = &self.smoothing {
            if smoothing.window.iter().any(|&size| size == 0) {
                return Err(LosarError::Configuration(format!(
                    "Gaussian window sizes must be positive, got {:?}",
                    smoothing.window
                )));
            }
        }

        if self.threshold_db.is_nan() {
            return Err(LosarError::Configuration(
                "Power threshold must not be NaN".to_string(),
            ));
        }

        Ok(())
    }
}

/// Trace range `[start, end)` of the aperture centred on `tidx`.
///
/// The half-width is `aperture / 2`; windows are clipped at both profile
/// edges without padding, so they narrow near the first and last traces.
pub fn aperture_bounds(tidx: usize, tnum: usize, aperture: usize) -> (usize, usize) {
    let half = aperture / 2;
    (tidx.saturating_sub(half), (tidx + half).min(tnum))
}

/// Processing record attached to every output profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileMetadata {
    pub processing_timestamp: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub layer_finding: String,
    pub aperture: usize,
    pub threshold_db: f64,
    pub smoothing_window: Option<[usize; 2]>,
    /// Trace indices whose aperture held too few traces for the estimator
    pub skipped_traces: Vec<usize>,
}

/// Best power and best wavenumber for every (depth, trace) cell
#[derive(Debug, Clone)]
pub struct LosarProfile {
    /// Maximum stacked power, shaped (depth, trace)
    pub power: Array2<f64>,
    /// Wavenumber of maximum power, shaped (depth, trace); NaN where rejected
    pub wavenumber: Array2<f64>,
    pub metadata: ProfileMetadata,
}

impl LosarProfile {
    /// (depth samples, traces)
    pub fn dim(&self) -> (usize, usize) {
        self.power.dim()
    }

    /// Number of cells holding an accepted wavenumber pick
    pub fn valid_count(&self) -> usize {
        self.wavenumber.iter().filter(|k| !k.is_nan()).count()
    }

    /// Pack into a (2, depth, trace) array: channel 0 power, channel 1 wavenumber
    pub fn into_array3(self) -> LosarCube {
        let (snum, tnum) = self.dim();
        let mut cube = LosarCube::zeros((2, snum, tnum));
        cube.slice_mut(s![0, .., ..]).assign(&self.power);
        cube.slice_mut(s![1, .., ..]).assign(&self.wavenumber);
        cube
    }
}

type ColumnResult = Option<(Array1<f64>, Array1<f64>)>;

/// Sliding-aperture LoSAR processor
pub struct LosarProcessor {
    params: LosarParams,
    smoother: Option<GaussianSmoother>,
}

impl LosarProcessor {
    /// Validate `params` and prepare the smoothing kernels
    pub fn new(params: LosarParams) -> LosarResult<Self> {
        params.validate()?;
        let smoother = params.smoothing.map(GaussianSmoother::new).transpose()?;
        Ok(Self { params, smoother })
    }

    pub fn params(&self) -> &LosarParams {
        &self.params
    }

    /// Run the aperture across every trace of `image`, one position at a time.
    ///
    /// `image` is shaped (depth, trace). Positions are visited in trace order
    /// and each writes exactly one output column.
    pub fn process(&self, image: &LosarImage) -> LosarResult<LosarProfile> {
        self.process_sequential(image, None)
    }

    /// Sequential processing that stops between positions once `cancel` is set
    pub fn process_with_cancel(
        &self,
        image: &LosarImage,
        cancel: &AtomicBool,
    ) -> LosarResult<LosarProfile> {
        self.process_sequential(image, Some(cancel))
    }

    /// Parallel processing using Rayon; results match [`Self::process`] exactly.
    ///
    /// Progress is not printed on this path even when `verbose` is set.
    #[cfg(feature = "parallel")]
    pub fn process_parallel(&self, image: &LosarImage) -> LosarResult<LosarProfile> {
        use rayon::prelude::*;

        let started = Instant::now();
        let timestamp = Utc::now();
        let (snum, tnum) = self.check_image(image)?;

        log::info!(
            "Starting parallel LoSAR ({}) on {}x{} image with aperture {} using {} threads",
            self.params.layer_finding,
            snum,
            tnum,
            self.params.aperture,
            rayon::current_num_threads()
        );

        let view = image.view();
        let columns: Vec<ColumnResult> = (0..tnum)
            .into_par_iter()
            .map(|tidx| self.process_position(&view, tidx))
            .collect::<LosarResult<Vec<_>>>()?;

        let mut power = Array2::from_elem((snum, tnum), f64::NAN);
        let mut wavenumber = Array2::from_elem((snum, tnum), f64::NAN);
        let mut skipped = Vec::new();

        for (tidx, column) in columns.into_iter().enumerate() {
            match column {
                Some((p, k)) => {
                    power.column_mut(tidx).assign(&p);
                    wavenumber.column_mut(tidx).assign(&k);
                }
                None => skipped.push(tidx),
            }
        }

        Ok(self.finish(power, wavenumber, skipped, timestamp, started))
    }

    #[cfg(not(feature = "parallel"))]
    pub fn process_parallel(&self, image: &LosarImage) -> LosarResult<LosarProfile> {
        // Fallback to sequential processing if parallel feature is not available
        self.process(image)
    }

    fn process_sequential(
        &self,
        image: &LosarImage,
        cancel: Option<&AtomicBool>,
    ) -> LosarResult<LosarProfile> {
        let started = Instant::now();
        let timestamp = Utc::now();
        let (snum, tnum) = self.check_image(image)?;

        log::info!(
            "Starting LoSAR ({}) on {}x{} image with aperture {}",
            self.params.layer_finding,
            snum,
            tnum,
            self.params.aperture
        );
        log::debug!("LoSAR parameters: {:?}", self.params);

        let mut power = Array2::from_elem((snum, tnum), f64::NAN);
        let mut wavenumber = Array2::from_elem((snum, tnum), f64::NAN);
        let mut skipped = Vec::new();
        let view = image.view();

        for tidx in 0..tnum {
            if cancel.map_or(false, |flag| flag.load(Ordering::Relaxed)) {
                log::warn!("LoSAR cancelled after {} of {} traces", tidx, tnum);
                return Err(LosarError::Cancelled { processed: tidx });
            }

            if self.params.verbose {
                print!("{} ", tidx);
                let _ = std::io::stdout().flush();
            }

            match self.process_position(&view, tidx)? {
                Some((p, k)) => {
                    power.column_mut(tidx).assign(&p);
                    wavenumber.column_mut(tidx).assign(&k);
                }
                None => skipped.push(tidx),
            }
        }

        if self.params.verbose {
            println!();
        }

        Ok(self.finish(power, wavenumber, skipped, timestamp, started))
    }

    fn check_image(&self, image: &LosarImage) -> LosarResult<(usize, usize)> {
        let (snum, tnum) = image.dim();
        if snum == 0 || tnum == 0 {
            return Err(LosarError::InsufficientData(format!(
                "Image must have at least one depth sample and one trace, got {}x{}",
                snum, tnum
            )));
        }
        Ok((snum, tnum))
    }

    /// Estimate, smooth and pick for the aperture centred on `tidx`.
    ///
    /// Returns `None` when the clipped window is too narrow for the estimator.
    fn process_position(
        &self,
        image: &ArrayView2<LosarComplex>,
        tidx: usize,
    ) -> LosarResult<ColumnResult> {
        let (start, end) = aperture_bounds(tidx, image.ncols(), self.params.aperture);
        let window = image.slice(s![.., start..end]);

        let (surface, axis) = match self.estimate(&window) {
            Ok(estimate) => estimate,
            Err(LosarError::InsufficientData(reason)) => {
                log::warn!("Skipping trace {} (window {}..{}): {}", tidx, start, end, reason);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let surface = match &self.smoother {
            Some(smoother) => smoother.apply(&surface.view()),
            None => surface,
        };

        let (best_power, best_wavenumber) =
            get_optimal_wavenumbers(&surface.view(), &axis.view(), self.params.threshold_db)?;

        Ok(Some((best_power, best_wavenumber)))
    }

    fn estimate(
        &self,
        window: &ArrayView2<LosarComplex>,
    ) -> LosarResult<(PowerSurface, WavenumberAxis)> {
        match &self.params.layer_finding {
            LayerFinding::Doppler { dx } => doppler_centroid(window, *dx),
            LayerFinding::Stack { nus } => {
                Ok((layer_optimization(window, nus), Array1::from_vec(nus.clone())))
            }
        }
    }

    fn finish(
        &self,
        power: Array2<f64>,
        wavenumber: Array2<f64>,
        skipped_traces: Vec<usize>,
        timestamp: DateTime<Utc>,
        started: Instant,
    ) -> LosarProfile {
        let elapsed = started.elapsed();
        if !skipped_traces.is_empty() {
            log::warn!(
                "{} aperture positions had too few traces and were left as NaN",
                skipped_traces.len()
            );
        }

        let profile = LosarProfile {
            power,
            wavenumber,
            metadata: ProfileMetadata {
                processing_timestamp: timestamp,
                elapsed_seconds: elapsed.as_secs_f64(),
                layer_finding: self.params.layer_finding.name().to_string(),
                aperture: self.params.aperture,
                threshold_db: self.params.threshold_db,
                smoothing_window: self.params.smoothing.map(|smoothing| smoothing.window),
                skipped_traces,
            },
        };

        let (snum, tnum) = profile.dim();
        log::info!(
            "LoSAR completed in {:.3} s: {} of {} cells hold a wavenumber pick",
            elapsed.as_secs_f64(),
            profile.valid_count(),
            snum * tnum
        );

        profile
    }
}

/// Run LoSAR over `image` and return the (2, depth, trace) output array.
///
/// Channel 0 holds the best power, channel 1 the best wavenumber with NaN
/// for rejected picks and skipped aperture positions.
pub fn losar(image: &LosarImage, params: LosarParams) -> LosarResult<LosarCube> {
    let processor = LosarProcessor::new(params)?;
    Ok(processor.process(image)?.into_array3())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ones_image(snum: usize, tnum: usize) -> LosarImage {
        Array2::from_elem((snum, tnum), LosarComplex::new(1.0, 0.0))
    }

    #[test]
    fn test_aperture_bounds_clip_at_edges() {
        assert_eq!(aperture_bounds(0, 50, 10), (0, 5));
        assert_eq!(aperture_bounds(3, 50, 10), (0, 8));
        assert_eq!(aperture_bounds(25, 50, 10), (20, 30));
        assert_eq!(aperture_bounds(49, 50, 10), (44, 50));
        assert_eq!(aperture_bounds(0, 1, 10), (0, 1));
        assert_eq!(aperture_bounds(4, 9, 3), (3, 5));
    }

    #[test]
    fn test_from_options_modes() {
        let params =
            LosarParams::from_options(10, None, None, "stack", false, [5, 5], false).unwrap();
        assert_eq!(params.layer_finding, LayerFinding::Stack { nus: default_nus() });
        assert!(params.smoothing.is_none());

        let params =
            LosarParams::from_options(10, Some(vec![1.0]), Some(0.5), "doppler", true, [3, 7], true)
                .unwrap();
        assert_eq!(params.layer_finding, LayerFinding::Doppler { dx: 0.5 });
        assert_eq!(params.smoothing, Some(GaussianSmoothingParams { window: [3, 7] }));
        assert!(params.verbose);
    }

    #[test]
    fn test_from_options_rejects_bad_configuration() {
        let unknown = LosarParams::from_options(10, None, Some(1.0), "music", false, [5, 5], false);
        assert!(matches!(unknown, Err(LosarError::Configuration(_))));

        let missing_dx = LosarParams::from_options(10, None, None, "doppler", false, [5, 5], false);
        assert!(matches!(missing_dx, Err(LosarError::Configuration(_))));

        let bad_dx = LosarParams::from_options(10, None, Some(-2.0), "doppler", false, [5, 5], false);
        assert!(matches!(bad_dx, Err(LosarError::Configuration(_))));

        let narrow = LosarParams::from_options(1, None, None, "stack", false, [5, 5], false);
        assert!(matches!(narrow, Err(LosarError::Configuration(_))));

        let empty = LosarParams::from_options(10, Some(vec![]), None, "stack", false, [5, 5], false);
        assert!(matches!(empty, Err(LosarError::Configuration(_))));
    }

    #[test]
    fn test_stack_on_flat_image_picks_zero_wavenumber() {
        let nus = vec![-0.5, -0.25, 0.0, 0.25, 0.5];
        let params = LosarParams::with_layer_finding(4, LayerFinding::Stack { nus });
        let processor = LosarProcessor::new(params).unwrap();
        let profile = processor.process(&ones_image(3, 6)).unwrap();

        assert_eq!(profile.dim(), (3, 6));
        for tidx in 0..6 {
            let (start, end) = aperture_bounds(tidx, 6, 4);
            let width = (end - start) as f64;
            for i in 0..3 {
                assert_eq!(profile.wavenumber[[i, tidx]], 0.0);
                assert_abs_diff_eq!(profile.power[[i, tidx]], width * width, epsilon = 1e-9);
            }
        }
        assert!(profile.metadata.skipped_traces.is_empty());
    }

    #[test]
    fn test_doppler_skips_single_trace_windows() {
        let image = Array2::from_shape_fn((2, 5), |(_, j)| LosarComplex::from_polar(1.0, 0.7 * j as f64));
        let processor = LosarProcessor::new(LosarParams::doppler(2, 1.0)).unwrap();
        let profile = processor.process(&image).unwrap();

        // Half-width 1 leaves a single trace at the first position
        assert_eq!(profile.metadata.skipped_traces, vec![0]);
        assert!(profile.power.column(0).iter().all(|p| p.is_nan()));
        assert!(profile.wavenumber.column(0).iter().all(|k| k.is_nan()));
        assert!(profile.power.column(1).iter().all(|p| !p.is_nan()));
    }

    #[test]
    fn test_into_array3_channels() {
        let processor = LosarProcessor::new(LosarParams::stack(4)).unwrap();
        let profile = processor.process(&ones_image(3, 5)).unwrap();
        let power = profile.power.clone();
        let wavenumber = profile.wavenumber.clone();

        let cube = profile.into_array3();
        assert_eq!(cube.dim(), (2, 3, 5));
        assert_eq!(cube.slice(s![0, .., ..]), power);
        for (a, b) in cube.slice(s![1, .., ..]).iter().zip(wavenumber.iter()) {
            assert!(a == b || (a.is_nan() && b.is_nan()));
        }
    }

    #[test]
    fn test_cancel_before_start() {
        let processor = LosarProcessor::new(LosarParams::stack(4)).unwrap();
        let cancel = AtomicBool::new(true);
        let result = processor.process_with_cancel(&ones_image(2, 8), &cancel);
        assert!(matches!(result, Err(LosarError::Cancelled { processed: 0 })));
    }

    #[test]
    fn test_empty_image_rejected() {
        let processor = LosarProcessor::new(LosarParams::stack(4)).unwrap();
        let image = LosarImage::zeros((0, 4));
        assert!(matches!(processor.process(&image), Err(LosarError::InsufficientData(_))));
    }
}
