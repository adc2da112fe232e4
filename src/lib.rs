//! LoSAR: Layer-optimized Synthetic Aperture Radar stacking
//!
//! This library estimates the local slope (wavenumber) of radar layers and the
//! stacked power along a focused complex radar profile. A fixed-width aperture
//! slides along the trace axis; inside each aperture a Doppler periodogram or an
//! explicit phase-ramp search produces power as a function of wavenumber, and
//! the wavenumber of maximum power is kept for every depth sample.

pub mod types;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    LosarComplex, LosarCube, LosarError, LosarImage, LosarReal, LosarResult, PowerSurface,
    WavenumberAxis,
};

pub use crate::core::{
    losar, LayerFinding, LosarParams, LosarProcessor, LosarProfile, ProfileMetadata,
    ProfileStatistics,
};

#[cfg(feature = "python")]
mod python {
    use crate::core::{LosarParams, LosarProcessor};
    use crate::types::LosarError;
    use numpy::{Complex64, PyArray3, PyReadonlyArray2, ToPyArray};
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;

    fn to_py_err(err: LosarError) -> PyErr {
        match err {
            LosarError::Configuration(_) | LosarError::InsufficientData(_) => {
                PyValueError::new_err(err.to_string())
            }
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }

    /// Python entry point mirroring `losar(image, N, ...)`
    #[pyfunction]
    #[pyo3(name = "losar")]
    #[pyo3(signature = (
        image,
        n,
        nus = None,
        dx = None,
        layer_finding = "doppler",
        gaussian_filter = false,
        gf_window = (5, 5),
        verbose = false
    ))]
    #[allow(clippy::too_many_arguments)]
    fn py_losar<'py>(
        py: Python<'py>,
        image: PyReadonlyArray2<Complex64>,
        n: usize,
        nus: Option<Vec<f64>>,
        dx: Option<f64>,
        layer_finding: &str,
        gaussian_filter: bool,
        gf_window: (usize, usize),
        verbose: bool,
    ) -> PyResult<&'py PyArray3<f64>> {
        let params = LosarParams::from_options(
            n,
            nus,
            dx,
            layer_finding,
            gaussian_filter,
            [gf_window.0, gf_window.1],
            verbose,
        )
        .map_err(to_py_err)?;

        let image = image.as_array().to_owned();
        let processor = LosarProcessor::new(params).map_err(to_py_err)?;
        let profile = py
            .allow_threads(|| processor.process(&image))
            .map_err(to_py_err)?;

        Ok(profile.into_array3().to_pyarray(py))
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(py_losar, m)?)?;
        Ok(())
    }
}
