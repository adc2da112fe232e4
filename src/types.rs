use ndarray::{Array1, Array2, Array3};
use num_complex::Complex;

/// Complex-valued radar sample (I + jQ)
pub type LosarComplex = Complex<f64>;

/// Real-valued power or wavenumber data
pub type LosarReal = f64;

/// 2D complex radar image (depth sample x trace)
pub type LosarImage = Array2<LosarComplex>;

/// 2D real power surface (depth sample x candidate wavenumber)
pub type PowerSurface = Array2<LosarReal>;

/// Ordered wavenumber axis belonging to one power surface
pub type WavenumberAxis = Array1<LosarReal>;

/// 3D output profile (channel x depth sample x trace)
pub type LosarCube = Array3<LosarReal>;

/// Error types for LoSAR processing
#[derive(Debug, thiserror::Error)]
pub enum LosarError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Processing cancelled after {processed} traces")]
    Cancelled { processed: usize },
}

/// Result type for LoSAR operations
pub type LosarResult<T> = Result<T, LosarError>;
