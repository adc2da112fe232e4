//! Core LoSAR processing modules

pub mod stacking;
pub mod doppler;
pub mod phase_stack;
pub mod smoothing;
pub mod wavenumber;
pub mod aperture;
pub mod quality;

// Re-export main types
pub use stacking::{coherent_summation, incoherent_average, linspace};
pub use doppler::{doppler_centroid, periodogram, Periodogram};
pub use phase_stack::{default_nus, layer_optimization, DEFAULT_CANDIDATE_COUNT};
pub use smoothing::{gaussian_kernel_1d, GaussianSmoother, GaussianSmoothingParams};
pub use wavenumber::{get_optimal_wavenumbers, to_db, DEFAULT_THRESHOLD_DB};
pub use aperture::{
    aperture_bounds, losar, LayerFinding, LosarParams, LosarProcessor, LosarProfile, ProfileMetadata,
};
pub use quality::ProfileStatistics;
