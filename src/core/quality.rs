use crate::core::aperture::LosarProfile;
use crate::core::wavenumber::to_db;
use serde::{Deserialize, Serialize};

/// Summary statistics over the accepted picks of a LoSAR profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileStatistics {
    pub total_cells: usize,
    pub valid_cells: usize,
    /// Fraction of cells holding an accepted wavenumber pick (0-1)
    pub valid_fraction: f64,
    pub min_power_db: f64,
    pub max_power_db: f64,
    pub mean_power_db: f64,
    pub mean_wavenumber: f64,
    pub std_wavenumber: f64,
}

impl ProfileStatistics {
    /// Statistics over cells with a non-NaN wavenumber and finite power.
    ///
    /// Power and wavenumber fields are NaN when no cell qualifies.
    pub fn from_profile(profile: &LosarProfile) -> Self {
        let total_cells = profile.power.len();

        let (db_values, wavenumbers): (Vec<f64>, Vec<f64>) = profile
            .power
            .iter()
            .zip(profile.wavenumber.iter())
            .filter(|(p, k)| !k.is_nan() && p.is_finite())
            .map(|(&p, &k)| (to_db(p), k))
            .unzip();

        let valid_cells = wavenumbers.len();
        let valid_fraction = if total_cells > 0 {
            valid_cells as f64 / total_cells as f64
        } else {
            0.0
        };

        if valid_cells == 0 {
            log::warn!("No valid wavenumber picks in profile");
            return Self {
                total_cells,
                valid_cells,
                valid_fraction,
                min_power_db: f64::NAN,
                max_power_db: f64::NAN,
                mean_power_db: f64::NAN,
                mean_wavenumber: f64::NAN,
                std_wavenumber: f64::NAN,
            };
        }

        let n = valid_cells as f64;
        let min_power_db = db_values.iter().copied().fold(f64::INFINITY, f64::min);
        let max_power_db = db_values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean_power_db = db_values.iter().sum::<f64>() / n;

        let mean_wavenumber = wavenumbers.iter().sum::<f64>() / n;
        let std_wavenumber = (wavenumbers
            .iter()
            .map(|k| (k - mean_wavenumber) * (k - mean_wavenumber))
            .sum::<f64>()
            / n)
            .sqrt();

        log::debug!(
            "Profile statistics: {}/{} valid, power {:.1}..{:.1} dB",
            valid_cells,
            total_cells,
            min_power_db,
            max_power_db
        );

        Self {
            total_cells,
            valid_cells,
            valid_fraction,
            min_power_db,
            max_power_db,
            mean_power_db,
            mean_wavenumber,
            std_wavenumber,
        }
    }
}
