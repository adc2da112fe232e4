use crate::types::{LosarError, LosarResult};
use ndarray::{Array1, ArrayView1, ArrayView2};
use num_traits::Float;

/// Default rejection threshold for best-power picks, in dB
pub const DEFAULT_THRESHOLD_DB: f64 = -190.0;

/// Convert power to decibels, `10 * log10(p)`.
///
/// Zero maps to negative infinity and negative power to NaN; no clamping.
pub fn to_db<T: Float>(power: T) -> T {
    let ten: T = num_traits::cast(10.0).unwrap_or_else(T::nan);
    ten * power.log10()
}

/// Per-depth wavenumber of maximum power.
///
/// For each depth row the first column holding the maximum power wins ties.
/// The maximum power is returned as is; rows whose maximum falls below
/// `threshold_db` get a NaN wavenumber.
///
/// # Arguments
/// * `surface` - Power surface shaped (depth, K)
/// * `axis` - Wavenumber axis of length K
/// * `threshold_db` - Minimum accepted power in dB
///
/// # Returns
/// * `(best_power, best_wavenumber)`, one entry per depth sample
pub fn get_optimal_wavenumbers(
    surface: &ArrayView2<f64>,
    axis: &ArrayView1<f64>,
    threshold_db: f64,
) -> LosarResult<(Array1<f64>, Array1<f64>)> {
    let (snum, knum) = surface.dim();

    if knum != axis.len() {
        return Err(LosarError::InvalidFormat(format!(
            "Power surface has {} wavenumber columns but axis has {} entries",
            knum,
            axis.len()
        )));
    }
    if knum == 0 {
        return Err(LosarError::InvalidFormat(
            "Power surface has no wavenumber columns".to_string(),
        ));
    }

    let mut best_power = Array1::<f64>::zeros(snum);
    let mut best_wavenumber = Array1::<f64>::zeros(snum);

    for (i, row) in surface.outer_iter().enumerate() {
        let (idx, power) = first_argmax(&row);
        best_power[i] = power;
        best_wavenumber[i] = if to_db(power) < threshold_db {
            f64::NAN
        } else {
            axis[idx]
        };
    }

    Ok((best_power, best_wavenumber))
}

/// Index and value of the first maximum; a NaN counts as the maximum
fn first_argmax(row: &ArrayView1<f64>) -> (usize, f64) {
    let mut best_idx = 0;
    let mut best = row[0];

    for (idx, &value) in row.iter().enumerate().skip(1) {
        if best.is_nan() {
            break;
        }
        if value.is_nan() || value > best {
            best_idx = idx;
            best = value;
        }
    }

    (best_idx, best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn test_db_conversion() {
        assert_abs_diff_eq!(to_db(100.0f64), 20.0, epsilon = 1e-12);
        assert_abs_diff_eq!(to_db(1e-19f64), -190.0, epsilon = 1e-9);
        assert_eq!(to_db(0.0f64), f64::NEG_INFINITY);
        assert!(to_db(-1.0f64).is_nan());
        assert_abs_diff_eq!(to_db(1000.0f32), 30.0f32, epsilon = 1e-5);
    }

    #[test]
    fn test_picks_maximum_per_row() {
        let surface = array![[1.0, 5.0, 2.0], [9.0, 0.5, 3.0]];
        let axis = array![-1.0, 0.0, 1.0];
        let (power, wavenumber) =
            get_optimal_wavenumbers(&surface.view(), &axis.view(), DEFAULT_THRESHOLD_DB).unwrap();

        assert_eq!(power, array![5.0, 9.0]);
        assert_eq!(wavenumber, array![0.0, -1.0]);
    }

    #[test]
    fn test_tie_break_first_occurrence() {
        let surface = Array2::from_elem((4, 6), 3.0);
        let axis = array![10.0, 20.0, 30.0, 40.0, 50.0, 60.0];
        let (_, wavenumber) =
            get_optimal_wavenumbers(&surface.view(), &axis.view(), DEFAULT_THRESHOLD_DB).unwrap();

        assert!(wavenumber.iter().all(|&k| k == 10.0));
    }

    #[test]
    fn test_threshold_boundary() {
        let threshold = DEFAULT_THRESHOLD_DB;
        let axis = array![-0.5, 0.5];

        let below = Array2::from_elem((5, 2), 10f64.powf((threshold - 1.0) / 10.0));
        let (power, wavenumber) =
            get_optimal_wavenumbers(&below.view(), &axis.view(), threshold).unwrap();
        assert!(wavenumber.iter().all(|k| k.is_nan()));
        assert!(power.iter().all(|p| *p > 0.0));

        let above = Array2::from_elem((5, 2), 10f64.powf((threshold + 1.0) / 10.0));
        let (_, wavenumber) =
            get_optimal_wavenumbers(&above.view(), &axis.view(), threshold).unwrap();
        assert!(wavenumber.iter().all(|k| !k.is_nan()));
    }

    #[test]
    fn test_zero_power_is_rejected() {
        let surface = Array2::<f64>::zeros((3, 4));
        let axis = array![0.0, 1.0, 2.0, 3.0];
        let (power, wavenumber) =
            get_optimal_wavenumbers(&surface.view(), &axis.view(), DEFAULT_THRESHOLD_DB).unwrap();

        assert!(power.iter().all(|&p| p == 0.0));
        assert!(wavenumber.iter().all(|k| k.is_nan()));
    }

    #[test]
    fn test_nan_power_wins() {
        let surface = array![[1.0, f64::NAN, 4.0]];
        let axis = array![1.0, 2.0, 3.0];
        let (power, wavenumber) =
            get_optimal_wavenumbers(&surface.view(), &axis.view(), DEFAULT_THRESHOLD_DB).unwrap();

        assert!(power[0].is_nan());
        assert_eq!(wavenumber[0], 2.0);
    }

    #[test]
    fn test_axis_length_mismatch() {
        let surface = Array2::<f64>::ones((2, 3));
        let axis = array![0.0, 1.0];
        let result = get_optimal_wavenumbers(&surface.view(), &axis.view(), DEFAULT_THRESHOLD_DB);
        assert!(matches!(result, Err(LosarError::InvalidFormat(_))));
    }
}
