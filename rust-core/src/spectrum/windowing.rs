//! Windowing applied to acquired frames before the FFT

/// Multiply `signal` in place by precomputed window coefficients
///
/// Extra samples past the end of `window` are left untouched.
pub fn apply_coefficients_inplace(signal: &mut [f64], window: &[f64]) {
    for (s, w) in signal.iter_mut().zip(window.iter()) {
        *s *= w;
    }
}

/// Amplitude correction factor of a window
///
/// Windowing lowers the coherent gain of a tone. Multiplying the FFT
/// magnitude by this factor restores the amplitude of a bin-centred sine.
pub fn coefficients_correction_factor(window: &[f64]) -> f64 {
    let sum: f64 = window.iter().sum();
    if sum <= 0.0 {
        return 1.0;
    }
    window.len() as f64 / sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::windows::{generate_window, WindowType};

    #[test]
    fn test_hamming_frame() {
        let mut windowed = vec![1.0; 101];
        apply_coefficients_inplace(&mut windowed, &generate_window(WindowType::Hamming, 101));

        assert_eq!(windowed.len(), 101);

        assert!((windowed[50] - 1.0).abs() < 0.01);

        // Hamming edges sit at ~0.08
        assert!(windowed[0] < 0.1);
        assert!(windowed[100] < 0.1);
    }

    #[test]
    fn test_apply_coefficients_inplace() {
        let mut signal = vec![2.0; 4];
        apply_coefficients_inplace(&mut signal, &[0.5, 1.0, 1.0, 0.5]);
        assert_eq!(signal, vec![1.0, 2.0, 2.0, 1.0]);
    }

    #[test]
    fn test_correction_factor() {
        let factor =
            |window_type| coefficients_correction_factor(&generate_window(window_type, 100));
        let factor_rect = factor(WindowType::Rectangular);
        let factor_hann = factor(WindowType::Hann);
        let factor_hamming = factor(WindowType::Hamming);

        assert!((factor_rect - 1.0).abs() < 1e-12);

        // Coherent gain of Hann is ~0.5, Hamming ~0.54
        assert!(factor_hann > 1.9 && factor_hann < 2.1);
        assert!(factor_hamming > 1.75 && factor_hamming < 1.9);
    }

    #[test]
    fn test_empty_window_has_unit_correction() {
        assert_eq!(coefficients_correction_factor(&[]), 1.0);
    }
}
