// Percent quantization

/// Convert a probability-like weight to an integer percent in [0, 100].
///
/// NaN maps to 0 and out-of-range values are clamped. Halves round to the
/// even neighbour.
pub fn to_int_percent(p: f64) -> u8 {
    if p.is_nan() {
        return 0;
    }
    (p * 100.0).round_ties_even().clamp(0.0, 100.0) as u8
}
