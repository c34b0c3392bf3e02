//! Number formatting the dashboard expects. Rates and averages are stored as fixed point strings,
//! totals as numbers rounded to 2 decimals.

/// Formats a value with exactly `digits` decimals. Halves round away from zero and non finite
/// values are spelled the way the dashboard reads them (`NaN`, `Infinity`).
pub fn to_fixed(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "NaN".into();
    }
    if value.is_infinite() {
        return if value > 0. { "Infinity" } else { "-Infinity" }.into();
    }
    let scale = 10f64.powi(digits as i32);
    format!("{:.*}", digits, (value * scale).round() / scale)
}

/// Rounds to 2 decimals, keeping the value numeric.
pub fn round2(value: f64) -> f64 {
    (value * 100.).round() / 100.
}

/// `part * 100 / whole`. A zero `whole` follows float semantics, which the formatting above
/// turns into `NaN` or `Infinity`.
pub fn percentage_of(part: f64, whole: f64) -> f64 {
    part * 100. / whole
}
