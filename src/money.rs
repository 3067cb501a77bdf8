// 💵 Money helpers - minor units in storage, major units for display

/// Minor units per major unit (cents per dollar)
pub const MINOR_PER_MAJOR: f64 = 100.0;

/// Minor units → major units (e.g., 4567 → 45.67)
pub fn to_major(cents: i64) -> f64 {
    cents as f64 / MINOR_PER_MAJOR
}

/// Same as `to_major` for sums that went through an exchange rate
pub fn real_to_major(cents: f64) -> f64 {
    cents / MINOR_PER_MAJOR
}

/// "$250.00" style rendering
pub fn format_major(cents: i64) -> String {
    format!("${:.2}", to_major(cents))
}

/// Parse a user/CSV amount into minor units.
///
/// Accepts "45.67", "$1,234.50", "-12", " € 3.10 ". Currency symbols,
/// thousands separators and whitespace are stripped; the value is rounded to
/// the nearest minor unit.
pub fn parse_amount_to_cents(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    let cents = (value * MINOR_PER_MAJOR).round();
    if cents.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(cents as i64)
}
