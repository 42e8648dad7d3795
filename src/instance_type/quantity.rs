//! Kubernetes resource quantity parsing
//!
//! `k8s_openapi` keeps quantities as opaque strings. Pricing and selection
//! only need a number, so this parses the canonical forms: plain and
//! fractional numbers, binary suffixes (`Ki`..`Ei`), decimal suffixes
//! (`n`, `u`, `m`, `k`..`E`) and decimal exponents (`1e3`).

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

const BINARY_SUFFIXES: [(&str, f64); 6] = [
    ("Ki", 1024.0),
    ("Mi", 1_048_576.0),
    ("Gi", 1_073_741_824.0),
    ("Ti", 1_099_511_627_776.0),
    ("Pi", 1_125_899_906_842_624.0),
    ("Ei", 1_152_921_504_606_846_976.0),
];

const DECIMAL_SUFFIXES: [(&str, f64); 9] = [
    ("n", 1e-9),
    ("u", 1e-6),
    ("m", 1e-3),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
    ("E", 1e18),
];

/// Parse a quantity string into its approximate numeric value
///
/// Returns `None` for anything that is not a valid quantity.
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for (suffix, multiplier) in BINARY_SUFFIXES {
        if let Some(number) = raw.strip_suffix(suffix) {
            return parse_number(number).map(|n| n * multiplier);
        }
    }

    // Exponent form must be checked before the "E" (exa) suffix
    if let Some((mantissa, exponent)) = raw.split_once(['e', 'E']) {
        if !exponent.is_empty() {
            let exponent = exponent.parse::<i32>().ok()?;
            return parse_number(mantissa).map(|n| n * 10f64.powi(exponent));
        }
    }

    for (suffix, multiplier) in DECIMAL_SUFFIXES {
        if let Some(number) = raw.strip_suffix(suffix) {
            return parse_number(number).map(|n| n * multiplier);
        }
    }

    parse_number(raw)
}

fn parse_number(number: &str) -> Option<f64> {
    let unsigned = number.strip_prefix(['+', '-']).unwrap_or(number);
    let valid = !unsigned.is_empty()
        && unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
        && unsigned.chars().filter(|c| *c == '.').count() <= 1
        && unsigned.chars().any(|c| c.is_ascii_digit());
    if !valid {
        return None;
    }
    number.parse::<f64>().ok()
}

/// Approximate float value of a quantity, `None` when malformed
pub fn approximate(quantity: &Quantity) -> Option<f64> {
    parse_quantity(&quantity.0)
}

/// Integer value of a quantity, rounded up to the next whole unit
///
/// `128Mi` is `134217728`, `10m` rounds up to `1`.
pub fn value(quantity: &Quantity) -> Option<i64> {
    approximate(quantity).map(|v| v.ceil() as i64)
}

/// Byte count in the largest binary unit that divides it exactly
///
/// The result is understood by both Kubernetes and docker (`128Mi`,
/// `1Gi`, or plain bytes), unlike decimal forms such as `500m` or `1e9`.
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: [(&str, i64); 3] = [("Gi", 1 << 30), ("Mi", 1 << 20), ("Ki", 1 << 10)];
    UNITS
        .iter()
        .find(|(_, size)| bytes != 0 && bytes % size == 0)
        .map(|(suffix, size)| format!("{}{}", bytes / size, suffix))
        .unwrap_or_else(|| bytes.to_string())
}
