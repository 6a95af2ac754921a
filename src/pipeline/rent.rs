//! Rent normalisation: any supported frequency → `$X,XXX.XX per month`.
//!
//! The Welcome Pack always quotes a monthly figure. Leases quote weekly,
//! fortnightly or monthly rent, so the template engine runs every rent value
//! through [`normalize_rent`] just before substitution.
//!
//! Anything that does not look like `<amount> per <frequency>` is returned
//! unchanged: a slightly odd rent line is better than a corrupted one.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

/// Weeks per month used for weekly → monthly conversion.
const WEEKLY_TO_MONTHLY: f64 = 4.35;

/// Fortnights per month used for fortnightly → monthly conversion.
const FORTNIGHTLY_TO_MONTHLY: f64 = 2.17262;

static RE_RENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$?([\d,]+\.?\d*)\s+per\s+(\w+)").unwrap());

/// Normalise a rent string to a monthly amount.
///
/// Noise tokens (`AUD`, `calendar`) are stripped before matching.
///
/// ```rust
/// use lease_welcome_pack::pipeline::rent::normalize_rent;
///
/// assert_eq!(normalize_rent("$1,150.00 per fortnight"), "$2,498.51 per month");
/// assert_eq!(normalize_rent("$2,650.00 AUD per calendar month"), "$2,650.00 per month");
/// assert_eq!(normalize_rent("negotiable"), "negotiable");
/// ```
pub fn normalize_rent(rent: &str) -> String {
    if rent.is_empty() {
        return rent.to_string();
    }

    let cleaned = rent
        .replace(" AUD", "")
        .replace("AUD ", "")
        .replace("calendar ", "");
    let cleaned = cleaned.trim();

    let Some(caps) = RE_RENT.captures(cleaned) else {
        warn!("Could not parse rent_amount '{}', returning as-is", rent);
        return rent.to_string();
    };

    let Ok(amount) = caps[1].replace(',', "").parse::<f64>() else {
        warn!("Could not parse rent figure in '{}', returning as-is", rent);
        return rent.to_string();
    };

    let frequency = caps[2].to_lowercase();
    let monthly = match frequency.as_str() {
        "week" => amount * WEEKLY_TO_MONTHLY,
        "fortnight" => amount * FORTNIGHTLY_TO_MONTHLY,
        "month" => amount,
        other => {
            warn!("Unknown rent frequency '{}', returning as-is", other);
            return rent.to_string();
        }
    };

    let normalized = format!("${} per month", format_currency(monthly));
    if frequency != "month" {
        info!("Converted rent from '{}' to '{}'", rent, normalized);
    }
    normalized
}

/// Two decimals with comma thousands separators: `2498.513` → `2,498.51`.
fn format_currency(amount: f64) -> String {
    let fixed = format!("{amount:.2}");
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{grouped}.{cents}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fortnightly_converts_to_monthly() {
        assert_eq!(normalize_rent("$1,000.00 per fortnight"), "$2,172.62 per month");
        assert_eq!(normalize_rent("$1,150.00 per fortnight"), "$2,498.51 per month");
    }

    #[test]
    fn weekly_converts_to_monthly() {
        assert_eq!(normalize_rent("$1,000.00 per week"), "$4,350.00 per month");
        assert_eq!(normalize_rent("$480 per week"), "$2,088.00 per month");
    }

    #[test]
    fn monthly_is_idempotent() {
        let once = normalize_rent("$1,000.00 per month");
        assert_eq!(once, "$1,000.00 per month");
        assert_eq!(normalize_rent(&once), once);
    }

    #[test]
    fn noise_tokens_are_stripped() {
        assert_eq!(normalize_rent("$2,650.00 AUD per month"), "$2,650.00 per month");
        assert_eq!(normalize_rent("AUD 2650 per calendar month"), "$2,650.00 per month");
    }

    #[test]
    fn frequency_is_case_insensitive() {
        assert_eq!(normalize_rent("$500 per Week"), "$2,175.00 per month");
    }

    #[test]
    fn unknown_shapes_pass_through() {
        assert_eq!(normalize_rent("$500 per quarter"), "$500 per quarter");
        assert_eq!(normalize_rent("to be confirmed"), "to be confirmed");
        assert_eq!(normalize_rent(""), "");
    }

    #[test]
    fn currency_grouping() {
        assert_eq!(format_currency(0.5), "0.50");
        assert_eq!(format_currency(999.999), "1,000.00");
        assert_eq!(format_currency(1234567.891), "1,234,567.89");
    }
}
