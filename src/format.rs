//! Price formatting and flip metrics.
//!
//! Every view (table cells, badges, detail page, chart axes and tooltips) goes
//! through these functions so thresholds never drift between screens.

use chrono::{DateTime, NaiveDate, Utc};

/// GE sales tax rate in percent of the sell price.
pub const GE_TAX_PERCENT: i64 = 1;

/// Abbreviated amount without unit: `999`, `1.0k`, `1.00M`.
///
/// Rounding is fixed-point, half away from zero on exact ties, done in integer
/// arithmetic so `1250` renders as `1.3k`. Values below 1000 (negatives
/// included) are printed as-is.
pub fn format_number(n: i64) -> String {
    if n >= 1_000_000 {
        let hundredths = (i128::from(n) * 100 + 500_000) / 1_000_000;
        format!("{}.{:02}M", hundredths / 100, hundredths % 100)
    } else if n >= 1_000 {
        let tenths = (n * 10 + 500) / 1_000;
        format!("{}.{}k", tenths / 10, tenths % 10)
    } else {
        n.to_string()
    }
}

/// Abbreviated amount with the `GP` unit: `999 GP`, `1.0k GP`, `1.00M GP`.
pub fn format_price(n: i64) -> String {
    format!("{} GP", format_number(n))
}

/// Percentage gain from buying at `low` and selling at `high`, before tax.
/// Zero when `low` is zero.
pub fn margin(low: i64, high: i64) -> f64 {
    if low == 0 {
        return 0.0;
    }
    (high - low) as f64 / low as f64 * 100.0
}

pub fn format_margin(margin: f64) -> String {
    format!("{margin:.2}%")
}

/// 1% of the sell price, rounded down.
pub fn ge_tax(high: i64) -> i64 {
    (high * GE_TAX_PERCENT).div_euclid(100)
}

/// Expected profit per unit after GE tax.
pub fn profit(low: i64, high: i64) -> i64 {
    high - low - ge_tax(high)
}

// ---------------------------------------------------------------------------
// Badge tiers
// ---------------------------------------------------------------------------

/// Colour band of a price badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceTier {
    /// Below 10k.
    Base,
    /// 10k and up.
    Mid,
    /// 100k and up.
    High,
    /// 1M and up.
    Premium,
}

impl PriceTier {
    pub fn from_price(price: i64) -> Self {
        if price >= 1_000_000 {
            PriceTier::Premium
        } else if price >= 100_000 {
            PriceTier::High
        } else if price >= 10_000 {
            PriceTier::Mid
        } else {
            PriceTier::Base
        }
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s.trim()) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// `2024-03-01 12:00 UTC`, or the raw string when it cannot be parsed.
pub fn format_timestamp(s: &str) -> String {
    parse_timestamp(s)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| s.to_string())
}

/// Short chart axis label: `Mar 1`.
pub fn format_chart_date(s: &str) -> String {
    parse_timestamp(s)
        .map(|dt| dt.format("%b %-d").to_string())
        .unwrap_or_else(|| truncate(s, 10))
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_thresholds() {
        assert_eq!(format_price(0), "0 GP");
        assert_eq!(format_price(999), "999 GP");
        assert_eq!(format_price(1_000), "1.0k GP");
        assert_eq!(format_price(999_999), "1000.0k GP");
        assert_eq!(format_price(1_000_000), "1.00M GP");
        assert_eq!(format_price(2_147_483_647), "2147.48M GP");
    }

    #[test]
    fn suffix_matches_magnitude() {
        for n in [0, 1, 500, 999, 1_000, 45_500, 999_999, 1_000_000, 73_000_000] {
            let s = format_number(n);
            assert_eq!(s.ends_with('M'), n >= 1_000_000, "{n} -> {s}");
            assert_eq!(s.ends_with('k'), (1_000..1_000_000).contains(&n), "{n} -> {s}");
        }
    }

    #[test]
    fn ties_round_up() {
        assert_eq!(format_number(1_250), "1.3k");
        assert_eq!(format_number(1_249), "1.2k");
        assert_eq!(format_number(1_005_000), "1.01M");
    }

    #[test]
    fn losses_render_plain() {
        assert_eq!(format_number(-1_500), "-1500");
        assert_eq!(format_price(-2), "-2 GP");
    }

    #[test]
    fn margin_guards_zero_low() {
        assert_eq!(margin(0, 1_000), 0.0);
        assert_eq!(margin(0, 0), 0.0);
        assert!((margin(100, 150) - 50.0).abs() < 1e-9);
        assert_eq!(format_margin(margin(300, 200)), "-33.33%");
    }

    #[test]
    fn tax_rounds_down() {
        assert_eq!(ge_tax(250), 2);
        assert_eq!(ge_tax(99), 0);
        assert_eq!(ge_tax(100), 1);
        for high in [0_i64, 1, 57, 199, 10_001, 1_234_567] {
            assert_eq!(ge_tax(high), (high as f64 * 0.01).floor() as i64);
        }
    }

    #[test]
    fn profit_subtracts_tax() {
        assert_eq!(profit(1_000, 1_250), 1_250 - 1_000 - 12);
        assert_eq!(profit(500, 500), -5);
        for (low, high) in [(0, 0), (10, 99), (1_480_000, 1_520_000)] {
            assert_eq!(profit(low, high), high - low - ge_tax(high));
        }
    }

    #[test]
    fn badge_tiers() {
        assert_eq!(PriceTier::from_price(9_999), PriceTier::Base);
        assert_eq!(PriceTier::from_price(10_000), PriceTier::Mid);
        assert_eq!(PriceTier::from_price(100_000), PriceTier::High);
        assert_eq!(PriceTier::from_price(1_000_000), PriceTier::Premium);
    }

    #[test]
    fn timestamps_fall_back_to_raw() {
        assert_eq!(format_timestamp("2024-03-01T12:00:00Z"), "2024-03-01 12:00 UTC");
        assert_eq!(format_chart_date("2024-03-01T12:00:00Z"), "Mar 1");
        assert_eq!(format_chart_date("2024-03-09"), "Mar 9");
        assert_eq!(format_timestamp("yesterday"), "yesterday");
    }
}
