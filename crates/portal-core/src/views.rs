//! Derived values shown next to backend records: offer totals, money,
//! bidding countdowns and list filtering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize_label;

/// Inputs of an offer's total cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct OfferCost {
    pub daily_rate: f64,
    pub total_man_days: f64,
    pub travel_cost_per_onsite_day: f64,
    pub onsite_days: f64,
}

impl OfferCost {
    pub fn labour(&self) -> f64 {
        self.daily_rate * self.total_man_days
    }

    pub fn travel(&self) -> f64 {
        self.travel_cost_per_onsite_day * self.onsite_days
    }

    /// `rate × days + travel × onsite days`, rounded to cents.
    pub fn total(&self) -> f64 {
        round_cents(self.labour() + self.travel())
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Euro amount with en-US grouping and at most two fraction digits.
pub fn format_eur(amount: f64) -> String {
    let rounded = round_cents(amount);
    let negative = rounded < 0.0;
    let cents = (rounded.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('€');
    out.push_str(&grouped);
    if frac > 0 {
        let frac = format!("{frac:02}");
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out
}

pub fn format_optional_eur(amount: Option<f64>) -> String {
    amount.map(format_eur).unwrap_or_else(|| "n/a".to_string())
}

/// Time remaining until a bidding deadline.
pub fn format_countdown(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = deadline - now;
    if remaining <= chrono::Duration::zero() {
        return "Closed".to_string();
    }
    let total_minutes = remaining.num_minutes();
    let days = total_minutes / (60 * 24);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;
    if days > 0 {
        format!("{days}d {hours}h left")
    } else if hours > 0 {
        format!("{hours}h {minutes}m left")
    } else {
        format!("{}m left", minutes.max(1))
    }
}

/// Case-insensitive substring match of `query` against any of `haystacks`.
/// An empty query matches everything.
pub fn matches_query<'a>(query: &str, haystacks: impl IntoIterator<Item = &'a str>) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    haystacks
        .into_iter()
        .any(|h| h.to_lowercase().contains(&needle))
}

/// Status filter from a query string; empty or "all" keeps every row.
pub fn matches_status(filter: &str, label: &str) -> bool {
    let wanted = normalize_label(filter);
    wanted.is_empty() || wanted == "all" || wanted == normalize_label(label)
}

/// Match scores arrive either as a fraction (`0.92`) or already scaled (`92`).
/// Anything up to `1.0` is read as a fraction.
pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) if v.abs() <= 1.0 => format!("{:.0}%", v * 100.0),
        Some(v) => format!("{:.0}%", v),
        None => "n/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn offer_total_combines_labour_and_travel() {
        let cost = OfferCost {
            daily_rate: 850.0,
            total_man_days: 10.0,
            travel_cost_per_onsite_day: 50.0,
            onsite_days: 3.0,
        };
        assert_eq!(cost.labour(), 8500.0);
        assert_eq!(cost.travel(), 150.0);
        assert_eq!(cost.total(), 8650.0);
    }

    #[test]
    fn eur_uses_thousands_separators() {
        assert_eq!(format_eur(12500.0), "€12,500");
        assert_eq!(format_eur(1_234_567.0), "€1,234,567");
        assert_eq!(format_eur(850.0), "€850");
        assert_eq!(format_eur(850.5), "€850.5");
        assert_eq!(format_eur(1999.99), "€1,999.99");
        assert_eq!(format_eur(0.0), "€0");
        assert_eq!(format_optional_eur(None), "n/a");
    }

    #[test]
    fn countdown_picks_the_coarsest_useful_unit() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let in_days = now + chrono::Duration::hours(52);
        let in_hours = now + chrono::Duration::minutes(185);
        let in_seconds = now + chrono::Duration::seconds(20);
        assert_eq!(format_countdown(in_days, now), "2d 4h left");
        assert_eq!(format_countdown(in_hours, now), "3h 5m left");
        assert_eq!(format_countdown(in_seconds, now), "1m left");
        assert_eq!(format_countdown(now, now), "Closed");
        assert_eq!(format_countdown(now - chrono::Duration::days(1), now), "Closed");
    }

    #[test]
    fn query_and_status_filters() {
        assert!(matches_query("", ["anything"]));
        assert!(matches_query("rust", ["Senior RUST engineer", "Berlin"]));
        assert!(!matches_query("golang", ["Senior Rust engineer"]));
        assert!(matches_status("", "Draft"));
        assert!(matches_status("all", "Draft"));
        assert!(matches_status("in_negotiation", "In Negotiation"));
        assert!(!matches_status("draft", "Published"));
    }

    #[test]
    fn percent_reads_fractions_and_scaled_scores() {
        assert_eq!(format_percent(Some(0.92)), "92%");
        assert_eq!(format_percent(Some(1.0)), "100%");
        assert_eq!(format_percent(Some(0.0)), "0%");
        assert_eq!(format_percent(Some(85.0)), "85%");
        assert_eq!(format_percent(None), "n/a");
    }
}
