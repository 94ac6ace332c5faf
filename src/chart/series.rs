//! Punctuality series preparation

use chrono::{Months, NaiveDate};

use crate::store::PunctualityRecord;

/// Plottable points: one per measured month, dated on the first of the month.
///
/// Records without a rate are unmeasured months and are dropped, not zeroed.
pub fn plot_points(records: &[PunctualityRecord]) -> Vec<(NaiveDate, f64)> {
    records
        .iter()
        .filter_map(|r| Some((r.period.first_day()?, r.rate?)))
        .collect()
}

/// Time span covered by the x-axis.
///
/// A single point still gets a one-month wide axis.
pub fn date_span(points: &[(NaiveDate, f64)]) -> Option<(NaiveDate, NaiveDate)> {
    let start = points.iter().map(|(d, _)| *d).min()?;
    let end = points.iter().map(|(d, _)| *d).max()?;
    if end > start {
        Some((start, end))
    } else {
        Some((start, start.checked_add_months(Months::new(1))?))
    }
}

/// Axis label: full month name and year
pub fn month_label(date: &NaiveDate) -> String {
    date.format("%B %Y").to_string()
}
