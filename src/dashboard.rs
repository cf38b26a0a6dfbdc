use async_graphql::{Enum, SimpleObject};

use crate::product::{format_brl, Condition, DisplayRecord};

/// Upper bound on the number of histogram bars.
pub(crate) const MAX_BINS: usize = 30;

/// Fraction of a bin width by which a price may fall short of an edge and
/// still count in the bin above it.
const EDGE_TOLERANCE: f64 = 1e-9;

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug, Default)]
pub(crate) enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Ascending => "Menor para maior",
            Self::Descending => "Maior para menor",
        }
    }
}

/// How the user wants the fetched records shown.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ViewOptions {
    pub(crate) order: SortOrder,
    pub(crate) free_shipping_only: bool,
    /// Conditions to keep. An empty list keeps nothing.
    pub(crate) conditions: Vec<Condition>,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            order: SortOrder::default(),
            free_shipping_only: false,
            conditions: Condition::ALL.to_vec(),
        }
    }
}

impl ViewOptions {
    fn keeps(&self, record: &DisplayRecord) -> bool {
        (!self.free_shipping_only || record.free_shipping)
            && self.conditions.contains(&record.condition)
    }

    /// Filters `records`, then sorts them by price. The sort is stable, so
    /// equal prices stay in fetch order.
    pub(crate) fn apply(&self, records: Vec<DisplayRecord>) -> Vec<DisplayRecord> {
        let mut kept: Vec<DisplayRecord> = records.into_iter().filter(|r| self.keeps(r)).collect();
        match self.order {
            SortOrder::Ascending => kept.sort_by(|a, b| a.price.total_cmp(&b.price)),
            SortOrder::Descending => kept.sort_by(|a, b| b.price.total_cmp(&a.price)),
        }
        kept
    }
}

#[derive(SimpleObject, Debug, Clone, PartialEq)]
pub(crate) struct PriceStats {
    pub(crate) count: usize,
    pub(crate) mean: f64,
    pub(crate) min: f64,
    pub(crate) max: f64,
}

impl PriceStats {
    /// Returns `None` for an empty list.
    pub(crate) fn compute(records: &[DisplayRecord]) -> Option<Self> {
        let first = records.first()?;
        let (mut min, mut max, mut sum) = (first.price, first.price, 0.0);
        for record in records {
            min = min.min(record.price);
            max = max.max(record.price);
            sum += record.price;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = sum / records.len() as f64;
        Some(Self {
            count: records.len(),
            mean,
            min,
            max,
        })
    }

    pub(crate) fn formatted_mean(&self) -> String {
        format_brl(self.mean)
    }

    pub(crate) fn formatted_min(&self) -> String {
        format_brl(self.min)
    }

    pub(crate) fn formatted_max(&self) -> String {
        format_brl(self.max)
    }
}

/// One bar of the price histogram, covering `[start, end)`; the last bar
/// also includes `end`.
#[derive(SimpleObject, Debug, Clone, PartialEq)]
pub(crate) struct HistogramBin {
    pub(crate) start: f64,
    pub(crate) end: f64,
    pub(crate) count: usize,
}

impl HistogramBin {
    pub(crate) fn range_label(&self) -> String {
        format!("{} a {}", format_brl(self.start), format_brl(self.end))
    }
}

/// Bins `prices` into at most `max_bins` bars of equal width.
///
/// The width is a "nice" number (1, 2 or 5 times a power of ten) and the bar
/// edges are multiples of it, so the bars may extend a little beyond the
/// smallest and largest price.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub(crate) fn histogram(prices: &[f64], max_bins: usize) -> Vec<HistogramBin> {
    let Some(&first) = prices.first() else {
        return Vec::new();
    };
    let (min, max) = prices
        .iter()
        .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    let max_bins = max_bins.max(1);

    let single = || {
        vec![HistogramBin {
            start: min,
            end: max,
            count: prices.len(),
        }]
    };
    let span = max - min;
    if span <= 0.0 {
        return single();
    }

    let nice = (1..=max_bins)
        .rev()
        .filter_map(|target| nice_extent(min, max, target))
        .find(|&(_, _, bins)| bins <= max_bins);
    let equal = || {
        let step = span / max_bins as f64;
        (step > 0.0).then_some((min, step, max_bins))
    };
    let Some((start, step, bins)) = nice.or_else(equal) else {
        return single();
    };

    let mut counts = vec![0_usize; bins];
    for &price in prices {
        // Prices on an edge belong to the bin starting there, even when the
        // division lands just below the integer.
        let pos = (price - start) / step + EDGE_TOLERANCE;
        let idx = (pos.floor().max(0.0) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: start + step * i as f64,
            end: start + step * (i + 1) as f64,
            count,
        })
        .collect()
}

/// Picks a step for `[min, max]` aiming at no more than `max_bins` bins and
/// widens the extent to multiples of it. Returns the start, the step and the
/// number of bins, or `None` when the span is too small or too large for a
/// usable step.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn nice_extent(min: f64, max: f64, max_bins: usize) -> Option<(f64, f64, usize)> {
    const BASE: f64 = 10.0;
    const DIVISORS: [f64; 2] = [5.0, 2.0];

    let max_bins_f = max_bins as f64;
    let span = max - min;
    let log_base = BASE.ln();
    let level = (max_bins_f.ln() / log_base).ceil();
    let mut step = BASE.powf((span.ln() / log_base).round() - level);
    if step <= 0.0 || !step.is_finite() {
        return None;
    }
    while (span / step).ceil() > max_bins_f {
        step *= BASE;
    }
    for divisor in DIVISORS {
        let candidate = step / divisor;
        if span / candidate <= max_bins_f {
            step = candidate;
        }
    }

    let log_step = step.ln();
    let precision = if log_step >= 0.0 {
        0.0
    } else {
        (-log_step / log_base).floor() + 1.0
    };
    let eps = BASE.powf(-precision - 1.0);
    let floor = (min / step + eps).floor() * step;
    let start = if min < floor { floor - step } else { floor };
    let stop = (max / step).ceil() * step;

    if !step.is_finite() {
        return None;
    }
    let bins = (((stop - start) / step).round() as usize).max(1);
    Some((start, step, bins))
}
