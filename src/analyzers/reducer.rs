//! Global Reducer: folds partial aggregates into the run total.

use crate::analyzers::types::{GlobalAggregate, PartialAggregate, Summary};
use crate::analyzers::utility::{mean, round2};

/// Folds partial aggregates into the run's global totals.
///
/// Addition is field-wise, so the order partials arrive in never changes
/// the result beyond floating-point rounding.
#[derive(Debug, Default, Clone)]
pub struct GlobalReducer {
    total: GlobalAggregate,
    partials: usize,
}

impl GlobalReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate(&mut self, partial: &PartialAggregate) {
        self.total.add(partial);
        self.partials += 1;
    }

    /// Absorbs another reducer's totals, as if its partials had been fed here.
    pub fn merge(&mut self, other: GlobalReducer) {
        self.total.add(&other.total.into());
        self.partials += other.partials;
    }

    pub fn total(&self) -> &GlobalAggregate {
        &self.total
    }

    /// Number of partials accumulated so far.
    pub fn partials(&self) -> usize {
        self.partials
    }

    /// Derives the final summary. Consumes the reducer: totals are not
    /// reused once a run has been summarised.
    pub fn finalize(self) -> Summary {
        summarize(&self.total)
    }
}

impl Extend<PartialAggregate> for GlobalReducer {
    fn extend<I: IntoIterator<Item = PartialAggregate>>(&mut self, iter: I) {
        for partial in iter {
            self.accumulate(&partial);
        }
    }
}

impl FromIterator<PartialAggregate> for GlobalReducer {
    fn from_iter<I: IntoIterator<Item = PartialAggregate>>(iter: I) -> Self {
        let mut reducer = GlobalReducer::new();
        reducer.extend(iter);
        reducer
    }
}

/// Means divide by the row count and fall back to zero for an empty run.
pub fn summarize(total: &GlobalAggregate) -> Summary {
    Summary {
        record_count: total.rows,
        mean_distance: round2(mean(total.distance, total.rows)),
        mean_tip: round2(mean(total.tip, total.rows)),
        total_amount: round2(total.amount),
        mean_fare: round2(mean(total.amount, total.rows)),
        passenger_total: total.passengers,
        mean_passengers: round2(mean(total.passengers as f64, total.rows)),
        long_trips: total.long_trips,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rows_give_zero_means() {
        let summary = GlobalReducer::new().finalize();
        assert_eq!(summary, Summary::default());
    }

    #[test]
    fn test_three_batches_scenario() {
        let reducer: GlobalReducer = [(2, 4.0), (0, 0.0), (3, 9.0)]
            .into_iter()
            .map(|(rows, distance)| partial(rows, distance))
            .collect();

        assert_eq!(reducer.total().rows, 5);
        assert_eq!(reducer.total().distance, 13.0);
        assert_eq!(reducer.partials(), 3);
        assert_eq!(reducer.finalize().mean_distance, 2.6);
    }

    #[test]
    fn test_order_does_not_matter() {
        let parts: Vec<PartialAggregate> = (1..=6)
            .map(|i| PartialAggregate {
                rows: i,
                distance: i as f64 * 1.1,
                tip: i as f64 * 0.3,
                amount: i as f64 * 17.25,
                passengers: i * 2,
                long_trips: i % 2,
            })
            .collect();

        let forward: GlobalReducer = parts.iter().copied().collect();
        let backward: GlobalReducer = parts.iter().rev().copied().collect();
        assert_eq!(forward.finalize(), backward.finalize());
    }

    #[test]
    fn test_grouped_merge_matches_single_pass() {
        let parts: Vec<PartialAggregate> = (1..=7)
            .map(|i| partial(i, i as f64 * 2.5))
            .collect();

        let whole: GlobalReducer = parts.iter().copied().collect();

        let mut grouped = GlobalReducer::new();
        for group in parts.chunks(3) {
            grouped.merge(group.iter().copied().collect());
        }

        let (a, b) = (whole.total(), grouped.total());
        assert_eq!(a.rows, b.rows);
        assert!((a.distance - b.distance).abs() < 1e-9);
        assert_eq!(whole.finalize(), grouped.finalize());
    }

    #[test]
    fn test_summary_rounding_and_counts() {
        let reducer: GlobalReducer = [PartialAggregate {
            rows: 3,
            distance: 10.0,
            tip: 5.0,
            amount: 100.02,
            passengers: 4,
            long_trips: 1,
        }]
        .into_iter()
        .collect();
        let summary = reducer.finalize();

        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.mean_distance, 3.33);
        assert_eq!(summary.mean_tip, 1.67);
        assert_eq!(summary.mean_fare, 33.34);
        assert_eq!(summary.passenger_total, 4);
        assert_eq!(summary.mean_passengers, 1.33);
        assert_eq!(summary.long_trips, 1);
    }

    fn partial(rows: u64, distance: f64) -> PartialAggregate {
        PartialAggregate {
            rows,
            distance,
            ..Default::default()
        }
    }
}
