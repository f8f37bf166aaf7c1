use super::types::{PercentileBands, PercentileSeries, RawTrialData};

/// Reduces the cross-trial distribution at each age to p10/p50/p90.
///
/// Percentiles use linear interpolation between order statistics (rank
/// `p/100 * (n - 1)`). A trial counts as successful when it never failed to
/// fund its spending; failed trials are pinned at zero assets from the
/// failure year on. The success rate is a percentage.
pub fn aggregate(raw: &RawTrialData) -> PercentileSeries {
    let year_count = raw.ages.len();
    let trial_count = raw.trials.len();
    let mut assets = PercentileBands::with_capacity(year_count);
    let mut spending = PercentileBands::with_capacity(year_count);
    let mut asset_column = Vec::with_capacity(trial_count);
    let mut spending_column = Vec::with_capacity(trial_count);

    for idx in 0..year_count {
        asset_column.clear();
        spending_column.clear();
        for trial in &raw.trials {
            if let Some(sample) = trial.samples.get(idx) {
                asset_column.push(sample.assets);
                spending_column.push(sample.spending);
            }
        }
        push_bands(&mut assets, &mut asset_column);
        push_bands(&mut spending, &mut spending_column);
    }

    let successful_trials = raw.trials.iter().filter(|t| !t.failed).count() as u32;
    let trials = trial_count as u32;
    let success_fraction = if trials == 0 {
        0.0
    } else {
        successful_trials as f64 / trials as f64
    };

    PercentileSeries {
        ages: raw.ages.clone(),
        asset_percentiles: assets,
        spending_percentiles: spending,
        success_rate: success_fraction * 100.0,
        successful_trials,
        trials,
        success_ci_half_width: binomial_ci_half_width(success_fraction, trials) * 100.0,
    }
}

fn push_bands(bands: &mut PercentileBands, column: &mut [f64]) {
    column.sort_by(|a, b| a.total_cmp(b));
    let p10 = percentile_sorted(column, 10.0);
    // max() absorbs interpolation rounding between nearly equal neighbours.
    let p50 = percentile_sorted(column, 50.0).max(p10);
    let p90 = percentile_sorted(column, 90.0).max(p50);
    bands.p10.push(p10);
    bands.p50.push(p50);
    bands.p90.push(p90);
}

fn percentile_sorted(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        (values[lower] * (1.0 - w) + values[upper] * w).clamp(values[lower], values[upper])
    }
}

/// 95% normal-approximation half width of a binomial proportion, as a fraction.
pub fn binomial_ci_half_width(p: f64, n: u32) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    1.96 * (p * (1.0 - p) / n as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{TrialPath, TrialSample};
    use proptest::collection::vec;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn raw_from_columns(ages: &[u32], assets: &[Vec<f64>], failed: &[bool]) -> RawTrialData {
        let trials = failed
            .iter()
            .enumerate()
            .map(|(trial, &failed)| TrialPath {
                samples: ages
                    .iter()
                    .enumerate()
                    .map(|(idx, &age)| TrialSample {
                        age,
                        assets: assets[idx][trial],
                        spending: assets[idx][trial] / 10.0,
                    })
                    .collect(),
                failed,
            })
            .collect();
        RawTrialData {
            ages: ages.to_vec(),
            trials,
        }
    }

    #[test]
    fn percentile_interpolates_between_order_statistics() {
        let values = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_approx(percentile_sorted(&values, 50.0), 30.0);
        assert_approx(percentile_sorted(&values, 10.0), 14.0);
        assert_approx(percentile_sorted(&values, 90.0), 46.0);
        assert_approx(percentile_sorted(&[7.0], 90.0), 7.0);
        assert_approx(percentile_sorted(&[], 50.0), 0.0);
    }

    #[test]
    fn aggregates_each_age_independently() {
        let raw = raw_from_columns(
            &[60, 61],
            &[
                vec![100.0, 300.0, 200.0],
                vec![0.0, 600.0, 900.0],
            ],
            &[false, true, false],
        );
        let series = aggregate(&raw);

        assert_eq!(series.ages, vec![60, 61]);
        assert_approx(series.asset_percentiles.p50[0], 200.0);
        assert_approx(series.asset_percentiles.p10[0], 120.0);
        assert_approx(series.asset_percentiles.p90[0], 280.0);
        assert_approx(series.asset_percentiles.p50[1], 600.0);
        assert_approx(series.spending_percentiles.p50[1], 60.0);
        assert_eq!(series.successful_trials, 2);
        assert_eq!(series.trials, 3);
        assert_approx(series.success_rate, 200.0 / 3.0);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let raw = raw_from_columns(
            &[30, 31, 32],
            &[
                vec![5.0, 1.0, 3.0, 2.0],
                vec![8.0, 2.0, 6.0, 4.0],
                vec![0.0, 0.0, 9.0, 1.0],
            ],
            &[false, true, false, false],
        );
        let a = aggregate(&raw);
        let b = aggregate(&raw);
        assert_eq!(a, b);
    }

    #[test]
    fn confidence_half_width_shrinks_with_trials() {
        assert_approx(binomial_ci_half_width(0.0, 100), 0.0);
        assert_approx(binomial_ci_half_width(1.0, 100), 0.0);
        assert!(binomial_ci_half_width(0.5, 1_000) < binomial_ci_half_width(0.5, 100));
        assert_approx(binomial_ci_half_width(0.5, 0), 0.0);
    }

    proptest! {
        #[test]
        fn bands_are_ordered(columns in vec(vec(0.0f64..1e7, 1..40), 1..12)) {
            let trials = columns.iter().map(Vec::len).min().unwrap_or(1);
            let columns: Vec<Vec<f64>> =
                columns.into_iter().map(|c| c[..trials].to_vec()).collect();
            let ages: Vec<u32> = (0..columns.len() as u32).map(|i| 40 + i).collect();
            let raw = raw_from_columns(&ages, &columns, &vec![false; trials]);
            let series = aggregate(&raw);

            prop_assert_eq!(series.asset_percentiles.p50.len(), ages.len());
            for bands in [&series.asset_percentiles, &series.spending_percentiles] {
                for idx in 0..ages.len() {
                    prop_assert!(bands.p10[idx] <= bands.p50[idx]);
                    prop_assert!(bands.p50[idx] <= bands.p90[idx]);
                }
            }
            prop_assert!((series.success_rate - 100.0).abs() < 1e-12);
        }
    }
}
