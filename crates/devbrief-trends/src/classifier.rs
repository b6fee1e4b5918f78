use std::fmt;
use std::str::FromStr;

use devbrief_core::{EntityId, Snapshot};
use serde::{Deserialize, Serialize};

use crate::error::DataIntegrityError;

/// Momentum label for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Fewer than two snapshots; no growth can be measured yet.
    New,
    Rising,
    Steady,
    Declining,
}

impl Verdict {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::New => "NEW",
            Verdict::Rising => "RISING",
            Verdict::Steady => "STEADY",
            Verdict::Declining => "DECLINING",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEW" => Ok(Verdict::New),
            "RISING" => Ok(Verdict::Rising),
            "STEADY" => Ok(Verdict::Steady),
            "DECLINING" => Ok(Verdict::Declining),
            other => Err(format!("unknown verdict '{other}'")),
        }
    }
}

/// Thresholds separating the verdicts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierPolicy {
    /// Growth rates (stars/day) with a smaller magnitude are treated as flat.
    /// Only consulted for series that change direction or slow down.
    pub steady_tolerance: f64,
    /// A growing entity is declining once its latest rate has dropped by more
    /// than this fraction of the prior period's rate.
    pub decline_ratio: f64,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            steady_tolerance: 0.5,
            decline_ratio: 0.5,
        }
    }
}

/// Verdict plus the figures it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendMetrics {
    pub entity: EntityId,
    pub verdict: Verdict,
    /// Stars per day over the most recent period.
    pub growth_rate: f64,
    /// Latest period rate minus the prior period rate; 0 with a single period.
    pub acceleration: f64,
    pub current_stars: i64,
    /// Absolute star change over the most recent period.
    pub latest_growth: i64,
    /// `latest_growth` relative to the star count at the start of the period,
    /// in percent. 0 when that count was 0.
    pub latest_growth_pct: f64,
    /// Star change from the first to the last snapshot.
    pub window_growth: i64,
    /// Days between the first and the last snapshot.
    pub observed_days: i64,
    pub snapshot_count: usize,
}

/// Classify the momentum of `entity` from its snapshot history.
///
/// `series` must be ordered by capture date, oldest first. Deterministic: the
/// only notion of time is the dates carried by the snapshots.
///
/// # Errors
///
/// Returns [`DataIntegrityError`] when a snapshot belongs to another entity,
/// dates are duplicated or out of order, or a metric is negative.
#[allow(clippy::cast_precision_loss)]
pub fn classify(
    entity: &EntityId,
    series: &[Snapshot],
    policy: &ClassifierPolicy,
) -> Result<TrendMetrics, DataIntegrityError> {
    validate_series(entity, series)?;

    let current_stars = series.last().map_or(0, |s| s.stars);
    let mut metrics = TrendMetrics {
        entity: entity.clone(),
        verdict: Verdict::New,
        growth_rate: 0.0,
        acceleration: 0.0,
        current_stars,
        latest_growth: 0,
        latest_growth_pct: 0.0,
        window_growth: 0,
        observed_days: 0,
        snapshot_count: series.len(),
    };

    let [.., previous, latest] = series else {
        return Ok(metrics);
    };
    let first = &series[0];

    let rates: Vec<f64> = series.windows(2).map(|pair| period_rate(&pair[0], &pair[1])).collect();
    let growth_rate = rates[rates.len() - 1];
    let prior_rate = rates.len().checked_sub(2).map(|i| rates[i]);
    let acceleration = prior_rate.map_or(0.0, |prior| growth_rate - prior);

    let deltas: Vec<i64> = series.windows(2).map(|pair| pair[1].stars - pair[0].stars).collect();
    metrics.verdict = monotonic_verdict(&deltas)
        .unwrap_or_else(|| decide_verdict(growth_rate, acceleration, prior_rate, policy));
    metrics.growth_rate = growth_rate;
    metrics.acceleration = acceleration;
    metrics.latest_growth = latest.stars - previous.stars;
    metrics.latest_growth_pct = if previous.stars > 0 {
        metrics.latest_growth as f64 / previous.stars as f64 * 100.0
    } else {
        0.0
    };
    metrics.window_growth = latest.stars - first.stars;
    metrics.observed_days = (latest.captured_on - first.captured_on).num_days();

    Ok(metrics)
}

/// Verdict for a series that moves in one direction every period, judged on
/// raw star deltas so uneven capture gaps cannot flip it.
///
/// Gains in every period that never shrink are rising; losses in every period
/// are declining. Anything else is left to [`decide_verdict`].
fn monotonic_verdict(deltas: &[i64]) -> Option<Verdict> {
    if deltas.is_empty() {
        return None;
    }
    let all_gains = deltas.iter().all(|d| *d > 0);
    let never_shrinks = deltas.windows(2).all(|pair| pair[1] >= pair[0]);
    if all_gains && never_shrinks {
        return Some(Verdict::Rising);
    }
    if deltas.iter().all(|d| *d < 0) {
        return Some(Verdict::Declining);
    }
    None
}

/// Map rate and acceleration onto a verdict. Checks run from the least to the
/// most dramatic label so borderline inputs land on the calmer one.
fn decide_verdict(
    growth_rate: f64,
    acceleration: f64,
    prior_rate: Option<f64>,
    policy: &ClassifierPolicy,
) -> Verdict {
    if growth_rate.abs() < policy.steady_tolerance {
        return Verdict::Steady;
    }
    if growth_rate < 0.0 {
        return Verdict::Declining;
    }
    if growth_rate > 0.0 && acceleration >= 0.0 {
        return Verdict::Rising;
    }
    let momentum_lost = prior_rate.map_or(0.0, |prior| policy.decline_ratio * prior.abs());
    if growth_rate > 0.0 && acceleration < -momentum_lost {
        return Verdict::Declining;
    }
    Verdict::Steady
}

#[allow(clippy::cast_precision_loss)]
fn period_rate(older: &Snapshot, newer: &Snapshot) -> f64 {
    let days = (newer.captured_on - older.captured_on).num_days();
    (newer.stars - older.stars) as f64 / days as f64
}

fn validate_series(entity: &EntityId, series: &[Snapshot]) -> Result<(), DataIntegrityError> {
    for snapshot in series {
        if &snapshot.entity != entity {
            return Err(DataIntegrityError::ForeignSnapshot {
                expected: entity.clone(),
                found: snapshot.entity.clone(),
            });
        }

        let metrics = [
            ("stars", Some(snapshot.stars)),
            ("forks", Some(snapshot.forks)),
            ("open_issues", snapshot.open_issues),
        ];
        for (metric, value) in metrics {
            if let Some(value) = value.filter(|v| *v < 0) {
                return Err(DataIntegrityError::NegativeMetric {
                    entity: entity.clone(),
                    captured_on: snapshot.captured_on,
                    metric,
                    value,
                });
            }
        }
    }

    for pair in series.windows(2) {
        if pair[1].captured_on <= pair[0].captured_on {
            return Err(DataIntegrityError::NonMonotonicDates {
                entity: entity.clone(),
                previous: pair[0].captured_on,
                next: pair[1].captured_on,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "classifier_test.rs"]
mod tests;
