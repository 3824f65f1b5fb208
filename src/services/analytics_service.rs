use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, warn};

use crate::db::repositories::consumption_repository::ConsumptionRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::analytics::{
    AnalyticsReport, AnomalyDetail, EfficiencyRating, HistoryPoint, MetricStatus,
};
use crate::models::consumption::{ConsumptionRecord, ResourceType};
use crate::services::benchmarks;

// A period is flagged anomalous when it exceeds its trailing average by
// more than 20%.
const ANOMALY_THRESHOLD_RATIO: f64 = 1.2;
const MOVING_AVERAGE_WINDOW: usize = 3;
const DEVIATION_WARNING_PCT: f64 = 10.0;
const PERCENT_CHANGE_WARNING_LIMIT: f64 = 10.0;
const ANOMALY_WARNING_MAX: usize = 2;

/// Turns a user's raw consumption history into the full derived metrics
/// report: bimonthly aggregates, trailing averages, anomaly flags, benchmark
/// comparison, CO2 estimate and a short-term forecast.
pub struct AnalyticsService {
    db: DbPool,
}

impl AnalyticsService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Compute the report for one resource. Never fails: empty history and
    /// collaborator errors both resolve to the defined neutral report.
    pub fn report(&self, resource_type: ResourceType, user_id: &str) -> AnalyticsReport {
        match self.try_report(resource_type, user_id) {
            Ok(report) => report,
            Err(err) => {
                warn!(
                    target: "app::analytics",
                    resource = resource_type.as_str(),
                    error = %err,
                    "analytics computation failed, returning neutral report"
                );
                AnalyticsReport::empty(resource_type)
            }
        }
    }

    fn try_report(&self, resource_type: ResourceType, user_id: &str) -> AppResult<AnalyticsReport> {
        match resource_type {
            ResourceType::Water | ResourceType::Electricity => {
                let records = self
                    .db
                    .with_connection(|conn| {
                        ConsumptionRepository::list_for_user(conn, resource_type, user_id)
                    })
                    .map_err(|err| {
                        AppError::upstream("registros de consumo", err.to_string())
                    })?;
                Ok(self.compute_report(resource_type, &records))
            }
            // Transport aggregation is not implemented yet; the contract is
            // honored with the neutral report. Combined and other resources
            // have no per-record series of their own.
            ResourceType::Transport | ResourceType::Combined | ResourceType::Other => {
                Ok(AnalyticsReport::empty(resource_type))
            }
        }
    }

    fn compute_report(
        &self,
        resource_type: ResourceType,
        records: &[ConsumptionRecord],
    ) -> AnalyticsReport {
        if records.is_empty() {
            debug!(
                target: "app::analytics",
                resource = resource_type.as_str(),
                "no consumption history, returning neutral report"
            );
            return AnalyticsReport::empty(resource_type);
        }

        let buckets = group_bimonthly(records);
        let periods = summarize_periods(&buckets);

        let quantities: Vec<f64> = periods.iter().map(|p| p.total_quantity).collect();
        let averages = moving_average(&quantities);

        let current = quantities.last().copied().unwrap_or(0.0);
        let prior = if quantities.len() >= 2 {
            quantities[quantities.len() - 2]
        } else {
            0.0
        };
        let change_from_prior = percent_change(current, prior);

        let cost_total = periods.last().map(|p| p.total_cost).unwrap_or(0.0);
        let unit_cost = ratio(cost_total, current);
        let prior_unit_cost = if periods.len() >= 2 {
            let p = &periods[periods.len() - 2];
            ratio(p.total_cost, p.total_quantity)
        } else {
            0.0
        };
        let unit_cost_percent_change = percent_change(unit_cost, prior_unit_cost);
        let historical_average_unit_cost = average_unit_cost(&periods);

        let moving_avg = averages.last().copied().unwrap_or(0.0);
        let deviation_pct = percent_change(current, moving_avg);

        let anomaly_details = detect_anomalies(&periods, &averages);
        let anomaly_count = anomaly_details.len();

        let benchmark = benchmarks::for_resource(resource_type);
        let (state_avg, national_avg) = benchmark
            .map(|b| (b.state_avg, b.national_avg))
            .unwrap_or((0.0, 0.0));
        let co2_factor = benchmark.map(|b| b.co2_factor).unwrap_or(0.0);

        let co2_savings = ((moving_avg - current) * co2_factor).max(0.0);

        let trend = forecast_trend(&quantities);
        let forecast = current * (1.0 + trend / 100.0);

        let historical_series = periods
            .iter()
            .enumerate()
            .map(|(i, period)| HistoryPoint {
                period_start: period.period_start,
                total_quantity: period.total_quantity,
                total_cost: period.total_cost,
                moving_average: averages[i],
                is_anomaly: period.total_quantity > averages[i] * ANOMALY_THRESHOLD_RATIO,
            })
            .collect();

        AnalyticsReport {
            resource_type,
            current_period_value: current,
            percent_change_from_prior: change_from_prior,
            percent_change_status: percent_change_status(change_from_prior),
            cost_total,
            unit_cost,
            unit_cost_percent_change,
            historical_average_unit_cost,
            moving_average: moving_avg,
            moving_average_deviation_pct: deviation_pct,
            deviation_status: deviation_status(deviation_pct),
            benchmark_state_avg: state_avg,
            benchmark_national_avg: national_avg,
            efficiency_rating: efficiency_rating(current, state_avg, national_avg),
            anomaly_count,
            anomaly_details,
            anomaly_status: anomaly_status(anomaly_count),
            co2_savings,
            forecast_next_period: forecast,
            forecast_trend_pct: trend,
            historical_series,
            generated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
struct PeriodSummary {
    period_start: DateTime<Utc>,
    total_quantity: f64,
    total_cost: f64,
}

/// Two-calendar-month bucket key: January+February share a bucket, and the
/// year contributes six buckets so keys never collide across years.
fn bimonthly_period(timestamp: DateTime<Utc>) -> i64 {
    i64::from(timestamp.year()) * 6 + i64::from(timestamp.month0() / 2)
}

/// Group a chronologically sorted record list into bimonthly buckets.
/// Grouping keys strictly on equality with the preceding record's period, so
/// callers must pre-sort for buckets to be contiguous.
fn group_bimonthly(records: &[ConsumptionRecord]) -> Vec<Vec<&ConsumptionRecord>> {
    let mut buckets: Vec<Vec<&ConsumptionRecord>> = Vec::new();
    let mut previous_period: Option<i64> = None;

    for record in records {
        let period = bimonthly_period(record.recorded_at);
        match buckets.last_mut() {
            Some(bucket) if previous_period == Some(period) => bucket.push(record),
            _ => buckets.push(vec![record]),
        }
        previous_period = Some(period);
    }

    buckets
}

fn summarize_periods(buckets: &[Vec<&ConsumptionRecord>]) -> Vec<PeriodSummary> {
    buckets
        .iter()
        .map(|bucket| PeriodSummary {
            period_start: bucket[0].recorded_at,
            total_quantity: bucket.iter().map(|r| r.quantity).sum(),
            total_cost: bucket.iter().map(|r| r.cost).sum(),
        })
        .collect()
}

/// Trailing arithmetic mean over a window of up to three points, including
/// the current one.
fn moving_average(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let start = i.saturating_sub(MOVING_AVERAGE_WINDOW - 1);
            let window = &values[start..=i];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect()
}

fn detect_anomalies(periods: &[PeriodSummary], averages: &[f64]) -> Vec<AnomalyDetail> {
    periods
        .iter()
        .zip(averages)
        .filter(|(period, avg)| period.total_quantity > *avg * ANOMALY_THRESHOLD_RATIO)
        .map(|(period, avg)| AnomalyDetail {
            period_start: period.period_start,
            observed: period.total_quantity,
            expected: *avg,
            deviation_pct: percent_change(period.total_quantity, *avg),
        })
        .collect()
}

/// `(current - prior) / prior * 100`, with 0 as the neutral fallback when
/// the prior value is 0.
fn percent_change(current: f64, prior: f64) -> f64 {
    if prior == 0.0 {
        0.0
    } else {
        (current - prior) / prior * 100.0
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn average_unit_cost(periods: &[PeriodSummary]) -> f64 {
    let unit_costs: Vec<f64> = periods
        .iter()
        .filter(|p| p.total_quantity > 0.0)
        .map(|p| p.total_cost / p.total_quantity)
        .collect();

    if unit_costs.is_empty() {
        0.0
    } else {
        unit_costs.iter().sum::<f64>() / unit_costs.len() as f64
    }
}

/// Average of the two most recent period-over-period percent changes when at
/// least three periods exist; otherwise the single latest change.
fn forecast_trend(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let changes: Vec<f64> = values
        .windows(2)
        .map(|pair| percent_change(pair[1], pair[0]))
        .collect();

    if values.len() >= 3 {
        let last_two = &changes[changes.len() - 2..];
        (last_two[0] + last_two[1]) / 2.0
    } else {
        changes[changes.len() - 1]
    }
}

fn efficiency_rating(current: f64, state_avg: f64, national_avg: f64) -> EfficiencyRating {
    if current < state_avg {
        EfficiencyRating::MoreEfficient
    } else if current > national_avg {
        EfficiencyRating::LessEfficient
    } else {
        EfficiencyRating::Average
    }
}

// Consumption growth is undesirable: a drop is success, mild growth is a
// warning, anything past the limit is danger.
fn percent_change_status(change: f64) -> MetricStatus {
    if change <= 0.0 {
        MetricStatus::Success
    } else if change <= PERCENT_CHANGE_WARNING_LIMIT {
        MetricStatus::Warning
    } else {
        MetricStatus::Danger
    }
}

fn deviation_status(deviation_pct: f64) -> MetricStatus {
    if deviation_pct.abs() <= DEVIATION_WARNING_PCT {
        MetricStatus::Success
    } else {
        MetricStatus::Warning
    }
}

fn anomaly_status(count: usize) -> MetricStatus {
    if count == 0 {
        MetricStatus::Success
    } else if count <= ANOMALY_WARNING_MAX {
        MetricStatus::Warning
    } else {
        MetricStatus::Danger
    }
}
