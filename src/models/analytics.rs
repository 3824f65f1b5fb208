use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::consumption::ResourceType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricStatus {
    Success,
    Warning,
    Danger,
    Neutral,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyRating {
    MoreEfficient,
    LessEfficient,
    Average,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyDetail {
    /// Timestamp of the first record in the anomalous period.
    pub period_start: DateTime<Utc>,
    pub observed: f64,
    pub expected: f64,
    pub deviation_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub period_start: DateTime<Utc>,
    pub total_quantity: f64,
    pub total_cost: f64,
    pub moving_average: f64,
    pub is_anomaly: bool,
}

/// Full derived metrics for one resource. Never persisted; recomputed on
/// demand from the record history. Every ratio field falls back to 0 when
/// its denominator is 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub resource_type: ResourceType,
    pub current_period_value: f64,
    pub percent_change_from_prior: f64,
    pub percent_change_status: MetricStatus,
    pub cost_total: f64,
    pub unit_cost: f64,
    pub unit_cost_percent_change: f64,
    pub historical_average_unit_cost: f64,
    pub moving_average: f64,
    pub moving_average_deviation_pct: f64,
    pub deviation_status: MetricStatus,
    pub benchmark_state_avg: f64,
    pub benchmark_national_avg: f64,
    pub efficiency_rating: EfficiencyRating,
    pub anomaly_count: usize,
    pub anomaly_details: Vec<AnomalyDetail>,
    pub anomaly_status: MetricStatus,
    pub co2_savings: f64,
    pub forecast_next_period: f64,
    pub forecast_trend_pct: f64,
    pub historical_series: Vec<HistoryPoint>,
    pub generated_at: DateTime<Utc>,
}

impl AnalyticsReport {
    /// The defined neutral report: returned whenever history is empty or a
    /// resource has no analytics implementation. Never an error.
    pub fn empty(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            current_period_value: 0.0,
            percent_change_from_prior: 0.0,
            percent_change_status: MetricStatus::Neutral,
            cost_total: 0.0,
            unit_cost: 0.0,
            unit_cost_percent_change: 0.0,
            historical_average_unit_cost: 0.0,
            moving_average: 0.0,
            moving_average_deviation_pct: 0.0,
            deviation_status: MetricStatus::Neutral,
            benchmark_state_avg: 0.0,
            benchmark_national_avg: 0.0,
            efficiency_rating: EfficiencyRating::Average,
            anomaly_count: 0,
            anomaly_details: Vec::new(),
            anomaly_status: MetricStatus::Neutral,
            co2_savings: 0.0,
            forecast_next_period: 0.0,
            forecast_trend_pct: 0.0,
            historical_series: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.historical_series.is_empty()
    }
}
