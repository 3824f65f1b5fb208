use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::consumption::ResourceType;

/// Metric kind tags as the product uses them. Free-form strings on the goal
/// itself; these constants cover the recognized set.
pub mod metric_kinds {
    pub const CONSUMO_TOTAL: &str = "consumo_total";
    pub const BENCHMARK: &str = "benchmark";
    pub const EMISIONES: &str = "emisiones";
    pub const REDUCCION_COMBUSTION: &str = "reduccion_combustion";
    pub const PORCENTAJE_SOSTENIBLE: &str = "porcentaje_sostenible";
    pub const KM_BICICLETA: &str = "km_bicicleta";
    pub const USO_BICICLETA: &str = "uso_bicicleta";
    pub const COSTO: &str = "costo";
    pub const HUELLA_CARBONO: &str = "huella_carbono";
    pub const AHORRO_TOTAL: &str = "ahorro_total";
    pub const SOSTENIBILIDAD: &str = "sostenibilidad";
    pub const REDUCCION_TOTAL: &str = "reduccion_total";
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    InProgress,
    Completed,
    Failed,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::InProgress => "in_progress",
            GoalStatus::Completed => "completed",
            GoalStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "in_progress" => Ok(GoalStatus::InProgress),
            "completed" => Ok(GoalStatus::Completed),
            "failed" => Ok(GoalStatus::Failed),
            _ => Err(format!("Invalid goal status: {}", s)),
        }
    }

    /// Completed and failed goals are never recomputed again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GoalStatus::Completed | GoalStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    Automatic,
    Manual,
}

impl EvaluationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationMode::Automatic => "automatic",
            EvaluationMode::Manual => "manual",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "automatic" => Ok(EvaluationMode::Automatic),
            "manual" => Ok(EvaluationMode::Manual),
            _ => Err(format!("Invalid evaluation mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub resource_type: ResourceType,
    pub metric_kind: String,
    pub target_value: f64,
    /// Absent until seeded. Seeding happens once, at creation or on the
    /// first automatic recompute that finds it unset or non-positive.
    pub initial_value: Option<f64>,
    pub current_value: f64,
    pub unit: String,
    pub evaluation_mode: EvaluationMode,
    pub status: GoalStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalRequest {
    pub title: String,
    pub description: Option<String>,
    pub resource_type: ResourceType,
    pub metric_kind: String,
    pub target_value: f64,
    pub unit: Option<String>,
    pub evaluation_mode: EvaluationMode,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGoalRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_value: Option<f64>,
    pub end_date: Option<DateTime<Utc>>,
    /// Direct progress edits; only honored for manual goals.
    pub current_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalWithProgress {
    #[serde(flatten)]
    pub goal: Goal,
    pub progress_percentage: f64,
    pub days_remaining: i64,
    pub is_on_track: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    pub updated: Vec<Goal>,
    pub updated_count: usize,
    pub skipped_count: usize,
    pub skipped_goal_ids: Vec<String>,
}
