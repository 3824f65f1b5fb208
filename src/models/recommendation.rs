use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalRecommendation {
    pub description: String,
    pub suggested_value: f64,
    pub unit: String,
    pub metric_kind: String,
}
