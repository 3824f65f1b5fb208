use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Water,
    Electricity,
    Transport,
    Combined,
    Other,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Water => "water",
            ResourceType::Electricity => "electricity",
            ResourceType::Transport => "transport",
            ResourceType::Combined => "combined",
            ResourceType::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "water" => Ok(ResourceType::Water),
            "electricity" => Ok(ResourceType::Electricity),
            "transport" => Ok(ResourceType::Transport),
            "combined" => Ok(ResourceType::Combined),
            "other" => Ok(ResourceType::Other),
            _ => Err(format!("Invalid resource type: {}", s)),
        }
    }

    /// Default display unit for records of this resource.
    pub fn default_unit(&self) -> &'static str {
        match self {
            ResourceType::Water => "m3",
            ResourceType::Electricity => "kWh",
            ResourceType::Transport => "km",
            ResourceType::Combined | ResourceType::Other => "",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Car,
    Bus,
    Bicycle,
    Walk,
    Other,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Car => "car",
            TransportMode::Bus => "bus",
            TransportMode::Bicycle => "bicycle",
            TransportMode::Walk => "walk",
            TransportMode::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "car" => Ok(TransportMode::Car),
            "bus" => Ok(TransportMode::Bus),
            "bicycle" => Ok(TransportMode::Bicycle),
            "walk" => Ok(TransportMode::Walk),
            "other" => Ok(TransportMode::Other),
            _ => Err(format!("Invalid transport mode: {}", s)),
        }
    }

    pub fn is_sustainable(&self) -> bool {
        matches!(
            self,
            TransportMode::Bus | TransportMode::Bicycle | TransportMode::Walk
        )
    }
}

/// A single time-stamped consumption entry. Owned by the persistence
/// collaborator; the core only reads ordered slices of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionRecord {
    pub id: String,
    pub user_id: String,
    pub resource_type: ResourceType,
    pub recorded_at: DateTime<Utc>,
    /// m3 for water, kWh for electricity, km for transport.
    pub quantity: f64,
    pub cost: f64,
    /// Only meaningful for transport records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_mode: Option<TransportMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionRecordInsert {
    pub user_id: String,
    pub resource_type: ResourceType,
    pub recorded_at: DateTime<Utc>,
    pub quantity: f64,
    pub cost: f64,
    pub transport_mode: Option<TransportMode>,
    pub notes: Option<String>,
}
