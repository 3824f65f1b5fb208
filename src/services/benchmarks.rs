//! Fixed reference constants used for efficiency comparison and emission
//! estimates. Values are bimonthly household figures in the resource's own
//! unit (m3 for water, kWh for electricity).

use crate::models::consumption::ResourceType;

#[derive(Debug, Clone, Copy)]
pub struct ResourceBenchmark {
    /// Average bimonthly consumption for a household in the region.
    pub state_avg: f64,
    /// Average bimonthly consumption for a household nationwide.
    pub national_avg: f64,
    /// kg of CO2 per consumed unit.
    pub co2_factor: f64,
    /// Unit cost used when the record history carries no cost data.
    pub fallback_unit_cost: f64,
}

pub const WATER: ResourceBenchmark = ResourceBenchmark {
    state_avg: 22.0,
    national_avg: 25.0,
    co2_factor: 0.298,
    fallback_unit_cost: 1.9,
};

pub const ELECTRICITY: ResourceBenchmark = ResourceBenchmark {
    state_avg: 520.0,
    national_avg: 540.0,
    co2_factor: 0.25,
    fallback_unit_cost: 0.22,
};

/// kg of CO2 per kilometer driven by car.
pub const TRANSPORT_CO2_PER_KM: f64 = 0.192;

/// Estimated cost per kilometer avoided by sustainable transport, used by
/// the combined savings metric.
pub const SUSTAINABLE_KM_COST_RATE: f64 = 0.19;

pub fn for_resource(resource_type: ResourceType) -> Option<&'static ResourceBenchmark> {
    match resource_type {
        ResourceType::Water => Some(&WATER),
        ResourceType::Electricity => Some(&ELECTRICITY),
        ResourceType::Transport | ResourceType::Combined | ResourceType::Other => None,
    }
}
