//! Single shared classification of metric kinds into reduction-oriented
//! (lower is better) and increase-oriented (higher is better) semantics.
//! Calculation, state evaluation, progress mapping and recommendations all
//! consult this function; nothing else re-derives the classification.

use crate::models::consumption::ResourceType;
use crate::models::goal::metric_kinds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricDirection {
    Reduction,
    Increase,
}

impl MetricDirection {
    pub fn is_reduction(&self) -> bool {
        matches!(self, MetricDirection::Reduction)
    }
}

pub fn direction(resource_type: ResourceType, metric_kind: &str) -> MetricDirection {
    match resource_type {
        ResourceType::Water | ResourceType::Electricity => match metric_kind {
            // "benchmark" carries maintain-below semantics and is treated as
            // non-reduction for progress math.
            metric_kinds::BENCHMARK => MetricDirection::Increase,
            _ => MetricDirection::Reduction,
        },
        ResourceType::Transport => match metric_kind {
            metric_kinds::PORCENTAJE_SOSTENIBLE
            | metric_kinds::KM_BICICLETA
            | metric_kinds::USO_BICICLETA => MetricDirection::Increase,
            metric_kinds::REDUCCION_COMBUSTION | metric_kinds::EMISIONES | metric_kinds::COSTO => {
                MetricDirection::Reduction
            }
            // Transport defaults to reduction, unlike every other resource.
            _ => MetricDirection::Reduction,
        },
        ResourceType::Combined | ResourceType::Other => MetricDirection::Increase,
    }
}
