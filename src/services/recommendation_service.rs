use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, warn};

use crate::db::repositories::consumption_repository::ConsumptionRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::consumption::ResourceType;
use crate::models::goal::metric_kinds;
use crate::models::recommendation::GoalRecommendation;
use crate::models::user::User;
use crate::services::analytics_service::AnalyticsService;
use crate::services::benchmarks;
use crate::services::goal_progress_service::{
    benchmark_score, savings_estimate, sum_sustainable_km, transport_metric_value,
};

const REDUCTION_LIGHT: f64 = 0.90;
const REDUCTION_AMBITIOUS: f64 = 0.85;
const RECENT_WINDOW_DAYS: i64 = 30;
// Composing across resources earns a small cross-resource bonus.
const CROSS_RESOURCE_BONUS: f64 = 1.05;

/// Proposes 2-4 target suggestions per resource from historical trends,
/// falling back to a fixed default list whenever history is insufficient.
/// Never fails the caller.
pub struct RecommendationService {
    db: DbPool,
    analytics: Arc<AnalyticsService>,
}

impl RecommendationService {
    pub fn new(db: DbPool, analytics: Arc<AnalyticsService>) -> Self {
        Self { db, analytics }
    }

    pub fn recommendations(
        &self,
        resource_type: ResourceType,
        user: &User,
    ) -> Vec<GoalRecommendation> {
        match resource_type {
            ResourceType::Water => self.consumption_recommendations(
                ResourceType::Water,
                user,
                "agua",
                &benchmarks::WATER,
            ),
            ResourceType::Electricity => self.consumption_recommendations(
                ResourceType::Electricity,
                user,
                "electricidad",
                &benchmarks::ELECTRICITY,
            ),
            ResourceType::Transport => match self.transport_recommendations(user) {
                Ok(list) => list,
                Err(err) => {
                    warn!(
                        target: "app::recommendations",
                        error = %err,
                        "transport history unavailable, falling back to defaults"
                    );
                    default_transport_recommendations()
                }
            },
            ResourceType::Combined => match self.combined_recommendations(user) {
                Ok(list) => list,
                Err(err) => {
                    warn!(
                        target: "app::recommendations",
                        error = %err,
                        "combined estimate unavailable, falling back to defaults"
                    );
                    default_combined_recommendations()
                }
            },
            ResourceType::Other => {
                debug!(target: "app::recommendations", "no generator for resource type 'other'");
                Vec::new()
            }
        }
    }

    fn consumption_recommendations(
        &self,
        resource_type: ResourceType,
        user: &User,
        label: &str,
        benchmark: &benchmarks::ResourceBenchmark,
    ) -> Vec<GoalRecommendation> {
        let unit = resource_type.default_unit();
        let report = self.analytics.report(resource_type, &user.id);

        if report.is_empty() {
            return default_consumption_recommendations(label, unit, benchmark);
        }

        let current = report.current_period_value;
        let mut list = vec![
            GoalRecommendation {
                description: format!("Reduce un 10% tu consumo bimestral de {label}"),
                suggested_value: round2(current * REDUCTION_LIGHT),
                unit: unit.to_string(),
                metric_kind: metric_kinds::CONSUMO_TOTAL.to_string(),
            },
            GoalRecommendation {
                description: format!("Reduce un 15% tu consumo bimestral de {label}"),
                suggested_value: round2(current * REDUCTION_AMBITIOUS),
                unit: unit.to_string(),
                metric_kind: metric_kinds::CONSUMO_TOTAL.to_string(),
            },
        ];

        if current > benchmark.state_avg {
            list.push(GoalRecommendation {
                description: format!("Iguala la media regional de consumo de {label}"),
                suggested_value: benchmark.state_avg,
                unit: unit.to_string(),
                metric_kind: metric_kinds::CONSUMO_TOTAL.to_string(),
            });
        } else {
            // Already under the regional average: propose holding below 90%
            // of the national benchmark instead.
            list.push(GoalRecommendation {
                description: format!("Mantén tu consumo de {label} por debajo del 90% de la media nacional"),
                suggested_value: 90.0,
                unit: "%".to_string(),
                metric_kind: metric_kinds::BENCHMARK.to_string(),
            });
        }

        list
    }

    fn transport_recommendations(&self, user: &User) -> AppResult<Vec<GoalRecommendation>> {
        let now = Utc::now();
        let records = self
            .db
            .with_connection(|conn| {
                ConsumptionRepository::list_for_user_between(
                    conn,
                    ResourceType::Transport,
                    &user.id,
                    now - Duration::days(RECENT_WINDOW_DAYS),
                    now,
                )
            })
            .map_err(|err| AppError::upstream("registros de transporte", err.to_string()))?;

        if records.is_empty() {
            return Ok(default_transport_recommendations());
        }

        let sustainable_pct =
            transport_metric_value(&records, metric_kinds::PORCENTAJE_SOSTENIBLE);
        let car_km = transport_metric_value(&records, metric_kinds::REDUCCION_COMBUSTION);
        let bike_km = transport_metric_value(&records, metric_kinds::KM_BICICLETA);

        let mut list = vec![GoalRecommendation {
            description: "Aumenta un 10% tus desplazamientos sostenibles".to_string(),
            suggested_value: round2((sustainable_pct + 10.0).min(100.0)),
            unit: "%".to_string(),
            metric_kind: metric_kinds::PORCENTAJE_SOSTENIBLE.to_string(),
        }];

        if car_km > 0.0 {
            list.push(GoalRecommendation {
                description: "Reduce un 15% los kilómetros en coche".to_string(),
                suggested_value: round2(car_km * REDUCTION_AMBITIOUS),
                unit: "km".to_string(),
                metric_kind: metric_kinds::REDUCCION_COMBUSTION.to_string(),
            });
        }

        list.push(GoalRecommendation {
            description: "Suma más kilómetros en bicicleta".to_string(),
            suggested_value: if bike_km > 0.0 {
                round2(bike_km * 1.2)
            } else {
                15.0
            },
            unit: "km".to_string(),
            metric_kind: metric_kinds::KM_BICICLETA.to_string(),
        });

        Ok(list)
    }

    fn combined_recommendations(&self, user: &User) -> AppResult<Vec<GoalRecommendation>> {
        let water = self.analytics.report(ResourceType::Water, &user.id);
        let electricity = self.analytics.report(ResourceType::Electricity, &user.id);

        let now = Utc::now();
        let transport_records = self
            .db
            .with_connection(|conn| {
                ConsumptionRepository::list_for_user_between(
                    conn,
                    ResourceType::Transport,
                    &user.id,
                    now - Duration::days(RECENT_WINDOW_DAYS),
                    now,
                )
            })
            .map_err(|err| AppError::upstream("registros de transporte", err.to_string()))?;

        if water.is_empty() && electricity.is_empty() && transport_records.is_empty() {
            return Ok(default_combined_recommendations());
        }

        let water_savings = savings_estimate(
            water.moving_average,
            water.current_period_value,
            water.historical_average_unit_cost,
            benchmarks::WATER.fallback_unit_cost,
        );
        let electricity_savings = savings_estimate(
            electricity.moving_average,
            electricity.current_period_value,
            electricity.historical_average_unit_cost,
            benchmarks::ELECTRICITY.fallback_unit_cost,
        );
        let transport_savings =
            sum_sustainable_km(&transport_records) * benchmarks::SUSTAINABLE_KM_COST_RATE;

        let potential =
            (water_savings + electricity_savings + transport_savings) * CROSS_RESOURCE_BONUS;

        let sustainability = (benchmark_score(
            water.current_period_value,
            benchmarks::WATER.national_avg,
        ) + benchmark_score(
            electricity.current_period_value,
            benchmarks::ELECTRICITY.national_avg,
        )) / 2.0;

        Ok(vec![
            GoalRecommendation {
                description: "Ahorra en la factura combinando agua, luz y transporte".to_string(),
                suggested_value: if potential > 0.0 { round2(potential) } else { 15.0 },
                unit: "EUR".to_string(),
                metric_kind: metric_kinds::AHORRO_TOTAL.to_string(),
            },
            GoalRecommendation {
                description: "Sube tu índice de sostenibilidad del hogar".to_string(),
                suggested_value: round2((sustainability + 10.0).min(100.0)),
                unit: "%".to_string(),
                metric_kind: metric_kinds::SOSTENIBILIDAD.to_string(),
            },
            GoalRecommendation {
                description: "Consume un 15% por debajo de la media nacional".to_string(),
                suggested_value: 15.0,
                unit: "%".to_string(),
                metric_kind: metric_kinds::REDUCCION_TOTAL.to_string(),
            },
        ])
    }
}

fn default_consumption_recommendations(
    label: &str,
    unit: &str,
    benchmark: &benchmarks::ResourceBenchmark,
) -> Vec<GoalRecommendation> {
    vec![
        GoalRecommendation {
            description: format!("Mantén tu consumo de {label} bajo la media regional"),
            suggested_value: benchmark.state_avg,
            unit: unit.to_string(),
            metric_kind: metric_kinds::CONSUMO_TOTAL.to_string(),
        },
        GoalRecommendation {
            description: format!("Mantén tu consumo de {label} bajo la media nacional"),
            suggested_value: 100.0,
            unit: "%".to_string(),
            metric_kind: metric_kinds::BENCHMARK.to_string(),
        },
    ]
}

fn default_transport_recommendations() -> Vec<GoalRecommendation> {
    vec![
        GoalRecommendation {
            description: "Alcanza un 40% de desplazamientos sostenibles".to_string(),
            suggested_value: 40.0,
            unit: "%".to_string(),
            metric_kind: metric_kinds::PORCENTAJE_SOSTENIBLE.to_string(),
        },
        GoalRecommendation {
            description: "Limita los kilómetros mensuales en coche".to_string(),
            suggested_value: 100.0,
            unit: "km".to_string(),
            metric_kind: metric_kinds::REDUCCION_COMBUSTION.to_string(),
        },
    ]
}

fn default_combined_recommendations() -> Vec<GoalRecommendation> {
    vec![
        GoalRecommendation {
            description: "Ahorra en la factura combinando agua, luz y transporte".to_string(),
            suggested_value: 15.0,
            unit: "EUR".to_string(),
            metric_kind: metric_kinds::AHORRO_TOTAL.to_string(),
        },
        GoalRecommendation {
            description: "Sube tu índice de sostenibilidad del hogar".to_string(),
            suggested_value: 60.0,
            unit: "%".to_string(),
            metric_kind: metric_kinds::SOSTENIBILIDAD.to_string(),
        },
    ]
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
