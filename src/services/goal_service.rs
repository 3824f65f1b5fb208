use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::db::repositories::goal_repository::GoalRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::consumption::ResourceType;
use crate::models::goal::{
    CreateGoalRequest, EvaluationMode, Goal, GoalStatus, GoalWithProgress, UpdateGoalRequest,
};
use crate::models::user::User;
use crate::services::goal_progress_service::GoalProgressService;
use crate::services::goal_state_evaluator;
use crate::services::metric_policy::{self, MetricDirection};

// Display slack: a goal still counts as on track while its progress sits
// within 20% of the elapsed-time expectation.
const ON_TRACK_SLACK: f64 = 0.8;

pub struct GoalService {
    db: DbPool,
    progress: Arc<GoalProgressService>,
}

impl GoalService {
    pub fn new(db: DbPool, progress: Arc<GoalProgressService>) -> Self {
        Self { db, progress }
    }

    pub fn create_goal(&self, owner: &User, request: CreateGoalRequest) -> AppResult<Goal> {
        let now = Utc::now();
        let start_date = request.start_date.unwrap_or(now);

        if request.title.trim().is_empty() {
            return Err(AppError::validation("el título no puede estar vacío"));
        }
        if request.metric_kind.trim().is_empty() {
            return Err(AppError::validation("la métrica no puede estar vacía"));
        }
        if request.end_date <= start_date {
            return Err(AppError::validation(
                "la fecha de fin debe ser posterior a la de inicio",
            ));
        }

        let direction = metric_policy::direction(request.resource_type, &request.metric_kind);
        if direction.is_reduction() && request.target_value <= 0.0 {
            return Err(AppError::validation_with_details(
                "un objetivo de reducción requiere un valor objetivo positivo",
                serde_json::json!({ "targetValue": request.target_value }),
            ));
        }

        let unit = request
            .unit
            .clone()
            .unwrap_or_else(|| request.resource_type.default_unit().to_string());

        let (initial_value, current_value) = match request.evaluation_mode {
            EvaluationMode::Automatic => {
                if request.resource_type == ResourceType::Other {
                    return Err(AppError::validation(
                        "la evaluación automática no está disponible para este tipo de recurso",
                    ));
                }
                let current = self.progress.current_value(
                    &owner.id,
                    request.resource_type,
                    &request.metric_kind,
                )?;
                let initial = self.progress.initial_value(
                    &owner.id,
                    request.resource_type,
                    &request.metric_kind,
                    request.target_value,
                )?;
                (Some(initial), current)
            }
            EvaluationMode::Manual => (None, 0.0),
        };

        let goal = Goal {
            id: Uuid::new_v4().to_string(),
            owner_id: owner.id.clone(),
            title: request.title.trim().to_string(),
            description: request.description,
            resource_type: request.resource_type,
            metric_kind: request.metric_kind,
            target_value: request.target_value,
            initial_value,
            current_value,
            unit,
            evaluation_mode: request.evaluation_mode,
            status: GoalStatus::InProgress,
            start_date,
            end_date: request.end_date,
            created_at: now,
            updated_at: now,
        };

        self.db.with_connection(|conn| GoalRepository::insert(conn, &goal))?;

        info!(
            target: "app::goals",
            goal_id = %goal.id,
            resource = goal.resource_type.as_str(),
            metric = %goal.metric_kind,
            mode = goal.evaluation_mode.as_str(),
            "goal created"
        );

        Ok(goal)
    }

    pub fn get_goal(&self, id: &str, owner_id: &str) -> AppResult<Goal> {
        self.db
            .with_connection(|conn| GoalRepository::find_by_id_and_owner(conn, id, owner_id))?
            .ok_or_else(AppError::not_found)
    }

    pub fn list_goals(
        &self,
        owner_id: &str,
        status: Option<GoalStatus>,
        resource_type: Option<ResourceType>,
    ) -> AppResult<Vec<Goal>> {
        self.db
            .with_connection(|conn| GoalRepository::list_by_owner(conn, owner_id, status, resource_type))
    }

    pub fn update_goal(
        &self,
        id: &str,
        owner_id: &str,
        request: UpdateGoalRequest,
    ) -> AppResult<Goal> {
        let mut goal = self.get_goal(id, owner_id)?;

        if goal.status.is_terminal() {
            return Err(AppError::validation(
                "un objetivo finalizado ya no se puede modificar",
            ));
        }

        if let Some(title) = request.title {
            if title.trim().is_empty() {
                return Err(AppError::validation("el título no puede estar vacío"));
            }
            goal.title = title.trim().to_string();
        }
        if let Some(description) = request.description {
            goal.description = Some(description);
        }
        if let Some(target_value) = request.target_value {
            let direction = metric_policy::direction(goal.resource_type, &goal.metric_kind);
            if direction.is_reduction() && target_value <= 0.0 {
                return Err(AppError::validation(
                    "un objetivo de reducción requiere un valor objetivo positivo",
                ));
            }
            goal.target_value = target_value;
        }
        if let Some(end_date) = request.end_date {
            if end_date <= goal.start_date {
                return Err(AppError::validation(
                    "la fecha de fin debe ser posterior a la de inicio",
                ));
            }
            goal.end_date = end_date;
        }

        if let Some(current_value) = request.current_value {
            if goal.evaluation_mode != EvaluationMode::Manual {
                return Err(AppError::validation(
                    "el progreso de un objetivo automático se calcula solo",
                ));
            }
            goal.current_value = current_value;
        }

        // Any edit can change the outcome; the evaluator is the only thing
        // allowed to advance status.
        let now = Utc::now();
        goal.status = goal_state_evaluator::evaluate(&goal, now);
        goal.updated_at = now;

        self.db.with_connection(|conn| GoalRepository::update(conn, &goal))?;

        Ok(goal)
    }

    pub fn delete_goal(&self, id: &str, owner_id: &str) -> AppResult<()> {
        self.db
            .with_connection(|conn| GoalRepository::delete(conn, id, owner_id))?;
        info!(target: "app::goals", goal_id = id, "goal deleted");
        Ok(())
    }

    pub fn get_goal_with_progress(&self, id: &str, owner_id: &str) -> AppResult<GoalWithProgress> {
        let goal = self.get_goal(id, owner_id)?;
        let now = Utc::now();

        let progress_percentage = progress_percentage(&goal);
        let days_remaining = (goal.end_date - now).num_days();
        let is_on_track = match goal.status {
            GoalStatus::Completed => true,
            GoalStatus::Failed => false,
            GoalStatus::InProgress => {
                let total = (goal.end_date - goal.start_date).num_seconds();
                if total <= 0 {
                    progress_percentage >= 100.0
                } else {
                    let elapsed = (now - goal.start_date).num_seconds() as f64 / total as f64;
                    let expected = elapsed.clamp(0.0, 1.0) * 100.0;
                    progress_percentage >= expected * ON_TRACK_SLACK
                }
            }
        };

        Ok(GoalWithProgress {
            goal,
            progress_percentage,
            days_remaining,
            is_on_track,
        })
    }
}

/// Display progress through the shared metric policy, clamped to [0, 100].
fn progress_percentage(goal: &Goal) -> f64 {
    let direction = metric_policy::direction(goal.resource_type, &goal.metric_kind);
    match direction {
        MetricDirection::Reduction => {
            let initial = goal.initial_value.unwrap_or(0.0);
            let span = initial - goal.target_value;
            if span > 0.0 {
                ((initial - goal.current_value) / span * 100.0).clamp(0.0, 100.0)
            } else if goal.current_value <= goal.target_value {
                100.0
            } else {
                0.0
            }
        }
        MetricDirection::Increase => {
            if goal.target_value > 0.0 {
                (goal.current_value / goal.target_value * 100.0).clamp(0.0, 100.0)
            } else {
                100.0
            }
        }
    }
}
