use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::db::repositories::goal_repository::GoalRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::consumption::ResourceType;
use crate::models::goal::{EvaluationMode, Goal, SweepSummary};
use crate::services::goal_progress_service::GoalProgressService;
use crate::services::goal_state_evaluator;

/// Discovers eligible goals, dispatches them to the calculation strategies
/// and re-evaluates their status. Failures inside the bulk sweep are
/// isolated per goal; the batch always runs to the end.
pub struct AutomationService {
    db: DbPool,
    progress: Arc<GoalProgressService>,
}

impl AutomationService {
    pub fn new(db: DbPool, progress: Arc<GoalProgressService>) -> Self {
        Self { db, progress }
    }

    /// Recompute a single goal, owner-scoped. Manual goals are rejected;
    /// terminal goals come back unchanged. On failure nothing is persisted,
    /// so the stored goal keeps its last-known state.
    pub fn update_goal_progress(&self, goal_id: &str, owner_id: &str) -> AppResult<Goal> {
        let goal = self
            .db
            .with_connection(|conn| GoalRepository::find_by_id_and_owner(conn, goal_id, owner_id))?
            .ok_or_else(AppError::not_found)?;

        if goal.evaluation_mode == EvaluationMode::Manual {
            return Err(AppError::validation(
                "los objetivos manuales solo los actualiza su propietario",
            ));
        }

        if goal.status.is_terminal() {
            debug!(
                target: "app::automation",
                goal_id = %goal.id,
                status = goal.status.as_str(),
                "goal already terminal, skipping recompute"
            );
            return Ok(goal);
        }

        self.recompute(goal)
    }

    /// Recompute every automatic in-progress goal, optionally narrowed by
    /// owner and resource type. A failing goal is logged and skipped; it
    /// never aborts the remaining batch.
    pub fn run_sweep(
        &self,
        owner_id: Option<&str>,
        resource_type: Option<ResourceType>,
    ) -> AppResult<SweepSummary> {
        let goals = self.db.with_connection(|conn| {
            GoalRepository::list_automatic_in_progress(conn, owner_id, resource_type)
        })?;

        let total = goals.len();
        let mut updated = Vec::new();
        let mut skipped_goal_ids = Vec::new();

        for goal in goals {
            let goal_id = goal.id.clone();
            match self.recompute(goal) {
                Ok(goal) => updated.push(goal),
                Err(err) => {
                    warn!(
                        target: "app::automation",
                        goal_id = %goal_id,
                        error = %err,
                        "goal recompute failed, skipping"
                    );
                    skipped_goal_ids.push(goal_id);
                }
            }
        }

        info!(
            target: "app::automation",
            total,
            updated = updated.len(),
            skipped = skipped_goal_ids.len(),
            "automation sweep finished"
        );

        Ok(SweepSummary {
            updated_count: updated.len(),
            skipped_count: skipped_goal_ids.len(),
            updated,
            skipped_goal_ids,
        })
    }

    fn recompute(&self, goal: Goal) -> AppResult<Goal> {
        let mut updated = goal;
        self.progress.update_progress(&mut updated)?;

        let now = Utc::now();
        updated.status = goal_state_evaluator::evaluate(&updated, now);
        updated.updated_at = now;

        self.db
            .with_connection(|conn| GoalRepository::update(conn, &updated))?;

        debug!(
            target: "app::automation",
            goal_id = %updated.id,
            current_value = updated.current_value,
            status = updated.status.as_str(),
            "goal recomputed"
        );

        Ok(updated)
    }
}
