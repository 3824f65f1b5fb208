//! Drives a goal through the in_progress -> completed/failed state machine.
//! Both terminal states are final; only this module advances `status`.

use chrono::{DateTime, Utc};

use crate::models::consumption::ResourceType;
use crate::models::goal::{Goal, GoalStatus};
use crate::services::metric_policy::{self, MetricDirection};

// Graduated early-failure ladder for non-transport reduction goals: the
// further the value sits above target, the earlier the goal is declared lost.
const EXCESS_FATAL: f64 = 0.5;
const EXCESS_HIGH: f64 = 0.2;
const EXCESS_HIGH_ELAPSED: f64 = 0.25;
const EXCESS_MODERATE: f64 = 0.1;
const EXCESS_MODERATE_ELAPSED: f64 = 0.5;

/// Decide the status a goal should be in, given its up-to-date
/// `current_value`. Terminal goals are returned unchanged.
pub fn evaluate(goal: &Goal, now: DateTime<Utc>) -> GoalStatus {
    if goal.status.is_terminal() {
        return goal.status;
    }

    let direction = metric_policy::direction(goal.resource_type, &goal.metric_kind);
    let deadline_passed = now > goal.end_date;

    match direction {
        MetricDirection::Increase => {
            if goal.current_value >= goal.target_value {
                GoalStatus::Completed
            } else if deadline_passed {
                GoalStatus::Failed
            } else {
                GoalStatus::InProgress
            }
        }
        MetricDirection::Reduction if goal.resource_type == ResourceType::Transport => {
            // Transport reduction goals are caps: breaching the cap is fatal
            // at any point, and success only exists once the window closes.
            if goal.current_value >= goal.target_value {
                GoalStatus::Failed
            } else if deadline_passed {
                GoalStatus::Completed
            } else {
                GoalStatus::InProgress
            }
        }
        MetricDirection::Reduction => {
            if goal.current_value <= goal.target_value {
                return GoalStatus::Completed;
            }

            let excess_ratio = if goal.target_value > 0.0 {
                (goal.current_value - goal.target_value) / goal.target_value
            } else {
                0.0
            };
            let elapsed = elapsed_fraction(goal, now);

            let lost = excess_ratio > EXCESS_FATAL
                || (excess_ratio > EXCESS_HIGH && elapsed >= EXCESS_HIGH_ELAPSED)
                || (excess_ratio > EXCESS_MODERATE && elapsed >= EXCESS_MODERATE_ELAPSED)
                || deadline_passed;

            if lost {
                GoalStatus::Failed
            } else {
                GoalStatus::InProgress
            }
        }
    }
}

fn elapsed_fraction(goal: &Goal, now: DateTime<Utc>) -> f64 {
    let total = (goal.end_date - goal.start_date).num_seconds();
    if total <= 0 {
        return 1.0;
    }
    let elapsed = (now - goal.start_date).num_seconds();
    (elapsed as f64 / total as f64).clamp(0.0, 1.0)
}
