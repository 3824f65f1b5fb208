use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ecohogar_core::db::repositories::consumption_repository::ConsumptionRepository;
use ecohogar_core::db::repositories::user_repository::UserRepository;
use ecohogar_core::db::DbPool;
use ecohogar_core::models::consumption::{ConsumptionRecordInsert, ResourceType};
use ecohogar_core::models::goal::{
    CreateGoalRequest, EvaluationMode, GoalStatus, UpdateGoalRequest,
};
use ecohogar_core::models::user::User;
use ecohogar_core::services::analytics_service::AnalyticsService;
use ecohogar_core::services::goal_progress_service::GoalProgressService;
use ecohogar_core::services::goal_service::GoalService;
use tempfile::tempdir;

fn setup() -> (tempfile::TempDir, DbPool, User, GoalService) {
    let dir = tempdir().expect("temp dir");
    let db_path = dir.path().join("goals.sqlite");
    let pool = DbPool::new(&db_path).expect("db pool");
    let user = pool
        .with_connection(|conn| UserRepository::create(conn, "jorge"))
        .expect("create user");

    let analytics = Arc::new(AnalyticsService::new(pool.clone()));
    let progress = Arc::new(GoalProgressService::new(pool.clone(), analytics));
    let goals = GoalService::new(pool.clone(), progress);

    (dir, pool, user, goals)
}

fn seed_water(pool: &DbPool, user: &User, at: DateTime<Utc>, quantity: f64) {
    pool.with_connection(|conn| {
        ConsumptionRepository::insert(
            conn,
            &ConsumptionRecordInsert {
                user_id: user.id.clone(),
                resource_type: ResourceType::Water,
                recorded_at: at,
                quantity,
                cost: quantity * 2.0,
                transport_mode: None,
                notes: None,
            },
        )
    })
    .expect("insert record");
}

fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0)
        .single()
        .expect("valid date")
}

fn water_goal_request(target: f64) -> CreateGoalRequest {
    CreateGoalRequest {
        title: "Gastar menos agua".into(),
        description: Some("Reto del trimestre".into()),
        resource_type: ResourceType::Water,
        metric_kind: "consumo_total".into(),
        target_value: target,
        unit: None,
        evaluation_mode: EvaluationMode::Automatic,
        start_date: None,
        end_date: Utc::now() + Duration::days(90),
    }
}

#[test]
fn automatic_goal_is_seeded_from_history_at_creation() {
    let (_dir, pool, user, goals) = setup();

    seed_water(&pool, &user, date(2024, 1, 10), 18.0);
    seed_water(&pool, &user, date(2024, 3, 12), 20.0);

    let goal = goals
        .create_goal(&user, water_goal_request(12.0))
        .expect("create goal");

    // current tracks the most recent reading
    assert_eq!(goal.current_value, 20.0);
    // baseline: max(20 * 1.05, 12 * 1.2) = 21, above the target
    let initial = goal.initial_value.expect("seeded initial value");
    assert!((initial - 21.0).abs() < 1e-9);
    assert_eq!(goal.status, GoalStatus::InProgress);
    assert_eq!(goal.unit, "m3");

    let with_progress = goals
        .get_goal_with_progress(&goal.id, &user.id)
        .expect("goal with progress");
    assert!(with_progress.progress_percentage >= 0.0);
    assert!(with_progress.days_remaining > 80);

    // the device profile resolves to the goal's owner
    let resolved = pool
        .with_connection(|conn| UserRepository::current(conn))
        .expect("current user lookup")
        .expect("stored profile");
    assert_eq!(resolved.id, user.id);
}

#[test]
fn foreign_goals_are_indistinguishable_from_missing_ones() {
    let (_dir, pool, user, goals) = setup();
    seed_water(&pool, &user, date(2024, 2, 1), 15.0);

    let goal = goals
        .create_goal(&user, water_goal_request(10.0))
        .expect("create goal");

    let stranger = pool
        .with_connection(|conn| UserRepository::create(conn, "intrusa"))
        .expect("create second user");

    let err = goals.get_goal(&goal.id, &stranger.id).expect_err("not found");
    assert!(err.is_not_found());

    let err = goals
        .delete_goal(&goal.id, &stranger.id)
        .expect_err("not found on delete");
    assert!(err.is_not_found());

    // the owner still sees it
    assert!(goals.get_goal(&goal.id, &user.id).is_ok());
}

#[test]
fn creation_validates_title_dates_and_reduction_target() {
    let (_dir, _pool, user, goals) = setup();

    let mut request = water_goal_request(12.0);
    request.title = "   ".into();
    assert!(goals.create_goal(&user, request).is_err());

    let mut request = water_goal_request(0.0);
    request.title = "Reducir".into();
    // reduction goals need a strictly positive target
    assert!(goals.create_goal(&user, request).is_err());

    let mut request = water_goal_request(12.0);
    request.end_date = Utc::now() - Duration::days(1);
    assert!(goals.create_goal(&user, request).is_err());
}

#[test]
fn manual_goals_accept_direct_progress_and_finish_through_the_evaluator() {
    let (_dir, _pool, user, goals) = setup();

    let goal = goals
        .create_goal(
            &user,
            CreateGoalRequest {
                title: "Hogar sostenible".into(),
                description: None,
                resource_type: ResourceType::Combined,
                metric_kind: "sostenibilidad".into(),
                target_value: 40.0,
                unit: Some("%".into()),
                evaluation_mode: EvaluationMode::Manual,
                start_date: None,
                end_date: Utc::now() + Duration::days(30),
            },
        )
        .expect("create manual goal");

    assert_eq!(goal.current_value, 0.0);
    assert_eq!(goal.initial_value, None);

    let updated = goals
        .update_goal(
            &goal.id,
            &user.id,
            UpdateGoalRequest {
                title: None,
                description: None,
                target_value: None,
                end_date: None,
                current_value: Some(45.0),
            },
        )
        .expect("manual progress update");

    // increase metric at or past target completes immediately
    assert_eq!(updated.status, GoalStatus::Completed);

    // terminal goals are read-only from here on
    let err = goals
        .update_goal(
            &goal.id,
            &user.id,
            UpdateGoalRequest {
                title: Some("Otro título".into()),
                description: None,
                target_value: None,
                end_date: None,
                current_value: None,
            },
        )
        .expect_err("terminal goals reject edits");
    assert!(!err.is_not_found());
}

#[test]
fn automatic_goals_reject_direct_progress_edits() {
    let (_dir, pool, user, goals) = setup();
    seed_water(&pool, &user, date(2024, 2, 1), 15.0);

    let goal = goals
        .create_goal(&user, water_goal_request(10.0))
        .expect("create goal");

    let err = goals
        .update_goal(
            &goal.id,
            &user.id,
            UpdateGoalRequest {
                title: None,
                description: None,
                target_value: None,
                end_date: None,
                current_value: Some(1.0),
            },
        )
        .expect_err("direct edits rejected");
    assert!(!err.is_not_found());
}

#[test]
fn list_goals_filters_by_status_and_resource() {
    let (_dir, pool, user, goals) = setup();
    seed_water(&pool, &user, date(2024, 2, 1), 15.0);

    goals
        .create_goal(&user, water_goal_request(10.0))
        .expect("water goal");
    goals
        .create_goal(
            &user,
            CreateGoalRequest {
                title: "Menos luz".into(),
                description: None,
                resource_type: ResourceType::Electricity,
                metric_kind: "consumo_total".into(),
                target_value: 300.0,
                unit: None,
                evaluation_mode: EvaluationMode::Manual,
                start_date: None,
                end_date: Utc::now() + Duration::days(60),
            },
        )
        .expect("electricity goal");

    let all = goals.list_goals(&user.id, None, None).expect("list all");
    assert_eq!(all.len(), 2);

    let water_only = goals
        .list_goals(&user.id, None, Some(ResourceType::Water))
        .expect("list water");
    assert_eq!(water_only.len(), 1);
    assert_eq!(water_only[0].resource_type, ResourceType::Water);

    let in_progress = goals
        .list_goals(&user.id, Some(GoalStatus::InProgress), None)
        .expect("list in progress");
    assert_eq!(in_progress.len(), 2);
}
