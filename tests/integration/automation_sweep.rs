use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ecohogar_core::db::repositories::consumption_repository::ConsumptionRepository;
use ecohogar_core::db::repositories::goal_repository::GoalRepository;
use ecohogar_core::db::repositories::user_repository::UserRepository;
use ecohogar_core::db::DbPool;
use ecohogar_core::models::consumption::{ConsumptionRecordInsert, ResourceType, TransportMode};
use ecohogar_core::models::goal::{
    CreateGoalRequest, EvaluationMode, Goal, GoalStatus,
};
use ecohogar_core::models::user::User;
use ecohogar_core::services::analytics_service::AnalyticsService;
use ecohogar_core::services::automation_service::AutomationService;
use ecohogar_core::services::goal_progress_service::GoalProgressService;
use ecohogar_core::services::goal_service::GoalService;
use tempfile::tempdir;

struct Harness {
    _dir: tempfile::TempDir,
    pool: DbPool,
    user: User,
    goals: GoalService,
    automation: AutomationService,
}

fn setup() -> Harness {
    let dir = tempdir().expect("temp dir");
    let db_path = dir.path().join("sweep.sqlite");
    let pool = DbPool::new(&db_path).expect("db pool");
    let user = pool
        .with_connection(|conn| UserRepository::create(conn, "lucia"))
        .expect("create user");

    let analytics = Arc::new(AnalyticsService::new(pool.clone()));
    let progress = Arc::new(GoalProgressService::new(pool.clone(), analytics));
    let goals = GoalService::new(pool.clone(), Arc::clone(&progress));
    let automation = AutomationService::new(pool.clone(), progress);

    Harness {
        _dir: dir,
        pool,
        user,
        goals,
        automation,
    }
}

fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0)
        .single()
        .expect("valid date")
}

fn seed_record(
    harness: &Harness,
    resource_type: ResourceType,
    at: DateTime<Utc>,
    quantity: f64,
    mode: Option<TransportMode>,
) {
    harness
        .pool
        .with_connection(|conn| {
            ConsumptionRepository::insert(
                conn,
                &ConsumptionRecordInsert {
                    user_id: harness.user.id.clone(),
                    resource_type,
                    recorded_at: at,
                    quantity,
                    cost: quantity,
                    transport_mode: mode,
                    notes: None,
                },
            )
        })
        .expect("insert record");
}

fn automatic_goal(harness: &Harness, resource_type: ResourceType, metric: &str, target: f64) -> Goal {
    harness
        .goals
        .create_goal(
            &harness.user,
            CreateGoalRequest {
                title: format!("Meta {}", metric),
                description: None,
                resource_type,
                metric_kind: metric.into(),
                target_value: target,
                unit: None,
                evaluation_mode: EvaluationMode::Automatic,
                start_date: None,
                end_date: Utc::now() + Duration::days(90),
            },
        )
        .expect("create automatic goal")
}

/// A goal wired to a resource the strategies cannot handle, inserted behind
/// the service's back so the sweep has something to choke on.
fn unprocessable_goal(harness: &Harness) -> Goal {
    let now = Utc::now();
    let goal = Goal {
        id: "goal-imposible".into(),
        owner_id: harness.user.id.clone(),
        title: "Meta sin estrategia".into(),
        description: None,
        resource_type: ResourceType::Other,
        metric_kind: "consumo_total".into(),
        target_value: 10.0,
        initial_value: Some(5.0),
        current_value: 7.5,
        unit: "".into(),
        evaluation_mode: EvaluationMode::Automatic,
        status: GoalStatus::InProgress,
        start_date: now,
        end_date: now + Duration::days(90),
        created_at: now,
        updated_at: now,
    };
    harness
        .pool
        .with_connection(|conn| GoalRepository::insert(conn, &goal))
        .expect("insert unprocessable goal");
    goal
}

#[test]
fn sweep_isolates_per_goal_failures() {
    let harness = setup();

    seed_record(&harness, ResourceType::Water, date(2024, 1, 10), 20.0, None);
    seed_record(&harness, ResourceType::Electricity, date(2024, 1, 12), 400.0, None);

    let water_goal = automatic_goal(&harness, ResourceType::Water, "consumo_total", 18.0);
    let broken_goal = unprocessable_goal(&harness);
    let electricity_goal =
        automatic_goal(&harness, ResourceType::Electricity, "consumo_total", 350.0);

    let summary = harness.automation.run_sweep(None, None).expect("sweep");

    assert_eq!(summary.updated_count, 2);
    assert_eq!(summary.skipped_count, 1);
    assert_eq!(summary.skipped_goal_ids, vec![broken_goal.id.clone()]);

    let updated_ids: Vec<&str> = summary.updated.iter().map(|g| g.id.as_str()).collect();
    assert!(updated_ids.contains(&water_goal.id.as_str()));
    assert!(updated_ids.contains(&electricity_goal.id.as_str()));

    // the failing goal keeps its last-known state
    let stored = harness
        .goals
        .get_goal(&broken_goal.id, &harness.user.id)
        .expect("broken goal still stored");
    assert_eq!(stored.current_value, 7.5);
    assert_eq!(stored.status, GoalStatus::InProgress);
}

#[test]
fn sweep_skips_manual_and_terminal_goals() {
    let harness = setup();

    seed_record(&harness, ResourceType::Water, date(2024, 1, 10), 20.0, None);

    let manual = harness
        .goals
        .create_goal(
            &harness.user,
            CreateGoalRequest {
                title: "Meta manual".into(),
                description: None,
                resource_type: ResourceType::Water,
                metric_kind: "consumo_total".into(),
                target_value: 18.0,
                unit: None,
                evaluation_mode: EvaluationMode::Manual,
                start_date: None,
                end_date: Utc::now() + Duration::days(90),
            },
        )
        .expect("manual goal");

    // 20 <= 25: the first recompute completes this one
    let finished = automatic_goal(&harness, ResourceType::Water, "consumo_total", 25.0);
    let first = harness.automation.run_sweep(None, None).expect("first sweep");
    assert_eq!(first.updated_count, 1);
    assert_eq!(
        first.updated[0].status,
        GoalStatus::Completed,
        "below-target reduction completes"
    );

    // second sweep: the terminal goal is no longer a candidate
    let second = harness.automation.run_sweep(None, None).expect("second sweep");
    assert_eq!(second.updated_count, 0);
    assert_eq!(second.skipped_count, 0);

    // the manual goal was never touched
    let stored_manual = harness
        .goals
        .get_goal(&manual.id, &harness.user.id)
        .expect("manual goal");
    assert_eq!(stored_manual.current_value, 0.0);
    assert_eq!(stored_manual.updated_at, manual.updated_at);

    let stored_finished = harness
        .goals
        .get_goal(&finished.id, &harness.user.id)
        .expect("finished goal");
    assert_eq!(stored_finished.status, GoalStatus::Completed);
}

#[test]
fn sweep_filters_by_resource_type() {
    let harness = setup();

    seed_record(&harness, ResourceType::Water, date(2024, 1, 10), 20.0, None);
    seed_record(&harness, ResourceType::Electricity, date(2024, 1, 12), 400.0, None);

    automatic_goal(&harness, ResourceType::Water, "consumo_total", 18.0);
    automatic_goal(&harness, ResourceType::Electricity, "consumo_total", 350.0);

    let summary = harness
        .automation
        .run_sweep(Some(&harness.user.id), Some(ResourceType::Water))
        .expect("filtered sweep");

    assert_eq!(summary.updated_count, 1);
    assert_eq!(summary.updated[0].resource_type, ResourceType::Water);
}

#[test]
fn single_recompute_enforces_mode_and_ownership() {
    let harness = setup();

    seed_record(&harness, ResourceType::Water, date(2024, 1, 10), 20.0, None);

    let manual = harness
        .goals
        .create_goal(
            &harness.user,
            CreateGoalRequest {
                title: "Meta manual".into(),
                description: None,
                resource_type: ResourceType::Water,
                metric_kind: "consumo_total".into(),
                target_value: 18.0,
                unit: None,
                evaluation_mode: EvaluationMode::Manual,
                start_date: None,
                end_date: Utc::now() + Duration::days(90),
            },
        )
        .expect("manual goal");

    let err = harness
        .automation
        .update_goal_progress(&manual.id, &harness.user.id)
        .expect_err("manual goals are not recomputed");
    assert!(!err.is_not_found());

    let automatic = automatic_goal(&harness, ResourceType::Water, "consumo_total", 18.0);

    let stranger = harness
        .pool
        .with_connection(|conn| UserRepository::create(conn, "intruso"))
        .expect("second user");
    let err = harness
        .automation
        .update_goal_progress(&automatic.id, &stranger.id)
        .expect_err("foreign goal is not found");
    assert!(err.is_not_found());

    let updated = harness
        .automation
        .update_goal_progress(&automatic.id, &harness.user.id)
        .expect("owner recompute");
    assert_eq!(updated.current_value, 20.0);
}

#[test]
fn transport_goal_tracks_only_records_after_creation() {
    let harness = setup();

    // kilometers driven before the goal existed must not count
    seed_record(
        &harness,
        ResourceType::Transport,
        Utc::now() - Duration::days(10),
        300.0,
        Some(TransportMode::Car),
    );

    let goal = automatic_goal(
        &harness,
        ResourceType::Transport,
        "reduccion_combustion",
        250.0,
    );
    // baseline from the month before creation: 300 car km
    assert_eq!(goal.initial_value, Some(300.0));
    assert_eq!(goal.current_value, 0.0);

    seed_record(
        &harness,
        ResourceType::Transport,
        Utc::now(),
        120.0,
        Some(TransportMode::Car),
    );
    seed_record(
        &harness,
        ResourceType::Transport,
        Utc::now(),
        40.0,
        Some(TransportMode::Bicycle),
    );

    let updated = harness
        .automation
        .update_goal_progress(&goal.id, &harness.user.id)
        .expect("recompute");

    // only the post-creation car kilometers count toward the cap
    assert_eq!(updated.current_value, 120.0);
    assert_eq!(updated.status, GoalStatus::InProgress);
}
