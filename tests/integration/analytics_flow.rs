use chrono::{DateTime, TimeZone, Utc};
use ecohogar_core::db::repositories::consumption_repository::ConsumptionRepository;
use ecohogar_core::db::repositories::user_repository::UserRepository;
use ecohogar_core::db::{migrations, DbPool};
use ecohogar_core::models::analytics::{EfficiencyRating, MetricStatus};
use ecohogar_core::models::consumption::{ConsumptionRecordInsert, ResourceType};
use ecohogar_core::models::user::User;
use ecohogar_core::services::analytics_service::AnalyticsService;
use tempfile::tempdir;

fn setup() -> (tempfile::TempDir, DbPool, User) {
    let dir = tempdir().expect("temp dir");
    let db_path = dir.path().join("ecohogar.sqlite");
    let pool = DbPool::new(&db_path).expect("db pool");
    let user = pool
        .with_connection(|conn| UserRepository::create(conn, "maria"))
        .expect("create user");
    (dir, pool, user)
}

fn seed_water(pool: &DbPool, user: &User, at: DateTime<Utc>, quantity: f64, cost: f64) {
    pool.with_connection(|conn| {
        ConsumptionRepository::insert(
            conn,
            &ConsumptionRecordInsert {
                user_id: user.id.clone(),
                resource_type: ResourceType::Water,
                recorded_at: at,
                quantity,
                cost,
                transport_mode: None,
                notes: None,
            },
        )
    })
    .expect("insert record");
}

fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 10, 0, 0)
        .single()
        .expect("valid date")
}

#[test]
fn report_aggregates_history_into_bimonthly_periods() {
    let (_dir, pool, user) = setup();

    // Jan+Feb share one period; the remaining readings land one per period.
    seed_water(&pool, &user, date(2024, 1, 5), 6.0, 12.0);
    seed_water(&pool, &user, date(2024, 2, 20), 4.0, 8.0);
    seed_water(&pool, &user, date(2024, 3, 10), 12.0, 24.0);
    seed_water(&pool, &user, date(2024, 5, 15), 14.0, 28.0);
    seed_water(&pool, &user, date(2024, 7, 2), 9.0, 18.0);

    let analytics = AnalyticsService::new(pool.clone());
    let report = analytics.report(ResourceType::Water, &user.id);

    // periods: [10, 12, 14, 9]
    assert_eq!(report.historical_series.len(), 4);
    assert_eq!(report.historical_series[0].total_quantity, 10.0);
    assert_eq!(report.current_period_value, 9.0);
    assert_eq!(report.cost_total, 18.0);
    assert_eq!(report.unit_cost, 2.0);

    // trailing window of three: (12 + 14 + 9) / 3
    assert!((report.moving_average - 11.666_666_666_666_666).abs() < 1e-9);

    // below its own trailing average, so savings accrue
    assert!(report.co2_savings > 0.0);
    assert_eq!(report.anomaly_count, 0);
    assert_eq!(report.anomaly_status, MetricStatus::Success);

    // 9 m3 per period sits well under the regional average
    assert_eq!(report.efficiency_rating, EfficiencyRating::MoreEfficient);

    // consumption dropped from 14 to 9
    assert!(report.percent_change_from_prior < 0.0);
    assert_eq!(report.percent_change_status, MetricStatus::Success);
}

#[test]
fn report_flags_anomalous_periods() {
    let (_dir, pool, user) = setup();

    seed_water(&pool, &user, date(2024, 1, 10), 10.0, 20.0);
    seed_water(&pool, &user, date(2024, 3, 10), 10.0, 20.0);
    seed_water(&pool, &user, date(2024, 5, 10), 30.0, 60.0);

    let analytics = AnalyticsService::new(pool.clone());
    let report = analytics.report(ResourceType::Water, &user.id);

    // 30 against a trailing average of 50/3 exceeds the 1.2 ratio
    assert_eq!(report.anomaly_count, 1);
    let detail = &report.anomaly_details[0];
    assert_eq!(detail.observed, 30.0);
    assert!(detail.deviation_pct > 20.0);
    assert!(report.historical_series[2].is_anomaly);

    // current period above its average: no savings, never negative
    assert_eq!(report.co2_savings, 0.0);
}

#[test]
fn empty_history_yields_the_neutral_report() {
    let (_dir, pool, user) = setup();

    let analytics = AnalyticsService::new(pool.clone());
    let report = analytics.report(ResourceType::Water, &user.id);

    assert!(report.is_empty());
    assert!(report.historical_series.is_empty());
    assert_eq!(report.current_period_value, 0.0);
    assert_eq!(report.percent_change_status, MetricStatus::Neutral);
    assert_eq!(report.deviation_status, MetricStatus::Neutral);
    assert_eq!(report.anomaly_status, MetricStatus::Neutral);
    assert_eq!(report.co2_savings, 0.0);
    assert_eq!(report.forecast_next_period, 0.0);
}

#[test]
fn transport_report_keeps_the_stub_contract() {
    let (_dir, pool, user) = setup();

    // Even with transport records on file the engine answers with the
    // neutral report until transport aggregation exists.
    pool.with_connection(|conn| {
        ConsumptionRepository::insert(
            conn,
            &ConsumptionRecordInsert {
                user_id: user.id.clone(),
                resource_type: ResourceType::Transport,
                recorded_at: date(2024, 4, 1),
                quantity: 120.0,
                cost: 18.0,
                transport_mode: Some(ecohogar_core::models::consumption::TransportMode::Car),
                notes: None,
            },
        )
    })
    .expect("insert transport record");

    let analytics = AnalyticsService::new(pool.clone());
    let report = analytics.report(ResourceType::Transport, &user.id);

    assert!(report.is_empty());
    assert_eq!(report.anomaly_status, MetricStatus::Neutral);
}

#[test]
fn migrations_are_recorded() {
    let (_dir, pool, _user) = setup();

    let history = pool
        .with_connection(|conn| migrations::get_migration_history(conn))
        .expect("migration history");

    assert!(history.len() >= 3);
    assert_eq!(history[0].version, 1);
}
