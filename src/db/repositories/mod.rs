pub mod consumption_repository;
pub mod goal_repository;
pub mod user_repository;

use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};

pub(crate) fn parse_timestamp(column: &str, value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| AppError::database(format!("columna {} con fecha inválida: {}", column, err)))
}
