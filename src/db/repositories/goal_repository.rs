use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::db::repositories::parse_timestamp;
use crate::error::{AppError, AppResult};
use crate::models::consumption::ResourceType;
use crate::models::goal::{EvaluationMode, Goal, GoalStatus};

const BASE_SELECT: &str = r#"
    SELECT
        id,
        owner_id,
        title,
        description,
        resource_type,
        metric_kind,
        target_value,
        initial_value,
        current_value,
        unit,
        evaluation_mode,
        status,
        start_date,
        end_date,
        created_at,
        updated_at
    FROM goals
"#;

#[derive(Debug, Clone)]
pub struct GoalRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub resource_type: String,
    pub metric_kind: String,
    pub target_value: f64,
    pub initial_value: Option<f64>,
    pub current_value: f64,
    pub unit: String,
    pub evaluation_mode: String,
    pub status: String,
    pub start_date: String,
    pub end_date: String,
    pub created_at: String,
    pub updated_at: String,
}

impl GoalRow {
    pub fn from_goal(goal: &Goal) -> Self {
        Self {
            id: goal.id.clone(),
            owner_id: goal.owner_id.clone(),
            title: goal.title.clone(),
            description: goal.description.clone(),
            resource_type: goal.resource_type.as_str().to_string(),
            metric_kind: goal.metric_kind.clone(),
            target_value: goal.target_value,
            initial_value: goal.initial_value,
            current_value: goal.current_value,
            unit: goal.unit.clone(),
            evaluation_mode: goal.evaluation_mode.as_str().to_string(),
            status: goal.status.as_str().to_string(),
            start_date: goal.start_date.to_rfc3339(),
            end_date: goal.end_date.to_rfc3339(),
            created_at: goal.created_at.to_rfc3339(),
            updated_at: goal.updated_at.to_rfc3339(),
        }
    }

    pub fn into_goal(self) -> AppResult<Goal> {
        let resource_type =
            ResourceType::from_str(&self.resource_type).map_err(AppError::validation)?;
        let evaluation_mode =
            EvaluationMode::from_str(&self.evaluation_mode).map_err(AppError::validation)?;
        let status = GoalStatus::from_str(&self.status).map_err(AppError::validation)?;

        Ok(Goal {
            id: self.id,
            owner_id: self.owner_id,
            title: self.title,
            description: self.description,
            resource_type,
            metric_kind: self.metric_kind,
            target_value: self.target_value,
            initial_value: self.initial_value,
            current_value: self.current_value,
            unit: self.unit,
            evaluation_mode,
            status,
            start_date: parse_timestamp("start_date", &self.start_date)?,
            end_date: parse_timestamp("end_date", &self.end_date)?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
        })
    }
}

impl TryFrom<&Row<'_>> for GoalRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            resource_type: row.get("resource_type")?,
            metric_kind: row.get("metric_kind")?,
            target_value: row.get("target_value")?,
            initial_value: row.get("initial_value")?,
            current_value: row.get("current_value")?,
            unit: row.get("unit")?,
            evaluation_mode: row.get("evaluation_mode")?,
            status: row.get("status")?,
            start_date: row.get("start_date")?,
            end_date: row.get("end_date")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct GoalRepository;

impl GoalRepository {
    pub fn insert(conn: &Connection, goal: &Goal) -> AppResult<()> {
        let row = GoalRow::from_goal(goal);
        conn.execute(
            r#"
            INSERT INTO goals (
                id, owner_id, title, description, resource_type, metric_kind,
                target_value, initial_value, current_value, unit,
                evaluation_mode, status, start_date, end_date, created_at, updated_at
            ) VALUES (
                :id, :owner_id, :title, :description, :resource_type, :metric_kind,
                :target_value, :initial_value, :current_value, :unit,
                :evaluation_mode, :status, :start_date, :end_date, :created_at, :updated_at
            )
            "#,
            named_params! {
                ":id": &row.id,
                ":owner_id": &row.owner_id,
                ":title": &row.title,
                ":description": &row.description,
                ":resource_type": &row.resource_type,
                ":metric_kind": &row.metric_kind,
                ":target_value": row.target_value,
                ":initial_value": row.initial_value,
                ":current_value": row.current_value,
                ":unit": &row.unit,
                ":evaluation_mode": &row.evaluation_mode,
                ":status": &row.status,
                ":start_date": &row.start_date,
                ":end_date": &row.end_date,
                ":created_at": &row.created_at,
                ":updated_at": &row.updated_at,
            },
        )?;
        Ok(())
    }

    pub fn update(conn: &Connection, goal: &Goal) -> AppResult<()> {
        let row = GoalRow::from_goal(goal);
        let affected = conn.execute(
            r#"
            UPDATE goals SET
                title = :title,
                description = :description,
                metric_kind = :metric_kind,
                target_value = :target_value,
                initial_value = :initial_value,
                current_value = :current_value,
                unit = :unit,
                evaluation_mode = :evaluation_mode,
                status = :status,
                start_date = :start_date,
                end_date = :end_date,
                updated_at = :updated_at
            WHERE id = :id AND owner_id = :owner_id
            "#,
            named_params! {
                ":id": &row.id,
                ":owner_id": &row.owner_id,
                ":title": &row.title,
                ":description": &row.description,
                ":metric_kind": &row.metric_kind,
                ":target_value": row.target_value,
                ":initial_value": row.initial_value,
                ":current_value": row.current_value,
                ":unit": &row.unit,
                ":evaluation_mode": &row.evaluation_mode,
                ":status": &row.status,
                ":start_date": &row.start_date,
                ":end_date": &row.end_date,
                ":updated_at": &row.updated_at,
            },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }

    /// Owner scoping lives in the query itself: a goal owned by someone else
    /// comes back as `None`, indistinguishable from one that does not exist.
    pub fn find_by_id_and_owner(
        conn: &Connection,
        id: &str,
        owner_id: &str,
    ) -> AppResult<Option<Goal>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE id = :id AND owner_id = :owner_id",
            BASE_SELECT
        ))?;

        let row = stmt
            .query_row(
                named_params! { ":id": id, ":owner_id": owner_id },
                |row| GoalRow::try_from(row),
            )
            .optional()?;

        match row {
            Some(row) => Ok(Some(row.into_goal()?)),
            None => Ok(None),
        }
    }

    pub fn list_by_owner(
        conn: &Connection,
        owner_id: &str,
        status: Option<GoalStatus>,
        resource_type: Option<ResourceType>,
    ) -> AppResult<Vec<Goal>> {
        let mut query = format!("{} WHERE owner_id = :owner_id", BASE_SELECT);
        if status.is_some() {
            query.push_str(" AND status = :status");
        }
        if resource_type.is_some() {
            query.push_str(" AND resource_type = :resource_type");
        }
        query.push_str(" ORDER BY created_at DESC");

        let mut stmt = conn.prepare(&query)?;

        let status_str = status.map(|s| s.as_str().to_string());
        let resource_str = resource_type.map(|r| r.as_str().to_string());

        let mut params: Vec<(&str, &dyn rusqlite::ToSql)> = vec![(":owner_id", &owner_id)];
        if let Some(ref value) = status_str {
            params.push((":status", value));
        }
        if let Some(ref value) = resource_str {
            params.push((":resource_type", value));
        }

        let rows = stmt
            .query_map(params.as_slice(), |row| GoalRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(|row| row.into_goal()).collect()
    }

    /// Sweep candidates: automatic, still in progress, optionally narrowed
    /// by owner and resource type.
    pub fn list_automatic_in_progress(
        conn: &Connection,
        owner_id: Option<&str>,
        resource_type: Option<ResourceType>,
    ) -> AppResult<Vec<Goal>> {
        let mut query = format!(
            "{} WHERE evaluation_mode = 'automatic' AND status = 'in_progress'",
            BASE_SELECT
        );
        if owner_id.is_some() {
            query.push_str(" AND owner_id = :owner_id");
        }
        if resource_type.is_some() {
            query.push_str(" AND resource_type = :resource_type");
        }
        query.push_str(" ORDER BY created_at ASC");

        let mut stmt = conn.prepare(&query)?;

        let resource_str = resource_type.map(|r| r.as_str().to_string());

        let mut params: Vec<(&str, &dyn rusqlite::ToSql)> = Vec::new();
        if let Some(ref value) = owner_id {
            params.push((":owner_id", value));
        }
        if let Some(ref value) = resource_str {
            params.push((":resource_type", value));
        }

        let rows = stmt
            .query_map(params.as_slice(), |row| GoalRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(|row| row.into_goal()).collect()
    }

    pub fn delete(conn: &Connection, id: &str, owner_id: &str) -> AppResult<()> {
        let affected = conn.execute(
            "DELETE FROM goals WHERE id = :id AND owner_id = :owner_id",
            named_params! { ":id": id, ":owner_id": owner_id },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }
}
