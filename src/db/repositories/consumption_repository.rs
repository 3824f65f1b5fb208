use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use rusqlite::{named_params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::repositories::parse_timestamp;
use crate::error::{AppError, AppResult};
use crate::models::consumption::{
    ConsumptionRecord, ConsumptionRecordInsert, ResourceType, TransportMode,
};

const BASE_SELECT: &str = r#"
    SELECT
        id,
        user_id,
        resource_type,
        recorded_at,
        quantity,
        cost,
        transport_mode,
        notes,
        created_at
    FROM consumption_records
"#;

#[derive(Debug, Clone)]
pub struct ConsumptionRecordRow {
    pub id: String,
    pub user_id: String,
    pub resource_type: String,
    pub recorded_at: String,
    pub quantity: f64,
    pub cost: f64,
    pub transport_mode: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

impl ConsumptionRecordRow {
    pub fn into_record(self) -> AppResult<ConsumptionRecord> {
        let resource_type =
            ResourceType::from_str(&self.resource_type).map_err(AppError::validation)?;
        let transport_mode = match self.transport_mode {
            Some(value) => Some(TransportMode::from_str(&value).map_err(AppError::validation)?),
            None => None,
        };

        Ok(ConsumptionRecord {
            id: self.id,
            user_id: self.user_id,
            resource_type,
            recorded_at: parse_timestamp("recorded_at", &self.recorded_at)?,
            quantity: self.quantity,
            cost: self.cost,
            transport_mode,
            notes: self.notes,
            created_at: parse_timestamp("created_at", &self.created_at)?,
        })
    }
}

impl TryFrom<&Row<'_>> for ConsumptionRecordRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            resource_type: row.get("resource_type")?,
            recorded_at: row.get("recorded_at")?,
            quantity: row.get("quantity")?,
            cost: row.get("cost")?,
            transport_mode: row.get("transport_mode")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct ConsumptionRepository;

impl ConsumptionRepository {
    pub fn insert(conn: &Connection, input: &ConsumptionRecordInsert) -> AppResult<ConsumptionRecord> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            r#"
            INSERT INTO consumption_records (
                id, user_id, resource_type, recorded_at, quantity, cost, transport_mode, notes, created_at
            ) VALUES (
                :id, :user_id, :resource_type, :recorded_at, :quantity, :cost, :transport_mode, :notes, :created_at
            )
            "#,
            named_params! {
                ":id": &id,
                ":user_id": &input.user_id,
                ":resource_type": input.resource_type.as_str(),
                ":recorded_at": input.recorded_at.to_rfc3339(),
                ":quantity": input.quantity,
                ":cost": input.cost,
                ":transport_mode": input.transport_mode.map(|mode| mode.as_str()),
                ":notes": &input.notes,
                ":created_at": now.to_rfc3339(),
            },
        )?;

        Ok(ConsumptionRecord {
            id,
            user_id: input.user_id.clone(),
            resource_type: input.resource_type,
            recorded_at: input.recorded_at,
            quantity: input.quantity,
            cost: input.cost,
            transport_mode: input.transport_mode,
            notes: input.notes.clone(),
            created_at: now,
        })
    }

    /// Full history for one resource, oldest first. The analytics engine
    /// relies on this ordering when it groups records into periods.
    pub fn list_for_user(
        conn: &Connection,
        resource_type: ResourceType,
        user_id: &str,
    ) -> AppResult<Vec<ConsumptionRecord>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = :user_id AND resource_type = :resource_type ORDER BY recorded_at ASC",
            BASE_SELECT
        ))?;

        let rows = stmt
            .query_map(
                named_params! {
                    ":user_id": user_id,
                    ":resource_type": resource_type.as_str(),
                },
                |row| ConsumptionRecordRow::try_from(row),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(|row| row.into_record()).collect()
    }

    pub fn list_for_user_between(
        conn: &Connection,
        resource_type: ResourceType,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<ConsumptionRecord>> {
        let mut stmt = conn.prepare(&format!(
            r#"{}
            WHERE user_id = :user_id
              AND resource_type = :resource_type
              AND recorded_at >= :from
              AND recorded_at <= :to
            ORDER BY recorded_at ASC"#,
            BASE_SELECT
        ))?;

        let rows = stmt
            .query_map(
                named_params! {
                    ":user_id": user_id,
                    ":resource_type": resource_type.as_str(),
                    ":from": from.to_rfc3339(),
                    ":to": to.to_rfc3339(),
                },
                |row| ConsumptionRecordRow::try_from(row),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(|row| row.into_record()).collect()
    }

    pub fn list_for_user_mode_between(
        conn: &Connection,
        user_id: &str,
        mode: TransportMode,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<ConsumptionRecord>> {
        let mut stmt = conn.prepare(&format!(
            r#"{}
            WHERE user_id = :user_id
              AND resource_type = 'transport'
              AND transport_mode = :transport_mode
              AND recorded_at >= :from
              AND recorded_at <= :to
            ORDER BY recorded_at ASC"#,
            BASE_SELECT
        ))?;

        let rows = stmt
            .query_map(
                named_params! {
                    ":user_id": user_id,
                    ":transport_mode": mode.as_str(),
                    ":from": from.to_rfc3339(),
                    ":to": to.to_rfc3339(),
                },
                |row| ConsumptionRecordRow::try_from(row),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(|row| row.into_record()).collect()
    }

    /// Most recent record for one resource, if any.
    pub fn latest_for_user(
        conn: &Connection,
        resource_type: ResourceType,
        user_id: &str,
    ) -> AppResult<Option<ConsumptionRecord>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = :user_id AND resource_type = :resource_type ORDER BY recorded_at DESC LIMIT 1",
            BASE_SELECT
        ))?;

        let row = stmt
            .query_row(
                named_params! {
                    ":user_id": user_id,
                    ":resource_type": resource_type.as_str(),
                },
                |row| ConsumptionRecordRow::try_from(row),
            )
            .optional()?;

        match row {
            Some(row) => Ok(Some(row.into_record()?)),
            None => Ok(None),
        }
    }
}
