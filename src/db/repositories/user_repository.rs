use chrono::Utc;
use rusqlite::{named_params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::user::User;

pub struct UserRepository;

impl UserRepository {
    /// The auth collaborator: resolves the device's profile. This core is
    /// single-user per database, like the desktop tracker it grew out of.
    pub fn current(conn: &Connection) -> AppResult<Option<User>> {
        let mut stmt =
            conn.prepare("SELECT id, username FROM users ORDER BY created_at ASC LIMIT 1")?;

        let user = stmt
            .query_row([], |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                })
            })
            .optional()?;

        Ok(user)
    }

    pub fn create(conn: &Connection, username: &str) -> AppResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO users (id, username, created_at) VALUES (:id, :username, :created_at)",
            named_params! {
                ":id": &id,
                ":username": username,
                ":created_at": now.to_rfc3339(),
            },
        )?;

        Ok(User {
            id,
            username: username.to_string(),
        })
    }
}
