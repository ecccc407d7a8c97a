use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use super::{HourFilter, LearnerProfile, ReviewStore, StoreError};
use crate::srs::{LearnerId, Quality, ReviewKey, ReviewState, StrategyKind, Subject};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");
const SCHEMA_VERSION: &str = "1";

const STATE_COLUMNS: &str = r#""learner_id","subject_kind","subject_id","strategy","easiness_factor",
    "interval_days","repetition_count","consecutive_correct","last_quality","last_reviewed_at",
    "next_due_at","completed","mastered","version","created_at""#;

#[derive(Debug, thiserror::Error)]
pub enum SqliteInitError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and applies the schema.
    pub async fn connect(url: &str) -> Result<Self, SqliteInitError> {
        if let Some(parent) = database_file(url).as_deref().and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| SqliteInitError::Io(e.to_string()))?;
            }
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| SqliteInitError::Config(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, SqliteInitError> {
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Filesystem path behind a `sqlite:` URL, if it names a file.
fn database_file(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    let version: Option<String> =
        sqlx::query_scalar(r#"SELECT "value" FROM "_db_metadata" WHERE "key" = 'schema_version'"#)
            .fetch_optional(pool)
            .await
            .unwrap_or(None);

    if version.as_deref() == Some(SCHEMA_VERSION) {
        return Ok(());
    }

    for stmt in split_sql_statements(SCHEMA_SQL) {
        let sql: String = stmt
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            continue;
        }
        sqlx::query(trimmed).execute(pool).await?;
    }

    sqlx::query(r#"INSERT OR REPLACE INTO "_db_metadata" ("key", "value") VALUES ('schema_version', ?)"#)
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    tracing::info!(version = SCHEMA_VERSION, "sqlite schema applied");
    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    for ch in sql.chars() {
        match ch {
            '\'' if !in_double_quote => in_single_quote = !in_single_quote,
            '"' if !in_single_quote => in_double_quote = !in_double_quote,
            ';' if !in_single_quote && !in_double_quote => {
                let stmt = current.trim();
                if !stmt.is_empty() {
                    statements.push(stmt.to_string());
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }

    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }

    statements
}

fn column_u32(row: &SqliteRow, column: &str) -> Result<u32, StoreError> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {raw}")))
}

fn map_state_row(row: &SqliteRow) -> Result<ReviewState, StoreError> {
    let kind: String = row.try_get("subject_kind")?;
    let subject_id: i64 = row.try_get("subject_id")?;
    let subject = Subject::from_parts(&kind, subject_id)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown subject kind {kind}")))?;

    let strategy: String = row.try_get("strategy")?;
    let strategy = StrategyKind::parse(&strategy)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown strategy {strategy}")))?;

    let last_quality = row
        .try_get::<Option<i64>, _>("last_quality")?
        .map(Quality::from_rating)
        .transpose()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    let version: i64 = row.try_get("version")?;

    Ok(ReviewState {
        learner_id: row.try_get("learner_id")?,
        subject,
        strategy,
        easiness_factor: row.try_get("easiness_factor")?,
        interval_days: column_u32(row, "interval_days")?,
        repetition_count: column_u32(row, "repetition_count")?,
        consecutive_correct: column_u32(row, "consecutive_correct")?,
        last_quality,
        last_reviewed_at: row.try_get::<Option<DateTime<Utc>>, _>("last_reviewed_at")?,
        next_due_at: row.try_get("next_due_at")?,
        completed: row.try_get("completed")?,
        mastered: row.try_get("mastered")?,
        version: u64::try_from(version)
            .map_err(|_| StoreError::Corrupt(format!("negative version {version}")))?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_learner_row(row: &SqliteRow) -> Result<LearnerProfile, StoreError> {
    Ok(LearnerProfile {
        learner_id: row.try_get("learner_id")?,
        reminders_enabled: row.try_get("reminders_enabled")?,
        notification_hour: column_u32(row, "notification_hour")?,
        max_per_day: column_u32(row, "max_per_day")?,
    })
}

#[async_trait]
impl ReviewStore for SqliteStore {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    async fn due_learners(&self, filter: HourFilter) -> Result<Vec<LearnerProfile>, StoreError> {
        let rows = match filter {
            HourFilter::Exact(hour) => {
                sqlx::query(
                    r#"
                    SELECT "learner_id","reminders_enabled","notification_hour","max_per_day"
                    FROM "learners"
                    WHERE "reminders_enabled" = 1 AND "notification_hour" = ?
                    ORDER BY "learner_id"
                    "#,
                )
                .bind(i64::from(hour))
                .fetch_all(&self.pool)
                .await?
            }
            HourFilter::Any => {
                sqlx::query(
                    r#"
                    SELECT "learner_id","reminders_enabled","notification_hour","max_per_day"
                    FROM "learners"
                    WHERE "reminders_enabled" = 1
                    ORDER BY "learner_id"
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(map_learner_row).collect()
    }

    async fn learner(&self, learner_id: LearnerId) -> Result<Option<LearnerProfile>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT "learner_id","reminders_enabled","notification_hour","max_per_day"
            FROM "learners"
            WHERE "learner_id" = ?
            "#,
        )
        .bind(learner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_learner_row).transpose()
    }

    async fn save_learner(&self, profile: &LearnerProfile) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO "learners" ("learner_id","reminders_enabled","notification_hour","max_per_day","updated_at")
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT ("learner_id") DO UPDATE SET
                "reminders_enabled" = excluded."reminders_enabled",
                "notification_hour" = excluded."notification_hour",
                "max_per_day" = excluded."max_per_day",
                "updated_at" = excluded."updated_at"
            "#,
        )
        .bind(profile.learner_id)
        .bind(profile.reminders_enabled)
        .bind(i64::from(profile.notification_hour))
        .bind(i64::from(profile.max_per_day))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn review_states(&self, learner_id: LearnerId) -> Result<Vec<ReviewState>, StoreError> {
        let sql = format!(
            r#"SELECT {STATE_COLUMNS} FROM "review_states" WHERE "learner_id" = ? ORDER BY "subject_kind","subject_id""#
        );
        let rows = sqlx::query(&sql)
            .bind(learner_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_state_row).collect()
    }

    async fn get(&self, key: ReviewKey) -> Result<Option<ReviewState>, StoreError> {
        let sql = format!(
            r#"SELECT {STATE_COLUMNS} FROM "review_states"
               WHERE "learner_id" = ? AND "subject_kind" = ? AND "subject_id" = ?"#
        );
        let row = sqlx::query(&sql)
            .bind(key.learner_id)
            .bind(key.subject.kind())
            .bind(key.subject.id())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_state_row).transpose()
    }

    async fn upsert(&self, state: &ReviewState) -> Result<ReviewState, StoreError> {
        let expected = i64::try_from(state.version)
            .map_err(|_| StoreError::Corrupt(format!("version overflow {}", state.version)))?;
        let next_version = expected + 1;
        let now = Utc::now();
        let last_quality = state.last_quality.map(|q| i64::from(q.value()));

        let result = if state.version == 0 {
            sqlx::query(
                r#"
                INSERT INTO "review_states" (
                    "learner_id","subject_kind","subject_id","strategy","easiness_factor",
                    "interval_days","repetition_count","consecutive_correct","last_quality",
                    "last_reviewed_at","next_due_at","completed","mastered","version",
                    "created_at","updated_at"
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT ("learner_id","subject_kind","subject_id") DO NOTHING
                "#,
            )
            .bind(state.learner_id)
            .bind(state.subject.kind())
            .bind(state.subject.id())
            .bind(state.strategy.as_str())
            .bind(state.easiness_factor)
            .bind(i64::from(state.interval_days))
            .bind(i64::from(state.repetition_count))
            .bind(i64::from(state.consecutive_correct))
            .bind(last_quality)
            .bind(state.last_reviewed_at)
            .bind(state.next_due_at)
            .bind(state.completed)
            .bind(state.mastered)
            .bind(next_version)
            .bind(state.created_at)
            .bind(now)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE "review_states" SET
                    "strategy" = ?,
                    "easiness_factor" = ?,
                    "interval_days" = ?,
                    "repetition_count" = ?,
                    "consecutive_correct" = ?,
                    "last_quality" = ?,
                    "last_reviewed_at" = ?,
                    "next_due_at" = ?,
                    "completed" = ?,
                    "mastered" = ?,
                    "version" = ?,
                    "updated_at" = ?
                WHERE "learner_id" = ? AND "subject_kind" = ? AND "subject_id" = ? AND "version" = ?
                "#,
            )
            .bind(state.strategy.as_str())
            .bind(state.easiness_factor)
            .bind(i64::from(state.interval_days))
            .bind(i64::from(state.repetition_count))
            .bind(i64::from(state.consecutive_correct))
            .bind(last_quality)
            .bind(state.last_reviewed_at)
            .bind(state.next_due_at)
            .bind(state.completed)
            .bind(state.mastered)
            .bind(next_version)
            .bind(now)
            .bind(state.learner_id)
            .bind(state.subject.kind())
            .bind(state.subject.id())
            .bind(expected)
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(StoreError::conflict(state));
        }

        let mut stored = state.clone();
        stored.version = state.version + 1;
        Ok(stored)
    }
}
