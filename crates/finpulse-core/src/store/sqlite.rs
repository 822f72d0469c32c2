//! SQLite-backed system of record: users, transactions, budgets and the
//! intervention ledger.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{PulseError, PulseResult};
use crate::traits::{FinanceStore, SpendSummary};
use crate::types::{
    Delivery, Feedback, Intervention, InterventionStatus, LearningMetrics, UserRecord,
};

const USER_COLUMNS: &str = "id, email, monthly_income, monthly_expenses, savings, debt, \
     risk_tolerance, intervention_level, health_score, login_count, activity_count, \
     last_active_at, created_at";

const INTERVENTION_COLUMNS: &str = "id, user_id, type, trigger, category, context, analysis, \
     channel, priority, sent_at, status, feedback, learning, created_at";

/// SQLite-backed finance store.
pub struct SqliteFinanceStore {
    conn: Mutex<Connection>,
}

impl SqliteFinanceStore {
    /// Create a new store at the given path.
    pub fn new(path: impl AsRef<Path>) -> PulseResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> PulseResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> PulseResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PulseError::database("SQLite connection mutex poisoned"))
    }

    fn init_schema(&self) -> PulseResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT,
                monthly_income REAL NOT NULL DEFAULT 0,
                monthly_expenses REAL NOT NULL DEFAULT 0,
                savings REAL NOT NULL DEFAULT 0,
                debt REAL NOT NULL DEFAULT 0,
                risk_tolerance TEXT,
                intervention_level TEXT,
                health_score REAL,
                login_count INTEGER NOT NULL DEFAULT 0,
                activity_count INTEGER NOT NULL DEFAULT 0,
                last_active_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_users_last_active ON users(last_active_at);

            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                description TEXT,
                merchant TEXT,
                occurred_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tx_user_category_time
                ON transactions(user_id, category, occurred_at);

            CREATE TABLE IF NOT EXISTS budgets (
                user_id TEXT NOT NULL,
                category TEXT NOT NULL,
                amount REAL NOT NULL,
                PRIMARY KEY (user_id, category)
            );

            CREATE TABLE IF NOT EXISTS interventions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                type TEXT NOT NULL,
                trigger TEXT NOT NULL,
                category TEXT NOT NULL,
                context TEXT NOT NULL,
                analysis TEXT NOT NULL,
                channel TEXT NOT NULL,
                priority INTEGER NOT NULL,
                sent_at TEXT,
                status TEXT NOT NULL,
                feedback TEXT,
                learning TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_interventions_user ON interventions(user_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_interventions_type ON interventions(type);
        "#,
        )?;
        Ok(())
    }

    /// Insert or replace a user record.
    pub fn upsert_user(&self, user: &UserRecord) -> PulseResult<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO users ({USER_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            params![
                user.id,
                user.email,
                user.monthly_income,
                user.monthly_expenses,
                user.savings,
                user.debt,
                user.risk_tolerance,
                user.intervention_level,
                user.health_score,
                user.login_count,
                user.activity_count as i64,
                user.last_active_at.map(ts),
                ts(user.created_at),
            ],
        )?;
        Ok(())
    }

    /// Record a completed transaction. Returns its id.
    pub fn add_transaction(
        &self,
        user_id: &str,
        amount: f64,
        category: &str,
        merchant: Option<&str>,
        occurred_at: DateTime<Utc>,
    ) -> PulseResult<Uuid> {
        let id = Uuid::new_v4();
        let conn = self.conn()?;
        conn.execute(
            r#"INSERT INTO transactions (id, user_id, amount, category, description, merchant, occurred_at)
               VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)"#,
            params![id.to_string(), user_id, amount, category, merchant, ts(occurred_at)],
        )?;
        Ok(id)
    }

    /// Set the monthly budget for a user's category.
    pub fn set_budget(&self, user_id: &str, category: &str, amount: f64) -> PulseResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO budgets (user_id, category, amount) VALUES (?1, ?2, ?3)",
            params![user_id, category, amount],
        )?;
        Ok(())
    }

    /// Number of interventions in the ledger for a user.
    pub fn count_interventions(&self, user_id: &str) -> PulseResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM interventions WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> PulseResult<UserRecord> {
        let last_active_at: Option<String> = row.get(11)?;
        let created_at: String = row.get(12)?;
        let activity_count: i64 = row.get(10)?;

        Ok(UserRecord {
            id: row.get(0)?,
            email: row.get(1)?,
            monthly_income: row.get(2)?,
            monthly_expenses: row.get(3)?,
            savings: row.get(4)?,
            debt: row.get(5)?,
            risk_tolerance: row.get(6)?,
            intervention_level: row.get(7)?,
            health_score: row.get(8)?,
            login_count: row.get(9)?,
            activity_count: activity_count.max(0) as u64,
            last_active_at: last_active_at.as_deref().map(parse_ts).transpose()?,
            created_at: parse_ts(&created_at)?,
        })
    }

    fn row_to_intervention(row: &rusqlite::Row<'_>) -> PulseResult<Intervention> {
        let id: String = row.get(0)?;
        let kind: String = row.get(2)?;
        let trigger: String = row.get(3)?;
        let context: String = row.get(5)?;
        let analysis: String = row.get(6)?;
        let channel: String = row.get(7)?;
        let priority: u8 = row.get(8)?;
        let sent_at: Option<String> = row.get(9)?;
        let status: String = row.get(10)?;
        let feedback: Option<String> = row.get(11)?;
        let learning: Option<String> = row.get(12)?;
        let created_at: String = row.get(13)?;

        Ok(Intervention {
            id: Uuid::parse_str(&id).map_err(|e| PulseError::parse(e.to_string()))?,
            user_id: row.get(1)?,
            kind: kind.parse().map_err(|_| PulseError::parse(format!("Unknown intervention type '{}'", kind)))?,
            trigger: trigger.parse().map_err(|_| PulseError::parse(format!("Unknown trigger '{}'", trigger)))?,
            category: row.get(4)?,
            context: serde_json::from_str(&context)?,
            analysis: serde_json::from_str(&analysis)?,
            delivery: Delivery {
                channel: channel.parse().map_err(|_| PulseError::parse(format!("Unknown channel '{}'", channel)))?,
                priority,
                sent_at: sent_at.as_deref().map(parse_ts).transpose()?,
            },
            status: status.parse().map_err(|_| PulseError::parse(format!("Unknown status '{}'", status)))?,
            feedback: feedback.as_deref().map(serde_json::from_str).transpose()?,
            learning: learning.as_deref().map(serde_json::from_str).transpose()?,
            created_at: parse_ts(&created_at)?,
        })
    }
}

#[async_trait]
impl FinanceStore for SqliteFinanceStore {
    async fn get_user(&self, user_id: &str) -> PulseResult<Option<UserRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
        stmt.query_row(params![user_id], |row| Ok(Self::row_to_user(row)))
            .optional()?
            .transpose()
    }

    async fn record_user_activity(&self, user_id: &str, at: DateTime<Utc>) -> PulseResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"UPDATE users SET
               activity_count = activity_count + 1,
               last_active_at = CASE
                   WHEN last_active_at IS NULL OR last_active_at < ?2 THEN ?2
                   ELSE last_active_at
               END
               WHERE id = ?1"#,
            params![user_id, ts(at)],
        )?;
        Ok(())
    }

    async fn category_spend(
        &self,
        user_id: &str,
        category: &str,
        since: DateTime<Utc>,
    ) -> PulseResult<SpendSummary> {
        let conn = self.conn()?;
        let (total, count): (f64, i64) = conn.query_row(
            r#"SELECT COALESCE(SUM(amount), 0.0), COUNT(*) FROM transactions
               WHERE user_id = ?1 AND category = ?2 AND occurred_at >= ?3"#,
            params![user_id, category, ts(since)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(SpendSummary {
            total,
            count: count.max(0) as u64,
        })
    }

    async fn get_budget(&self, user_id: &str, category: &str) -> PulseResult<Option<f64>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT amount FROM budgets WHERE user_id = ?1 AND category = ?2",
                params![user_id, category],
                |row| row.get(0),
            )
            .optional()?)
    }

    async fn create_intervention(&self, intervention: &Intervention) -> PulseResult<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO interventions ({INTERVENTION_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                intervention.id.to_string(),
                intervention.user_id,
                intervention.kind.as_ref(),
                intervention.trigger.as_ref(),
                intervention.category,
                serde_json::to_string(&intervention.context)?,
                serde_json::to_string(&intervention.analysis)?,
                intervention.delivery.channel.as_ref(),
                intervention.delivery.priority,
                intervention.delivery.sent_at.map(ts),
                intervention.status.as_ref(),
                intervention.feedback.as_ref().map(serde_json::to_string).transpose()?,
                intervention.learning.as_ref().map(serde_json::to_string).transpose()?,
                ts(intervention.created_at),
            ],
        )?;
        Ok(())
    }

    async fn get_intervention(&self, id: Uuid) -> PulseResult<Option<Intervention>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {INTERVENTION_COLUMNS} FROM interventions WHERE id = ?1"
        ))?;
        stmt.query_row(params![id.to_string()], |row| Ok(Self::row_to_intervention(row)))
            .optional()?
            .transpose()
    }

    async fn mark_delivered(&self, id: Uuid, at: DateTime<Utc>) -> PulseResult<bool> {
        let conn = self.conn()?;
        // Never moves an acknowledged intervention back.
        let updated = conn.execute(
            r#"UPDATE interventions SET
               sent_at = COALESCE(sent_at, ?2),
               status = CASE WHEN status = ?3 THEN ?4 ELSE status END
               WHERE id = ?1"#,
            params![
                id.to_string(),
                ts(at),
                InterventionStatus::Created.as_ref(),
                InterventionStatus::Delivered.as_ref(),
            ],
        )?;
        Ok(updated > 0)
    }

    async fn record_feedback(
        &self,
        id: Uuid,
        feedback: &Feedback,
        metrics: &LearningMetrics,
    ) -> PulseResult<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE interventions SET feedback = ?2, learning = ?3, status = ?4 WHERE id = ?1",
            params![
                id.to_string(),
                serde_json::to_string(feedback)?,
                serde_json::to_string(metrics)?,
                InterventionStatus::Acknowledged.as_ref(),
            ],
        )?;
        Ok(updated > 0)
    }

    async fn list_interventions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> PulseResult<Vec<Intervention>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {INTERVENTION_COLUMNS} FROM interventions \
             WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![user_id, limit as i64], |row| {
            Ok(Self::row_to_intervention(row))
        })?;

        let mut interventions = Vec::new();
        for row in rows {
            interventions.push(row??);
        }
        Ok(interventions)
    }

    async fn highest_goal_milestone(
        &self,
        user_id: &str,
        goal_id: &str,
    ) -> PulseResult<Option<u8>> {
        let conn = self.conn()?;
        let highest: Option<i64> = conn.query_row(
            r#"SELECT MAX(CAST(json_extract(context, '$.milestone') AS INTEGER))
               FROM interventions
               WHERE user_id = ?1
               AND type = 'goal_progress'
               AND json_extract(context, '$.goal_id') = ?2"#,
            params![user_id, goal_id],
            |row| row.get(0),
        )?;
        Ok(highest.and_then(|m| u8::try_from(m).ok()))
    }

    async fn users_needing_engagement(
        &self,
        inactive_before: DateTime<Utc>,
    ) -> PulseResult<Vec<UserRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {USER_COLUMNS} FROM users u
               WHERE COALESCE(u.last_active_at, u.created_at) < ?1
               AND NOT EXISTS (
                   SELECT 1 FROM interventions i
                   WHERE i.user_id = u.id
                   AND i.type = 'engagement'
                   AND i.created_at >= COALESCE(u.last_active_at, u.created_at)
               )
               ORDER BY u.id"#
        ))?;
        let rows = stmt.query_map(params![ts(inactive_before)], |row| Ok(Self::row_to_user(row)))?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row??);
        }
        Ok(users)
    }
}

/// Fixed-width UTC timestamp so lexicographic order matches time order.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> PulseResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PulseError::parse(e.to_string()))
}
