use anyhow::Result;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqlitePool};
use std::sync::Arc;

use shared::{Mark, ReviewStatus};

// The database URL for the production database, overridable via env
const DEFAULT_DATABASE_URL: &str = "sqlite:marks.db";

/// Fields of a mark that has not been persisted yet. `review_status`
/// always starts as `pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMark {
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub exam_date: NaiveDate,
    pub subject: String,
    pub marks_obtained: f64,
    pub max_marks: f64,
}

/// DbConnection owns the pool and every query against the marks table.
/// The `(name, subject)` UNIQUE constraint lives here and is the
/// authoritative enforcement; service-level checks are a fast path.
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new database connection
    pub async fn new(url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        let pool = SqlitePool::connect(url).await?;
        Self::setup_schema(&pool).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Initialize the standard database
    pub async fn init() -> Result<Self> {
        let url = std::env::var("MARKS_DATABASE_URL")
            .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        Self::new(&url).await
    }

    /// Initialize a test database with a unique name
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    /// Set up the required database schema
    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS marks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                date_of_birth TEXT NOT NULL,
                exam_date TEXT NOT NULL,
                subject TEXT NOT NULL,
                marks_obtained REAL NOT NULL,
                max_marks REAL NOT NULL,
                review_status TEXT NOT NULL DEFAULT 'pending',
                UNIQUE (name, subject)
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// All marks ordered by (name, subject)
    pub async fn list_marks(&self) -> Result<Vec<Mark>> {
        let rows = sqlx::query("SELECT * FROM marks ORDER BY name, subject")
            .fetch_all(&*self.pool)
            .await?;
        rows.iter().map(row_to_mark).collect()
    }

    /// Retrieve a mark by id
    pub async fn get_mark(&self, id: i64) -> Result<Option<Mark>> {
        let row = sqlx::query("SELECT * FROM marks WHERE id = ?")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_mark(&r)?)),
            None => Ok(None),
        }
    }

    /// One student's marks ordered by exam date (oldest first)
    pub async fn marks_by_student(&self, name: &str) -> Result<Vec<Mark>> {
        let rows = sqlx::query("SELECT * FROM marks WHERE name = ? ORDER BY exam_date")
            .bind(name)
            .fetch_all(&*self.pool)
            .await?;
        rows.iter().map(row_to_mark).collect()
    }

    /// Insert a new mark and return it with its assigned id
    pub async fn insert_mark(&self, new: &NewMark) -> Result<Mark> {
        let result = sqlx::query(
            r#"
            INSERT INTO marks (name, date_of_birth, exam_date, subject, marks_obtained, max_marks, review_status)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.name)
        .bind(new.date_of_birth)
        .bind(new.exam_date)
        .bind(&new.subject)
        .bind(new.marks_obtained)
        .bind(new.max_marks)
        .bind(ReviewStatus::Pending.as_str())
        .execute(&*self.pool)
        .await?;

        Ok(Mark {
            id: result.last_insert_rowid(),
            name: new.name.clone(),
            date_of_birth: new.date_of_birth,
            exam_date: new.exam_date,
            subject: new.subject.clone(),
            marks_obtained: new.marks_obtained,
            max_marks: new.max_marks,
            review_status: ReviewStatus::Pending,
        })
    }

    /// Persist every field of an existing mark
    pub async fn update_mark(&self, mark: &Mark) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE marks
            SET name = ?, date_of_birth = ?, exam_date = ?, subject = ?,
                marks_obtained = ?, max_marks = ?, review_status = ?
            WHERE id = ?
            "#,
        )
        .bind(&mark.name)
        .bind(mark.date_of_birth)
        .bind(mark.exam_date)
        .bind(&mark.subject)
        .bind(mark.marks_obtained)
        .bind(mark.max_marks)
        .bind(mark.review_status.as_str())
        .bind(mark.id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// Delete a mark by id. Returns true if a row was removed.
    pub async fn delete_mark(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM marks WHERE id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// How many subject records a student already has
    pub async fn count_by_student(&self, name: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM marks WHERE name = ?")
            .bind(name)
            .fetch_one(&*self.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// Whether a `(name, subject)` record exists, optionally ignoring one id
    pub async fn exists_name_subject(
        &self,
        name: &str,
        subject: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        let row = match exclude_id {
            Some(id) => {
                sqlx::query("SELECT 1 FROM marks WHERE name = ? AND subject = ? AND id != ?")
                    .bind(name)
                    .bind(subject)
                    .bind(id)
                    .fetch_optional(&*self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT 1 FROM marks WHERE name = ? AND subject = ?")
                    .bind(name)
                    .bind(subject)
                    .fetch_optional(&*self.pool)
                    .await?
            }
        };
        Ok(row.is_some())
    }

    /// Set the review status of every listed id in one statement.
    /// Missing ids are skipped; returns the number of rows updated.
    pub async fn set_review_status(&self, ids: &[i64], status: ReviewStatus) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "UPDATE marks SET review_status = ? WHERE id IN ({})",
            placeholders
        );
        let mut query = sqlx::query(&sql).bind(status.as_str());
        for id in ids {
            query = query.bind(id);
        }
        let result = query.execute(&*self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Reset a mark back to `pending`, but only from `pass` or `fail`.
    /// Returns the number of rows updated (0 or 1).
    pub async fn reset_review_status(&self, id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE marks SET review_status = 'pending' WHERE id = ? AND review_status IN ('pass', 'fail')",
        )
        .bind(id)
        .execute(&*self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Whether a storage error is the `(name, subject)` UNIQUE constraint firing
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    }
}

fn row_to_mark(row: &SqliteRow) -> Result<Mark> {
    let status: String = row.get("review_status");
    let review_status =
        ReviewStatus::from_str_lower(&status).map_err(|e| anyhow::anyhow!(e))?;
    Ok(Mark {
        id: row.get("id"),
        name: row.get("name"),
        date_of_birth: row.get("date_of_birth"),
        exam_date: row.get("exam_date"),
        subject: row.get("subject"),
        marks_obtained: row.get("marks_obtained"),
        max_marks: row.get("max_marks"),
        review_status,
    })
}
