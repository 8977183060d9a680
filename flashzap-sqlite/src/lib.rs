use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};
use flashzap_core::{repo::Repository, Card, CardId, CoreError, NewCard};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::debug;

const CARD_COLUMNS: &str = "id,front,back,mastery_level,next_review_date,created_at";

pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    pub async fn open_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|_| CoreError::Storage("sqlite connect"))?;
        debug!(path = %path.as_ref().display(), "opened sqlite store");
        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    pub async fn open_memory() -> Result<Self, CoreError> {
        // Each connection to :memory: is its own database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|_| CoreError::Storage("sqlite connect"))?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    async fn ensure_schema(&self) -> Result<(), CoreError> {
        const STMT: &str = r#"
        CREATE TABLE IF NOT EXISTS cards (
          id                TEXT PRIMARY KEY,
          front             TEXT NOT NULL,
          back              TEXT NOT NULL,
          mastery_level     INTEGER NOT NULL DEFAULT 0,
          next_review_date  INTEGER,
          created_at        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_cards_next_review ON cards (next_review_date);
        "#;

        // Execute statements one by one for compatibility.
        for chunk in STMT.split(';') {
            let sql = chunk.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|_| CoreError::Storage("sqlite schema"))?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Repository for SqliteRepo {
    async fn add_card(&self, card: NewCard) -> Result<Card, CoreError> {
        let card = card.into_card();
        sqlx::query(
            r#"
            INSERT INTO cards (id, front, back, mastery_level, next_review_date, created_at)
            VALUES (?,?,?,?,?,?)
            "#,
        )
        .bind(card.id.to_string())
        .bind(&card.front)
        .bind(&card.back)
        .bind(card.mastery_level as i64)
        .bind(card.next_review_date.map(date_to_days))
        .bind(dt_to_str(card.created_at))
        .execute(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("insert card"))?;
        Ok(card)
    }

    async fn get_card(&self, id: CardId) -> Result<Card, CoreError> {
        let row = sqlx::query(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE id=?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("read card"))?;
        let row = row.ok_or(CoreError::NotFound("card"))?;
        row_into_card(row)
    }

    async fn list_cards(&self) -> Result<Vec<Card>, CoreError> {
        let rows = sqlx::query(&format!("SELECT {CARD_COLUMNS} FROM cards ORDER BY created_at ASC, id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("list cards"))?;
        rows.into_iter().map(row_into_card).collect()
    }

    async fn find_due(&self, today: NaiveDate) -> Result<Vec<Card>, CoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {CARD_COLUMNS} FROM cards
             WHERE next_review_date IS NULL OR next_review_date <= ?
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(date_to_days(today))
        .fetch_all(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("find due"))?;
        rows.into_iter().map(row_into_card).collect()
    }

    async fn update_card(&self, card: &Card) -> Result<Card, CoreError> {
        let res = sqlx::query(
            r#"
            UPDATE cards SET
              front=?, back=?, mastery_level=?, next_review_date=?
            WHERE id=?
            "#,
        )
        .bind(&card.front)
        .bind(&card.back)
        .bind(card.mastery_level as i64)
        .bind(card.next_review_date.map(date_to_days))
        .bind(card.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("update card"))?;
        if res.rows_affected() == 0 {
            return Err(CoreError::NotFound("card"));
        }
        Ok(card.clone())
    }

    async fn delete_card(&self, id: CardId) -> Result<(), CoreError> {
        let res = sqlx::query("DELETE FROM cards WHERE id=?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("del card"))?;
        if res.rows_affected() == 0 {
            return Err(CoreError::NotFound("card"));
        }
        Ok(())
    }
}

// ===== Helpers =====
fn uuid_from_str(s: String) -> Result<uuid::Uuid, CoreError> {
    uuid::Uuid::parse_str(&s).map_err(|_| CoreError::Invalid("uuid"))
}

// Fixed-width so that text order is time order.
fn dt_to_str(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn dt_from_str(s: String) -> Result<DateTime<Utc>, CoreError> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map_err(|_| CoreError::Invalid("datetime"))
        .map(|dt| dt.with_timezone(&Utc))
}

// Day numbers rather than text: years past 9999 format with a sign and
// would no longer sort as dates.
fn date_to_days(d: NaiveDate) -> i64 {
    i64::from(d.num_days_from_ce())
}

fn date_from_days(n: i64) -> Result<NaiveDate, CoreError> {
    i32::try_from(n)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or(CoreError::Invalid("date"))
}

fn row_into_card(row: SqliteRow) -> Result<Card, CoreError> {
    let level = row.get::<i64, _>("mastery_level");
    Ok(Card {
        id: uuid_from_str(row.get::<String, _>("id"))?,
        front: row.get::<String, _>("front"),
        back: row.get::<String, _>("back"),
        mastery_level: u32::try_from(level).map_err(|_| CoreError::Invalid("mastery level"))?,
        next_review_date: row
            .get::<Option<i64>, _>("next_review_date")
            .map(date_from_days)
            .transpose()?,
        created_at: dt_from_str(row.get::<String, _>("created_at"))?,
    })
}
