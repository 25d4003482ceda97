//! PostgreSQL adapter backed by a sqlx connection pool
//!
//! Reflection goes through `information_schema.columns`, so the adapter sees
//! exactly what the catalog reports. Extracted values are decoded into the
//! canonical [`SqlValue`] set by matching on the column's Postgres type; a
//! type outside that set is a loud error rather than a silent stringification.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo};
use tracing::debug;

use tabsync_common::{Result, SyncError};

use super::{qualified, DbAdapter, ReflectedColumn, Row, SqlValue, TableDescriptor, WATERMARK_PARAM};

/// Default maximum pool size per named connection.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const REFLECT_COLUMNS_SQL: &str = "\
    SELECT column_name, data_type \
    FROM information_schema.columns \
    WHERE table_name = $1 \
      AND table_schema = COALESCE($2, current_schema()) \
    ORDER BY ordinal_position";

/// A named Postgres connection.
pub struct PostgresAdapter {
    name: String,
    pool: PgPool,
}

impl PostgresAdapter {
    /// Wrap an existing pool.
    pub fn new(name: impl Into<String>, pool: PgPool) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }

    /// Connect to `url` with a bounded pool.
    pub async fn connect(name: impl Into<String>, url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(db_err)?;

        Ok(Self::new(name, pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DbAdapter for PostgresAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn select(&self, sql: &str, watermark: Option<&SqlValue>) -> Result<Vec<Row>> {
        let has_param = sql.contains(WATERMARK_PARAM);

        let (sql, bound) = if has_param {
            match watermark {
                Some(value) => (sql.replace(WATERMARK_PARAM, "$1"), Some(value)),
                // No watermark yet: the placeholder degrades to a literal
                // NULL, so the comparison admits no rows by itself.
                None => (sql.replace(WATERMARK_PARAM, "NULL"), None),
            }
        } else {
            (sql.to_string(), None)
        };

        let mut query = sqlx::query(&sql);
        if let Some(value) = bound {
            query = bind_value(query, value);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        // Statements may contain several semicolon-separated commands
        // (replace-create, move, merge), so use the simple query protocol.
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn load_rows(
        &self,
        table: &str,
        schema: Option<&str>,
        columns: &[String],
        rows: &[Row],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let placeholders = (1..=columns.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            qualified(table, schema),
            columns.join(", "),
            placeholders
        );

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for row in rows {
            let mut query = sqlx::query(&sql);
            for value in row {
                query = bind_value(query, value);
            }
            query.execute(&mut *tx).await.map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;

        debug!(
            connection = %self.name,
            table = %qualified(table, schema),
            rows = rows.len(),
            "loaded rows"
        );

        Ok(rows.len() as u64)
    }

    async fn get_table(
        &self,
        table: &str,
        schema: Option<&str>,
    ) -> Result<Option<TableDescriptor>> {
        let rows = sqlx::query(REFLECT_COLUMNS_SQL)
            .bind(table)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            columns.push(ReflectedColumn {
                name: row.try_get::<String, _>("column_name").map_err(db_err)?,
                data_type: row.try_get::<String, _>("data_type").map_err(db_err)?,
            });
        }

        Ok(Some(TableDescriptor {
            table: table.to_string(),
            schema: schema.map(String::from),
            columns,
        }))
    }
}

fn db_err(err: sqlx::Error) -> SyncError {
    SyncError::database(err.to_string())
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Timestamp(v) => query.bind(*v),
    }
}

fn decode_row(row: &PgRow) -> Result<Row> {
    let mut out = Vec::with_capacity(row.len());

    for (i, column) in row.columns().iter().enumerate() {
        let value = match column.type_info().name() {
            "BOOL" => row
                .try_get::<Option<bool>, _>(i)
                .map_err(db_err)?
                .map(SqlValue::Bool),
            "INT2" => row
                .try_get::<Option<i16>, _>(i)
                .map_err(db_err)?
                .map(|v| SqlValue::Int(v.into())),
            "INT4" => row
                .try_get::<Option<i32>, _>(i)
                .map_err(db_err)?
                .map(|v| SqlValue::Int(v.into())),
            "INT8" => row
                .try_get::<Option<i64>, _>(i)
                .map_err(db_err)?
                .map(SqlValue::Int),
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(i)
                .map_err(db_err)?
                .map(|v| SqlValue::Float(v.into())),
            "FLOAT8" => row
                .try_get::<Option<f64>, _>(i)
                .map_err(db_err)?
                .map(SqlValue::Float),
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(i)
                .map_err(db_err)?
                .map(SqlValue::Timestamp),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(i)
                .map_err(db_err)?
                .map(|v| SqlValue::Timestamp(v.and_utc())),
            // Arbitrary-precision; carried as text to avoid float rounding.
            "NUMERIC" => row
                .try_get::<Option<sqlx::types::BigDecimal>, _>(i)
                .map_err(db_err)?
                .map(|v| SqlValue::Text(v.to_string())),
            "DATE" => row
                .try_get::<Option<NaiveDate>, _>(i)
                .map_err(db_err)?
                .map(|v| SqlValue::Text(v.to_string())),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row
                .try_get::<Option<String>, _>(i)
                .map_err(db_err)?
                .map(SqlValue::Text),
            other => {
                return Err(SyncError::database(format!(
                    "unsupported column type '{}' for column '{}'",
                    other,
                    column.name()
                )))
            }
        };

        out.push(value.unwrap_or(SqlValue::Null));
    }

    Ok(out)
}
