//! # mb-db-sqlite Implementation
//!
//! Maps the generic `RelationalStore` contract (JSON rows keyed by column)
//! onto SQLite tables, and answers `ProfileStore` lookups from the `doctors`
//! and `user` tables.

use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use mb_config::{is_identifier, DatabaseConfig, TablesConfig};
use mb_core::{ProfileStore, RelationalStore};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

pub struct SqliteStore {
    pool: SqlitePool,
    tables: TablesConfig,
}

fn ensure_identifier(name: &str) -> anyhow::Result<()> {
    if !is_identifier(name) {
        anyhow::bail!("invalid identifier {name:?}");
    }
    Ok(())
}

impl SqliteStore {
    /// Opens `url` with the default table names and creates missing tables.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        Self::open(url, 5, TablesConfig::default()).await
    }

    pub async fn connect(db: &DatabaseConfig, tables: TablesConfig) -> anyhow::Result<Self> {
        Self::open(db.url.expose_secret(), db.max_connections, tables).await
    }

    async fn open(url: &str, max_connections: u32, tables: TablesConfig) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .context("parsing database url")?
            .create_if_missing(true);

        // Every in-memory connection is its own database, so keep exactly one alive.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options)
                .await?
        };

        let store = Self { pool, tables };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the four tables the pipeline reads and writes, if absent.
    async fn migrate(&self) -> anyhow::Result<()> {
        let t = &self.tables;
        for name in [&t.posts, &t.doctors, &t.users, &t.alerts] {
            ensure_identifier(name)?;
        }

        let statements = [
            format!(
                r#"CREATE TABLE IF NOT EXISTS "{}" (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    "userId" TEXT NOT NULL,
                    "userName" TEXT NOT NULL,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    location TEXT NOT NULL,
                    "imageLink" TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                )"#,
                t.posts
            ),
            format!(r#"CREATE TABLE IF NOT EXISTS "{}" ("userId" TEXT PRIMARY KEY)"#, t.doctors),
            format!(
                r#"CREATE TABLE IF NOT EXISTS "{}" ("userId" TEXT PRIMARY KEY, "userName" TEXT NOT NULL)"#,
                t.users
            ),
            format!(
                r#"CREATE TABLE IF NOT EXISTS "{}" (id INTEGER PRIMARY KEY, title TEXT NOT NULL, message TEXT NOT NULL)"#,
                t.alerts
            ),
        ];
        for sql in &statements {
            sqlx::query(sql).execute(&self.pool).await?;
        }
        tracing::debug!("sqlite schema ready");
        Ok(())
    }
}

fn bind_json<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        // Nested structures are stored as their JSON text.
        other => query.bind(other.to_string()),
    }
}

fn row_to_json(row: &SqliteRow) -> anyhow::Result<Value> {
    let mut object = Map::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let storage_class = {
            let raw = row.try_get_raw(idx)?;
            if raw.is_null() {
                None
            } else {
                Some(raw.type_info().name().to_string())
            }
        };
        let value = match storage_class.as_deref() {
            None => Value::Null,
            Some("INTEGER") | Some("BOOLEAN") => Value::from(row.try_get::<i64, _>(idx)?),
            Some("REAL") => Value::from(row.try_get::<f64, _>(idx)?),
            Some("BLOB") => {
                let bytes: Vec<u8> = row.try_get(idx)?;
                Value::from(String::from_utf8_lossy(&bytes).into_owned())
            }
            Some(_) => Value::from(row.try_get::<String, _>(idx)?),
        };
        object.insert(column.name().to_string(), value);
    }
    Ok(Value::Object(object))
}

#[async_trait]
impl RelationalStore for SqliteStore {
    async fn insert(&self, table: &str, record: Value) -> anyhow::Result<()> {
        ensure_identifier(table)?;
        let Value::Object(fields) = record else {
            anyhow::bail!("record for table {table} must be a JSON object");
        };
        if fields.is_empty() {
            anyhow::bail!("record for table {table} has no columns");
        }

        let mut columns = Vec::with_capacity(fields.len());
        for key in fields.keys() {
            ensure_identifier(key)?;
            columns.push(format!("\"{key}\""));
        }
        let placeholders = vec!["?"; fields.len()].join(", ");
        let sql = format!(
            "INSERT INTO \"{table}\" ({}) VALUES ({placeholders})",
            columns.join(", ")
        );

        let mut query = sqlx::query(&sql);
        for value in fields.values() {
            query = bind_json(query, value);
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    async fn select_all(&self, table: &str) -> anyhow::Result<Vec<Value>> {
        ensure_identifier(table)?;
        let sql = format!("SELECT * FROM \"{table}\" ORDER BY rowid");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_json).collect()
    }
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn has_doctor_record(&self, user_id: &str) -> anyhow::Result<bool> {
        let sql = format!(
            "SELECT 1 FROM \"{}\" WHERE \"userId\" = ? LIMIT 1",
            self.tables.doctors
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn display_name(&self, user_id: &str) -> anyhow::Result<String> {
        let sql = format!(
            "SELECT \"userName\" FROM \"{}\" WHERE \"userId\" = ?",
            self.tables.users
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get("userName")?),
            None => anyhow::bail!("no profile for user {user_id}"),
        }
    }
}
