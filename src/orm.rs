//! Minimal async database layer (sqlite + sqlx)
//!
//! Usage:
//! let db = Db::connect("sqlite::memory:").await?;
//! db.execute("CREATE TABLE ...").await?;
//! let columns = db.columns("users").await?;
//!
//! `Db` implements [`Connection`], the DDL surface the schema executor
//! talks to.
use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, SqlitePool};
use std::str::FromStr;

use crate::schema::{ColumnOptions, IndexOptions, PRIMARY_KEY};

/// An async database pool wrapper.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

/// One column of a table being created.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: String,
    pub options: ColumnOptions,
}

/// Column-by-column description of a `CREATE TABLE`.
///
/// An auto-incrementing integer `id` primary key is always created first.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        TableDefinition {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(
        &mut self,
        name: impl Into<String>,
        column_type: impl Into<String>,
        options: ColumnOptions,
    ) -> &mut Self {
        self.columns.push(ColumnDefinition {
            name: name.into(),
            column_type: column_type.into(),
            options,
        });
        self
    }

    /// `created_at` and `updated_at`, both `datetime NOT NULL`.
    pub fn timestamps(&mut self) -> &mut Self {
        self.column("created_at", "datetime", ColumnOptions::not_null())
            .column("updated_at", "datetime", ColumnOptions::not_null())
    }
}

/// A column as reported by the database.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub sql_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

impl ColumnInfo {
    /// The abstract column type behind the declared SQL type (`varchar(100)` -> `string`).
    pub fn column_type(&self) -> String {
        let base = self
            .sql_type
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match base.as_str() {
            "varchar" | "character varying" => "string".to_string(),
            "blob" => "binary".to_string(),
            "real" | "double" => "float".to_string(),
            _ => base,
        }
    }
}

/// An index as reported by the database.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// DDL and introspection operations the schema executor relies on.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn create_table(&self, table: &TableDefinition) -> Result<(), sqlx::Error>;
    async fn add_index(
        &self,
        table: &str,
        columns: &[String],
        options: &IndexOptions,
    ) -> Result<(), sqlx::Error>;
    async fn drop_table(&self, table: &str) -> Result<(), sqlx::Error>;
    async fn table_exists(&self, table: &str) -> Result<bool, sqlx::Error>;
    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>, sqlx::Error>;
    async fn indexes(&self, table: &str) -> Result<Vec<IndexInfo>, sqlx::Error>;
}

// Simple helper to escape single quotes for SQL
fn escape_sql_quote(sql: &str) -> String {
    sql.replace('\'', "''")
}

/// Double-quote an identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render a default value as a SQLite literal.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", escape_sql_quote(s)),
        other => format!("'{}'", escape_sql_quote(&other.to_string())),
    }
}

/// Physical SQLite type for an ActiveRecord column type.
pub fn sqlite_type(column_type: &str, options: &ColumnOptions) -> String {
    match column_type {
        "string" => match options.limit {
            Some(limit) => format!("varchar({})", limit),
            None => "varchar".to_string(),
        },
        "binary" => "blob".to_string(),
        "decimal" => match (options.precision, options.scale) {
            (Some(p), Some(s)) => format!("decimal({},{})", p, s),
            (Some(p), None) => format!("decimal({})", p),
            _ => "decimal".to_string(),
        },
        other => other.to_string(),
    }
}

/// `index_<table>_on_<col>[_and_<col>...]`
pub fn index_name(table: &str, columns: &[String]) -> String {
    format!("index_{}_on_{}", table, columns.join("_and_"))
}

/// `CREATE TABLE` statement for a table definition.
pub fn create_table_sql(table: &TableDefinition) -> String {
    let mut columns = vec![format!(
        "{} integer PRIMARY KEY AUTOINCREMENT NOT NULL",
        quote_ident(PRIMARY_KEY)
    )];
    for column in &table.columns {
        let mut sql = format!(
            "{} {}",
            quote_ident(&column.name),
            sqlite_type(&column.column_type, &column.options)
        );
        if column.options.null == Some(false) {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &column.options.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&sql_literal(default));
        }
        columns.push(sql);
    }
    format!(
        "CREATE TABLE {} ({})",
        quote_ident(&table.name),
        columns.join(", ")
    )
}

/// `CREATE [UNIQUE] INDEX` statement.
pub fn add_index_sql(table: &str, columns: &[String], options: &IndexOptions) -> String {
    let name = options
        .name
        .clone()
        .unwrap_or_else(|| index_name(table, columns));
    let columns: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        if options.unique { "UNIQUE " } else { "" },
        quote_ident(&name),
        quote_ident(table),
        columns.join(", ")
    )
}

fn is_memory_uri(uri: &str) -> bool {
    uri.contains(":memory:") || uri.contains("mode=memory")
}

impl Db {
    /// Connect (or create) a SQLite database at the given URI
    ///
    /// In-memory databases are served by a single long-lived connection so
    /// every statement sees the same database.
    pub async fn connect(uri: &str) -> Result<Self, sqlx::Error> {
        info!("Connecting to SQLite database at URI: {}", uri);
        let options = SqliteConnectOptions::from_str(uri)?.create_if_missing(true);
        let pool = if is_memory_uri(uri) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };
        info!("Connected to SQLite database: {}", uri);
        Ok(Db { pool })
    }

    /// Execute an arbitrary SQL statement, e.g. DDL, INSERT, UPDATE.
    pub async fn execute(&self, sql: &str) -> Result<(), sqlx::Error> {
        debug!("Executing SQL: {}", sql);
        let result = self.pool.execute(sql).await;
        match &result {
            Ok(_) => debug!("SQL executed successfully"),
            Err(e) => log::error!("SQL execution failed: {}", e),
        }
        result.map(|_| ())
    }

    async fn pragma(&self, sql: &str) -> Result<Vec<SqliteRow>, sqlx::Error> {
        debug!("Running PRAGMA: {}", sql);
        sqlx::query(sql).fetch_all(&self.pool).await
    }
}

#[async_trait]
impl Connection for Db {
    async fn create_table(&self, table: &TableDefinition) -> Result<(), sqlx::Error> {
        self.execute(&create_table_sql(table)).await
    }

    async fn add_index(
        &self,
        table: &str,
        columns: &[String],
        options: &IndexOptions,
    ) -> Result<(), sqlx::Error> {
        self.execute(&add_index_sql(table, columns, options)).await
    }

    async fn drop_table(&self, table: &str) -> Result<(), sqlx::Error> {
        self.execute(&format!("DROP TABLE {}", quote_ident(table)))
            .await
    }

    async fn table_exists(&self, table: &str) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>, sqlx::Error> {
        self.pragma(&format!("PRAGMA table_info({})", quote_ident(table)))
            .await?
            .into_iter()
            .map(|row| -> Result<ColumnInfo, sqlx::Error> {
                Ok(ColumnInfo {
                    name: row.try_get("name")?,
                    sql_type: row.try_get("type")?,
                    not_null: row.try_get::<i64, _>("notnull")? != 0,
                    default: row.try_get("dflt_value")?,
                    primary_key: row.try_get::<i64, _>("pk")? != 0,
                })
            })
            .collect()
    }

    async fn indexes(&self, table: &str) -> Result<Vec<IndexInfo>, sqlx::Error> {
        let mut indexes = Vec::new();
        for row in self
            .pragma(&format!("PRAGMA index_list({})", quote_ident(table)))
            .await?
        {
            let origin: String = row.try_get("origin")?;
            if origin == "pk" {
                continue;
            }
            let name: String = row.try_get("name")?;
            let unique = row.try_get::<i64, _>("unique")? != 0;
            let columns = self
                .pragma(&format!("PRAGMA index_info({})", quote_ident(&name)))
                .await?
                .into_iter()
                .filter_map(|r| r.try_get::<Option<String>, _>("name").transpose())
                .collect::<Result<Vec<String>, sqlx::Error>>()?;
            indexes.push(IndexInfo {
                name,
                columns,
                unique,
            });
        }
        Ok(indexes)
    }
}
