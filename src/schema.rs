//! Live database schema introspection.
//!
//! One reader serves both supported backends behind a single connection
//! pool: SQLite is introspected through its catalog pragmas, MySQL through
//! the standard `information_schema` views, and both are normalized to the
//! same column/foreign-key/index shapes.
//!
//! Every query is defensive — a backend error yields an empty collection
//! for that table rather than propagating — and results are cached per
//! table for the duration of the run. The connection is only ever read
//! from; the reader issues no statement that could mutate schema or data.

use std::collections::HashMap;
use std::sync::{Mutex, Once};

use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};

use crate::error::{AnalyzerError, AnalyzerResult};
use crate::migrate::SchemaSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    MySql,
}

/// Normalized column metadata.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    /// Key role: `PRI` for primary-key columns, empty otherwise.
    pub key: String,
    pub default: Option<String>,
}

/// Normalized foreign-key constraint metadata.
#[derive(Debug, Clone)]
pub struct ForeignKeyInfo {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub update_rule: String,
    pub delete_rule: String,
}

/// One column of one index.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub name: String,
    pub column: String,
    pub unique: bool,
    pub seq_in_index: i64,
}

#[derive(Debug, Default)]
struct SchemaCache {
    tables: Option<Vec<String>>,
    columns: HashMap<String, Vec<ColumnInfo>>,
    foreign_keys: HashMap<String, Vec<ForeignKeyInfo>>,
    indexes: HashMap<String, Vec<IndexInfo>>,
}

/// Cached, read-only view of the connected database's schema.
#[derive(Debug)]
pub struct SchemaReader {
    pool: AnyPool,
    backend: Backend,
    excluded: Vec<String>,
    cache: Mutex<SchemaCache>,
}

impl SchemaReader {
    /// Connect to `sqlite://...` or `mysql://...`. Failing to connect is
    /// the analyzer's one fatal setup error.
    pub async fn connect(url: &str, excluded: Vec<String>) -> AnalyzerResult<Self> {
        let backend = match url.split(':').next().unwrap_or_default() {
            "sqlite" => Backend::Sqlite,
            "mysql" | "mariadb" => Backend::MySql,
            scheme => {
                return Err(AnalyzerError::Connection(format!(
                    "unsupported database scheme: '{scheme}' (expected sqlite or mysql)"
                )));
            }
        };

        // The Any drivers may only be installed once per process.
        static INSTALL_DRIVERS: Once = Once::new();
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

        let pool = AnyPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| AnalyzerError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            backend,
            excluded,
            cache: Mutex::new(SchemaCache::default()),
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// All base tables, minus the exclusion set. Empty on backend error.
    pub async fn tables(&self) -> Vec<String> {
        self.tables_checked().await.unwrap_or_default()
    }

    /// Like [`tables`](Self::tables), but surfaces the backend error; the
    /// orchestrator uses this while snapshotting so a dead connection
    /// becomes a `schema_read_error` issue instead of silence.
    pub async fn tables_checked(&self) -> AnalyzerResult<Vec<String>> {
        if let Some(tables) = self.cache.lock().unwrap().tables.clone() {
            return Ok(tables);
        }

        let sql = match self.backend {
            Backend::Sqlite => {
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'"
            }
            Backend::MySql => {
                "SELECT TABLE_NAME AS name FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'"
            }
        };
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnalyzerError::Schema(e.to_string()))?;

        let tables: Vec<String> = rows
            .iter()
            .map(|row| get_string(row, "name"))
            .filter(|t| !t.is_empty() && !self.excluded.contains(t))
            .collect();

        self.cache.lock().unwrap().tables = Some(tables.clone());
        Ok(tables)
    }

    /// Column metadata for a table. Empty on backend error.
    pub async fn columns(&self, table: &str) -> Vec<ColumnInfo> {
        if let Some(columns) = self.cache.lock().unwrap().columns.get(table) {
            return columns.clone();
        }

        let columns = self.fetch_columns(table).await.unwrap_or_default();
        self.cache
            .lock()
            .unwrap()
            .columns
            .insert(table.to_string(), columns.clone());
        columns
    }

    async fn fetch_columns(&self, table: &str) -> AnalyzerResult<Vec<ColumnInfo>> {
        let rows = match self.backend {
            Backend::Sqlite => {
                let sql = format!("PRAGMA table_info({})", quote_identifier(table));
                self.fetch(&sql, None).await?
            }
            Backend::MySql => {
                let sql = "SELECT COLUMN_NAME AS name, DATA_TYPE AS data_type, \
                           IS_NULLABLE AS nullable, COLUMN_KEY AS key_role, \
                           COLUMN_DEFAULT AS default_value \
                           FROM information_schema.COLUMNS \
                           WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";
                self.fetch(sql, Some(table)).await?
            }
        };

        let columns = rows
            .iter()
            .map(|row| match self.backend {
                Backend::Sqlite => ColumnInfo {
                    name: get_string(row, "name"),
                    data_type: get_string(row, "type").to_lowercase(),
                    nullable: get_i64(row, "notnull") == 0,
                    key: if get_i64(row, "pk") > 0 { "PRI" } else { "" }.to_string(),
                    default: get_opt_string(row, "dflt_value"),
                },
                Backend::MySql => ColumnInfo {
                    name: get_string(row, "name"),
                    data_type: get_string(row, "data_type").to_lowercase(),
                    nullable: get_string(row, "nullable") == "YES",
                    key: get_string(row, "key_role"),
                    default: get_opt_string(row, "default_value"),
                },
            })
            .collect();

        Ok(columns)
    }

    /// Foreign-key constraints declared on a table. Empty on backend error.
    pub async fn foreign_keys(&self, table: &str) -> Vec<ForeignKeyInfo> {
        if let Some(fks) = self.cache.lock().unwrap().foreign_keys.get(table) {
            return fks.clone();
        }

        let fks = self.fetch_foreign_keys(table).await.unwrap_or_default();
        self.cache
            .lock()
            .unwrap()
            .foreign_keys
            .insert(table.to_string(), fks.clone());
        fks
    }

    async fn fetch_foreign_keys(&self, table: &str) -> AnalyzerResult<Vec<ForeignKeyInfo>> {
        match self.backend {
            Backend::Sqlite => {
                let sql = format!("PRAGMA foreign_key_list({})", quote_identifier(table));
                let rows = self.fetch(&sql, None).await?;
                Ok(rows
                    .iter()
                    .map(|row| ForeignKeyInfo {
                        column: get_string(row, "from"),
                        referenced_table: get_string(row, "table"),
                        // A NULL target column means the referenced table's
                        // primary key.
                        referenced_column: get_opt_string(row, "to")
                            .unwrap_or_else(|| "id".to_string()),
                        update_rule: get_string(row, "on_update"),
                        delete_rule: get_string(row, "on_delete"),
                    })
                    .collect())
            }
            Backend::MySql => {
                let sql = "SELECT kcu.COLUMN_NAME AS column_name, \
                           kcu.REFERENCED_TABLE_NAME AS referenced_table, \
                           kcu.REFERENCED_COLUMN_NAME AS referenced_column, \
                           rc.UPDATE_RULE AS update_rule, rc.DELETE_RULE AS delete_rule \
                           FROM information_schema.KEY_COLUMN_USAGE kcu \
                           JOIN information_schema.REFERENTIAL_CONSTRAINTS rc \
                             ON rc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA \
                            AND rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
                           WHERE kcu.TABLE_SCHEMA = DATABASE() AND kcu.TABLE_NAME = ? \
                             AND kcu.REFERENCED_TABLE_NAME IS NOT NULL";
                let rows = self.fetch(sql, Some(table)).await?;
                Ok(rows
                    .iter()
                    .map(|row| ForeignKeyInfo {
                        column: get_string(row, "column_name"),
                        referenced_table: get_string(row, "referenced_table"),
                        referenced_column: get_string(row, "referenced_column"),
                        update_rule: get_string(row, "update_rule"),
                        delete_rule: get_string(row, "delete_rule"),
                    })
                    .collect())
            }
        }
    }

    /// Index entries for a table, one per indexed column. Empty on backend
    /// error.
    pub async fn indexes(&self, table: &str) -> Vec<IndexInfo> {
        if let Some(indexes) = self.cache.lock().unwrap().indexes.get(table) {
            return indexes.clone();
        }

        let indexes = self.fetch_indexes(table).await.unwrap_or_default();
        self.cache
            .lock()
            .unwrap()
            .indexes
            .insert(table.to_string(), indexes.clone());
        indexes
    }

    async fn fetch_indexes(&self, table: &str) -> AnalyzerResult<Vec<IndexInfo>> {
        match self.backend {
            Backend::Sqlite => {
                let sql = format!("PRAGMA index_list({})", quote_identifier(table));
                let index_rows = self.fetch(&sql, None).await?;
                let mut indexes = Vec::new();

                for index_row in &index_rows {
                    let index_name = get_string(index_row, "name");
                    let unique = get_i64(index_row, "unique") != 0;

                    let info_sql =
                        format!("PRAGMA index_info({})", quote_identifier(&index_name));
                    for column_row in self.fetch(&info_sql, None).await? {
                        indexes.push(IndexInfo {
                            name: index_name.clone(),
                            column: get_string(&column_row, "name"),
                            unique,
                            seq_in_index: get_i64(&column_row, "seqno") + 1,
                        });
                    }
                }

                Ok(indexes)
            }
            Backend::MySql => {
                let sql = "SELECT INDEX_NAME AS index_name, COLUMN_NAME AS column_name, \
                           NON_UNIQUE AS non_unique, SEQ_IN_INDEX AS seq_in_index \
                           FROM information_schema.STATISTICS \
                           WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";
                let rows = self.fetch(sql, Some(table)).await?;
                Ok(rows
                    .iter()
                    .map(|row| IndexInfo {
                        name: get_string(row, "index_name"),
                        column: get_string(row, "column_name"),
                        unique: get_i64(row, "non_unique") == 0,
                        seq_in_index: get_i64(row, "seq_in_index"),
                    })
                    .collect())
            }
        }
    }

    pub async fn table_exists(&self, table: &str) -> bool {
        self.tables().await.iter().any(|t| t == table)
    }

    pub async fn column_exists(&self, table: &str, column: &str) -> bool {
        self.columns(table).await.iter().any(|c| c.name == column)
    }

    pub async fn column_has_index(&self, table: &str, column: &str) -> bool {
        self.indexes(table).await.iter().any(|i| i.column == column)
    }

    pub async fn column_has_foreign_key(&self, table: &str, column: &str) -> bool {
        self.foreign_keys(table)
            .await
            .iter()
            .any(|fk| fk.column == column)
    }

    /// Drop all four caches in one step, for reuse across repeated
    /// analyses in one process.
    pub fn clear_cache(&self) {
        *self.cache.lock().unwrap() = SchemaCache::default();
    }

    /// Full table → column → type snapshot of the live schema. Errors from
    /// the initial table listing propagate so the caller can report them.
    pub async fn snapshot(&self) -> AnalyzerResult<SchemaSnapshot> {
        let mut snapshot = SchemaSnapshot::new();
        for table in self.tables_checked().await? {
            let columns = self
                .columns(&table)
                .await
                .into_iter()
                .map(|c| (c.name, c.data_type))
                .collect();
            snapshot.insert(table, columns);
        }
        Ok(snapshot)
    }

    async fn fetch(&self, sql: &str, bind: Option<&str>) -> AnalyzerResult<Vec<AnyRow>> {
        let query = match bind {
            Some(value) => sqlx::query(sql).bind(value),
            None => sqlx::query(sql),
        };
        query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AnalyzerError::Schema(e.to_string()))
    }
}

/// Quote an identifier for PRAGMA statements, which accept no bound
/// parameters.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn get_string(row: &AnyRow, name: &str) -> String {
    row.try_get::<String, _>(name).unwrap_or_default()
}

fn get_opt_string(row: &AnyRow, name: &str) -> Option<String> {
    row.try_get::<String, _>(name).ok()
}

/// Integer columns arrive with backend-dependent widths; try the common
/// ones before giving up.
fn get_i64(row: &AnyRow, name: &str) -> i64 {
    row.try_get::<i64, _>(name)
        .or_else(|_| row.try_get::<i32, _>(name).map(i64::from))
        .or_else(|_| row.try_get::<i16, _>(name).map(i64::from))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "\"users\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[tokio::test]
    async fn test_unsupported_scheme_is_a_connection_error() {
        let err = SchemaReader::connect("postgres://localhost/db", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::Connection(_)));
    }
}
