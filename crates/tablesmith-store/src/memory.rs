//! In-process store for dry runs and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use tablesmith_core::{Error, ForeignKeyDef, Result, Schema};

use crate::ddl::{Dialect, render_create_index, render_create_table};
use crate::postgres::PostgresDialect;
use crate::store::Store;

/// Store that keeps its catalog in memory.
///
/// Statements are rendered with the PostgreSQL dialect unless another one is
/// set, and recorded in the order they were applied. With foreign key
/// enforcement on, a `CREATE TABLE` that references a missing table is
/// rejected the way PostgreSQL rejects it.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    enforce_foreign_keys: bool,
    dialect: Box<dyn Dialect>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeSet<String>,
    indexes: BTreeMap<String, String>,
    statements: Vec<String>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store that enforces foreign keys.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            enforce_foreign_keys: true,
            dialect: Box::new(PostgresDialect),
        }
    }

    /// Render statements with `dialect`, e.g. to preview DDL for another store.
    pub fn with_dialect<D>(mut self, dialect: D) -> Self
    where
        D: Dialect + 'static,
    {
        self.dialect = Box::new(dialect);
        self
    }

    /// Seed the catalog with tables that already exist.
    pub fn with_tables<I, S>(self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().tables.extend(tables.into_iter().map(Into::into));
        self
    }

    pub fn with_foreign_key_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_foreign_keys = enforce;
        self
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.lock().tables.contains(table)
    }

    pub fn tables(&self) -> Vec<String> {
        self.lock().tables.iter().cloned().collect()
    }

    /// Index names mapped to the table they belong to.
    pub fn indexes(&self) -> BTreeMap<String, String> {
        self.lock().indexes.clone()
    }

    /// Every statement that changed the catalog, in order.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn create_table(&self, sql: &str, rest: &str) -> Result<()> {
        let (if_not_exists, rest) = strip_if_not_exists(rest);
        let (table, _) = read_identifier(rest)?;

        let mut state = self.lock();
        if state.tables.contains(&table) {
            return if if_not_exists {
                Ok(())
            } else {
                Err(Error::AlreadyExists(format!("relation \"{table}\" already exists")))
            };
        }

        if self.enforce_foreign_keys {
            for referenced in referenced_tables(sql)? {
                if referenced != table && !state.tables.contains(&referenced) {
                    return Err(Error::ExecutionFailed(format!(
                        "relation \"{referenced}\" does not exist"
                    )));
                }
            }
        }

        state.tables.insert(table);
        state.statements.push(sql.to_string());
        Ok(())
    }

    fn create_index(&self, sql: &str, rest: &str) -> Result<()> {
        let (if_not_exists, rest) = strip_if_not_exists(rest);
        let (index, rest) = read_identifier(rest)?;
        let rest = rest
            .trim_start()
            .strip_prefix("ON ")
            .ok_or_else(|| Error::ExecutionFailed(format!("malformed index statement: {sql}")))?;
        let (table, _) = read_identifier(rest)?;

        let mut state = self.lock();
        if !state.tables.contains(&table) {
            return Err(Error::ExecutionFailed(format!(
                "relation \"{table}\" does not exist"
            )));
        }
        if state.indexes.contains_key(&index) {
            return if if_not_exists {
                Ok(())
            } else {
                Err(Error::AlreadyExists(format!("relation \"{index}\" already exists")))
            };
        }

        state.indexes.insert(index, table);
        state.statements.push(sql.to_string());
        Ok(())
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryStore")
            .field("tables", &state.tables)
            .field("indexes", &state.indexes)
            .field("enforce_foreign_keys", &self.enforce_foreign_keys)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn engine(&self) -> &'static str {
        "memory"
    }

    async fn list_existing_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables())
    }

    fn generate_create_table_sql(
        &self,
        schema: &Schema,
        foreign_keys: &[ForeignKeyDef],
    ) -> Result<String> {
        render_create_table(self.dialect.as_ref(), schema, foreign_keys)
    }

    async fn apply_ddl(&self, sql: &str) -> Result<()> {
        let statement = sql.trim();
        if let Some(rest) = statement.strip_prefix("CREATE TABLE ") {
            self.create_table(statement, rest)
        } else if let Some(rest) = statement
            .strip_prefix("CREATE UNIQUE INDEX ")
            .or_else(|| statement.strip_prefix("CREATE INDEX "))
        {
            self.create_index(statement, rest)
        } else {
            Err(Error::ExecutionFailed(format!(
                "unsupported statement: {statement}"
            )))
        }
    }

    fn generate_create_index_sql(
        &self,
        table: &str,
        index_name: &str,
        columns: &[String],
        unique: bool,
    ) -> String {
        render_create_index(self.dialect.as_ref(), table, index_name, columns, unique)
    }

    fn supports_foreign_key_enforcement(&self) -> bool {
        self.enforce_foreign_keys
    }
}

fn strip_if_not_exists(rest: &str) -> (bool, &str) {
    match rest.trim_start().strip_prefix("IF NOT EXISTS ") {
        Some(rest) => (true, rest),
        None => (false, rest.trim_start()),
    }
}

/// Read a quoted or bare identifier, returning it and the remaining input.
fn read_identifier(input: &str) -> Result<(String, &str)> {
    let input = input.trim_start();

    if let Some(quoted) = input.strip_prefix('"') {
        let mut name = String::new();
        let mut chars = quoted.char_indices().peekable();
        while let Some((idx, ch)) = chars.next() {
            if ch != '"' {
                name.push(ch);
                continue;
            }
            if matches!(chars.peek(), Some((_, '"'))) {
                chars.next();
                name.push('"');
                continue;
            }
            return Ok((name, &quoted[idx + 1..]));
        }
        return Err(Error::ExecutionFailed(format!(
            "unterminated identifier: {input}"
        )));
    }

    let end = input
        .find(|ch: char| ch.is_whitespace() || ch == '(' || ch == ',')
        .unwrap_or(input.len());
    if end == 0 {
        return Err(Error::ExecutionFailed("missing identifier".to_string()));
    }
    Ok((input[..end].to_string(), &input[end..]))
}

fn referenced_tables(sql: &str) -> Result<Vec<String>> {
    let mut tables = Vec::new();
    let mut rest = sql;
    while let Some(pos) = rest.find("REFERENCES ") {
        let (table, remaining) = read_identifier(&rest[pos + "REFERENCES ".len()..])?;
        tables.push(table);
        rest = remaining;
    }
    Ok(tables)
}
