//! SQLite destination tables.
//!
//! Implements [`TableStore`] for the loader and [`AnalyticsSource`] for the
//! analytics stages. Writes are built as dynamic statements because the
//! column set follows the record shape and the configured natural key. Every
//! write runs in an immediate transaction so concurrent stages serialize on
//! the database lock instead of failing half-way.

use std::collections::HashSet;

use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::sql_types::{BigInt, Double, Nullable, Text};
use diesel::sqlite::Sqlite;
use diesel::SqliteConnection;
use tracing::debug;

use super::database::connection::DbPool;
use super::database::model::{parse_date, GSpreadRow, RunsRow};
use super::database::schema::{g_spread, runs};
use crate::domain::analytics::SeriesPoint;
use crate::domain::key::NaturalKey;
use crate::domain::record::RunsRecord;
use crate::domain::value::Value;
use crate::error::{Error, Result};
use crate::port::outbound::analytics::AnalyticsSource;
use crate::port::outbound::store::{TableSpec, TableState, TableStore, UpsertCounts};

type Query<'a> = BoxedSqlQuery<'a, Sqlite, SqlQuery>;
type Conn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Host parameters SQLite accepts in one statement.
const MAX_VARIABLES: usize = 32_766;

#[derive(QueryableByName)]
struct Count {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

#[derive(QueryableByName)]
struct Name {
    #[diesel(sql_type = Text)]
    name: String,
}

#[derive(QueryableByName)]
struct KeyRow {
    #[diesel(sql_type = Text)]
    natural_key: String,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn tuple_placeholders(width: usize, count: usize) -> String {
    let tuple = format!("({})", vec!["?"; width].join(", "));
    vec![tuple; count].join(", ")
}

fn bind<'a>(query: Query<'a>, value: &Value) -> Query<'a> {
    match value {
        Value::Null => query.bind::<Nullable<Text>, _>(None::<String>),
        Value::Integer(i) => query.bind::<BigInt, _>(*i),
        Value::Real(r) => query.bind::<Double, _>(*r),
        Value::Text(s) => query.bind::<Text, _>(s.clone()),
    }
}

fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Integer(i64::from(b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Real))
            .unwrap_or(Value::Null),
        serde_json::Value::String(s) => Value::Text(s),
        other => Value::Text(other.to_string()),
    }
}

/// Rows per statement so that `width` columns stay under the variable limit.
fn rows_per_statement(width: usize) -> usize {
    (MAX_VARIABLES / width.max(1)).max(1)
}

fn insert_rows(
    conn: &mut SqliteConnection,
    table: &TableSpec,
    rows: &[Vec<Value>],
    on_conflict: Option<&str>,
) -> Result<usize> {
    let mut written = 0;
    for chunk in rows.chunks(rows_per_statement(table.columns.len())) {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_ident(&table.name),
            column_list(&table.columns),
            tuple_placeholders(table.columns.len(), chunk.len()),
        );
        let mut query = diesel::sql_query(sql).into_boxed::<Sqlite>();
        if let Some(clause) = on_conflict {
            query = query.sql(clause);
        }
        for row in chunk {
            for value in row {
                query = bind(query, value);
            }
        }
        written += query.execute(conn)?;
    }
    Ok(written)
}

/// How many of `rows` already have their natural key in the table.
fn count_existing(conn: &mut SqliteConnection, table: &TableSpec, rows: &[Vec<Value>]) -> Result<usize> {
    let indices = table.key_indices();
    let mut existing = 0;
    for chunk in rows.chunks(rows_per_statement(indices.len())) {
        let sql = format!(
            "SELECT COUNT(*) AS count FROM {} WHERE ({}) IN (VALUES {})",
            quote_ident(&table.name),
            column_list(&table.key_columns),
            tuple_placeholders(indices.len(), chunk.len()),
        );
        let mut query = diesel::sql_query(sql).into_boxed::<Sqlite>();
        for row in chunk {
            for &i in &indices {
                query = bind(query, &row[i]);
            }
        }
        existing += query.get_result::<Count>(conn)?.count as usize;
    }
    Ok(existing)
}

/// Table store and analytics reader over a Diesel SQLite pool.
#[derive(Clone)]
pub struct SqliteTableStore {
    pool: DbPool,
}

impl SqliteTableStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<Conn> {
        self.pool.get().map_err(|e| Error::Connection(e.to_string()))
    }

    /// Column sets of every unique index on the table.
    fn unique_indexes(conn: &mut SqliteConnection, table: &str) -> Result<Vec<Vec<String>>> {
        let indexes = diesel::sql_query(r#"SELECT name FROM pragma_index_list(?) WHERE "unique" = 1"#)
            .bind::<Text, _>(table)
            .load::<Name>(conn)?;

        let mut out = Vec::with_capacity(indexes.len());
        for index in indexes {
            let columns = diesel::sql_query("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
                .bind::<Text, _>(&index.name)
                .load::<Name>(conn)?
                .into_iter()
                .map(|n| n.name)
                .collect();
            out.push(columns);
        }
        Ok(out)
    }
}

impl TableStore for SqliteTableStore {
    fn probe(&self, table: &TableSpec) -> Result<TableState> {
        let mut conn = self.conn()?;
        let row_count = diesel::sql_query(format!(
            "SELECT COUNT(*) AS count FROM {}",
            quote_ident(&table.name)
        ))
        .get_result::<Count>(&mut conn)?
        .count;

        let wanted: HashSet<&str> = table.key_columns.iter().map(String::as_str).collect();
        let has_unique_key = Self::unique_indexes(&mut conn, &table.name)?
            .iter()
            .any(|cols| {
                cols.len() == wanted.len() && cols.iter().all(|c| wanted.contains(c.as_str()))
            });

        debug!(table = %table.name, row_count, has_unique_key, "Probed table");
        Ok(TableState {
            row_count: u64::try_from(row_count).unwrap_or(0),
            has_unique_key,
        })
    }

    fn insert_batch(&self, table: &TableSpec, rows: &[Vec<Value>]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        conn.immediate_transaction(|conn| insert_rows(conn, table, rows, None))
    }

    fn upsert_batch(&self, table: &TableSpec, rows: &[Vec<Value>]) -> Result<UpsertCounts> {
        if rows.is_empty() {
            return Ok(UpsertCounts::default());
        }
        let updates: Vec<String> = table
            .columns
            .iter()
            .filter(|c| !table.key_columns.contains(c))
            .map(|c| format!("{0} = excluded.{0}", quote_ident(c)))
            .collect();
        let clause = if updates.is_empty() {
            format!(" ON CONFLICT ({}) DO NOTHING", column_list(&table.key_columns))
        } else {
            format!(
                " ON CONFLICT ({}) DO UPDATE SET {}",
                column_list(&table.key_columns),
                updates.join(", ")
            )
        };

        let mut conn = self.conn()?;
        conn.immediate_transaction(|conn| {
            let updated = count_existing(conn, table, rows)?;
            insert_rows(conn, table, rows, Some(&clause))?;
            Ok(UpsertCounts {
                inserted: rows.len() - updated,
                updated,
            })
        })
    }

    fn existing_keys(&self, table: &TableSpec) -> Result<HashSet<NaturalKey>> {
        let mut conn = self.conn()?;
        let sql = format!(
            "SELECT json_array({}) AS natural_key FROM {}",
            column_list(&table.key_columns),
            quote_ident(&table.name)
        );
        diesel::sql_query(sql)
            .load::<KeyRow>(&mut conn)?
            .into_iter()
            .map(|row| {
                let parts: Vec<serde_json::Value> = serde_json::from_str(&row.natural_key)?;
                Ok(parts.into_iter().map(json_to_value).collect())
            })
            .collect()
    }

    fn delete_where_in(&self, table: &TableSpec, column: &str, values: &[Value]) -> Result<usize> {
        if values.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        conn.immediate_transaction(|conn| {
            let mut deleted = 0;
            for chunk in values.chunks(MAX_VARIABLES) {
                let sql = format!(
                    "DELETE FROM {} WHERE {} IN ({})",
                    quote_ident(&table.name),
                    quote_ident(column),
                    vec!["?"; chunk.len()].join(", ")
                );
                let mut query = diesel::sql_query(sql).into_boxed::<Sqlite>();
                for value in chunk {
                    query = bind(query, value);
                }
                deleted += query.execute(conn)?;
            }
            Ok(deleted)
        })
    }

    fn truncate(&self, table: &TableSpec) -> Result<usize> {
        let mut conn = self.conn()?;
        let sql = format!("DELETE FROM {}", quote_ident(&table.name));
        conn.immediate_transaction(|conn| Ok(diesel::sql_query(sql).execute(conn)?))
    }

    fn replace_all(&self, table: &TableSpec, rows: &[Vec<Value>]) -> Result<usize> {
        let mut conn = self.conn()?;
        let sql = format!("DELETE FROM {}", quote_ident(&table.name));
        conn.immediate_transaction(|conn| {
            diesel::sql_query(sql).execute(conn)?;
            insert_rows(conn, table, rows, None)
        })
    }
}

impl AnalyticsSource for SqliteTableStore {
    fn g_spread_series(&self) -> Result<Vec<SeriesPoint>> {
        let mut conn = self.conn()?;
        let rows = g_spread::table
            .filter(g_spread::spread_value.is_not_null())
            .order((g_spread::date, g_spread::security))
            .select(GSpreadRow::as_select())
            .load(&mut conn)?;

        rows.into_iter()
            .filter_map(|row| {
                let value = row.g_spread?;
                Some(parse_date(&row.date).map(|date| SeriesPoint {
                    date,
                    instrument: row.security,
                    value,
                }))
            })
            .collect()
    }

    fn runs_observations(&self) -> Result<Vec<RunsRecord>> {
        let mut conn = self.conn()?;
        runs::table
            .order((runs::date, runs::time, runs::cusip, runs::dealer))
            .select(RunsRow::as_select())
            .load(&mut conn)?
            .into_iter()
            .map(RunsRecord::try_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::outbound::sqlite::database::connection::{create_pool, run_migrations};
    use crate::domain::key::KeySpec;
    use crate::domain::record::{GSpreadRecord, Record};
    use chrono::{NaiveDate, NaiveTime};
    use tempfile::TempDir;

    fn store() -> (TempDir, SqliteTableStore) {
        let dir = TempDir::new().unwrap();
        let pool = create_pool(&dir.path().join("t.db").display().to_string()).unwrap();
        run_migrations(&pool).unwrap();
        (dir, SqliteTableStore::new(pool))
    }

    fn quote(dealer: &str, h: u32, spread: f64) -> RunsRecord {
        RunsRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            time: NaiveTime::from_hms_opt(h, 0, 0).unwrap(),
            cusip: "ABC123".into(),
            dealer: dealer.into(),
            security: Some("ACME 5 2030".into()),
            benchmark: None,
            bid_spread: Some(spread),
            ask_spread: None,
            bid_size: Some(1e6),
            ask_size: None,
            bid_price: None,
            ask_price: None,
        }
    }

    fn runs_table() -> TableSpec {
        let key = KeySpec::from_static::<RunsRecord>(&["date", "cusip", "dealer"], Some("time")).unwrap();
        TableSpec::for_record::<RunsRecord>("runs", &key)
    }

    #[test]
    fn probe_detects_unique_key_and_rows() {
        let (_dir, store) = store();
        let table = runs_table();
        let state = store.probe(&table).unwrap();
        assert_eq!(state.row_count, 0);
        assert!(state.has_unique_key);

        store.insert_batch(&table, &[quote("X", 9, 100.0).values()]).unwrap();
        assert_eq!(store.probe(&table).unwrap().row_count, 1);
    }

    #[test]
    fn probe_requires_exact_key_columns() {
        let (_dir, store) = store();
        let key = KeySpec::from_static::<RunsRecord>(&["date", "cusip"], None).unwrap();
        let table = TableSpec::for_record::<RunsRecord>("runs", &key);
        assert!(!store.probe(&table).unwrap().has_unique_key);
    }

    #[test]
    fn upsert_overwrites_and_counts() {
        let (_dir, store) = store();
        let table = runs_table();
        store.insert_batch(&table, &[quote("X", 9, 100.0).values()]).unwrap();

        let counts = store
            .upsert_batch(&table, &[quote("X", 14, 95.0).values(), quote("Y", 9, 101.0).values()])
            .unwrap();
        assert_eq!(counts, UpsertCounts { inserted: 1, updated: 1 });

        let rows = store.runs_observations().unwrap();
        assert_eq!(rows.len(), 2);
        let x = rows.iter().find(|r| r.dealer == "X").unwrap();
        assert_eq!(x.bid_spread, Some(95.0));
        assert_eq!(x.time, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
    }

    #[test]
    fn duplicate_key_insert_rolls_back_whole_batch() {
        let (_dir, store) = store();
        let table = runs_table();
        store.insert_batch(&table, &[quote("X", 9, 100.0).values()]).unwrap();
        let err = store.insert_batch(&table, &[quote("Y", 9, 1.0).values(), quote("X", 10, 2.0).values()]);
        assert!(err.is_err());
        assert_eq!(store.probe(&table).unwrap().row_count, 1);
    }

    #[test]
    fn existing_keys_round_trip_values() {
        let (_dir, store) = store();
        let table = runs_table();
        let row = quote("X", 9, 100.0).values();
        store.insert_batch(&table, &[row.clone()]).unwrap();

        let keys = store.existing_keys(&table).unwrap();
        let expected: NaturalKey = table.key_indices().iter().map(|&i| row[i].clone()).collect();
        assert!(keys.contains(&expected));
    }

    #[test]
    fn delete_where_in_removes_partition() {
        let (_dir, store) = store();
        let key = KeySpec::from_static::<GSpreadRecord>(&["date", "cusip", "security"], None).unwrap();
        let table = TableSpec::for_record::<GSpreadRecord>("g_spread", &key);
        let point = |d: u32| GSpreadRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
            cusip: "A".into(),
            security: "ACME".into(),
            g_spread: Some(f64::from(d)),
        };
        store
            .insert_batch(&table, &[point(1).values(), point(2).values(), point(3).values()])
            .unwrap();

        let deleted = store
            .delete_where_in(&table, "date", &[Value::from(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())])
            .unwrap();
        assert_eq!(deleted, 1);

        let series = store.g_spread_series().unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.iter().all(|p| p.instrument == "ACME"));
    }

    #[test]
    fn g_spread_series_reads_values_and_skips_nulls() {
        let (_dir, store) = store();
        let key = KeySpec::from_static::<GSpreadRecord>(&["date", "cusip", "security"], None).unwrap();
        let table = TableSpec::for_record::<GSpreadRecord>("g_spread", &key);
        let point = |d: u32, value: Option<f64>| GSpreadRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
            cusip: "A".into(),
            security: "ACME".into(),
            g_spread: value,
        };
        store
            .insert_batch(&table, &[point(1, Some(101.5)).values(), point(2, None).values()])
            .unwrap();

        let series = store.g_spread_series().unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(series[0].value, 101.5);
    }

    #[test]
    fn replace_all_swaps_content() {
        let (_dir, store) = store();
        let table = runs_table();
        store.insert_batch(&table, &[quote("X", 9, 100.0).values()]).unwrap();
        let written = store
            .replace_all(&table, &[quote("Y", 9, 1.0).values(), quote("Z", 9, 2.0).values()])
            .unwrap();
        assert_eq!(written, 2);
        let dealers: Vec<String> = store.runs_observations().unwrap().into_iter().map(|r| r.dealer).collect();
        assert_eq!(dealers, ["Y", "Z"]);
        assert_eq!(store.truncate(&table).unwrap(), 2);
    }
}
