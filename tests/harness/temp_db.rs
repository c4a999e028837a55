use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Nullable, Text};

use bondlake::adapter::outbound::sqlite::database::connection::{create_pool, DbPool};

#[derive(QueryableByName)]
struct Count {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

#[derive(QueryableByName)]
struct Real {
    #[diesel(sql_type = Nullable<Double>)]
    value: Option<f64>,
}

#[derive(QueryableByName)]
struct Label {
    #[diesel(sql_type = Text)]
    value: String,
}

/// Read-side handle on a database written by a run.
pub struct TempDb {
    pool: DbPool,
}

impl TempDb {
    pub fn open(path: &str) -> Self {
        let pool = create_pool(&format!("sqlite://{path}")).expect("create sqlite pool");
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn execute(&self, sql: &str) {
        let mut conn = self.pool.get().expect("get sqlite connection");
        diesel::sql_query(sql).execute(&mut conn).expect("execute sql");
    }

    pub fn count(&self, table: &str) -> i64 {
        let mut conn = self.pool.get().expect("get sqlite connection");
        diesel::sql_query(format!("SELECT COUNT(*) AS count FROM {table}"))
            .get_result::<Count>(&mut conn)
            .expect("count rows")
            .count
    }

    /// A single REAL cell; `sql` must select it as `value`.
    pub fn real(&self, sql: &str) -> Option<f64> {
        let mut conn = self.pool.get().expect("get sqlite connection");
        diesel::sql_query(sql)
            .get_result::<Real>(&mut conn)
            .expect("query value")
            .value
    }

    /// Text cells; `sql` must select them as `value`.
    pub fn texts(&self, sql: &str) -> Vec<String> {
        let mut conn = self.pool.get().expect("get sqlite connection");
        diesel::sql_query(sql)
            .load::<Label>(&mut conn)
            .expect("query values")
            .into_iter()
            .map(|l| l.value)
            .collect()
    }
}
