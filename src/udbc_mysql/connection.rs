use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Params, Row as MyRow};
use tokio::sync::Mutex;

use crate::error::DbError;
use crate::udbc::connection::{Connection, Row};
use crate::udbc::value::Value;
use crate::udbc_mysql::value_codec::{from_mysql_value, to_mysql_value};

pub struct MysqlConnection {
    conn: Mutex<Conn>,
}

impl MysqlConnection {
    pub fn new(conn: Conn) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn params(args: &[Value]) -> Params {
        if args.is_empty() {
            Params::Empty
        } else {
            Params::Positional(args.iter().map(to_mysql_value).collect())
        }
    }

    /// Statement failures carry the SQL text; pool and I/O failures stay `Database`.
    fn statement_error(sql: &str, e: mysql_async::Error) -> DbError {
        match e {
            mysql_async::Error::Server(e) => DbError::Query(format!("{} (sql: {})", e, sql)),
            other => DbError::from(other),
        }
    }

    fn map_row(row: MyRow) -> Row {
        let cols = row.columns_ref();
        (0..row.len())
            .map(|i| {
                let name = cols
                    .get(i)
                    .map(|c| c.name_str().to_string())
                    .unwrap_or_else(|| i.to_string());
                let value = row.as_ref(i).map(from_mysql_value).unwrap_or(Value::Null);
                (name, value)
            })
            .collect()
    }
}

#[async_trait]
impl Connection for MysqlConnection {
    async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, DbError> {
        let mut conn = self.conn.lock().await;
        let rows: Vec<MyRow> = conn
            .exec(sql, Self::params(args))
            .await
            .map_err(|e| Self::statement_error(sql, e))?;
        Ok(rows.into_iter().map(Self::map_row).collect())
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, DbError> {
        let mut conn = self.conn.lock().await;
        conn.exec_drop(sql, Self::params(args))
            .await
            .map_err(|e| Self::statement_error(sql, e))?;
        Ok(conn.affected_rows())
    }

    async fn last_insert_id(&self) -> Result<u64, DbError> {
        let conn = self.conn.lock().await;
        Ok(conn.last_insert_id().unwrap_or(0))
    }

    async fn begin(&self) -> Result<(), DbError> {
        self.conn.lock().await.query_drop("BEGIN").await?;
        Ok(())
    }

    async fn commit(&self) -> Result<(), DbError> {
        self.conn.lock().await.query_drop("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DbError> {
        self.conn.lock().await.query_drop("ROLLBACK").await?;
        Ok(())
    }
}
