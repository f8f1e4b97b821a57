use sqlx::SqlitePool;

use tracing::debug;

use tablesmith_core::Result;

use super::mapper::{map_catalog_error, map_ddl_error};

pub async fn list_tables(pool: &SqlitePool) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        select name
        from sqlite_master
        where type = 'table'
          and name not like 'sqlite_%'
        order by name
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(map_catalog_error)
}

pub async fn execute(pool: &SqlitePool, sql: &str) -> Result<()> {
    debug!(engine = "sqlite", sql = %sql, "executing ddl");
    sqlx::query(sql)
        .execute(pool)
        .await
        .map_err(map_ddl_error)?;
    Ok(())
}
