use sqlx::PgPool;

use tracing::debug;

use tablesmith_core::Result;

use super::mapper::{map_catalog_error, map_ddl_error};

pub async fn list_tables(pool: &PgPool, schema: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        select tablename::text
        from pg_catalog.pg_tables
        where schemaname = $1
        order by tablename
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(map_catalog_error)
}

pub async fn execute(pool: &PgPool, sql: &str) -> Result<()> {
    debug!(engine = "postgres", sql = %sql, "executing ddl");
    sqlx::query(sql)
        .execute(pool)
        .await
        .map_err(map_ddl_error)?;
    Ok(())
}
