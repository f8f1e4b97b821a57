use tablesmith_core::Error;

use crate::store::is_connection_failure;

/// SQLSTATE for `duplicate_table`; also raised for duplicate index names.
const DUPLICATE_TABLE: &str = "42P07";
/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";
/// Catalog indexes hit when two sessions create the same relation at once.
const CATALOG_NAME_INDEXES: [&str; 2] = ["pg_type_typname_nsp_index", "pg_class_relname_nsp_index"];

/// Any failure to read the catalog makes the store unavailable for the pass.
pub fn map_catalog_error(err: sqlx::Error) -> Error {
    Error::StoreUnavailable(err.to_string())
}

/// Classify a DDL failure.
pub fn map_ddl_error(err: sqlx::Error) -> Error {
    if is_connection_failure(&err) {
        return Error::StoreUnavailable(err.to_string());
    }

    match &err {
        sqlx::Error::Database(db) if is_duplicate_relation(db.code().as_deref(), db.constraint()) => {
            Error::AlreadyExists(db.message().to_string())
        }
        sqlx::Error::Database(db) => Error::ExecutionFailed(db.message().to_string()),
        _ => Error::ExecutionFailed(err.to_string()),
    }
}

/// A concurrent `CREATE ... IF NOT EXISTS` can lose the race on the catalog's
/// unique indexes instead of reporting `duplicate_table`.
fn is_duplicate_relation(code: Option<&str>, constraint: Option<&str>) -> bool {
    match code {
        Some(DUPLICATE_TABLE) => true,
        Some(UNIQUE_VIOLATION) => constraint.is_some_and(|name| CATALOG_NAME_INDEXES.contains(&name)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_are_infrastructure() {
        assert!(map_ddl_error(sqlx::Error::PoolTimedOut).is_infrastructure());
        assert!(map_catalog_error(sqlx::Error::RowNotFound).is_infrastructure());
    }

    #[test]
    fn other_failures_are_statement_errors() {
        let err = map_ddl_error(sqlx::Error::Protocol("unexpected message".to_string()));
        assert!(matches!(err, Error::ExecutionFailed(_)));
    }

    #[test]
    fn catalog_races_count_as_existing() {
        assert!(is_duplicate_relation(Some("42P07"), None));
        assert!(is_duplicate_relation(
            Some("23505"),
            Some("pg_type_typname_nsp_index")
        ));
        assert!(is_duplicate_relation(
            Some("23505"),
            Some("pg_class_relname_nsp_index")
        ));
    }

    #[test]
    fn user_unique_violations_are_not_races() {
        assert!(!is_duplicate_relation(Some("23505"), Some("users_email_key")));
        assert!(!is_duplicate_relation(Some("23505"), None));
        assert!(!is_duplicate_relation(Some("42830"), None));
        assert!(!is_duplicate_relation(None, None));
    }
}
