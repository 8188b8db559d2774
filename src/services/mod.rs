// Pricing and cart
pub mod cart;
pub mod pricing;

// Checkout
pub mod orders;

// Storefront read side and customer data
pub mod accounts;
pub mod catalog;
pub mod wishlist;

use sea_orm::{sqlx, DbErr, RuntimeErr, SqlErr};

/// SQLite primary result codes for a lock held by another connection.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Postgres SQLSTATEs for serialization failure, deadlock and lock timeout.
const PG_LOCK_CONTENTION: [&str; 3] = ["40001", "40P01", "55P03"];

/// True when the store rejected a write because of a unique index.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// True when the store refused a statement because another transaction holds
/// the lock it needs. Retrying the whole unit of work may succeed.
pub(crate) fn is_lock_contention(err: &DbErr) -> bool {
    let db_err = match err {
        DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::Database(e)))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(e)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(e))) => e,
        _ => return false,
    };
    let Some(code) = db_err.code() else {
        return false;
    };

    if db_err
        .try_downcast_ref::<sqlx::sqlite::SqliteError>()
        .is_some()
    {
        // Extended codes such as SQLITE_BUSY_SNAPSHOT keep the primary code in
        // the low byte.
        return code
            .parse::<i32>()
            .map(|extended| matches!(extended & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
            .unwrap_or(false);
    }

    PG_LOCK_CONTENTION.contains(&&*code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_errors_are_not_contention() {
        assert!(!is_lock_contention(&DbErr::RecordNotFound("order".into())));
        assert!(!is_lock_contention(&DbErr::Query(RuntimeErr::Internal(
            "database is locked".into()
        ))));
        assert!(!is_lock_contention(&DbErr::Exec(RuntimeErr::SqlxError(
            sqlx::Error::PoolTimedOut
        ))));
    }

    #[test]
    fn plain_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&DbErr::Custom("boom".into())));
    }
}
