/*!
 * Transaction helpers
 *
 * Runs a unit of work inside one database transaction that is bounded by a
 * deadline. The transaction commits only when the work returns `Ok` before
 * the deadline; every other outcome rolls it back.
 */

use crate::errors::ServiceError;
use metrics::{counter, histogram};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Type alias for boxed future used in transactions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Execute `f` within a database transaction bounded by `deadline`
///
/// # Example
///
/// ```rust,ignore
/// let order = with_deadline(&db, Duration::from_secs(10), "create_order", |txn| {
///     Box::pin(async move {
///         let order = orders::ActiveModel { .. }.insert(txn).await?;
///         Ok(order)
///     })
/// })
/// .await?;
/// ```
pub async fn with_deadline<F, T>(
    db: &DatabaseConnection,
    deadline: Duration,
    operation: &'static str,
    f: F,
) -> Result<T, ServiceError>
where
    F: for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<T, ServiceError>>,
{
    let start = Instant::now();
    let txn = db
        .begin()
        .await
        .map_err(|e| ServiceError::store(operation, e))?;

    let outcome = tokio::time::timeout(deadline, f(&txn)).await;
    histogram!("storefront_db.transaction.duration", start.elapsed());

    match outcome {
        Ok(Ok(value)) => {
            txn.commit()
                .await
                .map_err(|e| ServiceError::store(operation, e))?;
            counter!("storefront_db.transaction.committed", 1);
            debug!(operation, elapsed = ?start.elapsed(), "transaction committed");
            Ok(value)
        }
        Ok(Err(err)) => {
            rollback(txn, operation).await;
            warn!(operation, error = %err, "transaction rolled back");
            Err(err)
        }
        Err(_) => {
            rollback(txn, operation).await;
            counter!("storefront_db.transaction.timed_out", 1);
            warn!(operation, ?deadline, "transaction exceeded its deadline");
            Err(ServiceError::Timeout(format!(
                "{} did not finish within {:?}",
                operation, deadline
            )))
        }
    }
}

async fn rollback(txn: DatabaseTransaction, operation: &'static str) {
    counter!("storefront_db.transaction.rolled_back", 1);
    // Dropping an uncommitted transaction also rolls back, so a failure here
    // only loses the log line.
    if let Err(e) = txn.rollback().await {
        warn!(operation, error = %e, "explicit rollback failed");
    }
}
