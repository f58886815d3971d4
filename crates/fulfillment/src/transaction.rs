use store::Transaction;

use crate::error::Result;

/// Commits `tx` if `outcome` is `Ok`, otherwise rolls it back and returns the
/// original error.
pub(crate) async fn finish<T, X: Transaction>(tx: X, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            match tx.rollback().await {
                Ok(()) => tracing::debug!(error = %err, "transaction rolled back"),
                Err(rollback_err) => tracing::error!(
                    error = %err,
                    rollback_error = %rollback_err,
                    "transaction rollback failed"
                ),
            }
            Err(err)
        }
    }
}
