//! Running card operations from async code
//!
//! Card exchanges block for the whole security delay, so operations run on
//! tokio's blocking pool. The engine moves into the worker and comes back with
//! the result; cancel it through [`Tangem::cancel_handle`] taken beforehand.

use tangem_apdu_core::CardTransport;
use tracing::debug;

use crate::{Error, Result, Tangem};

/// Run `operation` on a blocking worker
///
/// The outer error reports a failed worker; the inner one is the operation's
/// own result. A panic inside the operation is resumed on the caller.
pub async fn run_blocking<T, R, F>(
    mut card: Tangem<T>,
    operation: F,
) -> Result<(Tangem<T>, Result<R>)>
where
    T: CardTransport + 'static,
    R: Send + 'static,
    F: FnOnce(&mut Tangem<T>) -> Result<R> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(move || {
        let result = operation(&mut card);
        (card, result)
    });

    match handle.await {
        Ok(output) => Ok(output),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => {
            debug!(error = %e, "Card worker did not finish");
            Err(Error::Task(e.to_string()))
        }
    }
}
