//! Temporary suppression of snapper's cleanup for a working set of snapshots.
//!
//! Suppression writes an empty cleanup algorithm to every guarded snapshot;
//! the exit pass writes back the algorithm each snapshot had when it was
//! listed. The exit pass runs after normal completion, after a failing body
//! and after a failing entry pass. It does not run if the process dies inside
//! the body: those snapshots stay exempt from cleanup until a later run over
//! them finishes. There is no locking against concurrent runs on the same
//! configuration; the last writer of the restore pass wins.

use crate::snapper::Snapper;
use crate::{Result, Snapshot};
use futures::future::BoxFuture;
use std::borrow::{Borrow, BorrowMut};
use tracing::{debug, error, info};

/// Runs `body` with cleanup disabled for every snapshot in `snapshots`.
///
/// Entry disables cleanup in slice order and stops at the first failure; the
/// body is skipped in that case. Exit then restores every snapshot in the same
/// order, including ones whose disable step never ran (restoring an untouched
/// value writes it back unchanged). All restores are attempted even when some
/// fail.
///
/// Error precedence: a restore failure is returned in preference to an entry
/// or body failure, which is logged instead. Among restore failures the first
/// one is returned.
pub async fn suppress_cleanup<S, T, F>(
    snapper: &dyn Snapper,
    snapshots: &mut [S],
    dry_run: bool,
    body: F,
) -> Result<T>
where
    S: BorrowMut<Snapshot> + Send,
    F: for<'a> FnOnce(&'a mut [S]) -> BoxFuture<'a, Result<T>>,
{
    info!(count = snapshots.len(), dry_run, "suppressing snapper cleanup");

    let outcome = match disable_all(snapper, snapshots, dry_run).await {
        Ok(()) => body(&mut *snapshots).await,
        Err(e) => Err(e),
    };

    let restored = restore_all(snapper, snapshots, dry_run).await;

    match (outcome, restored) {
        (outcome, Ok(())) => outcome,
        (Ok(_), Err(restore_error)) => Err(restore_error),
        (Err(original), Err(restore_error)) => {
            error!(error = %original, "error superseded by cleanup restore failure");
            Err(restore_error)
        }
    }
}

async fn disable_all<S: Borrow<Snapshot>>(
    snapper: &dyn Snapper,
    snapshots: &[S],
    dry_run: bool,
) -> Result<()> {
    for snapshot in snapshots {
        let snapshot: &Snapshot = snapshot.borrow();
        snapshot.disable_cleanup(snapper, dry_run).await?;
        debug!(config = snapshot.config_name(), snapshot = snapshot.number(), "cleanup suppressed");
    }
    Ok(())
}

async fn restore_all<S: Borrow<Snapshot>>(
    snapper: &dyn Snapper,
    snapshots: &[S],
    dry_run: bool,
) -> Result<()> {
    let mut first_error = None;

    for snapshot in snapshots {
        let snapshot: &Snapshot = snapshot.borrow();
        match snapshot.restore_cleanup(snapper, dry_run).await {
            Ok(()) => debug!(
                config = snapshot.config_name(),
                snapshot = snapshot.number(),
                algorithm = snapshot.cleanup_algorithm(),
                "cleanup restored"
            ),
            Err(e) if first_error.is_none() => first_error = Some(e),
            Err(e) => error!(
                config = snapshot.config_name(),
                snapshot = snapshot.number(),
                error = %e,
                "failed to restore cleanup algorithm"
            ),
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
