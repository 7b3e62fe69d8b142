//! Bulk cancellation of every registration bound to a device token.
//!
//! One task per registration issues the delete and reports on a channel. The
//! coordinator returns on the first failure or once every delete has
//! succeeded, whichever comes first. Tasks still in flight after a failure
//! run to completion on their own and their results are dropped.

use crate::engine::Reconciler;
use crate::error::{HubError, HubResult};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub(crate) async fn cancel_all(reconciler: &Reconciler, device_token: &str) -> HubResult<()> {
    let registrations = reconciler.list(device_token).await?;
    let total = registrations.len();
    if total == 0 {
        debug!("No registrations to delete for token {}", device_token);
        return Ok(());
    }

    debug!("Deleting {} registrations for token {}", total, device_token);

    // Capacity `total` so no sender ever waits on a receiver that has gone.
    let (tx, mut rx) = mpsc::channel::<HubResult<()>>(total);
    for registration in registrations {
        let reconciler = reconciler.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = reconciler.delete(&registration).await;
            if let Err(e) = &result {
                debug!("Delete of {} failed: {}", registration.id, e);
            }
            // Fails only when an earlier failure was already reported.
            let _ = tx.send(result).await;
        });
    }
    drop(tx);

    let mut succeeded = 0;
    while let Some(result) = rx.recv().await {
        if let Err(e) = result {
            warn!(
                "Bulk delete for token {} failed after {} of {} deletions: {}",
                device_token, succeeded, total, e
            );
            return Err(e);
        }
        succeeded += 1;
        if succeeded == total {
            info!("Deleted all {} registrations for token {}", total, device_token);
            return Ok(());
        }
    }

    Err(HubError::unknown(format!(
        "{} of {} delete tasks ended without reporting",
        total - succeeded,
        total
    )))
}
