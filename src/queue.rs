//! Dual queue scheduler: a priority queue for notebook builds and a FIFO
//! queue for enrichment, each with its own enqueue-dedup set.
//!
//! Each queue is drained by exactly one consumer. Popping an entry removes its
//! actor from the dedup set, so a new submission can wait behind the run that
//! is executing, but two submissions for one actor can never wait together.

mod build;
mod enrichment;
mod priority;

pub use build::{BuildEntry, BuildQueue};
pub use enrichment::{EnrichmentEntry, EnrichmentQueue};
pub use priority::{next_sequence, PriorityQueue};

use tokio::sync::{watch, Notify};

/// Wait until `try_pop` yields an item or shutdown is signalled.
///
/// The shutdown flag is checked before each attempt, so a consumer never
/// takes new work after shutdown. Work already taken is not interrupted.
pub(crate) async fn pop_or_shutdown<T>(
    notify: &Notify,
    shutdown: &mut watch::Receiver<bool>,
    mut try_pop: impl FnMut() -> Option<T>,
) -> Option<T> {
    loop {
        if *shutdown.borrow() {
            return None;
        }

        let notified = notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if let Some(item) = try_pop() {
            return Some(item);
        }

        tokio::select! {
            _ = &mut notified => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    return None;
                }
            }
        }
    }
}
