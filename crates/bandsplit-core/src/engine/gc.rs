//! Deferred release of chains dropped on the audio thread
//!
//! A [`ChainHandle`](crate::effect::ChainHandle) wraps its chain in a
//! `basedrop::Shared`. When the last reference goes away on the audio thread
//! (a band is removed, a chain is swapped), the drop only enqueues a pointer.
//! The chain itself, and whatever plugin state it owns, is freed on a
//! background collector thread.

use basedrop::{Collector, Handle};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, OnceLock};
use std::thread;
use std::time::Duration;

/// How often the collector thread reclaims deferred drops
const COLLECT_INTERVAL: Duration = Duration::from_millis(50);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// Completed collection passes since the collector started
static COLLECT_PASSES: AtomicU64 = AtomicU64::new(0);

/// Start the collector thread and return a handle bound to it
///
/// The `Collector` is !Sync, so it is created on the thread that runs it and
/// only the handle comes back.
fn spawn_collector() -> io::Result<Handle> {
    let (handle_tx, handle_rx) = mpsc::sync_channel(1);

    thread::Builder::new()
        .name("chain-gc".to_string())
        .spawn(move || {
            let mut collector = Collector::new();
            if handle_tx.send(collector.handle()).is_err() {
                return;
            }
            log::info!("chain-gc: collecting every {:?}", COLLECT_INTERVAL);

            loop {
                collector.collect();
                COLLECT_PASSES.fetch_add(1, Ordering::Release);
                thread::sleep(COLLECT_INTERVAL);
            }
        })?;

    handle_rx
        .recv()
        .map_err(|_| io::Error::other("chain-gc exited before handing out its handle"))
}

/// Handle for allocating `Shared<T>` values released on the collector thread
///
/// The first call starts the collector. Without it no chain can be attached,
/// so failing to start it is fatal.
pub fn gc_handle() -> Handle {
    GC_HANDLE
        .get_or_init(|| {
            spawn_collector().unwrap_or_else(|e| panic!("Failed to start chain collector: {}", e))
        })
        .clone()
}

/// Number of collection passes completed so far
pub fn collect_passes() -> u64 {
    COLLECT_PASSES.load(Ordering::Acquire)
}
