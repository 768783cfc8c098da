use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

// ---------------------------------------------------------------------------
// Live-segment registry
// ---------------------------------------------------------------------------

/// Namespace entries owned by this process that have not been released yet,
/// plus temp files of table writes in flight.  The interrupt handler drains
/// it; normal release paths unregister.
static LIVE_SEGMENTS: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

fn live() -> MutexGuard<'static, Vec<PathBuf>> {
    // A panic while holding the lock must not stop cleanup.
    LIVE_SEGMENTS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn track(path: &Path) {
    live().push(path.to_path_buf());
}

pub(crate) fn untrack(path: &Path) {
    live().retain(|p| p != path);
}

/// Whether `path` is currently registered for shutdown cleanup.
pub fn is_tracked(path: &Path) -> bool {
    live().iter().any(|p| p == path)
}

/// Remove every registered entry (staged segments and in-flight temp
/// files) from the filesystem.  Returns how many were actually removed.
/// Mappings are left alone; this is meant for a process that is about to
/// exit.
pub fn release_all_tracked() -> usize {
    release_tracked_where(|_| true)
}

/// Like [`release_all_tracked`], limited to entries matching `select`.
pub(crate) fn release_tracked_where(select: impl Fn(&Path) -> bool) -> usize {
    let paths: Vec<PathBuf> = {
        let mut registry = live();
        let (selected, kept): (Vec<PathBuf>, Vec<PathBuf>) =
            registry.drain(..).partition(|p| select(p));
        *registry = kept;
        selected
    };
    let mut removed = 0;
    for path in paths {
        match std::fs::remove_file(&path) {
            Ok(()) => {
                log::warn!("removed {} during shutdown", path.display());
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::error!("could not remove {}: {e}", path.display()),
        }
    }
    removed
}

// ---------------------------------------------------------------------------
// Interrupt handling
// ---------------------------------------------------------------------------

/// Exit status used after an interrupt (128 + SIGINT).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Install a SIGINT/SIGTERM handler that releases all live segments and
/// exits.  Only one handler may be installed per process.
pub fn install_interrupt_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        let removed = release_all_tracked();
        eprintln!("Interrupted; removed {removed} staging file(s)");
        std::process::exit(INTERRUPTED_EXIT_CODE);
    })
}
