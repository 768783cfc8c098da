use std::path::{Path, PathBuf};

/// Overrides the directory that backs the shared-memory namespace.
pub const SHM_DIR_ENV: &str = "BINSTAGE_SHM_DIR";

/// When truthy, derived segment names get a `-<pid>` suffix.
pub const UNIQUE_SEGMENTS_ENV: &str = "BINSTAGE_UNIQUE_SEGMENTS";

const POSIX_SHM_DIR: &str = "/dev/shm";

// ---------------------------------------------------------------------------
// StagingConfig
// ---------------------------------------------------------------------------

/// Where staging segments live and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingConfig {
    /// Directory standing in for the system shared-memory namespace.
    /// A segment named `N` is the file `namespace_dir/N`.
    pub namespace_dir: PathBuf,
    /// Salt derived names with the process id so concurrent runs on
    /// same-named inputs do not collide.
    pub unique_names: bool,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            namespace_dir: default_namespace_dir(),
            unique_names: false,
        }
    }
}

impl StagingConfig {
    /// A config rooted at `dir`, deterministic names.
    pub fn with_namespace_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            namespace_dir: dir.into(),
            unique_names: false,
        }
    }

    /// Build from `BINSTAGE_SHM_DIR` / `BINSTAGE_UNIQUE_SEGMENTS`, falling
    /// back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let namespace_dir = lookup(SHM_DIR_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_namespace_dir);
        let unique_names = lookup(UNIQUE_SEGMENTS_ENV)
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        Self {
            namespace_dir,
            unique_names,
        }
    }

    /// Path of the namespace entry for `name`.
    pub fn segment_path(&self, name: &str) -> PathBuf {
        self.namespace_dir.join(name)
    }
}

fn default_namespace_dir() -> PathBuf {
    let shm = Path::new(POSIX_SHM_DIR);
    if shm.is_dir() {
        shm.to_path_buf()
    } else {
        std::env::temp_dir().join("binstage-shm")
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
