use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapMut};

use super::guard;
use crate::config::StagingConfig;
use crate::error::{ConvertError, InputError};

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// Derive the segment name from the input's base name, extension removed
/// (`/data/run_01.bin` → `run_01`).
///
/// This is a convention, not a uniqueness guarantee: two inputs sharing a
/// base name map to the same segment unless `config.unique_names` is set.
pub fn segment_name_for(input: &Path, config: &StagingConfig) -> Result<String, InputError> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty() && !s.contains('\0'))
        .ok_or_else(|| InputError::InvalidSegmentName {
            path: input.to_path_buf(),
        })?;

    if config.unique_names {
        Ok(format!("{stem}-{}", std::process::id()))
    } else {
        Ok(stem.to_string())
    }
}

// ---------------------------------------------------------------------------
// StagingSegment – the owning handle
// ---------------------------------------------------------------------------

/// A named shared-memory segment created and owned by this process.
///
/// The namespace entry is removed exactly once: by [`release`](Self::release)
/// or, if that never happens, when the handle is dropped.
#[derive(Debug)]
pub struct StagingSegment {
    name: String,
    path: PathBuf,
    map: Option<MmapMut>,
    released: bool,
}

impl StagingSegment {
    /// Read `input` and stage its bytes in a segment named after it.
    ///
    /// Empty inputs are rejected with [`InputError::Empty`] before any
    /// segment exists.
    pub fn create_from_file(config: &StagingConfig, input: &Path) -> Result<Self, ConvertError> {
        let name = segment_name_for(input, config)?;
        let data = fs::read(input).map_err(|source| InputError::Unreadable {
            path: input.to_path_buf(),
            source,
        })?;
        if data.is_empty() {
            return Err(InputError::Empty {
                path: input.to_path_buf(),
            }
            .into());
        }
        log::debug!("read {} bytes from {}", data.len(), input.display());
        Self::create(config, &name, &data)
    }

    /// Allocate a segment of exactly `data.len()` bytes under `name` and copy
    /// `data` into it in one pass.
    ///
    /// # Errors
    ///
    /// [`ConvertError::SegmentAlreadyExists`] if the name is taken; the
    /// existing entry is left untouched.  Any later failure removes the
    /// entry this call created before returning.
    pub fn create(config: &StagingConfig, name: &str, data: &[u8]) -> Result<Self, ConvertError> {
        let segment_err = |source: io::Error| ConvertError::Segment {
            name: name.to_string(),
            source,
        };

        fs::create_dir_all(&config.namespace_dir).map_err(segment_err)?;
        let path = config.segment_path(name);
        let file = open_exclusive(&path).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => ConvertError::SegmentAlreadyExists {
                name: name.to_string(),
            },
            _ => segment_err(e),
        })?;

        guard::track(&path);
        // From here on, dropping `segment` removes the namespace entry.
        let mut segment = StagingSegment {
            name: name.to_string(),
            path,
            map: None,
            released: false,
        };

        file.set_len(data.len() as u64).map_err(segment_err)?;
        // SAFETY: the entry was created exclusively above and is only
        // resized or removed through this handle.
        let mut map = unsafe { MmapMut::map_mut(&file) }.map_err(segment_err)?;
        map.copy_from_slice(data);
        map.flush().map_err(segment_err)?;
        segment.map = Some(map);

        log::info!(
            "created segment '{}' ({} bytes) at {}",
            segment.name,
            data.len(),
            segment.path.display()
        );
        Ok(segment)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Segment size in bytes.
    pub fn len(&self) -> usize {
        self.map.as_ref().map_or(0, |m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The staged bytes, as seen by the owner.
    pub fn as_bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    /// Detach the mapping and remove the segment from the namespace.
    pub fn release(mut self) -> Result<(), ConvertError> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<(), ConvertError> {
        self.released = true;
        drop(self.map.take());
        guard::untrack(&self.path);
        remove_entry(&self.name, &self.path)?;
        log::debug!("released segment '{}'", self.name);
        Ok(())
    }
}

impl Drop for StagingSegment {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match self.release_inner() {
            Ok(()) => log::warn!("segment '{}' released on drop", self.name),
            Err(e) => log::error!("segment '{}' could not be released: {e}", self.name),
        }
    }
}

/// Remove a segment from the namespace by name.
///
/// Releasing a name that is not present reports
/// [`ConvertError::SegmentNotFound`], so a second release is harmless.
pub fn release_named(config: &StagingConfig, name: &str) -> Result<(), ConvertError> {
    remove_entry(name, &config.segment_path(name))
}

fn remove_entry(name: &str, path: &Path) -> Result<(), ConvertError> {
    fs::remove_file(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ConvertError::SegmentNotFound {
            name: name.to_string(),
        },
        _ => ConvertError::Segment {
            name: name.to_string(),
            source: e,
        },
    })
}

fn open_exclusive(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

// ---------------------------------------------------------------------------
// AttachedSegment – non-owning, read-only access
// ---------------------------------------------------------------------------

/// A read-only mapping of an existing segment.  Dropping or detaching it
/// never removes the segment.
#[derive(Debug)]
pub struct AttachedSegment {
    name: String,
    map: Mmap,
}

impl AttachedSegment {
    /// Map the segment called `name`.
    pub fn attach(config: &StagingConfig, name: &str) -> Result<Self, ConvertError> {
        let file = File::open(config.segment_path(name)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConvertError::SegmentNotFound {
                name: name.to_string(),
            },
            _ => ConvertError::Segment {
                name: name.to_string(),
                source: e,
            },
        })?;
        // SAFETY: single-writer convention; the owner finished writing
        // before anyone attaches.
        let map = unsafe { Mmap::map(&file) }.map_err(|source| ConvertError::Segment {
            name: name.to_string(),
            source,
        })?;
        log::debug!("attached segment '{name}' ({} bytes)", map.len());
        Ok(AttachedSegment {
            name: name.to_string(),
            map,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.map
    }

    /// Drop the local mapping, leaving the segment in place.
    pub fn detach(self) {
        log::debug!("detached segment '{}'", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn name_is_base_name_without_extension() {
        let cfg = StagingConfig::with_namespace_dir("/unused");
        let name = segment_name_for(Path::new("/data/run_01.bin"), &cfg).unwrap();
        assert_eq!(name, "run_01");
        let name = segment_name_for(Path::new("archive.tar.gz"), &cfg).unwrap();
        assert_eq!(name, "archive.tar");
        assert!(segment_name_for(Path::new("/"), &cfg).is_err());
    }

    #[test]
    fn unique_names_are_salted_with_pid() {
        let mut cfg = StagingConfig::with_namespace_dir("/unused");
        cfg.unique_names = true;
        let name = segment_name_for(Path::new("data.bin"), &cfg).unwrap();
        assert_eq!(name, format!("data-{}", std::process::id()));
    }

    #[test]
    fn create_copies_bytes_and_attach_sees_them() {
        let dir = tempdir().unwrap();
        let cfg = StagingConfig::with_namespace_dir(dir.path());
        let data: Vec<u8> = (0u8..32).collect();

        let seg = StagingSegment::create(&cfg, "copy", &data).unwrap();
        assert_eq!(seg.len(), 32);
        assert_eq!(seg.as_bytes(), &data[..]);
        assert!(cfg.segment_path("copy").exists());
        assert!(guard::is_tracked(seg.path()));

        let attached = AttachedSegment::attach(&cfg, "copy").unwrap();
        assert_eq!(attached.as_bytes(), &data[..]);
        attached.detach();
        // Detaching does not remove the segment.
        assert!(cfg.segment_path("copy").exists());

        let path = seg.path().to_path_buf();
        seg.release().unwrap();
        assert!(!path.exists());
        assert!(!guard::is_tracked(&path));
    }

    #[test]
    fn existing_name_is_rejected_and_left_alone() {
        let dir = tempdir().unwrap();
        let cfg = StagingConfig::with_namespace_dir(dir.path());
        fs::write(cfg.segment_path("stale"), b"old").unwrap();

        let err = StagingSegment::create(&cfg, "stale", b"new bytes").unwrap_err();
        assert!(matches!(err, ConvertError::SegmentAlreadyExists { ref name } if name == "stale"));
        assert_eq!(fs::read(cfg.segment_path("stale")).unwrap(), b"old");
    }

    #[test]
    fn second_release_reports_not_found() {
        let dir = tempdir().unwrap();
        let cfg = StagingConfig::with_namespace_dir(dir.path());

        let seg = StagingSegment::create(&cfg, "twice", &[1, 2, 3, 4]).unwrap();
        seg.release().unwrap();
        let err = release_named(&cfg, "twice").unwrap_err();
        assert!(matches!(err, ConvertError::SegmentNotFound { .. }));
    }

    #[test]
    fn drop_releases_unreleased_segment() {
        let dir = tempdir().unwrap();
        let cfg = StagingConfig::with_namespace_dir(dir.path());
        {
            let _seg = StagingSegment::create(&cfg, "scoped", &[0; 8]).unwrap();
            assert!(cfg.segment_path("scoped").exists());
        }
        assert!(!cfg.segment_path("scoped").exists());
    }

    #[test]
    fn attach_missing_segment_fails() {
        let dir = tempdir().unwrap();
        let cfg = StagingConfig::with_namespace_dir(dir.path());
        let err = AttachedSegment::attach(&cfg, "nope").unwrap_err();
        assert!(matches!(err, ConvertError::SegmentNotFound { ref name } if name == "nope"));
    }

    #[test]
    fn create_from_file_uses_derived_name() {
        let dir = tempdir().unwrap();
        let cfg = StagingConfig::with_namespace_dir(dir.path().join("shm"));
        let input = dir.path().join("samples.bin");
        fs::write(&input, 1.5f64.to_ne_bytes()).unwrap();

        let seg = StagingSegment::create_from_file(&cfg, &input).unwrap();
        assert_eq!(seg.name(), "samples");
        assert_eq!(seg.as_bytes(), &1.5f64.to_ne_bytes());
        seg.release().unwrap();
    }

    #[test]
    fn create_from_file_rejects_empty_input() {
        let dir = tempdir().unwrap();
        let cfg = StagingConfig::with_namespace_dir(dir.path().join("shm"));
        let input = dir.path().join("empty.bin");
        fs::write(&input, b"").unwrap();

        let err = StagingSegment::create_from_file(&cfg, &input).unwrap_err();
        assert!(matches!(err, ConvertError::Input(InputError::Empty { .. })));
        assert!(!cfg.segment_path("empty").exists());
        assert!(!cfg.namespace_dir.exists());
    }
}
