use std::fs::Metadata;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;

/// File facts the tape needs to build an entry header.
#[derive(Debug, Clone, Copy)]
pub struct FileMeta {
    pub len: u64,
    /// Unix permission bits; 0644 on platforms without them.
    pub mode: u32,
    /// Modification time, seconds since the epoch.
    pub mtime: u64,
    pub is_dir: bool,
}

/// The slice of filesystem behavior the tape and keystore consume.
///
/// Production code uses [`OsFs`]; tests can substitute a double to inject
/// failures without touching a real disk.
pub trait Vfs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>>;

    /// Opens `path` for writing with create + truncate, file mode 0600.
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write>>;

    fn metadata(&self, path: &Path) -> io::Result<FileMeta>;

    fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Recursively lists the non-directory entries under `root`, in walk
    /// order. Directories themselves are not reported.
    fn walk(&self, root: &Path) -> io::Result<Vec<PathBuf>>;
}

/// [`Vfs`] backed by the real filesystem.
pub struct OsFs;

impl Vfs for OsFs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(fs_err::File::open(path)?))
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        let mut options = fs_err::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(target_family = "unix")]
        {
            use fs_err::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        Ok(Box::new(options.open(path)?))
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let metadata = fs_err::metadata(path)?;
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        Ok(FileMeta {
            len: metadata.len(),
            mode: unix_mode(&metadata).unwrap_or(0o644) & 0o7777,
            mtime,
            is_dir: metadata.is_dir(),
        })
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(target_family = "unix")]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(mode);
        }
        #[cfg(not(target_family = "unix"))]
        let _ = mode;
        builder.create(path)
    }

    fn walk(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_dir() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

#[cfg(target_family = "unix")]
fn unix_mode(metadata: &Metadata) -> Option<u32> {
    use std::os::unix::prelude::PermissionsExt;

    Some(metadata.permissions().mode())
}

#[cfg(not(target_family = "unix"))]
fn unix_mode(_metadata: &Metadata) -> Option<u32> {
    None
}
