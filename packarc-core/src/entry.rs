//! Archive entry metadata shared by the container formats.

/// Kind of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryKind {
    /// Regular file.
    #[default]
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Hard link.
    Hardlink,
    /// Anything else (devices, fifos, unknown typeflags).
    Other,
}

/// Metadata for one archive entry.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Entry name (path within the archive).
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Modification time as seconds since the Unix epoch.
    pub mtime: u64,
    /// Unix permission bits.
    pub mode: u32,
    /// Owner user id.
    pub uid: u32,
    /// Owner group id.
    pub gid: u32,
    /// Entry kind.
    pub kind: EntryKind,
    /// Link target for symlinks and hardlinks.
    pub link_target: Option<String>,
    /// Byte offset of the entry data within the archive, where known.
    pub data_offset: u64,
}

impl Entry {
    /// Create a regular-file entry with default ownership and mode 0644.
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            mtime: 0,
            mode: 0o644,
            uid: 0,
            gid: 0,
            kind: EntryKind::File,
            link_target: None,
            data_offset: 0,
        }
    }

    /// Create a directory entry with mode 0755.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            mtime: 0,
            mode: 0o755,
            uid: 0,
            gid: 0,
            kind: EntryKind::Directory,
            link_target: None,
            data_offset: 0,
        }
    }

    /// Set the modification time.
    pub fn with_mtime(mut self, mtime: u64) -> Self {
        self.mtime = mtime;
        self
    }

    /// Set the permission bits.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Whether the entry is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let entry = Entry::file("src/lib.rs", 1234).with_mtime(1_700_000_000).with_mode(0o600);
        assert!(entry.is_file());
        assert_eq!(entry.mode, 0o600);
        assert_eq!(entry.mtime, 1_700_000_000);

        let dir = Entry::directory("src");
        assert_eq!(dir.kind, EntryKind::Directory);
        assert_eq!(dir.size, 0);
    }
}
