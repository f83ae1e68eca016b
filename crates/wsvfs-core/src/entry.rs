//! Directory entries as handed to the host, and the disposable listing that
//! produces them.

use std::fmt;
use std::time::SystemTime;

use tracing::{trace, warn};

use crate::remote::{ItemStream, RemoteItem};

/// Name of the parent-directory marker entry.
pub const PARENT_MARKER: &str = "..";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    File,
}

/// One row of a host directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub created: Option<SystemTime>,
    pub read_only: bool,
}

impl DirEntry {
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Folder,
            size: 0,
            created: None,
            read_only: false,
        }
    }

    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size,
            created: None,
            read_only: false,
        }
    }

    /// The `..` entry.
    pub fn parent_marker() -> Self {
        Self::folder(PARENT_MARKER)
    }

    #[must_use]
    pub fn with_created(mut self, created: SystemTime) -> Self {
        self.created = Some(created);
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

impl From<RemoteItem> for DirEntry {
    fn from(item: RemoteItem) -> Self {
        match item {
            RemoteItem::Folder(folder) => {
                DirEntry::folder(folder.name()).with_created(folder.created)
            }
            RemoteItem::File(file) => DirEntry::file(file.name(), file.size).with_created(file.created),
        }
    }
}

/// A listing over a live remote item stream.
///
/// The remote listing handle is released when the listing is exhausted,
/// hits an error, is [closed](Self::close) or is dropped, whichever comes
/// first. An error mid-listing ends the listing; entries already yielded
/// stay valid.
pub struct DirListing {
    stream: Option<ItemStream>,
}

impl DirListing {
    pub fn new(stream: ItemStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// A listing with no entries.
    pub fn empty() -> Self {
        Self { stream: None }
    }

    /// True once the underlying stream has been released.
    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }

    /// Releases the remote listing handle.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            trace!("remote listing released");
        }
    }
}

impl Iterator for DirListing {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        let next = self.stream.as_mut()?.next();
        match next {
            Some(Ok(item)) => Some(item.into()),
            Some(Err(e)) => {
                warn!(error = %e, "listing interrupted");
                self.release();
                None
            }
            None => {
                self.release();
                None
            }
        }
    }
}

impl fmt::Debug for DirListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirListing")
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{FilePath, FolderPath};
    use crate::remote::{RemoteError, RemoteFile, RemoteFolder};

    fn folder(path: &str) -> RemoteItem {
        RemoteItem::Folder(RemoteFolder {
            path: FolderPath::new(path, true),
            created: SystemTime::UNIX_EPOCH,
        })
    }

    fn file(path: &str, size: u64) -> RemoteItem {
        RemoteItem::File(RemoteFile {
            path: FilePath::new(path, true),
            size,
            created: SystemTime::UNIX_EPOCH,
        })
    }

    #[test]
    fn test_entry_from_remote_item() {
        let entry = DirEntry::from(file("/docs/a.txt", 12));
        assert_eq!(entry.name, "a.txt");
        assert_eq!(entry.size, 12);
        assert_eq!(entry.kind, EntryKind::File);
        assert_eq!(entry.created, Some(SystemTime::UNIX_EPOCH));

        let entry = DirEntry::from(folder("/docs"));
        assert!(entry.is_folder());
        assert_eq!(entry.name, "docs");
    }

    #[test]
    fn test_listing_yields_all_and_releases() {
        let items = vec![Ok(folder("/a")), Ok(file("/b.txt", 3))];
        let mut listing = DirListing::new(Box::new(items.into_iter()));
        let names: Vec<_> = listing.by_ref().map(|e| e.name).collect();
        assert_eq!(names, ["a", "b.txt"]);
        assert!(listing.is_released());
    }

    #[test]
    fn test_listing_stops_at_error() {
        let items = vec![
            Ok(file("/a.txt", 1)),
            Err(RemoteError::transport("connection reset")),
            Ok(file("/b.txt", 1)),
        ];
        let mut listing = DirListing::new(Box::new(items.into_iter()));
        assert_eq!(listing.next().unwrap().name, "a.txt");
        assert!(listing.next().is_none());
        assert!(listing.is_released());
        assert!(listing.next().is_none());
    }

    #[test]
    fn test_empty_listing() {
        let mut listing = DirListing::empty();
        assert!(listing.next().is_none());
        listing.close();
    }
}
