//! Directory listings handed to the host.
//!
//! The two top levels are synthesized: the root holds the add-account entry
//! and one folder per account, an account holds its two partitions. Deeper
//! levels come from the remote, except while a bulk delete or move runs;
//! then a single entry stands in for the whole folder so the host does not
//! walk the tree item by item.

use std::vec;

use wsvfs_core::{DirEntry, DirListing, PRIVATE_FOLDER, PUBLIC_FOLDER};

/// Root entry that starts the add-account flow when opened.
pub const ADD_ACCOUNT_ENTRY: &str = "<Add account>";

/// Stand-in entry for a non-empty folder during bulk delete and move.
pub const PLACEHOLDER_ENTRY: &str = "<$VirtualEmptyFileForDeletingOrMovingFolderOnServer$>.virtual";

/// Bulk operation the host announced through lifecycle notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BulkMode {
    #[default]
    None,
    BulkDelete,
    BulkMove,
}

enum Source {
    Fixed(vec::IntoIter<DirEntry>),
    Remote { listing: DirListing, yielded: bool },
}

/// Entries of one directory. Dropping it releases any remote stream.
pub struct Listing {
    source: Source,
}

impl Listing {
    pub fn empty() -> Self {
        Self::fixed(Vec::new())
    }

    pub fn fixed(entries: Vec<DirEntry>) -> Self {
        Self {
            source: Source::Fixed(entries.into_iter()),
        }
    }

    pub fn single(entry: DirEntry) -> Self {
        Self::fixed(vec![entry])
    }

    /// Remote folder content; a folder with no items yields `..` so the host
    /// always gets one entry.
    pub fn remote(listing: DirListing) -> Self {
        Self {
            source: Source::Remote {
                listing,
                yielded: false,
            },
        }
    }

    pub fn root<'a>(accounts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut entries = vec![DirEntry::file(ADD_ACCOUNT_ENTRY, 0).read_only()];
        entries.extend(accounts.into_iter().map(DirEntry::folder));
        Self::fixed(entries)
    }

    pub fn partitions() -> Self {
        Self::fixed(vec![
            DirEntry::folder(PUBLIC_FOLDER),
            DirEntry::folder(PRIVATE_FOLDER),
        ])
    }

    pub fn placeholder() -> Self {
        Self::single(DirEntry::file(PLACEHOLDER_ENTRY, 0))
    }

    pub fn parent_only() -> Self {
        Self::single(DirEntry::parent_marker())
    }

    /// Releases the listing early.
    pub fn close(self) {}
}

impl Iterator for Listing {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        match &mut self.source {
            Source::Fixed(entries) => entries.next(),
            Source::Remote { listing, yielded } => {
                if let Some(entry) = listing.next() {
                    *yielded = true;
                    return Some(entry);
                }
                if *yielded {
                    return None;
                }
                *yielded = true;
                Some(DirEntry::parent_marker())
            }
        }
    }
}

impl std::fmt::Debug for Listing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.source {
            Source::Fixed(_) => "fixed",
            Source::Remote { .. } => "remote",
        };
        f.debug_struct("Listing").field("source", &kind).finish()
    }
}
