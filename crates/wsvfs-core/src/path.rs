//! Virtual path model.
//!
//! The host addresses everything through one slash-delimited tree:
//!
//! ```text
//! /                                   Root         (account list)
//! /alice                              Account      (access levels)
//! /alice/Private                      AccessLevel  (top of a partition)
//! /alice/Private/docs/report.pdf      Folder       (any deeper item)
//! ```
//!
//! [`VirtualPath`] parses that string once and derives the level, the account
//! name, the visibility partition and the backend-relative path. Conversions
//! to backend identifiers ([`FolderPath`], [`FilePath`]) are explicit methods
//! so every crossing between representations is visible at the call site.

use std::fmt;

use thiserror::Error;

/// Label of the public partition shown under every account.
pub const PUBLIC_FOLDER: &str = "Public";

/// Label of the private partition shown under every account.
pub const PRIVATE_FOLDER: &str = "Private";

const SEPARATORS: [char; 2] = ['/', '\\'];

/// Errors produced while parsing a raw host path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The path does not start with a separator.
    #[error("relative paths are not supported: '{0}'")]
    Relative(String),
}

/// Depth of a [`VirtualPath`] in the virtual tree.
///
/// Ordered so that level checks read naturally (`level <= AccessLevel`).
/// Every path with three or more segments is [`PathLevel::Folder`]; files
/// share that level with folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathLevel {
    /// The plugin root listing accounts.
    Root,
    /// An account node.
    Account,
    /// The public or private partition of an account.
    AccessLevel,
    /// A folder or file inside a partition.
    Folder,
}

impl PathLevel {
    fn from_depth(depth: usize) -> Self {
        match depth {
            0 => PathLevel::Root,
            1 => PathLevel::Account,
            2 => PathLevel::AccessLevel,
            _ => PathLevel::Folder,
        }
    }
}

/// A parsed host path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VirtualPath {
    segments: Vec<String>,
}

impl VirtualPath {
    /// The root path (no segments).
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a raw host path.
    ///
    /// Both `/` and `\` separate segments and empty segments are dropped.
    /// Empty or whitespace-only input yields the root.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let trimmed = raw.trim();
        let Some(first) = trimmed.chars().next() else {
            return Ok(Self::root());
        };
        if !SEPARATORS.contains(&first) {
            return Err(PathError::Relative(trimmed.to_string()));
        }

        let segments = trimmed[first.len_utf8()..]
            .split(SEPARATORS)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn level(&self) -> PathLevel {
        PathLevel::from_depth(self.segments.len())
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The account segment, empty at the root.
    pub fn account_name(&self) -> &str {
        self.segments.first().map_or("", String::as_str)
    }

    /// True unless the partition segment is exactly [`PUBLIC_FOLDER`].
    ///
    /// Paths above the partition level count as private.
    pub fn is_private(&self) -> bool {
        self.segments.get(1).map(String::as_str) != Some(PUBLIC_FOLDER)
    }

    /// Backend-relative path: `/` followed by the segments below the
    /// partition. `/` for Root, Account and AccessLevel paths.
    pub fn backend_path(&self) -> String {
        let rest = self.segments.get(2..).unwrap_or_default();
        format!("/{}", rest.join("/"))
    }

    /// The last segment, `None` at the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The path with its last segment removed. The root is its own parent.
    #[must_use]
    pub fn parent(&self) -> Self {
        let keep = self.segments.len().saturating_sub(1);
        Self {
            segments: self.segments[..keep].to_vec(),
        }
    }

    /// Appends one segment.
    #[must_use]
    pub fn join(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(
            name.split(SEPARATORS)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        Self { segments }
    }

    /// True when both paths sit in the same folder of the same partition.
    pub fn shares_parent_with(&self, other: &VirtualPath) -> bool {
        self.parent() == other.parent()
    }

    pub fn to_folder_path(&self) -> FolderPath {
        FolderPath {
            path: self.backend_path(),
            is_private: self.is_private(),
        }
    }

    pub fn to_file_path(&self) -> FilePath {
        FilePath {
            path: self.backend_path(),
            is_private: self.is_private(),
        }
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.backend_path())
    }
}

impl std::str::FromStr for VirtualPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Backend identifier of a folder: backend-relative path plus partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderPath {
    path: String,
    is_private: bool,
}

impl FolderPath {
    pub fn new(path: impl Into<String>, is_private: bool) -> Self {
        Self {
            path: normalize_backend(path.into()),
            is_private,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_private(&self) -> bool {
        self.is_private
    }

    /// Last path component, empty for the partition root.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    pub fn is_partition_root(&self) -> bool {
        self.path == "/"
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let partition = if self.is_private { PRIVATE_FOLDER } else { PUBLIC_FOLDER };
        write!(f, "{partition}:{}", self.path)
    }
}

/// Backend identifier of a file: backend-relative path plus partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilePath {
    path: String,
    is_private: bool,
}

impl FilePath {
    pub fn new(path: impl Into<String>, is_private: bool) -> Self {
        Self {
            path: normalize_backend(path.into()),
            is_private,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_private(&self) -> bool {
        self.is_private
    }

    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// The folder containing this file.
    pub fn folder(&self) -> FolderPath {
        let parent = match self.path.rfind('/') {
            Some(0) | None => "/",
            Some(idx) => &self.path[..idx],
        };
        FolderPath::new(parent, self.is_private)
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let partition = if self.is_private { PRIVATE_FOLDER } else { PUBLIC_FOLDER };
        write!(f, "{partition}:{}", self.path)
    }
}

fn normalize_backend(path: String) -> String {
    let joined = path
        .split(SEPARATORS)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{joined}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace_parse_to_root() {
        for raw in ["", "   ", "\t"] {
            let path = VirtualPath::parse(raw).unwrap();
            assert_eq!(path.level(), PathLevel::Root);
            assert!(path.segments().is_empty());
        }
    }

    #[test]
    fn test_relative_path_rejected() {
        let err = VirtualPath::parse("alice/Private").unwrap_err();
        assert_eq!(err, PathError::Relative("alice/Private".to_string()));
    }

    #[test]
    fn test_levels() {
        assert_eq!(VirtualPath::parse("/").unwrap().level(), PathLevel::Root);
        assert_eq!(VirtualPath::parse("/alice").unwrap().level(), PathLevel::Account);
        assert_eq!(
            VirtualPath::parse("/alice/Public").unwrap().level(),
            PathLevel::AccessLevel
        );
        assert_eq!(
            VirtualPath::parse("/alice/Public/a/b/c/d").unwrap().level(),
            PathLevel::Folder
        );
    }

    #[test]
    fn test_mixed_separators_and_empty_segments() {
        let path = VirtualPath::parse("\\alice\\Private//docs/\\report.pdf").unwrap();
        assert_eq!(path.segments(), ["alice", "Private", "docs", "report.pdf"]);
        assert_eq!(path.backend_path(), "/docs/report.pdf");
    }

    #[test]
    fn test_derived_fields() {
        let path = VirtualPath::parse("/alice/Public/docs/report.pdf").unwrap();
        assert_eq!(path.account_name(), "alice");
        assert!(!path.is_private());
        assert_eq!(path.name(), Some("report.pdf"));
        assert_eq!(path.to_string(), "/docs/report.pdf");

        let private = VirtualPath::parse("/alice/Private/docs").unwrap();
        assert!(private.is_private());
    }

    #[test]
    fn test_visibility_defaults_to_private() {
        assert!(VirtualPath::root().is_private());
        assert!(VirtualPath::parse("/alice").unwrap().is_private());
        assert!(VirtualPath::parse("/alice/public").unwrap().is_private());
    }

    #[test]
    fn test_backend_path_empty_above_folder_level() {
        assert_eq!(VirtualPath::root().backend_path(), "/");
        assert_eq!(VirtualPath::parse("/alice").unwrap().backend_path(), "/");
        assert_eq!(VirtualPath::parse("/alice/Private").unwrap().backend_path(), "/");
    }

    #[test]
    fn test_parent_rederives_fields() {
        let path = VirtualPath::parse("/alice/Public/docs/report.pdf").unwrap();
        let parent = path.parent();
        assert_eq!(parent.backend_path(), "/docs");
        assert_eq!(parent.level(), PathLevel::Folder);

        let top = parent.parent().parent();
        assert_eq!(top.level(), PathLevel::Account);
        assert!(top.is_private());
        assert_eq!(VirtualPath::root().parent(), VirtualPath::root());
    }

    #[test]
    fn test_backend_identifiers() {
        let path = VirtualPath::parse("/alice/Public/docs/report.pdf").unwrap();
        let file = path.to_file_path();
        assert_eq!(file.path(), "/docs/report.pdf");
        assert!(!file.is_private());
        assert_eq!(file.name(), "report.pdf");
        assert_eq!(file.folder(), FolderPath::new("/docs", false));
        assert_eq!(FilePath::new("/top.txt", true).folder(), FolderPath::new("/", true));
        assert!(path.parent().parent().to_folder_path().is_partition_root());
    }

    #[test]
    fn test_shares_parent() {
        let a = VirtualPath::parse("/alice/Private/docs/a.txt").unwrap();
        let b = VirtualPath::parse("/alice/Private/docs/b.txt").unwrap();
        let c = VirtualPath::parse("/alice/Public/docs/b.txt").unwrap();
        assert!(a.shares_parent_with(&b));
        assert!(!a.shares_parent_with(&c));
    }

    #[test]
    fn test_join_appends_sibling() {
        let target = VirtualPath::parse("/alice/Private/docs/b.txt").unwrap();
        let sibling = target.parent().join("a.txt");
        assert_eq!(sibling, VirtualPath::parse("/alice/Private/docs/a.txt").unwrap());
        assert!(sibling.shares_parent_with(&target));
        assert_eq!(VirtualPath::root().join("/alice/").segments(), ["alice"]);
    }
}
