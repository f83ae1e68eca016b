//! Contracts of the remote storage client and the account backend.
//!
//! These are consumed, not implemented, by this crate: the wire protocol,
//! credential persistence and device registration live in the client
//! library. [`crate::testing`] provides in-memory implementations.
//!
//! Items are plain data ([`RemoteFolder`], [`RemoteFile`]); operations on an
//! item go through the client that produced it.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::path::{FilePath, FolderPath};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported by the remote client and the account backend.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The requested file does not exist.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The requested folder does not exist.
    #[error("folder not found: {0}")]
    FolderNotFound(String),

    /// The operation observed a cancelled token, or a credential prompt was
    /// dismissed.
    #[error("operation was cancelled")]
    Cancelled,

    /// The server refused the request.
    #[error("request rejected by server: {0}")]
    Rejected(String),

    /// Network or protocol failure.
    #[error("transport failure: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Local stream failure while transferring.
    #[error("stream error: {0}")]
    Io(#[from] io::Error),
}

impl RemoteError {
    pub fn transport(message: impl Into<String>) -> Self {
        RemoteError::Transport {
            message: message.into(),
            source: None,
        }
    }

    pub fn transport_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RemoteError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RemoteError::Cancelled)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RemoteError::FileNotFound(_) | RemoteError::FolderNotFound(_)
        )
    }

    /// Short kind label used in user notices.
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteError::FileNotFound(_) => "FileNotFound",
            RemoteError::FolderNotFound(_) => "FolderNotFound",
            RemoteError::Cancelled => "Cancelled",
            RemoteError::Rejected(_) => "Rejected",
            RemoteError::Transport { .. } => "Transport",
            RemoteError::Io(_) => "Io",
        }
    }
}

/// A remote folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFolder {
    pub path: FolderPath,
    pub created: SystemTime,
}

impl RemoteFolder {
    pub fn name(&self) -> &str {
        self.path.name()
    }
}

/// A remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: FilePath,
    pub size: u64,
    pub created: SystemTime,
}

impl RemoteFile {
    pub fn name(&self) -> &str {
        self.path.name()
    }
}

/// Anything a listing can return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteItem {
    Folder(RemoteFolder),
    File(RemoteFile),
}

impl RemoteItem {
    pub fn name(&self) -> &str {
        match self {
            RemoteItem::Folder(folder) => folder.name(),
            RemoteItem::File(file) => file.name(),
        }
    }

    /// Backend path of the item.
    pub fn backend_path(&self) -> &str {
        match self {
            RemoteItem::Folder(folder) => folder.path.path(),
            RemoteItem::File(file) => file.path.path(),
        }
    }

    pub fn is_private(&self) -> bool {
        match self {
            RemoteItem::Folder(folder) => folder.path.is_private(),
            RemoteItem::File(file) => file.path.is_private(),
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, RemoteItem::Folder(_))
    }

    /// True when both items address the same location.
    pub fn same_location(&self, other: &RemoteItem) -> bool {
        self.is_folder() == other.is_folder()
            && self.is_private() == other.is_private()
            && self.backend_path() == other.backend_path()
    }
}

impl From<RemoteFolder> for RemoteItem {
    fn from(folder: RemoteFolder) -> Self {
        RemoteItem::Folder(folder)
    }
}

impl From<RemoteFile> for RemoteItem {
    fn from(file: RemoteFile) -> Self {
        RemoteItem::File(file)
    }
}

/// A live listing. Holds the remote listing handle until dropped.
pub type ItemStream = Box<dyn Iterator<Item = Result<RemoteItem, RemoteError>> + Send>;

/// Progress reporting as seen by the remote client (percent, `0..=100`).
pub trait TransferProgress: Send + Sync {
    fn report(&self, percent: u8);
}

/// Supplies the account password on demand during login.
pub trait SecretProvider: Send + Sync {
    /// Returns `Err(RemoteError::Cancelled)` when the user dismissed the prompt.
    fn password(&self) -> Result<SecretString, RemoteError>;
}

/// Loads and stores the password hash kept for an account.
pub trait HashPersistor: Send + Sync {
    fn stored_hash(&self) -> Option<SecretString>;
    fn save_hash(&self, hash: SecretString);
}

/// The remote storage API client bound to one account.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Authenticates. `Ok(false)` means wrong credentials.
    async fn login(
        &self,
        user_name: &str,
        secrets: &dyn SecretProvider,
        hashes: &dyn HashPersistor,
    ) -> Result<bool, RemoteError>;

    async fn logout(&self) -> Result<(), RemoteError>;

    fn is_logged_in(&self) -> bool;

    async fn find_folder(&self, path: &FolderPath) -> Result<Option<RemoteFolder>, RemoteError>;

    async fn find_file(&self, path: &FilePath) -> Result<Option<RemoteFile>, RemoteError>;

    /// Direct children of a folder.
    async fn folder_items(&self, path: &FolderPath) -> Result<ItemStream, RemoteError>;

    /// Files below a folder, descending at most `depth` levels.
    async fn folder_all_files_recursive(
        &self,
        path: &FolderPath,
        depth: usize,
    ) -> Result<ItemStream, RemoteError>;

    /// Like [`find_file`](Self::find_file) but fails with
    /// [`RemoteError::FileNotFound`] when absent.
    async fn get_file(&self, path: &FilePath) -> Result<RemoteFile, RemoteError>;

    async fn download(
        &self,
        file: &RemoteFile,
        target: &mut (dyn AsyncWrite + Unpin + Send),
        cancel: &CancellationToken,
        progress: &dyn TransferProgress,
    ) -> Result<(), RemoteError>;

    async fn upload_file(
        &self,
        source: &mut (dyn AsyncRead + Unpin + Send),
        length: u64,
        path: &FilePath,
        cancel: &CancellationToken,
        progress: &dyn TransferProgress,
    ) -> Result<RemoteFile, RemoteError>;

    /// Overwrites the content of an existing file in place.
    async fn replace(
        &self,
        file: &RemoteFile,
        source: &mut (dyn AsyncRead + Unpin + Send),
        length: u64,
        cancel: &CancellationToken,
        progress: &dyn TransferProgress,
    ) -> Result<(), RemoteError>;

    /// Renames an item within its folder. Returns the renamed item.
    async fn rename(&self, item: &RemoteItem, new_name: &str) -> Result<RemoteItem, RemoteError>;

    /// Moves an item into `target`, keeping its name. Returns the moved item.
    async fn move_to(&self, item: &RemoteItem, target: &RemoteFolder)
    -> Result<RemoteItem, RemoteError>;

    async fn delete(&self, item: &RemoteItem) -> Result<(), RemoteError>;

    /// Server-side copy of a file into `target`, keeping its name.
    async fn copy_to(
        &self,
        file: &RemoteFile,
        target: &RemoteFolder,
        cancel: &CancellationToken,
        progress: &dyn TransferProgress,
    ) -> Result<RemoteFile, RemoteError>;

    /// Creates a folder in the partition carried by `path`.
    async fn create_folder(&self, path: &FolderPath) -> Result<RemoteFolder, RemoteError>;
}

/// A persisted account known to the backend.
///
/// Equality between accounts is by case-insensitive user name, see
/// [`same_user`].
pub trait Account: Send + Sync + fmt::Debug {
    fn user_name(&self) -> &str;
    fn stored_password_hash(&self) -> Option<SecretString>;
    fn save_password_hash(&self, hash: SecretString);
}

/// Case-insensitive user name comparison.
pub fn same_user(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Credentials entered in the "add account" prompt.
#[derive(Debug)]
pub struct LoginInfo {
    pub user_name: String,
    pub password: SecretString,
    pub remember_password: bool,
}

impl LoginInfo {
    pub fn new(user_name: impl Into<String>, password: impl Into<String>, remember: bool) -> Self {
        Self {
            user_name: user_name.into(),
            password: SecretString::from(password.into()),
            remember_password: remember,
        }
    }
}

/// Result of a successful remote registration.
pub struct Registration {
    pub account: Arc<dyn Account>,
    /// A client that is already logged in.
    pub client: Arc<dyn RemoteClient>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

/// Persisted account list plus remote (de)registration.
#[async_trait]
pub trait AccountBackend: Send + Sync {
    /// Accounts persisted so far, in registration order.
    fn accounts(&self) -> Vec<Arc<dyn Account>>;

    /// Identifier of this installation, sent with every login.
    fn device_id(&self) -> Uuid;

    /// A fresh, not yet logged-in client for `account`.
    fn client_for(&self, account: &Arc<dyn Account>) -> Arc<dyn RemoteClient>;

    /// Logs in with `login` and persists the account on success.
    /// `Ok(None)` means the server rejected the credentials.
    async fn register(&self, login: &LoginInfo) -> Result<Option<Registration>, RemoteError>;

    /// Removes the account remotely and from persistence.
    async fn unregister(&self, account: &dyn Account) -> Result<bool, RemoteError>;
}
