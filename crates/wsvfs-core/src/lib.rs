//! Core of the cloud-storage file-manager plugin.
//!
//! This crate provides:
//!
//! - [`path`]: the virtual path model (`/account/Private/docs/a.txt`) and its
//!   conversion to backend identifiers
//! - [`bridge`]: the synchronous facade that drives one asynchronous
//!   operation per host call, with cancellation and progress marshalling
//! - [`session`]: per-account operations with login and result-code mapping
//! - [`registry`]: the set of registered accounts
//! - [`remote`] and [`ui`]: contracts of the external collaborators
//! - [`testing`]: in-memory fakes of those collaborators
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wsvfs_core::{AccountRegistry, VirtualPath};
//!
//! let registry = AccountRegistry::load(backend, ui);
//! let session = registry.by_name("alice")?;
//! let path = VirtualPath::parse("/alice/Private/docs")?;
//! if let Some(listing) = session.list(&path) {
//!     for entry in listing {
//!         println!("{}", entry.name);
//!     }
//! }
//! ```

pub mod bridge;
pub mod entry;
pub mod error;
pub mod exit_code;
pub mod path;
pub mod registry;
pub mod remote;
pub mod secret_store;
pub mod session;
pub mod testing;
pub mod ui;

pub use bridge::{
    BridgeCanceller, BridgeError, BridgeStats, CancellableProgress, ExecutionBridge, NoProgress,
    OwnerContext, ProgressAction, ProgressSink,
};
pub use entry::{DirEntry, DirListing, EntryKind, PARENT_MARKER};
pub use error::{RegistryError, SessionError, notice_message};
pub use exit_code::{ExecResult, ExitCode};
pub use path::{FilePath, FolderPath, PathError, PathLevel, PRIVATE_FOLDER, PUBLIC_FOLDER, VirtualPath};
pub use registry::{AccountRegistry, RegisterOutcome};
pub use remote::{
    Account, AccountBackend, LoginInfo, RemoteClient, RemoteError, RemoteFile, RemoteFolder,
    RemoteItem,
};
pub use session::AccountSession;
pub use ui::UiProvider;
