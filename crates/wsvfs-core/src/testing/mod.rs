//! In-memory implementations of the external collaborators.
//!
//! Used by the unit tests of this crate and by the integration tests of the
//! plugin crate. Provides:
//!
//! - **MemoryRemote**: a folder/file tree per partition with a login gate,
//!   call recording and transfer fault injection
//! - **MemoryBackend** / **MemoryAccount**: persisted account list and
//!   server-side users
//! - **ScriptedUi**: queued prompt answers and recorded notices
//!
//! # Usage
//!
//! ```ignore
//! use wsvfs_core::testing::{MemoryBackend, ScriptedUi};
//!
//! let backend = MemoryBackend::new().with_account("alice", "secret");
//! let remote = backend.remote("alice").unwrap();
//! remote.add_file(true, "/docs/a.txt", b"hello");
//! ```

mod backend;
mod remote;
mod ui;

pub use backend::{MemoryAccount, MemoryBackend};
pub use remote::{MemoryRemote, TransferMode, fixed_created};
pub use ui::ScriptedUi;
