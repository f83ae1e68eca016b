//! One account's view of the remote storage.
//!
//! Every public operation is a blocking call: it builds a fresh
//! [`ExecutionBridge`], makes sure the client is logged in, runs the remote
//! calls, and maps the outcome onto a host result. Failures follow one
//! taxonomy:
//!
//! * cancellation (host request, progress abort, dismissed prompt) is
//!   reported as a silent abort
//! * a missing remote item is reported as not found, usually with a notice
//! * anything else becomes an error notice built from the cause chain
//!
//! Nothing escapes to the caller as a panic or an unhandled error.

use std::cell::Cell;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use filetime::FileTime;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use crate::bridge::{BridgeStats, CancellableProgress, ExecutionBridge, OwnerContext, ProgressSink};
use crate::entry::DirListing;
use crate::error::{SessionError, notice_message};
use crate::exit_code::ExitCode;
use crate::path::VirtualPath;
use crate::remote::{Account, RemoteClient, RemoteError, RemoteFolder, RemoteItem, same_user};
use crate::secret_store::SecretStore;
use crate::ui::{UiProvider, messages};

/// How a failed operation was surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    /// Cancelled; nothing was shown.
    Cancelled,
    /// A remote item was missing; a not-found notice was shown.
    NotFound,
    /// An error notice was shown and the user chose to cancel.
    Declined,
    /// An error notice was shown.
    Reported,
}

/// A target moved out of the way while its replacement is put in place.
struct Displaced {
    /// The item under its temporary name
    item: RemoteItem,
    /// Name to restore on failure
    name: String,
}

/// A registered account bound to its remote client.
pub struct AccountSession {
    account: Arc<dyn Account>,
    client: Arc<dyn RemoteClient>,
    ui: Arc<dyn UiProvider>,
    secrets: SecretStore,
    login_gate: tokio::sync::Mutex<()>,
    stats: Arc<BridgeStats>,
}

impl AccountSession {
    pub fn new(
        account: Arc<dyn Account>,
        client: Arc<dyn RemoteClient>,
        ui: Arc<dyn UiProvider>,
        stats: Arc<BridgeStats>,
    ) -> Self {
        let secrets = SecretStore::new(Arc::clone(&account), Arc::clone(&ui));
        Self {
            account,
            client,
            ui,
            secrets,
            login_gate: tokio::sync::Mutex::new(()),
            stats,
        }
    }

    pub fn user_name(&self) -> &str {
        self.account.user_name()
    }

    pub fn account(&self) -> &Arc<dyn Account> {
        &self.account
    }

    pub fn is_logged_in(&self) -> bool {
        self.client.is_logged_in()
    }

    // ========================================================================
    // Listing
    // ========================================================================

    /// Lists the direct children of a folder.
    ///
    /// Returns `None` when cancelled. A missing folder or a failure shows a
    /// notice and yields an empty listing.
    #[instrument(level = "debug", skip_all, fields(account = %self.user_name(), path = %path))]
    pub fn list(&self, path: &VirtualPath) -> Option<DirListing> {
        let folder = path.to_folder_path();
        let outcome = self.execute(None, |_| {
            let folder = &folder;
            async move { Ok(self.client.folder_items(folder).await?) }
        });
        match outcome {
            Ok(stream) => Some(DirListing::new(stream)),
            Err(e) => self.listing_failure("Get folder content error", path, &e),
        }
    }

    /// Lists files below a folder up to `depth` levels deep.
    ///
    /// Same failure handling as [`list`](Self::list).
    #[instrument(level = "debug", skip_all, fields(account = %self.user_name(), path = %path, depth = depth))]
    pub fn list_recursive(&self, path: &VirtualPath, depth: usize) -> Option<DirListing> {
        let folder = path.to_folder_path();
        let outcome = self.execute(None, |_| {
            let folder = &folder;
            async move { Ok(self.client.folder_all_files_recursive(folder, depth).await?) }
        });
        match outcome {
            Ok(stream) => Some(DirListing::new(stream)),
            Err(e) => self.listing_failure("Get all files recursive error", path, &e),
        }
    }

    fn listing_failure(
        &self,
        base: &str,
        path: &VirtualPath,
        err: &SessionError,
    ) -> Option<DirListing> {
        match self.report_failure(base, path, err, false) {
            Failure::Cancelled => None,
            _ => Some(DirListing::empty()),
        }
    }

    // ========================================================================
    // Transfers
    // ========================================================================

    /// Downloads a remote file to `local`.
    ///
    /// The local file gets the remote creation time as its modification and
    /// access time. With `delete_after` the remote file is deleted once the
    /// data is written (move semantics). Without `overwrite` an existing
    /// local file yields [`ExitCode::FileExists`] and is left alone. With
    /// `overwrite` an existing local file is truncated and rewritten, and is
    /// removed like any partial download if the transfer then fails or is
    /// cancelled.
    #[instrument(
        level = "info",
        skip_all,
        fields(account = %self.user_name(), remote = %remote, local = %local.display(), overwrite = overwrite, delete_after = delete_after)
    )]
    pub fn download(
        &self,
        remote: &VirtualPath,
        local: &Path,
        overwrite: bool,
        delete_after: bool,
        progress: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> ExitCode {
        if !overwrite && matches!(local.try_exists(), Ok(true)) {
            debug!("local target exists");
            return ExitCode::FileExists;
        }

        let source = remote.to_file_path();
        let created = Cell::new(false);
        let written = Cell::new(false);

        let outcome = self.execute(Some(cancel), |owner| {
            let (source, created, written) = (&source, &created, &written);
            async move {
                let file = self.client.get_file(source).await?;
                let mut target = open_target(local, overwrite).await?;
                created.set(true);

                let reporter = CancellableProgress::new(owner.clone(), progress);
                self.client
                    .download(&file, &mut target, owner.cancellation_token(), &reporter)
                    .await?;
                target
                    .flush()
                    .await
                    .map_err(|e| SessionError::local(local, e))?;
                drop(target);
                written.set(true);

                apply_times(local, file.created);
                if delete_after {
                    self.client.delete(&RemoteItem::File(file)).await?;
                }
                Ok(())
            }
        });

        let err = match outcome {
            Ok(()) => {
                info!("download complete");
                return ExitCode::Ok;
            }
            Err(e) => e,
        };

        if created.get() && !written.get() {
            discard_partial(local);
        }
        if err.is_cancelled() {
            debug!("download cancelled");
            return ExitCode::UserAbort;
        }
        if err.local_kind() == Some(io::ErrorKind::AlreadyExists) {
            return ExitCode::FileExists;
        }
        if err.is_not_found() {
            return ExitCode::FileNotFound;
        }
        match self.report_failure("Download file error", remote, &err, true) {
            Failure::Declined | Failure::Cancelled => ExitCode::UserAbort,
            Failure::NotFound | Failure::Reported => ExitCode::ReadError,
        }
    }

    /// Uploads `local` to a remote file.
    ///
    /// With `overwrite`, an existing remote file is replaced in place;
    /// without it, an existing remote file yields [`ExitCode::FileExists`]
    /// before any data is sent.
    #[instrument(
        level = "info",
        skip_all,
        fields(account = %self.user_name(), local = %local.display(), remote = %remote, overwrite = overwrite)
    )]
    pub fn upload(
        &self,
        local: &Path,
        remote: &VirtualPath,
        overwrite: bool,
        progress: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> ExitCode {
        let target = remote.to_file_path();

        let outcome = self.execute(Some(cancel), |owner| {
            let target = &target;
            async move {
                let existing = self.client.find_file(target).await?;
                if existing.is_some() && !overwrite {
                    return Ok(ExitCode::FileExists);
                }

                let mut source = tokio::fs::File::open(local)
                    .await
                    .map_err(|e| SessionError::local(local, e))?;
                let length = source
                    .metadata()
                    .await
                    .map_err(|e| SessionError::local(local, e))?
                    .len();
                let reporter = CancellableProgress::new(owner.clone(), progress);
                let token = owner.cancellation_token();

                match existing {
                    Some(file) => {
                        debug!("replacing existing remote file");
                        self.client
                            .replace(&file, &mut source, length, token, &reporter)
                            .await?;
                    }
                    None => {
                        self.client
                            .upload_file(&mut source, length, target, token, &reporter)
                            .await?;
                    }
                }
                Ok(ExitCode::Ok)
            }
        });

        let err = match outcome {
            Ok(code) => {
                debug!(?code, "upload finished");
                return code;
            }
            Err(e) => e,
        };

        if err.is_cancelled() {
            debug!("upload cancelled");
            return ExitCode::UserAbort;
        }
        if err.is_not_found() || err.local_kind() == Some(io::ErrorKind::NotFound) {
            return ExitCode::FileNotFound;
        }
        match self.report_failure("Upload file error", remote, &err, true) {
            Failure::Declined | Failure::Cancelled => ExitCode::UserAbort,
            Failure::NotFound | Failure::Reported => ExitCode::ReadError,
        }
    }

    // ========================================================================
    // Folder and file management
    // ========================================================================

    /// Creates a folder. `None` on failure (a notice has been shown).
    #[instrument(level = "info", skip_all, fields(account = %self.user_name(), path = %path))]
    pub fn create_folder(&self, path: &VirtualPath) -> Option<RemoteFolder> {
        let folder = path.to_folder_path();
        let outcome = self.execute(None, |_| {
            let folder = &folder;
            async move { Ok(self.client.create_folder(folder).await?) }
        });
        match outcome {
            Ok(created) => Some(created),
            Err(e) => {
                self.report_failure("Create folder error", path, &e, false);
                None
            }
        }
    }

    /// Deletes a folder. `false` when it does not exist or deletion failed.
    #[instrument(level = "info", skip_all, fields(account = %self.user_name(), path = %path))]
    pub fn delete_folder(&self, path: &VirtualPath) -> bool {
        let folder = path.to_folder_path();
        let outcome = self.execute(None, |_| {
            let folder = &folder;
            async move {
                let Some(found) = self.client.find_folder(folder).await? else {
                    debug!("folder already absent");
                    return Ok(false);
                };
                self.client.delete(&RemoteItem::Folder(found)).await?;
                Ok(true)
            }
        });
        outcome.unwrap_or_else(|e| {
            self.report_failure("Delete folder error", path, &e, false);
            false
        })
    }

    /// Deletes a file. `false` when it does not exist or deletion failed.
    #[instrument(level = "info", skip_all, fields(account = %self.user_name(), path = %path))]
    pub fn delete_file(&self, path: &VirtualPath) -> bool {
        let file = path.to_file_path();
        let outcome = self.execute(None, |_| {
            let file = &file;
            async move {
                let Some(found) = self.client.find_file(file).await? else {
                    debug!("file already absent");
                    return Ok(false);
                };
                self.client.delete(&RemoteItem::File(found)).await?;
                Ok(true)
            }
        });
        outcome.unwrap_or_else(|e| {
            self.report_failure("Delete file error", path, &e, false);
            false
        })
    }

    /// Moves or renames a file or folder within this account.
    ///
    /// An existing item at `target` blocks the operation unless `overwrite`
    /// is set and it is of the same kind; an item of the other kind is never
    /// replaced. Same parent folder means a rename; otherwise the item is
    /// moved into the target's parent and renamed if the target name
    /// differs. A replaced target is set aside until the item is in place
    /// and restored if the operation fails.
    ///
    /// Returns [`ExitCode::NotSupported`] when the move would pass through a
    /// name already taken in the target folder.
    #[instrument(
        level = "info",
        skip_all,
        fields(account = %self.user_name(), source = %source, target = %target, overwrite = overwrite, is_folder = is_folder)
    )]
    pub fn move_or_rename(
        &self,
        source: &VirtualPath,
        target: &VirtualPath,
        overwrite: bool,
        is_folder: bool,
    ) -> ExitCode {
        let displaced = Cell::new(None);

        let outcome = self.execute(None, |_| {
            let displaced = &displaced;
            async move {
                let item = if is_folder {
                    self.client
                        .find_folder(&source.to_folder_path())
                        .await?
                        .map(RemoteItem::Folder)
                } else {
                    self.client
                        .find_file(&source.to_file_path())
                        .await?
                        .map(RemoteItem::File)
                };
                let Some(item) = item else {
                    return Ok(ExitCode::FileNotFound);
                };

                let replaced = match self.find_any(target).await? {
                    Some(existing) if existing.is_folder() != item.is_folder() => {
                        debug!(existing = existing.backend_path(), "target taken by other kind");
                        return Ok(ExitCode::FileExists);
                    }
                    Some(_) if !overwrite => return Ok(ExitCode::FileExists),
                    Some(existing) if existing.same_location(&item) => return Ok(ExitCode::Ok),
                    other => other,
                };

                let new_name = target.name().unwrap_or_default();
                let folder = if source.shares_parent_with(target) {
                    None
                } else {
                    let Some(folder) = self
                        .client
                        .find_folder(&target.parent().to_folder_path())
                        .await?
                    else {
                        return Ok(ExitCode::FileNotFound);
                    };
                    if self.kept_name_taken(target, item.name()).await? {
                        return Ok(ExitCode::NotSupported);
                    }
                    Some(folder)
                };

                if let Some(existing) = replaced {
                    displaced.set(Some(self.set_aside(existing).await?));
                }
                let placed = match folder {
                    Some(folder) => self.client.move_to(&item, &folder).await?,
                    None => item,
                };
                if placed.name() != new_name {
                    self.client.rename(&placed, new_name).await?;
                }
                self.discard_displaced(displaced).await;
                Ok(ExitCode::Ok)
            }
        });

        if outcome.is_err() {
            self.restore_displaced(displaced.take());
        }
        outcome.unwrap_or_else(|e| {
            match self.report_failure("Move/rename file/folder error", source, &e, false) {
                Failure::Cancelled | Failure::Declined => ExitCode::UserAbort,
                Failure::NotFound => ExitCode::FileNotFound,
                Failure::Reported => ExitCode::WriteError,
            }
        })
    }

    /// Server-side copy of a file within this account.
    ///
    /// Progress is forwarded to `progress`; an abort answer cancels the copy.
    /// Conflicts follow [`move_or_rename`](Self::move_or_rename): a replaced
    /// target survives a failed or aborted copy, and a copy whose kept name
    /// is taken in the target folder (a same-folder copy under a new name
    /// included) returns [`ExitCode::NotSupported`].
    #[instrument(
        level = "info",
        skip_all,
        fields(account = %self.user_name(), source = %source, target = %target, overwrite = overwrite)
    )]
    pub fn copy_file(
        &self,
        source: &VirtualPath,
        target: &VirtualPath,
        overwrite: bool,
        progress: Arc<dyn ProgressSink>,
    ) -> ExitCode {
        let displaced = Cell::new(None);

        let outcome = self.execute(None, |owner| {
            let displaced = &displaced;
            async move {
                let Some(file) = self.client.find_file(&source.to_file_path()).await? else {
                    return Ok(ExitCode::FileNotFound);
                };

                let replaced = match self.find_any(target).await? {
                    Some(RemoteItem::Folder(_)) => return Ok(ExitCode::FileExists),
                    Some(_) if !overwrite => return Ok(ExitCode::FileExists),
                    Some(RemoteItem::File(existing)) if existing.path == file.path => {
                        return Ok(ExitCode::Ok);
                    }
                    other => other,
                };

                let Some(folder) = self
                    .client
                    .find_folder(&target.parent().to_folder_path())
                    .await?
                else {
                    return Ok(ExitCode::FileNotFound);
                };
                if self.kept_name_taken(target, file.name()).await? {
                    return Ok(ExitCode::NotSupported);
                }

                if let Some(existing) = replaced {
                    displaced.set(Some(self.set_aside(existing).await?));
                }
                let reporter = CancellableProgress::new(owner.clone(), progress);
                let copied = self
                    .client
                    .copy_to(&file, &folder, owner.cancellation_token(), &reporter)
                    .await?;
                let new_name = target.name().unwrap_or_default();
                if copied.name() != new_name {
                    self.client
                        .rename(&RemoteItem::File(copied), new_name)
                        .await?;
                }
                self.discard_displaced(displaced).await;
                Ok(ExitCode::Ok)
            }
        });

        if outcome.is_err() {
            self.restore_displaced(displaced.take());
        }
        outcome.unwrap_or_else(|e| {
            match self.report_failure("Copy file error", source, &e, false) {
                Failure::Cancelled | Failure::Declined => ExitCode::UserAbort,
                Failure::NotFound => ExitCode::FileNotFound,
                Failure::Reported => ExitCode::WriteError,
            }
        })
    }

    /// Logs the client out if it is logged in. Failures are logged only.
    pub fn logout(&self) {
        if !self.client.is_logged_in() {
            return;
        }
        let outcome = ExecutionBridge::new()
            .map(|bridge| bridge.with_stats(Arc::clone(&self.stats)))
            .and_then(|bridge| bridge.run(|_| self.client.logout()));
        match outcome {
            Ok(Ok(())) => info!(account = self.user_name(), "logged out"),
            Ok(Err(e)) => warn!(account = self.user_name(), error = %e, "logout failed"),
            Err(e) => warn!(account = self.user_name(), error = %e, "logout not run"),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Runs `op` on a fresh bridge after making sure the client is logged in.
    ///
    /// With `cancel`, the bridge token is a child of the host token.
    fn execute<T, F, Fut>(
        &self,
        cancel: Option<&CancellationToken>,
        op: F,
    ) -> Result<T, SessionError>
    where
        F: FnOnce(OwnerContext) -> Fut,
        Fut: Future<Output = Result<T, SessionError>>,
    {
        let bridge = match cancel {
            Some(parent) => ExecutionBridge::linked(parent)?,
            None => ExecutionBridge::new()?,
        }
        .with_stats(Arc::clone(&self.stats));

        bridge.run(|owner| async move {
            self.ensure_logged_in().await?;
            op(owner).await
        })?
    }

    /// Logs in, prompting again after each rejected attempt.
    ///
    /// A dismissed prompt surfaces as a cancellation. Concurrent callers
    /// queue on the gate so that only one login runs at a time.
    async fn ensure_logged_in(&self) -> Result<(), SessionError> {
        if self.client.is_logged_in() {
            return Ok(());
        }
        let _gate = self.login_gate.lock().await;
        while !self.client.is_logged_in() {
            trace!(account = self.user_name(), "logging in");
            if self
                .client
                .login(self.user_name(), &self.secrets, &self.secrets)
                .await?
            {
                info!(account = self.user_name(), "logged in");
                break;
            }
            warn!(account = self.user_name(), "login rejected");
            self.ui.show_message(messages::WRONG_LOGIN, false);
        }
        Ok(())
    }

    async fn find_any(&self, path: &VirtualPath) -> Result<Option<RemoteItem>, SessionError> {
        if let Some(folder) = self.client.find_folder(&path.to_folder_path()).await? {
            return Ok(Some(RemoteItem::Folder(folder)));
        }
        Ok(self
            .client
            .find_file(&path.to_file_path())
            .await?
            .map(RemoteItem::File))
    }

    /// True when `kept`, the name a server-side move or copy lands under,
    /// is occupied in the target folder by something other than the target.
    async fn kept_name_taken(&self, target: &VirtualPath, kept: &str) -> Result<bool, SessionError> {
        if target.name() == Some(kept) {
            return Ok(false);
        }
        let slot = target.parent().join(kept);
        let taken = self.find_any(&slot).await?.is_some();
        if taken {
            debug!(slot = %slot, "kept name taken in target folder");
        }
        Ok(taken)
    }

    /// Renames a target about to be replaced to a unique name in its folder.
    async fn set_aside(&self, existing: RemoteItem) -> Result<Displaced, SessionError> {
        let name = existing.name().to_string();
        let aside = format!("{name}.{}.replaced", Uuid::new_v4().simple());
        debug!(existing = existing.backend_path(), aside = %aside, "setting replaced target aside");
        let item = self.client.rename(&existing, &aside).await?;
        Ok(Displaced { item, name })
    }

    /// Deletes the set-aside target once its replacement is in place.
    async fn discard_displaced(&self, displaced: &Cell<Option<Displaced>>) {
        let Some(old) = displaced.take() else {
            return;
        };
        if let Err(e) = self.client.delete(&old.item).await {
            warn!(item = old.item.backend_path(), error = %e, "failed to delete replaced target");
        }
    }

    /// Puts a set-aside target back under its name after a failed replace.
    fn restore_displaced(&self, displaced: Option<Displaced>) {
        let Some(old) = displaced else {
            return;
        };
        let outcome = self.execute(None, |_| {
            let old = &old;
            async move { Ok(self.client.rename(&old.item, &old.name).await?) }
        });
        match outcome {
            Ok(_) => debug!(name = %old.name, "replaced target restored"),
            Err(e) => warn!(
                item = old.item.backend_path(),
                name = %old.name,
                error = %e,
                "failed to restore replaced target"
            ),
        }
    }

    fn report_failure(
        &self,
        base: &str,
        path: &VirtualPath,
        err: &SessionError,
        allow_cancel: bool,
    ) -> Failure {
        if err.is_cancelled() {
            debug!(account = self.user_name(), "{base}: cancelled");
            return Failure::Cancelled;
        }
        if let SessionError::Remote(remote) = err
            && remote.is_not_found()
        {
            let shown = path.to_string();
            let text = if matches!(remote, RemoteError::FolderNotFound(_)) {
                messages::folder_not_found(&shown)
            } else {
                messages::path_not_found(&shown)
            };
            debug!(account = self.user_name(), error = %err, "{base}: not found");
            self.ui.show_message(&text, false);
            return Failure::NotFound;
        }

        warn!(account = self.user_name(), error = %err, "{base}");
        let text = notice_message(base, Some(err as &(dyn StdError + 'static)));
        if self.ui.show_message(&text, allow_cancel) {
            Failure::Reported
        } else {
            Failure::Declined
        }
    }
}

impl PartialEq for AccountSession {
    fn eq(&self, other: &Self) -> bool {
        same_user(self.user_name(), other.user_name())
    }
}

impl Eq for AccountSession {}

impl fmt::Debug for AccountSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSession")
            .field("user_name", &self.user_name())
            .field("logged_in", &self.is_logged_in())
            .finish_non_exhaustive()
    }
}

async fn open_target(local: &Path, overwrite: bool) -> Result<tokio::fs::File, SessionError> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    options
        .open(local)
        .await
        .map_err(|e| SessionError::local(local, e))
}

/// Stamps the remote creation time on the local file.
///
/// Only modification and access time are portable; the local creation time
/// is left as the file system set it.
fn apply_times(local: &Path, created: SystemTime) {
    let stamp = FileTime::from_system_time(created);
    if let Err(e) = filetime::set_file_times(local, stamp, stamp) {
        warn!(path = %local.display(), error = %e, "failed to set file times");
    }
}

fn discard_partial(local: &Path) {
    match std::fs::remove_file(local) {
        Ok(()) => debug!(path = %local.display(), "removed partial download"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %local.display(), error = %e, "failed to remove partial download"),
    }
}
