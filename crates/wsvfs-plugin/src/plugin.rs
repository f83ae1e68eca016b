//! Host entry points.
//!
//! Every call arrives with a raw virtual path, is parsed into a
//! [`VirtualPath`] and routed by its level:
//!
//! - Root and Account level: synthesized listings and account management
//! - AccessLevel: the fixed partition folders, read-only
//! - Folder level: content operations on the account's session

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use wsvfs_core::remote::same_user;
use wsvfs_core::ui::messages;
use wsvfs_core::{
    AccountBackend, AccountRegistry, AccountSession, ExecResult, ExitCode, PathLevel,
    ProgressAction, ProgressSink, UiProvider, VirtualPath,
};

use crate::config::PluginConfig;
use crate::host::{CopyFlags, HostOperation, HostProgress, Phase};
use crate::listing::{ADD_ACCOUNT_ENTRY, BulkMode, Listing, PLACEHOLDER_ENTRY};

/// The file-system plugin: account registry plus host-call routing.
pub struct CloudFsPlugin {
    registry: AccountRegistry,
    ui: Arc<dyn UiProvider>,
    host: Arc<dyn HostProgress>,
    config: PluginConfig,
    mode: BulkMode,
}

impl CloudFsPlugin {
    pub fn new(
        backend: Arc<dyn AccountBackend>,
        ui: Arc<dyn UiProvider>,
        host: Arc<dyn HostProgress>,
        config: PluginConfig,
    ) -> Self {
        let registry = AccountRegistry::load(backend, Arc::clone(&ui));
        info!(accounts = registry.len(), title = %config.plugin.title, "plugin started");
        Self {
            registry,
            ui,
            host,
            config,
            mode: BulkMode::None,
        }
    }

    /// Name of the plugin root in the host.
    pub fn title(&self) -> &str {
        &self.config.plugin.title
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    pub fn mode(&self) -> BulkMode {
        self.mode
    }

    // ========================================================================
    // Listing
    // ========================================================================

    /// Entries of the directory at `raw`.
    #[instrument(level = "debug", skip(self), fields(mode = ?self.mode))]
    pub fn list(&self, raw: &str) -> Listing {
        let Some(path) = parse(raw) else {
            return Listing::empty();
        };
        match path.level() {
            PathLevel::Root => Listing::root(self.registry.iter().map(AccountSession::user_name)),
            PathLevel::Account => Listing::partitions(),
            PathLevel::AccessLevel | PathLevel::Folder => {
                let Some(session) = self.session(&path) else {
                    return Listing::empty();
                };
                match self.mode {
                    BulkMode::BulkDelete => self.probe_for_delete(session, &path),
                    BulkMode::BulkMove => Listing::placeholder(),
                    BulkMode::None => session
                        .list(&path)
                        .map_or_else(Listing::empty, Listing::remote),
                }
            }
        }
    }

    /// One entry telling the host whether the folder still has content.
    ///
    /// Partitions cannot be deleted and always look empty.
    fn probe_for_delete(&self, session: &AccountSession, path: &VirtualPath) -> Listing {
        if path.level() == PathLevel::AccessLevel {
            return Listing::parent_only();
        }
        let Some(mut files) = session.list_recursive(path, self.config.listing.probe_depth()) else {
            return Listing::empty();
        };
        let has_file = files.next().is_some();
        files.close();
        if has_file {
            Listing::placeholder()
        } else {
            Listing::parent_only()
        }
    }

    // ========================================================================
    // Account level
    // ========================================================================

    /// Activates an entry; only the add-account entry is handled here.
    pub fn execute_open(&mut self, raw: &str) -> ExecResult {
        match parse(raw) {
            Some(path) if is_add_account(&path) => self.registry.add_new_account(None),
            _ => ExecResult::Yourself,
        }
    }

    /// Lifecycle notification from the host.
    pub fn status_info(&mut self, remote_dir: &str, phase: Phase, operation: HostOperation) {
        let mode = match (operation, phase) {
            (HostOperation::Delete, Phase::Start) => BulkMode::BulkDelete,
            (HostOperation::RenameMoveMulti, Phase::Start) => BulkMode::BulkMove,
            (HostOperation::Delete, Phase::End) if self.mode == BulkMode::BulkDelete => {
                BulkMode::None
            }
            (HostOperation::RenameMoveMulti, Phase::End) if self.mode == BulkMode::BulkMove => {
                BulkMode::None
            }
            _ => return,
        };
        debug!(remote_dir, ?operation, ?phase, ?mode, "bulk mode changed");
        self.mode = mode;
    }

    /// Creates a folder; at Account level registers a new account instead.
    #[instrument(level = "debug", skip(self))]
    pub fn mkdir(&mut self, raw: &str) -> bool {
        // The folder is moved whole on the server
        if self.mode == BulkMode::BulkMove {
            return true;
        }
        let Some(path) = parse(raw) else {
            return false;
        };
        match path.level() {
            PathLevel::Root | PathLevel::AccessLevel => false,
            PathLevel::Account => matches!(
                self.registry.add_new_account(Some(path.account_name())),
                ExecResult::SymLink(_)
            ),
            PathLevel::Folder => self
                .session(&path)
                .and_then(|s| s.create_folder(&path))
                .is_some(),
        }
    }

    /// Deletes a folder; at Account level unregisters the account after
    /// confirmation.
    ///
    /// Declining the confirmation reports success so the host does not show
    /// an error of its own.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_dir(&mut self, raw: &str) -> bool {
        if self.mode == BulkMode::BulkMove {
            return true;
        }
        let Some(path) = parse(raw) else {
            return false;
        };
        match path.level() {
            PathLevel::Root | PathLevel::AccessLevel => false,
            PathLevel::Account => {
                let user_name = path.account_name();
                if !self.registry.contains(user_name) {
                    return false;
                }
                if !self
                    .ui
                    .show_message(&messages::confirm_unregister(user_name), true)
                {
                    return true;
                }
                self.registry.deregister(user_name).unwrap_or_else(|e| {
                    warn!(account = user_name, error = %e, "unregister failed");
                    false
                })
            }
            PathLevel::Folder => self
                .session(&path)
                .is_some_and(|s| s.delete_folder(&path)),
        }
    }

    // ========================================================================
    // Content
    // ========================================================================

    /// Deletes a file. The placeholder entry is deleted trivially.
    #[instrument(level = "debug", skip(self))]
    pub fn delete_file(&self, raw: &str) -> bool {
        let Some(path) = parse(raw) else {
            return false;
        };
        if path.level() <= PathLevel::AccessLevel {
            return false;
        }
        if path.name() == Some(PLACEHOLDER_ENTRY) {
            return true;
        }
        self.session(&path).is_some_and(|s| s.delete_file(&path))
    }

    /// Server-side rename, move or copy within one account.
    ///
    /// The placeholder entry stands for its containing folder. Moves
    /// between accounts and folder copies are not supported.
    #[instrument(level = "debug", skip(self))]
    pub fn rename_move(
        &self,
        old_raw: &str,
        new_raw: &str,
        move_item: bool,
        overwrite: bool,
        source_is_folder: bool,
    ) -> ExitCode {
        let (Some(mut source), Some(mut target)) = (parse(old_raw), parse(new_raw)) else {
            return ExitCode::FileNotFound;
        };
        let mut is_folder = source_is_folder;
        if source.name() == Some(PLACEHOLDER_ENTRY) {
            source = source.parent();
            target = target.parent();
            is_folder = true;
        }
        if source.level() <= PathLevel::AccessLevel || target.level() <= PathLevel::AccessLevel {
            return ExitCode::NotSupported;
        }
        if !same_user(source.account_name(), target.account_name()) {
            debug!("cross-account transfer left to the host");
            return ExitCode::NotSupported;
        }
        if !move_item && is_folder {
            return ExitCode::NotSupported;
        }
        let Some(session) = self.session(&source) else {
            return ExitCode::FileNotFound;
        };

        if self.host.progress(old_raw, new_raw, 0) == ProgressAction::Abort {
            return ExitCode::UserAbort;
        }
        let code = if move_item {
            session.move_or_rename(&source, &target, overwrite, is_folder)
        } else {
            let host = Arc::clone(&self.host);
            let (from, to) = (old_raw.to_string(), new_raw.to_string());
            let progress: Arc<dyn ProgressSink> =
                Arc::new(move |percent: u8| host.progress(&from, &to, percent));
            session.copy_file(&source, &target, overwrite, progress)
        };
        self.host.progress(old_raw, new_raw, 100);
        code
    }

    /// Downloads a remote file to `local`; with [`CopyFlags::MOVE`] the
    /// remote file is removed afterwards.
    #[instrument(level = "debug", skip(self, progress, cancel), fields(local = %local.display()))]
    pub fn get_file(
        &self,
        raw: &str,
        local: &Path,
        flags: CopyFlags,
        progress: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> ExitCode {
        let Some(path) = parse(raw) else {
            return ExitCode::FileNotFound;
        };
        if path.level() <= PathLevel::AccessLevel || flags.resume() {
            return ExitCode::NotSupported;
        }
        if !flags.overwrite() && matches!(local.try_exists(), Ok(true)) {
            return ExitCode::FileExists;
        }
        let Some(session) = self.session(&path) else {
            return ExitCode::FileNotFound;
        };
        session.download(
            &path,
            local,
            flags.overwrite(),
            flags.move_source(),
            progress,
            cancel,
        )
    }

    /// Uploads `local` to a remote file; with [`CopyFlags::MOVE`] the local
    /// file is removed after a successful upload.
    #[instrument(level = "debug", skip(self, progress, cancel), fields(local = %local.display()))]
    pub fn put_file(
        &self,
        local: &Path,
        raw: &str,
        flags: CopyFlags,
        progress: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> ExitCode {
        let Some(path) = parse(raw) else {
            return ExitCode::FileNotFound;
        };
        if path.level() <= PathLevel::AccessLevel || flags.resume() {
            return ExitCode::NotSupported;
        }
        if !local.is_file() {
            return ExitCode::FileNotFound;
        }
        let Some(session) = self.session(&path) else {
            return ExitCode::FileNotFound;
        };

        let code = session.upload(local, &path, flags.overwrite(), progress, cancel);
        if code.is_ok()
            && flags.move_source()
            && let Err(e) = std::fs::remove_file(local)
        {
            warn!(error = %e, "failed to remove uploaded source");
            return ExitCode::WriteError;
        }
        code
    }

    fn session(&self, path: &VirtualPath) -> Option<&AccountSession> {
        match self.registry.by_name(path.account_name()) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(error = %e, "no session for path");
                None
            }
        }
    }
}

impl std::fmt::Debug for CloudFsPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudFsPlugin")
            .field("registry", &self.registry)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

fn parse(raw: &str) -> Option<VirtualPath> {
    VirtualPath::parse(raw)
        .inspect_err(|e| warn!(raw, error = %e, "invalid path from host"))
        .ok()
}

fn is_add_account(path: &VirtualPath) -> bool {
    path.level() == PathLevel::Account && path.account_name() == ADD_ACCOUNT_ENTRY
}
