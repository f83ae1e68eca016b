//! The set of registered accounts.

use std::error::Error as StdError;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::bridge::{BridgeStats, ExecutionBridge};
use crate::error::{RegistryError, notice_message};
use crate::exit_code::ExecResult;
use crate::remote::{AccountBackend, LoginInfo, same_user};
use crate::session::AccountSession;
use crate::ui::{UiProvider, messages};

/// Outcome of [`AccountRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A new account was added.
    Registered,
    /// An account with that user name is already registered; nothing was
    /// sent to the server.
    AlreadyExists,
    /// The server rejected the credentials.
    Rejected,
}

/// Ordered collection of account sessions, unique by case-insensitive user
/// name.
pub struct AccountRegistry {
    backend: Arc<dyn AccountBackend>,
    ui: Arc<dyn UiProvider>,
    sessions: Vec<AccountSession>,
    stats: Arc<BridgeStats>,
}

impl AccountRegistry {
    /// Builds sessions for every account the backend has persisted.
    pub fn load(backend: Arc<dyn AccountBackend>, ui: Arc<dyn UiProvider>) -> Self {
        let stats = BridgeStats::new();
        let mut registry = Self {
            backend,
            ui,
            sessions: Vec::new(),
            stats,
        };
        for account in registry.backend.accounts() {
            if registry.contains(account.user_name()) {
                warn!(account = account.user_name(), "skipping duplicate persisted account");
                continue;
            }
            let client = registry.backend.client_for(&account);
            registry.sessions.push(AccountSession::new(
                account,
                client,
                Arc::clone(&registry.ui),
                Arc::clone(&registry.stats),
            ));
        }
        info!(
            accounts = registry.sessions.len(),
            device = %registry.backend.device_id(),
            "account registry loaded"
        );
        registry
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountSession> {
        self.sessions.iter()
    }

    pub fn get(&self, index: usize) -> Option<&AccountSession> {
        self.sessions.get(index)
    }

    pub fn contains(&self, user_name: &str) -> bool {
        self.position(user_name).is_some()
    }

    /// Looks a session up by case-insensitive user name.
    pub fn by_name(&self, user_name: &str) -> Result<&AccountSession, RegistryError> {
        self.position(user_name)
            .map(|idx| &self.sessions[idx])
            .ok_or_else(|| RegistryError::AccountNotFound(user_name.to_string()))
    }

    /// Shared bridge statistics of every session in this registry.
    pub fn stats(&self) -> &Arc<BridgeStats> {
        &self.stats
    }

    fn position(&self, user_name: &str) -> Option<usize> {
        self.sessions
            .iter()
            .position(|s| same_user(s.user_name(), user_name))
    }

    /// Registers a new account with the server.
    ///
    /// An existing user name short-circuits to
    /// [`RegisterOutcome::AlreadyExists`] without any remote call.
    #[instrument(level = "info", skip_all, fields(account = %login.user_name))]
    pub fn register(&mut self, login: &LoginInfo) -> Result<RegisterOutcome, RegistryError> {
        if self.contains(&login.user_name) {
            debug!("account already registered");
            return Ok(RegisterOutcome::AlreadyExists);
        }

        let backend = Arc::clone(&self.backend);
        let registration = ExecutionBridge::new()?
            .with_stats(Arc::clone(&self.stats))
            .run(|_| async move { backend.register(login).await })??;

        let Some(registration) = registration else {
            info!("registration rejected");
            return Ok(RegisterOutcome::Rejected);
        };
        info!("account registered");
        self.sessions.push(AccountSession::new(
            registration.account,
            registration.client,
            Arc::clone(&self.ui),
            Arc::clone(&self.stats),
        ));
        Ok(RegisterOutcome::Registered)
    }

    /// Prompts for credentials and registers the account.
    ///
    /// Navigates to the root on success so the new account shows up; every
    /// other outcome stays put after the matching notice.
    pub fn add_new_account(&mut self, default_user: Option<&str>) -> ExecResult {
        let Some(login) = self.ui.prompt_credential(default_user) else {
            debug!("credential prompt dismissed");
            return ExecResult::Ok;
        };

        match self.register(&login) {
            Ok(RegisterOutcome::Registered) => ExecResult::SymLink("/".to_string()),
            Ok(RegisterOutcome::AlreadyExists) => {
                self.ui
                    .show_message(&messages::account_exists(&login.user_name), false);
                ExecResult::Ok
            }
            Ok(RegisterOutcome::Rejected) => {
                self.ui.show_message(messages::WRONG_LOGIN, false);
                ExecResult::Ok
            }
            Err(e) => {
                self.report("Register account error", &e);
                ExecResult::Ok
            }
        }
    }

    /// Unregisters an account remotely and drops its session.
    ///
    /// Returns `Ok(false)` when the backend refused or failed (a notice has
    /// been shown for failures). The local session is only removed after the
    /// remote side confirmed.
    #[instrument(level = "info", skip(self))]
    pub fn deregister(&mut self, user_name: &str) -> Result<bool, RegistryError> {
        let idx = self
            .position(user_name)
            .ok_or_else(|| RegistryError::AccountNotFound(user_name.to_string()))?;

        let removed = self.unregister_remote(idx).unwrap_or_else(|e| {
            self.report("Unregister account error", &e);
            false
        });
        if !removed {
            debug!("backend kept the account");
            return Ok(false);
        }

        self.sessions[idx].logout();
        self.sessions.remove(idx);
        info!("account unregistered");
        Ok(true)
    }

    fn unregister_remote(&self, idx: usize) -> Result<bool, RegistryError> {
        let backend = Arc::clone(&self.backend);
        let account = Arc::clone(self.sessions[idx].account());
        let removed = ExecutionBridge::new()?
            .with_stats(Arc::clone(&self.stats))
            .run(|_| async move { backend.unregister(account.as_ref()).await })??;
        Ok(removed)
    }

    fn report(&self, base: &str, err: &RegistryError) {
        if is_cancellation(err) {
            debug!("{base}: cancelled");
            return;
        }
        warn!(error = %err, "{base}");
        self.ui.show_message(
            &notice_message(base, Some(err as &(dyn StdError + 'static))),
            false,
        );
    }
}

fn is_cancellation(err: &RegistryError) -> bool {
    match err {
        RegistryError::Session(e) => e.is_cancelled(),
        RegistryError::AccountNotFound(_) => false,
    }
}

impl std::fmt::Debug for AccountRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRegistry")
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}
