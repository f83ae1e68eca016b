//! In-memory account persistence and server-side user table.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::remote::{
    Account, AccountBackend, LoginInfo, RemoteClient, RemoteError, Registration, same_user,
};

use super::remote::MemoryRemote;

/// An account whose password hash lives in memory.
#[derive(Debug)]
pub struct MemoryAccount {
    user_name: String,
    hash: Mutex<Option<String>>,
}

impl MemoryAccount {
    pub fn new(user_name: &str) -> Self {
        Self {
            user_name: user_name.to_string(),
            hash: Mutex::new(None),
        }
    }
}

impl Account for MemoryAccount {
    fn user_name(&self) -> &str {
        &self.user_name
    }

    fn stored_password_hash(&self) -> Option<SecretString> {
        self.hash.lock().clone().map(SecretString::from)
    }

    fn save_password_hash(&self, hash: SecretString) {
        *self.hash.lock() = Some(hash.expose_secret().to_string());
    }
}

/// Account backend holding persisted accounts and the users known to the
/// server, each with its own [`MemoryRemote`].
#[derive(Debug)]
pub struct MemoryBackend {
    device_id: Uuid,
    accounts: Mutex<Vec<Arc<MemoryAccount>>>,
    remotes: Mutex<HashMap<String, Arc<MemoryRemote>>>,
    reject_unregister: AtomicBool,
    unregister_failure: Mutex<Option<String>>,
    register_calls: AtomicUsize,
    unregister_calls: AtomicUsize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            device_id: Uuid::new_v4(),
            accounts: Mutex::new(Vec::new()),
            remotes: Mutex::new(HashMap::new()),
            reject_unregister: AtomicBool::new(false),
            unregister_failure: Mutex::new(None),
            register_calls: AtomicUsize::new(0),
            unregister_calls: AtomicUsize::new(0),
        }
    }

    /// Adds a server user and persists it as a registered account.
    #[must_use]
    pub fn with_account(self, user_name: &str, password: &str) -> Self {
        self.add_server_user(user_name, password);
        self.accounts
            .lock()
            .push(Arc::new(MemoryAccount::new(user_name)));
        self
    }

    /// Adds a user known to the server only; it can be registered later.
    pub fn add_server_user(&self, user_name: &str, password: &str) -> Arc<MemoryRemote> {
        let remote = Arc::new(MemoryRemote::new(password));
        self.remotes
            .lock()
            .insert(user_name.to_lowercase(), Arc::clone(&remote));
        remote
    }

    /// The server-side storage of `user_name`.
    pub fn remote(&self, user_name: &str) -> Option<Arc<MemoryRemote>> {
        self.remotes.lock().get(&user_name.to_lowercase()).cloned()
    }

    /// Makes the server refuse every unregistration.
    pub fn reject_unregister(&self, reject: bool) {
        self.reject_unregister.store(reject, Ordering::SeqCst);
    }

    /// Makes every unregistration fail with a transport error.
    pub fn fail_unregister_with(&self, message: &str) {
        *self.unregister_failure.lock() = Some(message.to_string());
    }

    /// User names of the persisted accounts, in order.
    pub fn persisted_names(&self) -> Vec<String> {
        self.accounts
            .lock()
            .iter()
            .map(|a| a.user_name().to_string())
            .collect()
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn unregister_calls(&self) -> usize {
        self.unregister_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountBackend for MemoryBackend {
    fn accounts(&self) -> Vec<Arc<dyn Account>> {
        self.accounts
            .lock()
            .iter()
            .map(|a| Arc::clone(a) as Arc<dyn Account>)
            .collect()
    }

    fn device_id(&self) -> Uuid {
        self.device_id
    }

    fn client_for(&self, account: &Arc<dyn Account>) -> Arc<dyn RemoteClient> {
        if let Some(remote) = self.remote(account.user_name()) {
            return remote;
        }
        // Unknown on the server: no password will ever match.
        Arc::new(MemoryRemote::new(""))
    }

    async fn register(&self, login: &LoginInfo) -> Result<Option<Registration>, RemoteError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        let Some(remote) = self.remote(&login.user_name) else {
            return Ok(None);
        };
        let password = login.password.expose_secret();
        if password.is_empty() || !remote.password_matches(password) {
            return Ok(None);
        }

        remote.set_logged_in(true);
        let account = Arc::new(MemoryAccount::new(&login.user_name));
        if login.remember_password {
            account.save_password_hash(SecretString::from(format!("hash:{password}")));
        }
        self.accounts.lock().push(Arc::clone(&account));
        Ok(Some(Registration {
            account,
            client: remote,
        }))
    }

    async fn unregister(&self, account: &dyn Account) -> Result<bool, RemoteError> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.unregister_failure.lock().clone() {
            return Err(RemoteError::transport(message));
        }
        if self.reject_unregister.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let mut accounts = self.accounts.lock();
        let before = accounts.len();
        accounts.retain(|a| !same_user(a.user_name(), account.user_name()));
        Ok(accounts.len() != before)
    }
}
