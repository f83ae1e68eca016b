//! Credential provider handed to the remote client during login.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::remote::{Account, HashPersistor, RemoteError, SecretProvider};
use crate::ui::UiProvider;

/// Prompts through the UI for the password of one account and persists the
/// password hash on that account.
pub struct SecretStore {
    account: Arc<dyn Account>,
    ui: Arc<dyn UiProvider>,
}

impl SecretStore {
    pub fn new(account: Arc<dyn Account>, ui: Arc<dyn UiProvider>) -> Self {
        Self { account, ui }
    }
}

impl SecretProvider for SecretStore {
    fn password(&self) -> Result<SecretString, RemoteError> {
        let user = self.account.user_name();
        match self.ui.prompt_password(user) {
            Some(password) if !password.expose_secret().is_empty() => Ok(password),
            _ => {
                debug!(account = user, "password prompt dismissed");
                Err(RemoteError::Cancelled)
            }
        }
    }
}

impl HashPersistor for SecretStore {
    fn stored_hash(&self) -> Option<SecretString> {
        self.account.stored_password_hash()
    }

    fn save_hash(&self, hash: SecretString) {
        self.account.save_password_hash(hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryAccount, ScriptedUi};

    fn store(ui: &Arc<ScriptedUi>) -> SecretStore {
        let ui: Arc<dyn UiProvider> = ui.clone();
        SecretStore::new(Arc::new(MemoryAccount::new("alice")), ui)
    }

    #[test]
    fn test_password_returned() {
        let ui = Arc::new(ScriptedUi::new());
        ui.queue_password(Some("hunter2"));
        let password = store(&ui).password().unwrap();
        assert_eq!(password.expose_secret(), "hunter2");
        assert_eq!(ui.password_prompts(), ["alice"]);
    }

    #[test]
    fn test_dismissed_prompt_is_cancellation() {
        let ui = Arc::new(ScriptedUi::new());
        ui.queue_password(None);
        assert!(store(&ui).password().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_empty_password_is_cancellation() {
        let ui = Arc::new(ScriptedUi::new());
        ui.queue_password(Some(""));
        assert!(store(&ui).password().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_hash_persisted_on_account() {
        let ui = Arc::new(ScriptedUi::new());
        let account = Arc::new(MemoryAccount::new("alice"));
        let store = SecretStore::new(account.clone(), ui);
        assert!(store.stored_hash().is_none());
        store.save_hash(SecretString::from("abc".to_string()));
        assert_eq!(store.stored_hash().unwrap().expose_secret(), "abc");
        assert_eq!(account.stored_password_hash().unwrap().expose_secret(), "abc");
    }
}
