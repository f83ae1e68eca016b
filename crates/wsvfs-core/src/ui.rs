//! User interaction seam.
//!
//! All prompts and notices go through a [`UiProvider`]. The host shell
//! supplies the real one; tests use [`crate::testing::ScriptedUi`].

use secrecy::SecretString;

use crate::remote::LoginInfo;

/// Prompts and notices shown to the user.
///
/// Called only from the thread that entered the plugin.
pub trait UiProvider: Send + Sync {
    /// Shows a notice. With `allow_cancel`, returns `false` when the user
    /// chose to cancel; otherwise the return value is `true`.
    fn show_message(&self, text: &str, allow_cancel: bool) -> bool;

    /// Asks for the password of `user_name`. `None` when dismissed.
    fn prompt_password(&self, user_name: &str) -> Option<SecretString>;

    /// Asks for new account credentials. `None` when dismissed.
    fn prompt_credential(&self, default_user: Option<&str>) -> Option<LoginInfo>;
}

/// Notice texts.
pub mod messages {
    pub const WRONG_LOGIN: &str = "Wrong login or password.";

    pub fn account_exists(user_name: &str) -> String {
        format!("Account {user_name} already exists.")
    }

    pub fn confirm_unregister(user_name: &str) -> String {
        format!("Unregister account {user_name}?")
    }

    pub fn folder_not_found(path: &str) -> String {
        format!("Folder {path} not found.")
    }

    pub fn path_not_found(path: &str) -> String {
        format!("Path {path} not found.")
    }
}
