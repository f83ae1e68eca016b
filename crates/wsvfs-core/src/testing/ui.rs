//! UI provider with queued answers.

use std::collections::VecDeque;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use secrecy::SecretString;

use crate::remote::LoginInfo;
use crate::ui::UiProvider;

#[derive(Debug, Default)]
struct Script {
    passwords: VecDeque<Option<String>>,
    credentials: VecDeque<Option<(String, String, bool)>>,
    answers: VecDeque<bool>,
    messages: Vec<String>,
    password_prompts: Vec<String>,
    credential_prompts: Vec<Option<String>>,
    threads: Vec<ThreadId>,
}

/// Answers prompts from queues and records everything shown.
///
/// An empty password or credential queue answers as a dismissed prompt.
/// An empty answer queue confirms.
#[derive(Debug, Default)]
pub struct ScriptedUi {
    script: Mutex<Script>,
}

impl ScriptedUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the answer to the next password prompt (`None` dismisses it).
    pub fn queue_password(&self, password: Option<&str>) {
        self.script
            .lock()
            .passwords
            .push_back(password.map(str::to_string));
    }

    /// Queues credentials for the next "add account" prompt.
    pub fn queue_credential(&self, user_name: &str, password: &str, remember: bool) {
        self.script.lock().credentials.push_back(Some((
            user_name.to_string(),
            password.to_string(),
            remember,
        )));
    }

    /// Queues the answer to the next cancellable notice or confirmation.
    pub fn queue_answer(&self, proceed: bool) {
        self.script.lock().answers.push_back(proceed);
    }

    /// Every notice shown so far.
    pub fn messages(&self) -> Vec<String> {
        self.script.lock().messages.clone()
    }

    /// User names the password prompt was shown for.
    pub fn password_prompts(&self) -> Vec<String> {
        self.script.lock().password_prompts.clone()
    }

    pub fn credential_prompts(&self) -> Vec<Option<String>> {
        self.script.lock().credential_prompts.clone()
    }

    /// Threads every interaction ran on.
    pub fn threads(&self) -> Vec<ThreadId> {
        self.script.lock().threads.clone()
    }
}

impl UiProvider for ScriptedUi {
    fn show_message(&self, text: &str, allow_cancel: bool) -> bool {
        let mut script = self.script.lock();
        script.threads.push(thread::current().id());
        script.messages.push(text.to_string());
        if allow_cancel {
            script.answers.pop_front().unwrap_or(true)
        } else {
            true
        }
    }

    fn prompt_password(&self, user_name: &str) -> Option<SecretString> {
        let mut script = self.script.lock();
        script.threads.push(thread::current().id());
        script.password_prompts.push(user_name.to_string());
        script
            .passwords
            .pop_front()
            .flatten()
            .map(SecretString::from)
    }

    fn prompt_credential(&self, default_user: Option<&str>) -> Option<LoginInfo> {
        let mut script = self.script.lock();
        script.threads.push(thread::current().id());
        script
            .credential_prompts
            .push(default_user.map(str::to_string));
        script
            .credentials
            .pop_front()
            .flatten()
            .map(|(user, password, remember)| LoginInfo::new(user, password, remember))
    }
}
