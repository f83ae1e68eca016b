//! Terminal UI provider for headless hosts.

use std::io::{self, BufRead, Write};

use parking_lot::Mutex;
use secrecy::SecretString;
use tracing::warn;
use wsvfs_core::UiProvider;
use wsvfs_core::remote::LoginInfo;

enum PasswordSource {
    /// Hidden entry on the controlling terminal
    Terminal,
    /// Plain line from the input stream
    Input,
}

struct Console {
    input: Box<dyn BufRead + Send>,
    output: Box<dyn Write + Send>,
    passwords: PasswordSource,
}

impl Console {
    fn say(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{text}")?;
        self.output.flush()
    }

    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn ask_password(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match self.passwords {
            PasswordSource::Terminal => rpassword::prompt_password(prompt).map(Some),
            PasswordSource::Input => self.ask(prompt),
        }
    }
}

/// Prompts and notices on a terminal.
///
/// An empty answer to a password prompt counts as dismissing it.
pub struct ConsoleUi {
    console: Mutex<Console>,
}

impl ConsoleUi {
    /// Uses stdin and stderr, reading passwords without echo.
    pub fn new() -> Self {
        Self {
            console: Mutex::new(Console {
                input: Box::new(io::BufReader::new(io::stdin())),
                output: Box::new(io::stderr()),
                passwords: PasswordSource::Terminal,
            }),
        }
    }

    /// Uses the given streams for everything, passwords included.
    pub fn with_io(input: impl BufRead + Send + 'static, output: impl Write + Send + 'static) -> Self {
        Self {
            console: Mutex::new(Console {
                input: Box::new(input),
                output: Box::new(output),
                passwords: PasswordSource::Input,
            }),
        }
    }
}

impl Default for ConsoleUi {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConsoleUi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleUi").finish_non_exhaustive()
    }
}

impl UiProvider for ConsoleUi {
    fn show_message(&self, text: &str, allow_cancel: bool) -> bool {
        let mut console = self.console.lock();
        if let Err(e) = console.say(text) {
            warn!(error = %e, "failed to write notice");
        }
        if !allow_cancel {
            return true;
        }
        match console.ask("Continue? [Y/n] ") {
            Ok(Some(answer)) => !answer.trim().eq_ignore_ascii_case("n"),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "failed to read answer");
                false
            }
        }
    }

    fn prompt_password(&self, user_name: &str) -> Option<SecretString> {
        let mut console = self.console.lock();
        match console.ask_password(&format!("Password for {user_name}: ")) {
            Ok(Some(password)) if !password.is_empty() => Some(SecretString::from(password)),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "failed to read password");
                None
            }
        }
    }

    fn prompt_credential(&self, default_user: Option<&str>) -> Option<LoginInfo> {
        let mut console = self.console.lock();
        let prompt = match default_user {
            Some(user) => format!("User name [{user}]: "),
            None => "User name: ".to_string(),
        };

        let read = |console: &mut Console| -> io::Result<Option<LoginInfo>> {
            let Some(entered) = console.ask(&prompt)? else {
                return Ok(None);
            };
            let user_name = match (entered.trim(), default_user) {
                ("", Some(user)) => user.to_string(),
                ("", None) => return Ok(None),
                (name, _) => name.to_string(),
            };
            let Some(password) = console.ask_password("Password: ")? else {
                return Ok(None);
            };
            if password.is_empty() {
                return Ok(None);
            }
            let remember = console
                .ask("Remember password? [y/N] ")?
                .is_some_and(|a| a.trim().eq_ignore_ascii_case("y"));
            Ok(Some(LoginInfo::new(user_name, password, remember)))
        };

        read(&mut *console).unwrap_or_else(|e| {
            warn!(error = %e, "failed to read credentials");
            None
        })
    }
}
