//! Account-layer errors and user notice formatting.

use std::error::Error as StdError;
use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::bridge::BridgeError;
use crate::remote::RemoteError;

/// Error from an account session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("local file {} failed", path.display())]
    Local {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    pub fn local(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SessionError::Local {
            path: path.into(),
            source,
        }
    }

    /// The operation was cancelled: by the host, by a progress abort, or by a
    /// dismissed credential prompt.
    pub fn is_cancelled(&self) -> bool {
        match self {
            SessionError::Remote(e) => e.is_cancelled(),
            SessionError::Bridge(e) => matches!(e, BridgeError::Cancelled),
            SessionError::Local { .. } => false,
        }
    }

    /// A remote file or folder was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::Remote(e) if e.is_not_found())
    }

    /// Kind of a local file failure, `None` for remote and bridge errors.
    pub fn local_kind(&self) -> Option<io::ErrorKind> {
        match self {
            SessionError::Local { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

/// Error from the account registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<RemoteError> for RegistryError {
    fn from(e: RemoteError) -> Self {
        RegistryError::Session(SessionError::Remote(e))
    }
}

impl From<BridgeError> for RegistryError {
    fn from(e: BridgeError) -> Self {
        RegistryError::Session(SessionError::Bridge(e))
    }
}

/// Builds the text of an error notice.
///
/// `base` comes first; with an error, a colon follows and each level of the
/// cause chain is appended on its own line as `Kind: message`, outermost
/// first.
pub fn notice_message(base: &str, err: Option<&(dyn StdError + 'static)>) -> String {
    let Some(err) = err else {
        return base.to_string();
    };

    let mut text = format!("{base}:");
    let mut cause = Some(err);
    while let Some(e) = cause {
        let _ = write!(text, "\n{}: {e}", error_kind(e));
        cause = e.source();
    }
    text
}

fn error_kind(err: &(dyn StdError + 'static)) -> String {
    if let Some(e) = err.downcast_ref::<RegistryError>() {
        return match e {
            RegistryError::AccountNotFound(_) => "AccountNotFound".to_string(),
            RegistryError::Session(inner) => session_kind(inner).to_string(),
        };
    }
    if let Some(e) = err.downcast_ref::<SessionError>() {
        return session_kind(e).to_string();
    }
    if let Some(e) = err.downcast_ref::<RemoteError>() {
        return e.kind().to_string();
    }
    if let Some(e) = err.downcast_ref::<BridgeError>() {
        return bridge_kind(e).to_string();
    }
    if let Some(e) = err.downcast_ref::<io::Error>() {
        return format!("{:?}", e.kind());
    }
    "Error".to_string()
}

fn session_kind(err: &SessionError) -> &'static str {
    match err {
        SessionError::Remote(inner) => inner.kind(),
        SessionError::Bridge(inner) => bridge_kind(inner),
        SessionError::Local { .. } => "LocalFile",
    }
}

fn bridge_kind(err: &BridgeError) -> &'static str {
    match err {
        BridgeError::Cancelled => "Cancelled",
        BridgeError::NestedRuntime => "NestedRuntime",
        BridgeError::Runtime(_) => "Runtime",
        BridgeError::OwnerGone => "OwnerGone",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_without_error_is_base() {
        assert_eq!(notice_message("Create folder error", None), "Create folder error");
    }

    #[test]
    fn test_notice_lists_cause_chain() {
        let inner = io::Error::new(io::ErrorKind::ConnectionReset, "peer reset");
        let err = SessionError::from(RemoteError::transport_with("upload failed", inner));
        let text = notice_message("Upload file error", Some(&err));
        assert_eq!(
            text,
            "Upload file error:\n\
             Transport: transport failure: upload failed\n\
             ConnectionReset: peer reset"
        );
    }

    #[test]
    fn test_local_error_kind() {
        let err = SessionError::local(
            "/tmp/x",
            io::Error::new(io::ErrorKind::AlreadyExists, "exists"),
        );
        assert_eq!(err.local_kind(), Some(io::ErrorKind::AlreadyExists));
        let text = notice_message("Download file error", Some(&err));
        assert_eq!(
            text,
            "Download file error:\nLocalFile: local file /tmp/x failed\nAlreadyExists: exists"
        );
    }

    #[test]
    fn test_classification() {
        assert!(SessionError::from(RemoteError::Cancelled).is_cancelled());
        assert!(SessionError::from(BridgeError::Cancelled).is_cancelled());
        assert!(SessionError::from(RemoteError::FolderNotFound("/x".into())).is_not_found());
        assert!(!SessionError::from(RemoteError::Rejected("no".into())).is_not_found());
    }
}
