//! Result codes returned to the host.
//!
//! The raw values follow the host's file-system plugin convention.

/// Outcome of a file operation (transfer, move, rename, copy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitCode {
    /// Operation succeeded
    Ok,
    /// Target already exists and overwrite was not requested
    FileExists,
    /// Source (or target folder) does not exist
    FileNotFound,
    /// Failure while reading or transferring
    ReadError,
    /// Failure while writing, moving or renaming
    WriteError,
    /// User cancelled, or declined an error notice
    UserAbort,
    /// Operation not valid at this level of the tree
    NotSupported,
}

impl ExitCode {
    /// Raw host value.
    pub fn as_raw(self) -> i32 {
        match self {
            ExitCode::Ok => 0,
            ExitCode::FileExists => 1,
            ExitCode::FileNotFound => 2,
            ExitCode::ReadError => 3,
            ExitCode::WriteError => 4,
            ExitCode::UserAbort => 5,
            ExitCode::NotSupported => 6,
        }
    }

    pub fn is_ok(self) -> bool {
        self == ExitCode::Ok
    }
}

/// Outcome of activating an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecResult {
    /// Handled, nothing else to do
    Ok,
    /// Let the host handle the entry itself
    Yourself,
    /// Navigate to the given virtual path
    SymLink(String),
}
