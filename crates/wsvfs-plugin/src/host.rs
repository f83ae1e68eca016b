//! Types of the host plugin contract.

use std::ops::BitOr;

use wsvfs_core::ProgressAction;

/// Transfer flags passed with get/put calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CopyFlags(u8);

impl CopyFlags {
    pub const NONE: Self = Self(0);
    /// Replace an existing target.
    pub const OVERWRITE: Self = Self(1);
    /// Continue an interrupted transfer.
    pub const RESUME: Self = Self(1 << 1);
    /// Remove the source after a successful transfer.
    pub const MOVE: Self = Self(1 << 2);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn overwrite(self) -> bool {
        self.contains(Self::OVERWRITE)
    }

    pub fn resume(self) -> bool {
        self.contains(Self::RESUME)
    }

    pub fn move_source(self) -> bool {
        self.contains(Self::MOVE)
    }
}

impl BitOr for CopyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Operation named in a lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOperation {
    List,
    GetSingle,
    GetMulti,
    PutSingle,
    PutMulti,
    RenameMoveSingle,
    RenameMoveMulti,
    Delete,
    Attributes,
    MkDir,
    Execute,
    CalculateSize,
    Search,
    Other,
}

/// Whether a lifecycle notification opens or closes an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    End,
}

/// Host progress dialog used around server-side rename, move and copy.
pub trait HostProgress: Send + Sync {
    /// Updates the dialog for `source` → `target`. [`ProgressAction::Abort`]
    /// means the user pressed cancel.
    fn progress(&self, source: &str, target: &str, percent: u8) -> ProgressAction;
}

/// A host without a progress dialog.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHostProgress;

impl HostProgress for NoHostProgress {
    fn progress(&self, _source: &str, _target: &str, _percent: u8) -> ProgressAction {
        ProgressAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_flags() {
        let flags = CopyFlags::OVERWRITE | CopyFlags::MOVE;
        assert!(flags.overwrite());
        assert!(flags.move_source());
        assert!(!flags.resume());
        assert!(!CopyFlags::NONE.overwrite());
        assert!(CopyFlags::NONE.contains(CopyFlags::NONE));
    }
}
