//! Install State Machine
//!
//! The orchestrator records every phase boundary here. The context owns the
//! current stage and refuses anything but a single step forward, so a phase
//! can neither be skipped nor repeated within one run.
//!
//! # Design Principles
//!
//! - **Single Source of Truth**: `InstallerContext` owns the current stage
//! - **Forward Only**: the only legal moves are "next stage" and "fail"
//! - **No Global State**: one context per run, owned by the orchestrator
//!
//! # Stage Flow
//!
//! ```text
//! NotStarted
//!     ↓
//! Partitioning → Mounting → InstallingBase → GeneratingFstab
//!     ↓
//! ConfiguringSystem → InstallingDesktop → InstallingExtras
//!     ↓
//! InstallingAurHelper → InstallingBootloader → ConfiguringUsers
//!     ↓
//! Completed
//!
//! (Any non-terminal stage can transition to Failed)
//! ```

use std::fmt;
use thiserror::Error;

/// Installation stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InstallStage {
    NotStarted = 0,

    /// Phase 1: wipe, partition and format the target disk (DESTRUCTIVE)
    Partitioning = 1,

    /// Phase 2: mount root/EFI, activate swap
    Mounting = 2,

    /// Phase 3: pacstrap the base package set
    InstallingBase = 3,

    /// Phase 4: /etc/fstab
    GeneratingFstab = 4,

    /// Phase 5: locale, timezone, hostname
    ConfiguringSystem = 5,

    /// Phase 6: desktop environment packages
    InstallingDesktop = 6,

    /// Phase 7: user-selected extra packages (may be a logged no-op)
    InstallingExtras = 7,

    /// Phase 8: yay build as the new user
    InstallingAurHelper = 8,

    /// Phase 9: GRUB
    InstallingBootloader = 9,

    /// Phase 10: user account and systemd units
    ConfiguringUsers = 10,

    /// All phases done and the target unmounted (terminal)
    Completed = 11,

    /// A phase raised (terminal)
    Failed = 255,
}

impl InstallStage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::Partitioning),
            Self::Partitioning => Some(Self::Mounting),
            Self::Mounting => Some(Self::InstallingBase),
            Self::InstallingBase => Some(Self::GeneratingFstab),
            Self::GeneratingFstab => Some(Self::ConfiguringSystem),
            Self::ConfiguringSystem => Some(Self::InstallingDesktop),
            Self::InstallingDesktop => Some(Self::InstallingExtras),
            Self::InstallingExtras => Some(Self::InstallingAurHelper),
            Self::InstallingAurHelper => Some(Self::InstallingBootloader),
            Self::InstallingBootloader => Some(Self::ConfiguringUsers),
            Self::ConfiguringUsers => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    /// Phase label shown by the progress surface
    pub const fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::Partitioning => "Partitioning disk",
            Self::Mounting => "Creating filesystems",
            Self::InstallingBase => "Installing base system",
            Self::GeneratingFstab => "Generating fstab",
            Self::ConfiguringSystem => "Configuring system",
            Self::InstallingDesktop => "Installing desktop environment",
            Self::InstallingExtras => "Installing extra packages",
            Self::InstallingAurHelper => "Installing yay",
            Self::InstallingBootloader => "Installing bootloader",
            Self::ConfiguringUsers => "Configuring user and services",
            Self::Completed => "Installation complete",
            Self::Failed => "Installation failed",
        }
    }

    /// The ten executable phases, in order
    pub const fn phases() -> &'static [Self] {
        &[
            Self::Partitioning,
            Self::Mounting,
            Self::InstallingBase,
            Self::GeneratingFstab,
            Self::ConfiguringSystem,
            Self::InstallingDesktop,
            Self::InstallingExtras,
            Self::InstallingAurHelper,
            Self::InstallingBootloader,
            Self::ConfiguringUsers,
        ]
    }
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallTransitionError {
    #[error("Cannot skip from {from} to {to}")]
    SkippedStage { from: InstallStage, to: InstallStage },

    #[error("Cannot go backwards from {from} to {to} (installation is forward-only)")]
    BackwardTransition { from: InstallStage, to: InstallStage },

    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: InstallStage },

    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: InstallStage },
}

/// Stage tracking for one run.
///
/// # Example
///
/// ```
/// use kutos_installer::install_state::{InstallerContext, InstallStage};
///
/// let mut ctx = InstallerContext::new();
/// ctx.advance().unwrap();
/// assert_eq!(ctx.current_stage(), InstallStage::Partitioning);
///
/// // Cannot skip stages
/// assert!(ctx.transition_to(InstallStage::InstallingBase).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct InstallerContext {
    current: InstallStage,

    /// Stage that was running when the run failed
    failed_at: Option<InstallStage>,
}

impl Default for InstallerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallerContext {
    pub fn new() -> Self {
        Self {
            current: InstallStage::NotStarted,
            failed_at: None,
        }
    }

    #[inline]
    pub fn current_stage(&self) -> InstallStage {
        self.current
    }

    #[inline]
    pub fn failed_at(&self) -> Option<InstallStage> {
        self.failed_at
    }

    /// Move to the next stage.
    ///
    /// # Errors
    ///
    /// `FromTerminalState` if already at Completed or Failed
    pub fn advance(&mut self) -> Result<InstallStage, InstallTransitionError> {
        let next = self
            .current
            .next()
            .ok_or(InstallTransitionError::FromTerminalState { from: self.current })?;
        self.record(next);
        self.current = next;
        Ok(next)
    }

    /// Move to `target`, which must be exactly the next stage.
    pub fn transition_to(
        &mut self,
        target: InstallStage,
    ) -> Result<InstallStage, InstallTransitionError> {
        if self.current.is_terminal() {
            return Err(InstallTransitionError::FromTerminalState { from: self.current });
        }
        if target == self.current {
            return Err(InstallTransitionError::AlreadyAtStage { stage: target });
        }
        if target != InstallStage::Failed && target.order() < self.current.order() {
            return Err(InstallTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }
        if self.current.next() != Some(target) {
            return Err(InstallTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        self.record(target);
        self.current = target;
        Ok(target)
    }

    /// Mark the run as failed at the current stage.
    pub fn fail(&mut self) -> Result<(), InstallTransitionError> {
        if self.current.is_terminal() {
            return Err(InstallTransitionError::FromTerminalState { from: self.current });
        }
        self.failed_at = Some(self.current);
        self.record(InstallStage::Failed);
        self.current = InstallStage::Failed;
        Ok(())
    }

    fn record(&mut self, stage: InstallStage) {
        log::debug!("stage -> {}", stage);
    }
}

impl From<InstallTransitionError> for crate::error::InstallError {
    fn from(err: InstallTransitionError) -> Self {
        crate::error::InstallError::InstallTransition(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // InstallStage
    // =========================================================================

    #[test]
    fn test_phases_follow_next_chain() {
        let mut stage = InstallStage::NotStarted;
        for phase in InstallStage::phases() {
            stage = stage.next().unwrap();
            assert_eq!(stage, *phase);
            assert!(!stage.is_terminal());
        }
        assert_eq!(stage.next(), Some(InstallStage::Completed));
        assert_eq!(InstallStage::Completed.next(), None);
        assert_eq!(InstallStage::Failed.next(), None);
    }

    #[test]
    fn test_exactly_ten_phases_in_order() {
        let phases = InstallStage::phases();
        assert_eq!(phases.len(), 10);
        for (i, stage) in phases.iter().enumerate() {
            assert_eq!(stage.order() as usize, i + 1, "{:?}", stage);
        }
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(InstallStage::Partitioning.to_string(), "Partitioning disk");
        assert_eq!(InstallStage::InstallingAurHelper.to_string(), "Installing yay");
    }

    // =========================================================================
    // InstallerContext
    // =========================================================================

    #[test]
    fn test_advance_through_all_stages() {
        let mut ctx = InstallerContext::new();
        let mut count = 0;
        while ctx.advance().is_ok() {
            count += 1;
            assert!(count < 20, "stage chain loops");
        }
        assert_eq!(ctx.current_stage(), InstallStage::Completed);
        assert_eq!(count, InstallStage::phases().len() + 1);
        assert_eq!(ctx.failed_at(), None);
    }

    #[test]
    fn test_cannot_skip_or_go_back() {
        let mut ctx = InstallerContext::new();
        assert!(matches!(
            ctx.transition_to(InstallStage::Mounting),
            Err(InstallTransitionError::SkippedStage { .. })
        ));

        ctx.transition_to(InstallStage::Partitioning).unwrap();
        ctx.transition_to(InstallStage::Mounting).unwrap();
        assert!(matches!(
            ctx.transition_to(InstallStage::Partitioning),
            Err(InstallTransitionError::BackwardTransition { .. })
        ));
        assert!(matches!(
            ctx.transition_to(InstallStage::Mounting),
            Err(InstallTransitionError::AlreadyAtStage { .. })
        ));
    }

    #[test]
    fn test_fail_records_stage() {
        let mut ctx = InstallerContext::new();
        for _ in 0..3 {
            ctx.advance().unwrap();
        }
        ctx.fail().unwrap();

        assert_eq!(ctx.current_stage(), InstallStage::Failed);
        assert_eq!(ctx.failed_at(), Some(InstallStage::InstallingBase));
        assert!(matches!(
            ctx.advance(),
            Err(InstallTransitionError::FromTerminalState { .. })
        ));
        assert!(ctx.fail().is_err());
    }

    #[test]
    fn test_transition_error_converts() {
        let err: crate::error::InstallError = InstallTransitionError::AlreadyAtStage {
            stage: InstallStage::Mounting,
        }
        .into();
        assert!(err.to_string().contains("Already at stage"));
    }
}
