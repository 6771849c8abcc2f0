//! KutOS Installer Library
//!
//! The installation engine behind the KutOS installer: partition planning,
//! disk preparation, base-system bootstrap, in-chroot configuration and the
//! orchestrator that runs them as one ten-phase transaction.

pub mod chroot;
pub mod cli;
pub mod config_file;
pub mod configure;
pub mod engine;
pub mod error;
pub mod hardware;
pub mod install_state;
pub mod installer;
pub mod process;
pub mod process_guard;
pub mod profiles;
pub mod report;
pub mod sanity;
pub mod types;

// Re-export main types for convenience
pub use chroot::Chroot;
pub use config_file::{InstallConfig, InstallOptions};
pub use error::{ErrorKind, InstallError};
pub use install_state::{InstallStage, InstallTransitionError, InstallerContext};
pub use installer::{InstallOutcome, Installer};
pub use process::{CommandOutput, CommandSpec, DryRunRunner, OutputStream, ProcessRunner, SystemRunner};
pub use process_guard::{CancelToken, ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use report::{InstallationProgress, LogSink, Reporter};
pub use types::{BootMode, DesktopEnvironment, Filesystem, PartitionMode, PartitionRole};

// Hardware detection
pub use hardware::{BlockDevice, HardwareInfo};

// Storage engine
pub use engine::storage::{PartitionPlan, PartitionResult, PartitionSpec, plan};
