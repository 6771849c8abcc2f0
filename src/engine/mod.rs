//! Engine modules: the disk-facing half of an installation.
//!
//! `storage` turns hardware facts into a validated partition plan, `executor`
//! writes that plan to the device, and `mount` assembles (and tears down) the
//! target tree the configuration phases work in.

pub mod executor;
pub mod mount;
pub mod storage;

pub use executor::apply;
pub use mount::{MountState, mount, unmount_all};
pub use storage::{PartitionPlan, PartitionResult, PartitionSpec, plan};
