//! Property-Based Tests
//!
//! Uses proptest to check invariants that should hold for all inputs:
//! - Partition plans are contiguous, non-overlapping and end with root at 100%
//! - Partition node naming round-trips through `parent_disk`
//! - The stage machine only ever moves forward one phase at a time

use kutos_installer::engine::storage::{
    self, Boundary, EFI_END_MIB, MAX_SWAP_GIB, parent_disk, partition_node,
};
use kutos_installer::install_state::{InstallStage, InstallerContext};
use kutos_installer::types::{BootMode, PartitionRole};
use proptest::prelude::*;

fn boot_mode_strategy() -> impl Strategy<Value = BootMode> {
    prop_oneof![Just(BootMode::Uefi), Just(BootMode::Bios)]
}

fn device_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1}".prop_map(|c| format!("/dev/sd{}", c)),
        "[a-z]{1}".prop_map(|c| format!("/dev/vd{}", c)),
        (0u8..4, 1u8..4).prop_map(|(c, n)| format!("/dev/nvme{}n{}", c, n)),
        (0u8..3).prop_map(|n| format!("/dev/mmcblk{}", n)),
    ]
}

// =============================================================================
// Partition planner
// =============================================================================

proptest! {
    #[test]
    fn plan_is_always_valid(
        device in device_strategy(),
        mode in boot_mode_strategy(),
        ram in 0u64..256,
    ) {
        let plan = storage::plan(&device, mode, ram).unwrap();
        prop_assert!(plan.validate().is_ok());

        // Root is last and takes the rest of the disk
        let last = plan.partitions.last().unwrap();
        prop_assert_eq!(last.role, PartitionRole::Root);
        prop_assert_eq!(last.end, Boundary::End);

        // Each partition starts where the previous one ended
        for pair in plan.partitions.windows(2) {
            prop_assert_eq!(pair[0].end, Boundary::Mib(pair[1].start_mib));
        }

        prop_assert_eq!(plan.swap_gib, ram.clamp(1, MAX_SWAP_GIB));
        let swap = plan.get(PartitionRole::Swap).unwrap();
        prop_assert_eq!(swap.end, Boundary::Mib(swap.start_mib + plan.swap_gib * 1024));
    }

    #[test]
    fn plan_layout_follows_boot_mode(
        device in device_strategy(),
        mode in boot_mode_strategy(),
        ram in 1u64..64,
    ) {
        let plan = storage::plan(&device, mode, ram).unwrap();
        match mode {
            BootMode::Uefi => {
                prop_assert_eq!(plan.partitions.len(), 3);
                let efi = plan.get(PartitionRole::Efi).unwrap();
                prop_assert_eq!(efi.end, Boundary::Mib(EFI_END_MIB));
                prop_assert_eq!(plan.number_of(PartitionRole::Root), Some(3));
            }
            BootMode::Bios => {
                prop_assert_eq!(plan.partitions.len(), 2);
                prop_assert!(plan.get(PartitionRole::Efi).is_none());
                prop_assert_eq!(plan.number_of(PartitionRole::Root), Some(2));
            }
        }
    }

    #[test]
    fn partition_nodes_map_back_to_their_disk(device in device_strategy(), number in 1usize..10) {
        let node = partition_node(&device, number);
        prop_assert!(node.starts_with(&device));
        prop_assert_eq!(parent_disk(&node), Some(device));
    }

    #[test]
    fn planned_nodes_are_distinct(device in device_strategy(), mode in boot_mode_strategy()) {
        let result = storage::plan(&device, mode, 4).unwrap().result();
        let nodes: Vec<&str> = result.iter().map(|(_, node)| node).collect();
        let mut unique = nodes.clone();
        unique.sort_unstable();
        unique.dedup();
        prop_assert_eq!(unique.len(), nodes.len());
    }
}

// =============================================================================
// Stage machine
// =============================================================================

fn stage_strategy() -> impl Strategy<Value = InstallStage> {
    let mut stages = vec![InstallStage::NotStarted];
    stages.extend_from_slice(InstallStage::phases());
    stages.push(InstallStage::Completed);
    stages.push(InstallStage::Failed);
    prop::sample::select(stages)
}

proptest! {
    #[test]
    fn only_the_next_phase_is_reachable(target in stage_strategy(), steps in 0usize..10) {
        let mut ctx = InstallerContext::new();
        for _ in 0..steps {
            ctx.advance().unwrap();
        }
        let current = ctx.current_stage();
        let allowed = current.next() == Some(target);
        prop_assert_eq!(ctx.transition_to(target).is_ok(), allowed);
    }

    #[test]
    fn stage_order_matches_phase_position(steps in 1usize..=10) {
        let mut ctx = InstallerContext::new();
        for _ in 0..steps {
            ctx.advance().unwrap();
        }
        let current = ctx.current_stage();
        prop_assert_eq!(current, InstallStage::phases()[steps - 1]);
        prop_assert_eq!(current.order() as usize, steps);
    }
}
