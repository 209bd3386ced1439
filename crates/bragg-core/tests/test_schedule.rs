use bragg_core::error::BraggError;
use bragg_core::schedule::{
    assign_devices, estimate_run_bytes, get_gpu_distribution, get_gpu_load, parse_nvidia_smi,
    schedule_runs, split_by_directory, DeviceInfo, StaticDeviceMonitor,
};

const GIB: u64 = 1 << 30;

fn monitor(free: &[(u32, u64)]) -> StaticDeviceMonitor {
    StaticDeviceMonitor::new(
        free.iter()
            .map(|&(id, free_bytes)| DeviceInfo { id, free_bytes })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

#[test]
fn test_load_is_floor_of_free_memory() {
    let p = monitor(&[(0, 10 * GIB), (1, 5 * GIB + 1), (2, GIB)]);
    let slots = get_gpu_load(2 * GIB, &[0, 1, 2], &p).unwrap();
    assert_eq!(slots, vec![5, 2, 0]);
}

#[test]
fn test_load_ignores_unlisted_and_missing_devices() {
    let p = monitor(&[(0, 4 * GIB), (3, 8 * GIB)]);
    let slots = get_gpu_load(GIB, &[3, 7], &p).unwrap();
    assert_eq!(slots, vec![8, 0]);
}

#[test]
fn test_load_over_request_gives_zero_slots() {
    let p = monitor(&[(0, GIB), (1, 2 * GIB)]);
    let slots = get_gpu_load(4 * GIB, &[0, 1], &p).unwrap();
    assert_eq!(slots, vec![0, 0]);
    assert!(matches!(
        get_gpu_distribution(2, &slots),
        Err(BraggError::InsufficientCapacity { .. })
    ));
}

#[test]
fn test_load_rejects_zero_footprint() {
    let p = monitor(&[(0, GIB)]);
    assert!(matches!(
        get_gpu_load(0, &[0], &p),
        Err(BraggError::InvalidArgument(_))
    ));
}

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

#[test]
fn test_distribution_trims_round_robin() {
    assert_eq!(get_gpu_distribution(3, &[3, 2, 0]).unwrap(), vec![2, 1, 0]);
    assert_eq!(get_gpu_distribution(5, &[3, 2, 0]).unwrap(), vec![3, 2, 0]);
    assert_eq!(get_gpu_distribution(1, &[1, 4]).unwrap(), vec![0, 1]);
}

#[test]
fn test_distribution_sums_to_desired() {
    for desired in 0..=9 {
        let slots = get_gpu_distribution(desired, &[4, 0, 3, 2]).unwrap();
        assert_eq!(slots.iter().sum::<usize>(), desired);
        assert!(slots.iter().zip([4, 0, 3, 2]).all(|(&s, a)| s <= a));
    }
}

#[test]
fn test_distribution_insufficient_capacity() {
    let err = get_gpu_distribution(1, &[0, 0]).unwrap_err();
    assert!(matches!(
        err,
        BraggError::InsufficientCapacity {
            desired: 1,
            available: 0
        }
    ));
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

#[test]
fn test_assignment_is_device_grouped() {
    assert_eq!(assign_devices(&[2, 0, 1], &[4, 5, 6]), vec![4, 4, 6]);
}

#[test]
fn test_split_by_directory() {
    let groups = split_by_directory(&[0, 0, 1, 1, 2], 2);
    assert_eq!(groups, vec![vec![0, 0], vec![1, 1], vec![2]]);
}

#[test]
fn test_schedule_runs_end_to_end() {
    let p = monitor(&[(0, 3 * GIB), (1, 2 * GIB)]);
    let schedule = schedule_runs(4, GIB, &[0, 1], &p).unwrap();
    assert_eq!(schedule.slots, vec![2, 2]);
    assert_eq!(
        schedule.assignment,
        vec![Some(0), Some(0), Some(1), Some(1)]
    );
    assert!(schedule.warnings.is_empty());
}

#[test]
fn test_schedule_without_devices_runs_on_cpu() {
    let schedule = schedule_runs(3, GIB, &[], &monitor(&[])).unwrap();
    assert_eq!(schedule.assignment, vec![None, None, None]);
    assert_eq!(schedule.warnings.len(), 1);
}

#[test]
fn test_schedule_insufficient_capacity() {
    let p = monitor(&[(0, GIB)]);
    assert!(matches!(
        schedule_runs(2, GIB, &[0], &p),
        Err(BraggError::InsufficientCapacity { .. })
    ));
}

// ---------------------------------------------------------------------------
// Probing
// ---------------------------------------------------------------------------

#[test]
fn test_parse_nvidia_smi() {
    let table = parse_nvidia_smi("  3, 2048  \r\n").unwrap();
    assert_eq!(
        table,
        vec![DeviceInfo {
            id: 3,
            free_bytes: 2 * GIB
        }]
    );
    assert!(matches!(
        parse_nvidia_smi("0, lots"),
        Err(BraggError::DeviceQuery(_))
    ));
}

#[test]
fn test_estimate_run_bytes() {
    assert_eq!(estimate_run_bytes((10, 10, 10)), 128_000);
}
