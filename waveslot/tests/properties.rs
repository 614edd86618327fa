use rand::{Rng, SeedableRng, rngs::SmallRng};
use waveslot::{AllocationController, AllocatorConfig, BankId, Slot, SlotError};

const STEPS: usize = 4000;

fn controller() -> AllocationController {
    AllocationController::from_layout([(0u32, 1000), (1u32, 4096), (2u32, 250)]).unwrap()
}

fn assert_invariants(controller: &AllocationController) {
    let snapshot = controller.get_segment_occupation();

    for bank in &snapshot.banks {
        let used = bank.segments.iter().map(|segment| segment.size).sum::<usize>();
        assert!(used <= bank.capacity, "bank {} over capacity", bank.bank);

        for (i, a) in bank.segments.iter().enumerate() {
            for b in &bank.segments[i + 1..] {
                assert!(!a.overlaps(b), "bank {}: {a:?} overlaps {b:?}", bank.bank);
            }
        }
    }

    assert!(snapshot.is_consistent());
}

#[test]
fn test_random_sequences_keep_banks_consistent() {
    let controller = controller();
    let mut rng = SmallRng::seed_from_u64(0x5eed);
    let mut live: Vec<Slot> = Vec::new();

    for _ in 0..STEPS {
        if live.is_empty() || rng.random_bool(0.55) {
            let n_points = rng.random_range(1..=600);
            let before = controller.get_segment_occupation();

            match controller.get_upload_slot(n_points) {
                Ok(slot) => {
                    assert_eq!(slot.size, n_points);
                    live.push(slot);
                }
                Err(err @ SlotError::OutOfCapacity { requested, .. }) => {
                    assert_eq!(requested, n_points);
                    assert_eq!(err.is_retryable(), n_points <= 4096);
                    assert!(before.banks.iter().all(|bank| bank.largest_free < n_points));
                    assert_eq!(controller.get_seg_data(), before.seg_data());
                }
                Err(err) => panic!("unexpected error: {err}"),
            }
        } else {
            let slot = live.swap_remove(rng.random_range(0..live.len()));
            controller.release_memory(&[slot]).unwrap();
        }

        assert_invariants(&controller);
    }

    assert_eq!(controller.release_memory(&live), Ok(live.len()));

    let snapshot = controller.get_segment_occupation();
    for bank in &snapshot.banks {
        assert_eq!(bank.free, bank.capacity);
        assert_eq!(bank.free_ranges.len(), 1);
    }
}

#[test]
fn test_release_restores_free_capacity() {
    let controller = controller();
    let mut rng = SmallRng::seed_from_u64(7);
    let mut live = Vec::new();

    for _ in 0..20 {
        live.push(controller.get_upload_slot(rng.random_range(1..=100)).unwrap());
    }

    for _ in 0..200 {
        let n_points = rng.random_range(1..=300);
        let before = controller.get_segment_occupation();

        let Ok(slot) = controller.get_upload_slot(n_points) else {
            continue;
        };
        controller.release_memory(&[slot]).unwrap();

        let after = controller.get_segment_occupation();
        assert_eq!(after.total_free(), before.total_free());
        assert_eq!(
            after.bank(slot.bank).unwrap().free,
            before.bank(slot.bank).unwrap().free
        );
    }
}

#[test]
fn test_second_free_fails_and_changes_nothing() {
    let controller = controller();
    let mut rng = SmallRng::seed_from_u64(99);

    let slots = (0..30)
        .map(|_| controller.get_upload_slot(rng.random_range(1..=50)).unwrap())
        .collect::<Vec<_>>();

    for slot in &slots {
        controller.release_memory(&[*slot]).unwrap();
        let after_first = controller.get_seg_data();

        let err = controller.release_memory(&[*slot]).unwrap_err();
        assert_eq!(
            err.source,
            SlotError::DoubleFree {
                bank: slot.bank,
                segment: slot.segment
            }
        );
        assert!(err.released.is_empty());
        assert_eq!(controller.get_seg_data(), after_first);
    }
}

#[test]
fn test_larger_than_any_bank_always_fails() {
    let controller = controller();
    let largest = controller
        .bank_ids()
        .filter_map(|bank| controller.bank_capacity(bank))
        .max()
        .unwrap();

    let mut rng = SmallRng::seed_from_u64(3);
    let mut live = Vec::new();

    for _ in 0..100 {
        let oversized = largest + rng.random_range(1..=1000);
        let err = controller.get_upload_slot(oversized).unwrap_err();
        assert_eq!(
            err,
            SlotError::OutOfCapacity {
                requested: oversized,
                largest_capacity: largest
            }
        );
        assert!(!err.is_retryable());

        if let Ok(slot) = controller.get_upload_slot(rng.random_range(1..=200)) {
            live.push(slot);
        }

        if !live.is_empty() && rng.random_bool(0.3) {
            let slot = live.swap_remove(rng.random_range(0..live.len()));
            controller.release_slot(&slot).unwrap();
        }
    }
}

#[test]
fn test_zero_points_leaves_snapshot_unchanged() {
    let controller = controller();
    let _a = controller.get_upload_slot(120).unwrap();
    let _b = controller.get_upload_slot(30).unwrap();

    let before = controller.get_seg_data();
    assert_eq!(
        controller.get_upload_slot(0),
        Err(SlotError::InvalidSize { size: 0 })
    );
    assert_eq!(controller.get_seg_data(), before);
}

#[test]
fn test_granular_banks_round_every_slot() {
    let config = AllocatorConfig::new()
        .with_bank(0u32, 10_000)
        .with_bank(1u32, 10_000)
        .with_granularity(16);
    let controller = AllocationController::new(config).unwrap();
    let mut rng = SmallRng::seed_from_u64(11);

    for _ in 0..200 {
        let n_points = rng.random_range(1..=300);
        let Ok(slot) = controller.get_upload_slot(n_points) else {
            break;
        };

        assert_eq!(slot.size % 16, 0);
        assert_eq!(slot.offset % 16, 0);
        assert!(slot.size >= n_points && slot.size < n_points + 16);
        assert!(slot.bank == BankId::new(0) || slot.bank == BankId::new(1));
    }

    assert!(controller.get_segment_occupation().is_consistent());
}
