use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    thread,
    time::Duration,
};

use anima_ngin::{
    data_structures::{identifier::Identifiers, ring_queue::RingQueue},
    error::{IdentifierError, QueueError, RegistryError},
    resources::registry::ReferenceRegistry,
};

#[test]
fn acquire_loads_once_and_counts_references() {
    let registry: ReferenceRegistry<String> = ReferenceRegistry::new();
    let loads = AtomicU32::new(0);
    let load = || {
        loads.fetch_add(1, Ordering::SeqCst);
        Ok("brick".to_string())
    };

    let first = registry.acquire("brick", true, load).unwrap();
    let second = registry
        .acquire("brick", true, || Ok("unused".to_string()))
        .unwrap();

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.ref_count("brick"), Some(2));
}

#[test]
fn auto_release_unloads_at_zero() {
    let registry: ReferenceRegistry<u32> = ReferenceRegistry::new();
    registry.acquire("a", true, || Ok(7)).unwrap();
    registry.acquire("a", true, || Ok(7)).unwrap();

    let mut unloaded = Vec::new();
    assert_eq!(registry.release("a", |v| unloaded.push(*v)).unwrap(), 1);
    assert!(unloaded.is_empty());
    assert_eq!(registry.release("a", |v| unloaded.push(*v)).unwrap(), 0);
    assert_eq!(unloaded, vec![7]);
    assert!(!registry.contains("a"));
}

#[test]
fn kept_entries_survive_zero_and_reject_extra_release() {
    let registry: ReferenceRegistry<u32> = ReferenceRegistry::new();
    registry.acquire("kept", false, || Ok(1)).unwrap();

    assert_eq!(registry.release("kept", |_| panic!("must not unload")).unwrap(), 0);
    assert!(registry.contains("kept"));
    assert_eq!(registry.ref_count("kept"), Some(0));

    let err = registry.release("kept", |_| panic!("must not unload")).unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyReleased(name) if name == "kept"));

    // a fresh acquire picks the entry up again without reloading
    let value = registry.acquire("kept", false, || Ok(99)).unwrap();
    assert_eq!(*value, 1);
}

#[test]
fn releasing_unknown_name_is_an_error() {
    let registry: ReferenceRegistry<u32> = ReferenceRegistry::new();
    let err = registry.release("ghost", |_| {}).unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(name) if name == "ghost"));
}

#[test]
fn failed_load_leaves_no_entry() {
    let registry: ReferenceRegistry<u32> = ReferenceRegistry::new();
    let err = registry
        .acquire("broken", true, || Err(anyhow::anyhow!("disk on fire")))
        .unwrap_err();
    assert!(matches!(err, RegistryError::Load { .. }));
    assert!(!registry.contains("broken"));
    assert!(registry.acquire("", true, || Ok(1)).is_err());
}

#[test]
fn concurrent_acquirers_share_one_load() {
    let registry: Arc<ReferenceRegistry<u32>> = Arc::new(ReferenceRegistry::new());
    let loads = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let loads = Arc::clone(&loads);
            thread::spawn(move || {
                registry
                    .acquire("shared", true, || {
                        loads.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        Ok(42)
                    })
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(*handle.join().unwrap(), 42);
    }

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(registry.ref_count("shared"), Some(8));
}

#[test]
fn ring_queue_is_fifo_and_bounded() {
    let mut queue = RingQueue::new(3);
    assert!(queue.is_empty());
    assert_eq!(queue.peek().unwrap_err(), QueueError::Empty);

    for i in 1..=3 {
        queue.enqueue(i).unwrap();
    }
    assert!(queue.is_full());
    let (err, rejected) = queue.enqueue(4).unwrap_err();
    assert_eq!(err, QueueError::Full { capacity: 3 });
    assert_eq!(rejected, 4);

    assert_eq!(*queue.peek().unwrap(), 1);
    assert_eq!(queue.dequeue().unwrap(), 1);
    queue.enqueue(4).unwrap();
    let drained: Vec<_> = std::iter::from_fn(|| queue.dequeue().ok()).collect();
    assert_eq!(drained, vec![2, 3, 4]);
    assert_eq!(queue.dequeue().unwrap_err(), QueueError::Empty);
    assert_eq!(queue.capacity(), 3);
}

#[test]
fn released_ids_are_handed_out_lowest_first() {
    let mut ids = Identifiers::new();
    for expected in 0..4 {
        assert_eq!(ids.acquire().unwrap(), expected);
    }
    ids.release(2).unwrap();
    ids.release(1).unwrap();
    assert!(!ids.is_in_use(1));
    assert_eq!(ids.live_count(), 2);

    assert_eq!(ids.acquire().unwrap(), 1);
    assert_eq!(ids.acquire().unwrap(), 2);
    assert_eq!(ids.acquire().unwrap(), 4);
    assert_eq!(ids.live_count(), 5);
}

#[test]
fn releasing_a_free_id_fails() {
    let mut ids = Identifiers::new();
    assert_eq!(ids.release(0), Err(IdentifierError::NotInUse(0)));
    let id = ids.acquire().unwrap();
    ids.release(id).unwrap();
    assert_eq!(ids.release(id), Err(IdentifierError::NotInUse(id)));
    assert_eq!(ids.release(1_000), Err(IdentifierError::NotInUse(1_000)));
    assert_eq!(ids.live_count(), 0);
}
