//! Process-wide rented-byte accounting
//!
//! Kept in its own test binary so no other test touches the global counter.

use mytunnel_collections::BufferPool;

#[test]
fn test_global_and_instance_counters() {
    let initial = BufferPool::rented_total();
    let first = BufferPool::new(1024 * 1024, 4);
    let second = BufferPool::new(1024 * 1024, 4);

    let a = first.rent(100);
    let b = second.rent(1000);
    let oversized = second.rent(2 * 1024 * 1024);
    let empty = first.rent(0);

    assert_eq!(first.rented(), 128);
    assert_eq!(second.rented(), 1024 + 2 * 1024 * 1024);
    assert_eq!(BufferPool::rented_total(), initial + 128 + 1024 + 2 * 1024 * 1024);

    assert!(first.return_buffer(a).unwrap());
    assert!(second.return_buffer(b).unwrap());
    assert!(!second.return_buffer(oversized).unwrap());
    assert!(!first.return_buffer(empty).unwrap());

    // The oversized buffer could not be pooled and stays counted.
    assert_eq!(first.rented(), 0);
    assert_eq!(second.rented(), 2 * 1024 * 1024);
    assert_eq!(BufferPool::rented_total(), initial + 2 * 1024 * 1024);

    let shared = BufferPool::shared();
    let scoped = shared.rent_scoped(16);
    assert_eq!(shared.rented(), 16);
    drop(scoped);
    assert_eq!(shared.rented(), 0);
    assert_eq!(BufferPool::rented_total(), initial + 2 * 1024 * 1024);
}
