//! Queue integration tests: concurrent producers, one async consumer

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mytunnel_collections::{BoundedQueue, BufferPool};

const PRODUCERS: usize = 4;
const PER_PRODUCER: usize = 5_000;

/// Every successfully added item is drained exactly once
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_loss_no_duplication() {
    let queue = Arc::new(BoundedQueue::with_batch_threshold(32, 8).unwrap());
    let accepted = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let queue = queue.clone();
            let accepted = accepted.clone();
            std::thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    let mut item = Box::new((producer, seq));
                    while let Err(rejected) = queue.try_add(item) {
                        item = rejected;
                        std::thread::yield_now();
                    }
                    accepted.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    let mut seen = HashSet::new();
    let mut batch = Vec::new();
    while seen.len() < PRODUCERS * PER_PRODUCER {
        if !queue.try_wait_for_batch(Duration::from_millis(5)).await {
            queue.try_wait_for_items(Duration::from_millis(5)).await;
        }

        batch.clear();
        queue.drain_into(&mut batch, 32);
        assert!(queue.len() <= queue.capacity());
        for item in batch.drain(..) {
            assert!(seen.insert(*item), "duplicate item {:?}", item);
        }
    }

    for producer in producers {
        producer.join().unwrap();
    }

    assert_eq!(accepted.load(Ordering::Relaxed), PRODUCERS * PER_PRODUCER);
    assert!(queue.is_empty());
    for producer in 0..PRODUCERS {
        for seq in 0..PER_PRODUCER {
            assert!(seen.contains(&(producer, seq)));
        }
    }
}

/// Drained order follows slot-claim order, so each producer's items stay ordered
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fifo_per_producer_with_async_consumer() {
    let queue = Arc::new(BoundedQueue::new(16));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let queue = queue.clone();
            tokio::task::spawn_blocking(move || {
                for seq in 0..PER_PRODUCER {
                    let mut item = Arc::new((producer, seq));
                    while let Err(rejected) = queue.try_add(item) {
                        item = rejected;
                        std::thread::yield_now();
                    }
                }
            })
        })
        .collect();

    let mut next = vec![0usize; PRODUCERS];
    let mut buffer = vec![None; 16];
    let mut total = 0;
    while total < PRODUCERS * PER_PRODUCER {
        queue.wait_for_items().await;

        let drained = queue.drain(&mut buffer, 0, 16);
        for slot in buffer[..drained].iter_mut() {
            let (producer, seq) = *slot.take().unwrap();
            assert_eq!(seq, next[producer], "producer {producer} out of order");
            next[producer] += 1;
        }
        total += drained;
    }

    for producer in producers {
        producer.await.unwrap();
    }
    assert!(next.iter().all(|&count| count == PER_PRODUCER));
}

/// A batch wait only reports success once the threshold was reached
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_batch_wait_sees_threshold() {
    let queue = Arc::new(BoundedQueue::with_batch_threshold(64, 10).unwrap());

    let producer = {
        let queue = queue.clone();
        tokio::spawn(async move {
            for i in 0..10u32 {
                queue.try_add(Box::new(i)).unwrap();
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    };

    assert!(queue.try_wait_for_batch(Duration::from_secs(10)).await);
    assert!(queue.len() >= 10);
    producer.await.unwrap();

    let mut out = Vec::new();
    assert_eq!(queue.drain_into(&mut out, 64), 10);
    assert_eq!(out.into_iter().map(|item| *item).collect::<Vec<_>>(), (0..10).collect::<Vec<_>>());
}

/// Pooled buffers travel through the queue and back into the pool
#[tokio::test]
async fn test_pooled_buffers_round_trip_through_queue() {
    let pool = BufferPool::new(4096, 8);
    let queue = BoundedQueue::new(8);

    for i in 0..8u8 {
        let mut payload = pool.rent(100);
        payload[0] = i;
        queue.try_add(payload).unwrap();
    }
    assert_eq!(pool.rented(), 8 * 128);
    assert!(queue.try_wait_for_batch(Duration::from_millis(1)).await);

    let mut out = Vec::new();
    queue.drain_into(&mut out, 8);
    for (i, payload) in out.into_iter().enumerate() {
        assert_eq!(payload[0], i as u8);
        assert!(pool.return_buffer(payload).unwrap());
    }

    assert_eq!(pool.rented(), 0);
    assert_eq!(pool.stats().buckets[3].stored, 8);
}
