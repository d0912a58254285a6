//! Retry policy behaviour observed through the public API

use lighter_data::{ExecutionContext, RetryError, RetryPolicy};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_always_failing_operation_waits_within_bounds() {
    let policy = RetryPolicy::new(3, Duration::from_millis(10));
    let calls = AtomicU32::new(0);

    let started = Instant::now();
    let result: Result<(), RetryError<String>> = policy
        .execute(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(format!("failure {}", n)) }
        })
        .await;
    let elapsed = started.elapsed();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    match result {
        Err(RetryError::Exhausted { attempts, last }) => {
            assert_eq!(attempts, 3);
            assert_eq!(last, "failure 3");
        }
        other => panic!("Expected exhausted retries, got {:?}", other),
    }

    // 10ms * (2^2 - 1)
    assert!(elapsed >= Duration::from_millis(30));
    assert_eq!(policy.max_total_wait(), Duration::from_millis(30));
    assert!(elapsed < policy.max_total_wait() + Duration::from_secs(1));
}

#[tokio::test]
async fn test_two_failures_then_success() {
    let policy = RetryPolicy::new(3, Duration::from_millis(1));
    let calls = AtomicU32::new(0);

    let result = policy
        .execute(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err("transient")
                } else {
                    Ok(n)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_shared_policy_across_tasks() {
    let policy = Arc::new(RetryPolicy::new(2, Duration::from_millis(1)));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let policy = Arc::clone(&policy);
            tokio::spawn(async move {
                let calls = AtomicU32::new(0);
                let result: Result<u32, RetryError<&str>> = policy
                    .execute(|| {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        async move { if n == 0 { Err("first") } else { Ok(i) } }
                    })
                    .await;
                (result.unwrap(), calls.load(Ordering::SeqCst))
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let (value, calls) = handle.await.unwrap();
        assert_eq!(value, i as u32);
        assert_eq!(calls, 2);
    }
}

#[tokio::test]
async fn test_deadline_interrupts_backoff() {
    let policy = RetryPolicy::new(5, Duration::from_secs(10));
    let ctx = ExecutionContext::background().with_timeout(Duration::from_millis(50));

    let result: Result<(), RetryError<&str>> = policy
        .execute_with(&ctx, || async { Err("down") })
        .await;

    match result {
        Err(err @ RetryError::Interrupted { .. }) => {
            assert_eq!(err.attempts(), 1);
            assert_eq!(err.last_error(), Some(&"down"));
        }
        other => panic!("Expected interruption, got {:?}", other),
    }
}
