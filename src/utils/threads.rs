use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// 以给定的并发上限执行一组future，结果按输入顺序返回（而非完成顺序）
pub async fn do_parallel_with_limit<F, T>(futures: Vec<F>, max_concurrent: usize) -> Vec<T>
where
    F: Future<Output = T>,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

    let guarded = futures.into_iter().map(|future| {
        let semaphore = Arc::clone(&semaphore);
        async move {
            // 信号量不会被关闭，acquire只会在关闭时失败
            let _permit = semaphore.acquire().await.ok();
            future.await
        }
    });

    join_all(guarded).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let futures: Vec<_> = (0..5u64)
            .map(|i| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(50 - i * 10)).await;
                    i
                })
            })
            .collect();

        let results = do_parallel_with_limit(futures, 3).await;
        assert_eq!(results, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let futures: Vec<_> = (0..8)
            .map(|_| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                Box::pin(async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        do_parallel_with_limit(futures, 2).await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_zero_limit_is_treated_as_one() {
        let futures: Vec<_> = (0..3).map(|i| Box::pin(async move { i * 2 })).collect();
        assert_eq!(do_parallel_with_limit(futures, 0).await, vec![0, 2, 4]);
    }
}
