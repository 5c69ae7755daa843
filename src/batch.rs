use crate::errors::AppError;
use crate::models::BatchRun;
use std::future::Future;
use std::time::Duration;

/// Runs one bounded batch pass: at most `max_count` items from the eligible
/// set, strictly sequentially, with a fixed pause after each item.
///
/// Sequential on purpose: the external service enforces a per-key rate
/// limit, so concurrency would only trade wall-clock time for 429s. The only
/// suspension points are the pacing sleeps and whatever `step` awaits.
///
/// `processed` counts every attempted item - the per-record pipeline already
/// degrades stage failures internally, so an `Err` escaping `step` is an
/// unexpected per-record failure. Those increment `errors` and the run
/// continues; one bad record never aborts the batch. The run is not
/// resumable: a later invocation recomputes eligibility from current state,
/// which retries whatever this run didn't reach.
pub async fn run_batch<T, F, Fut>(
    eligible: Vec<T>,
    max_count: usize,
    inter_item_delay: Duration,
    mut step: F,
) -> BatchRun
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<(), AppError>>,
{
    let total = eligible.len();
    let mut processed = 0;
    let mut errors = 0;

    for item in eligible.into_iter().take(max_count) {
        processed += 1;
        if let Err(e) = step(item).await {
            errors += 1;
            tracing::error!("Batch item {} failed: {}", processed, e);
        }

        // External rate-limit pacing
        if !inter_item_delay.is_zero() {
            tokio::time::sleep(inter_item_delay).await;
        }
    }

    BatchRun {
        processed,
        errors,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn caps_at_max_count_and_reports_total_eligible() {
        let items: Vec<usize> = (0..25).collect();
        let run = run_batch(items, 20, Duration::ZERO, |_| async { Ok(()) }).await;
        assert_eq!(
            run,
            BatchRun {
                processed: 20,
                errors: 0,
                total: 25
            }
        );
    }

    #[tokio::test]
    async fn errors_are_counted_but_do_not_abort() {
        let items: Vec<usize> = (0..25).collect();
        let run = run_batch(items, 20, Duration::ZERO, |i| async move {
            // Items 5, 6, 7 blow up past the per-record isolation
            if (5..8).contains(&i) {
                Err(AppError::Internal(format!("record {} broke", i)))
            } else {
                Ok(())
            }
        })
        .await;

        assert_eq!(run.processed, 20);
        assert_eq!(run.errors, 3);
        assert_eq!(run.total, 25);
    }

    #[tokio::test]
    async fn pacing_delay_runs_after_every_item() {
        let items = vec![1, 2, 3];
        let started = std::time::Instant::now();
        let run = run_batch(items, 10, Duration::from_millis(30), |_| async { Ok(()) }).await;
        assert_eq!(run.processed, 3);
        assert!(started.elapsed() >= Duration::from_millis(90));
    }
}
