use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleeps for `duration` unless shutdown is requested first.
///
/// Returns `false` if the wait was interrupted.
pub async fn pause(shutdown: &CancellationToken, duration: Duration) -> bool {
    if shutdown.is_cancelled() {
        return false;
    }
    if duration.is_zero() {
        return true;
    }

    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Picks a wait uniformly from `range`, or `fixed` when no range is set
pub fn wait_duration(fixed: Duration, range: Option<(Duration, Duration)>) -> Duration {
    match range {
        Some((min, max)) if max > min => {
            let ms = rand::rng().random_range(min.as_millis()..=max.as_millis());
            Duration::from_millis(ms as u64)
        }
        Some((min, _)) => min,
        None => fixed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_duration_fixed() {
        assert_eq!(
            wait_duration(Duration::from_secs(60), None),
            Duration::from_secs(60)
        );
        assert_eq!(
            wait_duration(
                Duration::from_secs(60),
                Some((Duration::from_secs(5), Duration::from_secs(5)))
            ),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_wait_duration_jitter_in_range() {
        let range = Some((Duration::from_secs(20), Duration::from_secs(40)));
        for _ in 0..50 {
            let wait = wait_duration(Duration::from_secs(60), range);
            assert!(wait >= Duration::from_secs(20) && wait <= Duration::from_secs(40));
        }
    }

    #[tokio::test]
    async fn test_pause_interrupted() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!pause(&token, Duration::from_secs(3600)).await);
    }

    #[tokio::test]
    async fn test_pause_completes() {
        let token = CancellationToken::new();
        assert!(pause(&token, Duration::from_millis(1)).await);
    }
}
