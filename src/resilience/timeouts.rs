//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap every outbound call (probe, forward, sync push) with a deadline
//! - Turn an expired deadline into `Error::Timeout`
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Callers treat a timeout exactly like a connection error

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

pub async fn with_timeout<F, T>(what: impl Into<String>, after: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            what: what.into(),
            after,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_deadline_is_a_timeout() {
        let result: Result<()> = with_timeout("slow call", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        match result {
            Err(Error::Timeout { what, after }) => {
                assert_eq!(what, "slow call");
                assert_eq!(after, Duration::from_millis(10));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn inner_result_passes_through() {
        let ok = with_timeout("fast", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);
        let err: Result<()> = with_timeout("fast", Duration::from_secs(1), async { Err(Error::NoHealthyBackend) }).await;
        assert!(matches!(err, Err(Error::NoHealthyBackend)));
    }
}
