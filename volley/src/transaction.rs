use std::future::Future;
use std::time::Instant;
use volley_core::Sample;

/// Time a single fallible request and turn it into a [`Sample`].
///
/// `Ok` maps to a successful sample and `Err` to a failed one; the error itself is handed back to
/// the caller rather than propagated through the engine.
///
/// # Example
/// ```no_run
/// use volley::prelude::*;
///
/// async fn my_scenario(_vu: VirtualUser) -> Vec<Sample> {
///     let (sample, _res) = transaction(async { Ok::<_, std::io::Error>(()) }).await;
///     vec![sample]
/// }
/// ```
pub async fn transaction<T, R, E>(func: T) -> (Sample, Result<R, E>)
where
    T: Future<Output = Result<R, E>>,
{
    let start = Instant::now();
    let res = func.await;
    let elapsed = start.elapsed();

    let sample = if res.is_ok() {
        Sample::success(elapsed)
    } else {
        Sample::failure(elapsed)
    };

    (sample, res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn ok_is_success() {
        let (sample, res) = transaction(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, ()>(7)
        })
        .await;

        assert!(sample.is_success());
        assert!(sample.latency >= Duration::from_millis(20));
        assert_eq!(res, Ok(7));
    }

    #[tokio::test]
    async fn err_is_failure() {
        let (sample, res) = transaction(async { Err::<(), _>("boom") }).await;
        assert!(!sample.is_success());
        assert_eq!(res, Err("boom"));
    }
}
