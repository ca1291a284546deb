use std::{future::Future, time::Instant};

/// Await `fut` and log how long it took under the `stage` name.
pub async fn timed<F, T>(stage: &'static str, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    tracing::info!(
        stage,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "stage finished"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_inner_output() {
        assert_eq!(timed("noop", async { 7 }).await, 7);
        let failed: Result<(), &str> = timed("fail", async { Err("boom") }).await;
        assert_eq!(failed, Err("boom"));
    }
}
