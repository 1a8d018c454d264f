//! Where raw metric frames come from. The collector itself only knows how
//! to batch and publish frames at a fixed cadence; sourcing a frame is an
//! external collaborator boundary, contracted behind [`MetricSource`].

use async_trait::async_trait;

/// Produces one `d`-dimensional, `[0, 1]`-normalized utilization frame per
/// call. Implementations decide what `d` means (e.g. CPU, RAM) and how the
/// raw numbers get normalized.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Number of dimensions each frame carries.
    fn dims(&self) -> usize;

    /// Sample the current frame.
    async fn sample(&self) -> Vec<f64>;
}

/// Synthetic source driven by a caller-supplied generator closure, used by
/// `--informer=static` and by integration tests that want deterministic or
/// scripted load curves without a real cgroup/`/proc` reader.
pub struct StaticMetricSource<F> {
    dims: usize,
    generator: parking_lot::Mutex<F>,
}

impl<F> StaticMetricSource<F>
where
    F: FnMut() -> Vec<f64> + Send,
{
    pub fn new(dims: usize, generator: F) -> Self {
        Self {
            dims,
            generator: parking_lot::Mutex::new(generator),
        }
    }
}

#[async_trait]
impl<F> MetricSource for StaticMetricSource<F>
where
    F: FnMut() -> Vec<f64> + Send,
{
    fn dims(&self) -> usize {
        self.dims
    }

    async fn sample(&self) -> Vec<f64> {
        (self.generator.lock())()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_source_reports_its_configured_dims() {
        let source = StaticMetricSource::new(2, || vec![0.1, 0.2]);
        assert_eq!(source.dims(), 2);
        assert_eq!(source.sample().await, vec![0.1, 0.2]);
    }
}
