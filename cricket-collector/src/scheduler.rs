//! Fixed-cadence collect-and-submit loop

use crate::config::Config;
use crate::metrics::probe::HostProbe;
use crate::metrics::{Collector, MetricsSnapshot};
use crate::submit::{IngestClient, SubmitError};
use std::sync::Arc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Drives collection and submission cycles, forever.
///
/// The first cycle runs immediately, then one per configured interval measured from
/// when the timer was armed. Cycles run one at a time; a tick that falls due while a
/// cycle is still running is skipped.
pub struct Scheduler<P> {
    config: Arc<Config>,
    collector: Collector<P>,
    client: IngestClient,
}

impl<P: HostProbe> Scheduler<P> {
    pub fn new(config: Arc<Config>, collector: Collector<P>, client: IngestClient) -> Self {
        Self {
            config,
            collector,
            client,
        }
    }

    /// Run cycles until the process is terminated
    pub async fn run(mut self) {
        let mut timer = self.arm_timer();
        info!(
            interval_secs = self.config.collect_interval_secs,
            endpoint = %self.client.url(),
            "Starting collection loop"
        );

        loop {
            timer.tick().await;
            // Outcome is already logged
            let _ = self.run_cycle().await;
        }
    }

    fn arm_timer(&self) -> Interval {
        let mut timer = interval(self.config.collect_interval());
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        timer
    }

    /// One collect-then-submit cycle
    pub async fn run_cycle(&mut self) -> Result<(), SubmitError> {
        let snapshot = self.collector.collect(&self.config).await;
        log_summary(&snapshot);

        match self.client.submit(&snapshot).await {
            Ok(()) => {
                debug!("Metrics submitted");
                Ok(())
            }
            Err(e) => {
                warn!("Error sending metrics: {}", e);
                Err(e)
            }
        }
    }
}

fn log_summary(snapshot: &MetricsSnapshot) {
    let cpu = &snapshot.cpu;
    let mem = &snapshot.memory;
    debug!(
        "Collected metrics: CPU={:.2}%, Memory={:.2}%, Disk={:.2}%",
        cpu.cpu_usage_percent, mem.memory_usage_percent, snapshot.disk.disk_usage_percent
    );
    debug!(
        "Memory details: Used={} bytes ({:.1} GB), Total={} bytes ({:.1} GB), Available={} bytes ({:.1} GB)",
        mem.memory_used_bytes,
        mem.memory_used_bytes as f64 / GIB,
        mem.memory_total_bytes,
        mem.memory_total_bytes as f64 / GIB,
        mem.memory_available_bytes,
        mem.memory_available_bytes as f64 / GIB
    );
    debug!(
        "Swap details: Used={} bytes ({:.1} GB), Total={} bytes ({:.1} GB)",
        mem.swap_used_bytes,
        mem.swap_used_bytes as f64 / GIB,
        mem.swap_total_bytes,
        mem.swap_total_bytes as f64 / GIB
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fake::FakeProbe;
    use crate::metrics::CPU_SAMPLE_WINDOW;
    use std::time::{Duration, Instant};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_url: &str, interval_secs: u64) -> Arc<Config> {
        Arc::new(Config {
            api_url: api_url.to_string(),
            api_key: "test-key".to_string(),
            server_name: "web-01".to_string(),
            collect_interval_secs: interval_secs,
            debug: true,
        })
    }

    fn scheduler(config: Arc<Config>, window: Duration) -> Scheduler<FakeProbe> {
        let client = IngestClient::new(&config).unwrap();
        let collector = Collector::new(FakeProbe::healthy()).with_cpu_window(window);
        Scheduler::new(config, collector, client)
    }

    async fn request_count(server: &MockServer) -> usize {
        server.received_requests().await.map(|r| r.len()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_runs_immediately_then_on_interval() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/metrics/ingest"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let start = Instant::now();
        let handle = tokio::spawn(scheduler(config(&server.uri(), 1), CPU_SAMPLE_WINDOW).run());

        // first submission lands right after the 1s CPU sample
        while request_count(&server).await == 0 {
            assert!(start.elapsed() < Duration::from_millis(1200), "first cycle too slow");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tokio::time::sleep(Duration::from_millis(2500).saturating_sub(start.elapsed())).await;
        assert!(request_count(&server).await >= 2);

        handle.abort();
    }

    #[tokio::test]
    async fn test_failed_cycle_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let mut scheduler = scheduler(config(&server.uri(), 60), Duration::ZERO);

        let first = scheduler.run_cycle().await;
        assert!(matches!(first, Err(SubmitError::Rejected { .. })));
        assert_eq!(request_count(&server).await, 1);

        scheduler.run_cycle().await.unwrap();
        assert_eq!(request_count(&server).await, 2);
    }

    #[tokio::test]
    async fn test_loop_survives_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let handle = tokio::spawn(scheduler(config(&server.uri(), 1), Duration::ZERO).run());
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(!handle.is_finished());
        assert_eq!(request_count(&server).await, 2);
        handle.abort();
    }
}
