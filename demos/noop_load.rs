use std::sync::Arc;
use std::time::Instant;

use log_destination::config::DestinationConfig;
use log_destination::noop::NoopDestination;
use log_destination::{DestinationProxy, DestinationWorker, LogRecord, PipeHost};

#[tokio::main]
async fn main() {
    let config = DestinationConfig {
        channel_buffer: 50_000,
        batch_size: 1_000,
        flush_interval_ms: 200,
        ..DestinationConfig::default()
    }
    .apply_env()
    .expect("valid LOG_DEST_* overrides");

    let host = Arc::new(PipeHost::from_config(&config));
    let proxy = Arc::new(DestinationProxy::with_tracing(NoopDestination::default()));
    let handle = DestinationWorker::spawn(proxy, host, config.worker_config());

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        handle
            .send(LogRecord::new("ERROR", "noop load test error").with_field("iteration", i))
            .await;
    }

    let stats = handle.shutdown().await;
    let elapsed = start.elapsed();
    println!("noop destination: delivered {} records in {:?} (~{:.0} rec/s), stats {:?}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        stats
    );
}
