use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log_destination::{
    init::init_tracing, BoxError, DestinationProxy, DestinationWorker, InsertResult,
    LogDestination, LogRecord, PipeHost, RecordDestination, TemplateSettings, WorkerConfig,
};

/// Example of integrating a completely custom destination by implementing
/// the contract directly. Imagine this talks to some proprietary store that
/// falls over every now and then; the proxy keeps the pipeline alive and
/// reports each fault.
struct FlakyStore {
    opened: AtomicBool,
    writes: AtomicU64,
}

#[async_trait]
impl LogDestination for FlakyStore {
    async fn open(&self) -> Result<bool, BoxError> {
        self.opened.store(true, Ordering::Relaxed);
        Ok(true)
    }

    async fn close(&self) -> Result<(), BoxError> {
        self.opened.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn is_opened(&self) -> Result<bool, BoxError> {
        Ok(self.opened.load(Ordering::Relaxed))
    }

    fn name_by_unique_options(&self) -> Result<String, BoxError> {
        Ok("flaky-store,demo".to_string())
    }
}

#[async_trait]
impl RecordDestination for FlakyStore {
    async fn send(&self, record: &LogRecord) -> Result<InsertResult, BoxError> {
        let n = self.writes.fetch_add(1, Ordering::Relaxed);
        if n % 4 == 3 {
            panic!("store client crashed on write {}", n);
        }
        println!("[flaky-store] {:?}", record.message);
        Ok(InsertResult::Success)
    }
}

#[tokio::main]
async fn main() {
    init_tracing().expect("install tracing subscriber");

    let store = FlakyStore {
        opened: AtomicBool::new(false),
        writes: AtomicU64::new(0),
    };
    let proxy = Arc::new(DestinationProxy::with_tracing(store));
    let host = Arc::new(PipeHost::new(BTreeMap::new(), Arc::new(TemplateSettings::default())));

    let handle = DestinationWorker::spawn(proxy, host, WorkerConfig::default());
    for i in 0..8 {
        handle
            .send(LogRecord::new("ERROR", format!("simulated error {}", i)).with_field("i", i))
            .await;
    }

    let stats = handle.shutdown().await;
    println!("final stats: {:?}", stats);
}
