#![allow(dead_code)]

use async_trait::async_trait;
use log_destination::{BoxError, InsertResult, LogDestination, LogRecord, RecordDestination};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

#[derive(Clone, Copy, Debug)]
pub enum FaultMode {
    Error,
    Panic,
}

/// Every operation faults, either by returning `Err` or by panicking.
pub struct AlwaysFaulty(pub FaultMode);

impl AlwaysFaulty {
    fn fault<T>(&self, op: &str) -> Result<T, BoxError> {
        match self.0 {
            FaultMode::Error => Err(format!("{} failed", op).into()),
            FaultMode::Panic => panic!("{} panicked", op),
        }
    }
}

#[async_trait]
impl LogDestination for AlwaysFaulty {
    async fn open(&self) -> Result<bool, BoxError> {
        self.fault("open")
    }

    async fn close(&self) -> Result<(), BoxError> {
        self.fault("close")
    }

    fn is_opened(&self) -> Result<bool, BoxError> {
        self.fault("is_opened")
    }

    fn name_by_unique_options(&self) -> Result<String, BoxError> {
        self.fault("name_by_unique_options")
    }

    async fn on_queue_empty(&self) -> Result<(), BoxError> {
        self.fault("on_queue_empty")
    }

    async fn flush(&self) -> Result<InsertResult, BoxError> {
        self.fault("flush")
    }
}

#[async_trait]
impl RecordDestination for AlwaysFaulty {
    async fn send(&self, _record: &LogRecord) -> Result<InsertResult, BoxError> {
        self.fault("send")
    }
}

/// Well-behaved destination with scripted answers and call counters.
pub struct Scripted {
    send_results: Mutex<VecDeque<InsertResult>>,
    default_send: InsertResult,
    flush_results: Mutex<VecDeque<InsertResult>>,
    flush_result: InsertResult,
    panic_on_send: bool,
    pub accept_open: AtomicBool,
    pub opened: AtomicBool,
    pub opens: AtomicU32,
    pub closes: AtomicU32,
    pub sends: AtomicU32,
    pub flushes: AtomicU32,
    pub queue_empty: AtomicU32,
}

impl Scripted {
    pub fn new(default_send: InsertResult) -> Self {
        Scripted {
            send_results: Mutex::new(VecDeque::new()),
            default_send,
            flush_results: Mutex::new(VecDeque::new()),
            flush_result: InsertResult::Success,
            panic_on_send: false,
            accept_open: AtomicBool::new(true),
            opened: AtomicBool::new(false),
            opens: AtomicU32::new(0),
            closes: AtomicU32::new(0),
            sends: AtomicU32::new(0),
            flushes: AtomicU32::new(0),
            queue_empty: AtomicU32::new(0),
        }
    }

    /// Answers used for the first sends, before falling back to the default.
    pub fn with_sends(self, results: Vec<InsertResult>) -> Self {
        *self.send_results.lock().unwrap() = results.into();
        self
    }

    pub fn with_flush(mut self, result: InsertResult) -> Self {
        self.flush_result = result;
        self
    }

    /// Answers used for the first flushes, before falling back to the default.
    pub fn with_flushes(self, results: Vec<InsertResult>) -> Self {
        *self.flush_results.lock().unwrap() = results.into();
        self
    }

    pub fn panicking_send(mut self) -> Self {
        self.panic_on_send = true;
        self
    }

    pub fn refusing_open(self) -> Self {
        self.accept_open.store(false, Ordering::SeqCst);
        self
    }

    pub fn count(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogDestination for Scripted {
    async fn open(&self) -> Result<bool, BoxError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let ok = self.accept_open.load(Ordering::SeqCst);
        self.opened.store(ok, Ordering::SeqCst);
        Ok(ok)
    }

    async fn close(&self) -> Result<(), BoxError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.opened.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_opened(&self) -> Result<bool, BoxError> {
        Ok(self.opened.load(Ordering::SeqCst))
    }

    fn name_by_unique_options(&self) -> Result<String, BoxError> {
        Ok("scripted".to_string())
    }

    async fn on_queue_empty(&self) -> Result<(), BoxError> {
        self.queue_empty.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn flush(&self) -> Result<InsertResult, BoxError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        let scripted = self.flush_results.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or(self.flush_result))
    }
}

#[async_trait]
impl RecordDestination for Scripted {
    async fn send(&self, _record: &LogRecord) -> Result<InsertResult, BoxError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_send {
            panic!("send exploded");
        }
        let scripted = self.send_results.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or(self.default_send))
    }
}
