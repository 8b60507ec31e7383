use crate::destination::RecordDestination;
use crate::host::{DestinationHost, PipeHost};
use crate::proxy::DestinationProxy;
use crate::record::LogRecord;
use crate::result::{HostAction, InsertResult};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

/// Settings for a [`DestinationWorker`].
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Capacity of the inbound channel.
    pub channel_buffer: usize,
    /// Maximum time a partial batch waits before it is flushed.
    pub flush_interval: Duration,
    /// Failed attempts after which a message (or a pending batch) is dropped.
    pub retries: u32,
    /// First delay after a failed open or delivery; doubles on every failure.
    pub reopen_backoff: Duration,
    /// Upper bound for the delay.
    pub max_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            flush_interval: Duration::from_secs(1),
            retries: 3,
            reopen_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl WorkerConfig {
    // Enforce minimal thresholds to avoid degenerate configs.
    fn normalized(mut self) -> Self {
        self.channel_buffer = self.channel_buffer.max(1);
        self.flush_interval = self.flush_interval.max(Duration::from_millis(10));
        self.retries = self.retries.max(1);
        self.reopen_backoff = self.reopen_backoff.max(Duration::from_millis(1));
        self.max_backoff = self.max_backoff.max(self.reopen_backoff);
        self
    }
}

/// Counters maintained by a running worker.
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Records taken off the channel.
    pub received: AtomicU64,
    /// Records rejected by [`WorkerHandle::try_send`] because the channel was full.
    pub rejected: AtomicU64,
    /// Records whose delivery was confirmed.
    pub acked: AtomicU64,
    /// Records dropped by the destination or after exhausting retries.
    pub dropped: AtomicU64,
    /// Records whose acknowledgement the destination took over.
    pub handed_off: AtomicU64,
    /// Delivery or flush attempts that ended in `Error` or `NotConnected`.
    pub failed_attempts: AtomicU64,
    /// `open` calls that did not make the destination usable.
    pub failed_opens: AtomicU64,
    /// Records still held by the destination when the worker stopped.
    pub unconfirmed: AtomicU64,
}

/// Point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStatsSnapshot {
    pub received: u64,
    pub rejected: u64,
    pub acked: u64,
    pub dropped: u64,
    pub handed_off: u64,
    pub failed_attempts: u64,
    pub failed_opens: u64,
    pub unconfirmed: u64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            handed_off: self.handed_off.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            failed_opens: self.failed_opens.load(Ordering::Relaxed),
            unconfirmed: self.unconfirmed.load(Ordering::Relaxed),
        }
    }
}

/// Producer side of a running [`DestinationWorker`].
pub struct WorkerHandle {
    sender: mpsc::Sender<LogRecord>,
    stats: Arc<WorkerStats>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Queue a record, waiting for channel capacity.
    ///
    /// Returns `false` if the worker has stopped.
    pub async fn send(&self, record: LogRecord) -> bool {
        self.sender.send(record).await.is_ok()
    }

    /// Queue a record without waiting. A full channel rejects the record.
    pub fn try_send(&self, record: LogRecord) -> bool {
        match self.sender.try_send(record) {
            Ok(()) => true,
            Err(_) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Close the channel, let the worker deliver what is queued, flush and
    /// close the destination, and return the final counters.
    pub async fn shutdown(self) -> WorkerStatsSnapshot {
        let WorkerHandle { sender, stats, join } = self;
        drop(sender);
        if let Err(e) = join.await {
            tracing::error!(error = %e, "destination worker task failed");
        }
        stats.snapshot()
    }
}

/// Drives one destination through its proxy on a dedicated task.
///
/// The worker is the host side of the contract: it opens the destination
/// (and reopens it with exponential backoff after failures or faults),
/// delivers records one at a time, applies the [`HostAction`] of every
/// [`InsertResult`], flushes when the batch reaches the host batch size or
/// the flush interval elapses, calls `on_queue_empty` whenever the channel
/// drains, and closes the destination on shutdown.
pub struct DestinationWorker<D> {
    proxy: Arc<DestinationProxy<D>>,
    host: Arc<PipeHost>,
    config: WorkerConfig,
    stats: Arc<WorkerStats>,
    /// Records answered with `Queued` and not yet confirmed by a flush. Kept
    /// so a failed flush can hand them to the destination again.
    pending: Vec<LogRecord>,
    /// Records delivered since the last flush.
    in_batch: usize,
    backoff: Duration,
}

impl<D: RecordDestination + 'static> DestinationWorker<D> {
    /// Spawn a worker task for `proxy`, bound to `host`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        proxy: Arc<DestinationProxy<D>>,
        host: Arc<PipeHost>,
        config: WorkerConfig,
    ) -> WorkerHandle {
        let config = config.normalized();
        let (tx, rx) = mpsc::channel::<LogRecord>(config.channel_buffer);
        let stats = Arc::new(WorkerStats::default());

        let worker = DestinationWorker {
            proxy,
            host,
            backoff: config.reopen_backoff,
            config,
            stats: Arc::clone(&stats),
            pending: Vec::new(),
            in_batch: 0,
        };
        let join = tokio::spawn(worker.run(rx));

        WorkerHandle {
            sender: tx,
            stats,
            join,
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<LogRecord>) {
        let name = self
            .proxy
            .name_by_unique_options()
            .unwrap_or_else(|| "<unnamed>".to_string());
        tracing::info!(destination = %name, "destination worker started");

        let mut ticker = interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(record) => {
                        self.deliver(record).await;
                        self.drain(&mut rx).await;
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if self.in_batch > 0 || !self.pending.is_empty() {
                        self.flush().await;
                    }
                }
            }
        }

        if self.in_batch > 0 || !self.pending.is_empty() {
            self.flush().await;
        }
        if !self.pending.is_empty() {
            tracing::warn!(
                destination = %name,
                pending = self.pending.len(),
                "closing with records the destination never confirmed"
            );
            let unconfirmed = self.take_pending();
            self.stats.unconfirmed.fetch_add(unconfirmed, Ordering::Relaxed);
        }
        self.proxy.close().await;
        tracing::info!(
            destination = %name,
            stats = ?self.stats.snapshot(),
            "destination worker stopped"
        );
    }

    /// Deliver whatever is already queued, then tell the destination the
    /// queue is empty.
    async fn drain(&mut self, rx: &mut mpsc::Receiver<LogRecord>) {
        loop {
            match rx.try_recv() {
                Ok(record) => self.deliver(record).await,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => {
                    self.proxy.on_queue_empty().await;
                    return;
                }
            }
        }
    }

    async fn deliver(&mut self, record: LogRecord) {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        let seq_num = self.host.advance_seq_num();
        let mut attempts = 0;

        loop {
            if !self.ensure_open().await {
                attempts += 1;
                if attempts >= self.config.retries {
                    self.give_up_on_record(seq_num, attempts);
                    return;
                }
                continue;
            }

            let result = self.proxy.send(&record).await;
            match result.host_action() {
                HostAction::Ack => {
                    self.stats.acked.fetch_add(1, Ordering::Relaxed);
                    self.in_batch += 1;
                }
                HostAction::HoldAck => {
                    self.pending.push(record);
                    self.in_batch += 1;
                }
                HostAction::DeferAck => {
                    self.stats.handed_off.fetch_add(1, Ordering::Relaxed);
                }
                HostAction::Advance => {
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                }
                HostAction::Retry | HostAction::RetryAfterReconnect => {
                    attempts += 1;
                    self.stats.failed_attempts.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(seq_num, attempts, result = %result, "delivery attempt failed");
                    if attempts >= self.config.retries {
                        self.give_up_on_record(seq_num, attempts);
                        return;
                    }
                    self.retry_delay(result).await;
                    continue;
                }
            }

            self.backoff = self.config.reopen_backoff;
            if self.in_batch >= self.host.batch_size() {
                self.flush().await;
            }
            return;
        }
    }

    /// Flush the destination and settle the pending records by its answer.
    ///
    /// After a failed flush the destination no longer holds the batch, so the
    /// pending records are sent again before the next attempt. Once `retries`
    /// attempts have failed the batch is dropped here and nowhere else.
    async fn flush(&mut self) {
        let mut attempts = 0;

        loop {
            let result = self.proxy.flush().await;
            match result.host_action() {
                HostAction::Ack => {
                    let settled = self.take_pending();
                    self.stats.acked.fetch_add(settled, Ordering::Relaxed);
                }
                // still buffered on the destination side
                HostAction::HoldAck => {}
                HostAction::DeferAck => {
                    let settled = self.take_pending();
                    self.stats.handed_off.fetch_add(settled, Ordering::Relaxed);
                }
                HostAction::Advance => {
                    let settled = self.take_pending();
                    self.stats.dropped.fetch_add(settled, Ordering::Relaxed);
                }
                HostAction::Retry | HostAction::RetryAfterReconnect => {
                    attempts += 1;
                    self.stats.failed_attempts.fetch_add(1, Ordering::Relaxed);
                    if attempts >= self.config.retries {
                        self.drop_pending(attempts, result);
                        return;
                    }
                    self.retry_delay(result).await;

                    while !self.resend_pending().await {
                        attempts += 1;
                        if attempts >= self.config.retries {
                            self.drop_pending(attempts, result);
                            return;
                        }
                    }
                    continue;
                }
            }

            self.in_batch = 0;
            self.backoff = self.config.reopen_backoff;
            return;
        }
    }

    /// Hand the pending records to the destination again after a failed
    /// flush. Returns `false` if the destination could not take all of them;
    /// the ones it did not settle stay pending.
    async fn resend_pending(&mut self) -> bool {
        if !self.ensure_open().await {
            return false;
        }

        let mut records = std::mem::take(&mut self.pending).into_iter();
        while let Some(record) = records.next() {
            let result = self.proxy.send(&record).await;
            match result.host_action() {
                HostAction::Ack => {
                    self.stats.acked.fetch_add(1, Ordering::Relaxed);
                }
                HostAction::HoldAck => self.pending.push(record),
                HostAction::DeferAck => {
                    self.stats.handed_off.fetch_add(1, Ordering::Relaxed);
                }
                HostAction::Advance => {
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                }
                HostAction::Retry | HostAction::RetryAfterReconnect => {
                    self.stats.failed_attempts.fetch_add(1, Ordering::Relaxed);
                    self.pending.push(record);
                    self.pending.extend(records);
                    self.retry_delay(result).await;
                    return false;
                }
            }
        }
        true
    }

    fn take_pending(&mut self) -> u64 {
        let count = self.pending.len() as u64;
        self.pending.clear();
        count
    }

    fn drop_pending(&mut self, attempts: u32, result: InsertResult) {
        tracing::warn!(
            pending = self.pending.len(),
            attempts,
            result = %result,
            "dropping pending batch after failed flush attempts"
        );
        let dropped = self.take_pending();
        self.stats.dropped.fetch_add(dropped, Ordering::Relaxed);
        self.in_batch = 0;
    }

    /// Open the destination if it is not usable. On failure waits out the
    /// current backoff before returning `false`.
    async fn ensure_open(&mut self) -> bool {
        if self.proxy.is_opened() {
            return true;
        }
        if self.proxy.open().await {
            tracing::info!(destination = ?self.proxy.identity(), "destination opened");
            self.backoff = self.config.reopen_backoff;
            return true;
        }

        self.stats.failed_opens.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            destination = ?self.proxy.identity(),
            backoff = ?self.backoff,
            "destination could not be opened"
        );
        self.sleep_backoff().await;
        false
    }

    async fn retry_delay(&mut self, result: InsertResult) {
        if result == InsertResult::NotConnected {
            self.proxy.close().await;
        }
        self.sleep_backoff().await;
    }

    async fn sleep_backoff(&mut self) {
        sleep(self.backoff).await;
        self.backoff = std::cmp::min(self.backoff * 2, self.config.max_backoff);
    }

    fn give_up_on_record(&self, seq_num: u64, attempts: u32) {
        tracing::warn!(seq_num, attempts, "dropping record after failed delivery attempts");
        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_config_is_raised_to_minimums() {
        let config = WorkerConfig {
            channel_buffer: 0,
            flush_interval: Duration::ZERO,
            retries: 0,
            reopen_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
        .normalized();

        assert_eq!(config.channel_buffer, 1);
        assert_eq!(config.flush_interval, Duration::from_millis(10));
        assert_eq!(config.retries, 1);
        assert_eq!(config.reopen_backoff, Duration::from_millis(1));
        assert_eq!(config.max_backoff, Duration::from_millis(1));
    }
}
