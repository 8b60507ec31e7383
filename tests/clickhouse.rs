#![cfg(feature = "clickhouse")]

use log_destination::clickhouse::ClickHouseDestination;
use log_destination::{
    DestinationHost, DestinationProxy, DestinationWorker, InsertResult, LogDestination, LogRecord,
    PipeHost, RecordDestination, TemplateSettings, WorkerConfig,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Minimal HTTP server that answers `/ping` with 200 and every insert with
/// `insert_status`. Records the number of rows in each insert body.
struct StubServer {
    url: String,
    inserts: Arc<Mutex<Vec<usize>>>,
}

impl StubServer {
    async fn start(insert_status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let inserts = Arc::new(Mutex::new(Vec::new()));

        let seen = inserts.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, insert_status, seen.clone()));
            }
        });

        StubServer { url, inserts }
    }

    fn inserts(&self) -> Vec<usize> {
        self.inserts.lock().unwrap().clone()
    }
}

async fn serve(stream: TcpStream, insert_status: u16, inserts: Arc<Mutex<Vec<usize>>>) {
    let mut reader = BufReader::new(stream);
    loop {
        let mut request_line = String::new();
        match reader.read_line(&mut request_line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }

        let mut content_length = 0;
        loop {
            let mut header = String::new();
            match reader.read_line(&mut header).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            let header = header.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
        }

        let mut body = vec![0; content_length];
        if reader.read_exact(&mut body).await.is_err() {
            return;
        }

        let (status, text) = if request_line.starts_with("GET /ping") {
            (200, "Ok.\n")
        } else {
            let rows = body.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count();
            inserts.lock().unwrap().push(rows);
            (insert_status, "Code: 60. DB::Exception: Table default.logs does not exist.\n")
        };
        let response = format!(
            "HTTP/1.1 {} Stub\r\ncontent-type: text/plain\r\ncontent-length: {}\r\n\r\n{}",
            status,
            text.len(),
            text
        );
        if reader.get_mut().write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

fn host_for(url: &str) -> Arc<PipeHost> {
    let mut options = BTreeMap::new();
    options.insert("url".to_string(), url.to_string());
    Arc::new(PipeHost::new(options, Arc::new(TemplateSettings::default())))
}

#[tokio::test]
async fn rejected_insert_does_not_keep_rows() {
    let server = StubServer::start(500).await;
    let dest = ClickHouseDestination::new(host_for(&server.url)).unwrap();

    assert!(dest.open().await.unwrap());
    let record = LogRecord::new("ERROR", "boom");
    assert_eq!(dest.send(&record).await.unwrap(), InsertResult::Queued);
    assert_eq!(dest.send(&record).await.unwrap(), InsertResult::Queued);

    assert_eq!(dest.flush().await.unwrap(), InsertResult::Error);
    assert_eq!(dest.buffered().await, 0);

    // a second failure posts nothing stale
    assert_eq!(dest.send(&record).await.unwrap(), InsertResult::Queued);
    assert_eq!(dest.flush().await.unwrap(), InsertResult::Error);
    assert_eq!(server.inserts(), vec![2, 1]);
}

#[tokio::test]
async fn worker_drops_a_rejected_batch_without_growing_the_buffer() {
    let server = StubServer::start(500).await;
    let host = host_for(&server.url);
    host.set_batch_size(2);
    let dest = ClickHouseDestination::new(host.clone()).unwrap();
    let proxy = Arc::new(DestinationProxy::with_tracing(dest));

    let config = WorkerConfig {
        channel_buffer: 16,
        flush_interval: Duration::from_secs(60),
        retries: 3,
        reopen_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
    };
    let handle = DestinationWorker::spawn(proxy.clone(), host, config);

    for i in 0..2 {
        handle.send(LogRecord::new("ERROR", format!("record {}", i))).await;
    }
    let stats = handle.shutdown().await;

    assert_eq!(stats.received, 2);
    assert_eq!(stats.dropped, 2);
    assert_eq!(stats.acked, 0);
    // every attempt carries the same two rows, never an accumulated backlog
    assert_eq!(server.inserts(), vec![2, 2, 2]);
    assert_eq!(proxy.inner().buffered().await, 0);
}
