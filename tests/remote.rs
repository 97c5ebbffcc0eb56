//! Range reads against an in-process HTTP server.

use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use wigrange::cache::SharedHandle;
use wigrange::{BedGraphDecoder, Config, Error, RangeImporter, SourceError};

/// Serves fixed bodies by path. Paths under `/norange/` ignore `Range`
/// headers and always answer `200 OK` with the whole body.
struct RangeServer {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    fail_next: Arc<AtomicBool>,
}

impl RangeServer {
    fn start(files: HashMap<String, Vec<u8>>) -> Self {
        let files = Arc::new(files);
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();
        let fail_next = Arc::new(AtomicBool::new(false));
        let failing = fail_next.clone();
        let (tx, rx) = std::sync::mpsc::channel();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("build server runtime");
            rt.block_on(async move {
                let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
                tx.send(listener.local_addr().expect("local addr"))
                    .expect("send addr");
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        continue;
                    };
                    tokio::spawn(serve(
                        stream,
                        files.clone(),
                        counter.clone(),
                        failing.clone(),
                    ));
                }
            });
        });

        let addr = rx.recv().expect("server address");
        Self {
            addr,
            requests,
            fail_next,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Answers the next request with `500 Internal Server Error`.
    fn fail_next_request(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

async fn serve(
    stream: TcpStream,
    files: Arc<HashMap<String, Vec<u8>>>,
    requests: Arc<AtomicUsize>,
    fail_next: Arc<AtomicBool>,
) {
    let (read, mut write) = stream.into_split();
    let mut read = BufReader::new(read);

    // keep-alive: one request after another on the same connection
    loop {
        let mut request_line = String::new();
        match read.read_line(&mut request_line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let path = request_line
            .split_whitespace()
            .nth(1)
            .unwrap_or("/")
            .to_string();

        let mut range = None;
        loop {
            let mut header = String::new();
            if read.read_line(&mut header).await.unwrap_or(0) == 0 {
                return;
            }
            let header = header.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((key, value)) = header.split_once(':') {
                if key.eq_ignore_ascii_case("range") {
                    range = parse_range(value.trim());
                }
            }
        }
        requests.fetch_add(1, Ordering::SeqCst);

        let (head, body) = if fail_next.swap(false, Ordering::SeqCst) {
            (
                "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n".to_string(),
                &[][..],
            )
        } else {
            respond(&files, &path, range)
        };
        if write.write_all(head.as_bytes()).await.is_err()
            || write.write_all(body).await.is_err()
        {
            return;
        }
    }
}

fn parse_range(value: &str) -> Option<(u64, u64)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

fn respond<'a>(
    files: &'a HashMap<String, Vec<u8>>,
    path: &str,
    range: Option<(u64, u64)>,
) -> (String, &'a [u8]) {
    let Some(data) = files.get(path) else {
        return ("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n".to_string(), &[]);
    };
    let total = data.len() as u64;

    match range {
        Some((start, end)) if !path.starts_with("/norange/") => {
            if start >= total {
                let head = format!(
                    "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{total}\r\nContent-Length: 0\r\n\r\n"
                );
                return (head, &[]);
            }
            let end = end.min(total - 1);
            let body = &data[start as usize..=end as usize];
            let head = format!(
                "HTTP/1.1 206 Partial Content\r\nContent-Range: bytes {start}-{end}/{total}\r\nContent-Length: {}\r\n\r\n",
                body.len()
            );
            (head, body)
        }
        _ => {
            let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {total}\r\n\r\n");
            (head, data.as_slice())
        }
    }
}

/// A bedGraph body of roughly 200 KiB: three buffer windows at 64 KiB.
fn large_track() -> Vec<u8> {
    let mut out = Vec::new();
    writeln!(out, "track type=bedGraph").unwrap();
    for name in ["chr1", "chr2"] {
        for i in 0..4000u32 {
            let start = i * 10;
            writeln!(out, "{name}\t{start}\t{}\t{}.25", start + 10, i % 17).unwrap();
        }
    }
    out
}

const SMALL: &str = "chr3\t0\t4\t1.5\nchr3\t4\t8\t2.5\n";

fn server() -> RangeServer {
    let large = large_track();
    let mut files = HashMap::new();
    files.insert("/large.bedGraph".to_string(), large.clone());
    files.insert("/small.bedGraph".to_string(), SMALL.as_bytes().to_vec());
    files.insert("/norange/small.bedGraph".to_string(), SMALL.as_bytes().to_vec());
    files.insert("/norange/large.bedGraph".to_string(), large);
    RangeServer::start(files)
}

fn importer() -> RangeImporter {
    RangeImporter::new(Config::default().with_buffer_kb(64), BedGraphDecoder)
}

fn fetch_count(handle: &SharedHandle) -> u64 {
    handle.lock().unwrap().reader().fetch_count()
}

#[test]
fn remote_matches_local() {
    let server = server();
    let mut local = tempfile::Builder::new()
        .suffix(".bedGraph")
        .tempfile()
        .unwrap();
    local.write_all(&large_track()).unwrap();
    local.flush().unwrap();

    let importer = importer();
    let url = server.url("/large.bedGraph");
    let local_path = local.path().to_str().unwrap();

    for (name, start, end) in [("chr1", 1, 50), ("2", 39_950, 40_010), ("chr2", 12_345, 12_400)] {
        let remote = importer.import_range(&url, name, start, end).unwrap();
        let expected = importer.import_range(local_path, name, start, end).unwrap();
        assert_eq!(remote, expected, "{name}:{start}-{end}");
    }
    assert_eq!(
        importer.sequence_names(&url).unwrap(),
        vec!["chr1", "chr2"]
    );
}

#[test]
fn open_warms_up_the_first_window() {
    let server = server();
    let importer = importer();
    let url = server.url("/small.bedGraph");

    let handle = importer.get_or_open(&url).unwrap();
    assert_eq!(fetch_count(&handle), 1);
    assert_eq!(server.requests(), 1);

    // the whole body fits in the warm-up window, so queries need no more requests
    let values = importer.import_range(&url, "3", 3, 6).unwrap();
    assert_eq!(values, vec![1.5, 1.5, 2.5, 2.5]);
    importer.import_range(&url, "chr3", 1, 8).unwrap();
    assert_eq!(fetch_count(&handle), 1);
    assert_eq!(server.requests(), 1);
    assert_eq!(importer.transferred_bytes(&url).unwrap(), SMALL.len() as u64);
}

#[test]
fn sequential_scan_refills_window_by_window() {
    let server = server();
    let importer = importer();
    let url = server.url("/large.bedGraph");
    let size = large_track().len() as u64;

    importer.import_range(&url, "chr1", 1, 10).unwrap();
    let handle = importer.get_or_open(&url).unwrap();
    let fetches = fetch_count(&handle);
    let windows = size.div_ceil(64 * 1024);

    // directory scan and query scan each read the body once
    assert!(fetches >= windows, "{fetches} fetches for {windows} windows");
    assert!(fetches <= 2 * (windows + 1), "{fetches} fetches for {windows} windows");
    assert!(server.requests() as u64 <= fetches);
    assert_eq!(handle.lock().unwrap().reader().len(), Some(size));
}

#[test]
fn missing_url_is_an_open_failure() {
    let server = server();
    let importer = importer();
    let err = importer
        .import_range(&server.url("/absent.bedGraph"), "chr1", 1, 10)
        .unwrap_err();
    assert!(
        matches!(
            err,
            Error::OpenFailure {
                source: SourceError::Status { status: 404, .. },
                ..
            }
        ),
        "{err}"
    );
    assert_eq!(importer.cached_handles(), 0);
}

#[test]
fn unreachable_host_is_an_open_failure() {
    // bind then drop to get a port nothing listens on
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let err = importer()
        .import_range(&format!("http://{addr}/x.bedGraph"), "chr1", 1, 10)
        .unwrap_err();
    assert!(
        matches!(err, Error::OpenFailure { source: SourceError::Http(_), .. }),
        "{err}"
    );
}

#[test]
fn whole_body_answer_is_accepted_at_offset_zero() {
    let server = server();
    let values = importer()
        .import_range(&server.url("/norange/small.bedGraph"), "chr3", 1, 8)
        .unwrap();
    assert_eq!(values, vec![1.5, 1.5, 1.5, 1.5, 2.5, 2.5, 2.5, 2.5]);
}

#[test]
fn ignored_range_past_first_window_fails() {
    let server = server();
    let err = importer()
        .import_range(&server.url("/norange/large.bedGraph"), "chr1", 1, 10)
        .unwrap_err();
    assert!(
        matches!(
            err,
            Error::OpenFailure {
                source: SourceError::RangeNotSupported,
                ..
            }
        ),
        "{err}"
    );
}

#[test]
fn explicit_close_resets_transport_and_reopens() {
    let server = server();
    let importer = importer();
    let url = server.url("/small.bedGraph");

    let before = importer.import_range(&url, "chr3", 1, 8).unwrap();
    assert!(importer.transport().is_ready());

    importer.explicit_close();
    assert!(!importer.transport().is_ready());
    assert_eq!(importer.cached_handles(), 0);

    let after = importer.import_range(&url, "chr3", 1, 8).unwrap();
    assert_eq!(before, after);
    assert_eq!(server.requests(), 2);
}

#[test]
fn failed_fetch_mid_query_keeps_handle_and_recovers() {
    let server = server();
    let importer = importer();
    let url = server.url("/large.bedGraph");

    let expected = importer.import_range(&url, "chr1", 101, 160).unwrap();
    assert_eq!(importer.cached_handles(), 1);

    // the query rescans from offset 0, which is no longer in the window
    server.fail_next_request();
    let err = importer.import_range(&url, "chr1", 101, 160).unwrap_err();
    assert!(
        matches!(
            err,
            Error::IoFailure {
                source: SourceError::Status { status: 500, .. },
                ..
            }
        ),
        "{err}"
    );
    assert_eq!(importer.cached_handles(), 1);
    assert!(importer.get_or_open(&url).unwrap().lock().unwrap().reader().needs_seek());

    let recovered = importer.import_range(&url, "chr1", 101, 160).unwrap();
    assert_eq!(recovered, expected);
    assert_eq!(importer.cached_handles(), 1);
}
