//! stratus-test-utils — scripted HTTP stub server for wire-level tests.
//!
//! Serves a fixed sequence of responses on a loopback socket: the n-th
//! request gets the n-th response, the last response repeats once the
//! script is exhausted. Request count and paths are recorded so tests can
//! assert exact attempt budgets and pagination order.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// One scripted HTTP response.
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StubResponse {
    /// A bodyless response with the given status code.
    pub fn status(code: u16) -> Self {
        Self {
            status: code,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// A 200 response carrying a JSON body.
    pub fn json(body: &str) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.to_string(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

pub struct StubServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    paths: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl StubServer {
    /// Bind an ephemeral loopback port and start serving the script.
    pub async fn start(responses: Vec<StubResponse>) -> Self {
        Self::start_with(|_| responses).await
    }

    /// Like [`start`](Self::start), but the script is built after the port
    /// is bound so responses can reference the server's own URL (for
    /// next-page links that must point back at the stub).
    pub async fn start_with<F>(script: F) -> Self
    where
        F: FnOnce(&str) -> Vec<StubResponse>,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub local addr");
        let responses = script(&format!("http://{addr}"));
        assert!(!responses.is_empty(), "stub script must not be empty");
        let hits = Arc::new(AtomicUsize::new(0));
        let paths = Arc::new(Mutex::new(Vec::new()));

        let task_hits = hits.clone();
        let task_paths = paths.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let n = task_hits.fetch_add(1, Ordering::SeqCst);
                let response = responses[n.min(responses.len() - 1)].clone();
                let paths = task_paths.clone();
                tokio::spawn(async move {
                    let _ = serve_one(stream, response, paths).await;
                });
            }
        });

        Self { addr, hits, paths, handle }
    }

    /// Base URL of the server, no trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Request paths (with query strings) in arrival order.
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_one(
    mut stream: TcpStream,
    response: StubResponse,
    paths: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()> {
    let head = read_request(&mut stream).await?;

    if let Some(path) = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
    {
        if let Ok(mut guard) = paths.lock() {
            guard.push(path.to_string());
        }
    }

    let mut out = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        reason(response.status),
        response.body.len()
    );
    for (name, value) in &response.headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str("\r\n");
    out.push_str(&response.body);

    stream.write_all(out.as_bytes()).await?;
    stream.shutdown().await
}

/// Read the full request (headers plus any Content-Length body) so the
/// client never sees a reset mid-send.
async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break buf.len();
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        if buf.len() > 64 * 1024 {
            break buf.len();
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);

    let mut already = buf.len().saturating_sub(header_end + 4);
    while already < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        already += n;
    }

    Ok(head)
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "",
    }
}
