//! Common test utilities and fixtures for integration tests
//!
//! A routed canned-response server stands in for the portal, and a fixed
//! transform stub stands in for the vendor wasm module. The server records
//! every request so tests can assert on counts and signed POST bodies.

use std::sync::{Arc, Mutex};

use nepse_auth::{AuthResult, TokenTransform};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Scrambled fixture with junk bytes at indices 3, 7, 11, 15 and 19
pub const SCRAMBLED_TOKEN: &str = "abcUdefVghiWjklXmnoYpqr";

/// Sample authenticate response matching [`FixedCuts`]
pub fn prove_body() -> String {
    format!(
        r#"{{
            "salt1": 11, "salt2": 22, "salt3": 33, "salt4": 44, "salt5": 55,
            "accessToken": "{token}",
            "refreshToken": "{token}"
        }}"#,
        token = SCRAMBLED_TOKEN
    )
}

/// Market status used across tests: base id 147, last session 2026-02-12
pub fn market_open_body() -> String {
    r#"{"id": 147, "isOpen": "OPEN", "asOf": "2026-02-12T15:00:00"}"#.to_string()
}

/// Transform stub returning fixed cut indices regardless of arguments
pub struct FixedCuts;

impl TokenTransform for FixedCuts {
    fn invoke(&self, name: &str, _args: [i64; 5]) -> AuthResult<i64> {
        Ok(match name {
            "cdx" => 3,
            "rdx" => 7,
            "bdx" => 11,
            "ndx" => 15,
            "mdx" => 19,
            other => panic!("unexpected transform call {}", other),
        })
    }
}

/// One canned route: path prefix, status, body
pub type Route = (&'static str, u16, String);

/// Requests the server has answered, one entry per request, formatted as
/// `"METHOD path\nbody"`
pub type RequestLog = Arc<Mutex<Vec<String>>>;

/// Serve canned responses routed by path prefix on a local port
pub async fn spawn_portal(routes: Vec<Route>) -> (String, RequestLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));

    let request_log = Arc::clone(&log);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };

            let request = read_request(&mut socket).await;
            let (method, path, body) = split_request(&request);
            request_log
                .lock()
                .unwrap()
                .push(format!("{} {}\n{}", method, path, body));

            let (status, response_body) = routes
                .iter()
                .find(|(prefix, _, _)| path.starts_with(prefix))
                .map(|(_, status, body)| (*status, body.clone()))
                .unwrap_or((404, "{}".to_string()));

            let response = format!(
                "HTTP/1.1 {} canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                response_body.len(),
                response_body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{}", addr), log)
}

/// Count logged requests whose `METHOD path` line starts with `prefix`
pub fn count_requests(log: &RequestLog, prefix: &str) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .filter(|entry| entry.starts_with(prefix))
        .count()
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];

    loop {
        let n = socket.read(&mut tmp).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&tmp[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);

            if buf.len() - (header_end + 4) >= content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).to_string()
}

fn split_request(request: &str) -> (String, String, String) {
    let mut first_line = request.lines().next().unwrap_or("").split_whitespace();
    let method = first_line.next().unwrap_or("").to_string();
    let path = first_line.next().unwrap_or("").to_string();
    let body = request
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (method, path, body)
}
