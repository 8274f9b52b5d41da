//! Common test utilities and fixtures for integration tests
//!
//! Provides deterministic transform stubs and a canned-response HTTP server
//! so the protocol can be exercised without the portal or the vendor wasm
//! module.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use nepse_auth::{AuthResult, TokenTransform};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Scrambled fixture with junk bytes at indices 3, 7, 11, 15 and 19
pub const SCRAMBLED_TOKEN: &str = "abcUdefVghiWjklXmnoYpqr";

/// What [`SCRAMBLED_TOKEN`] descrambles to under [`FixedCuts`]
pub const PLAIN_TOKEN: &str = "abcdefghijklmnopqr";

/// Sample authenticate response matching [`FixedCuts`]
pub fn prove_body() -> String {
    format!(
        r#"{{
            "salt1": "11",
            "salt2": 22,
            "salt3": 33,
            "salt4": 44,
            "salt5": 55,
            "accessToken": "{token}",
            "refreshToken": "{token}"
        }}"#,
        token = SCRAMBLED_TOKEN
    )
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

/// Transform stub that records every call it receives
#[derive(Default)]
pub struct RecordingTransform {
    pub calls: Mutex<Vec<(String, [i64; 5])>>,
}

impl TokenTransform for RecordingTransform {
    fn invoke(&self, name: &str, args: [i64; 5]) -> AuthResult<i64> {
        self.calls.lock().unwrap().push((name.to_string(), args));
        // Distinct indices keep the reassembly ranges non-degenerate.
        Ok(match name {
            "cdx" => 1,
            "rdx" => 3,
            "bdx" => 5,
            "ndx" => 7,
            "mdx" => 9,
            _ => 0,
        })
    }
}

/// Serve canned HTTP responses on a local port
///
/// Each connection consumes the next `(status, body)` pair, repeating the
/// last one once the list is exhausted. Returns the base URL and a counter
/// of connections served.
pub async fn spawn_server(responses: Vec<(u16, String)>) -> (String, Arc<AtomicUsize>) {
    assert!(!responses.is_empty());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&hits);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let hit = counter.fetch_add(1, Ordering::SeqCst);
            let (status, body) = responses[hit.min(responses.len() - 1)].clone();

            // Requests fit one read; the contents are irrelevant here.
            let mut buf = [0u8; 8192];
            let _ = socket.read(&mut buf).await;

            let response = format!(
                "HTTP/1.1 {} canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{}", addr), hits)
}
