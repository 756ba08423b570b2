//! Shared fixtures for the integration tests.
//!
//! The key files in `tests/files` were exported from GnuPG:
//!
//! - Alice: EdDSA, expires 2035-01-01, secret key available
//! - Bob: RSA 2048 with an encryption subkey, public only
//! - Carol: EdDSA with two user IDs, public only
//! - Dave: RSA 4096, public only
//! - Erin: ECDSA on NIST P-384, public only
//!
//! `bob_and_carol.gpg` is a binary keyring, and `alice_secret_bob_public.gpg`
//! a binary stream holding Alice's secret key followed by Bob's public key.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

pub const ALICE_FP: &str = "B3406D931B37F6B525195F142ED375461FEC5A1D";
pub const BOB_FP: &str = "29B93C1F2767AC5B541903E012474D94B88C9119";
pub const CAROL_FP: &str = "47CCED2B56D8CC9F75767E56BD33F4C062E78989";
pub const DAVE_FP: &str = "8F2EF8CE9BE1E0C41DB4A523C76CC110DFC1209B";
pub const ERIN_FP: &str = "5159A56EADBAE343C44C5925EC38602508F94618";

/// Base path for test files.
pub fn test_files_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("files")
}

pub fn read_fixture(name: &str) -> Vec<u8> {
    let path = test_files_dir().join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("Failed to read {:?}: {}", path, e))
}

pub fn alice_public() -> Vec<u8> {
    read_fixture("alice_public.asc")
}

pub fn alice_secret() -> Vec<u8> {
    read_fixture("alice_secret.asc")
}

pub fn bob_public() -> Vec<u8> {
    read_fixture("bob_public.asc")
}

pub fn carol_public() -> Vec<u8> {
    read_fixture("carol_public.asc")
}

/// Send library logs to the test output when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A canned HTTP response.
pub struct StubResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl StubResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self { status: 200, body: body.into() }
    }

    pub fn not_found() -> Self {
        Self { status: 404, body: b"No results found".to_vec() }
    }

    pub fn status(status: u16) -> Self {
        Self { status, body: Vec::new() }
    }
}

type Handler = dyn Fn(&str) -> StubResponse + Send + Sync + 'static;

/// Minimal HTTP/1.1 server standing in for an HKP keyserver.
///
/// Every request target (path and query) is recorded and passed to the
/// handler. The server thread lives until the test process exits.
pub struct StubKeyserver {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubKeyserver {
    pub fn start(handler: impl Fn(&str) -> StubResponse + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub keyserver");
        let addr = listener.local_addr().expect("stub keyserver address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let recorded = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let handler = Arc::clone(&handler);
                let recorded = Arc::clone(&recorded);
                thread::spawn(move || serve(stream, handler.as_ref(), &recorded));
            }
        });

        Self { addr, requests }
    }

    /// Keyserver URL to configure the client with.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request targets received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn serve(stream: TcpStream, handler: &Handler, recorded: &Mutex<Vec<String>>) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    // Drain headers; the client only sends GET requests without a body
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) | Err(_) => break,
            Ok(_) if header == "\r\n" || header == "\n" => break,
            Ok(_) => {}
        }
    }

    let target = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string();
    recorded.lock().unwrap().push(target.clone());

    let response = handler(&target);
    let reason = match response.status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    };

    let mut stream = stream;
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        reason,
        response.body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&response.body);
    let _ = stream.flush();
}

/// A listener that accepts connections and never answers.
pub fn silent_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind silent listener");
    let url = format!("http://{}", listener.local_addr().expect("address"));
    (listener, url)
}

/// Keyserver URL where nothing is listening.
pub fn dead_keyserver_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("address");
    drop(listener);
    format!("http://{}", addr)
}
