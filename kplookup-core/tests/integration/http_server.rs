//! A scripted HTTP-protocol peer.
//!
//! Binds a loopback TCP port and answers one JSON request per connection
//! (every response carries `Connection: close`, so the client opens a
//! fresh connection per request). Entry fields in `get-logins` replies
//! are encrypted under the association key with the library's own
//! [`RingChannelCrypto`]; the key is either preset by the test or
//! captured from the `Key` field of an `associate` request.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use kplookup_core::backend::{ChannelCrypto, RingChannelCrypto};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One scripted reply; each step answers one request
pub enum HttpStep {
    /// Answer `test-associate` or `associate` with success and this id
    AcceptAssociation(&'static str),
    /// Answer with `Success: false` (denies pairing, rejects an
    /// association, or reports a revoked one depending on the request)
    Deny,
    /// Answer `get-logins` with these (name, login, password) entries,
    /// field-encrypted under the association key
    Logins(Vec<(&'static str, &'static str, &'static str)>),
}

/// Handle to a running scripted peer
pub struct ScriptedHttpServer {
    /// Endpoint URL the peer listens on
    pub endpoint: String,
    /// `RequestType` values seen, in order
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl ScriptedHttpServer {
    /// Spawns a peer serving one script step per request.
    ///
    /// `key` preloads the association key for scripts that start from an
    /// existing association; scripts that pair capture it from the
    /// `associate` request instead.
    pub fn spawn(steps: Vec<HttpStep>, key: Option<&str>) -> Self {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        std_listener.set_nonblocking(true).unwrap();
        let addr = std_listener.local_addr().unwrap();
        let listener = TcpListener::from_std(std_listener).unwrap();

        let requests = Arc::new(Mutex::new(Vec::new()));
        let key = Mutex::new(key.map(str::to_string));
        let steps = Mutex::new(VecDeque::from(steps));

        let requests_task = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                serve(stream, &steps, &requests_task, &key).await;
            }
        });

        Self {
            endpoint: format!("http://{addr}/"),
            requests,
        }
    }

    /// `RequestType` values seen so far
    pub fn seen_requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn serve(
    mut stream: TcpStream,
    steps: &Mutex<VecDeque<HttpStep>>,
    requests: &Mutex<Vec<String>>,
    key: &Mutex<Option<String>>,
) {
    let Some(body) = read_request(&mut stream).await else {
        return;
    };
    let request: Value = serde_json::from_slice(&body).unwrap();
    let request_type = request["RequestType"].as_str().unwrap_or_default();
    requests.lock().unwrap().push(request_type.to_string());

    // An associate request carries the freshly generated symmetric key.
    if let Some(k) = request.get("Key").and_then(Value::as_str) {
        *key.lock().unwrap() = Some(k.to_string());
    }

    let step = steps.lock().unwrap().pop_front();
    let reply = match step {
        Some(HttpStep::AcceptAssociation(id)) => json!({"Success": true, "Id": id}),
        Some(HttpStep::Deny) | None => json!({"Success": false}),
        Some(HttpStep::Logins(entries)) => {
            let k = key.lock().unwrap().clone().unwrap();
            let mut crypto = RingChannelCrypto::new().unwrap();
            crypto.adopt_key(&k).unwrap();
            let nonce = crypto.nonce();
            let entries: Vec<Value> = entries
                .iter()
                .map(|(name, login, password)| {
                    json!({
                        "Name": crypto.encrypt(name.as_bytes(), &nonce).unwrap(),
                        "Login": crypto.encrypt(login.as_bytes(), &nonce).unwrap(),
                        "Password": crypto.encrypt(password.as_bytes(), &nonce).unwrap(),
                    })
                })
                .collect();
            json!({"Success": true, "Nonce": nonce, "Entries": entries})
        }
    };
    write_response(&mut stream, &reply).await;
}

async fn read_request(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(pos) = find_headers_end(&buf) else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..pos]).to_string();
        let len = headers
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);

        let mut body = buf[pos + 4..].to_vec();
        while body.len() < len {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body.truncate(len);
        return Some(body);
    }
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

async fn write_response(stream: &mut TcpStream, body: &Value) {
    let body = body.to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len(),
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.flush().await.unwrap();
}

/// A fixed, valid association key for scripts starting from an existing
/// association
pub fn association_key() -> String {
    B64.encode([7u8; 32])
}

/// Builds the identity blob a prior pairing would have persisted
pub fn association_blob(id: &str, key: &str) -> String {
    json!({"id": id, "key": key}).to_string()
}
