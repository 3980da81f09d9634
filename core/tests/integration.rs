//! Full pipeline over real HTTP against the mock API.
//!
//! Starts the mock server on a random port, then drives `ZpwClient` with
//! `UreqTransport` through encrypted GET and POST calls, the plaintext
//! heartbeat, and each failure category the server can produce.

#![cfg(feature = "ureq")]

use std::io::{Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use zpw_core::url_builder::NRETRY;
use zpw_core::{
    ApiError, Credentials, ErrorCategory, ParseMode, ServiceDirectory, SessionContext, TransportConfig,
    TransportErrorKind, UreqTransport, ZpwClient,
};

fn start_mock_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            let secret = mock_server::Secret::from_base64(mock_server::DEFAULT_SECRET_KEY).unwrap();
            mock_server::run(listener, secret).await
        })
        .unwrap();
    });

    addr
}

/// Serves one raw HTTP exchange per connection: waits for the request head,
/// then writes `reply` verbatim (or nothing, if `reply` is `None`) and holds
/// the socket open for `hold`.
fn start_raw_server(reply: Option<Vec<u8>>, hold: Duration) -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let reply = reply.clone();
            std::thread::spawn(move || {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                if let Some(reply) = reply {
                    let _ = stream.write_all(&reply);
                    let _ = stream.flush();
                }
                std::thread::sleep(hold);
            });
        }
    });

    addr
}

fn client_for(base: &str) -> ZpwClient<UreqTransport> {
    client_with(base, None)
}

fn client_with(base: &str, timeout: Option<Duration>) -> ZpwClient<UreqTransport> {
    let session = SessionContext::builder("1001", mock_server::DEFAULT_SECRET_KEY)
        .directory(
            ServiceDirectory::new()
                .with("group", vec![base, "http://127.0.0.1:9"])
                .with("chat", base),
        )
        .protocol(30, 645)
        .build()
        .unwrap();
    let credentials = Credentials::new("device-1", "agent/1.0");
    let mut config = TransportConfig::from_credentials(&credentials);
    if let Some(timeout) = timeout {
        config.timeout = Some(timeout);
    }
    let transport = UreqTransport::new(config);
    ZpwClient::new(session, credentials, transport)
}

#[derive(Debug, Deserialize)]
struct Echo {
    params: serde_json::Value,
    zpw_ver: u32,
    zpw_type: u32,
    params_in_query: bool,
    nretry: Option<String>,
    user_agent: String,
    device_id: String,
}

#[test]
fn envelope_lifecycle() {
    let addr = start_mock_server();
    let client = client_for(&format!("http://{addr}"));

    // Step 1: encrypted GET, params travel in the query string.
    let params = json!({"poll_id": 123, "option_ids": []});
    let echo: Echo = client
        .get_as("group", "/api/echo", &params, &[], ParseMode::Encrypted)
        .unwrap();
    assert_eq!(echo.params, params);
    assert_eq!((echo.zpw_ver, echo.zpw_type), (645, 30));
    assert!(echo.params_in_query);
    assert_eq!(echo.user_agent, "agent/1.0");
    assert_eq!(echo.device_id, "device-1");

    // Step 2: encrypted POST, params travel in the form body.
    let params = json!({"msg": "xin chào + / =", "ttl": 0});
    let echo: Echo = client
        .post_as("group", "/api/echo", &params, &[NRETRY], ParseMode::Encrypted)
        .unwrap();
    assert_eq!(echo.params, params);
    assert!(!echo.params_in_query);
    assert_eq!(echo.nretry.as_deref(), Some("0"));

    // Step 3: plaintext heartbeat.
    let request = client.build_plain_get("chat", "/keepalive", &[]).unwrap();
    let alive = client.execute(&request, ParseMode::Unencrypted).unwrap();
    assert_eq!(alive, json!({"alive": true}));

    // Step 4: application error inside a 200.
    let err = client
        .get("group", "/api/reject", &json!({}), &[], ParseMode::Encrypted)
        .unwrap_err();
    assert_eq!(err, ApiError::Api { code: -1, message: "Invalid message".into() });

    // Step 5: HTTP 500.
    let err = client
        .post("group", "/api/crash", &json!({}), &[NRETRY], ParseMode::Encrypted)
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Api);
    assert_eq!(err.code(), Some(500));
    assert!(!err.is_retryable());

    // Step 6: data that is not a whole number of blocks.
    let err = client
        .get("group", "/api/garbled", &json!({}), &[], ParseMode::Encrypted)
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::DecryptFailure);

    // Step 7: unknown service never reaches the network.
    let err = client
        .get("alias", "/api/echo", &json!({}), &[], ParseMode::Encrypted)
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ServiceNotFound);
}

#[test]
fn concurrent_calls_share_one_session() {
    let addr = start_mock_server();
    let client = Arc::new(client_for(&format!("http://{addr}")));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let client = Arc::clone(&client);
            std::thread::spawn(move || {
                let echo: Echo = client
                    .get_as("group", "/api/echo", &json!({"n": i}), &[], ParseMode::Encrypted)
                    .unwrap();
                assert_eq!(echo.params["n"], i);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn refused_connection_is_retryable_network_error() {
    // Grab a free port, then close it so nothing is listening.
    let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let client = client_for(&format!("http://{addr}"));

    let err = client
        .get("group", "/api/echo", &json!({}), &[], ParseMode::Encrypted)
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Network);
    assert!(err.is_retryable());
    assert!(matches!(err, ApiError::Network { kind: TransportErrorKind::ConnectionRefused, .. }), "{err:?}");
}

#[test]
fn silent_server_times_out_as_retryable_network_error() {
    let addr = start_raw_server(None, Duration::from_secs(5));
    let client = client_with(&format!("http://{addr}"), Some(Duration::from_millis(300)));

    let err = client
        .get("group", "/api/echo", &json!({}), &[], ParseMode::Encrypted)
        .unwrap_err();
    assert!(matches!(err, ApiError::Network { kind: TransportErrorKind::Timeout, .. }), "{err:?}");
    assert!(err.is_retryable());
}

#[test]
fn non_utf8_body_is_a_decrypt_failure_not_a_network_error() {
    let body: &[u8] = b"{\"error_code\":0,\"data\":\"\xff\xfe\"}";
    let mut reply = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    reply.extend_from_slice(body);
    let addr = start_raw_server(Some(reply), Duration::ZERO);
    let client = client_for(&format!("http://{addr}"));

    let err = client
        .get("group", "/api/echo", &json!({}), &[], ParseMode::Encrypted)
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::DecryptFailure, "{err:?}");
    assert!(!err.is_retryable());
}
