//! Integration tests against an in-process mock control server.
//!
//! The mock accepts one connection and answers line-by-line through a
//! per-test responder closure, which lets every test script exact reply
//! shapes: multi-line replies, data blocks, error codes, interleaved
//! events, withheld replies, and the SAFECOOKIE challenge.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::time::timeout;

use torctl::auth::{compute_client_hash, compute_server_hash};
use torctl::{
    CircuitId, CircuitRegistry, CircuitStatus, ControlConfig, ControlError, Event, EventType,
    TorController,
};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// One-connection mock control server driven by a responder closure.
struct MockServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    async fn start<F>(mut respond: F) -> Self
    where
        F: FnMut(&str) -> Vec<String> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&received);
        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();

            while let Ok(Some(line)) = lines.next_line().await {
                log.lock().unwrap().push(line.clone());
                let quitting = line == "QUIT";
                for out in respond(&line) {
                    if write_half.write_all(out.as_bytes()).await.is_err() {
                        return;
                    }
                }
                let _ = write_half.flush().await;
                if quitting {
                    return;
                }
            }
        });

        Self { addr, received }
    }

    fn config(&self) -> ControlConfig {
        ControlConfig::new().tcp(self.addr)
    }

    fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

fn ok() -> Vec<String> {
    vec!["250 OK\r\n".to_string()]
}

fn protocolinfo_null() -> Vec<String> {
    vec![
        "250-PROTOCOLINFO 1\r\n".to_string(),
        "250-AUTH METHODS=NULL\r\n".to_string(),
        "250-VERSION Tor=\"0.4.8.12\"\r\n".to_string(),
        "250 OK\r\n".to_string(),
    ]
}

async fn null_authed_controller(server: &MockServer) -> TorController {
    let controller = TorController::connect(server.config()).await.unwrap();
    controller.auto_authenticate().await.unwrap();
    controller
}

// ============================================================================
// Connection and authentication
// ============================================================================

#[tokio::test]
async fn connect_authenticate_and_query() {
    let server = MockServer::start(|line| {
        if line.starts_with("PROTOCOLINFO") {
            protocolinfo_null()
        } else if line.starts_with("AUTHENTICATE") {
            ok()
        } else if line == "GETINFO version" {
            vec![
                "250-version=0.4.8.12\r\n".to_string(),
                "250 OK\r\n".to_string(),
            ]
        } else {
            vec!["510 Unrecognized command\r\n".to_string()]
        }
    })
    .await;

    let controller = timeout(TEST_TIMEOUT, null_authed_controller(&server))
        .await
        .unwrap();
    let version = controller.get_info("version").await.unwrap();
    assert_eq!(version, "0.4.8.12");

    controller.close().await;
    assert!(controller.is_closed());
}

#[tokio::test]
async fn second_authentication_attempt_is_refused_locally() {
    let server = MockServer::start(|line| {
        if line.starts_with("PROTOCOLINFO") {
            protocolinfo_null()
        } else {
            ok()
        }
    })
    .await;

    let controller = null_authed_controller(&server).await;
    let err = controller
        .authenticate(&torctl::AuthCredential::None)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Authentication(_)));
}

#[tokio::test]
async fn safecookie_handshake_succeeds() {
    let cookie = [0x5Au8; 32];
    let cookie_file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(cookie_file.path(), cookie).unwrap();

    let cookie_path = cookie_file.path().to_str().unwrap().to_string();
    let server_nonce = [0x07u8; 32];

    let mut client_nonce: Option<Vec<u8>> = None;
    let server = MockServer::start(move |line| {
        if line.starts_with("PROTOCOLINFO") {
            vec![
                "250-PROTOCOLINFO 1\r\n".to_string(),
                format!(
                    "250-AUTH METHODS=COOKIE,SAFECOOKIE COOKIEFILE=\"{}\"\r\n",
                    cookie_path
                ),
                "250 OK\r\n".to_string(),
            ]
        } else if let Some(rest) = line.strip_prefix("AUTHCHALLENGE SAFECOOKIE ") {
            let nonce = hex::decode(rest.trim()).unwrap();
            let server_hash = compute_server_hash(&cookie, &nonce, &server_nonce);
            client_nonce = Some(nonce);
            vec![format!(
                "250 AUTHCHALLENGE SERVERHASH={} SERVERNONCE={}\r\n",
                hex::encode_upper(server_hash),
                hex::encode_upper(server_nonce)
            )]
        } else if let Some(rest) = line.strip_prefix("AUTHENTICATE ") {
            let expected = compute_client_hash(
                &cookie,
                client_nonce.as_deref().unwrap_or(&[]),
                &server_nonce,
            );
            if rest.trim() == hex::encode_upper(expected) {
                ok()
            } else {
                vec!["515 Bad authentication\r\n".to_string()]
            }
        } else {
            ok()
        }
    })
    .await;

    let controller = TorController::connect(server.config()).await.unwrap();
    timeout(TEST_TIMEOUT, controller.auto_authenticate())
        .await
        .unwrap()
        .unwrap();

    let commands = server.received();
    assert!(commands.iter().any(|c| c.starts_with("AUTHCHALLENGE")));
    assert!(commands.iter().any(|c| c.starts_with("AUTHENTICATE")));
}

#[tokio::test]
async fn safecookie_bad_server_hash_aborts_before_authenticate() {
    let cookie = [0x5Au8; 32];
    let cookie_file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(cookie_file.path(), cookie).unwrap();
    let cookie_path = cookie_file.path().to_str().unwrap().to_string();

    let server = MockServer::start(move |line| {
        if line.starts_with("PROTOCOLINFO") {
            vec![
                "250-PROTOCOLINFO 1\r\n".to_string(),
                format!(
                    "250-AUTH METHODS=SAFECOOKIE COOKIEFILE=\"{}\"\r\n",
                    cookie_path
                ),
                "250 OK\r\n".to_string(),
            ]
        } else if line.starts_with("AUTHCHALLENGE") {
            // A hash the cookie holder would never produce.
            vec![format!(
                "250 AUTHCHALLENGE SERVERHASH={} SERVERNONCE={}\r\n",
                "00".repeat(32),
                "07".repeat(32)
            )]
        } else {
            ok()
        }
    })
    .await;

    let controller = TorController::connect(server.config()).await.unwrap();
    let err = timeout(TEST_TIMEOUT, controller.auto_authenticate())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, ControlError::Authentication(_)));

    // The shared secret was never proven, so AUTHENTICATE must not be sent.
    assert!(!server
        .received()
        .iter()
        .any(|c| c.starts_with("AUTHENTICATE")));
}

// ============================================================================
// Command/reply pairing
// ============================================================================

#[tokio::test]
async fn concurrent_commands_pair_with_their_own_replies() {
    let server = MockServer::start(|line| {
        if line.starts_with("PROTOCOLINFO") {
            protocolinfo_null()
        } else if line.starts_with("AUTHENTICATE") {
            ok()
        } else if let Some(key) = line.strip_prefix("GETINFO ") {
            if key == "blob" {
                vec![
                    "250+blob=\r\n".to_string(),
                    "first line\r\n".to_string(),
                    "..dotted\r\n".to_string(),
                    ".\r\n".to_string(),
                    "250 OK\r\n".to_string(),
                ]
            } else {
                vec![
                    format!("250-{}=value-{}\r\n", key, key),
                    "250 OK\r\n".to_string(),
                ]
            }
        } else {
            ok()
        }
    })
    .await;

    let controller = null_authed_controller(&server).await;

    let (a, blob, c) = tokio::join!(
        controller.get_info("alpha"),
        controller.get_info("blob"),
        controller.get_info("gamma"),
    );
    assert_eq!(a.unwrap(), "value-alpha");
    assert_eq!(blob.unwrap(), "first line\n.dotted");
    assert_eq!(c.unwrap(), "value-gamma");
}

#[tokio::test]
async fn error_reply_resolves_and_leaves_connection_usable() {
    let server = MockServer::start(|line| {
        if line.starts_with("PROTOCOLINFO") {
            protocolinfo_null()
        } else if line.starts_with("AUTHENTICATE") {
            ok()
        } else if line.starts_with("GETCONF Bogus") {
            vec!["552 Unrecognized configuration key \"Bogus\"\r\n".to_string()]
        } else if line == "GETINFO version" {
            vec![
                "250-version=0.4.8.12\r\n".to_string(),
                "250 OK\r\n".to_string(),
            ]
        } else {
            ok()
        }
    })
    .await;

    let controller = null_authed_controller(&server).await;

    let err = controller.get_conf("Bogus").await.unwrap_err();
    match err {
        ControlError::CommandRejected { code, .. } => assert_eq!(code, 552),
        other => panic!("expected CommandRejected, got {:?}", other),
    }

    // Recoverable: the next command still works.
    assert_eq!(controller.get_info("version").await.unwrap(), "0.4.8.12");
}

#[tokio::test]
async fn timed_out_reply_is_drained_without_corrupting_pairing() {
    let server = MockServer::start(|line| {
        if line.starts_with("PROTOCOLINFO") {
            protocolinfo_null()
        } else if line.starts_with("AUTHENTICATE") {
            ok()
        } else if line == "GETINFO slow" {
            // Withhold the reply; it is delivered late, before the next one.
            Vec::new()
        } else if line == "GETINFO fast" {
            vec![
                "250-slow=stale\r\n".to_string(),
                "250 OK\r\n".to_string(),
                "250-fast=fresh\r\n".to_string(),
                "250 OK\r\n".to_string(),
            ]
        } else {
            ok()
        }
    })
    .await;

    let controller = null_authed_controller(&server).await;

    let err = controller
        .send_command_timeout("GETINFO slow", Duration::from_millis(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Timeout));

    // The stale reply resolves the abandoned slot; this command gets its own.
    assert_eq!(controller.get_info("fast").await.unwrap(), "fresh");
}

#[tokio::test]
async fn unsolicited_reply_is_fatal() {
    let server = MockServer::start(|line| {
        if line.starts_with("PROTOCOLINFO") {
            protocolinfo_null()
        } else if line.starts_with("AUTHENTICATE") {
            ok()
        } else if line == "GETINFO version" {
            // One answer for the command, one nobody asked for.
            vec!["250 OK\r\n".to_string(), "250 OK\r\n".to_string()]
        } else {
            ok()
        }
    })
    .await;

    let controller = null_authed_controller(&server).await;
    let _ = controller.get_info("version").await;

    // The spurious reply tears the connection down.
    let err = timeout(TEST_TIMEOUT, async {
        loop {
            match controller.send_command("GETINFO version").await {
                Err(e) => break e,
                Ok(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
    })
    .await
    .unwrap();
    assert!(matches!(err, ControlError::ConnectionClosed));
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn events_interleave_with_replies_without_stealing_them() {
    let server = MockServer::start(|line| {
        if line.starts_with("PROTOCOLINFO") {
            protocolinfo_null()
        } else if line.starts_with("AUTHENTICATE") {
            ok()
        } else if line.starts_with("SETEVENTS") {
            ok()
        } else if line == "GETINFO alpha" {
            vec![
                "650 CIRC 1 LAUNCHED\r\n".to_string(),
                "250-alpha=a\r\n".to_string(),
                "250 OK\r\n".to_string(),
                "650 CIRC 1 BUILT\r\n".to_string(),
            ]
        } else if line == "GETINFO beta" {
            vec!["250-beta=b\r\n".to_string(), "250 OK\r\n".to_string()]
        } else {
            ok()
        }
    })
    .await;

    let controller = null_authed_controller(&server).await;
    let mut events = controller.event_stream();
    controller.set_events(&[EventType::Circ]).await.unwrap();

    assert_eq!(controller.get_info("alpha").await.unwrap(), "a");
    assert_eq!(controller.get_info("beta").await.unwrap(), "b");

    for expected in [CircuitStatus::Launched, CircuitStatus::Built] {
        let event = timeout(TEST_TIMEOUT, events.recv()).await.unwrap().unwrap();
        match event {
            Event::CircuitStatus(circ) => {
                assert_eq!(circ.id, CircuitId(1));
                assert_eq!(circ.status, expected);
            }
            other => panic!("expected CircuitStatus, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn registry_follows_circuit_events() {
    const FP: &str = "$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    let server = MockServer::start(move |line| {
        if line.starts_with("PROTOCOLINFO") {
            protocolinfo_null()
        } else if line.starts_with("AUTHENTICATE") {
            ok()
        } else if line.starts_with("SETEVENTS") {
            vec![
                "250 OK\r\n".to_string(),
                "650 CIRC 7 LAUNCHED PURPOSE=GENERAL\r\n".to_string(),
                format!("650 CIRC 7 EXTENDED {}~Guard\r\n", FP),
                format!("650 CIRC 7 BUILT {}~Guard\r\n", FP),
                "650 CIRC 8 BUILT\r\n".to_string(),
                "650 CIRC 7 CLOSED REASON=FINISHED\r\n".to_string(),
            ]
        } else {
            ok()
        }
    })
    .await;

    let controller = null_authed_controller(&server).await;
    let registry = CircuitRegistry::new();
    registry.attach(&controller);

    let mut events = controller.event_stream();
    controller.set_events(&[EventType::Circ]).await.unwrap();

    // Drain the five scripted events so the registry has folded them all.
    for _ in 0..5 {
        timeout(TEST_TIMEOUT, events.recv()).await.unwrap().unwrap();
    }

    let seven = registry.circuit(CircuitId(7)).unwrap();
    assert_eq!(seven.state, CircuitStatus::Closed);
    assert!(seven.is_terminal());
    assert_eq!(seven.path.len(), 1);

    let built = registry.circuits_where(|c| c.state == CircuitStatus::Built);
    assert_eq!(built.len(), 1);
    assert_eq!(built[0].id, CircuitId(8));

    let live = registry.live_circuits();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, CircuitId(8));
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn transport_loss_fails_pending_and_future_commands() {
    let server = MockServer::start(|line| {
        if line.starts_with("PROTOCOLINFO") {
            protocolinfo_null()
        } else if line.starts_with("AUTHENTICATE") {
            ok()
        } else if line == "QUIT" {
            // Socket drops after this; note MockServer exits on QUIT.
            vec!["250 closing connection\r\n".to_string()]
        } else {
            ok()
        }
    })
    .await;

    let controller = null_authed_controller(&server).await;
    controller.close().await;
    assert!(controller.is_closed());

    let err = controller.get_info("version").await.unwrap_err();
    assert!(matches!(err, ControlError::ConnectionClosed));
}

#[tokio::test]
async fn pending_command_fails_when_server_vanishes() {
    let server = MockServer::start(|line| {
        if line.starts_with("PROTOCOLINFO") {
            protocolinfo_null()
        } else if line.starts_with("AUTHENTICATE") {
            ok()
        } else {
            // Treat anything else as QUIT-like silence; the responder
            // returning nothing leaves the command pending forever, so the
            // test drops the server by closing its socket instead.
            Vec::new()
        }
    })
    .await;

    let controller = null_authed_controller(&server).await;

    // QUIT makes the mock server return, dropping the socket while the
    // command below is still waiting.
    let pending = controller.send_command("GETINFO version");
    let quit = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = controller.send_command_timeout("QUIT", Duration::from_millis(100)).await;
    };
    let (result, _) = tokio::join!(pending, quit);

    let err = result.unwrap_err();
    assert!(matches!(err, ControlError::ConnectionClosed | ControlError::Timeout));
}
