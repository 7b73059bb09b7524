//! The controller: connection lifecycle, command queue, and reader task.
//!
//! One background task owns the read side of the connection and processes
//! the byte stream strictly sequentially: framed lines feed the reply
//! parser, event replies go to the dispatcher, and every non-event reply
//! resolves the oldest pending command. Ordering is the whole correctness
//! argument — the protocol answers synchronous commands in submission
//! order, so the queue never matches by content, only by position.
//!
//! Senders may be concurrent: the "write command, enqueue waiter" step is
//! serialized under one async mutex so two commands can never interleave
//! on the wire.

use crate::auth::{
    choose_credential, compute_client_hash, generate_client_nonce, parse_authchallenge_response,
    read_cookie_file, verify_server_hash, AuthCredential, ProtocolInfo,
};
use crate::config::{ConnectionAddress, ControlConfig};
use crate::error::{ControlError, Result};
use crate::events::{Event, EventDispatcher, EventType, SubscriptionId};
use crate::keystore::{AuthKeyPair, OnionAuthStore};
use crate::protocol::{
    format_command, format_command_with_data, quote_string, ControlReply, LineFramer, ReplyParser,
};
use crate::types::{BootstrapStatus, OnionAddress, Signal};

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type ReplyWaiter = oneshot::Sender<Result<ControlReply>>;

/// State shared between the reader task and command senders.
struct Shared {
    pending: StdMutex<VecDeque<ReplyWaiter>>,
    dispatcher: EventDispatcher,
    closed: AtomicBool,
}

impl Shared {
    /// Latch the connection closed: fail every outstanding command and
    /// drop all event observers so nothing is delivered after teardown.
    fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let waiters: Vec<ReplyWaiter> = {
            let mut pending = self.pending.lock().expect("pending lock poisoned");
            pending.drain(..).collect()
        };
        for waiter in waiters {
            let _ = waiter.send(Err(ControlError::ConnectionClosed));
        }
        self.dispatcher.clear();
    }
}

struct SendHalf {
    writer: BufWriter<BoxedWriter>,
}

struct Inner {
    send: Mutex<SendHalf>,
    shared: Arc<Shared>,
    config: ControlConfig,
    auth_sent: AtomicBool,
    reader: StdMutex<Option<JoinHandle<()>>>,
}

/// A handle to one authenticated control connection.
///
/// Handles are cheap to clone and share one connection; commands may be
/// issued concurrently from any number of tasks.
#[derive(Clone)]
pub struct TorController {
    inner: Arc<Inner>,
}

impl TorController {
    /// Connect to the endpoint in `config`. The connection is unusable for
    /// most commands until authenticated.
    pub async fn connect(config: ControlConfig) -> Result<Self> {
        let (read_half, write_half) = open_transport(&config).await?;
        debug!(endpoint = %config.address, "control connection established");

        let shared = Arc::new(Shared {
            pending: StdMutex::new(VecDeque::new()),
            dispatcher: EventDispatcher::new(),
            closed: AtomicBool::new(false),
        });

        let reader = tokio::spawn(reader_task(
            read_half,
            Arc::clone(&shared),
            config.max_line_len,
        ));

        Ok(Self {
            inner: Arc::new(Inner {
                send: Mutex::new(SendHalf {
                    writer: BufWriter::new(write_half),
                }),
                shared,
                config,
                auth_sent: AtomicBool::new(false),
                reader: StdMutex::new(Some(reader)),
            }),
        })
    }

    /// Connect to the conventional local control port.
    pub async fn connect_default() -> Result<Self> {
        Self::connect(ControlConfig::default()).await
    }

    /// Whether the connection has been torn down.
    pub fn is_closed(&self) -> bool {
        self.inner.shared.closed.load(Ordering::SeqCst)
    }

    /// Write a command and enqueue its reply waiter, atomically with
    /// respect to other senders.
    async fn enqueue_and_write(
        &self,
        command: String,
    ) -> Result<oneshot::Receiver<Result<ControlReply>>> {
        if self.is_closed() {
            return Err(ControlError::ConnectionClosed);
        }

        let mut send = self.inner.send.lock().await;
        if self.is_closed() {
            return Err(ControlError::ConnectionClosed);
        }

        // Enqueue before writing: a reply must never find an empty queue.
        let (tx, rx) = oneshot::channel();
        self.inner
            .shared
            .pending
            .lock()
            .expect("pending lock poisoned")
            .push_back(tx);

        let write = async {
            send.writer.write_all(command.as_bytes()).await?;
            send.writer.flush().await
        };
        if let Err(e) = write.await {
            // A failed write is fatal; everything outstanding fails now.
            self.inner.shared.shutdown();
            return Err(e.into());
        }

        trace!(keyword = first_keyword(&command), "command sent");
        Ok(rx)
    }

    /// Send a raw command and await its reply.
    ///
    /// An error-status reply resolves as [`Ok`] here; use
    /// [`ControlReply::into_result`] to convert it. The configured default
    /// command deadline applies when set.
    pub async fn send_command(&self, command: &str) -> Result<ControlReply> {
        match self.inner.config.command_timeout {
            Some(deadline) => self.send_command_timeout(command, deadline).await,
            None => {
                let rx = self.enqueue_and_write(normalize_command(command)).await?;
                rx.await.map_err(|_| ControlError::ConnectionClosed)?
            }
        }
    }

    /// Send a raw command with an explicit deadline.
    ///
    /// On expiry the caller gets [`ControlError::Timeout`] and its waiter is
    /// abandoned; the queue still consumes the late reply in FIFO position,
    /// so subsequent commands keep pairing correctly.
    pub async fn send_command_timeout(
        &self,
        command: &str,
        deadline: Duration,
    ) -> Result<ControlReply> {
        let rx = self.enqueue_and_write(normalize_command(command)).await?;
        match tokio::time::timeout(deadline, rx).await {
            Err(_) => Err(ControlError::Timeout),
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ControlError::ConnectionClosed),
        }
    }

    // ==================== Authentication ====================

    /// Query supported authentication methods and daemon version.
    pub async fn protocol_info(&self) -> Result<ProtocolInfo> {
        let reply = self.send_command("PROTOCOLINFO 1").await?.into_result()?;
        let lines: Vec<String> = reply.lines.iter().map(|l| l.text.clone()).collect();
        ProtocolInfo::parse(&lines)
    }

    /// Record that AUTHENTICATE is about to be sent; at most one per
    /// connection, success or failure.
    fn mark_auth_sent(&self) -> Result<()> {
        if self.inner.auth_sent.swap(true, Ordering::SeqCst) {
            return Err(ControlError::Authentication(
                "authentication was already attempted on this connection".to_string(),
            ));
        }
        Ok(())
    }

    /// Authenticate with an explicit credential.
    pub async fn authenticate(&self, credential: &AuthCredential) -> Result<()> {
        match credential {
            AuthCredential::None => {
                debug!("authenticating with NULL method");
                self.mark_auth_sent()?;
                self.send_command("AUTHENTICATE")
                    .await?
                    .into_result()
                    .map_err(as_auth_error)?;
            }
            AuthCredential::Password(password) => {
                debug!("authenticating with password");
                let cmd = format!("AUTHENTICATE {}", quote_string(password));
                self.mark_auth_sent()?;
                self.send_command(&cmd).await?.into_result().map_err(|_| {
                    ControlError::Authentication("password rejected".to_string())
                })?;
            }
            AuthCredential::CookieFile(path) => {
                debug!("authenticating with cookie file");
                let cookie = read_cookie_file(Path::new(path))?;
                self.authenticate_cookie(&cookie).await?;
            }
            AuthCredential::CookieData(cookie) => {
                debug!("authenticating with cookie data");
                self.authenticate_cookie(cookie).await?;
            }
            AuthCredential::SafeCookie { cookie_path } => {
                debug!("authenticating with SAFECOOKIE");
                self.authenticate_safecookie(Path::new(cookie_path)).await?;
            }
        }

        debug!("authentication successful");
        Ok(())
    }

    async fn authenticate_cookie(&self, cookie: &[u8]) -> Result<()> {
        let cmd = format!("AUTHENTICATE {}", hex::encode_upper(cookie));
        self.mark_auth_sent()?;
        self.send_command(&cmd)
            .await?
            .into_result()
            .map_err(|_| ControlError::Authentication("cookie rejected".to_string()))?;
        Ok(())
    }

    async fn authenticate_safecookie(&self, cookie_path: &Path) -> Result<()> {
        let cookie = read_cookie_file(cookie_path)?;

        let client_nonce = generate_client_nonce();
        let cmd = format!(
            "AUTHCHALLENGE SAFECOOKIE {}",
            hex::encode_upper(client_nonce)
        );
        let reply = self
            .send_command(&cmd)
            .await?
            .into_result()
            .map_err(as_auth_error)?;

        let (server_hash, server_nonce) = parse_authchallenge_response(reply.first_line())?;

        // A wrong server hash means the peer does not actually know the
        // cookie; stop before revealing anything derived from it.
        if !verify_server_hash(&cookie, &client_nonce, &server_nonce, &server_hash) {
            return Err(ControlError::Authentication(
                "server hash verification failed".to_string(),
            ));
        }

        let client_hash = compute_client_hash(&cookie, &client_nonce, &server_nonce);
        let cmd = format!("AUTHENTICATE {}", hex::encode_upper(client_hash));
        self.mark_auth_sent()?;
        self.send_command(&cmd).await?.into_result().map_err(|_| {
            ControlError::Authentication("SAFECOOKIE response rejected".to_string())
        })?;
        Ok(())
    }

    /// Authenticate with the best method the daemon and local credentials
    /// allow: SAFECOOKIE, then COOKIE, then password, then NULL.
    pub async fn auto_authenticate(&self) -> Result<ProtocolInfo> {
        let info = self.protocol_info().await?;
        let credential = choose_credential(
            &info,
            self.inner.config.password.as_deref(),
            self.inner.config.cookie_file.as_deref(),
        )?;
        self.authenticate(&credential).await?;
        Ok(info)
    }

    // ==================== Commands ====================

    /// Get a single value with GETINFO.
    pub async fn get_info(&self, key: &str) -> Result<String> {
        let cmd = format_command("GETINFO", &[key]);
        let reply = self.send_command(&cmd).await?.into_result()?;

        for line in &reply.lines {
            if let Some(value) = line.text.strip_prefix(&format!("{}=", key)) {
                if value.is_empty() {
                    if let Some(data) = &line.data {
                        return Ok(data.clone());
                    }
                }
                return Ok(value.to_string());
            }
        }

        Err(ControlError::Parse(format!(
            "key '{}' not found in GETINFO reply",
            key
        )))
    }

    /// Get several values with one GETINFO.
    pub async fn get_info_multi(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let cmd = format_command("GETINFO", keys);
        let reply = self.send_command(&cmd).await?.into_result()?;

        let mut values = HashMap::new();
        for line in &reply.lines {
            if let Some((key, value)) = line.text.split_once('=') {
                let value = match (&line.data, value.is_empty()) {
                    (Some(data), true) => data.clone(),
                    _ => value.to_string(),
                };
                values.insert(key.to_string(), value);
            }
        }
        Ok(values)
    }

    /// Get a configuration value; `None` when the option is set but empty.
    pub async fn get_conf(&self, key: &str) -> Result<Option<String>> {
        let cmd = format_command("GETCONF", &[key]);
        let reply = self.send_command(&cmd).await?.into_result()?;

        for line in &reply.lines {
            if let Some(value) = line.text.strip_prefix(&format!("{}=", key)) {
                return Ok(Some(value.to_string()));
            }
            if line.text == key {
                return Ok(None);
            }
        }
        Ok(None)
    }

    /// Set a configuration value.
    pub async fn set_conf(&self, key: &str, value: &str) -> Result<()> {
        let arg = format!("{}={}", key, quote_string(value));
        let cmd = format_command("SETCONF", &[&arg]);
        self.send_command(&cmd).await?.into_result()?;
        Ok(())
    }

    /// Reset a configuration value to its default.
    pub async fn reset_conf(&self, key: &str) -> Result<()> {
        let cmd = format_command("RESETCONF", &[key]);
        self.send_command(&cmd).await?.into_result()?;
        Ok(())
    }

    /// Replace the daemon configuration with the given text, as a
    /// data-block command.
    pub async fn load_conf(&self, config_text: &str) -> Result<()> {
        let cmd = format_command_with_data("LOADCONF", &[], config_text);
        self.send_command(&cmd).await?.into_result()?;
        Ok(())
    }

    /// Deliver a signal.
    pub async fn signal(&self, signal: Signal) -> Result<()> {
        let cmd = format_command("SIGNAL", &[signal.as_str()]);
        self.send_command(&cmd).await?.into_result()?;
        Ok(())
    }

    /// Request fresh circuits for subsequent streams.
    pub async fn new_identity(&self) -> Result<()> {
        self.signal(Signal::NewNym).await
    }

    /// Replace the set of delivered event types.
    pub async fn set_events(&self, events: &[EventType]) -> Result<()> {
        let names: Vec<&str> = events.iter().map(|e| e.as_str()).collect();
        let cmd = format_command("SETEVENTS", &names);
        self.send_command(&cmd).await?.into_result()?;
        Ok(())
    }

    /// Make the daemon exit when this connection closes.
    pub async fn take_ownership(&self) -> Result<()> {
        self.send_command("TAKEOWNERSHIP").await?.into_result()?;
        Ok(())
    }

    /// The current bootstrap phase.
    pub async fn bootstrap_phase(&self) -> Result<BootstrapStatus> {
        self.get_info("status/bootstrap-phase").await?.parse()
    }

    /// Wait until the daemon has an established circuit.
    ///
    /// Polls once, then waits for a STATUS_CLIENT CIRCUIT_ESTABLISHED
    /// event; the caller must have STATUS_CLIENT enabled via
    /// [`TorController::set_events`] for the event path to fire.
    pub async fn wait_until_circuit_established(&self) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = self.subscribe(EventType::StatusClient, move |event| {
            if let Event::Status(status) = event {
                if status.action == "CIRCUIT_ESTABLISHED" {
                    let _ = tx.send(());
                }
            }
        });

        let wait = async {
            let established = self.get_info("status/circuit-established").await?;
            if established.trim() == "1" {
                return Ok(());
            }
            // Observers are dropped on teardown, so this ends rather than
            // hanging when the connection dies.
            rx.recv().await.ok_or(ControlError::ConnectionClosed)
        };
        let result = wait.await;
        self.unsubscribe(id);
        result
    }

    // ==================== Onion services ====================

    /// Create an ephemeral onion service.
    ///
    /// `key` is a key blob or `NEW:`-style specifier; `None` asks the
    /// daemon to generate the best available key type.
    pub async fn add_onion(
        &self,
        ports: &[(u16, Option<&str>)],
        key: Option<&str>,
        flags: &[&str],
    ) -> Result<OnionServiceInfo> {
        let mut args = vec![key.unwrap_or("NEW:BEST").to_string()];
        if !flags.is_empty() {
            args.push(format!("Flags={}", flags.join(",")));
        }
        for (virt_port, target) in ports {
            match target {
                Some(target) => args.push(format!("Port={},{}", virt_port, target)),
                None => args.push(format!("Port={}", virt_port)),
            }
        }

        let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        let cmd = format_command("ADD_ONION", &arg_refs);
        let reply = self.send_command(&cmd).await?.into_result()?;

        let mut service_id = String::new();
        let mut private_key = None;
        for line in &reply.lines {
            if let Some(id) = line.text.strip_prefix("ServiceID=") {
                service_id = id.to_string();
            } else if let Some(key) = line.text.strip_prefix("PrivateKey=") {
                private_key = Some(key.to_string());
            }
        }

        Ok(OnionServiceInfo {
            address: OnionAddress::new(service_id),
            private_key,
        })
    }

    /// Remove an ephemeral onion service created on this connection.
    pub async fn del_onion(&self, service: &OnionAddress) -> Result<()> {
        let cmd = format_command("DEL_ONION", &[service.service_id()]);
        self.send_command(&cmd).await?.into_result()?;
        Ok(())
    }

    /// The key store backed by the configured authorization directory.
    pub fn auth_store(&self) -> Result<OnionAuthStore> {
        match &self.inner.config.auth_dir {
            Some(dir) => OnionAuthStore::open(dir),
            None => Err(ControlError::Config(
                "no client authorization directory configured".to_string(),
            )),
        }
    }

    /// Ensure a client authorization key pair for `service` and register it
    /// for this control session, so circuit requests to the restricted
    /// service succeed.
    pub async fn install_client_auth(
        &self,
        store: &OnionAuthStore,
        service: &OnionAddress,
    ) -> Result<AuthKeyPair> {
        if !service.is_v3() {
            return Err(ControlError::NotSupported(
                "client authorization requires a v3 onion service".to_string(),
            ));
        }

        let pair = store.ensure_key(service)?;
        let key_blob = format!("x25519:{}", pair.secret_base64());
        let cmd = format_command("ONION_CLIENT_AUTH_ADD", &[service.service_id(), &key_blob]);
        self.send_command(&cmd).await?.into_result()?;
        Ok(pair)
    }

    /// Unregister a client authorization key from this control session.
    /// Persisted key material is untouched; use
    /// [`OnionAuthStore::forget_key`] to delete it.
    pub async fn remove_client_auth(&self, service: &OnionAddress) -> Result<()> {
        let cmd = format_command("ONION_CLIENT_AUTH_REMOVE", &[service.service_id()]);
        self.send_command(&cmd).await?.into_result()?;
        Ok(())
    }

    // ==================== Events ====================

    /// Register an observer for one event type. The observer runs on the
    /// reader task and must not block.
    pub fn subscribe(
        &self,
        event_type: EventType,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.shared.dispatcher.subscribe(event_type, handler)
    }

    /// Register a catch-all observer receiving every event.
    pub fn subscribe_any(
        &self,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.shared.dispatcher.subscribe_any(handler)
    }

    /// Remove an observer.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.shared.dispatcher.unsubscribe(id)
    }

    /// A channel of every event delivered on this connection.
    ///
    /// The stream ends when the connection is torn down or the handle is
    /// dropped. Remember to enable the wanted types with SETEVENTS.
    pub fn event_stream(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe_any(move |event| {
            let _ = tx.send(event.clone());
        });
        EventStream {
            rx,
            id,
            shared: Arc::clone(&self.inner.shared),
        }
    }

    // ==================== Teardown ====================

    /// Close the connection: best-effort QUIT, then fail all outstanding
    /// commands with [`ControlError::ConnectionClosed`] and stop event
    /// delivery.
    pub async fn close(&self) {
        if !self.is_closed() {
            let _ = self
                .send_command_timeout("QUIT", Duration::from_secs(2))
                .await;
        }
        self.inner.shared.shutdown();
        if let Some(handle) = self
            .inner
            .reader
            .lock()
            .expect("reader lock poisoned")
            .take()
        {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for TorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TorController")
            .field("endpoint", &self.inner.config.address.to_string())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// An ephemeral onion service created with ADD_ONION.
#[derive(Debug, Clone)]
pub struct OnionServiceInfo {
    /// The service address.
    pub address: OnionAddress,
    /// The generated private key, unless DiscardPK was requested.
    pub private_key: Option<String>,
}

/// Receiver half of [`TorController::event_stream`].
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Event>,
    id: SubscriptionId,
    shared: Arc<Shared>,
}

impl EventStream {
    /// The next event, or `None` once the connection is torn down.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.shared.dispatcher.unsubscribe(self.id);
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}

async fn open_transport(config: &ControlConfig) -> Result<(BoxedReader, BoxedWriter)> {
    match &config.address {
        ConnectionAddress::Tcp(addr) => {
            let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
                .await
                .map_err(|_| ControlError::Timeout)??;
            let (r, w) = stream.into_split();
            Ok((Box::new(r), Box::new(w)))
        }
        #[cfg(unix)]
        ConnectionAddress::Unix(path) => {
            let stream = tokio::time::timeout(
                config.connect_timeout,
                tokio::net::UnixStream::connect(path),
            )
            .await
            .map_err(|_| ControlError::Timeout)??;
            let (r, w) = stream.into_split();
            Ok((Box::new(r), Box::new(w)))
        }
        #[cfg(not(unix))]
        ConnectionAddress::Unix(_) => Err(ControlError::NotSupported(
            "unix socket endpoints are unavailable on this platform".to_string(),
        )),
    }
}

/// The dedicated reader: processes incoming bytes strictly in order for
/// the lifetime of the connection, then latches it closed.
async fn reader_task(mut read_half: BoxedReader, shared: Arc<Shared>, max_line_len: usize) {
    let mut framer = LineFramer::new(max_line_len);
    let mut parser = ReplyParser::new();
    let mut buf = vec![0u8; 4096];

    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                if !parser.is_idle() || framer.has_partial() {
                    warn!("transport ended mid-reply");
                }
                break;
            }
            Ok(n) => {
                if let Err(e) = ingest(&buf[..n], &mut framer, &mut parser, &shared) {
                    warn!(error = %e, "fatal protocol error, tearing down connection");
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "control transport read failed");
                break;
            }
        }
    }

    shared.shutdown();
}

fn ingest(
    chunk: &[u8],
    framer: &mut LineFramer,
    parser: &mut ReplyParser,
    shared: &Shared,
) -> Result<()> {
    for line in framer.push(chunk)? {
        trace!(line = %line, "line received");
        let Some(reply) = parser.feed(&line)? else {
            continue;
        };

        if reply.is_async_event() {
            shared.dispatcher.dispatch(&reply);
            continue;
        }

        let waiter = shared
            .pending
            .lock()
            .expect("pending lock poisoned")
            .pop_front();
        match waiter {
            // The receiver may already be gone (timeout or cancellation);
            // the reply is consumed either way, keeping the pairing exact.
            Some(tx) => {
                let _ = tx.send(Ok(reply));
            }
            None => {
                return Err(ControlError::Protocol(
                    "reply received with no command in flight".to_string(),
                ))
            }
        }
    }
    Ok(())
}

/// Append the line terminator unless the command is already framed (e.g.
/// data-block commands from [`format_command_with_data`]).
fn normalize_command(command: &str) -> String {
    if command.ends_with("\r\n") {
        command.to_string()
    } else {
        format!("{}\r\n", command)
    }
}

fn first_keyword(command: &str) -> &str {
    command
        .trim_start_matches('+')
        .split([' ', '\r'])
        .next()
        .unwrap_or("")
}

fn as_auth_error(e: ControlError) -> ControlError {
    match e {
        ControlError::CommandRejected { code, message } => {
            ControlError::Authentication(format!("daemon rejected handshake ({}): {}", code, message))
        }
        other => other,
    }
}
