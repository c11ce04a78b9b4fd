// src/session.rs
//
// Serial session manager: owns one connection's lifecycle.
// Connect opens the port and starts a background read loop; decoded text
// flows to the Monitor and the status sink; disconnect cancels the loop
// and releases the port on every path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::io::error::LinkError;
use crate::io::serial::{PortOpener, SerialConfig, SerialLink, StreamDecoder, SystemPortOpener};
use crate::monitor::Monitor;

/// Slice length for the read loop's pacing wait. Cancellation and queued
/// writes are observed once per slice, not once per poll interval.
const POLL_SLICE: Duration = Duration::from_millis(10);

/// Lock a mutex, recovering from poisoning. A poisoned lock only means a
/// panicked holder; the values guarded here stay structurally sound.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// Types and Configuration
// ============================================================================

/// Connection lifecycle state. Transitions are strictly sequential:
/// Disconnected → Connecting → Connected → Disconnecting → Disconnected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Session configuration.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// OS port name. Device selection happens out-of-band (see `list_ports`);
    /// `None` fails connect with `NoDeviceSelected`.
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Wait after opening before traffic, letting the peer finish its own
    /// boot/reset sequence (microcontrollers reset on port open).
    pub settle_delay: Duration,
    /// Pacing between read attempts.
    pub poll_interval: Duration,
    /// Blocking-read timeout inside the loop; bounds how long cancellation
    /// can be outrun by an idle read.
    pub read_timeout: Duration,
    /// Opaque secret from the account tier; when set it is transmitted as
    /// the first line right after the settle delay.
    pub secret: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            port: None,
            baud_rate: 9600,
            settle_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(1),
            read_timeout: Duration::from_millis(50),
            secret: None,
        }
    }
}

// ============================================================================
// Status Sink
// ============================================================================

/// Where the session reports state transitions and errors.
/// Calls are fire-and-forget; implementations must not block.
pub trait StatusSink: Send + Sync {
    fn on_connected(&self);
    fn on_disconnected(&self, reason: &str);
    fn on_error(&self, message: &str);
    /// Decoded inbound text, forwarded in arrival order.
    fn on_data(&self, _text: &str) {}
}

/// Sink that routes status transitions to the log.
pub struct LogSink;

impl StatusSink for LogSink {
    fn on_connected(&self) {
        tlog!("[session] Connected");
    }

    fn on_disconnected(&self, reason: &str) {
        tlog!("[session] Disconnected: {}", reason);
    }

    fn on_error(&self, message: &str) {
        tlog!("[session] Error: {}", message);
    }
}

// ============================================================================
// Session Manager
// ============================================================================

/// Outstanding write handed to the read-loop thread.
/// The bounded channel enforces at most one in flight.
struct WriteRequest {
    data: Vec<u8>,
    result_tx: oneshot::Sender<Result<(), LinkError>>,
}

/// Manages one serial connection: connect, background read loop, write,
/// disconnect. Owns the only live link handle; callers hold the session
/// (typically in an `Arc`) instead of any port state.
pub struct SerialSession {
    config: SessionConfig,
    state: Mutex<SessionState>,
    cancel_flag: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
    write_tx: Mutex<Option<SyncSender<WriteRequest>>>,
    monitor: Monitor,
    sink: Arc<dyn StatusSink>,
    opener: Box<dyn PortOpener>,
}

impl SerialSession {
    pub fn new(config: SessionConfig, sink: Arc<dyn StatusSink>) -> Self {
        Self::with_opener(config, sink, Box::new(SystemPortOpener))
    }

    /// Build a session over a custom link opener (alternate transports,
    /// scripted links in tests).
    pub fn with_opener(
        config: SessionConfig,
        sink: Arc<dyn StatusSink>,
        opener: Box<dyn PortOpener>,
    ) -> Self {
        SerialSession {
            config,
            state: Mutex::new(SessionState::Disconnected),
            cancel_flag: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
            write_tx: Mutex::new(None),
            monitor: Monitor::new(),
            sink,
            opener,
        }
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    /// Handle to the display log the read loop appends to.
    pub fn monitor(&self) -> Monitor {
        self.monitor.clone()
    }

    /// Open the configured port and start reading.
    ///
    /// Valid only from `Disconnected`. On failure the session stays
    /// `Disconnected` and the sink is notified; retries are caller-driven.
    pub async fn connect(&self) -> Result<(), LinkError> {
        {
            let mut state = lock(&self.state);
            if *state != SessionState::Disconnected {
                return Err(LinkError::AlreadyConnected);
            }
            *state = SessionState::Connecting;
        }

        let port = match self.config.port.as_deref() {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => {
                *lock(&self.state) = SessionState::Disconnected;
                self.sink.on_error("No port selected or port is unavailable");
                return Err(LinkError::NoDeviceSelected);
            }
        };

        let serial_config = SerialConfig {
            port: port.clone(),
            baud_rate: self.config.baud_rate,
            read_timeout: self.config.read_timeout,
        };
        let link = match self.opener.open(&serial_config) {
            Ok(link) => link,
            Err(e) => {
                *lock(&self.state) = SessionState::Disconnected;
                self.sink.on_error(&format!("Failed to open {}: {}", port, e));
                return Err(e);
            }
        };

        tokio::time::sleep(self.config.settle_delay).await;

        {
            let mut state = lock(&self.state);
            if *state != SessionState::Connecting {
                // disconnect() ran during the settle wait; release the
                // just-opened port ourselves.
                drop(state);
                link.close();
                tlog!("[session:{}] Connect aborted during settle wait", port);
                return Err(LinkError::Cancelled);
            }
            *state = SessionState::Connected;
        }

        let (write_tx, write_rx) = mpsc::sync_channel(1);
        *lock(&self.write_tx) = Some(write_tx);
        self.cancel_flag.store(false, Ordering::Relaxed);

        let handle = spawn_link_task(
            link,
            port.clone(),
            self.monitor.clone(),
            self.sink.clone(),
            self.cancel_flag.clone(),
            write_rx,
            self.config.poll_interval,
        );
        *lock(&self.task) = Some(handle);

        tlog!("[session:{}] Connected at {} baud", port, self.config.baud_rate);
        self.sink.on_connected();

        // Transmitter role: the link secret goes out as the first line
        if let Some(secret) = self.config.secret.clone() {
            if let Err(e) = self.write(&secret).await {
                self.sink.on_error(&format!("Failed to send link secret: {}", e));
            }
        }

        Ok(())
    }

    /// Send one line to the peer. The message is trimmed and a single `\n`
    /// appended. Valid only while `Connected`; at most one write may be in
    /// flight (`WriteBusy` otherwise).
    pub async fn write(&self, message: &str) -> Result<(), LinkError> {
        if *lock(&self.state) != SessionState::Connected {
            return Err(LinkError::NotConnected);
        }
        let tx = match lock(&self.write_tx).as_ref() {
            Some(tx) => tx.clone(),
            None => return Err(LinkError::NotConnected),
        };

        let mut data = message.trim().as_bytes().to_vec();
        data.push(b'\n');

        let (result_tx, result_rx) = oneshot::channel();
        match tx.try_send(WriteRequest { data, result_tx }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => return Err(LinkError::WriteBusy),
            Err(TrySendError::Disconnected(_)) => return Err(LinkError::NotConnected),
        }

        // The loop thread reports completion; a dropped channel means the
        // loop exited before servicing the request.
        match result_rx.await {
            Ok(result) => result,
            Err(_) => Err(LinkError::NotConnected),
        }
    }

    /// Stop reading, release the port, clear the display log.
    ///
    /// Valid from `Connected` or `Connecting`; anywhere else returns
    /// `NotConnected` without touching state. The port close happens-after
    /// the read loop has acknowledged cancellation (task join).
    pub async fn disconnect(&self) -> Result<(), LinkError> {
        {
            let mut state = lock(&self.state);
            match *state {
                SessionState::Connected => *state = SessionState::Disconnecting,
                SessionState::Connecting => {
                    // No read loop yet. The pending connect() observes this
                    // transition, closes the link itself and returns Cancelled.
                    *state = SessionState::Disconnected;
                    drop(state);
                    self.monitor.clear();
                    self.sink.on_disconnected("port disconnected");
                    return Ok(());
                }
                _ => return Err(LinkError::NotConnected),
            }
        }

        self.cancel_flag.store(true, Ordering::Relaxed);
        *lock(&self.write_tx) = None;
        let task = lock(&self.task).take();
        if let Some(task) = task {
            let _ = task.await;
        }

        self.monitor.clear();
        *lock(&self.state) = SessionState::Disconnected;
        self.sink.on_disconnected("port disconnected");
        Ok(())
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        // Stop a read loop left running if the owner never disconnected.
        // The loop closes the port on its way out.
        self.cancel_flag.store(true, Ordering::Relaxed);
    }
}

// ============================================================================
// Read Loop
// ============================================================================

/// Spawn the background read-loop task for an opened link.
fn spawn_link_task(
    link: Box<dyn SerialLink>,
    port: String,
    monitor: Monitor,
    sink: Arc<dyn StatusSink>,
    cancel_flag: Arc<AtomicBool>,
    write_rx: Receiver<WriteRequest>,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let sink_for_panic = sink.clone();
        let port_for_panic = port.clone();

        // Blocking serial I/O runs on a dedicated thread
        let result = tokio::task::spawn_blocking(move || {
            run_link_blocking(link, port, monitor, sink, cancel_flag, write_rx, poll_interval)
        })
        .await;

        if result.is_err() {
            tlog!("[link:{}] Read loop panicked", port_for_panic);
            sink_for_panic.on_error("serial read loop panicked");
        }
    })
}

/// Blocking read loop. Paces reads by the poll interval, drains queued
/// writes between reads, and exits on cancellation, end-of-stream, or a
/// read error. The link is closed on every exit path.
fn run_link_blocking(
    mut link: Box<dyn SerialLink>,
    port: String,
    monitor: Monitor,
    sink: Arc<dyn StatusSink>,
    cancel_flag: Arc<AtomicBool>,
    write_rx: Receiver<WriteRequest>,
    poll_interval: Duration,
) {
    let mut decoder = StreamDecoder::new();
    let mut buf = [0u8; 256];
    let exit_reason;

    'link: loop {
        // Pace the next read, draining writes and watching the cancel flag
        // in short slices so neither waits out the full poll interval.
        let deadline = Instant::now() + poll_interval;
        loop {
            if cancel_flag.load(Ordering::Relaxed) {
                exit_reason = "stopped";
                break 'link;
            }
            while let Ok(req) = write_rx.try_recv() {
                let result = link
                    .write_all(&req.data)
                    .map_err(|e| LinkError::Io(e.to_string()));
                let _ = req.result_tx.send(result);
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(POLL_SLICE.min(deadline - now));
        }

        match link.read(&mut buf) {
            Ok(0) => {
                // Peer end torn down; not an error
                tlog!("[link:{}] Stream ended", port);
                exit_reason = "stream ended";
                break;
            }
            Ok(n) => {
                let text = decoder.feed(&buf[..n]);
                if !text.is_empty() {
                    monitor.append(&text);
                    sink.on_data(&text);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                // No data inside the poll window
            }
            Err(e) => {
                // The session stays Connected with no reader; the caller
                // recovers with disconnect()/connect().
                tlog!("[link:{}] Read error: {}", port, e);
                sink.on_error(&format!("Read error: {}", e));
                exit_reason = "error";
                break;
            }
        }
    }

    decoder.reset();
    link.close();
    tlog!("[link:{}] Read loop exited ({})", port, exit_reason);
}

// ============================================================================
// Tests
// ============================================================================
