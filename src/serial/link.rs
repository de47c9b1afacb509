//! Link lifecycle and the reader thread

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{
    Connector, LinkError, LinkEvent, LinkInput, LinkResult, PortParams, SerialIo, SessionId,
};

/// Bytes requested per read
pub const READ_CHUNK: usize = 4096;

/// How long `close` waits for the reader thread before detaching it
pub const CLOSE_WAIT: Duration = Duration::from_millis(500);

/// Receives reader events on the reader thread
pub type EventCallback = Arc<dyn Fn(LinkEvent) + Send + Sync>;

struct ActiveLink {
    session: SessionId,
    port_name: String,
    params: PortParams,
    io: Box<dyn SerialIo>,
    stop: Arc<AtomicBool>,
    /// Disconnects when the reader thread returns
    exited: mpsc::Receiver<()>,
    reader: Option<JoinHandle<()>>,
}

/// One serial connection at a time, with a background reader
pub struct SerialLink {
    connector: Box<dyn Connector>,
    on_event: EventCallback,
    next_session: SessionId,
    active: Option<ActiveLink>,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("port", &self.port_name())
            .field("session", &self.session())
            .finish()
    }
}

impl SerialLink {
    pub fn new(connector: Box<dyn Connector>, on_event: EventCallback) -> Self {
        Self {
            connector,
            on_event,
            next_session: 1,
            active: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.port_name.as_str())
    }

    pub fn params(&self) -> Option<PortParams> {
        self.active.as_ref().map(|a| a.params)
    }

    /// Session of the open link
    pub fn session(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.session)
    }

    pub fn available_ports(&self) -> Vec<String> {
        self.connector.available_ports()
    }

    /// Open `port` and start the reader. Succeeds without doing anything if
    /// a link is already open.
    pub fn open(&mut self, port: &str, params: PortParams) -> LinkResult<()> {
        if let Some(active) = &self.active {
            tracing::debug!("Open requested while {} is open; ignoring", active.port_name);
            return Ok(());
        }

        let io = self.connector.connect(port, &params)?;
        let reader_io = io.try_clone_io().map_err(|e| LinkError::PortOpenFailed {
            port: port.to_string(),
            reason: e.to_string(),
        })?;

        let session = self.next_session;
        self.next_session += 1;

        let stop = Arc::new(AtomicBool::new(false));
        let (exit_tx, exited) = mpsc::channel();
        let reader = {
            let stop = Arc::clone(&stop);
            let on_event = Arc::clone(&self.on_event);
            thread::Builder::new()
                .name(format!("serial-reader-{session}"))
                .spawn(move || {
                    // Dropped on return, which wakes `close`
                    let _exit = exit_tx;
                    read_loop(reader_io, session, &stop, on_event.as_ref());
                })?
        };

        tracing::info!(
            "Opened {} at {} baud (session {})",
            port,
            params.baud_rate,
            session
        );
        self.active = Some(ActiveLink {
            session,
            port_name: port.to_string(),
            params,
            io,
            stop,
            exited,
            reader: Some(reader),
        });
        Ok(())
    }

    /// Stop the reader and release the port.
    ///
    /// Waits up to [`CLOSE_WAIT`] for the reader; a reader stuck in the
    /// driver is detached and its late events are dropped by `accept`.
    pub fn close(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        active.stop.store(true, Ordering::Release);
        match active.exited.recv_timeout(CLOSE_WAIT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = active.reader.take() {
                    if handle.join().is_err() {
                        tracing::error!("Reader thread for {} panicked", active.port_name);
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "Reader thread for {} did not stop within {:?}, detaching",
                    active.port_name,
                    CLOSE_WAIT
                );
            }
        }
        tracing::info!("Closed {} (session {})", active.port_name, active.session);
    }

    /// Write all bytes. A failure is reported but leaves the link open.
    pub fn write(&mut self, bytes: &[u8]) -> LinkResult<()> {
        let active = self.active.as_mut().ok_or(LinkError::NotOpen)?;
        active
            .io
            .write_all(bytes)
            .and_then(|()| active.io.flush())
            .map_err(|e| LinkError::WriteFailed(e.to_string()))
    }

    pub fn set_dtr(&mut self, level: bool) -> LinkResult<()> {
        let active = self.active.as_mut().ok_or(LinkError::NotOpen)?;
        active.io.set_dtr(level)?;
        Ok(())
    }

    pub fn set_rts(&mut self, level: bool) -> LinkResult<()> {
        let active = self.active.as_mut().ok_or(LinkError::NotOpen)?;
        active.io.set_rts(level)?;
        Ok(())
    }

    /// Filter a reader event on the control thread.
    ///
    /// Events from earlier sessions are dropped. A read failure of the
    /// current session closes the link and comes back as `Lost` once.
    pub fn accept(&mut self, event: LinkEvent) -> Option<LinkInput> {
        if self.session() != Some(event.session()) {
            tracing::debug!("Dropping event from stale session {}", event.session());
            return None;
        }

        match event {
            LinkEvent::Data { bytes, .. } => Some(LinkInput::Bytes(bytes)),
            LinkEvent::ReadFailed { reason, .. } => {
                self.close();
                Some(LinkInput::Lost(LinkError::ReadFailed(reason)))
            }
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_loop(
    mut io: Box<dyn SerialIo>,
    session: SessionId,
    stop: &AtomicBool,
    on_event: &(dyn Fn(LinkEvent) + Send + Sync),
) {
    tracing::debug!("Reader for session {} started", session);
    let mut buf = vec![0u8; READ_CHUNK];

    while !stop.load(Ordering::Acquire) {
        match io.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                if stop.load(Ordering::Acquire) {
                    break;
                }
                on_event(LinkEvent::Data {
                    session,
                    bytes: buf[..n].to_vec(),
                });
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                if !stop.load(Ordering::Acquire) {
                    tracing::warn!("Read failed on session {}: {}", session, e);
                    on_event(LinkEvent::ReadFailed {
                        session,
                        reason: e.to_string(),
                    });
                }
                break;
            }
        }
    }

    tracing::debug!("Reader for session {} exiting", session);
}
