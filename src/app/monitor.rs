//! Control-thread facade
//!
//! [`Monitor`] owns everything the UI thread mutates: the log buffer, the
//! serial link, the sequenced sender and the connection watch. Each method
//! is a plain synchronous call; the caller wires reader events, timers and
//! user input to them however it dispatches events.

use std::time::{Duration, Instant};

use super::{QuickSendList, SendError, Settings};
use crate::core::{OverflowSink, TerminalBuffer};
use crate::protocol::{
    build_frame, parse_payload, sum_checksum, ChecksumEndMode, Frame, LineEnding, PayloadResult,
    QueueItem, ReceiveDecoder,
};
use crate::sender::SequencedSender;
use crate::serial::{
    ConnectionWatch, LinkError, LinkEvent, LinkInput, LinkResult, PortParams, SerialLink,
    WatchAction,
};

/// Serial monitor state driven from one thread
#[derive(Debug)]
pub struct Monitor {
    buffer: TerminalBuffer,
    link: SerialLink,
    /// Bytes of a cut character or escape from the previous read
    decoder: ReceiveDecoder,
    sender: SequencedSender,
    watch: ConnectionWatch,
    /// Unsolicited disconnect not yet taken by the front end
    link_error: Option<LinkError>,
    settings: Settings,
    quick_sends: QuickSendList,
}

impl Monitor {
    pub fn new(settings: Settings, link: SerialLink, sink: Box<dyn OverflowSink>) -> Self {
        let mut buffer = TerminalBuffer::new(settings.trim_policy(), sink);
        buffer.set_colors_enabled(settings.enable_ansi_colors);
        buffer.set_timestamps_enabled(settings.show_timestamp);

        Self {
            buffer,
            link,
            decoder: ReceiveDecoder::new(),
            sender: SequencedSender::default(),
            watch: ConnectionWatch::new(settings.auto_reconnect),
            link_error: None,
            settings,
            quick_sends: QuickSendList::new(),
        }
    }

    pub fn buffer(&self) -> &TerminalBuffer {
        &self.buffer
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn link(&self) -> &SerialLink {
        &self.link
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_open()
    }

    pub fn is_sequence_running(&self) -> bool {
        self.sender.is_running()
    }

    pub fn quick_sends(&self) -> &QuickSendList {
        &self.quick_sends
    }

    pub fn quick_sends_mut(&mut self) -> &mut QuickSendList {
        &mut self.quick_sends
    }

    pub fn set_quick_sends(&mut self, list: QuickSendList) {
        self.quick_sends = list;
    }

    /// Append a timestamped message line to the log
    pub fn log(&mut self, message: &str) {
        let mut text = message.to_string();
        text.push('\n');
        self.append(&text);
    }

    fn append(&mut self, text: &str) {
        if let Err(e) = self.buffer.append(text, true) {
            tracing::warn!("Log append kept overflow lines in memory: {}", e);
        }
    }

    /// Open `port` with the current port settings.
    ///
    /// A no-op when already connected. Applies the saved DTR/RTS levels.
    pub fn connect(&mut self, port: &str) -> LinkResult<()> {
        if self.link.is_open() {
            return Ok(());
        }

        self.link.open(port, self.settings.port_params())?;
        self.watch.connected(port);

        if let Err(e) = self.link.set_dtr(self.settings.dtr_state) {
            tracing::warn!("Failed to set DTR on {}: {}", port, e);
        }
        if let Err(e) = self.link.set_rts(self.settings.rts_state) {
            tracing::warn!("Failed to set RTS on {}: {}", port, e);
        }

        self.log(&format!("Connected to {port}"));
        Ok(())
    }

    /// User-initiated disconnect; suppresses auto-reconnect
    pub fn disconnect(&mut self) {
        self.watch.manual_disconnect();
        if self.link.is_open() {
            self.close_link(None);
        }
    }

    /// Close the link and log why. `reason` is `None` for a user
    /// disconnect; an unplug and a read failure share this path and differ
    /// only in the message.
    fn close_link(&mut self, reason: Option<LinkError>) {
        self.sender.stop();
        self.link.close();

        // The stream has ended, so nothing will complete a held sequence
        if let Some(text) = self.decoder.flush(self.settings.receive_hex_mode) {
            self.append(&text);
        }
        if let Err(e) = self.buffer.flush_pending() {
            tracing::warn!("Log append kept overflow lines in memory: {}", e);
        }

        match &reason {
            None => self.log("Disconnected"),
            Some(LinkError::DeviceVanished(port)) => {
                self.log(&format!("Device {port} disconnected"))
            }
            Some(e) => self.log(&format!("Error reading data: {e}")),
        }
        if reason.is_some() {
            self.link_error = reason;
        }
    }

    /// Why the link last closed without the user asking, if that has not
    /// been reported yet
    pub fn take_link_error(&mut self) -> Option<LinkError> {
        self.link_error.take()
    }

    /// Process one event from the reader thread
    pub fn handle_link_event(&mut self, event: LinkEvent) {
        match self.link.accept(event) {
            Some(LinkInput::Bytes(bytes)) => {
                if let Some(text) = self.decoder.decode(&bytes, self.settings.receive_hex_mode) {
                    self.append(&text);
                }
            }
            Some(LinkInput::Lost(e)) => self.close_link(Some(e)),
            None => {}
        }
    }

    /// Send the main input box contents with the current hex and checksum
    /// settings.
    ///
    /// Errors are returned for the caller to show; nothing is logged.
    pub fn send_text(&mut self, text: &str, line_ending: LineEnding) -> Result<(), SendError> {
        if !self.link.is_open() {
            return Err(SendError::NotConnected);
        }
        if text.is_empty() {
            return Err(SendError::EmptyInput);
        }

        let frame = build_frame(
            text,
            self.settings.send_hex_mode,
            line_ending,
            self.settings.checksum_spec(),
        )?;
        self.link.write(&frame.bytes)?;

        let tag = if self.settings.send_hex_mode {
            "[Sent HEX]"
        } else {
            "[Sent]"
        };
        self.log(&format!("{tag} {text}{}", frame.echo_suffix()));
        Ok(())
    }

    /// Send one quick-send item.
    ///
    /// Decode and write failures are also logged, so a running sequence
    /// leaves a trace of the items that did not go out.
    pub fn send_item(&mut self, item: &QueueItem) -> Result<(), SendError> {
        if !self.link.is_open() {
            return Err(SendError::NotConnected);
        }

        match self.write_item(item) {
            Ok(frame) => {
                let tag = if item.is_hex {
                    "[Quick HEX]"
                } else {
                    "[Quick Send]"
                };
                self.log(&format!("{tag} {}{}", item.content, frame.echo_suffix()));
                Ok(())
            }
            Err(e) => {
                self.log(&format!("[Error] Send failed: {e}"));
                Err(e)
            }
        }
    }

    fn write_item(&mut self, item: &QueueItem) -> Result<Frame, SendError> {
        let frame = item.build()?;
        self.link.write(&frame.bytes)?;
        Ok(frame)
    }

    /// Send the checked quick-send items, the first one now and the rest
    /// on the sender's interval
    pub fn start_sequence(&mut self, now: Instant) -> Result<(), SendError> {
        if !self.link.is_open() {
            return Err(SendError::NotConnected);
        }
        let first = self.sender.start(self.quick_sends.items(), now)?;
        // Failures are logged by send_item; the sequence carries on
        let _ = self.send_item(&first);
        Ok(())
    }

    /// Returns false when no sequence was running
    pub fn stop_sequence(&mut self) -> bool {
        self.sender.stop()
    }

    pub fn sequence_interval(&self) -> Duration {
        self.sender.interval()
    }

    /// Clamped to 10 ms..=10 s
    pub fn set_sequence_interval(&mut self, interval: Duration) {
        self.sender.set_interval(interval);
    }

    /// When [`tick`](Self::tick) next has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        self.sender.next_deadline()
    }

    /// Send the next sequence item if it is due. Returns true if one was
    /// attempted.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.sender.poll(now) {
            Some(item) => {
                if !self.link.is_open() {
                    self.sender.stop();
                    return false;
                }
                let _ = self.send_item(&item);
                true
            }
            None => false,
        }
    }

    /// Compare the enumerated ports with the link and act on the result.
    /// Meant to be called about once per second.
    pub fn poll_devices(&mut self) -> WatchAction {
        let available = self.link.available_ports();
        let action = self.watch.check(self.link.port_name(), &available);

        match &action {
            WatchAction::Idle => {}
            WatchAction::DeviceVanished(port) => {
                tracing::info!("Port {} is no longer present", port);
                self.close_link(Some(LinkError::DeviceVanished(port.clone())));
            }
            WatchAction::Reconnect(port) => {
                self.log(&format!("Attempting to reconnect to {port}..."));
                if let Err(e) = self.connect(port) {
                    tracing::warn!("Reconnect to {} failed: {}", port, e);
                }
            }
        }
        action
    }

    /// Preview of the whole-payload checksum for the input box: `None` for
    /// empty input, `"XX (0xXX)"` otherwise
    pub fn checksum_preview(&self, text: &str) -> Option<PayloadResult<String>> {
        if text.is_empty() {
            return None;
        }
        Some(
            parse_payload(text, self.settings.send_hex_mode).map(|bytes| {
                let ck = sum_checksum(&bytes);
                format!("{ck:02X} (0x{ck:02X})")
            }),
        )
    }

    /// Snapshot of the settings to persist
    pub fn to_settings(&self) -> Settings {
        let mut settings = self.settings.clone();
        let policy = self.buffer.policy();
        settings.trim_enabled = policy.enabled;
        settings.max_terminal_lines = policy.max_lines;
        settings.trim_batch_lines = policy.batch_lines;
        settings.auto_reconnect = self.watch.auto_reconnect();
        if let Some(params) = self.link.params() {
            settings.set_port_params(params);
        }
        settings
    }

    pub fn set_port_params(&mut self, params: PortParams) {
        self.settings.set_port_params(params);
    }

    pub fn set_receive_hex_mode(&mut self, enabled: bool) {
        self.settings.receive_hex_mode = enabled;
    }

    pub fn set_send_hex_mode(&mut self, enabled: bool) {
        self.settings.send_hex_mode = enabled;
    }

    pub fn set_show_timestamp(&mut self, enabled: bool) {
        self.settings.show_timestamp = enabled;
        self.buffer.set_timestamps_enabled(enabled);
    }

    pub fn set_ansi_colors(&mut self, enabled: bool) {
        self.settings.enable_ansi_colors = enabled;
        self.buffer.set_colors_enabled(enabled);
    }

    pub fn set_auto_scroll(&mut self, enabled: bool) {
        self.settings.auto_scroll = enabled;
    }

    pub fn set_auto_reconnect(&mut self, enabled: bool) {
        self.settings.auto_reconnect = enabled;
        self.watch.set_auto_reconnect(enabled);
    }

    /// Checksum for the main send box
    pub fn set_checksum(&mut self, enabled: bool, start: usize, end_mode: ChecksumEndMode) {
        self.settings.auto_checksum = enabled;
        self.settings.checksum_start = start.max(1);
        self.settings.checksum_end_mode = end_mode;
    }

    /// Stored even while disconnected; applied on the next connect
    pub fn set_dtr(&mut self, level: bool) -> LinkResult<()> {
        self.settings.dtr_state = level;
        if self.link.is_open() {
            self.link.set_dtr(level)?;
        }
        Ok(())
    }

    pub fn set_rts(&mut self, level: bool) -> LinkResult<()> {
        self.settings.rts_state = level;
        if self.link.is_open() {
            self.link.set_rts(level)?;
        }
        Ok(())
    }

    pub fn set_trim_enabled(&mut self, enabled: bool) {
        self.buffer.set_trim_enabled(enabled);
    }

    /// Lowering the cap trims right away
    pub fn set_max_lines(&mut self, max_lines: usize) {
        if let Err(e) = self.buffer.set_max_lines(max_lines) {
            tracing::warn!("Trim after lowering the line cap failed: {}", e);
        }
    }

    pub fn set_batch_lines(&mut self, batch_lines: usize) {
        self.buffer.set_batch_lines(batch_lines);
    }

    /// Clear the log
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
