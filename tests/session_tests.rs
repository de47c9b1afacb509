//! End-to-end tests for a monitor session
//!
//! A monitor talks to an in-memory device through the real link and reader
//! thread, with trimmed lines going to an overflow file on disk.

mod common;

use std::time::{Duration, Instant};

use common::{quiet_settings, Rig, PORT};
use serial_monitor::app::{QuickSendList, Settings, SettingsRepository};
use serial_monitor::core::{OverflowFile, ANSI_PALETTE};
use serial_monitor::protocol::{ChecksumEndMode, LineEnding, QueueItem};
use serial_monitor::serial::{MemoryDevice, WatchAction};

#[test]
fn test_loopback_echo_reaches_log() {
    let mut rig = Rig::new(
        quiet_settings(),
        Box::new(String::new()),
        MemoryDevice::loopback(),
    );
    rig.monitor.connect(PORT).unwrap();
    rig.monitor.send_text("hello", LineEnding::Lf).unwrap();

    let received = rig.pump_until(Duration::from_secs(2), |m| m.buffer().line_count() >= 3);
    assert!(received);
    assert_eq!(
        rig.log_lines(),
        vec!["Connected to /dev/ttyUSB0", "[Sent] hello", "hello"]
    );
}

#[test]
fn test_style_carries_across_reads() {
    let mut rig = Rig::new(quiet_settings(), Box::new(String::new()), MemoryDevice::new());
    rig.monitor.connect(PORT).unwrap();

    // Each chunk is logged as its own line, but the style carries over
    rig.device.inject(b"\x1b[1;31m");
    assert!(rig.pump_until(Duration::from_secs(2), |m| m.buffer().current_style().bold));
    rig.device.inject(b"ALARM\x1b[0m\n");
    assert!(rig.pump_until(Duration::from_secs(2), |m| {
        m.buffer().lines().any(|l| l.text() == "ALARM")
    }));

    let line = rig
        .monitor
        .buffer()
        .lines()
        .find(|l| l.text() == "ALARM")
        .unwrap();
    assert!(line.runs[0].style.bold);
    assert!(line.runs[0].style.fg.is_some());
    assert!(rig.monitor.buffer().current_style().is_default());
}

#[test]
fn test_sequences_cut_between_reads() {
    let mut rig = Rig::new(quiet_settings(), Box::new(String::new()), MemoryDevice::new());
    rig.monitor.connect(PORT).unwrap();

    feed(&mut rig, b"ok \x1b[3");
    feed(&mut rig, b"1mred\n");
    let text = "温度\n".as_bytes();
    feed(&mut rig, &text[..2]);
    feed(&mut rig, &text[2..]);

    assert_eq!(
        rig.log_lines(),
        vec!["Connected to /dev/ttyUSB0", "ok ", "red", "温度"]
    );
    let red = rig.monitor.buffer().get(2).unwrap();
    assert_eq!(red.runs[0].style.fg, Some(ANSI_PALETTE[1]));
    // Nothing reset the color, so it carries into the next line
    let carried = rig.monitor.buffer().get(3).unwrap();
    assert_eq!(carried.runs[0].style.fg, Some(ANSI_PALETTE[1]));
}

/// Inject one read's worth of bytes and hand the resulting event over
fn feed(rig: &mut Rig, bytes: &[u8]) {
    rig.device.inject(bytes);
    let event = rig.events.recv_timeout(Duration::from_secs(2)).unwrap();
    rig.monitor.handle_link_event(event);
}

#[test]
fn test_trimmed_lines_land_in_overflow_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trimmed.log");

    let settings = Settings {
        max_terminal_lines: 10,
        trim_batch_lines: 3,
        ..quiet_settings()
    };
    let mut rig = Rig::new(settings, Box::new(OverflowFile::new(&path)), MemoryDevice::new());

    for i in 0..13 {
        rig.monitor.log(&format!("line {i}"));
    }

    assert_eq!(rig.monitor.buffer().line_count(), 10);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "line 0\nline 1\nline 2\n"
    );

    rig.monitor.set_max_lines(4);
    assert_eq!(rig.monitor.buffer().line_count(), 4);
    let spilled = std::fs::read_to_string(&path).unwrap();
    assert!(spilled.ends_with("line 7\nline 8\n"));
    assert_eq!(spilled.lines().count(), 9);
}

#[test]
fn test_sequence_with_framed_items() {
    let mut rig = Rig::new(quiet_settings(), Box::new(String::new()), MemoryDevice::new());
    rig.monitor.connect(PORT).unwrap();
    rig.monitor.set_sequence_interval(Duration::from_millis(100));
    rig.monitor.set_quick_sends(QuickSendList::from(vec![
        QueueItem::hex("AA BB CC DD").with_checksum(1, ChecksumEndMode::Minus2),
        QueueItem::text("AT").with_line_ending(LineEnding::CrLf),
        QueueItem::hex("01").with_checksum(5, ChecksumEndMode::None),
    ]));

    let t0 = Instant::now();
    rig.monitor.start_sequence(t0).unwrap();
    assert_eq!(rig.device.take_written(), vec![0xAA, 0xBB, 0x65, 0xCC, 0xDD]);

    rig.monitor.tick(t0 + Duration::from_millis(100));
    assert_eq!(rig.device.take_written(), b"AT\r\n".to_vec());

    rig.monitor.tick(t0 + Duration::from_millis(200));
    assert_eq!(rig.device.take_written(), vec![0x01]);
    assert!(!rig.monitor.is_sequence_running());

    let lines = rig.log_lines();
    assert_eq!(lines[1], "[Quick HEX] AA BB CC DD [CK:65]");
    assert_eq!(lines[2], "[Quick Send] AT");
    assert_eq!(lines[3], "[Quick HEX] 01 [CK:Invalid Range]");
}

#[test]
fn test_stop_sequence_after_first_item() {
    let mut rig = Rig::new(quiet_settings(), Box::new(String::new()), MemoryDevice::new());
    rig.monitor.connect(PORT).unwrap();
    rig.monitor.set_sequence_interval(Duration::from_millis(100));
    rig.monitor.set_quick_sends(QuickSendList::from(vec![
        QueueItem::text("1"),
        QueueItem::text("2"),
        QueueItem::text("3"),
    ]));

    let t0 = Instant::now();
    rig.monitor.start_sequence(t0).unwrap();
    assert!(rig.monitor.stop_sequence());

    assert!(!rig.monitor.tick(t0 + Duration::from_millis(100)));
    assert!(!rig.monitor.tick(t0 + Duration::from_millis(200)));
    assert_eq!(rig.device.take_written(), b"1".to_vec());
}

#[test]
fn test_unplug_and_auto_reconnect() {
    let settings = Settings {
        auto_reconnect: true,
        ..quiet_settings()
    };
    let mut rig = Rig::new(settings, Box::new(String::new()), MemoryDevice::new());
    rig.monitor.connect(PORT).unwrap();

    rig.connector.remove(PORT);
    assert_eq!(
        rig.monitor.poll_devices(),
        WatchAction::DeviceVanished(PORT.to_string())
    );

    rig.connector.add(PORT, rig.device.clone());
    assert_eq!(
        rig.monitor.poll_devices(),
        WatchAction::Reconnect(PORT.to_string())
    );
    assert!(rig.monitor.is_connected());
    assert_eq!(rig.device.open_count(), 2);

    // Data after the reconnect arrives on the new session
    rig.device.inject(b"back\n");
    assert!(rig.pump_until(Duration::from_secs(2), |m| {
        m.buffer().lines().any(|l| l.text() == "back")
    }));
}

#[test]
fn test_read_error_then_no_duplicate_notice() {
    let mut rig = Rig::new(quiet_settings(), Box::new(String::new()), MemoryDevice::new());
    rig.monitor.connect(PORT).unwrap();

    rig.device.fail_next_read("I/O error");
    assert!(rig.pump_until(Duration::from_secs(2), |m| !m.is_connected()));

    // Nothing else arrives from the dead session
    assert!(!rig.pump_until(Duration::from_millis(200), |m| m.buffer().line_count() > 2));
    let errors = rig
        .log_lines()
        .iter()
        .filter(|l| l.starts_with("Error reading data"))
        .count();
    assert_eq!(errors, 1);
}

#[test]
fn test_settings_persist_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let repo = SettingsRepository::new(dir.path());

    let mut rig = Rig::new(repo.load_settings(), Box::new(String::new()), MemoryDevice::new());
    rig.monitor.set_receive_hex_mode(true);
    rig.monitor.set_checksum(true, 2, ChecksumEndMode::Minus1);
    rig.monitor.set_batch_lines(50);
    rig.monitor
        .quick_sends_mut()
        .push(QueueItem::hex("7E 01 7E").with_checksum(2, ChecksumEndMode::Minus1));

    repo.save_settings(&rig.monitor.to_settings()).unwrap();
    repo.save_quick_sends(rig.monitor.quick_sends()).unwrap();

    let settings = repo.load_settings();
    assert!(settings.receive_hex_mode);
    assert!(settings.auto_checksum);
    assert_eq!(settings.checksum_start, 2);
    assert_eq!(settings.checksum_end_mode, ChecksumEndMode::Minus1);
    assert_eq!(settings.trim_batch_lines, 50);
    assert_eq!(&repo.load_quick_sends(), rig.monitor.quick_sends());
}
