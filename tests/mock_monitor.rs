//! End-to-end tests against a mock monitor on a loopback TCP socket.
//!
//! The mock greets like a QEMU telnet monitor (option negotiation plus
//! banner), then records every line it receives until the client signals end
//! of input. How it answers each line depends on the `Reply` mode.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use vmcli::{MonitorConfig, MonitorError};

const BANNER: &[u8] =
    b"\xff\xfb\x01\xff\xfb\x03QEMU 8.2.0 monitor - type 'help' for more information\r\n(qemu) ";

#[derive(Clone, Copy)]
enum Reply {
    /// Echo a prompt after every line.
    Prompt,
    /// Never answer.
    Silent,
    /// Close the connection after the first line.
    HangUp,
}

struct MockMonitor {
    address: String,
    handle: JoinHandle<Vec<String>>,
}

impl MockMonitor {
    fn start(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve(stream, reply)
        });

        Self { address, handle }
    }

    fn config(&self, pacing: Duration) -> MonitorConfig {
        MonitorConfig {
            address: self.address.clone(),
            pacing_timeout: pacing,
            ..MonitorConfig::default()
        }
    }

    /// Lines the monitor received.
    fn lines(self) -> Vec<String> {
        self.handle.join().unwrap()
    }
}

fn serve(mut stream: TcpStream, reply: Reply) -> Vec<String> {
    stream.write_all(BANNER).unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut lines = Vec::new();

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => lines.push(line.trim_end().to_string()),
        }
        match reply {
            Reply::Prompt => {
                let echo = format!("{}\r\n(qemu) ", line.trim_end());
                if stream.write_all(echo.as_bytes()).is_err() {
                    break;
                }
            }
            Reply::Silent => {}
            Reply::HangUp => break,
        }
    }
    lines
}

#[test]
fn send_input_types_every_key_in_order() {
    let monitor = MockMonitor::start(Reply::Prompt);
    let report = vmcli::send_input(&monitor.config(Duration::from_secs(2)), "Hi.\n", false).unwrap();

    assert_eq!(report.sent, 4);
    assert_eq!(
        monitor.lines(),
        vec!["sendkey shift-h", "sendkey i", "sendkey dot", "sendkey kp_enter"]
    );
}

#[test]
fn send_input_continues_when_monitor_is_silent() {
    let monitor = MockMonitor::start(Reply::Silent);
    let report =
        vmcli::send_input(&monitor.config(Duration::from_millis(50)), "ab\\n", false).unwrap();

    assert_eq!(report.sent, 3);
    assert_eq!(report.cancelled_reads, 3);
    assert_eq!(
        monitor.lines(),
        vec!["sendkey a", "sendkey b", "sendkey kp_enter"]
    );
}

#[test]
fn send_input_stops_when_monitor_hangs_up() {
    let monitor = MockMonitor::start(Reply::HangUp);
    let err =
        vmcli::send_input(&monitor.config(Duration::from_secs(5)), "abc", false).unwrap_err();

    assert!(err.is_connection(), "unexpected error: {err}");
    assert_eq!(monitor.lines(), vec!["sendkey a"]);
}

#[test]
fn send_input_raw_sends_one_key() {
    let monitor = MockMonitor::start(Reply::Prompt);
    vmcli::send_input(&monitor.config(Duration::from_secs(2)), "ctrl-alt-f1", true).unwrap();
    assert_eq!(monitor.lines(), vec!["sendkey ctrl-alt-f1"]);
}

#[test]
fn screenshot_sends_absolute_path() {
    let monitor = MockMonitor::start(Reply::Silent);
    let path = vmcli::screenshot(
        &monitor.config(Duration::from_millis(50)),
        std::path::Path::new("shot.ppm"),
    )
    .unwrap();

    let expected = std::env::current_dir().unwrap().join("shot.ppm");
    assert_eq!(path, expected);
    assert_eq!(
        monitor.lines(),
        vec![format!("screendump {}", expected.display())]
    );
}

#[test]
fn reboot_sends_system_reset() {
    let monitor = MockMonitor::start(Reply::Silent);
    vmcli::reboot(&monitor.config(Duration::from_millis(50))).unwrap();
    assert_eq!(monitor.lines(), vec!["system_reset"]);
}

#[test]
fn connect_refused_is_connection_error() {
    let address = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let config = MonitorConfig {
        address,
        ..MonitorConfig::default()
    };
    let err = vmcli::reboot(&config).unwrap_err();
    assert!(matches!(err, MonitorError::Connection { .. }));
}
