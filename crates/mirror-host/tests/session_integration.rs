//! End-to-end tests of a running host session over loopback sockets.
//!
//! Each test starts its own [`SessionController`] on ephemeral ports and
//! plays the controller side with plain blocking sockets.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, UdpSocket};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use mirror_core::protocol::{encode_control_event, DISCOVERY_REQUEST, DISCOVERY_RESPONSE};
use mirror_core::ControlEvent;
use mirror_host::application::inject_input::{InjectionError, InputSink};
use mirror_host::application::session::{SessionConfig, SessionController};
use mirror_host::infrastructure::input_injection::RecordingInputSink;
use mirror_host::infrastructure::network::video_channel::FrameDelivery;

const IO_TIMEOUT: Duration = Duration::from_secs(5);

struct Host {
    session: SessionController,
    sink: Arc<RecordingInputSink>,
}

fn start_host() -> Host {
    let sink = Arc::new(RecordingInputSink::new());
    let session =
        SessionController::new(SessionConfig::ephemeral_loopback(), sink.clone()).unwrap();
    session.start().unwrap();
    Host { session, sink }
}

fn connect(addr: std::net::SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
    stream
}

fn connect_control(host: &Host) -> (TcpStream, Vec<u8>) {
    let mut stream = connect(host.session.local_addrs().unwrap().control);
    let mut challenge = [0u8; 8];
    stream.read_exact(&mut challenge).unwrap();
    (stream, challenge.to_vec())
}

fn pair(host: &Host) -> TcpStream {
    let (mut stream, _) = connect_control(host);
    let code = host.session.pairing_code().unwrap();
    stream.write_all(code.as_bytes()).unwrap();
    stream
}

/// Connects to the video port and consumes the descriptor line.
fn connect_video(host: &Host) -> (BufReader<TcpStream>, String) {
    let stream = connect(host.session.local_addrs().unwrap().video);
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    (reader, line)
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + IO_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn is_closed(stream: &mut impl Read) -> bool {
    let mut buf = [0u8; 64];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return true,
            Ok(_) => continue,
            Err(e) => {
                return !matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                )
            }
        }
    }
}

/// What a [`CallbackSink`] does with the session once an event arrives.
#[derive(Clone, Copy)]
enum Callback {
    /// Sleeps, then reads `is_running()`.
    QueryAfter(Duration),
    /// Calls `stop()` from inside the callback.
    Stop,
}

/// A sink that calls back into the session it is installed in.
struct CallbackSink {
    session: OnceLock<Weak<SessionController>>,
    callback: Callback,
    entered: Mutex<Sender<()>>,
    finished: Mutex<Sender<bool>>,
}

impl InputSink for CallbackSink {
    fn on_control_event(&self, _event: ControlEvent) -> Result<(), InjectionError> {
        let _ = self.entered.lock().unwrap().send(());
        let Some(session) = self.session.get().and_then(Weak::upgrade) else {
            return Ok(());
        };
        let outcome = match self.callback {
            Callback::QueryAfter(pause) => {
                thread::sleep(pause);
                session.is_running()
            }
            Callback::Stop => {
                session.stop();
                session.is_running()
            }
        };
        let _ = self.finished.lock().unwrap().send(outcome);
        Ok(())
    }
}

struct CallbackHost {
    session: Arc<SessionController>,
    entered: Receiver<()>,
    finished: Receiver<bool>,
}

fn start_callback_host(callback: Callback) -> CallbackHost {
    let (entered_tx, entered) = mpsc::channel();
    let (finished_tx, finished) = mpsc::channel();
    let sink = Arc::new(CallbackSink {
        session: OnceLock::new(),
        callback,
        entered: Mutex::new(entered_tx),
        finished: Mutex::new(finished_tx),
    });
    let session = Arc::new(
        SessionController::new(SessionConfig::ephemeral_loopback(), sink.clone()).unwrap(),
    );
    let _ = sink.session.set(Arc::downgrade(&session));
    session.start().unwrap();
    CallbackHost {
        session,
        entered,
        finished,
    }
}

fn pair_with(session: &SessionController) -> TcpStream {
    let mut stream = connect(session.local_addrs().unwrap().control);
    let mut challenge = [0u8; 8];
    stream.read_exact(&mut challenge).unwrap();
    stream
        .write_all(session.pairing_code().unwrap().as_bytes())
        .unwrap();
    stream
}

// ── Discovery ─────────────────────────────────────────────────────────────────

#[test]
fn test_discovery_probe_gets_response() {
    // Arrange
    let host = start_host();
    let probe = UdpSocket::bind("127.0.0.1:0").unwrap();
    probe.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
    let mut buf = [0u8; 64];

    // Act
    probe
        .send_to(DISCOVERY_REQUEST, host.session.local_addrs().unwrap().discovery)
        .unwrap();
    let (len, _) = probe.recv_from(&mut buf).unwrap();

    // Assert
    assert_eq!(&buf[..len], DISCOVERY_RESPONSE);
}

// ── Pairing and control ───────────────────────────────────────────────────────

#[test]
fn test_control_challenge_carries_session_code() {
    let host = start_host();
    let (_stream, challenge) = connect_control(&host);
    let mut expected = b"PIN:".to_vec();
    expected.extend_from_slice(host.session.pairing_code().unwrap().as_bytes());
    assert_eq!(challenge, expected);
}

#[test]
fn test_paired_events_reach_sink_in_order() {
    // Arrange
    let host = start_host();
    let mut stream = pair(&host);
    let events = [
        ControlEvent::mouse(100, 200, 1, 1),
        ControlEvent::mouse(100, 200, 1, 0),
        ControlEvent::key(30, 1),
    ];

    // Act
    for event in &events {
        stream.write_all(&encode_control_event(event)).unwrap();
    }
    let received = host.sink.wait_for(events.len(), IO_TIMEOUT);

    // Assert
    assert_eq!(received, events.to_vec());
}

#[test]
fn test_wrong_code_closes_connection_and_dispatches_nothing() {
    // Arrange
    let host = start_host();
    let (mut stream, _) = connect_control(&host);
    let code = host.session.pairing_code().unwrap();
    let mut wrong = *code.as_bytes();
    wrong[3] = if wrong[3] == b'9' { b'0' } else { wrong[3] + 1 };

    // Act
    stream.write_all(&wrong).unwrap();
    let _ = stream.write_all(&encode_control_event(&ControlEvent::key(30, 1)));

    // Assert
    assert!(is_closed(&mut stream));
    assert!(host.sink.wait_for(1, Duration::from_millis(200)).is_empty());
}

#[test]
fn test_short_pairing_reply_closes_connection() {
    // Arrange
    let host = start_host();
    let (mut stream, _) = connect_control(&host);
    let code = host.session.pairing_code().unwrap();

    // Act
    stream.write_all(&code.as_bytes()[..3]).unwrap();
    stream.shutdown(std::net::Shutdown::Write).unwrap();

    // Assert
    assert!(is_closed(&mut stream));
    assert!(host.sink.is_empty());
}

#[test]
fn test_truncated_record_is_dropped() {
    // Arrange
    let host = start_host();
    let mut stream = pair(&host);

    // Act
    stream
        .write_all(&encode_control_event(&ControlEvent::ping(1)))
        .unwrap();
    stream.write_all(&[0x02; 9]).unwrap();
    stream.shutdown(std::net::Shutdown::Write).unwrap();

    // Assert
    assert!(is_closed(&mut stream));
    assert_eq!(host.sink.wait_for(2, Duration::from_millis(200)), vec![ControlEvent::ping(1)]);
}

#[test]
fn test_second_control_connection_supersedes_first() {
    // Arrange
    let host = start_host();
    let mut first = pair(&host);

    // Act
    let mut second = pair(&host);
    second
        .write_all(&encode_control_event(&ControlEvent::key(2, 1)))
        .unwrap();

    // Assert
    assert!(is_closed(&mut first));
    assert_eq!(host.sink.wait_for(1, IO_TIMEOUT), vec![ControlEvent::key(2, 1)]);
}

#[test]
fn test_control_peer_tracks_the_superseding_connection() {
    // Arrange
    let host = start_host();
    let _first = pair(&host);
    let second = pair(&host);
    let expected = second.local_addr().unwrap();

    // Act
    let tracked = wait_until(|| host.session.control_peer() == Some(expected));

    // Assert
    assert!(tracked);
    host.session.stop();
    assert_eq!(host.session.control_peer(), None);
}

// ── Video ─────────────────────────────────────────────────────────────────────

#[test]
fn test_video_peer_receives_descriptor_then_frames() {
    // Arrange
    let host = start_host();
    let (mut reader, line) = connect_video(&host);
    assert!(wait_until(|| host.session.video_peer().is_some()));

    // Act
    let delivery = host.session.push_video_frame(&[0xAA, 0xBB, 0xCC]);

    // Assert
    assert_eq!(line, "{\"width\":1280, \"height\":720, \"codec\":\"H.264\"}\n");
    assert_eq!(delivery, FrameDelivery::Sent);
    let mut wire = [0u8; 7];
    reader.read_exact(&mut wire).unwrap();
    assert_eq!(wire, [0x00, 0x00, 0x00, 0x03, 0xAA, 0xBB, 0xCC]);
}

#[test]
fn test_push_becomes_no_op_after_video_peer_leaves() {
    // Arrange
    let host = start_host();
    let (reader, _) = connect_video(&host);
    assert!(wait_until(|| host.session.video_peer().is_some()));

    // Act
    drop(reader);

    // Assert
    assert!(wait_until(|| host.session.video_peer().is_none()));
    assert_eq!(host.session.push_video_frame(&[1]), FrameDelivery::NoPeer);
}

#[test]
fn test_second_video_connection_supersedes_first() {
    // Arrange
    let host = start_host();
    let (mut first, _) = connect_video(&host);

    // Act
    let (mut second, line) = connect_video(&host);
    assert!(wait_until(|| {
        host.session
            .video_peer()
            .is_some_and(|peer| peer == second.get_ref().local_addr().unwrap())
    }));
    host.session.push_video_frame(&[7, 7]);

    // Assert
    assert!(line.ends_with('\n'));
    assert!(is_closed(&mut first));
    let mut wire = [0u8; 6];
    second.read_exact(&mut wire).unwrap();
    assert_eq!(wire, [0, 0, 0, 2, 7, 7]);
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

#[test]
fn test_stop_disconnects_live_peers_promptly() {
    // Arrange
    let host = start_host();
    let mut control = pair(&host);
    let (mut video, _) = connect_video(&host);
    assert!(wait_until(|| host.session.video_peer().is_some()));
    let started = Instant::now();

    // Act
    host.session.stop();

    // Assert
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(!host.session.is_running());
    assert!(is_closed(&mut control));
    assert!(is_closed(&mut video));
    assert_eq!(host.session.push_video_frame(&[1]), FrameDelivery::NoPeer);
}

#[test]
fn test_new_session_issues_fresh_listeners_after_restart() {
    // Arrange
    let host = start_host();
    host.session.stop();

    // Act
    host.session.start().unwrap();
    let (_stream, challenge) = connect_control(&host);

    // Assert
    assert!(challenge.starts_with(b"PIN:"));
    host.session.stop();
}

#[test]
fn test_stop_completes_while_sink_queries_session() {
    // Arrange
    let host = start_callback_host(Callback::QueryAfter(Duration::from_millis(300)));
    let mut stream = pair_with(&host.session);
    stream
        .write_all(&encode_control_event(&ControlEvent::key(1, 1)))
        .unwrap();
    host.entered.recv_timeout(IO_TIMEOUT).unwrap();

    // Act
    let (done_tx, done) = mpsc::channel();
    let stopping = Arc::clone(&host.session);
    thread::spawn(move || {
        stopping.stop();
        let _ = done_tx.send(());
    });

    // Assert
    assert!(done.recv_timeout(Duration::from_secs(3)).is_ok());
    assert_eq!(host.finished.recv_timeout(IO_TIMEOUT), Ok(false));
    assert!(!host.session.is_running());
    assert!(is_closed(&mut stream));
}

#[test]
fn test_stop_called_from_inside_sink_returns() {
    // Arrange
    let host = start_callback_host(Callback::Stop);
    let mut stream = pair_with(&host.session);

    // Act
    stream
        .write_all(&encode_control_event(&ControlEvent::key(1, 1)))
        .unwrap();

    // Assert
    host.entered.recv_timeout(IO_TIMEOUT).unwrap();
    assert_eq!(host.finished.recv_timeout(Duration::from_secs(3)), Ok(false));
    assert!(!host.session.is_running());
    assert!(is_closed(&mut stream));
}

#[test]
fn test_session_restarts_after_stop_from_inside_sink() {
    // Arrange
    let host = start_callback_host(Callback::Stop);
    let mut stream = pair_with(&host.session);
    stream
        .write_all(&encode_control_event(&ControlEvent::key(1, 1)))
        .unwrap();
    host.finished.recv_timeout(IO_TIMEOUT).unwrap();

    // Act
    host.session.start().unwrap();
    let mut fresh = connect(host.session.local_addrs().unwrap().control);
    let mut challenge = [0u8; 8];
    fresh.read_exact(&mut challenge).unwrap();

    // Assert
    assert!(challenge.starts_with(b"PIN:"));
    assert!(is_closed(&mut stream));
    host.session.stop();
}
