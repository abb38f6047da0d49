//! Integration tests: message delivery over every transport.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use weft_core::Reference;
use weft_mcp::{
    default_factories, DirectRegistry, DirectServer, McpClient, McpError, PostOffice, TcpClient,
    TcpServer, TcpServerConfig, TransportClient, TransportServer,
};
use weft_test_utils::{r, RecordingTimeoutHandler, TimeoutEvent};

fn tcp_config() -> TcpServerConfig {
    TcpServerConfig {
        poll_interval: Duration::from_millis(20),
        ..TcpServerConfig::default()
    }
}

/// Receive in a background thread, reporting the result on a channel.
fn receive_in_background(
    mut client: McpClient,
    receiver: Reference,
) -> crossbeam_channel::Receiver<(McpClient, Result<Vec<u8>, McpError>)> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let result = client.receive(&receiver, None);
        let _ = tx.send((client, result));
    });
    rx
}

fn verbatim_then_block(po: &PostOffice, client: McpClient) {
    let receiver = r("b[3].in");
    let payload: Vec<u8> = (0..=255u8).chain([0, 0, 255]).collect();
    po.deposit(receiver.clone(), payload.clone()).unwrap();

    let rx = receive_in_background(client, receiver.clone());
    let (client, first) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(first.unwrap(), payload);

    let rx = receive_in_background(client, receiver.clone());
    assert!(matches!(
        rx.recv_timeout(Duration::from_millis(150)),
        Err(RecvTimeoutError::Timeout)
    ));
    po.deposit(receiver, b"second".to_vec()).unwrap();
    let (_client, second) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(second.unwrap(), b"second");
}

#[test]
fn direct_delivers_verbatim_and_blocks() {
    let registry = DirectRegistry::new();
    let po = Arc::new(PostOffice::new());
    let server = DirectServer::start(&registry, po.clone()).unwrap();

    let client = McpClient::connect(&default_factories(&registry), &[server.location()]).unwrap();
    assert_eq!(client.transport(), "direct");
    verbatim_then_block(&po, client);
}

#[test]
fn tcp_delivers_verbatim_and_blocks() {
    let po = Arc::new(PostOffice::new());
    let mut server = TcpServer::start(&tcp_config(), po.clone()).unwrap();

    let factories = default_factories(&DirectRegistry::new());
    let client = McpClient::connect(&factories, &[server.location()]).unwrap();
    assert_eq!(client.transport(), "tcp");
    verbatim_then_block(&po, client);
    server.close().unwrap();
}

#[cfg(unix)]
#[test]
fn ipc_delivers_verbatim_and_blocks() {
    use weft_mcp::IpcServer;

    let po = Arc::new(PostOffice::new());
    let run = format!("transports-{}", std::process::id());
    let mut server =
        IpcServer::for_instance(&run, &r("a"), po.clone(), Duration::from_millis(20)).unwrap();

    let factories = default_factories(&DirectRegistry::new());
    let client = McpClient::connect(&factories, &[server.location()]).unwrap();
    assert_eq!(client.transport(), "ipc");
    verbatim_then_block(&po, client);
    server.close().unwrap();
}

#[test]
fn preferred_transport_wins() {
    let registry = DirectRegistry::new();
    let po = Arc::new(PostOffice::new());
    let mut tcp = TcpServer::start(&tcp_config(), po.clone()).unwrap();
    let direct = DirectServer::start(&registry, po).unwrap();

    // Locations listed network-first; direct is still preferred.
    let locations = vec![tcp.location(), direct.location()];
    let client = McpClient::connect(&default_factories(&registry), &locations).unwrap();
    assert_eq!(client.transport(), "direct");
    assert_eq!(client.location(), direct.location());
    tcp.close().unwrap();
}

#[test]
fn empty_outbox_does_not_block_other_receivers() {
    let po = Arc::new(PostOffice::new());
    let mut server = TcpServer::start(&tcp_config(), po.clone()).unwrap();
    let factories = default_factories(&DirectRegistry::new());

    let waiting = McpClient::connect(&factories, &[server.location()]).unwrap();
    let rx = receive_in_background(waiting, r("b[0].in"));

    po.deposit(r("b[1].in"), b"ready".to_vec()).unwrap();
    let mut other = McpClient::connect(&factories, &[server.location()]).unwrap();
    assert_eq!(other.receive(&r("b[1].in"), None).unwrap(), b"ready");

    po.deposit(r("b[0].in"), b"late".to_vec()).unwrap();
    let (_c, late) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(late.unwrap(), b"late");
    server.close().unwrap();
}

#[test]
fn timeout_handler_sees_timeouts_then_receive() {
    let po = Arc::new(PostOffice::new());
    let mut server = TcpServer::start(&tcp_config(), po.clone()).unwrap();
    let factories = default_factories(&DirectRegistry::new());
    let mut client = McpClient::connect(&factories, &[server.location()]).unwrap();

    let depositor = {
        let po = Arc::clone(&po);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(120));
            po.deposit(r("a.in"), b"done".to_vec()).unwrap();
        })
    };
    let mut handler = RecordingTimeoutHandler::new(Duration::from_millis(25));
    let got = client.receive(&r("a.in"), Some(&mut handler)).unwrap();
    depositor.join().unwrap();

    assert_eq!(got, b"done");
    let events = handler.events();
    assert_eq!(events.last(), Some(&TimeoutEvent::Receive));
    assert!(events[..events.len() - 1]
        .iter()
        .all(|e| *e == TimeoutEvent::Timeout));
    assert!(events.len() >= 2);
    server.close().unwrap();
}

#[test]
fn aborting_handler_ends_the_wait() {
    let registry = DirectRegistry::new();
    let po = Arc::new(PostOffice::new());
    let server = DirectServer::start(&registry, po).unwrap();
    let mut client = McpClient::connect(&default_factories(&registry), &[server.location()]).unwrap();

    let mut handler = RecordingTimeoutHandler::aborting_after(Duration::from_millis(5), 3);
    let err = client.receive(&r("a.in"), Some(&mut handler)).unwrap_err();
    assert!(matches!(err, McpError::Aborted(_)));
    assert_eq!(handler.events(), vec![TimeoutEvent::Timeout; 3]);
}

#[test]
fn server_close_releases_blocked_client() {
    let po = Arc::new(PostOffice::new());
    let mut server = TcpServer::start(&tcp_config(), po.clone()).unwrap();
    let factories = default_factories(&DirectRegistry::new());
    let client = McpClient::connect(&factories, &[server.location()]).unwrap();

    let rx = receive_in_background(client, r("nobody.in"));
    thread::sleep(Duration::from_millis(50));
    server.close().unwrap();

    let (_c, result) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(result.is_err());
    assert!(McpClient::connect(&factories, &[server.location()]).is_err());
}

#[test]
fn invalid_receiver_is_reported_by_server() {
    let po = Arc::new(PostOffice::new());
    let mut server = TcpServer::start(&tcp_config(), po).unwrap();

    let mut client = TcpClient::connect(&server.location()).unwrap();
    match client.call(b"3bad", None) {
        Err(McpError::Remote { message }) => assert!(message.contains("3bad")),
        other => panic!("expected a remote error, got {other:?}"),
    }
    // The connection stays usable after an error response.
    assert!(matches!(
        client.call(b"", None),
        Err(McpError::Remote { .. })
    ));
    client.close().unwrap();
    server.close().unwrap();
}
