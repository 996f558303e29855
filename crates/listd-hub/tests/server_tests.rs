//! Accept loop and end-to-end tests

use listd_core::{Message, Request, Response, Word, VERSION};
use listd_hub::{Downstream, Hub, HubConfig, HubError, Server};
use listd_transport::TcpConfig;
use listd_test_utils::{
    wait_for, TestHub, DEFAULT_CHECK_INTERVAL, DEFAULT_TIMEOUT, MOCK_IDENTIFIER, QUIET_PERIOD,
};
use listd_transport::memory;
use listd_transport::TransportSender;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn rs(word: Response, args: &[&str]) -> Message {
    Message::response(word).with_args(args.iter().copied())
}

fn rq(word: Request, args: &[&str]) -> Message {
    Message::request(word).with_args(args.iter().copied())
}

// ============================================================================
// Memory transport
// ============================================================================

#[tokio::test]
async fn test_duplicate_peer_address_is_rejected() {
    let ((hub_tx, hub_rx), (playout_tx, _playout_rx)) = memory::pair(16);
    let (hub, handle) = Hub::new(
        HubConfig::default(),
        Downstream::new(Arc::new(hub_tx), Box::new(hub_rx)),
    );
    tokio::spawn(hub.run());

    let listen: SocketAddr = "127.0.0.1:1350".parse().unwrap();
    let peer: SocketAddr = "127.0.0.1:50001".parse().unwrap();
    let (listener, connector) = memory::server(listen, 64);
    let server = Arc::new(Server::new(handle));
    let serving = {
        let server = server.clone();
        tokio::spawn(async move { server.serve_on(listener).await })
    };

    let (_first_tx, mut first_rx) = connector.connect(peer).await.unwrap();
    let ohai = timeout(DEFAULT_TIMEOUT, first_rx.recv_message())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ohai.word(), &Word::Response(Response::Ohai));
    assert_eq!(server.peer_count(), 1);

    // Same address again: closed without a greeting
    let (_second_tx, mut second_rx) = connector.connect(peer).await.unwrap();
    let second = timeout(DEFAULT_TIMEOUT, second_rx.recv_message())
        .await
        .unwrap();
    assert_eq!(second, None);
    assert_eq!(server.peer_count(), 1);
    assert!(server.peers().contains(&peer));

    // The first connection is untouched
    playout_tx.send(rs(Response::Time, &["7"])).await.unwrap();
    let mut seen_time = false;
    while let Ok(Some(message)) = timeout(DEFAULT_TIMEOUT, first_rx.recv_message()).await {
        if message == rs(Response::Time, &["7"]) {
            seen_time = true;
            break;
        }
    }
    assert!(seen_time);

    server.stop();
    timeout(DEFAULT_TIMEOUT, serving)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(!server.is_running());
}

#[tokio::test]
async fn test_client_disconnect_unregisters_peer() {
    let ((hub_tx, hub_rx), (_playout_tx, _playout_rx)) = memory::pair(16);
    let (hub, handle) = Hub::new(
        HubConfig::default(),
        Downstream::new(Arc::new(hub_tx), Box::new(hub_rx)),
    );
    tokio::spawn(hub.run());

    let (listener, connector) = memory::server("127.0.0.1:1350".parse().unwrap(), 64);
    let server = Arc::new(Server::new(handle));
    {
        let server = server.clone();
        tokio::spawn(async move { server.serve_on(listener).await });
    }

    let peer: SocketAddr = "127.0.0.1:50002".parse().unwrap();
    let (client_tx, mut client_rx) = connector.connect(peer).await.unwrap();
    timeout(DEFAULT_TIMEOUT, client_rx.recv_message())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(server.peer_count(), 1);

    client_tx.close().await.unwrap();
    let server_ref = &server;
    assert!(
        wait_for(
            || async move { server_ref.peer_count() == 0 },
            DEFAULT_CHECK_INTERVAL,
            DEFAULT_TIMEOUT,
        )
        .await
    );

    // The address is free to connect again
    let (_again_tx, mut again_rx) = connector.connect(peer).await.unwrap();
    let ohai = timeout(DEFAULT_TIMEOUT, again_rx.recv_message())
        .await
        .unwrap();
    assert!(ohai.is_some());
}

// ============================================================================
// TCP end to end
// ============================================================================

#[tokio::test]
async fn test_tcp_bootstrap() {
    let hub = TestHub::start().await;
    let mut client = hub.connect_client().await;

    let ohai = client.expect("OHAI").await;
    assert_eq!(
        ohai.args(),
        &[format!("listd {}/{}", VERSION, MOCK_IDENTIFIER)]
    );
    let features = client.expect("FEATURES").await;
    assert!(!features.args().iter().any(|f| f == "FileLoad"));
    assert!(features.args().iter().any(|f| f == "Playlist"));
    client.expect("STATE").await;
    client.expect("AUTOADVANCE").await;
    assert_eq!(client.expect("COUNT").await.args(), &["0"]);
}

#[tokio::test]
async fn test_tcp_quoted_arguments_survive_the_round_trip() {
    let hub = TestHub::start().await;
    let mut a = hub.connect_ready_client().await;
    let mut b = hub.connect_ready_client().await;

    a.send_raw(b"enqueue 0 h1 file '/music/It'\\''s Here.mp3'\n")
        .await
        .unwrap();
    for client in [&mut a, &mut b] {
        let enqueue = client.expect("ENQUEUE").await;
        assert_eq!(enqueue.args(), &["0", "h1", "file", "/music/It's Here.mp3"]);
    }

    a.send(&rq(Request::Select, &["0", "h1"])).await.unwrap();
    let load = hub
        .playout()
        .wait_for_request(|m| m.word() == &Word::Request(Request::Load))
        .await
        .unwrap();
    assert_eq!(load.args(), &["/music/It's Here.mp3"]);
}

#[tokio::test]
async fn test_tcp_failure_is_unicast() {
    let hub = TestHub::start().await;
    let mut a = hub.connect_ready_client().await;
    let mut b = hub.connect_ready_client().await;

    a.send(&rq(Request::Dequeue, &["0", "nothing"])).await.unwrap();
    let fail = a.expect("FAIL").await;
    assert_eq!(&fail.args()[1..], &["dequeue", "0", "nothing"]);
    assert!(b.recv_timeout(QUIET_PERIOD).await.is_none());
}

#[tokio::test]
async fn test_tcp_forwarding_and_relay() {
    let hub = TestHub::start().await;
    let mut a = hub.connect_ready_client().await;
    let mut b = hub.connect_ready_client().await;

    a.send(&rq(Request::Play, &[])).await.unwrap();
    hub.playout()
        .wait_for_request(|m| m == &rq(Request::Play, &[]))
        .await
        .expect("play was not forwarded");

    hub.playout().send(rs(Response::Ok, &["play"])).await;
    hub.playout().send(rs(Response::State, &["Playing"])).await;
    for client in [&mut a, &mut b] {
        assert_eq!(client.expect("OK").await.args(), &["play"]);
        assert_eq!(client.expect("STATE").await.args(), &["Playing"]);
    }
}

#[tokio::test]
async fn test_tcp_auto_advance() {
    let hub = TestHub::start().await;
    let mut a = hub.connect_ready_client().await;

    a.send(&rq(Request::Enqueue, &["0", "h0", "file", "/0.mp3"]))
        .await
        .unwrap();
    a.send(&rq(Request::Enqueue, &["1", "h1", "file", "/1.mp3"]))
        .await
        .unwrap();
    a.send(&rq(Request::Select, &["0", "h0"])).await.unwrap();
    a.send(&rq(Request::AutoAdvance, &["on"])).await.unwrap();
    a.recv_until("AUTOADVANCE").await.unwrap();

    hub.playout().send(rs(Response::End, &[])).await;
    assert_eq!(a.expect("SELECT").await.args(), &["1", "h1"]);
    a.expect("END").await;

    let loads = {
        let playout = hub.playout();
        assert!(
            wait_for(
                || async {
                    playout
                        .received()
                        .iter()
                        .filter(|m| m.word() == &Word::Request(Request::Load))
                        .count()
                        == 2
                },
                DEFAULT_CHECK_INTERVAL,
                DEFAULT_TIMEOUT,
            )
            .await
        );
        playout
            .received()
            .into_iter()
            .filter(|m| m.word() == &Word::Request(Request::Load))
            .collect::<Vec<_>>()
    };
    assert_eq!(loads[0].args(), &["/0.mp3"]);
    assert_eq!(loads[1].args(), &["/1.mp3"]);
}

#[tokio::test]
async fn test_tcp_list_longer_than_client_queue() {
    let tcp = TcpConfig {
        outbound_queue_depth: 16,
        ..Default::default()
    };
    let hub = TestHub::start_with_config(HubConfig::default(), tcp).await;
    let mut a = hub.connect_ready_client().await;

    for i in 0..20 {
        let index = i.to_string();
        let hash = format!("h{}", i);
        a.send(&rq(Request::Enqueue, &[&index, &hash, "text", "x"]))
            .await
            .unwrap();
        a.expect("ENQUEUE").await;
    }

    a.send(&rq(Request::List, &[])).await.unwrap();
    assert_eq!(a.expect("COUNT").await.args(), &["20"]);
    for i in 0..20 {
        assert_eq!(a.expect("ITEM").await.arg(0), Some(i.to_string().as_str()));
    }

    let mut late = hub.connect_client().await;
    let bootstrap = late.read_bootstrap().await;
    assert_eq!(bootstrap.len(), 25);
}

#[tokio::test]
async fn test_tcp_shutdown_closes_clients() {
    let hub = TestHub::start().await;
    let mut a = hub.connect_ready_client().await;
    let server = hub.server().clone();
    assert!(
        wait_for(
            || {
                let server = server.clone();
                async move { server.peer_count() == 1 }
            },
            DEFAULT_CHECK_INTERVAL,
            DEFAULT_TIMEOUT,
        )
        .await
    );

    hub.handle().quit().await.unwrap();
    hub.server().shutdown().await;
    assert!(a.is_closed().await);
}

#[tokio::test]
async fn test_tcp_playout_loss_stops_hub() {
    let mut hub = TestHub::start().await;
    let mut a = hub.connect_ready_client().await;

    hub.playout_mut().disconnect().await;
    let result = hub.hub_result().await.expect("hub did not stop");
    assert!(matches!(result, Err(HubError::DownstreamLost(_))));
    assert!(a.is_closed().await);
}

#[tokio::test]
async fn test_tcp_overlong_line_drops_client() {
    let hub = TestHub::start().await;
    let mut a = hub.connect_ready_client().await;
    let mut b = hub.connect_ready_client().await;

    let line = vec![b'x'; listd_core::DEFAULT_MAX_LINE_LENGTH + 16];
    let _ = a.send_raw(&line).await;
    assert!(a.is_closed().await);

    // Others carry on
    b.send(&rq(Request::List, &[])).await.unwrap();
    assert_eq!(
        timeout(Duration::from_secs(5), b.expect("COUNT"))
            .await
            .unwrap()
            .args(),
        &["0"]
    );
}
