//! End-to-end tests for the TCP receive transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use receive_endpoint::config::TransportConfig;
use receive_endpoint::net::{TcpReceiveTransport, CONNECTION_HEADER, PEER_HEADER};
use receive_endpoint::pipeline::{FnPipe, Pipe, PipeError, ReceiveContext};
use receive_endpoint::{Deadline, HandleState, InputAddress, ReceiveEndpoint, StopError, TransportError};

fn transport(bind_address: &str) -> TcpReceiveTransport {
    TcpReceiveTransport::new(
        InputAddress::parse("tcp://localhost/orders").unwrap(),
        TransportConfig {
            bind_address: bind_address.to_string(),
            max_connections: 16,
            max_frame_bytes: 32,
        },
    )
}

/// Terminal pipe that holds every message until the test gives up on it.
struct SlowPipe(Duration);

impl Pipe for SlowPipe {
    fn send<'a>(&'a self, _context: &'a mut ReceiveContext) -> BoxFuture<'a, Result<(), PipeError>> {
        tokio::time::sleep(self.0).map(Ok).boxed()
    }
}

async fn wait_for<F: Fn() -> bool>(check: F) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn delivers_frames_then_refuses_after_stop() {
    let received = Arc::new(Mutex::new(Vec::<(String, bool, bool)>::new()));
    let sink = Arc::clone(&received);
    let consume = Arc::new(FnPipe::new(move |ctx: &mut ReceiveContext| {
        sink.lock().unwrap().push((
            ctx.body_str().unwrap_or_default().to_string(),
            ctx.header(PEER_HEADER).is_some(),
            ctx.header(CONNECTION_HEADER).is_some(),
        ));
        Ok(())
    }));

    let endpoint = ReceiveEndpoint::new(transport("127.0.0.1:0"), consume);
    let handle = endpoint.start().await.unwrap();
    let addr = endpoint.transport().local_addr().expect("bound address");

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"first\n\nsecond\n").await.unwrap();
    client.flush().await.unwrap();

    wait_for(|| received.lock().unwrap().len() == 2).await;
    {
        let received = received.lock().unwrap();
        assert_eq!(received[0], ("first".to_string(), true, true));
        assert_eq!(received[1], ("second".to_string(), true, true));
    }

    handle
        .stop(Deadline::after(Duration::from_secs(2)))
        .await
        .unwrap();
    assert_eq!(handle.state(), HandleState::Stopped);

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn binary_and_oversized_frames_keep_connection_open() {
    let received = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let sink = Arc::clone(&received);
    let consume = Arc::new(FnPipe::new(move |ctx: &mut ReceiveContext| {
        sink.lock().unwrap().push(ctx.body().to_vec());
        Ok(())
    }));

    let endpoint = ReceiveEndpoint::new(transport("127.0.0.1:0"), consume);
    let handle = endpoint.start().await.unwrap();
    let addr = endpoint.transport().local_addr().expect("bound address");

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"a\n\xff\xfe\n").await.unwrap();
    client.write_all(&[b'x'; 100]).await.unwrap();
    client.write_all(b"\nb\n").await.unwrap();
    client.flush().await.unwrap();

    wait_for(|| received.lock().unwrap().len() == 3).await;
    assert_eq!(
        *received.lock().unwrap(),
        vec![b"a".to_vec(), vec![0xff, 0xfe], b"b".to_vec()]
    );

    handle.dispose().unwrap();
}

#[tokio::test]
async fn deadline_expiry_aborts_slow_consumer() {
    let endpoint = ReceiveEndpoint::new(
        transport("127.0.0.1:0"),
        Arc::new(SlowPipe(Duration::from_secs(30))),
    );
    let handle = endpoint.start().await.unwrap();
    let addr = endpoint.transport().local_addr().expect("bound address");

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"slow\n").await.unwrap();
    client.flush().await.unwrap();
    // Let the frame enter the pipe.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = handle
        .stop(Deadline::after(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, StopError::Transport { .. }));
    assert!(matches!(
        err.transport_error(),
        Some(TransportError::DeadlineExpired { in_flight: 1 })
    ));
    assert_eq!(handle.state(), HandleState::Stopping);

    handle.dispose().unwrap();
    assert_eq!(handle.state(), HandleState::Stopped);
}

#[tokio::test]
async fn occupied_port_fails_start() {
    let first = ReceiveEndpoint::new(
        transport("127.0.0.1:0"),
        Arc::new(FnPipe::new(|_: &mut ReceiveContext| Ok(()))),
    );
    let handle = first.start().await.unwrap();
    let taken = first.transport().local_addr().expect("bound address");

    let second = ReceiveEndpoint::new(
        transport(&taken.to_string()),
        Arc::new(FnPipe::new(|_: &mut ReceiveContext| Ok(()))),
    );
    let err = second.start().await.unwrap_err();
    match err.transport_error() {
        TransportError::Bind { address, .. } => assert_eq!(address, &taken.to_string()),
        other => panic!("expected bind error, got {other:?}"),
    }

    handle.dispose().unwrap();
}
