//! End-to-end check of the WebSocket transport against a local relay.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use xmr_transport::{
    event_channel, ConnectionId, Connector, EventSink, ReadyState, TransportEvent,
    WebSocketConnector,
};

#[tokio::test]
async fn test_websocket_transport_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // A relay that reads one frame, replies with a heartbeat and a binary
    // copy of what it got, then closes.
    let relay = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let first = ws.next().await.unwrap().unwrap();
        let text = first.into_text().unwrap();

        ws.send(Message::Text("H".into())).await.unwrap();
        ws.send(Message::Binary(text.clone().into_bytes()))
            .await
            .unwrap();
        ws.close(None).await.unwrap();
        text
    });

    let (tx, mut rx) = event_channel();
    let id = ConnectionId::generate();
    let connector = WebSocketConnector::default();
    let mut transport = connector
        .connect(&format!("ws://{}", addr), EventSink::new(id.clone(), tx))
        .unwrap();

    let (event_id, event) = rx.recv().await.unwrap();
    assert_eq!(event_id, id);
    assert_eq!(event, TransportEvent::Open);
    assert_eq!(transport.ready_state(), ReadyState::Open);

    transport
        .send_text(r#"{"type":"init","key":"k","channel":"c"}"#.into())
        .unwrap();

    assert_eq!(
        rx.recv().await.unwrap().1,
        TransportEvent::Message("H".into())
    );
    assert_eq!(
        rx.recv().await.unwrap().1,
        TransportEvent::Message(r#"{"type":"init","key":"k","channel":"c"}"#.into())
    );
    assert_eq!(rx.recv().await.unwrap().1, TransportEvent::Close);
    assert_eq!(transport.ready_state(), ReadyState::Closed);

    let received = relay.await.unwrap();
    assert_eq!(received, r#"{"type":"init","key":"k","channel":"c"}"#);
}

#[tokio::test]
async fn test_client_close_reports_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let relay = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        // Drain until the client goes away.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (tx, mut rx) = event_channel();
    let mut transport = WebSocketConnector::default()
        .connect(
            &format!("ws://{}", addr),
            EventSink::new(ConnectionId::generate(), tx),
        )
        .unwrap();

    assert_eq!(rx.recv().await.unwrap().1, TransportEvent::Open);

    transport.close();
    assert_eq!(transport.ready_state(), ReadyState::Closing);
    assert_eq!(rx.recv().await.unwrap().1, TransportEvent::Close);
    assert_eq!(transport.ready_state(), ReadyState::Closed);

    relay.await.unwrap();
}
