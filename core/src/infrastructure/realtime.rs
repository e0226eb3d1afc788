// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Realtime
//!
//! Change feed client for the hosted data service. Speaks the Phoenix channel
//! protocol over a WebSocket at `{url}/realtime/v1/websocket`:
//!
//! 1. `phx_join` on `realtime:<channel>` with a `postgres_changes` config
//! 2. wait for the matching `phx_reply` (an `error` status fails the subscribe)
//! 3. forward every `postgres_changes` row to the [`ChangeStream`], sending a
//!    `heartbeat` on the `phoenix` topic every 30 seconds
//! 4. `phx_leave` and close once the stream is dropped
//!
//! Each subscription owns its own socket and pump task.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::config::DataServiceConfig;
use crate::domain::repository::{
    ChangeFeed, ChangeFilter, ChangeKind, ChangeRecord, ChangeStream, DataError,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Writer = SplitSink<Socket, Message>;
type Reader = SplitStream<Socket>;

pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const JOIN_REF: &str = "1";
const CHANNEL_BUFFER: usize = 64;

/// One Phoenix protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixFrame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeMessage {
    Change { topic: String, change: ChangeRecord },
    Reply { topic: String, reference: Option<String>, ok: bool, response: Value },
    ChannelError { topic: String, reason: String },
    ChannelClosed { topic: String },
    Other { topic: String, event: String },
}

/// Parse one text frame from the realtime server.
pub fn parse_realtime_message(text: &str) -> Result<RealtimeMessage, DataError> {
    let frame: PhoenixFrame = serde_json::from_str(text)
        .map_err(|e| DataError::Subscription(format!("malformed realtime frame: {}", e)))?;
    let PhoenixFrame {
        topic,
        event,
        payload,
        reference,
        ..
    } = frame;

    match event.as_str() {
        "postgres_changes" => {
            let data = payload
                .get("data")
                .ok_or_else(|| DataError::Subscription("postgres_changes without data".to_string()))?;
            Ok(RealtimeMessage::Change {
                topic,
                change: change_from(data)?,
            })
        }
        // Legacy servers push the change kind as the event name.
        "INSERT" | "UPDATE" | "DELETE" => Ok(RealtimeMessage::Change {
            topic,
            change: change_from(&payload)?,
        }),
        "phx_reply" => {
            let ok = payload.get("status").and_then(Value::as_str) == Some("ok");
            let response = payload.get("response").cloned().unwrap_or(Value::Null);
            Ok(RealtimeMessage::Reply {
                topic,
                reference,
                ok,
                response,
            })
        }
        "phx_error" => Ok(RealtimeMessage::ChannelError {
            reason: payload
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("channel error")
                .to_string(),
            topic,
        }),
        "phx_close" => Ok(RealtimeMessage::ChannelClosed { topic }),
        _ => Ok(RealtimeMessage::Other { topic, event }),
    }
}

fn change_from(data: &Value) -> Result<ChangeRecord, DataError> {
    let kind = data
        .get("type")
        .or_else(|| data.get("eventType"))
        .and_then(Value::as_str)
        .and_then(ChangeKind::from_wire)
        .ok_or_else(|| DataError::Subscription("change without a known type".to_string()))?;

    let record = match data.get("record") {
        Some(record) if !is_empty(record) => record.clone(),
        _ => data.get("old_record").cloned().unwrap_or(Value::Null),
    };

    Ok(ChangeRecord { kind, record })
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// `phx_join` frame subscribing to row changes matching `filter`.
pub fn join_frame(filter: &ChangeFilter) -> PhoenixFrame {
    PhoenixFrame {
        topic: topic_for(filter),
        event: "phx_join".to_string(),
        payload: json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": filter.kind.as_wire(),
                    "schema": "public",
                    "table": filter.table.name(),
                    "filter": filter.filter_expression(),
                }]
            }
        }),
        reference: Some(JOIN_REF.to_string()),
        join_ref: Some(JOIN_REF.to_string()),
    }
}

fn topic_for(filter: &ChangeFilter) -> String {
    format!("realtime:{}", filter.channel)
}

pub struct RealtimeClient {
    socket_url: Url,
    heartbeat: Duration,
}

impl RealtimeClient {
    /// `base_url` is the project URL; the access key goes in the query string.
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, DataError> {
        let mut socket_url = Url::parse(base_url)
            .map_err(|e| DataError::NotConfigured(format!("invalid data service URL '{}': {}", base_url, e)))?;

        let scheme = match socket_url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(DataError::NotConfigured(format!(
                    "unsupported URL scheme '{}'",
                    other
                )))
            }
        };
        socket_url
            .set_scheme(scheme)
            .map_err(|_| DataError::NotConfigured(format!("cannot use {} for {}", scheme, base_url)))?;

        let path = format!(
            "{}/realtime/v1/websocket",
            socket_url.path().trim_end_matches('/')
        );
        socket_url.set_path(&path);
        socket_url
            .query_pairs_mut()
            .clear()
            .append_pair("apikey", anon_key)
            .append_pair("vsn", "1.0.0");

        Ok(Self {
            socket_url,
            heartbeat: DEFAULT_HEARTBEAT,
        })
    }

    pub fn from_config(config: &DataServiceConfig) -> Result<Self, DataError> {
        Self::new(&config.url, &config.anon_key)
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn socket_url(&self) -> &Url {
        &self.socket_url
    }

    async fn await_join(reader: &mut Reader, topic: &str) -> Result<(), DataError> {
        while let Some(frame) = reader.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => return Err(DataError::Subscription(e.to_string())),
            };

            match parse_realtime_message(text.as_str())? {
                RealtimeMessage::Reply {
                    topic: reply_topic,
                    reference,
                    ok,
                    response,
                } if reply_topic == topic && reference.as_deref() == Some(JOIN_REF) => {
                    return if ok {
                        Ok(())
                    } else {
                        Err(DataError::Subscription(format!(
                            "join rejected for {}: {}",
                            topic, response
                        )))
                    };
                }
                RealtimeMessage::ChannelError { reason, .. } => {
                    return Err(DataError::Subscription(reason));
                }
                other => debug!("Ignoring frame before join reply: {:?}", other),
            }
        }
        Err(DataError::Subscription(format!(
            "connection closed before {} was joined",
            topic
        )))
    }
}

#[async_trait]
impl ChangeFeed for RealtimeClient {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<ChangeStream, DataError> {
        let (socket, _response) = timeout(CONNECT_TIMEOUT, connect_async(self.socket_url.as_str()))
            .await
            .map_err(|_| {
                DataError::Subscription(format!("connection timeout after {:?}", CONNECT_TIMEOUT))
            })?
            .map_err(|e| DataError::Subscription(e.to_string()))?;

        let (mut writer, mut reader) = socket.split();
        let topic = topic_for(&filter);

        send_frame(&mut writer, &join_frame(&filter)).await?;
        timeout(CONNECT_TIMEOUT, Self::await_join(&mut reader, &topic))
            .await
            .map_err(|_| DataError::Subscription(format!("no join reply for {}", topic)))??;
        info!(%topic, table = %filter.table, "Subscribed to change feed");

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
        let (release_tx, release_rx) = oneshot::channel();
        tokio::spawn(pump(writer, reader, filter, tx, release_rx, self.heartbeat));

        Ok(ChangeStream::new(rx, release_tx))
    }
}

async fn send_frame(writer: &mut Writer, frame: &PhoenixFrame) -> Result<(), DataError> {
    let text = serde_json::to_string(frame).map_err(|e| DataError::Decode(e.to_string()))?;
    writer
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| DataError::Subscription(e.to_string()))
}

async fn pump(
    mut writer: Writer,
    mut reader: Reader,
    filter: ChangeFilter,
    tx: mpsc::Sender<ChangeRecord>,
    mut release: oneshot::Receiver<()>,
    heartbeat_every: Duration,
) {
    let topic = topic_for(&filter);
    let mut heartbeat = tokio::time::interval_at(Instant::now() + heartbeat_every, heartbeat_every);
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let frame = PhoenixFrame {
                    topic: "phoenix".to_string(),
                    event: "heartbeat".to_string(),
                    payload: json!({}),
                    reference: Some(next_ref.to_string()),
                    join_ref: None,
                };
                next_ref += 1;
                if let Err(e) = send_frame(&mut writer, &frame).await {
                    warn!(%topic, "Heartbeat failed: {}", e);
                    break;
                }
            }
            _ = &mut release => {
                leave(&mut writer, &topic, next_ref).await;
                break;
            }
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => match parse_realtime_message(text.as_str()) {
                    Ok(RealtimeMessage::Change { topic: change_topic, change }) if change_topic == topic => {
                        if !filter.matches(change.kind, &change.record) {
                            debug!(%topic, "Dropping change outside the subscription filter");
                            continue;
                        }
                        if tx.send(change).await.is_err() {
                            leave(&mut writer, &topic, next_ref).await;
                            break;
                        }
                    }
                    Ok(RealtimeMessage::ChannelError { reason, .. }) => {
                        warn!(%topic, "Channel error: {}", reason);
                        break;
                    }
                    Ok(RealtimeMessage::ChannelClosed { topic: closed }) if closed == topic => {
                        info!(%topic, "Channel closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => warn!(%topic, "{}", e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%topic, "WebSocket read error: {}", e);
                    break;
                }
            }
        }
    }

    debug!(%topic, "Change feed pump stopped");
}

async fn leave(writer: &mut Writer, topic: &str, reference: u64) {
    let frame = PhoenixFrame {
        topic: topic.to_string(),
        event: "phx_leave".to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
        join_ref: Some(JOIN_REF.to_string()),
    };
    if let Err(e) = send_frame(writer, &frame).await {
        debug!(%topic, "Leave not delivered: {}", e);
    }
    let _ = writer.send(Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::records::Table;
    use tokio::net::TcpListener;

    fn reasoning_filter() -> ChangeFilter {
        ChangeFilter::new(
            "reasoning:e1",
            Table::AgentReasoning,
            ChangeKind::Insert,
            "execution_id",
            "e1",
        )
    }

    #[test]
    fn test_socket_url() {
        let client = RealtimeClient::new("https://project.supabase.co", "anon").unwrap();
        assert_eq!(
            client.socket_url().as_str(),
            "wss://project.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );

        let local = RealtimeClient::new("http://localhost:54321/", "k").unwrap();
        assert_eq!(local.socket_url().scheme(), "ws");
        assert_eq!(local.socket_url().path(), "/realtime/v1/websocket");
    }

    #[test]
    fn test_join_frame_shape() {
        let frame = serde_json::to_value(join_frame(&reasoning_filter())).unwrap();
        assert_eq!(frame["topic"], "realtime:reasoning:e1");
        assert_eq!(frame["event"], "phx_join");
        assert_eq!(frame["ref"], "1");
        let change = &frame["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "INSERT");
        assert_eq!(change["table"], "agent_reasoning");
        assert_eq!(change["filter"], "execution_id=eq.e1");
    }

    #[test]
    fn test_parse_postgres_change() {
        let text = json!({
            "topic": "realtime:reasoning:e1",
            "event": "postgres_changes",
            "payload": {
                "ids": [12],
                "data": {
                    "type": "INSERT",
                    "table": "agent_reasoning",
                    "record": {"execution_id": "e1", "step_number": 4, "reasoning_text": "done"}
                }
            },
            "ref": null
        })
        .to_string();

        match parse_realtime_message(&text).unwrap() {
            RealtimeMessage::Change { topic, change } => {
                assert_eq!(topic, "realtime:reasoning:e1");
                assert_eq!(change.kind, ChangeKind::Insert);
                assert_eq!(change.record["step_number"], 4);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_delete_uses_old_record() {
        let text = json!({
            "topic": "realtime:balances:p1",
            "event": "postgres_changes",
            "payload": {"data": {"type": "DELETE", "record": {}, "old_record": {"portfolio_id": "p1"}}}
        })
        .to_string();

        match parse_realtime_message(&text).unwrap() {
            RealtimeMessage::Change { change, .. } => {
                assert_eq!(change.kind, ChangeKind::Delete);
                assert_eq!(change.record["portfolio_id"], "p1");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_reply_and_garbage() {
        let reply = r#"{"topic":"realtime:x","event":"phx_reply","payload":{"status":"error","response":{"reason":"denied"}},"ref":"1"}"#;
        assert!(matches!(
            parse_realtime_message(reply).unwrap(),
            RealtimeMessage::Reply { ok: false, .. }
        ));
        assert!(parse_realtime_message("not json").is_err());
    }

    async fn read_frame(ws: &mut WebSocketStream<TcpStream>) -> PhoenixFrame {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("socket ended: {other:?}"),
            }
        }
    }

    async fn send(ws: &mut WebSocketStream<TcpStream>, value: Value) {
        ws.send(Message::Text(value.to_string().into())).await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_streams_inserts_and_leaves_on_drop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

            let join = read_frame(&mut ws).await;
            assert_eq!(join.event, "phx_join");
            send(
                &mut ws,
                json!({"topic": join.topic, "event": "phx_reply",
                       "payload": {"status": "ok", "response": {}}, "ref": "1"}),
            )
            .await;

            for (execution, step) in [("e2", 1), ("e1", 2)] {
                send(
                    &mut ws,
                    json!({"topic": "realtime:reasoning:e1", "event": "postgres_changes",
                           "payload": {"data": {"type": "INSERT",
                               "record": {"execution_id": execution, "step_number": step}}}}),
                )
                .await;
            }

            read_frame(&mut ws).await
        });

        let client = RealtimeClient::new(&format!("http://{}", addr), "anon").unwrap();
        let mut stream = client.subscribe(reasoning_filter()).await.unwrap();

        let change = stream.next().await.unwrap();
        assert_eq!(change.record["step_number"], 2);

        drop(stream);
        let leave = server.await.unwrap();
        assert_eq!(leave.event, "phx_leave");
        assert_eq!(leave.topic, "realtime:reasoning:e1");
    }

    #[tokio::test]
    async fn test_rejected_join_fails_subscribe() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let join = read_frame(&mut ws).await;
            send(
                &mut ws,
                json!({"topic": join.topic, "event": "phx_reply",
                       "payload": {"status": "error", "response": {"reason": "unauthorized"}},
                       "ref": "1"}),
            )
            .await;
            let _ = ws.next().await;
        });

        let client = RealtimeClient::new(&format!("http://{}", addr), "bad").unwrap();
        let err = client.subscribe(reasoning_filter()).await.unwrap_err();
        assert!(matches!(err, DataError::Subscription(msg) if msg.contains("unauthorized")));
    }
}
