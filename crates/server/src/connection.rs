//! Per-connection state machine
//!
//! Drives one WebSocket connection through
//! `Handshaking → ConfigReceived → Loading → Ready → Streaming → Closed`,
//! with `Error` reachable from any phase. The loop is a blocking
//! receive-condition-forward cycle: every iteration first consults the
//! session manager for timeout, then reads the next message. Binary payloads
//! are decoded as little-endian f32 samples at 16 kHz mono; empty or
//! undecodable payloads are skipped, never fatal.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use livescribe_core::{AudioFrame, Channels, SampleRate, SessionDescriptor};
use livescribe_pipeline::AudioPipeline;

use crate::session::{AdmissionError, SessionHandle};
use crate::state::AppState;
use crate::ServerError;

/// End-of-stream sentinel, accepted as text or binary
const END_OF_AUDIO: &str = "END_OF_AUDIO";

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Handshaking,
    ConfigReceived,
    Loading,
    Ready,
    Streaming,
    Closed,
    Error,
}

impl ConnectionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionPhase::Handshaking => "handshaking",
            ConnectionPhase::ConfigReceived => "config_received",
            ConnectionPhase::Loading => "loading",
            ConnectionPhase::Ready => "ready",
            ConnectionPhase::Streaming => "streaming",
            ConnectionPhase::Closed => "closed",
            ConnectionPhase::Error => "error",
        }
    }
}

/// Initial client handshake message
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_task")]
    pub task: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_true")]
    pub use_vad: bool,
    #[serde(default)]
    pub no_speech_thresh: Option<f32>,
    #[serde(default)]
    pub same_output_threshold: Option<u32>,
    #[serde(default)]
    pub send_last_n_segments: Option<u32>,
    #[serde(default)]
    pub vad_parameters: Option<serde_json::Value>,
    #[serde(default)]
    pub enable_translation: bool,
    #[serde(default)]
    pub target_language: Option<String>,
}

fn default_task() -> String {
    "transcribe".to_string()
}

fn default_model() -> String {
    "base".to_string()
}

fn default_true() -> bool {
    true
}

impl ClientConfig {
    fn descriptor(&self) -> SessionDescriptor {
        SessionDescriptor {
            uid: self.uid.clone(),
            // Empty string means auto-detect, same as absent.
            language: self.language.clone().filter(|l| !l.is_empty()),
            task: self.task.clone(),
            model: self.model.clone(),
            use_vad: self.use_vad,
            no_speech_thresh: self.no_speech_thresh,
            same_output_threshold: self.same_output_threshold,
            send_last_n_segments: self.send_last_n_segments,
            enable_translation: self.enable_translation,
            target_language: self.target_language.clone(),
        }
    }
}

/// Server-to-client status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerStatus {
    ConfigReceived,
    Loading,
    Error,
    Wait,
}

#[derive(Debug, Serialize)]
struct StatusMessage<'a> {
    uid: &'a str,
    status: ServerStatus,
    message: String,
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// Drive one connection to completion
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let mut phase = ConnectionPhase::Handshaking;
    tracing::info!(phase = phase.as_str(), "new client connected");
    metrics::counter!("livescribe_connections_total").increment(1);

    // Handshake: the first text message carries the client configuration.
    let config = match read_client_config(&mut stream).await {
        Ok(config) => config,
        Err(reason) => {
            tracing::warn!(%reason, "handshake failed, closing");
            let _ = sink.close().await;
            return;
        }
    };
    let uid = if config.uid.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        config.uid.clone()
    };

    // Admission control.
    let handle = match state.sessions.admit(&uid) {
        Ok(handle) => handle,
        Err(AdmissionError::AtCapacity { wait_minutes }) => {
            tracing::info!(%uid, wait_minutes, "server full, turning client away");
            send_status(
                &mut sink,
                &uid,
                ServerStatus::Wait,
                format!("{:.1}", wait_minutes),
            )
            .await;
            let _ = sink.close().await;
            return;
        }
        Err(e @ AdmissionError::DuplicateUid(_)) => {
            let err = ServerError::Session(e.to_string());
            send_status(&mut sink, &uid, ServerStatus::Error, err.to_string()).await;
            let _ = sink.close().await;
            return;
        }
    };

    phase = ConnectionPhase::ConfigReceived;
    tracing::debug!(%uid, phase = phase.as_str(), "handshake accepted");
    send_status(
        &mut sink,
        &uid,
        ServerStatus::ConfigReceived,
        "processing your request".to_string(),
    )
    .await;

    // Engine initialization, with a progress note while the backend loads.
    phase = ConnectionPhase::Loading;
    tracing::debug!(%uid, phase = phase.as_str(), model = %config.model, "initializing engine");
    send_status(
        &mut sink,
        &uid,
        ServerStatus::Loading,
        format!("loading model {}", config.model),
    )
    .await;

    let (outbound_tx, outbound_rx) = mpsc::channel::<String>(64);
    let mut descriptor = config.descriptor();
    descriptor.uid = uid.clone();

    if let Err(e) = state.engine.start_session(&descriptor, outbound_tx).await {
        phase = ConnectionPhase::Error;
        let err = ServerError::Engine(e.to_string());
        tracing::error!(%uid, phase = phase.as_str(), error = %err, "engine initialization failed");
        send_status(&mut sink, &uid, ServerStatus::Error, err.to_string()).await;
        let _ = sink.close().await;
        state.sessions.release(&uid).await;
        return;
    }

    let _ = sink
        .send(Message::Text(
            serde_json::json!({ "uid": uid, "message": "SERVER_READY" }).to_string(),
        ))
        .await;
    phase = ConnectionPhase::Ready;
    tracing::debug!(%uid, phase = phase.as_str(), "engine ready");

    // The sink moves into a writer task that forwards engine output to the
    // client; it doubles as the session worker joined at release.
    let writer = tokio::spawn(forward_outbound(
        sink,
        outbound_rx,
        handle.subscribe(),
    ));
    handle.set_worker(writer);

    // Per-session conditioning pipeline, owned by this task alone.
    let pipeline_config = state.config.read().pipeline.clone();
    let mut pipeline = AudioPipeline::new(&pipeline_config);
    handle.record_stats(pipeline.stats());

    phase = ConnectionPhase::Streaming;
    tracing::info!(%uid, phase = phase.as_str(), "session streaming");

    phase = streaming_loop(&mut stream, &state, &uid, &handle, &mut pipeline).await;

    // Teardown happens exactly once, whatever path got us here.
    tracing::info!(%uid, phase = phase.as_str(), "closing session");
    if let Err(e) = state.engine.finish_session(&uid).await {
        tracing::warn!(%uid, error = %e, "engine teardown reported an error");
    }
    state.sessions.release(&uid).await;
}

/// Receive-condition-forward loop; returns the terminal phase
async fn streaming_loop(
    stream: &mut WsStream,
    state: &AppState,
    uid: &str,
    handle: &Arc<SessionHandle>,
    pipeline: &mut AudioPipeline,
) -> ConnectionPhase {
    let mut disconnect_rx = handle.subscribe();
    let mut sequence: u64 = 0;

    loop {
        if state.sessions.check_timeout(uid) {
            return ConnectionPhase::Closed;
        }
        if handle.is_disconnected() {
            return ConnectionPhase::Closed;
        }

        let message = tokio::select! {
            message = stream.next() => message,
            _ = disconnect_rx.changed() => return ConnectionPhase::Closed,
        };

        match message {
            Some(Ok(Message::Binary(payload))) => {
                if payload == END_OF_AUDIO.as_bytes() {
                    return ConnectionPhase::Closed;
                }
                let Some(samples) = decode_audio_frame(&payload) else {
                    continue;
                };

                let processed = pipeline.process(&samples, None);
                if processed.samples.is_empty() {
                    continue;
                }
                handle.record_stats(pipeline.stats());
                metrics::counter!("livescribe_frames_total").increment(1);

                let frame = AudioFrame::new(
                    processed.samples,
                    SampleRate::Hz16000,
                    Channels::Mono,
                    sequence,
                );
                sequence += 1;

                if let Err(e) = state.engine.accept_frame(uid, &frame).await {
                    tracing::warn!(uid, error = %e, "engine rejected frame, dropping");
                }
            }
            Some(Ok(Message::Text(text))) => {
                if text == END_OF_AUDIO {
                    return ConnectionPhase::Closed;
                }
                // Config was consumed during handshake; anything else here is
                // out of protocol but harmless.
                tracing::debug!(uid, "ignoring unexpected text message during streaming");
            }
            Some(Ok(Message::Close(_))) | None => return ConnectionPhase::Closed,
            Some(Ok(_)) => {} // ping/pong handled by axum
            Some(Err(e)) => {
                tracing::info!(uid, error = %e, "connection error, closing");
                return ConnectionPhase::Closed;
            }
        }
    }
}

/// Writer task: forwards engine messages to the client until the channel
/// drains or the disconnect latch fires
async fn forward_outbound(
    mut sink: WsSink,
    mut outbound_rx: mpsc::Receiver<String>,
    mut disconnect_rx: tokio::sync::watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            message = outbound_rx.recv() => {
                match message {
                    Some(text) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = disconnect_rx.changed() => break,
        }
    }
    let _ = sink.close().await;
}

/// Read and parse the handshake message
async fn read_client_config(stream: &mut WsStream) -> Result<ClientConfig, ServerError> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str::<ClientConfig>(&text)
                    .map_err(|e| ServerError::Handshake(format!("malformed config: {}", e)));
            }
            // Control frames may arrive before the handshake proper.
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(_)) => {
                return Err(ServerError::Handshake(
                    "expected a text configuration message".to_string(),
                ))
            }
            Some(Err(e)) => {
                return Err(ServerError::Handshake(format!("transport error: {}", e)))
            }
            None => {
                return Err(ServerError::Handshake(
                    "connection closed before handshake".to_string(),
                ))
            }
        }
    }
}

/// Decode a binary payload as little-endian f32 samples
///
/// Returns `None` for empty or truncated payloads; the caller skips those.
pub fn decode_audio_frame(payload: &[u8]) -> Option<Vec<f32>> {
    if payload.is_empty() {
        return None;
    }
    if payload.len() % 4 != 0 {
        tracing::warn!(len = payload.len(), "truncated audio payload, skipping");
        return None;
    }

    Some(
        payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

async fn send_status(sink: &mut WsSink, uid: &str, status: ServerStatus, message: String) {
    let body = StatusMessage {
        uid,
        status,
        message,
    };
    match serde_json::to_string(&body) {
        Ok(json) => {
            let _ = sink.send(Message::Text(json)).await;
        }
        Err(e) => tracing::error!(error = %e, "failed to serialize status message"),
    }
}
