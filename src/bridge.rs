//! JSON-lines command bridge.
//!
//! Each input line is one request, `{"id", "command", "params"}`; each
//! response is one line echoing the request `id`. Requests are handled in
//! arrival order, except that waiting for a port to open happens in the
//! background: an `open` answers once its transport reports, and commands
//! that arrive meanwhile are answered without waiting for it.

use crate::api::SerialApi;
use crate::codec;
use crate::error::{ApiError, ApiResult};
use crate::types::{ConnectionId, ControlSignalOptions, OpenOptions};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const COMMANDS: &[&str] = &[
    "getPorts",
    "open",
    "close",
    "read",
    "write",
    "flush",
    "getControlSignals",
    "setControlSignals",
    "help",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenParams {
    port_name: String,
    #[serde(default)]
    options: OpenOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionParams {
    connection_id: ConnectionId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadParams {
    connection_id: ConnectionId,
    bytes_to_read: usize,
}

/// Write payload: a byte array, or a string sent as Latin-1.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WriteData {
    Bytes(Vec<u8>),
    Text(String),
}

impl WriteData {
    fn into_bytes(self) -> Vec<u8> {
        match self {
            WriteData::Bytes(bytes) => bytes,
            WriteData::Text(text) => codec::latin1_encode(&text),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteParams {
    connection_id: ConnectionId,
    data: WriteData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalParams {
    connection_id: ConnectionId,
    #[serde(default)]
    options: ControlSignalOptions,
}

fn params<T: DeserializeOwned>(params: Value) -> ApiResult<T> {
    Ok(serde_json::from_value(params)?)
}

fn help() -> Value {
    json!({
        "commands": COMMANDS,
        "request": {"id": "any", "command": "<name>", "params": {}},
        "example": {"id": 1, "command": "open", "params": {"portName": "COM1", "options": {"bitrate": 9600}}},
    })
}

async fn dispatch(api: &SerialApi, command: &str, raw: Value) -> ApiResult<Value> {
    match command {
        "getPorts" => Ok(json!(api.get_ports().await)),
        "open" => {
            let p: OpenParams = params(raw)?;
            Ok(json!(api.open(&p.port_name, p.options).await?))
        }
        "close" => {
            let p: ConnectionParams = params(raw)?;
            Ok(json!(api.close(p.connection_id).await?))
        }
        "read" => {
            let p: ReadParams = params(raw)?;
            Ok(json!(api.read(p.connection_id, p.bytes_to_read).await?))
        }
        "write" => {
            let p: WriteParams = params(raw)?;
            let data = p.data.into_bytes();
            Ok(json!(api.write(p.connection_id, &data).await?))
        }
        "flush" => {
            let p: ConnectionParams = params(raw)?;
            Ok(json!(api.flush(p.connection_id).await?))
        }
        "getControlSignals" => {
            let p: ConnectionParams = params(raw)?;
            Ok(json!(api.get_control_signals(p.connection_id).await?))
        }
        "setControlSignals" => {
            let p: SignalParams = params(raw)?;
            Ok(json!(api.set_control_signals(p.connection_id, p.options).await?))
        }
        "help" => Ok(help()),
        other => Err(ApiError::InvalidRequest(format!(
            "Unknown command: '{}'",
            other
        ))),
    }
}

fn error_envelope(id: Value, err: &ApiError) -> Value {
    json!({
        "id": id,
        "status": "error",
        "error": { "type": err.kind(), "message": err.to_string() }
    })
}

fn respond(id: Value, command: &str, result: ApiResult<Value>) -> Value {
    match result {
        Ok(result) => json!({ "id": id, "status": "success", "result": result }),
        Err(err) => {
            warn!(command, error = %err, "bridge request failed");
            error_envelope(id, &err)
        }
    }
}

fn request_parts(request: &Value) -> (Value, Option<&str>, Value) {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let command = request.get("command").and_then(Value::as_str);
    let raw = request.get("params").cloned().unwrap_or_else(|| json!({}));
    (id, command, raw)
}

/// Handle one decoded request and build its response.
pub async fn process_request(api: &SerialApi, request: Value) -> Value {
    let (id, command, raw) = request_parts(&request);
    let Some(command) = command else {
        let err = ApiError::InvalidRequest("missing 'command'".to_string());
        return error_envelope(id, &err);
    };

    debug!(command, "bridge request");
    respond(id, command, dispatch(api, command, raw).await)
}

/// Handle one input line. Blank lines yield no response.
pub async fn process_line(api: &SerialApi, line: &str) -> Option<Value> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let response = match serde_json::from_str::<Value>(line) {
        Ok(request) => process_request(api, request).await,
        Err(e) => error_envelope(Value::Null, &ApiError::from(e)),
    };
    Some(response)
}

/// Like [`process_line`], but an `open` only registers the connection here;
/// its completion is awaited on a spawned task that sends the response later.
async fn serve_line(
    api: &Arc<SerialApi>,
    line: &str,
    responses: &mpsc::UnboundedSender<Value>,
) {
    let request = match serde_json::from_str::<Value>(line.trim()) {
        Ok(request) => request,
        Err(_) => {
            if let Some(response) = process_line(api, line).await {
                let _ = responses.send(response);
            }
            return;
        }
    };

    let (id, command, raw) = request_parts(&request);
    if command != Some("open") {
        let _ = responses.send(process_request(api, request).await);
        return;
    }

    debug!(command = "open", "bridge request");
    let pending =
        params::<OpenParams>(raw).and_then(|p| api.begin_open(&p.port_name, &p.options));
    match pending {
        Ok(pending) => {
            let api = Arc::clone(api);
            let responses = responses.clone();
            tokio::spawn(async move {
                let result = api.finish_open(pending).await.map(|info| json!(info));
                let _ = responses.send(respond(id, "open", result));
            });
        }
        Err(err) => {
            let _ = responses.send(respond(id, "open", Err(err)));
        }
    }
}

async fn write_response<W>(output: &mut W, response: &Value) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded = response.to_string();
    encoded.push('\n');
    output.write_all(encoded.as_bytes()).await?;
    output.flush().await
}

/// Serve requests from `input` until end of stream and every pending open
/// has been answered.
pub async fn run_bridge<R, W>(api: Arc<SerialApi>, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut requests = Some(tx);
    let mut lines = input.lines();

    loop {
        tokio::select! {
            line = lines.next_line(), if requests.is_some() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if let Some(tx) = &requests {
                        serve_line(&api, &line, tx).await;
                    }
                }
                None => {
                    debug!("bridge input closed");
                    requests = None;
                }
            },
            response = rx.recv() => match response {
                Some(response) => write_response(&mut output, &response).await?,
                None => break,
            },
        }
    }
    Ok(())
}
