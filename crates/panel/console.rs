use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{HeaderValue, header::ORIGIN},
    },
};

pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const EVENT_AUTH: &str = "auth";
pub const EVENT_AUTH_SUCCESS: &str = "auth success";
pub const EVENT_CONSOLE_OUTPUT: &str = "console output";
pub const EVENT_STATUS: &str = "status";
pub const EVENT_STATS: &str = "stats";
pub const EVENT_TOKEN_EXPIRING: &str = "token expiring";
pub const EVENT_TOKEN_EXPIRED: &str = "token expired";
pub const EVENT_DAEMON_ERROR: &str = "daemon error";
pub const EVENT_JWT_ERROR: &str = "jwt error";
pub const EVENT_SEND_COMMAND: &str = "send command";
pub const EVENT_SET_STATE: &str = "set state";
pub const EVENT_SEND_LOGS: &str = "send logs";
pub const EVENT_SEND_STATS: &str = "send stats";

/// Wire frame of the panel console socket: `{"event": "...", "args": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocketFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

impl SocketFrame {
    pub fn new(event: &str, args: Vec<String>) -> Self {
        Self {
            event: event.to_string(),
            args: Some(args),
        }
    }

    pub fn auth(token: &str) -> Self {
        Self::new(EVENT_AUTH, vec![token.to_string()])
    }

    pub fn first_arg(&self) -> Option<&str> {
        self.args
            .as_ref()
            .and_then(|args| args.first())
            .map(String::as_str)
    }

    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to encode console frame")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Start,
    Stop,
    Restart,
    Kill,
}

impl PowerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerAction::Start => "start",
            PowerAction::Stop => "stop",
            PowerAction::Restart => "restart",
            PowerAction::Kill => "kill",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "start" => Some(PowerAction::Start),
            "stop" => Some(PowerAction::Stop),
            "restart" => Some(PowerAction::Restart),
            "kill" => Some(PowerAction::Kill),
            _ => None,
        }
    }
}

/// Frames a browser may push through the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    SendCommand(String),
    SetState(PowerAction),
    SendLogs,
    SendStats,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConsoleCommandError {
    #[error("frame is not valid json")]
    Malformed,
    #[error("event `{0}` is not allowed from the browser")]
    NotAllowed(String),
    #[error("event `{0}` is missing its argument")]
    MissingArgument(String),
    #[error("unknown power action `{0}`")]
    UnknownPowerAction(String),
}

impl ConsoleCommand {
    pub fn parse(text: &str) -> Result<Self, ConsoleCommandError> {
        let frame: SocketFrame =
            serde_json::from_str(text).map_err(|_| ConsoleCommandError::Malformed)?;

        match frame.event.as_str() {
            EVENT_SEND_COMMAND => frame
                .first_arg()
                .map(|command| ConsoleCommand::SendCommand(command.to_string()))
                .ok_or_else(|| ConsoleCommandError::MissingArgument(frame.event.clone())),
            EVENT_SET_STATE => {
                let action = frame
                    .first_arg()
                    .ok_or_else(|| ConsoleCommandError::MissingArgument(frame.event.clone()))?;
                PowerAction::from_str(action)
                    .map(ConsoleCommand::SetState)
                    .ok_or_else(|| ConsoleCommandError::UnknownPowerAction(action.to_string()))
            }
            EVENT_SEND_LOGS => Ok(ConsoleCommand::SendLogs),
            EVENT_SEND_STATS => Ok(ConsoleCommand::SendStats),
            _ => Err(ConsoleCommandError::NotAllowed(frame.event)),
        }
    }

    pub fn into_frame(self) -> SocketFrame {
        match self {
            ConsoleCommand::SendCommand(command) => {
                SocketFrame::new(EVENT_SEND_COMMAND, vec![command])
            }
            ConsoleCommand::SetState(action) => {
                SocketFrame::new(EVENT_SET_STATE, vec![action.as_str().to_string()])
            }
            ConsoleCommand::SendLogs => SocketFrame::new(EVENT_SEND_LOGS, vec![]),
            ConsoleCommand::SendStats => SocketFrame::new(EVENT_SEND_STATS, vec![]),
        }
    }
}

/// How the relay reacts to what the panel socket pushes.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// Credentials are about to lapse (or did); fetch new ones and re-send `auth`.
    Reauthenticate,
    /// Anything else goes to the browser as-is.
    Forward(SocketFrame),
}

impl UpstreamEvent {
    pub fn parse(text: &str) -> Result<Self> {
        let frame: SocketFrame =
            serde_json::from_str(text).context("panel sent a frame that is not valid json")?;

        Ok(match frame.event.as_str() {
            EVENT_TOKEN_EXPIRING | EVENT_TOKEN_EXPIRED => UpstreamEvent::Reauthenticate,
            _ => UpstreamEvent::Forward(frame),
        })
    }
}

pub const NORMAL_CLOSURE: u16 = 1000;

/// Fixed-delay reconnect: abnormal closes retry forever, a normal close ends the session.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn after_close(&self, close_code: Option<u16>) -> Option<Duration> {
        match close_code {
            Some(NORMAL_CLOSURE) => None,
            _ => Some(self.delay),
        }
    }
}

/// The panel's daemon checks `Origin` against the panel url.
pub async fn connect_upstream(socket_url: &str, origin: &str) -> Result<UpstreamSocket> {
    let mut request = socket_url
        .into_client_request()
        .context("invalid console socket url")?;
    request.headers_mut().insert(
        ORIGIN,
        HeaderValue::from_str(origin).context("invalid console origin")?,
    );

    let (stream, _response) = connect_async(request)
        .await
        .context("failed to connect to panel console socket")?;
    Ok(stream)
}
