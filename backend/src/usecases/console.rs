use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use crates::panel::console::{
    ConsoleCommand, ReconnectPolicy, SocketFrame, UpstreamEvent, UpstreamSocket, connect_upstream,
};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::gateways::PanelGateway;

pub const EVENT_RELAY_ERROR: &str = "relay error";
pub const EVENT_RELAY_RECONNECTING: &str = "relay reconnecting";
const RECONNECTING_REJECTION: &str = "console is reconnecting";

/// Browser half of a console session.
#[async_trait]
pub trait BrowserChannel: Send {
    /// Next text frame, `None` once the browser is gone.
    async fn recv(&mut self) -> Option<String>;
    async fn send(&mut self, text: String) -> AnyResult<()>;
    async fn close(&mut self);
}

#[derive(Debug, PartialEq)]
enum SessionEnd {
    BrowserGone,
    UpstreamClosed(Option<u16>),
}

/// Relays one browser socket to the panel console of one server, reconnecting upstream as needed.
pub struct ConsoleRelay<Panel>
where
    Panel: PanelGateway + 'static,
{
    panel: Arc<Panel>,
    origin: String,
    policy: ReconnectPolicy,
}

impl<Panel> ConsoleRelay<Panel>
where
    Panel: PanelGateway + 'static,
{
    pub fn new(panel: Arc<Panel>, origin: String, reconnect_delay: Duration) -> Self {
        Self {
            panel,
            origin,
            policy: ReconnectPolicy::new(reconnect_delay),
        }
    }

    pub async fn run<B: BrowserChannel>(&self, identifier: &str, browser: &mut B) {
        info!(identifier, "console: relay started");

        loop {
            let end = match self.open_upstream(identifier).await {
                Ok(mut upstream) => {
                    let end = self.pump(identifier, browser, &mut upstream).await;
                    if end == SessionEnd::BrowserGone {
                        let _ = upstream.close(None).await;
                    }
                    end
                }
                Err(err) => {
                    warn!(identifier, error = %err, "console: upstream connection failed");
                    SessionEnd::UpstreamClosed(None)
                }
            };

            let close_code = match end {
                SessionEnd::BrowserGone => {
                    info!(identifier, "console: browser disconnected");
                    return;
                }
                SessionEnd::UpstreamClosed(code) => code,
            };

            let Some(delay) = self.policy.after_close(close_code) else {
                info!(identifier, "console: upstream closed normally");
                browser.close().await;
                return;
            };

            info!(
                identifier,
                close_code = ?close_code,
                delay_ms = delay.as_millis() as u64,
                "console: reconnecting upstream"
            );
            let notice =
                SocketFrame::new(EVENT_RELAY_RECONNECTING, vec![delay.as_secs().to_string()]);
            if send_frame(browser, &notice).await.is_err() {
                return;
            }
            if !wait_for_reconnect(browser, delay).await {
                info!(identifier, "console: browser left while waiting to reconnect");
                return;
            }
        }
    }

    async fn open_upstream(&self, identifier: &str) -> AnyResult<UpstreamSocket> {
        let credentials = self
            .panel
            .websocket_credentials(identifier)
            .await
            .context("failed to fetch console credentials")?;

        let mut upstream = connect_upstream(&credentials.socket, &self.origin).await?;
        upstream
            .send(Message::Text(SocketFrame::auth(&credentials.token).to_text()?))
            .await
            .context("failed to authenticate console socket")?;

        Ok(upstream)
    }

    async fn reauthenticate(
        &self,
        identifier: &str,
        upstream: &mut UpstreamSocket,
    ) -> AnyResult<()> {
        let credentials = self
            .panel
            .websocket_credentials(identifier)
            .await
            .context("failed to refresh console credentials")?;

        upstream
            .send(Message::Text(SocketFrame::auth(&credentials.token).to_text()?))
            .await
            .context("failed to re-authenticate console socket")?;

        debug!(identifier, "console: token refreshed");
        Ok(())
    }

    async fn pump<B: BrowserChannel>(
        &self,
        identifier: &str,
        browser: &mut B,
        upstream: &mut UpstreamSocket,
    ) -> SessionEnd {
        loop {
            tokio::select! {
                inbound = browser.recv() => {
                    let Some(text) = inbound else {
                        return SessionEnd::BrowserGone;
                    };

                    match ConsoleCommand::parse(&text) {
                        Ok(command) => {
                            let outbound = match command.into_frame().to_text() {
                                Ok(outbound) => outbound,
                                Err(err) => {
                                    warn!(identifier, error = %err, "console: failed to encode command");
                                    continue;
                                }
                            };
                            if let Err(err) = upstream.send(Message::Text(outbound)).await {
                                warn!(identifier, error = %err, "console: failed to forward command");
                                return SessionEnd::UpstreamClosed(None);
                            }
                        }
                        Err(err) => {
                            let rejection =
                                SocketFrame::new(EVENT_RELAY_ERROR, vec![err.to_string()]);
                            if send_frame(browser, &rejection).await.is_err() {
                                return SessionEnd::BrowserGone;
                            }
                        }
                    }
                }
                frame = upstream.next() => match frame {
                    Some(Ok(Message::Text(text))) => match UpstreamEvent::parse(&text) {
                        Ok(UpstreamEvent::Reauthenticate) => {
                            if let Err(err) = self.reauthenticate(identifier, upstream).await {
                                warn!(identifier, error = %err, "console: re-authentication failed");
                                return SessionEnd::UpstreamClosed(None);
                            }
                        }
                        Ok(UpstreamEvent::Forward(_)) => {
                            if browser.send(text).await.is_err() {
                                return SessionEnd::BrowserGone;
                            }
                        }
                        Err(err) => debug!(identifier, error = %err, "console: dropping unparsable upstream frame"),
                    },
                    Some(Ok(Message::Close(close))) => {
                        return SessionEnd::UpstreamClosed(close.map(|frame| u16::from(frame.code)));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(identifier, error = %err, "console: upstream socket error");
                        return SessionEnd::UpstreamClosed(None);
                    }
                    None => return SessionEnd::UpstreamClosed(None),
                },
            }
        }
    }
}

async fn send_frame<B: BrowserChannel>(browser: &mut B, frame: &SocketFrame) -> AnyResult<()> {
    browser.send(frame.to_text()?).await
}

/// Sleeps for `delay`; returns false if the browser disconnects first.
/// Frames sent meanwhile are answered with a relay error instead of being forwarded.
async fn wait_for_reconnect<B: BrowserChannel>(browser: &mut B, delay: Duration) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            inbound = browser.recv() => {
                if inbound.is_none() {
                    return false;
                }
                let rejection =
                    SocketFrame::new(EVENT_RELAY_ERROR, vec![RECONNECTING_REJECTION.to_string()]);
                if send_frame(browser, &rejection).await.is_err() {
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::gateways::MockPanelGateway;
    use crates::panel::models::WebsocketCredentials;
    use std::{
        future::Future,
        sync::atomic::{AtomicUsize, Ordering},
    };
    use tokio::{
        net::{TcpListener, TcpStream},
        sync::mpsc,
        time::timeout,
    };
    use tokio_tungstenite::{
        WebSocketStream, accept_async,
        tungstenite::protocol::{CloseFrame, frame::coding::CloseCode},
    };

    struct FakeBrowser {
        inbound: mpsc::UnboundedReceiver<String>,
        outbound: mpsc::UnboundedSender<String>,
        closed: bool,
    }

    #[async_trait]
    impl BrowserChannel for FakeBrowser {
        async fn recv(&mut self) -> Option<String> {
            self.inbound.recv().await
        }

        async fn send(&mut self, text: String) -> AnyResult<()> {
            self.outbound.send(text)?;
            Ok(())
        }

        async fn close(&mut self) {
            self.closed = true;
        }
    }

    fn browser() -> (
        FakeBrowser,
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            FakeBrowser {
                inbound: in_rx,
                outbound: out_tx,
                closed: false,
            },
            in_tx,
            out_rx,
        )
    }

    /// Serves one scripted session per accepted connection; the script gets the connection index.
    async fn spawn_upstream<F, Fut>(script: F) -> String
    where
        F: Fn(WebSocketStream<TcpStream>, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut index = 0;
            while let Ok((stream, _)) = listener.accept().await {
                let ws = accept_async(stream).await.unwrap();
                tokio::spawn(script(ws, index));
                index += 1;
            }
        });
        format!("ws://{}", addr)
    }

    fn panel_issuing_tokens(socket: String) -> (MockPanelGateway, Arc<AtomicUsize>) {
        let issued = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&issued);
        let mut panel = MockPanelGateway::new();
        panel.expect_websocket_credentials().returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(WebsocketCredentials {
                token: format!("jwt-{n}"),
                socket: socket.clone(),
            })
        });
        (panel, issued)
    }

    async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(_)) => continue,
                other => panic!("upstream expected text, got {other:?}"),
            }
        }
    }

    async fn close_normally(mut ws: WebSocketStream<TcpStream>) {
        let _ = ws
            .close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            }))
            .await;
        while let Some(Ok(_)) = ws.next().await {}
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn authenticates_relays_both_ways_and_stops_on_normal_close() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<String>();
        let url = spawn_upstream(move |mut ws, _| {
            let seen = seen_tx.clone();
            async move {
                seen.send(next_text(&mut ws).await).unwrap();
                ws.send(Message::Text(r#"{"event":"auth success"}"#.to_string()))
                    .await
                    .unwrap();
                ws.send(Message::Text(
                    r#"{"event":"console output","args":["Done (3.2s)!"]}"#.to_string(),
                ))
                .await
                .unwrap();
                seen.send(next_text(&mut ws).await).unwrap();
                close_normally(ws).await;
            }
        })
        .await;

        let (panel, issued) = panel_issuing_tokens(url);
        let relay = ConsoleRelay::new(
            Arc::new(panel),
            "https://panel.example".to_string(),
            Duration::from_millis(10),
        );
        let (mut browser, inbound, mut outbound) = browser();

        inbound
            .send(r#"{"event":"auth","args":["forged"]}"#.to_string())
            .unwrap();
        inbound
            .send(r#"{"event":"send command","args":["say hi"]}"#.to_string())
            .unwrap();

        timeout(Duration::from_secs(5), relay.run("1a7ce997", &mut browser))
            .await
            .unwrap();

        assert!(browser.closed);
        assert_eq!(issued.load(Ordering::SeqCst), 1);
        assert_eq!(seen_rx.recv().await.unwrap(), r#"{"event":"auth","args":["jwt-1"]}"#);
        assert_eq!(
            seen_rx.recv().await.unwrap(),
            r#"{"event":"send command","args":["say hi"]}"#
        );

        let frames = drain(&mut outbound);
        assert!(frames.iter().any(|f| f.contains("auth success")));
        assert!(frames.iter().any(|f| f.contains("Done (3.2s)!")));
        assert!(frames.iter().any(|f| f.contains(EVENT_RELAY_ERROR)));
        drop(inbound);
    }

    #[tokio::test]
    async fn abnormal_close_reconnects_with_fresh_credentials() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<String>();
        let url = spawn_upstream(move |mut ws, index| {
            let seen = seen_tx.clone();
            async move {
                seen.send(next_text(&mut ws).await).unwrap();
                if index == 0 {
                    drop(ws);
                } else {
                    close_normally(ws).await;
                }
            }
        })
        .await;

        let (panel, issued) = panel_issuing_tokens(url);
        let relay = ConsoleRelay::new(
            Arc::new(panel),
            "https://panel.example".to_string(),
            Duration::from_millis(10),
        );
        let (mut browser, inbound, mut outbound) = browser();

        timeout(Duration::from_secs(5), relay.run("1a7ce997", &mut browser))
            .await
            .unwrap();

        assert_eq!(issued.load(Ordering::SeqCst), 2);
        assert_eq!(seen_rx.recv().await.unwrap(), r#"{"event":"auth","args":["jwt-1"]}"#);
        assert_eq!(seen_rx.recv().await.unwrap(), r#"{"event":"auth","args":["jwt-2"]}"#);
        assert!(
            drain(&mut outbound)
                .iter()
                .any(|f| f.contains(EVENT_RELAY_RECONNECTING))
        );
        assert!(browser.closed);
        drop(inbound);
    }

    #[tokio::test]
    async fn expiring_token_is_refreshed_without_telling_the_browser() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<String>();
        let url = spawn_upstream(move |mut ws, _| {
            let seen = seen_tx.clone();
            async move {
                seen.send(next_text(&mut ws).await).unwrap();
                ws.send(Message::Text(r#"{"event":"token expiring"}"#.to_string()))
                    .await
                    .unwrap();
                seen.send(next_text(&mut ws).await).unwrap();
                close_normally(ws).await;
            }
        })
        .await;

        let (panel, issued) = panel_issuing_tokens(url);
        let relay = ConsoleRelay::new(
            Arc::new(panel),
            "https://panel.example".to_string(),
            Duration::from_millis(10),
        );
        let (mut browser, inbound, mut outbound) = browser();

        timeout(Duration::from_secs(5), relay.run("1a7ce997", &mut browser))
            .await
            .unwrap();

        assert_eq!(issued.load(Ordering::SeqCst), 2);
        assert_eq!(seen_rx.recv().await.unwrap(), r#"{"event":"auth","args":["jwt-1"]}"#);
        assert_eq!(seen_rx.recv().await.unwrap(), r#"{"event":"auth","args":["jwt-2"]}"#);
        assert!(drain(&mut outbound).is_empty());
        drop(inbound);
    }

    #[tokio::test]
    async fn browser_leaving_ends_the_relay() {
        let url = spawn_upstream(|mut ws, _| async move {
            let _ = next_text(&mut ws).await;
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let (panel, issued) = panel_issuing_tokens(url);
        let relay = ConsoleRelay::new(
            Arc::new(panel),
            "https://panel.example".to_string(),
            Duration::from_millis(10),
        );
        let (mut browser, inbound, _outbound) = browser();
        drop(inbound);

        timeout(Duration::from_secs(5), relay.run("1a7ce997", &mut browser))
            .await
            .unwrap();

        assert_eq!(issued.load(Ordering::SeqCst), 1);
        assert!(!browser.closed);
    }

    #[tokio::test]
    async fn commands_sent_while_reconnecting_get_a_relay_error() {
        let (mut browser, inbound, mut outbound) = browser();
        inbound
            .send(r#"{"event":"send command","args":["stop"]}"#.to_string())
            .unwrap();

        let resumed = timeout(
            Duration::from_secs(5),
            wait_for_reconnect(&mut browser, Duration::from_millis(50)),
        )
        .await
        .unwrap();

        assert!(resumed);
        let frames = drain(&mut outbound);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains(EVENT_RELAY_ERROR));
        assert!(frames[0].contains(RECONNECTING_REJECTION));
        drop(inbound);
    }

    #[tokio::test]
    async fn browser_leaving_during_the_reconnect_delay_stops_waiting() {
        let (mut browser, inbound, _outbound) = browser();
        drop(inbound);

        let resumed = timeout(
            Duration::from_secs(5),
            wait_for_reconnect(&mut browser, Duration::from_secs(60)),
        )
        .await
        .unwrap();

        assert!(!resumed);
    }
}
