use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::poller::ChangeSink;
use crate::types::{ChangeEvent, Direction, LineDelta, Side};

/// A notification the webhook did not accept. Logged by the poll loop and
/// never retried.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("webhook request failed: {0}")]
    Transport(String),
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Render one side of a change, e.g. `Bid: 10 @ 1.50 :arrow_up_small:`.
pub fn render_line_delta(side: Side, delta: &LineDelta) -> String {
    let marker = match delta.direction {
        Direction::Up => " :arrow_up_small:",
        Direction::Down => " :arrow_down_small:",
        Direction::Flat => "",
    };
    format!(
        "{}: {} @ {:.2}{}",
        side.label(),
        delta.quantity,
        delta.price,
        marker
    )
}

/// Link to the team's page, in `<url|label>` form.
pub fn team_link(host: &Url, game_id: &str, team: &str) -> String {
    format!(
        "<{}/ncaa/game/{game_id}/team/{team}/?start_tab=stock_tab|{team}>",
        host.as_str().trim_end_matches('/')
    )
}

/// Full message text for one team's change.
pub fn format_message(host: &Url, game_id: &str, event: &ChangeEvent) -> String {
    [
        team_link(host, game_id, &event.team),
        render_line_delta(Side::Bid, &event.bid_delta),
        render_line_delta(Side::Ask, &event.ask_delta),
    ]
    .join("\n")
}

/// Posts change notifications to a chat webhook as `{"text": ...}`.
pub struct WebhookNotifier {
    http: reqwest::Client,
    endpoint: Url,
    host: Url,
    game_id: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: Url, host: Url, game_id: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            endpoint,
            host,
            game_id: game_id.into(),
        })
    }

    /// Send one notification. Any non-2xx status is a delivery error.
    pub async fn dispatch(&self, event: &ChangeEvent) -> Result<(), DeliveryError> {
        let message = format_message(&self.host, &self.game_id, event);

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&WebhookPayload { text: &message })
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Published change for {}", event.team);
        Ok(())
    }
}

#[async_trait]
impl ChangeSink for WebhookNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), DeliveryError> {
        self.dispatch(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(direction: Direction, price: f64, quantity: i64) -> LineDelta {
        LineDelta {
            direction,
            price,
            quantity,
        }
    }

    fn host() -> Url {
        Url::parse("https://caseinsensitive.org").unwrap()
    }

    #[test]
    fn renders_markers_by_direction() {
        assert_eq!(
            render_line_delta(Side::Bid, &delta(Direction::Up, 1.5, 10)),
            "Bid: 10 @ 1.50 :arrow_up_small:"
        );
        assert_eq!(
            render_line_delta(Side::Ask, &delta(Direction::Down, 0.875, 3)),
            "Ask: 3 @ 0.88 :arrow_down_small:"
        );
        assert_eq!(
            render_line_delta(Side::Ask, &delta(Direction::Flat, 1.2, 5)),
            "Ask: 5 @ 1.20"
        );
    }

    #[test]
    fn message_has_link_then_bid_then_ask() {
        let event = ChangeEvent {
            team: "DUKE".to_string(),
            bid_delta: delta(Direction::Up, 1.5, 10),
            ask_delta: delta(Direction::Flat, 1.2, 5),
        };

        let message = format_message(&host(), "42", &event);

        assert_eq!(
            message,
            "<https://caseinsensitive.org/ncaa/game/42/team/DUKE/?start_tab=stock_tab|DUKE>\n\
             Bid: 10 @ 1.50 :arrow_up_small:\n\
             Ask: 5 @ 1.20"
        );
    }

    #[test]
    fn payload_is_text_object() {
        let json = serde_json::to_value(WebhookPayload { text: "hi" }).unwrap();
        assert_eq!(json, serde_json::json!({ "text": "hi" }));
    }

    fn event(team: &str) -> ChangeEvent {
        ChangeEvent {
            team: team.to_string(),
            bid_delta: delta(Direction::Down, 0.4, 1),
            ask_delta: delta(Direction::Flat, 0.6, 1),
        }
    }

    /// Serve exactly one HTTP request with the given status line.
    async fn one_shot_server(status_line: &'static str) -> Url {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.ends_with(b"}") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let response =
                format!("{status_line}\r\nContent-Length: 4\r\nConnection: close\r\n\r\noops");
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        Url::parse(&format!("http://{addr}/hook")).unwrap()
    }

    #[tokio::test]
    async fn accepted_post_is_delivered() {
        let endpoint = one_shot_server("HTTP/1.1 200 OK").await;
        let notifier = WebhookNotifier::new(endpoint, host(), "42").unwrap();

        notifier.dispatch(&event("UNC")).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_delivery_error() {
        let endpoint = one_shot_server("HTTP/1.1 500 Internal Server Error").await;
        let notifier = WebhookNotifier::new(endpoint, host(), "42").unwrap();

        let err = notifier.dispatch(&event("UNC")).await.unwrap_err();
        match err {
            DeliveryError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "oops");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_port_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = Url::parse(&format!("http://{addr}/hook")).unwrap();
        let notifier = WebhookNotifier::new(endpoint, host(), "42").unwrap();

        let err = notifier.dispatch(&event("UNC")).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
    }
}
