use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{Attachment, ChatMessage};
use crate::core::errors::ApiError;
use crate::core::transport::{ChatClient, ChatTurn};

#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Chunk(String),
    Error(ApiError),
    End,
}

pub struct StreamParams {
    pub model: String,
    pub api_messages: Vec<ChatMessage>,
    pub web_search: bool,
    pub attachments: Vec<Attachment>,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

/// Runs streaming calls on the tokio runtime and forwards their output over
/// a channel, tagged with the caller's stream id.
///
/// Cancelling a stream's token drops the in-flight request; a cancelled
/// stream sends nothing further, not even `End`.
#[derive(Clone)]
pub struct ChatStreamService {
    client: ChatClient,
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
}

impl ChatStreamService {
    pub fn new(client: ChatClient) -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { client, tx }, rx)
    }

    pub fn spawn_stream(&self, params: StreamParams) -> JoinHandle<()> {
        let client = self.client.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let StreamParams {
                model,
                api_messages,
                web_search,
                attachments,
                cancel_token,
                stream_id,
            } = params;

            let turn = ChatTurn::new(&api_messages, &model)
                .with_web_search(web_search)
                .with_attachments(&attachments);

            tokio::select! {
                result = client.send_stream(&turn, |token| {
                    let _ = tx.send((StreamMessage::Chunk(token.to_string()), stream_id));
                }) => {
                    if let Err(err) = result {
                        let _ = tx.send((StreamMessage::Error(err), stream_id));
                    }
                    let _ = tx.send((StreamMessage::End, stream_id));
                }
                _ = cancel_token.cancelled() => {
                    debug!(stream_id, "stream cancelled by caller");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::credentials::Credentials;
    use crate::core::errors::ErrorKind;
    use crate::utils::test_utils::{content_chunk, create_test_messages, sse_body};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_for(
        server: &MockServer,
    ) -> (ChatStreamService, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let credentials = Credentials::new("sk-test", format!("{}/v1", server.uri()));
        ChatStreamService::new(ChatClient::new(Arc::new(credentials)))
    }

    fn params(stream_id: u64, cancel_token: CancellationToken) -> StreamParams {
        StreamParams {
            model: "model-x".to_string(),
            api_messages: create_test_messages(),
            web_search: false,
            attachments: Vec::new(),
            cancel_token,
            stream_id,
        }
    }

    #[tokio::test]
    async fn forwards_chunks_then_end() {
        let server = MockServer::start().await;
        let (first, second) = (content_chunk("Hel"), content_chunk("lo"));
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(sse_body(&[&first, &second]), "text/event-stream"),
            )
            .mount(&server)
            .await;

        let (service, mut rx) = service_for(&server);
        service
            .spawn_stream(params(7, CancellationToken::new()))
            .await
            .unwrap();

        let mut received = Vec::new();
        while let Ok(message) = rx.try_recv() {
            received.push(message);
        }
        assert_eq!(
            received,
            vec![
                (StreamMessage::Chunk("Hel".to_string()), 7),
                (StreamMessage::Chunk("lo".to_string()), 7),
                (StreamMessage::End, 7),
            ]
        );
    }

    #[tokio::test]
    async fn routes_classified_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})),
            )
            .mount(&server)
            .await;

        let (service, mut rx) = service_for(&server);
        service
            .spawn_stream(params(3, CancellationToken::new()))
            .await
            .unwrap();

        match rx.recv().await {
            Some((StreamMessage::Error(err), 3)) => {
                assert_eq!(err.kind(), ErrorKind::Unauthorized);
                assert_eq!(err.message(), "bad key");
            }
            other => panic!("expected error message, got {other:?}"),
        }
        assert_eq!(rx.recv().await, Some((StreamMessage::End, 3)));
    }

    #[tokio::test]
    async fn cancelled_stream_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(sse_body(&[]), "text/event-stream")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let (service, mut rx) = service_for(&server);
        let cancel_token = CancellationToken::new();
        let handle = service.spawn_stream(params(1, cancel_token.clone()));
        cancel_token.cancel();
        handle.await.unwrap();

        assert!(rx.try_recv().is_err());
    }
}
