//! One chat completion call, end to end.
//!
//! [`ChatClient::send_stream`] builds the request envelope, posts it, and
//! feeds the body through [`StreamConsumer`] (decoder, then normalizer),
//! handing each non-empty piece of text to the caller's callback in arrival
//! order. Responses that are not event streams are parsed once as a whole
//! document. [`ChatClient::send_once`] is the non-streaming variant used for
//! regenerate/retry, and [`ChatClient::list_models`] is advisory discovery
//! that never fails.
//!
//! No retries happen here. Every call resolves credentials afresh and owns
//! its own decode buffer, so concurrent calls share nothing mutable.

use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, warn};

use crate::api::models::fetch_models;
use crate::api::{
    Attachment, ChatMessage, ChatRequest, ChatToolDefinition, ChatToolFunction, ContentPart,
    MessageContent, ModelInfo, Role, Usage,
};
use crate::core::credentials::{CredentialSource, Credentials};
use crate::core::errors::ApiError;
use crate::core::frames::{FrameDecoder, StreamFrame};
use crate::core::normalizer::{normalize_document, normalize_frame, FrameError};
use crate::utils::auth::add_auth_headers;
use crate::utils::url::construct_api_url;

pub const WEB_SEARCH_TOOL: &str = "web_search";
/// Plugin name aggregators (OneAPI/NewAPI style) look for to enable search.
pub const SEARCH_PLUGIN: &str = "search";
const EVENT_STREAM_MARKER: &str = "event-stream";

/// What to do with a `data:` line that is neither valid JSON nor a
/// truncated fragment of it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedFramePolicy {
    /// Log it, count it in [`StreamSummary::skipped_frames`], keep reading.
    #[default]
    Skip,
    /// Abort the call with a `MalformedStream` error.
    Fail,
}

/// The inputs of one chat turn. Everything is borrowed; the request is built
/// from copies, so the caller's values are never modified.
#[derive(Debug, Clone, Copy)]
pub struct ChatTurn<'a> {
    pub messages: &'a [ChatMessage],
    pub model: &'a str,
    pub web_search: bool,
    pub attachments: &'a [Attachment],
}

impl<'a> ChatTurn<'a> {
    pub fn new(messages: &'a [ChatMessage], model: &'a str) -> Self {
        Self {
            messages,
            model,
            web_search: false,
            attachments: &[],
        }
    }

    pub fn with_web_search(mut self, web_search: bool) -> Self {
        self.web_search = web_search;
        self
    }

    pub fn with_attachments(mut self, attachments: &'a [Attachment]) -> Self {
        self.attachments = attachments;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The `[DONE]` marker arrived, or a whole document was delivered.
    Done,
    /// The server closed the body without a marker.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    /// Number of callback invocations.
    pub tokens: usize,
    /// Frames that reached the normalizer (blank and comment lines excluded).
    pub frames: usize,
    pub skipped_frames: usize,
    pub end: StreamEnd,
}

impl Default for StreamSummary {
    fn default() -> Self {
        Self {
            tokens: 0,
            frames: 0,
            skipped_frames: 0,
            end: StreamEnd::Closed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub usage: Usage,
}

pub fn web_search_tool() -> ChatToolDefinition {
    ChatToolDefinition {
        kind: "function".to_string(),
        function: ChatToolFunction {
            name: WEB_SEARCH_TOOL.to_string(),
            description: Some("Search the internet for real-time information".to_string()),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search terms"
                    }
                },
                "required": ["query"]
            }),
        },
    }
}

/// Rewrites the last message into text + one image reference per
/// attachment. Non-image attachments are sent as image references too;
/// several aggregators sniff data URIs in `image_url` and route documents
/// to the model's file input. Does nothing unless the last message is from
/// the user.
fn attach_to_last_user_message(messages: &mut [ChatMessage], attachments: &[Attachment]) {
    if attachments.is_empty() {
        return;
    }
    let Some(last) = messages.last_mut().filter(|m| m.role == Role::User) else {
        debug!(
            count = attachments.len(),
            "last message is not from the user; ignoring attachments"
        );
        return;
    };

    let mut parts = match std::mem::replace(&mut last.content, MessageContent::Parts(Vec::new())) {
        MessageContent::Text(text) => vec![ContentPart::text(text)],
        MessageContent::Parts(parts) => parts,
    };
    parts.extend(
        attachments
            .iter()
            .map(|attachment| ContentPart::image_url(attachment.url.clone())),
    );
    last.content = MessageContent::Parts(parts);
}

pub fn build_request(turn: &ChatTurn<'_>, stream: bool) -> ChatRequest {
    let mut messages = turn.messages.to_vec();
    attach_to_last_user_message(&mut messages, turn.attachments);

    let mut request = ChatRequest {
        model: turn.model.to_string(),
        messages,
        stream,
        tools: None,
        plugins: None,
        google_search: None,
        web_search: None,
    };

    if turn.web_search {
        request.tools = Some(vec![web_search_tool()]);
        request.plugins = Some(vec![SEARCH_PLUGIN.to_string()]);
        request.google_search = Some(true);
        request.web_search = Some(true);
    }

    request
}

fn document_error(err: FrameError) -> ApiError {
    match err {
        FrameError::Upstream(err) => err,
        FrameError::Truncated => ApiError::malformed_stream("response body ended mid-JSON"),
        FrameError::Malformed(reason) => {
            ApiError::malformed_stream(format!("response body is not valid JSON: {reason}"))
        }
    }
}

/// Incremental decode/normalize state for one response body.
pub struct StreamConsumer {
    decoder: FrameDecoder,
    status: StatusCode,
    policy: MalformedFramePolicy,
    summary: StreamSummary,
    finished: bool,
}

impl StreamConsumer {
    pub fn new(status: StatusCode, policy: MalformedFramePolicy) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            status,
            policy,
            summary: StreamSummary::default(),
            finished: false,
        }
    }

    /// Feeds one network read. Returns `Ok(true)` once the terminal marker
    /// has been seen; anything fed after that is ignored.
    pub fn feed<F>(&mut self, chunk: &[u8], on_token: &mut F) -> Result<bool, ApiError>
    where
        F: FnMut(&str),
    {
        if self.finished {
            return Ok(true);
        }

        for line in self.decoder.push(chunk) {
            let frame = StreamFrame::from_line(&line);
            if frame == StreamFrame::Ignored {
                continue;
            }
            self.summary.frames += 1;

            match normalize_frame(&frame, self.status) {
                Ok(delta) if delta.terminal => {
                    self.summary.end = StreamEnd::Done;
                    self.finished = true;
                    return Ok(true);
                }
                Ok(delta) => {
                    if !delta.text.is_empty() {
                        on_token(&delta.text);
                        self.summary.tokens += 1;
                    }
                }
                Err(FrameError::Upstream(err)) => {
                    debug!(code = err.code(), "error object in stream");
                    return Err(err);
                }
                Err(FrameError::Truncated) => {
                    debug!(line_len = line.len(), "dropping truncated frame");
                    self.summary.skipped_frames += 1;
                }
                Err(FrameError::Malformed(reason)) => match self.policy {
                    MalformedFramePolicy::Fail => {
                        return Err(ApiError::malformed_stream(format!(
                            "malformed stream frame: {reason}"
                        )));
                    }
                    MalformedFramePolicy::Skip => {
                        warn!(%reason, "skipping malformed stream frame");
                        self.summary.skipped_frames += 1;
                    }
                },
            }
        }

        Ok(false)
    }

    pub fn finish(mut self) -> StreamSummary {
        let discarded = self.decoder.finish();
        if discarded > 0 {
            debug!(discarded, "discarding unterminated trailing line");
        }
        self.summary
    }
}

fn is_event_stream(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains(EVENT_STREAM_MARKER))
}

#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
    frame_policy: MalformedFramePolicy,
}

impl ChatClient {
    pub fn new(credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            frame_policy: MalformedFramePolicy::default(),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_frame_policy(mut self, policy: MalformedFramePolicy) -> Self {
        self.frame_policy = policy;
        self
    }

    pub fn frame_policy(&self) -> MalformedFramePolicy {
        self.frame_policy
    }

    fn resolve_credentials(&self) -> Result<Credentials, ApiError> {
        let credentials = self.credentials.resolve();
        if credentials.has_api_key() {
            Ok(credentials)
        } else {
            Err(ApiError::auth_missing())
        }
    }

    async fn post_chat(
        &self,
        credentials: &Credentials,
        request: &ChatRequest,
    ) -> Result<reqwest::Response, ApiError> {
        let chat_url = construct_api_url(&credentials.base_url, "chat/completions");
        debug!(
            url = %chat_url,
            model = %request.model,
            stream = request.stream,
            web_search = request.web_search.unwrap_or(false),
            "sending chat completion request"
        );

        let http_request = self
            .http
            .post(chat_url)
            .header(CONTENT_TYPE, "application/json");
        let response = add_auth_headers(http_request, &credentials.api_key)
            .json(request)
            .send()
            .await
            .map_err(|err| ApiError::transport(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_response(status, &body);
            debug!(status = status.as_u16(), kind = %err.kind(), "chat request rejected");
            return Err(err);
        }
        Ok(response)
    }

    /// Streams one completion, calling `on_token` with each non-empty piece
    /// of text in arrival order.
    pub async fn send_stream<F>(
        &self,
        turn: &ChatTurn<'_>,
        mut on_token: F,
    ) -> Result<StreamSummary, ApiError>
    where
        F: FnMut(&str),
    {
        let credentials = self.resolve_credentials()?;
        let request = build_request(turn, true);
        let response = self.post_chat(&credentials, &request).await?;
        let status = response.status();

        if !is_event_stream(&response) {
            debug!("response is not an event stream; reading whole document");
            let body = response
                .text()
                .await
                .map_err(|err| ApiError::transport(&err))?;
            let document = normalize_document(&body, status).map_err(document_error)?;
            let mut summary = StreamSummary {
                frames: 1,
                end: StreamEnd::Done,
                ..StreamSummary::default()
            };
            if !document.text.is_empty() {
                on_token(&document.text);
                summary.tokens = 1;
            }
            return Ok(summary);
        }

        let mut consumer = StreamConsumer::new(status, self.frame_policy);
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|err| ApiError::transport(&err))?;
            if consumer.feed(&chunk, &mut on_token)? {
                break;
            }
        }

        let summary = consumer.finish();
        debug!(
            tokens = summary.tokens,
            frames = summary.frames,
            skipped = summary.skipped_frames,
            end = ?summary.end,
            "stream finished"
        );
        Ok(summary)
    }

    /// Same envelope as [`send_stream`](Self::send_stream) with `stream:
    /// false`; returns the whole reply at once.
    pub async fn send_once(&self, turn: &ChatTurn<'_>) -> Result<Completion, ApiError> {
        let credentials = self.resolve_credentials()?;
        let request = build_request(turn, false);
        let response = self.post_chat(&credentials, &request).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ApiError::transport(&err))?;

        let document = normalize_document(&body, status).map_err(document_error)?;
        Ok(Completion {
            content: document.text,
            usage: document.usage.unwrap_or_default(),
        })
    }

    /// Best-effort model discovery: any failure yields an empty list.
    pub async fn list_models(&self) -> Vec<ModelInfo> {
        let Ok(credentials) = self.resolve_credentials() else {
            debug!("no API key; skipping model listing");
            return Vec::new();
        };

        match fetch_models(&self.http, &credentials.base_url, &credentials.api_key).await {
            Ok(response) => response.data,
            Err(err) => {
                warn!(error = %err, kind = %err.kind(), "model listing failed");
                Vec::new()
            }
        }
    }
}
