//! The `say` command: one prompt in, one reply out on stdout

use std::error::Error;
use std::io::{self, Write};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{Attachment, ChatMessage, Usage};
use crate::cli::chat_client;
use crate::core::chat_stream::{ChatStreamService, StreamMessage, StreamParams};
use crate::core::config::Config;
use crate::core::errors::{ApiError, ErrorKind};
use crate::core::transport::ChatTurn;
use crate::utils::attachments::load_attachment;
use crate::utils::logging::TranscriptLog;

pub struct SayOptions {
    pub prompt: String,
    pub model: Option<String>,
    pub system: Option<String>,
    pub stream: bool,
    pub web_search: bool,
    pub attachments: Vec<String>,
    pub log: Option<String>,
}

/// A follow-up suggestion for errors the user can fix themselves.
pub fn error_hint(err: &ApiError) -> Option<&'static str> {
    if err.kind() == ErrorKind::AuthMissing {
        None
    } else if err.is_insufficient_quota() {
        Some("Your account is out of credits. Top up with your provider and try again.")
    } else if err.is_unauthorized() {
        Some("The gateway rejected your API key. Update it with: hubchat set api-key <KEY>")
    } else if err.is_rate_limited() {
        Some("You are being rate limited. Wait a moment and try again.")
    } else {
        None
    }
}

fn report_and_exit(err: &ApiError) -> ! {
    eprintln!("\n❌ Error: {err}");
    if let Some(hint) = error_hint(err) {
        eprintln!("💡 {hint}");
    }
    debug!(kind = %err.kind(), status = err.status(), code = err.code(), "say failed");
    std::process::exit(1);
}

pub fn format_usage(usage: &Usage) -> String {
    let mut parts = Vec::new();
    if let Some(prompt) = usage.prompt_tokens {
        parts.push(format!("{prompt} prompt"));
    }
    if let Some(completion) = usage.completion_tokens {
        parts.push(format!("{completion} completion"));
    }
    parts.push(format!("{} total tokens", usage.total_tokens));
    parts.join(", ")
}

pub fn build_messages(system: Option<&str>, prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system.map(str::trim).filter(|s| !s.is_empty()) {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(prompt));
    messages
}

pub async fn run_say(config: &Config, options: SayOptions) -> Result<(), Box<dyn Error>> {
    let prompt = options.prompt.trim().to_string();
    if prompt.is_empty() {
        eprintln!("Usage: hubchat say <prompt>");
        std::process::exit(1);
    }

    let attachments = options
        .attachments
        .iter()
        .map(|source| {
            load_attachment(source).map_err(|err| format!("Cannot attach {source}: {err}"))
        })
        .collect::<Result<Vec<Attachment>, _>>()?;

    let transcript = options.log.as_deref().map(TranscriptLog::new).transpose()?;
    if let Some(log) = &transcript {
        log.log_user("You", &prompt)?;
    }

    let model = options
        .model
        .clone()
        .unwrap_or_else(|| config.model_or_default().to_string());
    let web_search = options.web_search || config.web_search_enabled();
    let messages = build_messages(options.system.as_deref(), &prompt);
    let client = chat_client(config);

    let reply = if options.stream {
        let (stream_service, mut rx) = ChatStreamService::new(client);
        stream_service.spawn_stream(StreamParams {
            model,
            api_messages: messages,
            web_search,
            attachments,
            cancel_token: CancellationToken::new(),
            stream_id: 0,
        });

        let mut full_response = String::new();
        let mut stdout = io::stdout();
        while let Some((message, _)) = rx.recv().await {
            match message {
                StreamMessage::Chunk(content) => {
                    full_response.push_str(&content);
                    print!("{content}");
                    stdout.flush()?;
                }
                StreamMessage::Error(err) => report_and_exit(&err),
                StreamMessage::End => {
                    println!();
                    break;
                }
            }
        }
        full_response
    } else {
        let turn = ChatTurn::new(&messages, &model)
            .with_web_search(web_search)
            .with_attachments(&attachments);
        match client.send_once(&turn).await {
            Ok(completion) => {
                debug!(
                    prompt_tokens = ?completion.usage.prompt_tokens,
                    completion_tokens = ?completion.usage.completion_tokens,
                    total_tokens = completion.usage.total_tokens,
                    "completion received"
                );
                println!("{}", completion.content);
                if completion.usage.total_tokens > 0 {
                    eprintln!("📊 {}", format_usage(&completion.usage));
                }
                completion.content
            }
            Err(err) => report_and_exit(&err),
        }
    };

    if let Some(log) = &transcript {
        log.log_message(&reply)?;
    }
    Ok(())
}
