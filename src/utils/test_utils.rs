use crate::api::ChatMessage;

/// Renders `data:` frames the way gateways do: one per line, blank line
/// after each, `[DONE]` at the end.
pub fn sse_body(payloads: &[&str]) -> String {
    let mut body = String::new();
    for payload in payloads {
        body.push_str("data: ");
        body.push_str(payload);
        body.push_str("\n\n");
    }
    body.push_str("data: [DONE]\n\n");
    body
}

/// A `chat.completion.chunk` payload carrying `content` as its delta.
pub fn content_chunk(content: &str) -> String {
    serde_json::json!({
        "object": "chat.completion.chunk",
        "choices": [{"index": 0, "delta": {"content": content}}]
    })
    .to_string()
}

pub fn create_test_messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::user("Hello"),
        ChatMessage::assistant("Hi there!"),
        ChatMessage::user("How are you?"),
    ]
}

#[test]
fn sse_body_terminates_with_done() {
    let chunk = content_chunk("a");
    let body = sse_body(&[&chunk]);
    assert!(body.starts_with("data: {"));
    assert!(body.ends_with("data: [DONE]\n\n"));
}
