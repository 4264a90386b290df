use braid_core::errors::GatewayError;
use braid_core::stream::ChatEvent;

/// Split a raw SSE chunk into (event_type, data) pairs. Multi-line data
/// fields are joined with newlines; events without an explicit `event:`
/// line default to "message".
pub fn parse_sse_lines(chunk: &str) -> Vec<(String, String)> {
    let mut events = Vec::new();
    let mut event_type = String::from("message");
    let mut data_lines: Vec<&str> = Vec::new();

    for line in chunk.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event_type = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        } else if line.is_empty() && !data_lines.is_empty() {
            events.push((
                std::mem::replace(&mut event_type, String::from("message")),
                data_lines.join("\n"),
            ));
            data_lines.clear();
        }
    }

    if !data_lines.is_empty() {
        events.push((event_type, data_lines.join("\n")));
    }

    events
}

/// Map one gateway SSE event onto the stream-event model:
///
/// message_start → Start, content_delta → Delta, message_stop → Done,
/// error → Error. Unknown event types are ignored.
pub fn parse_gateway_event(event_type: &str, data: &str) -> Option<ChatEvent> {
    match event_type {
        "message_start" => Some(ChatEvent::Start),
        "content_delta" => {
            let text = serde_json::from_str::<serde_json::Value>(data)
                .ok()
                .and_then(|v| v.get("text").and_then(|t| t.as_str()).map(str::to_owned))
                .unwrap_or_default();
            Some(ChatEvent::Delta { text })
        }
        "message_stop" => Some(ChatEvent::Done),
        "error" => {
            let message = serde_json::from_str::<serde_json::Value>(data)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
                .unwrap_or_else(|| data.to_string());
            Some(ChatEvent::Error {
                error: GatewayError::StreamInterrupted(message),
            })
        }
        _ => None,
    }
}
