//! Session event mapping.
//!
//! Translates one decoded server event into zero or more caller-facing
//! messages. Every signal is checked on its own, so a missing or malformed
//! substructure never suppresses its siblings.

use std::time::Duration;

use base64::prelude::*;

use super::messages::{ErrorStage, MessageRoute, OutgoingMessage};
use crate::core::live::{
    FunctionCall, GoAway, LiveServerMessage, OUTPUT_AUDIO_MIME_PREFIX, Part, ServerContent,
    UsageMetadata,
};

/// Map a server event to outbound routes, in emission order.
pub fn map_server_message(message: &LiveServerMessage) -> Vec<MessageRoute> {
    let mut routes = Vec::new();

    if message.setup_complete {
        routes.push(OutgoingMessage::SetupComplete.into());
    }
    if let Some(content) = &message.server_content {
        map_server_content(content, &mut routes);
    }
    if let Some(tool_call) = &message.tool_call {
        for call in &tool_call.function_calls {
            routes.push(map_function_call(call));
        }
    }
    if let Some(go_away) = &message.go_away {
        routes.push(map_go_away(go_away));
    }
    if let Some(usage) = &message.usage_metadata {
        routes.push(map_usage(usage));
    }
    for field_error in &message.field_errors {
        routes.push(OutgoingMessage::error(ErrorStage::OnSessionMessage, field_error.to_string()).into());
    }

    routes
}

fn map_server_content(content: &ServerContent, routes: &mut Vec<MessageRoute>) {
    if let Some(transcription) = &content.input_transcription {
        routes.push(
            OutgoingMessage::TranscriptIn {
                text: transcription.text.clone().unwrap_or_default(),
            }
            .into(),
        );
    }
    if let Some(transcription) = &content.output_transcription {
        routes.push(
            OutgoingMessage::TranscriptOut {
                text: transcription.text.clone().unwrap_or_default(),
            }
            .into(),
        );
    }
    if let Some(parts) = &content.model_turn {
        for part in parts {
            map_part(part, routes);
        }
    }
    if content.turn_complete == Some(true) {
        routes.push(OutgoingMessage::TurnComplete.into());
    }
}

fn map_part(part: &Part, routes: &mut Vec<MessageRoute>) {
    if let Some(text) = &part.text {
        routes.push(OutgoingMessage::Text { text: text.clone() }.into());
    }

    if let Some(blob) = &part.inline_data
        && let Some(data) = &blob.data
    {
        let mime_type = blob.mime_type.as_deref().unwrap_or_default();
        if mime_type.starts_with(OUTPUT_AUDIO_MIME_PREFIX) {
            routes.push(MessageRoute::Audio(data.clone()));
        } else {
            routes.push(
                OutgoingMessage::InlineData {
                    mime_type: mime_type.to_string(),
                    data: BASE64_STANDARD.encode(data),
                }
                .into(),
            );
        }
    }

    if let Some(call) = &part.function_call {
        routes.push(map_function_call(call));
    }
}

fn map_function_call(call: &FunctionCall) -> MessageRoute {
    OutgoingMessage::FunctionCall {
        name: call.name.clone().unwrap_or_default(),
    }
    .into()
}

fn map_go_away(go_away: &GoAway) -> MessageRoute {
    OutgoingMessage::GoAway {
        time_left: go_away
            .time_left
            .map(format_iso_duration)
            .unwrap_or_default(),
    }
    .into()
}

/// Zero counts are proto3 defaults and are treated as absent.
fn map_usage(usage: &UsageMetadata) -> MessageRoute {
    let non_zero = |count: Option<u32>| count.filter(|&n| n != 0);
    OutgoingMessage::Usage {
        prompt_token_count: non_zero(usage.prompt_token_count),
        response_token_count: non_zero(usage.response_token_count),
        total_token_count: non_zero(usage.total_token_count),
    }
    .into()
}

/// Format a duration as ISO 8601 the way `java.time.Duration` prints it,
/// e.g. `PT30S`, `PT1M30S`, `PT1H`, `PT0.5S`.
pub fn format_iso_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let nanos = duration.subsec_nanos();
    if total == 0 && nanos == 0 {
        return "PT0S".to_string();
    }

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{hours}H"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}M"));
    }
    if seconds == 0 && nanos == 0 {
        return out;
    }

    out.push_str(&seconds.to_string());
    if nanos > 0 {
        let fraction = format!("{nanos:09}");
        out.push('.');
        out.push_str(fraction.trim_end_matches('0'));
    }
    out.push('S');
    out
}
