//! Gemini Live WebSocket message types.
//!
//! This module defines the client frames sent to `BidiGenerateContent` and
//! the lenient decoder for server frames.
//!
//! # Protocol Overview
//!
//! Client frames (one top-level key each):
//! - `setup` - Model, generation and realtime input configuration (first frame)
//! - `realtimeInput` - Base64 PCM audio chunk or `audioStreamEnd`
//! - `clientContent` - Content turns with a `turnComplete` flag
//!
//! Server frames (any combination of keys):
//! - `setupComplete` - Setup acknowledged
//! - `serverContent` - Transcriptions, model turn parts, turn/interrupt flags
//! - `toolCall` - Function calls requested by the model
//! - `goAway` - Server is about to disconnect
//! - `usageMetadata` - Token accounting

use base64::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::config::parse_proto_duration;
use crate::core::live::base::{
    ActivityHandling, Blob, Content, EndSensitivity, FieldError, FunctionCall, GoAway,
    INPUT_AUDIO_MIME, LiveConnectConfig, LiveError, LiveResult, LiveServerMessage, Modality, Part,
    ServerContent, StartSensitivity, ToolCall, Transcription, TurnCoverage, UsageMetadata,
};

// =============================================================================
// Client Frames
// =============================================================================

/// A frame sent to the server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(SetupMessage),
    RealtimeInput(RealtimeInputMessage),
    ClientContent(ClientContentMessage),
}

impl ClientMessage {
    /// Build the setup frame from the connect configuration.
    pub fn setup(model: &str, config: &LiveConnectConfig) -> Self {
        Self::Setup(SetupMessage::from_config(model, config))
    }

    /// Create an audio chunk frame from raw PCM bytes.
    pub fn audio(data: &[u8]) -> Self {
        Self::RealtimeInput(RealtimeInputMessage {
            audio: Some(OutgoingBlob {
                mime_type: INPUT_AUDIO_MIME.to_string(),
                data: BASE64_STANDARD.encode(data),
            }),
            audio_stream_end: None,
        })
    }

    /// Signal the end of the caller's audio stream.
    pub fn audio_stream_end() -> Self {
        Self::RealtimeInput(RealtimeInputMessage {
            audio: None,
            audio_stream_end: Some(true),
        })
    }

    /// Create a content frame.
    pub fn client_content(turns: &[Content], turn_complete: bool) -> Self {
        Self::ClientContent(ClientContentMessage {
            turns: turns.iter().map(OutgoingContent::from).collect(),
            turn_complete,
        })
    }
}

/// Session setup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupMessage {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub realtime_input_config: RealtimeInputConfigMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<AudioTranscriptionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<AudioTranscriptionConfig>,
}

impl SetupMessage {
    fn from_config(model: &str, config: &LiveConnectConfig) -> Self {
        let vad = &config.realtime_input.automatic_activity_detection;
        Self {
            model: model.to_string(),
            generation_config: GenerationConfig {
                response_modalities: config.response_modalities.clone(),
                speech_config: config.voice_name.as_ref().map(|voice| SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice.clone(),
                        },
                    },
                }),
                thinking_config: config
                    .thinking_budget
                    .map(|thinking_budget| ThinkingConfig { thinking_budget }),
            },
            realtime_input_config: RealtimeInputConfigMessage {
                automatic_activity_detection: AutomaticActivityDetectionMessage {
                    disabled: vad.disabled,
                    start_of_speech_sensitivity: vad.start_of_speech_sensitivity,
                    end_of_speech_sensitivity: vad.end_of_speech_sensitivity,
                    prefix_padding_ms: vad.prefix_padding_ms,
                    silence_duration_ms: vad.silence_duration_ms,
                },
                activity_handling: config.realtime_input.activity_handling,
                turn_coverage: config.realtime_input.turn_coverage,
            },
            input_audio_transcription: config
                .input_audio_transcription
                .then_some(AudioTranscriptionConfig {}),
            output_audio_transcription: config
                .output_audio_transcription
                .then_some(AudioTranscriptionConfig {}),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<Modality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputConfigMessage {
    pub automatic_activity_detection: AutomaticActivityDetectionMessage,
    pub activity_handling: ActivityHandling,
    pub turn_coverage: TurnCoverage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomaticActivityDetectionMessage {
    pub disabled: bool,
    pub start_of_speech_sensitivity: StartSensitivity,
    pub end_of_speech_sensitivity: EndSensitivity,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

/// Enables transcription; serialized as `{}`.
#[derive(Debug, Clone, Serialize)]
pub struct AudioTranscriptionConfig {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<OutgoingBlob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream_end: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingBlob {
    pub mime_type: String,
    /// Base64 payload
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContentMessage {
    pub turns: Vec<OutgoingContent>,
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingContent {
    pub role: String,
    pub parts: Vec<OutgoingPart>,
}

impl From<&Content> for OutgoingContent {
    fn from(content: &Content) -> Self {
        Self {
            role: content.role.clone(),
            parts: content
                .parts
                .iter()
                .map(|part| OutgoingPart {
                    text: part.text.clone(),
                    inline_data: part.inline_data.as_ref().and_then(|blob| {
                        Some(OutgoingBlob {
                            mime_type: blob.mime_type.clone().unwrap_or_default(),
                            data: BASE64_STANDARD.encode(blob.data.as_ref()?),
                        })
                    }),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<OutgoingBlob>,
}

// =============================================================================
// Server Frames
// =============================================================================

#[derive(Debug, Deserialize)]
struct ServerTranscription {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerBlob {
    mime_type: Option<String>,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerFunctionCall {
    id: Option<String>,
    name: Option<String>,
    args: Option<Value>,
}

impl From<ServerFunctionCall> for FunctionCall {
    fn from(call: ServerFunctionCall) -> Self {
        Self {
            id: call.id,
            name: call.name,
            args: call.args,
        }
    }
}

/// Decode one server frame.
///
/// Only a frame that is not a JSON object is an error. Every known top-level
/// key is decoded on its own; a substructure that fails to decode is recorded
/// in `field_errors` and its siblings are still returned.
pub fn decode_server_message(raw: &str) -> LiveResult<LiveServerMessage> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| LiveError::ProtocolError(format!("invalid server frame: {e}")))?;
    let Value::Object(root) = value else {
        return Err(LiveError::ProtocolError(
            "server frame is not a JSON object".to_string(),
        ));
    };

    let mut errors = Vec::new();
    let mut message = LiveServerMessage {
        setup_complete: root.contains_key("setupComplete"),
        ..Default::default()
    };

    if let Some(value) = present(&root, "serverContent") {
        message.server_content = decode_server_content(value, &mut errors);
    }
    if let Some(value) = present(&root, "toolCall") {
        message.tool_call = decode_tool_call(value, &mut errors);
    }
    if let Some(value) = present(&root, "goAway") {
        message.go_away = decode_go_away(value, &mut errors);
    }
    if let Some(value) = present(&root, "usageMetadata") {
        message.usage_metadata = decode_usage(value, &mut errors);
    }

    message.field_errors = errors;
    Ok(message)
}

/// Field lookup treating JSON `null` as absent.
fn present<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|value| !value.is_null())
}

fn decode_field<T: DeserializeOwned>(
    value: &Value,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    match T::deserialize(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            errors.push(FieldError {
                field: field.to_string(),
                message: e.to_string(),
            });
            None
        }
    }
}

fn as_object<'a>(
    value: &'a Value,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> Option<&'a Map<String, Value>> {
    let object = value.as_object();
    if object.is_none() {
        errors.push(FieldError {
            field: field.to_string(),
            message: "expected an object".to_string(),
        });
    }
    object
}

fn as_array<'a>(
    value: &'a Value,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> Option<&'a Vec<Value>> {
    let array = value.as_array();
    if array.is_none() {
        errors.push(FieldError {
            field: field.to_string(),
            message: "expected an array".to_string(),
        });
    }
    array
}

fn decode_server_content(value: &Value, errors: &mut Vec<FieldError>) -> Option<ServerContent> {
    let object = as_object(value, "serverContent", errors)?;
    let mut content = ServerContent::default();

    if let Some(value) = present(object, "inputTranscription") {
        content.input_transcription = decode_field::<ServerTranscription>(
            value,
            "serverContent.inputTranscription",
            errors,
        )
        .map(|t| Transcription { text: t.text });
    }
    if let Some(value) = present(object, "outputTranscription") {
        content.output_transcription = decode_field::<ServerTranscription>(
            value,
            "serverContent.outputTranscription",
            errors,
        )
        .map(|t| Transcription { text: t.text });
    }
    if let Some(value) = present(object, "modelTurn") {
        content.model_turn = decode_model_turn(value, errors);
    }
    if let Some(value) = present(object, "turnComplete") {
        content.turn_complete = decode_field(value, "serverContent.turnComplete", errors);
    }
    if let Some(value) = present(object, "interrupted") {
        content.interrupted = decode_field(value, "serverContent.interrupted", errors);
    }

    Some(content)
}

fn decode_model_turn(value: &Value, errors: &mut Vec<FieldError>) -> Option<Vec<Part>> {
    let object = as_object(value, "serverContent.modelTurn", errors)?;
    let Some(parts) = present(object, "parts") else {
        return Some(Vec::new());
    };
    let parts = as_array(parts, "serverContent.modelTurn.parts", errors)?;

    let mut decoded = Vec::with_capacity(parts.len());
    for (index, raw) in parts.iter().enumerate() {
        let field = format!("serverContent.modelTurn.parts[{index}]");
        let Some(part) = as_object(raw, &field, errors) else {
            continue;
        };

        let text = present(part, "text")
            .and_then(|value| decode_field::<String>(value, &format!("{field}.text"), errors));
        let inline_data = present(part, "inlineData")
            .and_then(|value| decode_inline_data(value, &field, errors));
        let function_call = present(part, "functionCall").and_then(|value| {
            decode_field::<ServerFunctionCall>(value, &format!("{field}.functionCall"), errors)
                .map(FunctionCall::from)
        });

        decoded.push(Part {
            text,
            inline_data,
            function_call,
        });
    }
    Some(decoded)
}

fn decode_inline_data(value: &Value, part: &str, errors: &mut Vec<FieldError>) -> Option<Blob> {
    let blob = decode_field::<ServerBlob>(value, &format!("{part}.inlineData"), errors)?;
    let data = match blob.data {
        Some(encoded) => match BASE64_STANDARD.decode(encoded.as_bytes()) {
            Ok(bytes) => Some(bytes.into()),
            Err(e) => {
                errors.push(FieldError {
                    field: format!("{part}.inlineData.data"),
                    message: format!("invalid base64: {e}"),
                });
                return None;
            }
        },
        None => None,
    };
    Some(Blob {
        mime_type: blob.mime_type,
        data,
    })
}

fn decode_tool_call(value: &Value, errors: &mut Vec<FieldError>) -> Option<ToolCall> {
    let object = as_object(value, "toolCall", errors)?;
    let Some(calls) = present(object, "functionCalls") else {
        return Some(ToolCall::default());
    };
    let calls = as_array(calls, "toolCall.functionCalls", errors)?;

    let function_calls = calls
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| {
            decode_field::<ServerFunctionCall>(
                raw,
                &format!("toolCall.functionCalls[{index}]"),
                errors,
            )
            .map(FunctionCall::from)
        })
        .collect();
    Some(ToolCall { function_calls })
}

fn decode_go_away(value: &Value, errors: &mut Vec<FieldError>) -> Option<GoAway> {
    let object = as_object(value, "goAway", errors)?;
    let time_left = present(object, "timeLeft").and_then(|raw| {
        let parsed = raw.as_str().and_then(parse_proto_duration);
        if parsed.is_none() {
            errors.push(FieldError {
                field: "goAway.timeLeft".to_string(),
                message: format!("invalid duration: {raw}"),
            });
        }
        parsed
    });
    Some(GoAway { time_left })
}

fn decode_usage(value: &Value, errors: &mut Vec<FieldError>) -> Option<UsageMetadata> {
    let object = as_object(value, "usageMetadata", errors)?;
    let mut count = |key: &str| {
        present(object, key)
            .and_then(|raw| decode_field::<u32>(raw, &format!("usageMetadata.{key}"), errors))
    };
    Some(UsageMetadata {
        prompt_token_count: count("promptTokenCount"),
        response_token_count: count("responseTokenCount"),
        total_token_count: count("totalTokenCount"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_setup_serialization() {
        let message = ClientMessage::setup("models/test", &LiveConnectConfig::default());
        let json: Value = serde_json::to_value(&message).unwrap();
        let setup = &json["setup"];

        assert_eq!(setup["model"], "models/test");
        assert_eq!(
            setup["generationConfig"]["responseModalities"],
            serde_json::json!(["AUDIO"])
        );
        assert_eq!(
            setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Puck"
        );
        assert_eq!(
            setup["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            0
        );

        let vad = &setup["realtimeInputConfig"]["automaticActivityDetection"];
        assert_eq!(vad["disabled"], false);
        assert_eq!(vad["startOfSpeechSensitivity"], "START_SENSITIVITY_HIGH");
        assert_eq!(vad["endOfSpeechSensitivity"], "END_SENSITIVITY_LOW");
        assert_eq!(vad["prefixPaddingMs"], 100);
        assert_eq!(vad["silenceDurationMs"], 500);
        assert_eq!(
            setup["realtimeInputConfig"]["activityHandling"],
            "START_OF_ACTIVITY_INTERRUPTS"
        );
        assert_eq!(
            setup["realtimeInputConfig"]["turnCoverage"],
            "TURN_INCLUDES_ONLY_ACTIVITY"
        );
        assert_eq!(setup["inputAudioTranscription"], serde_json::json!({}));
        assert_eq!(setup["outputAudioTranscription"], serde_json::json!({}));
    }

    #[test]
    fn test_setup_without_transcription() {
        let config = LiveConnectConfig {
            input_audio_transcription: false,
            output_audio_transcription: false,
            voice_name: None,
            ..Default::default()
        };
        let json = serde_json::to_value(ClientMessage::setup("m", &config)).unwrap();
        assert!(json["setup"].get("inputAudioTranscription").is_none());
        assert!(json["setup"].get("outputAudioTranscription").is_none());
        assert!(json["setup"]["generationConfig"].get("speechConfig").is_none());
    }

    #[test]
    fn test_audio_frame() {
        let data = vec![0u8, 1, 2, 3];
        let json = serde_json::to_value(ClientMessage::audio(&data)).unwrap();
        let audio = &json["realtimeInput"]["audio"];
        assert_eq!(audio["mimeType"], "audio/pcm;rate=16000");
        let decoded = BASE64_STANDARD
            .decode(audio["data"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, data);
        assert!(json["realtimeInput"].get("audioStreamEnd").is_none());
    }

    #[test]
    fn test_audio_stream_end_frame() {
        let json = serde_json::to_string(&ClientMessage::audio_stream_end()).unwrap();
        assert_eq!(json, r#"{"realtimeInput":{"audioStreamEnd":true}}"#);
    }

    #[test]
    fn test_client_content_frame() {
        let turns = vec![Content::user_text("hello")];
        let json = serde_json::to_string(&ClientMessage::client_content(&turns, false)).unwrap();
        assert_eq!(
            json,
            r#"{"clientContent":{"turns":[{"role":"user","parts":[{"text":"hello"}]}],"turnComplete":false}}"#
        );
    }

    #[test]
    fn test_decode_setup_complete() {
        let message = decode_server_message(r#"{"setupComplete":{}}"#).unwrap();
        assert!(message.setup_complete);
        assert!(message.server_content.is_none());
        assert!(message.field_errors.is_empty());
    }

    #[test]
    fn test_decode_server_content() {
        let raw = r#"{
            "serverContent": {
                "inputTranscription": {"text": "hi"},
                "outputTranscription": {"text": "hello"},
                "modelTurn": {"parts": [
                    {"text": "a"},
                    {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAEC"}},
                    {"functionCall": {"name": "lookup", "args": {"q": 1}}}
                ]},
                "turnComplete": true,
                "interrupted": false
            }
        }"#;
        let message = decode_server_message(raw).unwrap();
        let content = message.server_content.unwrap();

        assert_eq!(content.input_transcription.unwrap().text.as_deref(), Some("hi"));
        assert_eq!(
            content.output_transcription.unwrap().text.as_deref(),
            Some("hello")
        );
        assert_eq!(content.turn_complete, Some(true));
        assert_eq!(content.interrupted, Some(false));

        let parts = content.model_turn.unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].text.as_deref(), Some("a"));
        let blob = parts[1].inline_data.as_ref().unwrap();
        assert_eq!(blob.mime_type.as_deref(), Some("audio/pcm;rate=24000"));
        assert_eq!(blob.data.as_deref(), Some(&[0u8, 1, 2][..]));
        assert_eq!(
            parts[2].function_call.as_ref().unwrap().name.as_deref(),
            Some("lookup")
        );
        assert!(message.field_errors.is_empty());
    }

    #[test]
    fn test_decode_malformed_field_keeps_siblings() {
        let raw = r#"{
            "serverContent": {
                "inputTranscription": "not an object",
                "modelTurn": {"parts": [
                    {"text": 42},
                    {"text": "kept"},
                    {"inlineData": {"mimeType": "image/png", "data": "!!!"}}
                ]},
                "turnComplete": true
            },
            "usageMetadata": {"promptTokenCount": "x", "totalTokenCount": 7}
        }"#;
        let message = decode_server_message(raw).unwrap();
        let content = message.server_content.unwrap();

        assert!(content.input_transcription.is_none());
        assert_eq!(content.turn_complete, Some(true));
        let parts = content.model_turn.unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], Part::default());
        assert_eq!(parts[1].text.as_deref(), Some("kept"));
        assert!(parts[2].inline_data.is_none());

        let usage = message.usage_metadata.unwrap();
        assert_eq!(usage.prompt_token_count, None);
        assert_eq!(usage.total_token_count, Some(7));

        let fields: Vec<&str> = message
            .field_errors
            .iter()
            .map(|e| e.field.as_str())
            .collect();
        assert_eq!(
            fields,
            vec![
                "serverContent.inputTranscription",
                "serverContent.modelTurn.parts[0].text",
                "serverContent.modelTurn.parts[2].inlineData.data",
                "usageMetadata.promptTokenCount",
            ]
        );
    }

    #[test]
    fn test_decode_part_fields_independently() {
        let raw = r#"{"serverContent": {"modelTurn": {"parts": [
            {"text": "keep me", "functionCall": {"name": 5}},
            {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAEC"}, "text": 7},
            "not a part"
        ]}}}"#;
        let message = decode_server_message(raw).unwrap();
        let parts = message.server_content.unwrap().model_turn.unwrap();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].text.as_deref(), Some("keep me"));
        assert!(parts[0].function_call.is_none());
        let blob = parts[1].inline_data.as_ref().unwrap();
        assert_eq!(blob.mime_type.as_deref(), Some("audio/pcm;rate=24000"));
        assert_eq!(blob.data.as_deref(), Some(&[0u8, 1, 2][..]));
        assert!(parts[1].text.is_none());

        let fields: Vec<&str> = message
            .field_errors
            .iter()
            .map(|e| e.field.as_str())
            .collect();
        assert_eq!(
            fields,
            vec![
                "serverContent.modelTurn.parts[0].functionCall",
                "serverContent.modelTurn.parts[1].text",
                "serverContent.modelTurn.parts[2]",
            ]
        );
    }

    #[test]
    fn test_decode_tool_call_and_go_away() {
        let raw = r#"{
            "toolCall": {"functionCalls": [{"id": "1", "name": "a"}, {"name": "b"}]},
            "goAway": {"timeLeft": "30s"}
        }"#;
        let message = decode_server_message(raw).unwrap();
        let calls = message.tool_call.unwrap().function_calls;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id.as_deref(), Some("1"));
        assert_eq!(calls[1].name.as_deref(), Some("b"));
        assert_eq!(
            message.go_away.unwrap().time_left,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_decode_go_away_without_time() {
        let message = decode_server_message(r#"{"goAway":{}}"#).unwrap();
        assert_eq!(message.go_away, Some(GoAway { time_left: None }));

        let message = decode_server_message(r#"{"goAway":{"timeLeft":"soon"}}"#).unwrap();
        assert_eq!(message.go_away, Some(GoAway { time_left: None }));
        assert_eq!(message.field_errors.len(), 1);
    }

    #[test]
    fn test_decode_ignores_unknown_and_null_keys() {
        let raw = r#"{"sessionResumptionUpdate":{},"serverContent":null}"#;
        let message = decode_server_message(raw).unwrap();
        assert_eq!(message, LiveServerMessage::default());
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(matches!(
            decode_server_message("[1,2]"),
            Err(LiveError::ProtocolError(_))
        ));
        assert!(matches!(
            decode_server_message("not json"),
            Err(LiveError::ProtocolError(_))
        ));
    }
}
