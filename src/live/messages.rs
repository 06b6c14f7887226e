//! Gemini Live wire messages
//!
//! Only the fields the voice session reads are modelled; unknown fields in
//! server messages are ignored by serde.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audio::WireAudioChunk;

/// Default native-audio model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// First frame sent on a new connection
#[derive(Debug, Clone, Serialize)]
pub struct SetupMessage {
    pub setup: Setup,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    pub input_audio_transcription: TranscriptionConfig,
    pub output_audio_transcription: TranscriptionConfig,
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

/// Empty object enabling transcription in one direction
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscriptionConfig {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub google_search: Value,
}

impl SetupMessage {
    /// Audio responses, transcription both ways and web search grounding
    pub fn new(model: impl Into<String>, system_instruction: impl Into<String>) -> Self {
        Self {
            setup: Setup {
                model: model.into(),
                generation_config: GenerationConfig {
                    response_modalities: vec!["AUDIO".to_string()],
                },
                system_instruction: Content {
                    parts: vec![TextPart {
                        text: system_instruction.into(),
                    }],
                },
                input_audio_transcription: TranscriptionConfig::default(),
                output_audio_transcription: TranscriptionConfig::default(),
                tools: vec![Tool {
                    google_search: Value::Object(Default::default()),
                }],
            },
        }
    }
}

/// Microphone audio frame
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputMessage {
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeInput {
    pub audio: WireAudioChunk,
}

impl RealtimeInputMessage {
    pub fn audio(chunk: WireAudioChunk) -> Self {
        Self {
            realtime_input: RealtimeInput { audio: chunk },
        }
    }
}

/// Any message received from the service
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub input_transcription: Option<Transcription>,
    #[serde(default)]
    pub output_transcription: Option<Transcription>,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub inline_data: Option<WireAudioChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebSource {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// A citation as shown next to an agent turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

impl ServerMessage {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Inline audio payloads of the model turn, in part order
    pub fn audio_chunks(&self) -> Vec<&WireAudioChunk> {
        self.server_content
            .as_ref()
            .and_then(|c| c.model_turn.as_ref())
            .map(|turn| {
                turn.parts
                    .iter()
                    .filter_map(|p| p.inline_data.as_ref())
                    .filter(|chunk| !chunk.data.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Web citations with a URI; a missing title falls back to the URI
    pub fn sources(&self) -> Vec<Source> {
        self.server_content
            .as_ref()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|meta| {
                meta.grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref())
                    .filter_map(|web| {
                        let uri = web.uri.as_ref().filter(|u| !u.is_empty())?;
                        let title = web
                            .title
                            .as_ref()
                            .filter(|t| !t.is_empty())
                            .unwrap_or(uri);
                        Some(Source {
                            uri: uri.clone(),
                            title: title.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn input_text(&self) -> Option<&str> {
        self.server_content
            .as_ref()
            .and_then(|c| c.input_transcription.as_ref())
            .map(|t| t.text.as_str())
    }

    pub fn output_text(&self) -> Option<&str> {
        self.server_content
            .as_ref()
            .and_then(|c| c.output_transcription.as_ref())
            .map(|t| t.text.as_str())
    }

    pub fn turn_complete(&self) -> bool {
        self.server_content
            .as_ref()
            .map(|c| c.turn_complete)
            .unwrap_or(false)
    }

    pub fn interrupted(&self) -> bool {
        self.server_content
            .as_ref()
            .map(|c| c.interrupted)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_serializes_camel_case() {
        let json = serde_json::to_value(SetupMessage::new(DEFAULT_MODEL, "Be kind")).unwrap();
        let setup = &json["setup"];

        assert_eq!(setup["model"], DEFAULT_MODEL);
        assert_eq!(setup["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(setup["systemInstruction"]["parts"][0]["text"], "Be kind");
        assert!(setup["inputAudioTranscription"].is_object());
        assert!(setup["outputAudioTranscription"].is_object());
        assert!(setup["tools"][0]["googleSearch"].is_object());
    }

    #[test]
    fn test_realtime_input_shape() {
        let msg = RealtimeInputMessage::audio(WireAudioChunk {
            mime_type: "audio/pcm;rate=16000".to_string(),
            data: "AAAA".to_string(),
        });
        let json = serde_json::to_value(msg).unwrap();
        assert_eq!(json["realtimeInput"]["audio"]["mimeType"], "audio/pcm;rate=16000");
        assert_eq!(json["realtimeInput"]["audio"]["data"], "AAAA");
    }

    #[test]
    fn test_setup_complete_detected() {
        let msg = ServerMessage::parse(r#"{"setupComplete":{}}"#).unwrap();
        assert!(msg.is_setup_complete());
        assert!(msg.server_content.is_none());
    }

    #[test]
    fn test_sources_skip_missing_uri_and_default_title() {
        let msg = ServerMessage::parse(
            r#"{"serverContent":{"groundingMetadata":{"groundingChunks":[
                {"web":{"uri":"https://a.example","title":"A"}},
                {"web":{"title":"no uri"}},
                {"web":{"uri":"https://b.example"}},
                {}
            ]}}}"#,
        )
        .unwrap();

        assert_eq!(
            msg.sources(),
            vec![
                Source {
                    uri: "https://a.example".to_string(),
                    title: "A".to_string()
                },
                Source {
                    uri: "https://b.example".to_string(),
                    title: "https://b.example".to_string()
                },
            ]
        );
    }
}
