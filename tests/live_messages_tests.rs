use aura_voice::audio::{AudioBlock, WireAudioChunk};
use aura_voice::instruction::system_instruction;
use aura_voice::live::messages::RealtimeInputMessage;
use aura_voice::live::{ServerMessage, SetupMessage, DEFAULT_MODEL};

#[test]
fn test_setup_message_serialization() {
    let msg = SetupMessage::new(DEFAULT_MODEL, system_instruction("swordfish"));

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"model\":\"gemini-2.5-flash-native-audio-preview-09-2025\""));
    assert!(json.contains("\"responseModalities\":[\"AUDIO\"]"));
    assert!(json.contains("\"inputAudioTranscription\":{}"));
    assert!(json.contains("\"outputAudioTranscription\":{}"));
    assert!(json.contains("\"tools\":[{\"googleSearch\":{}}]"));
    assert!(json.contains("swordfish"));
}

#[test]
fn test_realtime_input_from_capture_block() {
    let block = AudioBlock {
        samples: vec![0.0; 4096],
        sample_rate: 16000,
        sequence: 7,
    };
    let msg = RealtimeInputMessage::audio(WireAudioChunk::from_block(&block));

    let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["realtimeInput"]["audio"]["mimeType"], "audio/pcm;rate=16000");
    // 4096 samples * 2 bytes, base64 expands 3 → 4
    assert_eq!(json["realtimeInput"]["audio"]["data"].as_str().unwrap().len(), 10924);
}

#[test]
fn test_server_content_deserialization() {
    let json = r#"{
        "serverContent": {
            "modelTurn": { "parts": [
                { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AAAA" } },
                { "text": "ignored" }
            ] },
            "inputTranscription": { "text": "hello" },
            "outputTranscription": { "text": "Hi there" },
            "turnComplete": true
        }
    }"#;

    let msg = ServerMessage::parse(json).unwrap();
    assert!(!msg.is_setup_complete());
    assert_eq!(msg.audio_chunks().len(), 1);
    assert_eq!(msg.audio_chunks()[0].mime_type, "audio/pcm;rate=24000");
    assert_eq!(msg.input_text(), Some("hello"));
    assert_eq!(msg.output_text(), Some("Hi there"));
    assert!(msg.turn_complete());
    assert!(!msg.interrupted());
}

#[test]
fn test_unknown_fields_are_ignored() {
    let json = r#"{
        "serverContent": { "interrupted": true, "generationComplete": true },
        "usageMetadata": { "totalTokenCount": 12 }
    }"#;

    let msg = ServerMessage::parse(json).unwrap();
    assert!(msg.interrupted());
    assert!(msg.audio_chunks().is_empty());
    assert_eq!(msg.input_text(), None);
}

#[test]
fn test_empty_inline_data_is_skipped() {
    let json = r#"{"serverContent":{"modelTurn":{"parts":[{"inlineData":{"mimeType":"audio/pcm","data":""}}]}}}"#;

    let msg = ServerMessage::parse(json).unwrap();
    assert!(msg.audio_chunks().is_empty());
}

#[test]
fn test_inline_data_without_mime_type() {
    let json = r#"{"serverContent":{"modelTurn":{"parts":[{"inlineData":{"data":"AAAA"}}]}}}"#;

    let msg = ServerMessage::parse(json).unwrap();
    assert_eq!(msg.audio_chunks()[0].mime_type, "");
}
