//! Transcript projection
//!
//! Turns incremental transcription fragments into discrete speaker turns for
//! the presentation layer. Each speaker has an accumulation buffer; the turn
//! being built is rewritten from its buffer on every fragment, and an explicit
//! turn-complete clears both buffers so the next fragment opens a new turn.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::live::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Speaker {
    User,
    Agent,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptTurn {
    pub id: Uuid,
    pub speaker: Speaker,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    pub started_at: DateTime<Utc>,
}

impl TranscriptTurn {
    fn new(speaker: Speaker) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker,
            text: String::new(),
            sources: Vec::new(),
            started_at: Utc::now(),
        }
    }
}

fn greeting_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\b(hi|hello|hey)\b").expect("greeting pattern is valid"))
}

/// One-shot greeting detector, re-armed at each turn boundary
#[derive(Debug, Default)]
pub struct WaveTrigger {
    fired: bool,
}

impl WaveTrigger {
    /// True the first time `text` contains a greeting since the last re-arm
    pub fn check(&mut self, text: &str) -> bool {
        if self.fired || !greeting_pattern().is_match(text) {
            return false;
        }
        self.fired = true;
        true
    }

    pub fn rearm(&mut self) {
        self.fired = false;
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

/// Outcome of an output transcription fragment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputUpdate {
    /// The fragment opened a new agent turn
    pub turn_started: bool,
    /// The fragment contained the access phrase
    pub access_granted: bool,
}

#[derive(Debug, Default)]
pub struct TranscriptProjection {
    turns: Vec<TranscriptTurn>,
    input_buffer: String,
    output_buffer: String,
    current_user: Option<usize>,
    current_agent: Option<usize>,
    wave: WaveTrigger,
    authenticated: bool,
}

impl TranscriptProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append user speech; returns true when it fires the wave cue
    pub fn push_input(&mut self, fragment: &str) -> bool {
        if fragment.is_empty() {
            return false;
        }

        let index = self.open_turn(Speaker::User);
        self.input_buffer.push_str(fragment);
        self.turns[index].text.clone_from(&self.input_buffer);

        let waved = self.wave.check(&self.input_buffer);
        if waved {
            debug!("Greeting detected in user turn");
        }
        waved
    }

    /// Append agent speech
    pub fn push_output(&mut self, fragment: &str) -> OutputUpdate {
        if fragment.is_empty() {
            return OutputUpdate::default();
        }

        let turn_started = self.output_buffer.is_empty();
        let index = self.open_turn(Speaker::Agent);
        self.output_buffer.push_str(fragment);
        self.turns[index].text.clone_from(&self.output_buffer);

        // Matched against the fragment alone, not the accumulated turn
        let access_granted = fragment.to_lowercase().contains("access granted");
        if access_granted && !self.authenticated {
            info!("Access granted phrase detected");
            self.authenticated = true;
        }

        OutputUpdate {
            turn_started,
            access_granted,
        }
    }

    /// Merge citations into the latest turn if it is an agent turn
    ///
    /// Returns true when at least one new source was added.
    pub fn merge_sources(&mut self, sources: Vec<Source>) -> bool {
        let Some(last) = self.turns.last_mut() else {
            return false;
        };
        if last.speaker != Speaker::Agent {
            debug!("Dropping {} sources: latest turn is not the agent's", sources.len());
            return false;
        }

        let mut added = false;
        for source in sources {
            if !last.sources.iter().any(|s| s.uri == source.uri) {
                last.sources.push(source);
                added = true;
            }
        }
        added
    }

    /// Close both speakers' turns and re-arm the wave trigger
    pub fn complete_turn(&mut self) {
        self.input_buffer.clear();
        self.output_buffer.clear();
        self.current_user = None;
        self.current_agent = None;
        self.wave.rearm();
    }

    /// Forget everything, including the access flag
    pub fn reset(&mut self) {
        self.turns.clear();
        self.complete_turn();
        self.authenticated = false;
    }

    pub fn turns(&self) -> &[TranscriptTurn] {
        &self.turns
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn open_turn(&mut self, speaker: Speaker) -> usize {
        let (buffer, current) = match speaker {
            Speaker::User => (&self.input_buffer, &mut self.current_user),
            Speaker::Agent => (&self.output_buffer, &mut self.current_agent),
        };

        match *current {
            Some(index) if !buffer.is_empty() => index,
            _ => {
                self.turns.push(TranscriptTurn::new(speaker));
                let index = self.turns.len() - 1;
                *current = Some(index);
                index
            }
        }
    }
}
