//! Deterministic in-process collaborators for dry runs.
//!
//! Outputs are derived from the inputs only, so repeated runs of the same
//! job produce the same artifacts.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    CollaboratorError, Collaborators, ImageGenerator, ImagePromptGenerator, PromptContext,
    ScriptDraft, ScriptGenerator, SpeechSynthesizer, StockFootageMatcher, TranscriptAligner,
    VideoStitcher,
};
use crate::job::{Narrator, Segment, StockClip, VisualStyle};

/// Length assigned to every stub sentence.
pub const SENTENCE_MS: f64 = 1_500.0;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

pub fn collaborators() -> Collaborators {
    let stub = Arc::new(StubServices);
    Collaborators {
        script: stub.clone(),
        speech: stub.clone(),
        aligner: stub.clone(),
        stock: stub.clone(),
        prompts: stub.clone(),
        images: stub.clone(),
        stitcher: stub,
    }
}

/// Implements every collaborator trait.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubServices;

#[async_trait]
impl ScriptGenerator for StubServices {
    async fn write(&self, topic: &str, description: &str) -> Result<ScriptDraft, CollaboratorError> {
        let topic = topic.trim();
        let essence = topic
            .split_whitespace()
            .last()
            .unwrap_or("abstract")
            .to_lowercase();
        let mut script = format!("Let's talk about {}.", topic);
        if !description.trim().is_empty() {
            script.push_str(&format!(" {}.", description.trim().trim_end_matches('.')));
        }
        script.push_str(" Thanks for watching.");

        Ok(ScriptDraft {
            cleaned_topic: topic.to_string(),
            script,
            essence,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for StubServices {
    async fn synthesize(
        &self,
        script: &str,
        narrator: Narrator,
    ) -> Result<Vec<u8>, CollaboratorError> {
        let mut audio = b"ID3".to_vec();
        audio.extend_from_slice(narrator.as_str().as_bytes());
        audio.push(0);
        audio.extend_from_slice(script.as_bytes());
        Ok(audio)
    }
}

#[async_trait]
impl TranscriptAligner for StubServices {
    async fn align(&self, _audio: &[u8], script: &str) -> Result<Vec<Segment>, CollaboratorError> {
        Ok(split_sentences(script)
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let start = i as f64 * SENTENCE_MS;
                Segment::new(start, start + SENTENCE_MS, format!(" {}", text))
            })
            .collect())
    }
}

#[async_trait]
impl StockFootageMatcher for StubServices {
    async fn find_clips(
        &self,
        essence: &str,
        segment_count: usize,
    ) -> Result<Vec<StockClip>, CollaboratorError> {
        Ok((1..=segment_count.max(1))
            .map(|n| StockClip {
                id: format!("{}-{}", essence, n),
                url: format!("stub://stock/{}/{}.mp4", essence, n),
                duration_secs: SENTENCE_MS / 1000.0,
            })
            .collect())
    }
}

#[async_trait]
impl ImagePromptGenerator for StubServices {
    async fn prompt_for(
        &self,
        segment_text: &str,
        context: &PromptContext,
        _closing_text: &str,
    ) -> Result<String, CollaboratorError> {
        Ok(format!(
            "{} illustration of {} ({}, {})",
            context.style, segment_text, context.topic, context.essence
        ))
    }
}

#[async_trait]
impl ImageGenerator for StubServices {
    async fn render(&self, prompt: &str, _style: VisualStyle) -> Result<Vec<u8>, CollaboratorError> {
        let mut image = PNG_SIGNATURE.to_vec();
        image.extend_from_slice(prompt.as_bytes());
        Ok(image)
    }
}

#[async_trait]
impl VideoStitcher for StubServices {
    async fn stitch(
        &self,
        job_id: &str,
        background_music: &str,
    ) -> Result<String, CollaboratorError> {
        Ok(format!("stub://videos/{}.mp4?music={}", job_id, background_music))
    }
}

/// Splits on sentence punctuation, dropping empty pieces.
fn split_sentences(script: &str) -> Vec<String> {
    script
        .split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .map(str::to_string)
        .collect()
}
