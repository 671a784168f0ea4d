use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use super::{read_json, send};
use crate::collaborators::{service, CollaboratorError, TranscriptAligner};
use crate::job::Segment;

/// Forced-alignment service: uploads the narration with its script and
/// receives sentence timings.
pub struct AlignerClient {
    client: Client,
    url: String,
}

#[derive(Deserialize)]
struct AlignmentResponse {
    #[serde(default)]
    sentences: Vec<Segment>,
}

impl AlignerClient {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl TranscriptAligner for AlignerClient {
    async fn align(&self, audio: &[u8], script: &str) -> Result<Vec<Segment>, CollaboratorError> {
        let audio_part = Part::bytes(audio.to_vec())
            .file_name("full_audio.mp3")
            .mime_str("audio/mpeg")
            .map_err(|e| CollaboratorError::Request {
                service: service::ALIGNER,
                source: e,
            })?;
        let form = Form::new()
            .part("audio", audio_part)
            .text("original_script", script.to_string());

        let request = self.client.post(&self.url).multipart(form);
        let response: AlignmentResponse =
            read_json(service::ALIGNER, send(service::ALIGNER, request).await?).await?;

        validate_segments(&response.sentences)?;
        Ok(response.sentences)
    }
}

fn validate_segments(segments: &[Segment]) -> Result<(), CollaboratorError> {
    if segments.is_empty() {
        return Err(CollaboratorError::invalid(
            service::ALIGNER,
            "alignment returned no sentences",
        ));
    }
    if let Some((i, seg)) = segments
        .iter()
        .enumerate()
        .find(|(_, s)| !(s.start.is_finite() && s.end.is_finite()) || s.end < s.start)
    {
        return Err(CollaboratorError::invalid(
            service::ALIGNER,
            format!(
                "sentence {} has invalid timing {}..{}",
                i + 1,
                seg.start,
                seg.end
            ),
        ));
    }
    Ok(())
}
