use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{read_json, send};
use crate::collaborators::{service, CollaboratorError, VideoStitcher};

/// Slideshow service that reads the job's workspace and renders the video.
pub struct StitcherClient {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct SlideshowRequest<'a> {
    video_id: &'a str,
    music: &'a str,
}

#[derive(Deserialize)]
struct SlideshowResponse {
    #[serde(default)]
    output_file: String,
}

impl StitcherClient {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl VideoStitcher for StitcherClient {
    async fn stitch(
        &self,
        job_id: &str,
        background_music: &str,
    ) -> Result<String, CollaboratorError> {
        let request = self.client.post(&self.url).json(&SlideshowRequest {
            video_id: job_id,
            music: background_music,
        });
        let response: SlideshowResponse =
            read_json(service::STITCHER, send(service::STITCHER, request).await?).await?;

        if response.output_file.is_empty() {
            return Err(CollaboratorError::invalid(
                service::STITCHER,
                "response has no output_file",
            ));
        }
        tracing::info!(job_id, output = %response.output_file, "Video stitched");
        Ok(response.output_file)
    }
}
