use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{read_json, send};
use crate::collaborators::{service, CollaboratorError, ImageGenerator};
use crate::config::ImageServiceConfig;
use crate::job::VisualStyle;

/// Text-to-image diffusion endpoint returning base64 images.
pub struct DiffusionClient {
    client: Client,
    url: String,
    api_key: SecretString,
    model: String,
    width: u32,
    height: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DiffusionRequest<'a> {
    model_name: &'a str,
    prompt: &'a str,
    negative_prompt: &'a str,
    image_height: u32,
    image_width: u32,
    num_output_images: u32,
    guidance_scale: f32,
    num_inference_steps: u32,
    output_img_type: &'a str,
}

#[derive(Deserialize)]
struct DiffusionResponse {
    #[serde(default)]
    data: Vec<DiffusionImage>,
}

#[derive(Deserialize)]
struct DiffusionImage {
    b64_json: String,
}

/// Things each style should steer away from.
fn negative_prompt(style: VisualStyle) -> &'static str {
    match style {
        VisualStyle::Default => "cartoon, illustration, anime, text, watermark, logo, blurry",
        VisualStyle::Anime | VisualStyle::Cartoon => "photo, photorealistic, text, watermark, logo",
        VisualStyle::Watercolor => "photo, 3d render, sharp digital lines, text, watermark, logo",
    }
}

impl DiffusionClient {
    pub fn new(client: Client, config: &ImageServiceConfig, api_key: SecretString) -> Self {
        Self {
            client,
            url: config.url.clone(),
            api_key,
            model: config.model.clone(),
            width: config.width,
            height: config.height,
        }
    }
}

#[async_trait]
impl ImageGenerator for DiffusionClient {
    async fn render(&self, prompt: &str, style: VisualStyle) -> Result<Vec<u8>, CollaboratorError> {
        let body = DiffusionRequest {
            model_name: &self.model,
            prompt,
            negative_prompt: negative_prompt(style),
            image_height: self.height,
            image_width: self.width,
            num_output_images: 1,
            guidance_scale: 10.0,
            num_inference_steps: 50,
            output_img_type: "pil",
        };
        let request = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body);

        let response: DiffusionResponse =
            read_json(service::IMAGES, send(service::IMAGES, request).await?).await?;
        decode_first_image(response)
    }
}

fn decode_first_image(response: DiffusionResponse) -> Result<Vec<u8>, CollaboratorError> {
    let image = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| CollaboratorError::invalid(service::IMAGES, "no image data received"))?;

    STANDARD
        .decode(image.b64_json.trim())
        .map_err(|e| CollaboratorError::invalid(service::IMAGES, format!("bad base64: {}", e)))
}
