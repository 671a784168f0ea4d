//! OpenAI-compatible chat and speech endpoints.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::{read_json, send};
use crate::collaborators::{
    service, CollaboratorError, ImagePromptGenerator, PromptContext, ScriptDraft,
    ScriptGenerator, SpeechSynthesizer,
};
use crate::config::OpenAiConfig;
use crate::job::Narrator;

const SCRIPT_SYSTEM_PROMPT: &str = "You write scripts for short-form social video \
(reels, shorts). Given a topic and description, reply with a JSON object with the keys \
\"cleaned_topic\" (the topic rephrased to be clear and engaging), \"script\" (a 60-80 second \
narration of more than 200 words, no hashtags, links, emojis or camera directions) and \
\"essence\" (one or two words describing the visuals, used to search stock footage).";

const PROMPT_SYSTEM_PROMPT: &str = "You write prompts for an image generation model, one \
prompt per sentence of a narrated video. Reply with a JSON object with the single key \
\"prompt\".";

static RE_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    chat_model: String,
    tts_model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptReply {
    prompt: String,
}

impl OpenAiClient {
    pub fn new(client: Client, config: &OpenAiConfig, api_key: SecretString) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            chat_model: config.chat_model.clone(),
            tts_model: config.tts_model.clone(),
        }
    }

    /// Runs one JSON-mode chat completion and decodes the reply as `T`.
    async fn chat_json<T: DeserializeOwned>(
        &self,
        service: &'static str,
        system: &str,
        user: String,
    ) -> Result<T, CollaboratorError> {
        let body = json!({
            "model": self.chat_model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body);
        let reply: ChatResponse = read_json(service, send(service, request).await?).await?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CollaboratorError::invalid(service, "no choices returned"))?;

        parse_model_json(&content).map_err(|e| {
            tracing::debug!(service, content = %content, "Unparseable model reply");
            CollaboratorError::invalid(service, e)
        })
    }
}

/// Decodes JSON from a model reply. Tolerates surrounding prose or code
/// fences, and raw newlines inside string values.
fn parse_model_json<T: DeserializeOwned>(content: &str) -> Result<T, String> {
    let candidate = RE_OBJECT
        .find(content)
        .map(|m| m.as_str())
        .ok_or_else(|| "reply contains no JSON object".to_string())?;

    serde_json::from_str(candidate).or_else(|first| {
        let flattened = candidate.replace(['\n', '\r'], " ");
        serde_json::from_str(&flattened).map_err(|_| first.to_string())
    })
}

#[async_trait]
impl ScriptGenerator for OpenAiClient {
    async fn write(&self, topic: &str, description: &str) -> Result<ScriptDraft, CollaboratorError> {
        let user = format!(
            "Original topic: {}\nDescription: {}",
            topic.trim(),
            description.trim()
        );
        let draft: ScriptDraft = self
            .chat_json(service::SCRIPT, SCRIPT_SYSTEM_PROMPT, user)
            .await?;

        if draft.script.trim().is_empty() {
            return Err(CollaboratorError::invalid(service::SCRIPT, "empty script"));
        }
        Ok(draft)
    }
}

#[async_trait]
impl ImagePromptGenerator for OpenAiClient {
    async fn prompt_for(
        &self,
        segment_text: &str,
        context: &PromptContext,
        closing_text: &str,
    ) -> Result<String, CollaboratorError> {
        let reply: PromptReply = self
            .chat_json(
                service::PROMPTS,
                PROMPT_SYSTEM_PROMPT,
                prompt_request(segment_text, context, closing_text),
            )
            .await?;

        let prompt = reply.prompt.trim();
        if prompt.is_empty() {
            return Err(CollaboratorError::invalid(service::PROMPTS, "empty prompt"));
        }
        Ok(prompt.to_string())
    }
}

fn prompt_request(segment_text: &str, context: &PromptContext, closing_text: &str) -> String {
    let mut request = format!(
        "Write a vivid, two to three sentence image prompt for the sentence below. Focus on \
         visual elements, mood, lighting and composition rather than a literal reading. If a \
         person appears, their mouth is closed. Never ask for text or logos. Keep it safe for \
         work.\n\nThe prompt must start with this artistic style: {}\n\nTopic: {}\nDescription: {}\n",
        context.style.instruction(),
        context.topic,
        context.description,
    );
    if !context.essence.is_empty() {
        request.push_str(&format!("Essence of the video: {}\n", context.essence));
    }
    if !closing_text.is_empty() {
        request.push_str(&format!(
            "The video ends with: {}\n",
            closing_text
        ));
    }
    request.push_str(&format!("\nSentence: {}", segment_text));
    request
}

#[async_trait]
impl SpeechSynthesizer for OpenAiClient {
    async fn synthesize(
        &self,
        script: &str,
        narrator: Narrator,
    ) -> Result<Vec<u8>, CollaboratorError> {
        let request = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&json!({
                "model": self.tts_model,
                "input": script,
                "voice": narrator.as_str(),
                "response_format": "mp3",
            }));

        let audio = send(service::SPEECH, request)
            .await?
            .bytes()
            .await
            .map_err(|e| CollaboratorError::Request {
                service: service::SPEECH,
                source: e,
            })?;

        if audio.is_empty() {
            return Err(CollaboratorError::invalid(service::SPEECH, "empty audio"));
        }
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::VisualStyle;

    #[test]
    fn test_parse_plain_json() {
        let draft: ScriptDraft = parse_model_json(
            r#"{"cleaned_topic":"The Moon","script":"It glows.","essence":"moon"}"#,
        )
        .unwrap();
        assert_eq!(draft.cleaned_topic, "The Moon");
        assert_eq!(draft.essence, "moon");
    }

    #[test]
    fn test_parse_fenced_json_with_raw_newlines() {
        let content = "Here you go:\n```json\n{\"prompt\": \"A lighthouse,\nstormy sea\"}\n```";
        let reply: PromptReply = parse_model_json(content).unwrap();
        assert_eq!(reply.prompt, "A lighthouse, stormy sea");
    }

    #[test]
    fn test_parse_without_object_fails() {
        let result: Result<PromptReply, _> = parse_model_json("I cannot help with that.");
        assert!(result.unwrap_err().contains("no JSON object"));
    }

    #[test]
    fn test_prompt_request_includes_context() {
        let context = PromptContext {
            topic: "Tides".into(),
            description: "Why the sea moves".into(),
            essence: "moonlit tide".into(),
            style: VisualStyle::Anime,
        };
        let text = prompt_request("The moon pulls the water.", &context, "And so it returns.");
        assert!(text.contains(VisualStyle::Anime.instruction()));
        assert!(text.contains("Topic: Tides"));
        assert!(text.contains("Description: Why the sea moves"));
        assert!(text.contains("Essence of the video: moonlit tide"));
        assert!(text.contains("The video ends with: And so it returns."));
        assert!(text.ends_with("Sentence: The moon pulls the water."));

        let single = prompt_request("Only line.", &context, "");
        assert!(!single.contains("The video ends with"));

        let plain = PromptContext {
            essence: String::new(),
            ..context
        };
        assert!(!prompt_request("Only line.", &plain, "").contains("Essence"));
    }
}
