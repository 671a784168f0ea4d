//! Submitted job input and its validation.
//!
//! Input fields are fixed once a job is created; a recreate keeps them as-is.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Background music tracks known to the stitching service.
pub const DEFAULT_MUSIC_TRACKS: &[&str] = &[
    "_another-love",
    "_bladerunner-2049",
    "_constellations",
    "_fallen",
    "_hotline",
    "_izzamuzzic",
    "_nas",
    "_paris-else",
    "_snowfall",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Topic is required")]
    EmptyTopic,

    #[error("Unknown narrator '{0}'")]
    UnknownNarrator(String),

    #[error("Unknown visual style '{0}'")]
    UnknownStyle(String),

    #[error("Unknown media type '{0}'")]
    UnknownMediaType(String),

    #[error("Background music is required")]
    MissingBackgroundMusic,

    #[error("Unknown background music track '{0}'")]
    UnknownBackgroundMusic(String),
}

/// Narrator voice used by the speech synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Narrator {
    #[default]
    Alloy,
    Echo,
    Fable,
    Nova,
    Onyx,
    Shimmer,
}

impl Narrator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Narrator::Alloy => "alloy",
            Narrator::Echo => "echo",
            Narrator::Fable => "fable",
            Narrator::Nova => "nova",
            Narrator::Onyx => "onyx",
            Narrator::Shimmer => "shimmer",
        }
    }
}

impl fmt::Display for Narrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Narrator {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alloy" => Ok(Narrator::Alloy),
            "echo" => Ok(Narrator::Echo),
            "fable" => Ok(Narrator::Fable),
            "nova" => Ok(Narrator::Nova),
            "onyx" => Ok(Narrator::Onyx),
            "shimmer" => Ok(Narrator::Shimmer),
            other => Err(InputError::UnknownNarrator(other.to_string())),
        }
    }
}

/// Artistic style applied to every generated image of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualStyle {
    #[default]
    Default,
    Anime,
    Watercolor,
    Cartoon,
}

impl VisualStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualStyle::Default => "default",
            VisualStyle::Anime => "anime",
            VisualStyle::Watercolor => "watercolor",
            VisualStyle::Cartoon => "cartoon",
        }
    }

    /// Style guidance that leads every image prompt.
    pub fn instruction(&self) -> &'static str {
        match self {
            VisualStyle::Anime => {
                "Create the prompt in the style of a high-quality anime key visual, with vibrant \
                 colors, dynamic lighting, and attention to fine details. Think of works by \
                 Studio Ghibli or Makoto Shinkai."
            }
            VisualStyle::Cartoon => {
                "Design the prompt in the style of a modern, polished cartoon, reminiscent of \
                 high-end 3D animated films. Include bold colors, exaggerated features, and a \
                 touch of whimsy."
            }
            VisualStyle::Watercolor => {
                "Envision the prompt as a delicate watercolor painting, with soft, translucent \
                 colors blending seamlessly. Incorporate visible brush strokes and paper texture."
            }
            VisualStyle::Default => {
                "Create a prompt for an ultra-realistic image with high detail, vivid colors, and \
                 dramatic lighting. The style should be photorealistic, similar to high-end \
                 editorial photography."
            }
        }
    }
}

impl fmt::Display for VisualStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisualStyle {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(VisualStyle::Default),
            "anime" => Ok(VisualStyle::Anime),
            "watercolor" => Ok(VisualStyle::Watercolor),
            "cartoon" => Ok(VisualStyle::Cartoon),
            other => Err(InputError::UnknownStyle(other.to_string())),
        }
    }
}

/// Where the visuals of a video come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Ai,
    Stock,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Ai => "ai",
            MediaType::Stock => "stock",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai" => Ok(MediaType::Ai),
            "stock" => Ok(MediaType::Stock),
            other => Err(InputError::UnknownMediaType(other.to_string())),
        }
    }
}

/// Fields supplied by the client when a job is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInput {
    pub topic: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub narrator: Narrator,
    #[serde(default)]
    pub visual_style: VisualStyle,
    #[serde(default)]
    pub posting_methods: Vec<String>,
    #[serde(default)]
    pub is_one_time: bool,
    #[serde(default)]
    pub video_theme: String,
    pub background_music: String,
    #[serde(default)]
    pub media_type: MediaType,
}

impl VideoInput {
    pub fn new(topic: impl Into<String>, background_music: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            description: String::new(),
            narrator: Narrator::default(),
            visual_style: VisualStyle::default(),
            posting_methods: Vec::new(),
            is_one_time: false,
            video_theme: String::new(),
            background_music: background_music.into(),
            media_type: MediaType::default(),
        }
    }

    /// Checks the fields that the enums cannot express.
    pub fn validate<S: AsRef<str>>(&self, music_tracks: &[S]) -> Result<(), InputError> {
        if self.topic.trim().is_empty() {
            return Err(InputError::EmptyTopic);
        }
        if self.background_music.trim().is_empty() {
            return Err(InputError::MissingBackgroundMusic);
        }
        if !music_tracks
            .iter()
            .any(|t| t.as_ref() == self.background_music)
        {
            return Err(InputError::UnknownBackgroundMusic(
                self.background_music.clone(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_input_passes() {
        let input = VideoInput::new("Black holes", "_snowfall");
        assert!(input.validate(DEFAULT_MUSIC_TRACKS).is_ok());
    }

    #[test]
    fn test_blank_topic_rejected() {
        let input = VideoInput::new("   ", "_snowfall");
        assert_eq!(
            input.validate(DEFAULT_MUSIC_TRACKS),
            Err(InputError::EmptyTopic)
        );
    }

    #[test]
    fn test_unknown_track_rejected() {
        let input = VideoInput::new("Black holes", "elevator-jazz");
        assert_eq!(
            input.validate(DEFAULT_MUSIC_TRACKS),
            Err(InputError::UnknownBackgroundMusic("elevator-jazz".into()))
        );
    }

    #[test]
    fn test_missing_track_rejected() {
        let input = VideoInput::new("Black holes", "");
        assert_eq!(
            input.validate(DEFAULT_MUSIC_TRACKS),
            Err(InputError::MissingBackgroundMusic)
        );
    }

    #[test]
    fn test_deserialize_rejects_unknown_narrator() {
        let json = r#"{"topic":"t","backgroundMusic":"_nas","narrator":"morgan"}"#;
        assert!(serde_json::from_str::<VideoInput>(json).is_err());
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let json = r#"{"topic":"Volcanoes","backgroundMusic":"_nas","mediaType":"stock"}"#;
        let input: VideoInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.narrator, Narrator::Alloy);
        assert_eq!(input.visual_style, VisualStyle::Default);
        assert_eq!(input.media_type, MediaType::Stock);
        assert!(input.posting_methods.is_empty());
    }

    #[test]
    fn test_enum_string_forms_agree() {
        for narrator in [
            Narrator::Alloy,
            Narrator::Echo,
            Narrator::Fable,
            Narrator::Nova,
            Narrator::Onyx,
            Narrator::Shimmer,
        ] {
            assert_eq!(narrator.as_str().parse::<Narrator>(), Ok(narrator));
        }
        assert_eq!("anime".parse::<VisualStyle>(), Ok(VisualStyle::Anime));
        assert!("vintage".parse::<VisualStyle>().is_err());
        assert_eq!("stock".parse::<MediaType>(), Ok(MediaType::Stock));
    }
}
