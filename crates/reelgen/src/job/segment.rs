use serde::{Deserialize, Serialize};

/// One time-bounded sentence of the aligned transcript. Times are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Text used for prompt synthesis. Aligners prefix sentences with a space.
    pub fn prompt_text(&self) -> &str {
        self.text.trim_start()
    }
}

/// Aligned transcript as written to `subtitles/subtitles.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub sentences: Vec<Segment>,
}

impl Transcript {
    pub fn new(sentences: Vec<Segment>) -> Self {
        Self { sentences }
    }

    /// Span from the first segment's start to the last segment's end.
    pub fn span_ms(&self) -> f64 {
        match (self.sentences.first(), self.sentences.last()) {
            (Some(first), Some(last)) => (last.end - first.start).max(0.0),
            _ => 0.0,
        }
    }

    /// Final segment text, passed to every prompt for continuity.
    /// Empty when the transcript has a single segment.
    pub fn closing_text(&self) -> &str {
        if self.sentences.len() > 1 {
            self.sentences
                .last()
                .map(|s| s.prompt_text())
                .unwrap_or_default()
        } else {
            ""
        }
    }
}

/// A stock footage clip selected for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockClip {
    pub id: String,
    pub url: String,
    pub duration_secs: f64,
}

impl StockClip {
    pub fn duration_ms(&self) -> f64 {
        self.duration_secs * 1000.0
    }
}
