//! Greedy selection of stock clips against the narration length.

use crate::job::StockClip;

/// Clips chosen for a job and how much of the narration they cover.
#[derive(Debug, Clone, PartialEq)]
pub struct StockSelection {
    pub clips: Vec<StockClip>,
    pub covered_ms: f64,
    pub needed_ms: f64,
}

impl StockSelection {
    pub fn is_covering(&self) -> bool {
        !self.clips.is_empty() && self.covered_ms >= self.needed_ms
    }
}

/// Takes candidates in the matcher's order until their durations reach
/// `needed_ms`. Clips without a positive duration are skipped.
pub fn select_covering(candidates: &[StockClip], needed_ms: f64) -> StockSelection {
    let mut clips = Vec::new();
    let mut covered_ms = 0.0;

    for clip in candidates {
        if covered_ms >= needed_ms && !clips.is_empty() {
            break;
        }
        let duration = clip.duration_ms();
        if !duration.is_finite() || duration <= 0.0 {
            continue;
        }
        covered_ms += duration;
        clips.push(clip.clone());
    }

    StockSelection {
        clips,
        covered_ms,
        needed_ms,
    }
}
