//! Reward shaping: detect feedback polarity in host-supplied text and push
//! a recency-discounted importance/strength adjustment through the
//! memories that were most recently active when the feedback arrived.

use uuid::Uuid;

use crate::store::StorageBackend;
use crate::types::EngramConfig;
use crate::Result;

/// Words whose presence signals positive feedback. Lowercase, matched as
/// whole words after simple tokenization.
pub const POSITIVE_WORDS: &[&str] = &[
    "yes", "correct", "right", "exactly", "good", "great", "perfect", "thanks", "helpful",
];

/// Words whose presence signals negative feedback.
pub const NEGATIVE_WORDS: &[&str] = &[
    "no", "wrong", "incorrect", "not", "bad", "never", "mistaken", "false",
];

/// Detected polarity of a piece of host-supplied feedback text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Net positive signal.
    Positive,
    /// Net negative signal.
    Negative,
    /// No reliable signal either way; no reward is applied.
    Neutral,
}

/// Classify feedback text by counting positive and negative word hits.
///
/// Confidence is `min(0.95, 0.3 + 0.2 * matches)`, where `matches` is the
/// hit count of whichever polarity wins. [`Polarity::Neutral`] (confidence
/// `0.0`) is returned both when there are no hits at all and when positive
/// and negative hits tie.
///
/// # Examples
///
/// ```
/// use engram_core::reward::{detect_feedback, Polarity};
///
/// let (polarity, confidence) = detect_feedback("yes, exactly right");
/// assert_eq!(polarity, Polarity::Positive);
/// assert!(confidence > 0.0);
/// ```
#[must_use]
pub fn detect_feedback(text: &str) -> (Polarity, f64) {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let positive_hits = words.iter().filter(|w| POSITIVE_WORDS.contains(w)).count();
    let negative_hits = words.iter().filter(|w| NEGATIVE_WORDS.contains(w)).count();

    if positive_hits == negative_hits {
        return (Polarity::Neutral, 0.0);
    }

    let (polarity, matches) = if positive_hits > negative_hits {
        (Polarity::Positive, positive_hits)
    } else {
        (Polarity::Negative, negative_hits)
    };
    let confidence = (0.3 + 0.2 * matches as f64).min(0.95);
    (polarity, confidence)
}

/// Apply a reward event to the `recent_n` memories with the greatest
/// `last_accessed`, tie-broken newest (`created_at`) first.
///
/// For the `i`-th entry (zero-based) in that ordering, the recency discount
/// is `1 / (1 + 0.5*i)`. On positive feedback, `importance` gains
/// `magnitude * discount` and `working_strength` gains `0.05 * discount`.
/// On negative feedback, `importance` loses `magnitude * discount` and
/// `working_strength` is scaled by `1 - 0.1*discount`. `core_strength` is
/// never touched. `importance` is clamped to `[0, 1]`. The feedback
/// confidence gates whether a reward applies at all (no signal, no
/// adjustment) but is not folded into the delta's magnitude. Pinning
/// exempts a memory from forgetting and consolidation, not from reward —
/// pinned memories are adjusted the same as any other. Returns the ids
/// actually adjusted, in the order they were selected.
///
/// # Errors
///
/// Returns an error if the backend read or write fails.
pub async fn apply_reward(
    store: &dyn StorageBackend,
    config: &EngramConfig,
    feedback_text: &str,
) -> Result<Vec<Uuid>> {
    let (polarity, _confidence) = detect_feedback(feedback_text);
    if polarity == Polarity::Neutral {
        return Ok(Vec::new());
    }

    let mut candidates = store.all().await?;
    candidates.sort_by(|a, b| {
        b.last_accessed
            .cmp(&a.last_accessed)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    let mut adjusted = Vec::new();
    for (i, mut entry) in candidates.into_iter().take(config.reward.recent_n).enumerate() {
        let discount = 1.0 / (1.0 + 0.5 * i as f64);
        match polarity {
            Polarity::Positive => {
                entry.importance = (entry.importance + config.reward.magnitude * discount).clamp(0.0, 1.0);
                entry.working_strength += 0.05 * discount;
            }
            Polarity::Negative => {
                entry.importance = (entry.importance - config.reward.magnitude * discount).clamp(0.0, 1.0);
                entry.working_strength *= 1.0 - 0.1 * discount;
            }
            Polarity::Neutral => unreachable!("filtered out above"),
        }
        let id = entry.id;
        store.update(&entry).await?;
        adjusted.push(id);
    }
    Ok(adjusted)
}
