use std::collections::BTreeSet;

use crate::models::knowledge::{DifficultyCounts, KnowledgeState, QuestionDistribution};

const WEAKNESS_SHARE_PERCENT: u32 = 40;
const IN_PROGRESS_SHARE_PERCENT: u32 = 40;
const MASTERED_SHARE_PERCENT: u32 = 20;

/// Questions each topic of a bucket receives. Never below one for a
/// populated bucket, so the issued total can exceed the bucket's share.
fn per_topic(bucket_questions: u32, topics: &BTreeSet<String>) -> u32 {
    (bucket_questions / topics.len() as u32).max(1)
}

/// Splits `n` evenly across two difficulties, dropping an odd remainder.
/// A lone question goes to the harder difficulty so the topic is not
/// starved.
fn halves(n: u32) -> (u32, u32) {
    if n == 1 {
        return (0, 1);
    }
    (n / 2, n / 2)
}

/// Turns a knowledge state into a topic × difficulty quota.
///
/// Weaknesses get 40% of `num_questions` (easy/medium), topics in
/// progress 40% (medium/hard), mastered topics 20% (hard). Whatever is
/// left goes to not-started topics as easy questions. Later buckets add
/// to a topic's existing entry.
pub fn allocate(state: &KnowledgeState, num_questions: u32) -> QuestionDistribution {
    let mut distribution = QuestionDistribution::new();

    if !state.weaknesses.is_empty() {
        let share = num_questions * WEAKNESS_SHARE_PERCENT / 100;
        let (easy, medium) = halves(per_topic(share, &state.weaknesses));
        for topic in &state.weaknesses {
            let entry = distribution.entry(topic.clone()).or_default();
            entry.easy += easy;
            entry.medium += medium;
        }
    }

    if !state.topics_in_progress.is_empty() {
        let share = num_questions * IN_PROGRESS_SHARE_PERCENT / 100;
        let (medium, hard) = halves(per_topic(share, &state.topics_in_progress));
        for topic in &state.topics_in_progress {
            let entry = distribution.entry(topic.clone()).or_default();
            entry.medium += medium;
            entry.hard += hard;
        }
    }

    if !state.topics_mastered.is_empty() {
        let share = num_questions * MASTERED_SHARE_PERCENT / 100;
        let hard = per_topic(share, &state.topics_mastered);
        for topic in &state.topics_mastered {
            distribution.entry(topic.clone()).or_default().hard += hard;
        }
    }

    let allocated: u32 = distribution.values().map(DifficultyCounts::total).sum();
    let remaining = num_questions.saturating_sub(allocated);

    if remaining > 0 && !state.topics_not_started.is_empty() {
        let easy = per_topic(remaining, &state.topics_not_started);
        for topic in &state.topics_not_started {
            distribution.entry(topic.clone()).or_default().easy += easy;
        }
    }

    distribution
}
