use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Derived per-user, per-course mastery snapshot. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeState {
    pub topics_mastered: BTreeSet<String>,
    pub topics_in_progress: BTreeSet<String>,
    pub topics_not_started: BTreeSet<String>,
    pub average_quiz_score: f64,
    pub strengths: BTreeSet<String>,
    pub weaknesses: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyCounts {
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
}

impl DifficultyCounts {
    pub fn total(&self) -> u32 {
        self.easy + self.medium + self.hard
    }

    pub fn get(&self, difficulty: Difficulty) -> u32 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    /// Non-zero quotas in easy → medium → hard order.
    pub fn nonzero(&self) -> impl Iterator<Item = (Difficulty, u32)> + '_ {
        [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]
            .into_iter()
            .map(|d| (d, self.get(d)))
            .filter(|(_, count)| *count > 0)
    }
}

/// Topic → per-difficulty question quota.
pub type QuestionDistribution = BTreeMap<String, DifficultyCounts>;

pub fn distribution_total(distribution: &QuestionDistribution) -> u32 {
    distribution.values().map(DifficultyCounts::total).sum()
}
