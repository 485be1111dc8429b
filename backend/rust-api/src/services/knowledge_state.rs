use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};

use crate::models::content::QuizSubmission;
use crate::models::knowledge::KnowledgeState;
use crate::store::LearningStore;

pub const MASTERY_THRESHOLD: f64 = 0.8;
pub const WEAKNESS_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TopicStanding {
    Mastered,
    Weak,
    InProgress,
}

impl TopicStanding {
    fn from_ratio(ratio: f64) -> Self {
        if ratio >= MASTERY_THRESHOLD {
            TopicStanding::Mastered
        } else if ratio <= WEAKNESS_THRESHOLD {
            TopicStanding::Weak
        } else {
            TopicStanding::InProgress
        }
    }
}

pub struct KnowledgeStateBuilder<'a> {
    store: &'a dyn LearningStore,
}

impl<'a> KnowledgeStateBuilder<'a> {
    pub fn new(store: &'a dyn LearningStore) -> Self {
        Self { store }
    }

    /// Derives the user's mastery snapshot for a course. Read-only.
    ///
    /// Submissions are not scoped to the course: any quiz the user took
    /// whose module resolves to a topic counts, and every score feeds
    /// `average_quiz_score`.
    pub async fn build(&self, user_id: &str, course_id: &str) -> Result<KnowledgeState> {
        let mut submissions = self
            .store
            .quiz_submissions(user_id)
            .await
            .context("Failed to load quiz submissions")?;
        let modules = self
            .store
            .modules_for_course(course_id)
            .await
            .context("Failed to load course modules")?;

        let mut state = KnowledgeState::default();

        if !submissions.is_empty() {
            let total: f64 = submissions.iter().map(|s| s.score).sum();
            state.average_quiz_score = total / submissions.len() as f64;
        }

        // A topic keeps the standing of its most recent submission.
        submissions.sort_by_key(|s| s.submitted_at);
        let mut standings: BTreeMap<String, TopicStanding> = BTreeMap::new();
        let mut topics = TopicResolver::new(self.store);

        for submission in &submissions {
            let Some(ratio) = submission.correctness_ratio() else {
                continue;
            };
            let Some(topic) = topics.resolve(submission).await? else {
                tracing::debug!(
                    "Skipping submission {}: quiz chain does not resolve to a module",
                    submission.submission_id
                );
                continue;
            };
            standings.insert(topic, TopicStanding::from_ratio(ratio));
        }

        for (topic, standing) in standings {
            match standing {
                TopicStanding::Mastered => {
                    state.strengths.insert(topic.clone());
                    state.topics_mastered.insert(topic);
                }
                TopicStanding::Weak => {
                    state.weaknesses.insert(topic.clone());
                    state.topics_in_progress.insert(topic);
                }
                TopicStanding::InProgress => {
                    state.topics_in_progress.insert(topic);
                }
            }
        }

        for module in modules {
            if !state.topics_mastered.contains(&module.title)
                && !state.topics_in_progress.contains(&module.title)
            {
                state.topics_not_started.insert(module.title);
            }
        }

        tracing::debug!(
            "Knowledge state for user={} course={}: mastered={} in_progress={} not_started={}",
            user_id,
            course_id,
            state.topics_mastered.len(),
            state.topics_in_progress.len(),
            state.topics_not_started.len()
        );

        Ok(state)
    }
}

/// Memoised quiz → content → module lookups for one build.
struct TopicResolver<'a> {
    store: &'a dyn LearningStore,
    quiz_topics: HashMap<String, Option<String>>,
}

impl<'a> TopicResolver<'a> {
    fn new(store: &'a dyn LearningStore) -> Self {
        Self {
            store,
            quiz_topics: HashMap::new(),
        }
    }

    async fn resolve(&mut self, submission: &QuizSubmission) -> Result<Option<String>> {
        if let Some(cached) = self.quiz_topics.get(&submission.quiz_id) {
            return Ok(cached.clone());
        }
        let topic = self.lookup(&submission.quiz_id).await?;
        self.quiz_topics
            .insert(submission.quiz_id.clone(), topic.clone());
        Ok(topic)
    }

    async fn lookup(&self, quiz_id: &str) -> Result<Option<String>> {
        let Some(quiz) = self.store.quiz(quiz_id).await? else {
            return Ok(None);
        };
        let Some(content) = self.store.content_item(&quiz.content_id).await? else {
            return Ok(None);
        };
        let module = self.store.module(&content.module_id).await?;
        Ok(module.map(|m| m.title))
    }
}
