use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub course_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A course module. Its title doubles as the knowledge-state topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub module_id: String,
    pub course_id: String,
    pub title: String,
    #[serde(default)]
    pub sequence_number: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub content_id: String,
    pub module_id: String,
    pub title: String,
    #[serde(flatten)]
    pub body: ContentBody,
}

impl ContentItem {
    pub fn content_type(&self) -> &'static str {
        self.body.kind()
    }
}

/// Typed content payload, keyed by the `type` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum ContentBody {
    Video {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },
    Text {
        body: String,
    },
    Quiz {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quiz_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instructions: Option<String>,
    },
}

impl ContentBody {
    pub fn kind(&self) -> &'static str {
        match self {
            ContentBody::Video { .. } => "video",
            ContentBody::Text { .. } => "text",
            ContentBody::Quiz { .. } => "quiz",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub quiz_id: String,
    pub content_id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedQuizAnswer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSubmission {
    pub submission_id: String,
    pub user_id: String,
    pub quiz_id: String,
    pub score: f64,
    #[serde(default)]
    pub answers: Vec<SubmittedQuizAnswer>,
    pub submitted_at: DateTime<Utc>,
}

impl QuizSubmission {
    /// Share of answers flagged correct; `None` when nothing was answered.
    pub fn correctness_ratio(&self) -> Option<f64> {
        if self.answers.is_empty() {
            return None;
        }
        let correct = self.answers.iter().filter(|a| a.is_correct).count();
        Some(correct as f64 / self.answers.len() as f64)
    }
}

/// The `limit` latest submissions, newest first.
pub fn most_recent(submissions: &[QuizSubmission], limit: usize) -> Vec<&QuizSubmission> {
    let mut recent: Vec<&QuizSubmission> = submissions.iter().collect();
    recent.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    recent.truncate(limit);
    recent
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    pub content_id: String,
    pub status: ProgressStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_body_is_keyed_by_type() {
        let item: ContentItem = serde_json::from_value(json!({
            "content_id": "c1",
            "module_id": "m1",
            "title": "Ownership",
            "type": "video",
            "content": { "url": "https://cdn.example/ownership.mp4", "transcript": "..." }
        }))
        .unwrap();

        assert_eq!(item.content_type(), "video");
        assert!(matches!(item.body, ContentBody::Video { ref url, .. } if url.ends_with(".mp4")));

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "video");
        assert_eq!(value["content"]["transcript"], "...");
    }

    #[test]
    fn unknown_content_type_is_rejected() {
        let result = serde_json::from_value::<ContentItem>(json!({
            "content_id": "c1",
            "module_id": "m1",
            "title": "Slides",
            "type": "slides",
            "content": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn most_recent_keeps_the_newest_submissions() {
        let start = Utc::now();
        let submissions: Vec<QuizSubmission> = (0..4)
            .map(|n| QuizSubmission {
                submission_id: format!("s{}", n),
                user_id: "u1".into(),
                quiz_id: "q1".into(),
                score: 0.0,
                answers: Vec::new(),
                submitted_at: start + chrono::Duration::minutes(n),
            })
            .collect();

        let ids: Vec<_> = most_recent(&submissions, 2)
            .iter()
            .map(|s| s.submission_id.as_str())
            .collect();
        assert_eq!(ids, vec!["s3", "s2"]);
        assert_eq!(most_recent(&submissions, 10).len(), 4);
    }

    #[test]
    fn correctness_ratio_counts_flagged_answers() {
        let submission = QuizSubmission {
            submission_id: "s1".into(),
            user_id: "u1".into(),
            quiz_id: "q1".into(),
            score: 50.0,
            answers: vec![
                SubmittedQuizAnswer { question_id: None, is_correct: true },
                SubmittedQuizAnswer { question_id: None, is_correct: false },
            ],
            submitted_at: Utc::now(),
        };
        assert_eq!(submission.correctness_ratio(), Some(0.5));

        let empty = QuizSubmission { answers: vec![], ..submission };
        assert_eq!(empty.correctness_ratio(), None);
    }
}
