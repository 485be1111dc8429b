use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::llm::{complete_json, recover, CollaboratorError, CompletionClient, GenerationParams};
use crate::metrics::{ASSESSMENTS_EVALUATED_TOTAL, ASSESSMENTS_GENERATED_TOTAL};
use crate::models::assessment::{
    AnswerSubmission, Assessment, AssessmentResult, AssessmentStatus, AssessmentView,
    EvaluationResponse, Feedback, Question, QuestionResult,
};
use crate::services::knowledge_state::KnowledgeStateBuilder;
use crate::services::question_allocator::allocate;
use crate::services::question_generator::QuestionGenerator;
use crate::store::LearningStore;

const FEEDBACK_PARAMS: GenerationParams = GenerationParams::new(0.5, 1000);
const STRENGTH_SCORE: f64 = 80.0;
const WEAKNESS_SCORE: f64 = 50.0;
const DEFAULT_TOPIC: &str = "General";

#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("Assessment not found")]
    NotFound,
    #[error("Assessment has expired")]
    Expired,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Assessment already completed")]
    AlreadyCompleted,
    #[error("No questions could be generated for this course")]
    NoQuestions,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub struct AdaptiveAssessmentService {
    store: Arc<dyn LearningStore>,
    questions: Arc<dyn QuestionGenerator>,
    completion: Arc<dyn CompletionClient>,
    ttl: Duration,
}

impl AdaptiveAssessmentService {
    pub fn new(
        store: Arc<dyn LearningStore>,
        questions: Arc<dyn QuestionGenerator>,
        completion: Arc<dyn CompletionClient>,
        ttl_hours: i64,
    ) -> Self {
        Self {
            store,
            questions,
            completion,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Builds, persists and returns (redacted) an assessment tailored to
    /// the user's knowledge state in the course.
    pub async fn generate(
        &self,
        user_id: &str,
        course_id: &str,
        num_questions: u32,
    ) -> Result<AssessmentView, AssessmentError> {
        let state = KnowledgeStateBuilder::new(self.store.as_ref())
            .build(user_id, course_id)
            .await?;
        let distribution = allocate(&state, num_questions);

        let mut questions: Vec<Question> = Vec::new();
        for (topic, counts) in &distribution {
            for (difficulty, count) in counts.nonzero() {
                let generated = self.questions.generate(topic, difficulty, count).await;
                questions.extend(generated.into_iter().map(Question::from));
            }
        }

        if questions.is_empty() {
            tracing::warn!(
                "No questions generated for user={} course={}",
                user_id,
                course_id
            );
            return Err(AssessmentError::NoQuestions);
        }

        let now = Utc::now();
        let assessment = Assessment {
            assessment_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            questions,
            created_at: now,
            expires_at: now + self.ttl,
            status: AssessmentStatus::Active,
        };

        self.store.insert_assessment(&assessment).await?;
        ASSESSMENTS_GENERATED_TOTAL.inc();

        tracing::info!(
            "Assessment created: {} for user={} course={} ({} questions across {} topics)",
            assessment.assessment_id,
            user_id,
            course_id,
            assessment.questions.len(),
            distribution.len()
        );

        Ok(assessment.redacted())
    }

    pub async fn evaluate(
        &self,
        user_id: &str,
        assessment_id: &str,
        answers: &[AnswerSubmission],
    ) -> Result<EvaluationResponse, AssessmentError> {
        let result = self.evaluate_inner(user_id, assessment_id, answers).await;
        let outcome = match &result {
            Ok(_) => "scored",
            Err(AssessmentError::Store(_)) => "error",
            Err(_) => "rejected",
        };
        ASSESSMENTS_EVALUATED_TOTAL.with_label_values(&[outcome]).inc();
        result
    }

    async fn evaluate_inner(
        &self,
        user_id: &str,
        assessment_id: &str,
        answers: &[AnswerSubmission],
    ) -> Result<EvaluationResponse, AssessmentError> {
        let assessment = self
            .store
            .assessment(assessment_id)
            .await?
            .ok_or(AssessmentError::NotFound)?;

        if assessment.is_expired_at(Utc::now()) {
            return Err(AssessmentError::Expired);
        }
        if assessment.user_id != user_id {
            tracing::warn!(
                "User {} attempted to submit assessment {} owned by {}",
                user_id,
                assessment_id,
                assessment.user_id
            );
            return Err(AssessmentError::Unauthorized);
        }
        if assessment.status == AssessmentStatus::Completed {
            return Err(AssessmentError::AlreadyCompleted);
        }

        let (score, question_results) = score_answers(&assessment, answers);

        let result = AssessmentResult {
            result_id: Uuid::new_v4().to_string(),
            assessment_id: assessment_id.to_string(),
            user_id: user_id.to_string(),
            score,
            question_results,
            submitted_at: Utc::now(),
        };

        // Claim first so concurrent submissions can't both store a result
        if !self.store.mark_assessment_completed(assessment_id).await? {
            return Err(AssessmentError::AlreadyCompleted);
        }
        self.store.insert_assessment_result(&result).await?;

        tracing::info!(
            "Assessment {} completed by user={} with score {:.1}",
            assessment_id,
            user_id,
            score
        );

        let feedback = generate_feedback(
            self.completion.as_ref(),
            score,
            &result.question_results,
            &assessment,
        )
        .await;

        Ok(EvaluationResponse {
            result_id: result.result_id,
            score,
            question_results: result.question_results,
            feedback,
        })
    }
}

/// Scores submitted answers by exact structural equality with the key.
///
/// Answers naming unknown questions produce no result but still count in
/// the denominator.
pub fn score_answers(
    assessment: &Assessment,
    answers: &[AnswerSubmission],
) -> (f64, Vec<QuestionResult>) {
    let mut correct = 0usize;
    let mut results = Vec::with_capacity(answers.len());

    for answer in answers {
        let Some(question) = assessment.find_question(&answer.question_id) else {
            continue;
        };
        let is_correct = answer.answer_data == question.correct_answer;
        if is_correct {
            correct += 1;
        }
        results.push(QuestionResult {
            question_id: answer.question_id.clone(),
            is_correct,
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone().unwrap_or_default(),
        });
    }

    let score = if answers.is_empty() {
        0.0
    } else {
        correct as f64 / answers.len() as f64 * 100.0
    };
    (score, results)
}

#[derive(Debug, Default)]
struct TopicTally {
    correct: u32,
    total: u32,
}

impl TopicTally {
    fn score(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64 * 100.0
        }
    }
}

/// Per-topic strengths (≥80%) and weaknesses (≤50%) of an evaluation.
pub fn topic_breakdown(
    question_results: &[QuestionResult],
    assessment: &Assessment,
) -> (Vec<String>, Vec<String>) {
    let mut tallies: BTreeMap<&str, TopicTally> = BTreeMap::new();
    for result in question_results {
        let Some(question) = assessment.find_question(&result.question_id) else {
            continue;
        };
        let topic = question.topic.as_deref().unwrap_or(DEFAULT_TOPIC);
        let tally = tallies.entry(topic).or_default();
        tally.total += 1;
        if result.is_correct {
            tally.correct += 1;
        }
    }

    let strengths = tallies
        .iter()
        .filter(|(_, t)| t.score() >= STRENGTH_SCORE)
        .map(|(topic, _)| topic.to_string())
        .collect();
    let weaknesses = tallies
        .iter()
        .filter(|(_, t)| t.score() <= WEAKNESS_SCORE)
        .map(|(topic, _)| topic.to_string())
        .collect();
    (strengths, weaknesses)
}

/// Narrative feedback for an evaluation. Never fails: malformed output
/// and collaborator errors both fall back to templated feedback.
pub async fn generate_feedback(
    completion: &dyn CompletionClient,
    score: f64,
    question_results: &[QuestionResult],
    assessment: &Assessment,
) -> Feedback {
    let (strengths, weaknesses) = topic_breakdown(question_results, assessment);
    let prompt = feedback_prompt(score, &strengths, &weaknesses);
    let result = complete_json::<Feedback>(completion, &prompt, FEEDBACK_PARAMS).await;

    recover(result, "feedback", |err| {
        fallback_feedback(score, &weaknesses, err)
    })
}

fn feedback_prompt(score: f64, strengths: &[String], weaknesses: &[String]) -> String {
    let list = |topics: &[String]| {
        if topics.is_empty() {
            "None identified".to_string()
        } else {
            topics.join(", ")
        }
    };

    format!(
        r#"Generate personalized feedback for a student who scored {score}% on an assessment.

Their strengths are in: {strengths}
Their weaknesses are in: {weaknesses}

Provide:
1. An encouraging message based on their performance
2. Specific recommendations for improving in their weak areas
3. Suggestions for next steps in their learning journey

Format the response as a JSON object:
{{
  "message": "Encouraging message",
  "recommendations": ["Recommendation 1", "Recommendation 2", ...],
  "next_steps": ["Next step 1", "Next step 2", ...]
}}"#,
        score = score.round(),
        strengths = list(strengths),
        weaknesses = list(weaknesses),
    )
}

pub fn fallback_feedback(score: f64, weaknesses: &[String], err: &CollaboratorError) -> Feedback {
    let message = format!("You scored {}% on this assessment.", score.round());

    match err {
        CollaboratorError::Malformed(_) => Feedback {
            message,
            recommendations: if weaknesses.is_empty() {
                vec!["Continue practicing to maintain your knowledge.".to_string()]
            } else {
                weaknesses
                    .iter()
                    .map(|w| format!("Focus on improving in {}", w))
                    .collect()
            },
            next_steps: vec!["Review the material and try again.".to_string()],
        },
        _ => Feedback {
            message,
            recommendations: vec!["Review the questions you got wrong.".to_string()],
            next_steps: vec!["Continue to the next section.".to_string()],
        },
    }
}
