use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::llm::{complete_json, recover, CollaboratorError, CompletionClient, GenerationParams};
use crate::models::assessment::{GeneratedQuestion, QuestionOption};
use crate::models::knowledge::Difficulty;

const QUESTION_PARAMS: GenerationParams = GenerationParams::new(0.7, 2000);

/// Produces multiple-choice questions for one topic at one difficulty.
///
/// Implementations never fail: a broken collaborator yields a single
/// deterministic fallback question.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: u32,
    ) -> Vec<GeneratedQuestion>;
}

pub struct LlmQuestionGenerator {
    completion: Arc<dyn CompletionClient>,
}

impl LlmQuestionGenerator {
    pub fn new(completion: Arc<dyn CompletionClient>) -> Self {
        Self { completion }
    }

    async fn request(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: u32,
    ) -> Result<Vec<GeneratedQuestion>, CollaboratorError> {
        let prompt = question_prompt(topic, difficulty, count);
        let questions: Vec<GeneratedQuestion> =
            complete_json(self.completion.as_ref(), &prompt, QUESTION_PARAMS).await?;
        if questions.is_empty() {
            return Err(CollaboratorError::Malformed(
                "question list is empty".to_string(),
            ));
        }
        Ok(questions)
    }
}

#[async_trait]
impl QuestionGenerator for LlmQuestionGenerator {
    async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: u32,
    ) -> Vec<GeneratedQuestion> {
        let result = self.request(topic, difficulty, count).await;
        let mut questions = recover(result, "questions", |_| vec![fallback_question(topic)]);
        questions.truncate(count.max(1) as usize);

        for question in &mut questions {
            question.topic = Some(topic.to_string());
            question.difficulty = Some(difficulty);
        }
        questions
    }
}

fn question_prompt(topic: &str, difficulty: Difficulty, count: u32) -> String {
    format!(
        r#"Generate {count} multiple-choice quiz questions about {topic} at a {difficulty} difficulty level.

Return the questions in the following JSON format:
[
  {{
    "text": "Question text",
    "type": "multiple-choice",
    "options": [
      {{ "id": "a", "text": "Option A" }},
      {{ "id": "b", "text": "Option B" }},
      {{ "id": "c", "text": "Option C" }},
      {{ "id": "d", "text": "Option D" }}
    ],
    "correct_answer": {{ "id": "correct_option_id" }},
    "explanation": "Explanation of the correct answer"
  }}
]

Make sure:
1. Questions are clear and concise
2. All options are plausible
3. There is only one correct answer
4. The difficulty level is appropriate
5. Questions cover different aspects of the topic

Respond with ONLY the JSON array, no additional text."#
    )
}

pub fn fallback_question(topic: &str) -> GeneratedQuestion {
    GeneratedQuestion {
        text: format!("What is {}?", topic),
        question_type: "multiple-choice".to_string(),
        options: ["a", "b", "c", "d"]
            .into_iter()
            .map(|id| QuestionOption {
                id: id.to_string(),
                text: format!("Option {}", id.to_uppercase()),
            })
            .collect(),
        correct_answer: json!({ "id": "a" }),
        explanation: Some("This is a fallback question.".to_string()),
        topic: Some(topic.to_string()),
        difficulty: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(Result<String, u16>);

    #[async_trait]
    impl CompletionClient for Scripted {
        async fn complete(
            &self,
            _prompt: &str,
            _params: GenerationParams,
        ) -> Result<String, CollaboratorError> {
            self.0.clone().map_err(|status| CollaboratorError::Status {
                status,
                body: "overloaded".to_string(),
            })
        }
    }

    fn generator(reply: Result<String, u16>) -> LlmQuestionGenerator {
        LlmQuestionGenerator::new(Arc::new(Scripted(reply)))
    }

    #[tokio::test]
    async fn parses_and_tags_generated_questions() {
        let reply = r#"```json
[
  {"text": "What does the borrow checker enforce?", "type": "multiple-choice",
   "options": [{"id": "a", "text": "Aliasing XOR mutation"}, {"id": "b", "text": "Garbage collection"}],
   "correct_answer": {"id": "a"}, "explanation": "Shared or mutable, never both."},
  {"text": "Second", "options": [], "correct_answer": {"id": "b"}}
]
```"#;

        let questions = generator(Ok(reply.to_string()))
            .generate("Ownership", Difficulty::Medium, 2)
            .await;

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].correct_answer, json!({"id": "a"}));
        assert_eq!(questions[1].question_type, "multiple-choice");
        assert!(questions
            .iter()
            .all(|q| q.topic.as_deref() == Some("Ownership")
                && q.difficulty == Some(Difficulty::Medium)));
    }

    #[tokio::test]
    async fn extra_questions_are_trimmed_to_the_request() {
        let reply = r#"[{"text": "1", "correct_answer": {"id": "a"}},
                        {"text": "2", "correct_answer": {"id": "a"}},
                        {"text": "3", "correct_answer": {"id": "a"}}]"#;
        let questions = generator(Ok(reply.to_string()))
            .generate("Traits", Difficulty::Easy, 2)
            .await;
        assert_eq!(questions.len(), 2);
    }

    #[tokio::test]
    async fn broken_collaborator_yields_one_fallback_question() {
        let questions = generator(Err(503))
            .generate("Lifetimes", Difficulty::Hard, 3)
            .await;

        assert_eq!(questions.len(), 1);
        let q = &questions[0];
        assert_eq!(q.text, "What is Lifetimes?");
        assert_eq!(q.options.len(), 4);
        assert_eq!(q.options[3].text, "Option D");
        assert_eq!(q.correct_answer, json!({"id": "a"}));
        assert_eq!(q.difficulty, Some(Difficulty::Hard));
    }

    #[tokio::test]
    async fn unparseable_or_empty_output_falls_back() {
        for reply in ["I cannot help with that.", "[]"] {
            let questions = generator(Ok(reply.to_string()))
                .generate("Macros", Difficulty::Easy, 1)
                .await;
            assert_eq!(questions.len(), 1);
            assert_eq!(questions[0].text, "What is Macros?");
        }
    }
}
