use std::sync::Arc;

use crate::llm::{
    complete_json, parse_json, recover, CollaboratorError, CompletionClient, GenerationParams,
};
use crate::metrics::CONTENT_GENERATED_TOTAL;
use crate::models::assessment::GeneratedQuestion;
use crate::models::content_generation::{ContentOutline, CourseLevel, OutlineSection};
use crate::models::knowledge::Difficulty;
use crate::services::question_generator::QuestionGenerator;

const OBJECTIVE_PARAMS: GenerationParams = GenerationParams::new(0.5, 1000);
const OUTLINE_PARAMS: GenerationParams = GenerationParams::new(0.6, 2000);
const SUMMARY_TEMPERATURE: f32 = 0.3;

/// Lines shorter than this are list syntax or noise, not objectives.
const MIN_OBJECTIVE_LEN: usize = 10;

/// Authoring helpers for instructors. Every operation degrades to
/// deterministic content when the completion collaborator misbehaves.
pub struct ContentGenerationService {
    completion: Arc<dyn CompletionClient>,
    questions: Arc<dyn QuestionGenerator>,
}

impl ContentGenerationService {
    pub fn new(completion: Arc<dyn CompletionClient>, questions: Arc<dyn QuestionGenerator>) -> Self {
        Self {
            completion,
            questions,
        }
    }

    pub async fn quiz_questions(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: u32,
    ) -> Vec<GeneratedQuestion> {
        CONTENT_GENERATED_TOTAL.with_label_values(&["questions"]).inc();
        self.questions.generate(topic, difficulty, count).await
    }

    pub async fn summary(&self, content_text: &str, max_length: u32) -> String {
        CONTENT_GENERATED_TOTAL.with_label_values(&["summary"]).inc();

        let prompt = format!(
            "Summarize the following educational content in a clear and concise way.\n\
             Keep the summary under {max_length} characters.\n\n\
             Content:\n{content_text}\n\nSummary:"
        );
        let params = GenerationParams::new(SUMMARY_TEMPERATURE, max_length);
        let result = self
            .completion
            .complete(&prompt, params)
            .await
            .and_then(|raw| {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    Err(CollaboratorError::EmptyResponse)
                } else {
                    Ok(trimmed.chars().take(max_length as usize).collect())
                }
            });

        recover(result, "summary", |_| "Summary generation failed.".to_string())
    }

    pub async fn learning_objectives(
        &self,
        topic: &str,
        level: CourseLevel,
        count: u32,
    ) -> Vec<String> {
        CONTENT_GENERATED_TOTAL.with_label_values(&["objectives"]).inc();

        let level = level.as_str();
        let prompt = format!(
            r#"Generate {count} learning objectives for a {level} level course on {topic}.

Each learning objective should:
1. Start with an action verb (e.g., "Explain", "Analyze", "Create")
2. Be specific and measurable
3. Focus on what the learner will be able to do
4. Be appropriate for the {level} level

Format the response as a JSON array of strings:
["Objective 1", "Objective 2", ...]

Respond with ONLY the JSON array, no additional text."#
        );
        let result = self
            .completion
            .complete(&prompt, OBJECTIVE_PARAMS)
            .await
            .and_then(|raw| parse_objectives(&raw));

        let mut objectives = recover(result, "objectives", |_| {
            vec![format!("Understand the basics of {}", topic)]
        });
        objectives.truncate(count as usize);
        objectives
    }

    pub async fn outline(&self, topic: &str, sections: u32) -> ContentOutline {
        CONTENT_GENERATED_TOTAL.with_label_values(&["outline"]).inc();

        let prompt = format!(
            r#"Create a detailed outline for educational content about {topic} with {sections} main sections.

Return the outline in the following JSON format:
{{
  "title": "Main title for the content",
  "description": "Brief description of the content",
  "sections": [
    {{ "title": "Section 1 Title", "subsections": ["Subsection 1.1", "Subsection 1.2"] }}
  ]
}}

Make sure:
1. The content follows a logical progression
2. Each section builds on previous sections
3. The outline covers the topic comprehensively
4. Subsections provide more detailed breakdown of each section

Respond with ONLY the JSON object, no additional text."#
        );
        let result = complete_json::<ContentOutline>(self.completion.as_ref(), &prompt, OUTLINE_PARAMS)
            .await
            .and_then(|outline| {
                if outline.sections.is_empty() {
                    Err(CollaboratorError::Malformed("outline has no sections".to_string()))
                } else {
                    Ok(outline)
                }
            });

        recover(result, "outline", |_| fallback_outline(topic))
    }
}

/// Accepts a JSON array of strings, or salvages one objective per line when
/// the model ignored the format.
fn parse_objectives(raw: &str) -> Result<Vec<String>, CollaboratorError> {
    let objectives = match parse_json::<Vec<String>>(raw) {
        Ok(list) => list
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect(),
        Err(_) => raw
            .lines()
            .map(|line| line.trim_matches(|c: char| c.is_whitespace() || "[],\"'".contains(c)))
            .filter(|line| line.len() > MIN_OBJECTIVE_LEN)
            .map(str::to_string)
            .collect::<Vec<_>>(),
    };

    if objectives.is_empty() {
        return Err(CollaboratorError::Malformed(
            "no objectives in output".to_string(),
        ));
    }
    Ok(objectives)
}

pub fn fallback_outline(topic: &str) -> ContentOutline {
    let section = |title: String, subsections: [&str; 3]| OutlineSection {
        title,
        subsections: subsections.iter().map(|s| s.to_string()).collect(),
    };

    ContentOutline {
        title: format!("Introduction to {}", topic),
        description: format!("A comprehensive guide to understanding {}", topic),
        sections: vec![
            section(
                format!("What is {}?", topic),
                [
                    "Definition and basic concepts",
                    "Historical context",
                    "Importance and applications",
                ],
            ),
            section(
                "Key Principles".to_string(),
                ["Fundamental principles", "Core components", "Best practices"],
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::question_generator::LlmQuestionGenerator;
    use async_trait::async_trait;

    struct Fixed(Option<String>);

    #[async_trait]
    impl CompletionClient for Fixed {
        async fn complete(
            &self,
            _prompt: &str,
            _params: GenerationParams,
        ) -> Result<String, CollaboratorError> {
            self.0
                .clone()
                .ok_or_else(|| CollaboratorError::Transport("connection refused".into()))
        }
    }

    fn service(reply: Option<&str>) -> ContentGenerationService {
        let completion: Arc<dyn CompletionClient> = Arc::new(Fixed(reply.map(str::to_string)));
        ContentGenerationService::new(
            completion.clone(),
            Arc::new(LlmQuestionGenerator::new(completion)),
        )
    }

    #[tokio::test]
    async fn summary_is_trimmed_and_capped() {
        let long = format!("  {}  ", "x".repeat(150));
        let summary = service(Some(&long)).summary("body", 100).await;
        assert_eq!(summary.len(), 100);

        let summary = service(None).summary("body", 500).await;
        assert_eq!(summary, "Summary generation failed.");
    }

    #[tokio::test]
    async fn objectives_parse_json_and_respect_the_count() {
        let reply = r#"["Explain ownership rules", "Apply borrowing in APIs", "Design trait objects"]"#;
        let objectives = service(Some(reply))
            .learning_objectives("Rust", CourseLevel::Beginner, 2)
            .await;
        assert_eq!(
            objectives,
            vec!["Explain ownership rules", "Apply borrowing in APIs"]
        );
    }

    #[tokio::test]
    async fn objectives_are_salvaged_from_loose_lines() {
        let reply = "Sure:\n\"Explain move semantics\",\n\"Use lifetimes correctly\"\n]";
        let objectives = service(Some(reply))
            .learning_objectives("Rust", CourseLevel::Intermediate, 5)
            .await;
        assert_eq!(
            objectives,
            vec!["Explain move semantics", "Use lifetimes correctly"]
        );
    }

    #[tokio::test]
    async fn objectives_fall_back_when_the_model_is_down() {
        let objectives = service(None)
            .learning_objectives("Macros", CourseLevel::Advanced, 3)
            .await;
        assert_eq!(objectives, vec!["Understand the basics of Macros"]);
    }

    #[tokio::test]
    async fn outline_without_sections_falls_back() {
        let outline = service(Some(r#"{"title": "Empty", "sections": []}"#))
            .outline("Traits", 3)
            .await;
        assert_eq!(outline, fallback_outline("Traits"));
        assert_eq!(outline.sections[0].title, "What is Traits?");

        let outline = service(Some(
            r#"{"title": "Traits", "description": "d", "sections": [{"title": "Basics", "subsections": ["impl blocks"]}]}"#,
        ))
        .outline("Traits", 1)
        .await;
        assert_eq!(outline.sections.len(), 1);
        assert_eq!(outline.sections[0].subsections, vec!["impl blocks"]);
    }
}
