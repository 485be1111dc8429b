use axum::http::StatusCode;
use serde_json::json;

mod common;

use common::create_test_app;

#[tokio::test]
async fn learners_cannot_generate_content() {
    let app = create_test_app();

    for (uri, body) in [
        (
            "/api/v1/content-generation/quiz-questions",
            json!({"topic": "Ownership", "difficulty": "easy"}),
        ),
        (
            "/api/v1/content-generation/content-summary",
            json!({"content_text": "Ownership moves values."}),
        ),
        (
            "/api/v1/content-generation/learning-objectives",
            json!({"topic": "Ownership", "difficulty": "beginner"}),
        ),
        (
            "/api/v1/content-generation/content-outline",
            json!({"topic": "Ownership"}),
        ),
    ] {
        let (status, response) = app.request("POST", uri, Some("learner-1"), Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(response["detail"], "Not enough permissions");
    }
    assert_eq!(app.completion.calls(), 0);
}

#[tokio::test]
async fn role_is_checked_before_the_body_is_validated() {
    let app = create_test_app();

    let (status, _) = app
        .request(
            "POST",
            "/api/v1/content-generation/quiz-questions",
            Some("learner-1"),
            Some(json!({"topic": "Ownership", "difficulty": "easy", "num_questions": 99})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn instructor_receives_generated_questions() {
    let app = create_test_app();
    app.completion.reply_when(
        "quiz questions about Ownership",
        r#"[{"text": "Who owns a moved value?", "type": "multiple-choice",
             "options": [{"id": "a", "text": "The receiver"}, {"id": "b", "text": "Nobody"}],
             "correct_answer": {"id": "a"}}]"#,
    );

    let (status, body) = app
        .request_as(
            "POST",
            "/api/v1/content-generation/quiz-questions",
            "instructor-1",
            "instructor",
            Some(json!({"topic": "Ownership", "difficulty": "medium", "num_questions": 3})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let questions = body.as_array().unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0]["text"], "Who owns a moved value?");
    assert_eq!(questions[0]["topic"], "Ownership");
    assert_eq!(questions[0]["difficulty"], "medium");
}

#[tokio::test]
async fn admin_gets_a_fallback_question_when_the_model_is_down() {
    let app = create_test_app();

    let (status, body) = app
        .request_as(
            "POST",
            "/api/v1/content-generation/quiz-questions",
            "admin-1",
            "admin",
            Some(json!({"topic": "Traits", "difficulty": "hard"})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["text"], "What is Traits?");
    assert_eq!(body[0]["correct_answer"], json!({"id": "a"}));
}

#[tokio::test]
async fn quiz_request_is_validated() {
    let app = create_test_app();
    let uri = "/api/v1/content-generation/quiz-questions";

    let (status, body) = app
        .request_as(
            "POST",
            uri,
            "instructor-1",
            "instructor",
            Some(json!({"topic": "Ownership", "difficulty": "extreme"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("extreme"));

    for count in [0, 21] {
        let (status, body) = app
            .request_as(
                "POST",
                uri,
                "instructor-1",
                "instructor",
                Some(json!({"topic": "Ownership", "difficulty": "easy", "num_questions": count})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Number of questions must be between 1 and 20");
    }

    let (status, body) = app
        .request_as(
            "POST",
            uri,
            "instructor-1",
            "instructor",
            Some(json!({"topic": "", "difficulty": "easy"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Topic is required");
    assert_eq!(app.completion.calls(), 0);
}

#[tokio::test]
async fn summary_objectives_and_outline_for_instructors() {
    let app = create_test_app();
    app.completion
        .reply_when("Summarize the following", "  Values have exactly one owner.  ");
    app.completion.reply_when(
        "learning objectives for a beginner level course on Ownership",
        r#"["Explain the move rules", "Predict when a value is dropped"]"#,
    );

    let (status, body) = app
        .request_as(
            "POST",
            "/api/v1/content-generation/content-summary",
            "instructor-1",
            "instructor",
            Some(json!({"content_text": "Each value in Rust has an owner."})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"summary": "Values have exactly one owner."}));

    let (status, body) = app
        .request_as(
            "POST",
            "/api/v1/content-generation/learning-objectives",
            "instructor-1",
            "instructor",
            Some(json!({"topic": "Ownership", "difficulty": "beginner", "num_objectives": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"objectives": ["Explain the move rules"]}));

    let (status, body) = app
        .request_as(
            "POST",
            "/api/v1/content-generation/content-outline",
            "instructor-1",
            "instructor",
            Some(json!({"topic": "Ownership", "num_sections": 2})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Introduction to Ownership");
    assert_eq!(body["sections"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn authoring_bounds_are_enforced() {
    let app = create_test_app();

    for (uri, body, detail) in [
        (
            "/api/v1/content-generation/content-summary",
            json!({"content_text": "text", "max_length": 99}),
            "Max length must be between 100 and 2000 characters",
        ),
        (
            "/api/v1/content-generation/content-summary",
            json!({"content_text": ""}),
            "Content text is required",
        ),
        (
            "/api/v1/content-generation/learning-objectives",
            json!({"topic": "Ownership", "difficulty": "beginner", "num_objectives": 11}),
            "Number of objectives must be between 1 and 10",
        ),
        (
            "/api/v1/content-generation/content-outline",
            json!({"topic": "Ownership", "num_sections": 0}),
            "Number of sections must be between 1 and 10",
        ),
    ] {
        let (status, response) = app
            .request_as("POST", uri, "admin-1", "admin", Some(body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(response["detail"], detail);
    }
}
