//! # Pipeline Tests
//!
//! Drives `RagPipeline` end to end against scripted services, covering the
//! happy path and every pass-through route.

mod common;

use crate::common::{
    chunk, new_call_log, setup_tracing, CallLog, MockAiProvider, MockClassifier, MockEmbedder,
    MockVectorStore,
};
use docrag::{
    pipeline::{PipelineOptions, Stage},
    prompts::{CONTEXT_LABEL, HYPOTHETICAL_ANSWER_SYSTEM_PROMPT},
    Classification, ContentPart, Message, Outcome, ProviderError, RagPipeline, RequestContext,
    RetrievedChunk, Role, SkipReason,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// The scripted services behind one pipeline, kept around for assertions.
struct Harness {
    log: CallLog,
    classifier: Arc<MockClassifier>,
    generator: Arc<MockAiProvider>,
    embedder: Arc<MockEmbedder>,
    store: Arc<MockVectorStore>,
}

impl Harness {
    fn new(label: &str, chunks: Vec<RetrievedChunk>) -> Self {
        let log = new_call_log();
        Self {
            classifier: Arc::new(MockClassifier::new(label, log.clone())),
            generator: Arc::new(MockAiProvider::new("Section 3 covers X.", log.clone())),
            embedder: Arc::new(MockEmbedder::new(vec![0.1, 0.2, 0.3], log.clone())),
            store: Arc::new(MockVectorStore::new(chunks, log.clone())),
            log,
        }
    }

    fn pipeline(&self) -> RagPipeline {
        self.pipeline_with(PipelineOptions::default())
    }

    fn pipeline_with(&self, options: PipelineOptions) -> RagPipeline {
        RagPipeline::builder()
            .classifier(self.classifier.clone())
            .generator(self.generator.clone())
            .embedder(self.embedder.clone())
            .vector_store(self.store.clone())
            .options(options)
            .build()
            .expect("all services are set")
    }

    fn calls(&self) -> Vec<&'static str> {
        self.log.read().unwrap().clone()
    }
}

fn happy_chunks() -> Vec<RetrievedChunk> {
    vec![chunk("X is ...", 0.9), chunk("Y is ...", 0.8)]
}

fn question_context() -> RequestContext {
    RequestContext::for_chat(vec![Message::user("What does section 3 say?")], "abc")
}

#[tokio::test]
async fn test_happy_path_appends_label_and_chunks() {
    setup_tracing();
    let harness = Harness::new("question", happy_chunks());
    let input = question_context();

    let result = harness.pipeline().run(input.clone()).await;

    assert!(matches!(result.outcome, Outcome::Augmented { chunks: 2 }));
    assert_eq!(result.context.prompt.len(), 1);
    let last = &result.context.prompt[0];
    assert_eq!(last.role, Role::User);
    assert_eq!(
        last.content,
        vec![
            ContentPart::text("What does section 3 say?"),
            ContentPart::text(CONTEXT_LABEL),
            ContentPart::text("X is ..."),
            ContentPart::text("Y is ..."),
        ]
    );
    // Metadata travels with the request untouched.
    assert_eq!(result.context.provider_metadata, input.provider_metadata);
    assert_eq!(harness.calls(), vec!["classify", "generate", "embed", "retrieve"]);
}

#[tokio::test]
async fn test_hypothetical_answer_is_what_gets_embedded() {
    setup_tracing();
    let harness = Harness::new("question", happy_chunks());

    harness.pipeline().run(question_context()).await;

    let classify_calls = harness.classifier.calls.read().unwrap().clone();
    assert_eq!(classify_calls.len(), 1);
    assert_eq!(classify_calls[0].0, "What does section 3 say?");
    assert_eq!(classify_calls[0].1, vec!["question", "statement", "other"]);

    let generate_calls = harness.generator.call_history.read().unwrap().clone();
    assert_eq!(
        generate_calls,
        vec![(
            HYPOTHETICAL_ANSWER_SYSTEM_PROMPT.to_string(),
            "What does section 3 say?".to_string()
        )]
    );

    assert_eq!(
        *harness.embedder.inputs.read().unwrap(),
        vec!["Section 3 covers X.".to_string()]
    );

    let queries = harness.store.queries.read().unwrap().clone();
    assert_eq!(queries.len(), 1);
    let (vector, filter, threshold, limit) = &queries[0];
    assert_eq!(vector, &vec![0.1, 0.2, 0.3]);
    assert_eq!(filter.owner_id, "abc");
    assert!((threshold - 0.10).abs() < f32::EPSILON);
    assert_eq!(*limit, 10);
}

#[tokio::test]
async fn test_configured_threshold_and_count_reach_the_store() {
    setup_tracing();
    let harness = Harness::new("question", happy_chunks());
    let options = PipelineOptions {
        match_threshold: 0.5,
        match_count: 3,
        context_label: "Sources:".to_string(),
        ..Default::default()
    };

    let result = harness.pipeline_with(options).run(question_context()).await;

    let queries = harness.store.queries.read().unwrap().clone();
    assert!((queries[0].2 - 0.5).abs() < f32::EPSILON);
    assert_eq!(queries[0].3, 3);
    assert_eq!(
        result.context.prompt[0].content[1],
        ContentPart::text("Sources:")
    );
}

#[tokio::test]
async fn test_missing_metadata_passes_through_without_calls() {
    setup_tracing();
    let harness = Harness::new("question", happy_chunks());
    let input = RequestContext::new(vec![Message::user("hello")], json!({}));

    let result = harness.pipeline().run(input.clone()).await;

    assert!(matches!(
        result.outcome,
        Outcome::Passthrough(SkipReason::ValidationMiss)
    ));
    assert_eq!(result.context, input);
    assert!(harness.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_metadata_is_a_pass_through() {
    setup_tracing();
    let harness = Harness::new("question", happy_chunks());
    let pipeline = harness.pipeline();

    for metadata in [
        json!(null),
        json!({ "files": {} }),
        json!({ "files": { "chatId": 7 } }),
        json!({ "files": "abc" }),
        json!("abc"),
    ] {
        let input = RequestContext::new(vec![Message::user("What is X?")], metadata);
        assert_eq!(pipeline.transform(input.clone()).await, input);
    }
    assert!(harness.calls().is_empty());
}

#[tokio::test]
async fn test_last_message_must_be_from_the_user() {
    setup_tracing();
    let harness = Harness::new("question", happy_chunks());
    let pipeline = harness.pipeline();

    let empty = RequestContext::for_chat(Vec::new(), "abc");
    let result = pipeline.run(empty.clone()).await;
    assert!(matches!(
        result.outcome,
        Outcome::Passthrough(SkipReason::PreconditionMiss)
    ));
    assert_eq!(result.context, empty);

    let assistant_last = RequestContext::for_chat(
        vec![Message::user("What is X?"), Message::assistant("X is a thing.")],
        "abc",
    );
    let result = pipeline.run(assistant_last.clone()).await;
    assert!(matches!(
        result.outcome,
        Outcome::Passthrough(SkipReason::PreconditionMiss)
    ));
    assert_eq!(result.context, assistant_last);
    assert!(harness.calls().is_empty());
}

#[tokio::test]
async fn test_only_questions_are_augmented() {
    setup_tracing();
    for (label, expected) in [
        ("statement", Classification::Statement),
        ("other", Classification::Other),
    ] {
        let harness = Harness::new(label, happy_chunks());
        let input = question_context();

        let result = harness.pipeline().run(input.clone()).await;

        match result.outcome {
            Outcome::Passthrough(SkipReason::NotAQuestion(got)) => assert_eq!(got, expected),
            other => panic!("expected NotAQuestion, got {other:?}"),
        }
        assert_eq!(result.context, input);
        assert_eq!(harness.calls(), vec!["classify"]);
    }
}

#[tokio::test]
async fn test_unknown_label_is_an_upstream_failure() {
    setup_tracing();
    let harness = Harness::new("Question", happy_chunks());
    let input = question_context();

    let result = harness.pipeline().run(input.clone()).await;

    match result.outcome {
        Outcome::Passthrough(SkipReason::UpstreamFailure(err)) => {
            assert_eq!(err.stage, Stage::Classify);
            assert!(matches!(err.source, ProviderError::InvalidLabel { .. }));
        }
        other => panic!("expected UpstreamFailure, got {other:?}"),
    }
    assert_eq!(result.context, input);
    assert_eq!(harness.calls(), vec!["classify"]);
}

#[tokio::test]
async fn test_store_failure_restores_the_original_request() {
    setup_tracing();
    let mut harness = Harness::new("question", happy_chunks());
    let log = harness.log.clone();
    harness.store = Arc::new(MockVectorStore {
        fail: true,
        ..MockVectorStore::new(Vec::new(), log)
    });
    let input = RequestContext::for_chat(
        vec![
            Message::user("hi"),
            Message::assistant("hello"),
            Message::new(
                Role::User,
                vec![
                    ContentPart::Other(json!({ "type": "image", "image": "data:..." })),
                    ContentPart::text("What is in section 3?"),
                ],
            ),
        ],
        "abc",
    );

    let result = harness.pipeline().run(input.clone()).await;

    match &result.outcome {
        Outcome::Passthrough(SkipReason::UpstreamFailure(err)) => {
            assert_eq!(err.stage, Stage::Retrieve)
        }
        other => panic!("expected UpstreamFailure, got {other:?}"),
    }
    assert_eq!(result.context, input);
    assert_eq!(harness.calls(), vec!["classify", "generate", "embed", "retrieve"]);
}

#[tokio::test]
async fn test_each_failing_stage_is_a_pass_through() {
    setup_tracing();

    let harness = Harness::new("question", happy_chunks());
    let log = harness.log.clone();
    let harness = Harness {
        classifier: Arc::new(MockClassifier {
            fail: true,
            ..MockClassifier::new("question", log)
        }),
        ..harness
    };
    let result = harness.pipeline().run(question_context()).await;
    assert!(matches!(
        &result.outcome,
        Outcome::Passthrough(SkipReason::UpstreamFailure(e)) if e.stage == Stage::Classify
    ));
    assert_eq!(result.context, question_context());

    let harness = Harness::new("question", happy_chunks());
    let log = harness.log.clone();
    let harness = Harness {
        generator: Arc::new(MockAiProvider {
            fail: true,
            ..MockAiProvider::new("unused", log)
        }),
        ..harness
    };
    let result = harness.pipeline().run(question_context()).await;
    assert!(matches!(
        &result.outcome,
        Outcome::Passthrough(SkipReason::UpstreamFailure(e)) if e.stage == Stage::Generate
    ));
    assert_eq!(result.context, question_context());
    assert_eq!(harness.calls(), vec!["classify", "generate"]);

    let harness = Harness::new("question", happy_chunks());
    let log = harness.log.clone();
    let harness = Harness {
        embedder: Arc::new(MockEmbedder {
            fail: true,
            ..MockEmbedder::new(Vec::new(), log)
        }),
        ..harness
    };
    let result = harness.pipeline().run(question_context()).await;
    assert!(matches!(
        &result.outcome,
        Outcome::Passthrough(SkipReason::UpstreamFailure(e)) if e.stage == Stage::Embed
    ));
    assert_eq!(result.context, question_context());
    assert_eq!(harness.calls(), vec!["classify", "generate", "embed"]);
}

#[tokio::test]
async fn test_empty_embedding_is_rejected() {
    setup_tracing();
    let harness = Harness::new("question", happy_chunks());
    let log = harness.log.clone();
    let harness = Harness {
        embedder: Arc::new(MockEmbedder::new(Vec::new(), log)),
        ..harness
    };

    let result = harness.pipeline().run(question_context()).await;

    match result.outcome {
        Outcome::Passthrough(SkipReason::UpstreamFailure(err)) => {
            assert_eq!(err.stage, Stage::Embed);
            assert!(matches!(err.source, ProviderError::MalformedEmbedding(_)));
        }
        other => panic!("expected UpstreamFailure, got {other:?}"),
    }
    assert_eq!(harness.calls(), vec!["classify", "generate", "embed"]);
}

#[tokio::test]
async fn test_slow_classifier_times_out() {
    setup_tracing();
    let harness = Harness::new("question", happy_chunks());
    let log = harness.log.clone();
    let harness = Harness {
        classifier: Arc::new(MockClassifier {
            delay: Some(Duration::from_secs(5)),
            ..MockClassifier::new("question", log)
        }),
        ..harness
    };
    let options = PipelineOptions {
        call_timeout: Duration::from_millis(50),
        ..Default::default()
    };

    let result = harness.pipeline_with(options).run(question_context()).await;

    match result.outcome {
        Outcome::Passthrough(SkipReason::UpstreamFailure(err)) => {
            assert_eq!(err.stage, Stage::Classify);
            assert!(matches!(err.source, ProviderError::Timeout(_)));
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert_eq!(result.context, question_context());
}

#[tokio::test]
async fn test_no_matches_still_adds_the_label() {
    setup_tracing();
    let harness = Harness::new("question", Vec::new());

    let result = harness.pipeline().run(question_context()).await;

    assert!(matches!(result.outcome, Outcome::Augmented { chunks: 0 }));
    assert_eq!(
        result.context.prompt[0].content,
        vec![
            ContentPart::text("What does section 3 say?"),
            ContentPart::text(CONTEXT_LABEL),
        ]
    );
}

#[tokio::test]
async fn test_history_and_extra_fields_are_preserved() {
    setup_tracing();
    let harness = Harness::new("question", happy_chunks());
    let mut input = RequestContext::for_chat(
        vec![
            Message::user("Summarise the report."),
            Message::assistant("It covers three sections."),
            Message::user("What does section 3 say?"),
        ],
        "abc",
    );
    input
        .extra
        .insert("temperature".to_string(), json!(0.2));

    let result = harness.pipeline().run(input.clone()).await;

    assert!(result.outcome.is_augmented());
    assert_eq!(result.context.prompt[..2], input.prompt[..2]);
    assert_eq!(result.context.extra, input.extra);
    // Only the question text is classified, not the history.
    assert_eq!(
        harness.classifier.calls.read().unwrap()[0].0,
        "What does section 3 say?"
    );
}

#[tokio::test]
async fn test_multi_part_question_is_joined_for_classification() {
    setup_tracing();
    let harness = Harness::new("question", happy_chunks());
    let input = RequestContext::for_chat(
        vec![Message::new(
            Role::User,
            vec![
                ContentPart::text("Looking at the attached report:"),
                ContentPart::Other(json!({ "type": "file", "data": "..." })),
                ContentPart::text("what does section 3 say?"),
            ],
        )],
        "abc",
    );

    let result = harness.pipeline().run(input).await;

    assert_eq!(
        harness.classifier.calls.read().unwrap()[0].0,
        "Looking at the attached report:\nwhat does section 3 say?"
    );
    assert_eq!(result.context.prompt[0].content.len(), 3 + 1 + 2);
}
