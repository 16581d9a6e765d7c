//! End-to-end orchestration scenarios with scripted models.
//!
//! Coordinator → DelegationTool → SpecialistAgent → registry tools.

use serde_json::json;
use std::sync::Arc;

use bouncer_controller::{CollectingObserver, CompositeObserver, SessionBuilder, TeamSession};
use bouncer_core::events::RunEventKind;
use bouncer_core::mocks::{MockLlm, MockReply, RecordingTool};
use bouncer_core::traits::{ChatRequest, ToolRegistry};
use bouncer_core::types::AgentSpec;
use bouncer_skills::DefaultToolRegistry;

fn system_prompt(request: &ChatRequest) -> &str {
    request
        .messages
        .first()
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}

/// Researcher searches once then reports; Writer answers directly.
fn specialist_model() -> MockLlm {
    MockLlm::with_responder(|request| {
        let last = request.messages.last().map(|m| m.role.as_str());
        if system_prompt(request).contains("named 'Researcher'") {
            if last == Some("tool") {
                MockReply::text("FINAL ANSWER: Notes: Rust 1.0 shipped in 2015.")
            } else {
                MockReply::call("web_search", json!({"query": "rust release history"}))
            }
        } else {
            MockReply::text("Rust reached 1.0 in 2015, after years of iteration.")
        }
    })
}

/// Researcher gets web_search; everyone else gets write_to_file.
fn selection_model() -> MockLlm {
    MockLlm::with_responder(|request| {
        if system_prompt(request).contains("named 'Researcher'") {
            MockReply::text(r#"{"tools": ["web_search"]}"#)
        } else {
            MockReply::text("```json\n{\"tools\": [\"write_to_file\", \"teleport\"]}\n```")
        }
    })
}

async fn researcher_writer_session(coordinator: Arc<MockLlm>, specialists: Arc<MockLlm>) -> TeamSession {
    let registry = Arc::new(DefaultToolRegistry::new());
    registry
        .register(Box::new(RecordingTool::new("web_search", "Searches the web")))
        .await
        .unwrap();
    registry
        .register(Box::new(RecordingTool::new("write_to_file", "Writes a file")))
        .await
        .unwrap();

    let session = SessionBuilder::new()
        .with_registry(registry)
        .with_coordinator_llm(coordinator)
        .with_specialist_llm(specialists)
        .with_selection_llm(Arc::new(selection_model()))
        .build()
        .unwrap();

    session
        .create_team(vec![
            AgentSpec::new("Researcher", "Finds facts", "Search the web and summarize findings."),
            AgentSpec::new("Writer", "Writes reports", "Turn notes into a clear report."),
        ])
        .await
        .unwrap();
    session
}

#[tokio::test]
async fn test_researcher_writer_scenario() {
    let coordinator = Arc::new(MockLlm::new(vec![
        MockReply::delegate("Researcher", "Collect facts about Rust's history"),
        MockReply::delegate("Writer", "Write a short report from these notes"),
        MockReply::text("FINAL ANSWER: Rust reached 1.0 in 2015."),
    ]));
    let specialists = Arc::new(specialist_model());
    let session = researcher_writer_session(coordinator.clone(), specialists.clone()).await;

    assert_eq!(session.agents()[0].tool_names(), vec!["web_search"]);
    assert_eq!(session.agents()[1].tool_names(), vec!["write_to_file"]);

    let observer = CollectingObserver::new();
    let answer = session
        .run("Write a short report on Rust's history", &observer)
        .await
        .unwrap();
    assert_eq!(answer, "Rust reached 1.0 in 2015.");

    let summary: Vec<(&'static str, Option<String>)> = observer
        .events()
        .iter()
        .map(|event| {
            let kind = match &event.kind {
                RunEventKind::DelegationStarted { .. } => "started",
                RunEventKind::DelegationEnded { success: true, .. } => "ended",
                RunEventKind::DelegationEnded { .. } => "failed",
                RunEventKind::FinalAnswer { .. } => "final",
            };
            (kind, event.tool_name().map(str::to_string))
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("started", Some("Researcher".to_string())),
            ("ended", Some("Researcher".to_string())),
            ("started", Some("Writer".to_string())),
            ("ended", Some("Writer".to_string())),
            ("final", None),
        ]
    );

    // The researcher's output reached the coordinator as a tool message.
    let requests = coordinator.requests();
    assert_eq!(requests.len(), 3);
    let observation = requests[1].messages.last().unwrap();
    assert_eq!(observation.role, "tool");
    assert!(observation.content.contains("Rust 1.0 shipped in 2015"));

    // The researcher saw its own search result.
    assert!(specialists
        .requests()
        .iter()
        .any(|r| r.messages.iter().any(|m| m.content.contains("web_search handled"))));
}

#[tokio::test]
async fn test_delegation_failure_does_not_abort_run() {
    let coordinator = Arc::new(MockLlm::new(vec![
        MockReply::delegate("Researcher", "Collect facts"),
        MockReply::call("Writer", json!({"topic": "no task key"})),
        MockReply::text("FINAL ANSWER: Partial report."),
    ]));
    let specialists = Arc::new(MockLlm::new(vec![MockReply::ModelError("rate limited".into())]));
    let session = researcher_writer_session(coordinator, specialists).await;

    let collected = Arc::new(CollectingObserver::new());
    let observer = CompositeObserver::default().with(collected.clone());
    let answer = session.run("Report", &observer).await.unwrap();
    assert_eq!(answer, "Partial report.");

    let ended: Vec<(String, bool)> = collected
        .kinds()
        .into_iter()
        .filter_map(|kind| match kind {
            RunEventKind::DelegationEnded { output, success, .. } => Some((output, success)),
            _ => None,
        })
        .collect();
    assert_eq!(ended.len(), 2);
    assert!(ended.iter().all(|(output, success)| output.contains("Error") && !success));
    assert!(ended[0].0.contains("rate limited"));
    assert!(ended[1].0.contains("task"));
}

#[tokio::test]
async fn test_zero_delegation_run_emits_one_final_answer() {
    let coordinator = Arc::new(MockLlm::new(vec![MockReply::text("Hello there.")]));
    let session = researcher_writer_session(coordinator, Arc::new(specialist_model())).await;

    let observer = CollectingObserver::new();
    let answer = session.run("Say hello", &observer).await.unwrap();

    assert_eq!(answer, "Hello there.");
    let events = observer.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_final());
}
