//! Orchestrator: the coordinator's plan, delegate, synthesize loop.
//!
//! One run:
//! 1. Planning: the coordinator sees the goal and the delegation tools
//! 2. Delegating: each requested call runs a specialist
//! 3. Synthesizing: outputs go back to the coordinator as tool messages
//! 4. Terminal: the first final text ends the run
//!
//! Delegation failures are converted into `Error: ...` outputs so the
//! coordinator can recover. Only coordinator model failures, authentication
//! failures, the turn limit and cancellation end a run with `Err`.

use futures::future::join_all;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use bouncer_core::{
    events::{RunEvent, RunEventKind},
    traits::{ChatMessage, ChatRequest, LlmClient, LlmResponse, RunObserver},
    types::ToolCall,
    Error, Result,
};

use crate::coordinator::CoordinatorAgent;
use crate::limits::RunLimits;
use crate::observer::notify;
use crate::parser::{ParsedReply, ResponseParser};

/// Numbers and delivers the events of one run.
struct EventSink<'a> {
    run_id: String,
    next_sequence: u64,
    observer: &'a dyn RunObserver,
}

impl<'a> EventSink<'a> {
    fn new(run_id: String, observer: &'a dyn RunObserver) -> Self {
        Self {
            run_id,
            next_sequence: 0,
            observer,
        }
    }

    async fn emit(&mut self, kind: RunEventKind) {
        let event = RunEvent::new(&self.run_id, self.next_sequence, kind);
        self.next_sequence += 1;
        notify(self.observer, &event).await;
    }

    async fn started(&mut self, call: &ToolCall) {
        self.emit(RunEventKind::DelegationStarted {
            tool_name: call.name.clone(),
            args: call.arguments.clone(),
        })
        .await;
    }

    async fn ended(&mut self, call: &ToolCall, outcome: &Outcome) {
        self.emit(RunEventKind::DelegationEnded {
            tool_name: call.name.clone(),
            output: outcome.output.clone(),
            success: outcome.success,
        })
        .await;
    }
}

/// Result of one delegation as the coordinator will see it.
struct Outcome {
    output: String,
    success: bool,
    cancelled: bool,
}

impl Outcome {
    fn succeeded(output: String) -> Self {
        Self {
            output,
            success: true,
            cancelled: false,
        }
    }

    fn failed(output: String) -> Self {
        Self {
            output,
            success: false,
            cancelled: false,
        }
    }

    fn cancelled() -> Self {
        Self {
            output: "Error: run cancelled".to_string(),
            success: false,
            cancelled: true,
        }
    }
}

/// Runs goals against a coordinator.
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    limits: RunLimits,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, limits: RunLimits) -> Self {
        Self { llm, limits }
    }

    pub fn limits(&self) -> &RunLimits {
        &self.limits
    }

    /// Drive `coordinator` until it produces a final answer for `goal`.
    pub async fn run(
        &self,
        coordinator: &CoordinatorAgent,
        goal: &str,
        observer: &dyn RunObserver,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(Error::invalid_request("goal must not be empty"));
        }

        let run_id = Uuid::new_v4().to_string();
        let mut sink = EventSink::new(run_id.clone(), observer);
        tracing::info!(
            run_id = %run_id,
            members = coordinator.roster().len(),
            goal_len = goal.len(),
            parallel = self.limits.parallel_delegations,
            "Run started"
        );

        let tools = coordinator.tool_definitions();
        let mut messages = vec![
            ChatMessage::system(coordinator.system_prompt()),
            ChatMessage::user(goal),
        ];
        let mut delegations = 0usize;

        for turn in 1..=self.limits.max_coordinator_turns {
            if cancel.is_cancelled() {
                tracing::info!(run_id = %run_id, turn, "Run cancelled");
                return Err(Error::Cancelled);
            }

            let request = ChatRequest::new(messages.clone()).with_tools(tools.clone());
            let response = match self.call_coordinator(&request, cancel).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(run_id = %run_id, turn, error = %e, "Coordinator call failed");
                    return Err(e);
                }
            };

            match ResponseParser::parse(&response) {
                ParsedReply::Final(text) => {
                    if delegations == 0 {
                        tracing::warn!(run_id = %run_id, "Coordinator answered without delegating");
                    }
                    sink.emit(RunEventKind::FinalAnswer { text: text.clone() }).await;
                    tracing::info!(
                        run_id = %run_id,
                        turns = turn,
                        delegations,
                        answer_len = text.len(),
                        "Run finished"
                    );
                    return Ok(text);
                }
                ParsedReply::ToolCalls(calls) => {
                    tracing::debug!(run_id = %run_id, turn, calls = calls.len(), "Coordinator requested delegations");
                    messages.push(ChatMessage::assistant_with_calls(
                        response.content.clone(),
                        calls.clone(),
                    ));

                    let outputs = if self.limits.parallel_delegations && calls.len() > 1 {
                        self.delegate_parallel(coordinator, &calls, &mut sink, cancel).await?
                    } else {
                        self.delegate_sequential(coordinator, &calls, &mut sink, cancel).await?
                    };
                    delegations += calls.len();

                    for (call, output) in calls.iter().zip(outputs) {
                        messages.push(ChatMessage::tool_result(call, output));
                    }
                }
            }
        }

        tracing::warn!(run_id = %run_id, limit = self.limits.max_coordinator_turns, "Coordinator turn limit reached");
        Err(Error::MaxTurnsExceeded(self.limits.max_coordinator_turns))
    }

    async fn call_coordinator(&self, request: &ChatRequest, cancel: &CancellationToken) -> Result<LlmResponse> {
        let timeout = self.limits.model_timeout;
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = tokio::time::timeout(timeout, self.llm.chat(request)) => match result {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) if e.is_authentication() => Err(e),
                Ok(Err(e)) => Err(Error::coordinator_model(e.to_string())),
                Err(_) => Err(Error::coordinator_model(format!(
                    "timed out after {}s",
                    timeout.as_secs_f32()
                ))),
            },
        }
    }

    async fn delegate_sequential(
        &self,
        coordinator: &CoordinatorAgent,
        calls: &[ToolCall],
        sink: &mut EventSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            sink.started(call).await;
            let outcome = self.delegate(coordinator, call, cancel).await;
            sink.ended(call, &outcome).await;
            if outcome.cancelled {
                return Err(Error::Cancelled);
            }
            outputs.push(outcome.output);
        }
        Ok(outputs)
    }

    async fn delegate_parallel(
        &self,
        coordinator: &CoordinatorAgent,
        calls: &[ToolCall],
        sink: &mut EventSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        for call in calls {
            sink.started(call).await;
        }

        let outcomes = join_all(calls.iter().map(|call| self.delegate(coordinator, call, cancel))).await;

        for (call, outcome) in calls.iter().zip(&outcomes) {
            sink.ended(call, outcome).await;
        }
        if outcomes.iter().any(|o| o.cancelled) {
            return Err(Error::Cancelled);
        }
        Ok(outcomes.into_iter().map(|o| o.output).collect())
    }

    /// Run one delegation; never fails, cancellation is flagged on the outcome.
    async fn delegate(&self, coordinator: &CoordinatorAgent, call: &ToolCall, cancel: &CancellationToken) -> Outcome {
        let Some(tool) = coordinator.tool(&call.name) else {
            tracing::warn!(tool = %call.name, "Unknown team member requested");
            return Outcome::failed(format!(
                "Error: no team member named '{}'. Available team members: {}",
                call.name,
                coordinator.tool_names().join(", ")
            ));
        };

        let started = Instant::now();
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = tool.invoke(&call.arguments, cancel) => result,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(answer) => {
                tracing::info!(tool = %call.name, elapsed_ms, output_len = answer.len(), "Delegation succeeded");
                Outcome::succeeded(answer)
            }
            Err(Error::Cancelled) => Outcome::cancelled(),
            Err(e) => {
                tracing::warn!(tool = %call.name, elapsed_ms, error = %e, "Delegation failed");
                Outcome::failed(format!("Error: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::build_coordinator;
    use crate::observer::CollectingObserver;
    use crate::prompts::specialist_system_prompt;
    use crate::specialist::SpecialistAgent;
    use async_trait::async_trait;
    use bouncer_core::mocks::{MockLlm, MockReply};
    use bouncer_core::traits::NoOpObserver;
    use bouncer_core::types::AgentSpec;
    use serde_json::json;
    use std::time::Duration;

    /// Replies after a fixed delay.
    struct SlowLlm {
        delay: Duration,
        reply: &'static str,
    }

    #[async_trait]
    impl LlmClient for SlowLlm {
        async fn complete(&self, _prompt: &str) -> Result<LlmResponse> {
            tokio::time::sleep(self.delay).await;
            Ok(LlmResponse::text(self.reply))
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<LlmResponse> {
            tokio::time::sleep(self.delay).await;
            Ok(LlmResponse::text(self.reply))
        }
    }

    fn member(name: &str, llm: Arc<dyn LlmClient>) -> Arc<SpecialistAgent> {
        let spec = AgentSpec::new(name, format!("{} role", name), "Do the work.");
        let prompt = specialist_system_prompt(&spec);
        Arc::new(SpecialistAgent::new(spec, prompt, vec![], llm, RunLimits::default()))
    }

    fn coordinator(members: Vec<Arc<SpecialistAgent>>) -> CoordinatorAgent {
        build_coordinator(&members, Duration::from_secs(60))
    }

    fn scripted(replies: Vec<MockReply>, limits: RunLimits) -> (Orchestrator, Arc<MockLlm>) {
        let llm = Arc::new(MockLlm::new(replies));
        (Orchestrator::new(llm.clone(), limits), llm)
    }

    #[tokio::test]
    async fn test_direct_answer_emits_single_final() {
        let team = coordinator(vec![member("Writer", Arc::new(MockLlm::constant("x")))]);
        let (orchestrator, llm) = scripted(vec![MockReply::text("42")], RunLimits::default());
        let observer = CollectingObserver::new();

        let answer = orchestrator
            .run(&team, "What is 6*7?", &observer, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(answer, "42");
        assert_eq!(observer.kinds(), vec![RunEventKind::FinalAnswer { text: "42".into() }]);

        let requests = llm.requests();
        assert_eq!(requests[0].messages[1].content, "What is 6*7?");
        assert_eq!(requests[0].tools[0].name, "Writer");
    }

    #[tokio::test]
    async fn test_failed_delegation_is_reported_and_run_continues() {
        let failing = Arc::new(MockLlm::new(vec![MockReply::ModelError("quota".into())]));
        let team = coordinator(vec![member("Researcher", failing)]);
        let (orchestrator, llm) = scripted(
            vec![
                MockReply::delegate("Researcher", "Find facts"),
                MockReply::text("FINAL ANSWER: Best effort."),
            ],
            RunLimits::default(),
        );
        let observer = CollectingObserver::new();

        let answer = orchestrator
            .run(&team, "Report", &observer, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "Best effort.");

        let kinds = observer.kinds();
        assert_eq!(kinds.len(), 3);
        match &kinds[1] {
            RunEventKind::DelegationEnded { output, success, .. } => {
                assert!(output.starts_with("Error:"));
                assert!(output.contains("quota"));
                assert!(!success);
            }
            other => panic!("expected DelegationEnded, got {:?}", other),
        }

        let requests = llm.requests();
        let tool_message = requests[1].messages.last().unwrap();
        assert_eq!(tool_message.role, "tool");
        assert!(tool_message.content.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_unknown_delegate_still_emits_events() {
        let team = coordinator(vec![member("Writer", Arc::new(MockLlm::constant("x")))]);
        let (orchestrator, _) = scripted(
            vec![MockReply::delegate("Editor", "Polish"), MockReply::text("done")],
            RunLimits::default(),
        );
        let observer = CollectingObserver::new();

        orchestrator
            .run(&team, "Goal", &observer, &CancellationToken::new())
            .await
            .unwrap();

        let events = observer.events();
        assert_eq!(events[0].tool_name(), Some("Editor"));
        assert!(matches!(
            &events[1].kind,
            RunEventKind::DelegationEnded { output, success: false, .. } if output.contains("Available team members: Writer")
        ));
        let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert!(events.iter().all(|e| e.run_id == events[0].run_id));
    }

    #[tokio::test]
    async fn test_coordinator_errors_are_fatal() {
        let team = coordinator(vec![member("Writer", Arc::new(MockLlm::constant("x")))]);

        let (orchestrator, _) = scripted(vec![MockReply::ModelError("500".into())], RunLimits::default());
        let result = orchestrator
            .run(&team, "Goal", &NoOpObserver, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(Error::CoordinatorModel(_))));

        let (orchestrator, _) = scripted(vec![MockReply::AuthError("bad key".into())], RunLimits::default());
        let result = orchestrator
            .run(&team, "Goal", &NoOpObserver, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(Error::Authentication(_))));
    }

    #[tokio::test]
    async fn test_turn_limit() {
        let team = coordinator(vec![member("Writer", Arc::new(MockLlm::constant("x")))]);
        let llm = Arc::new(MockLlm::with_responder(|_| MockReply::delegate("Writer", "again")));
        let orchestrator = Orchestrator::new(
            llm,
            RunLimits {
                max_coordinator_turns: 2,
                ..Default::default()
            },
        );
        let observer = CollectingObserver::new();

        let result = orchestrator
            .run(&team, "Goal", &observer, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(Error::MaxTurnsExceeded(2))));
        assert_eq!(observer.events().len(), 4);
        assert!(!observer.events().iter().any(|e| e.is_final()));
    }

    #[tokio::test]
    async fn test_empty_goal_rejected() {
        let team = coordinator(vec![]);
        let (orchestrator, llm) = scripted(vec![], RunLimits::default());
        let result = orchestrator
            .run(&team, "  ", &NoOpObserver, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_delegations_keep_request_order() {
        let team = coordinator(vec![
            member("Slow", Arc::new(SlowLlm { delay: Duration::from_millis(300), reply: "slow done" })),
            member("Fast", Arc::new(SlowLlm { delay: Duration::from_millis(100), reply: "fast done" })),
        ]);
        let (orchestrator, _) = scripted(
            vec![
                MockReply::ToolCalls(vec![
                    ToolCall::new("Slow", json!({"task": "a"})),
                    ToolCall::new("Fast", json!({"task": "b"})),
                ]),
                MockReply::text("combined"),
            ],
            RunLimits {
                parallel_delegations: true,
                ..Default::default()
            },
        );
        let observer = CollectingObserver::new();

        let started = Instant::now();
        orchestrator
            .run(&team, "Goal", &observer, &CancellationToken::new())
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(400));

        let summary: Vec<(bool, Option<String>)> = observer
            .events()
            .iter()
            .map(|e| {
                (
                    matches!(e.kind, RunEventKind::DelegationStarted { .. }),
                    e.tool_name().map(str::to_string),
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                (true, Some("Slow".into())),
                (true, Some("Fast".into())),
                (false, Some("Slow".into())),
                (false, Some("Fast".into())),
                (false, None),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_mid_delegation() {
        let team = coordinator(vec![member("Writer", Arc::new(MockLlm::new(vec![MockReply::Hang])))]);
        let (orchestrator, _) = scripted(vec![MockReply::delegate("Writer", "Draft")], RunLimits::default());
        let observer = CollectingObserver::new();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = orchestrator.run(&team, "Goal", &observer, &cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));

        let kinds = observer.kinds();
        assert_eq!(kinds.len(), 2);
        assert!(matches!(&kinds[1], RunEventKind::DelegationEnded { success: false, .. }));
    }
}
