//! Chat-driven team authoring.
//!
//! TeamDesigner → TeamSession::create_team → TeamDesigner::edit →
//! TeamSession::update_agent, with scripted models.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use bouncer_controller::{
    create_team_arguments, DesignReply, EditReply, SessionBuilder, TeamDesigner,
};
use bouncer_core::mocks::{MockLlm, MockReply};
use bouncer_core::traits::ChatMessage;
use bouncer_core::types::AgentSpec;
use bouncer_skills::DefaultToolRegistry;

fn designed_team() -> Vec<AgentSpec> {
    vec![
        AgentSpec::new(
            "Market Analyst",
            "Sizes the market",
            "- estimate demand\n- compare competitors\n- deliver a sizing table",
        ),
        AgentSpec::new(
            "Red Teamer",
            "Challenges assumptions",
            "- attack the plan\n- look for blind spots\n- deliver a risk list",
        ),
    ]
}

#[tokio::test]
async fn test_design_then_edit_a_member() {
    let designer_llm = Arc::new(MockLlm::new(vec![
        MockReply::text("Which market are you entering?"),
        MockReply::call("create_team", create_team_arguments(&designed_team())),
        MockReply::call(
            "update_agent_details",
            json!({
                "index": 1,
                "name": "Ethics Auditor",
                "role": "Checks fairness and harm",
                "description": "- review impact\n- flag bias\n- deliver findings"
            }),
        ),
    ]));
    let designer = TeamDesigner::new(designer_llm.clone(), Duration::from_secs(30));

    // Round one: a clarifying question.
    let mut conversation = vec![ChatMessage::user("Plan a product launch")];
    let question = match designer.design(&conversation).await.unwrap() {
        DesignReply::Message(question) => question,
        other => panic!("expected a question, got {:?}", other),
    };
    conversation.push(ChatMessage::assistant(question));
    conversation.push(ChatMessage::user("Electric bikes in Europe"));

    // Round two: the team.
    let specs = match designer.design(&conversation).await.unwrap() {
        DesignReply::Team(specs) => specs,
        other => panic!("expected a team, got {:?}", other),
    };
    // System prompt plus the three chat turns.
    let requests = designer_llm.requests();
    assert_eq!(requests[1].messages.len(), 4);

    let session = SessionBuilder::new()
        .with_registry(Arc::new(DefaultToolRegistry::new()))
        .with_llm(Arc::new(MockLlm::constant("FINAL ANSWER: ok")))
        .build()
        .unwrap();
    session.create_team(specs).await.unwrap();
    let first = session.agents()[0].clone();

    // Edit the Red Teamer through chat and apply it.
    let patch = match designer
        .edit(&session.specs(), 1, &[ChatMessage::user("Focus on ethics instead")])
        .await
        .unwrap()
    {
        EditReply::Patch(patch) => patch,
        other => panic!("expected a patch, got {:?}", other),
    };
    session.update_agent(patch).await.unwrap();

    let roster = session.roster();
    assert_eq!(roster[0].name, "Market_Analyst");
    assert_eq!(roster[1].name, "Ethics_Auditor");
    assert_eq!(roster[1].role, "Checks fairness and harm");
    assert!(Arc::ptr_eq(&first, &session.agents()[0]));
}
