//! End-to-end turn loop tests with mock services.
//!
//! Evaluation weights are set to urgency only and the starvation weight to
//! zero where exact scores matter, so a mock urgency rating `u` gives a
//! comparison score of `(u - 1) / 4`.

use std::sync::Arc;
use std::time::Duration;

use thoughtful_agent::{
    Agent, AgentConfig, AgentSettings, ConversationConfig, ConversationLoop, EngagementConfig,
    EngagementState, EvaluationWeights, Human, Participant, ScriptedInput, Services, ThoughtConfig,
    ThoughtStatus,
};
use thoughtful_llm::{MockBackend, MockEmbedder, SharedEmbedder};
use thoughtful_types::{SequentialIds, SharedIdGenerator};

const DIMS: usize = 16;

struct Harness {
    embedder: SharedEmbedder,
    ids: SharedIdGenerator,
}

impl Harness {
    fn new() -> Self {
        Self {
            embedder: Arc::new(MockEmbedder::new(DIMS)),
            ids: SequentialIds::shared(),
        }
    }

    fn services(&self, backend: MockBackend) -> Services {
        Services::new(self.embedder.clone(), Arc::new(backend), self.ids.clone())
    }

    async fn agent(&self, name: &str, backend: MockBackend, config: AgentConfig) -> Agent {
        Agent::create(
            name,
            format!("I am {name}. I enjoy long conversations."),
            config.with_seed(11).with_system1_prob(0.0),
            urgency_only(),
            self.services(backend),
        )
        .await
        .unwrap()
    }

    fn human(&self, name: &str, replies: Vec<Option<&str>>) -> Human {
        Human::new(name, Box::new(ScriptedInput::new(replies)), &self.ids)
    }

    fn sim(&self, participants: Vec<Participant>, config: ConversationConfig) -> ConversationLoop {
        ConversationLoop::from_participants(
            participants,
            "sailing",
            self.services(MockBackend::with_text("unused")),
            config.with_interpretation(false),
        )
        .unwrap()
    }
}

fn urgency_only() -> AgentSettings {
    AgentSettings::default()
        .with_thoughts(ThoughtConfig::default().with_weights(EvaluationWeights {
            relevance: 0.0,
            novelty: 0.0,
            urgency: 1.0,
        }))
        .with_engagement(EngagementConfig {
            starvation_weight: 0.0,
            ..EngagementConfig::default()
        })
}

/// One candidate thought, rated `urgency` on evaluation.
fn thinker(line: &'static str, urgency: u8) -> MockBackend {
    MockBackend::from_fn(move |request| {
        if request.prompt.contains("\nThought:") {
            format!(r#"{{"reasoning": "because", "urgency": {urgency}}}"#)
        } else {
            format!("[initiate] {line}")
        }
    })
}

#[tokio::test]
async fn test_higher_interrupt_wins() {
    let h = Harness::new();
    let config = AgentConfig::default().with_interrupt_threshold(0.7);
    let ada = h.agent("Ada", thinker("The wind is picking up.", 5), config.clone()).await;
    let bo = h.agent("Bo", thinker("We should reef the sail.", 4), config).await;
    let ben = h.human("Ben", vec![]);
    let (ada_id, ben_id) = (ada.id().to_string(), ben.info().id.clone());

    let mut sim = h.sim(vec![ada.into(), bo.into(), ben.into()], ConversationConfig::default());
    sim.open(&ben_id, "How's the weather looking?").await.unwrap();
    let report = sim.run_turn().await.unwrap();

    let states: Vec<_> = report.decisions.iter().map(|d| d.state).collect();
    assert_eq!(
        states,
        vec![
            EngagementState::WantsToInterrupt,
            EngagementState::WantsToInterrupt,
            EngagementState::Silent
        ]
    );
    assert_eq!(report.speaker.as_deref(), Some(ada_id.as_str()));
    assert_eq!(sim.conversation().last().unwrap().text, "The wind is picking up.");
}

#[tokio::test]
async fn test_equal_scores_resolve_by_id() {
    let h = Harness::new();
    let ada = h.agent("Ada", thinker("First.", 4), AgentConfig::default()).await;
    let bo = h.agent("Bo", thinker("Second.", 4), AgentConfig::default()).await;
    let ben = h.human("Ben", vec![]);
    let (ada_id, ben_id) = (ada.id().to_string(), ben.info().id.clone());
    assert!(ada_id < bo.id().to_string());

    // Bo first in the roster; order must not matter.
    let mut sim = h.sim(vec![bo.into(), ada.into(), ben.into()], ConversationConfig::default());
    sim.open(&ben_id, "Thoughts?").await.unwrap();
    let report = sim.run_turn().await.unwrap();

    assert_eq!(report.decisions[0].score, report.decisions[1].score);
    assert_eq!(
        report.decisions[0].turns_since_last_speak,
        report.decisions[1].turns_since_last_speak
    );
    assert_eq!(report.speaker.as_deref(), Some(ada_id.as_str()));
}

#[tokio::test]
async fn test_winner_thought_is_expressed() {
    let h = Harness::new();
    let ada = h.agent("Ada", thinker("Let's head out at dawn.", 5), AgentConfig::default()).await;
    let ben = h.human("Ben", vec![]);
    let (ada_id, ben_id) = (ada.id().to_string(), ben.info().id.clone());

    let mut sim = h.sim(vec![ada.into(), ben.into()], ConversationConfig::default());
    sim.open(&ben_id, "When do we leave?").await.unwrap();
    let report = sim.run_turn().await.unwrap();

    let decision = &report.decisions[0];
    let thought_id = decision.thought_id.clone().unwrap();
    let utterance = sim.conversation().last().unwrap();
    assert_eq!(utterance.thought_id.as_deref(), Some(thought_id.as_str()));
    assert_eq!(Some(&utterance.embedding), decision.embedding.as_ref());
    assert_eq!(utterance.turn_number, 2);
    assert_eq!(utterance.round, 1);

    let ada = sim.agent(&ada_id).unwrap();
    assert!(ada.reservoir().get(&thought_id).is_none());
    assert_eq!(ada.info().turns_since_last_speak, 0);
    assert_eq!(ada.info().last_turn_spoken, 2);
    // Opening line and its own utterance.
    let working: Vec<_> = ada.memory().working().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(working, vec!["Ben: When do we leave?", "Ada: Let's head out at dawn."]);
    assert_eq!(sim.participant(&ben_id).unwrap().info().turns_since_last_speak, 1);
}

#[tokio::test]
async fn test_timed_out_agent_keeps_no_thoughts_from_trigger() {
    let h = Harness::new();
    let ada = h.agent("Ada", thinker("Quick answer.", 5), AgentConfig::default()).await;
    let slow = thinker("Slow, careful answer.", 5).with_latency(Duration::from_secs(5));
    let bo = h.agent("Bo", slow, AgentConfig::default()).await;
    let ben = h.human("Ben", vec![]);
    let (ada_id, bo_id, ben_id) = (ada.id().to_string(), bo.id().to_string(), ben.info().id.clone());

    let config = ConversationConfig::default().with_turn_timeout(Duration::from_millis(200));
    let mut sim = h.sim(vec![ada.into(), bo.into(), ben.into()], config);
    let trigger = sim.open(&ben_id, "Anyone?").await.unwrap();
    let report = sim.run_turn().await.unwrap();

    assert_eq!(report.speaker.as_deref(), Some(ada_id.as_str()));
    assert_eq!(report.timed_out, vec![bo_id.clone()]);
    assert_eq!(report.decisions[1].state, EngagementState::Silent);

    let bo = sim.agent(&bo_id).unwrap();
    assert!(bo.reservoir().thoughts().iter().all(|t| t.trigger_id != trigger.id));
    assert!(bo.reservoir().is_empty());
    // Persona memories were never marked as retrieved.
    assert!(bo.memory().long_term().iter().all(|m| m.retrieval_count() == 0));
}

#[tokio::test]
async fn test_service_error_propagates_and_cancels_siblings() {
    let h = Harness::new();
    let broken = h.agent("Ada", MockBackend::failing("model overloaded"), AgentConfig::default()).await;
    let slow = thinker("Eventually.", 5).with_latency(Duration::from_secs(5));
    let bo = h.agent("Bo", slow, AgentConfig::default()).await;
    let ben = h.human("Ben", vec![]);
    let (bo_id, ben_id) = (bo.id().to_string(), ben.info().id.clone());

    let mut sim = h.sim(vec![broken.into(), bo.into(), ben.into()], ConversationConfig::default());
    sim.open(&ben_id, "Status?").await.unwrap();

    let started = std::time::Instant::now();
    let err = sim.run_turn().await.unwrap_err();
    assert!(err.is_service());
    assert!(err.to_string().contains("completion failed"));
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(sim.round(), 0);
    assert_eq!(sim.conversation().turn_number(), 1);
    assert!(sim.agent(&bo_id).unwrap().reservoir().is_empty());
}

#[tokio::test]
async fn test_failed_round_leaves_finished_agents_untouched() {
    let h = Harness::new();
    let ada = h.agent("Ada", thinker("Quick answer.", 5), AgentConfig::default()).await;
    let flaky = MockBackend::failing("flaky").with_latency(Duration::from_millis(50));
    let bo = h.agent("Bo", flaky, AgentConfig::default()).await;
    let ben = h.human("Ben", vec![]);
    let (ada_id, ben_id) = (ada.id().to_string(), ben.info().id.clone());

    let mut sim = h.sim(vec![ada.into(), bo.into(), ben.into()], ConversationConfig::default());
    sim.open(&ben_id, "Status?").await.unwrap();
    let counts_before: Vec<_> = sim
        .agent(&ada_id)
        .unwrap()
        .memory()
        .long_term()
        .iter()
        .map(|m| m.retrieval_count())
        .collect();

    let err = sim.run_turn().await.unwrap_err();
    assert!(err.is_service());
    assert_eq!(sim.round(), 0);

    // Ada finished thinking before Bo failed, but nothing of it was kept.
    let ada = sim.agent(&ada_id).unwrap();
    assert!(ada.reservoir().is_empty());
    let counts_after: Vec<_> = ada.memory().long_term().iter().map(|m| m.retrieval_count()).collect();
    assert_eq!(counts_after, counts_before);
}

#[tokio::test]
async fn test_silent_round_still_advances() {
    let h = Harness::new();
    let ada = h.agent("Ada", thinker("Hmm.", 1), AgentConfig::default()).await;
    let ben = h.human("Ben", vec![None]);
    let (ada_id, ben_id) = (ada.id().to_string(), ben.info().id.clone());

    let mut sim = h.sim(vec![ada.into(), ben.into()], ConversationConfig::default());
    sim.open(&ben_id, "...").await.unwrap();
    let report = sim.run_turn().await.unwrap();

    assert!(report.is_silent());
    assert_eq!(report.utterance_id, None);
    assert_eq!(sim.round(), 1);
    assert_eq!(sim.silent_rounds(), 1);
    assert_eq!(sim.conversation().turn_number(), 1);
    let ada = sim.agent(&ada_id).unwrap();
    assert_eq!(ada.info().turns_since_last_speak, 2);
    assert!(ada.reservoir().is_empty());
}

#[tokio::test]
async fn test_agent_interrupts_human() {
    let h = Harness::new();
    let ada = h.agent("Ada", thinker("Wait, the forecast changed!", 5), AgentConfig::default()).await;
    let ben = h.human("Ben", vec![Some("Let's go now.")]);
    let (ada_id, ben_id) = (ada.id().to_string(), ben.info().id.clone());

    let mut sim = h.sim(vec![ada.into(), ben.into()], ConversationConfig::default());
    sim.open(&ben_id, "Ready to sail?").await.unwrap();
    let report = sim.run_turn().await.unwrap();

    assert_eq!(report.decisions[0].state, EngagementState::WantsToInterrupt);
    assert_eq!(report.decisions[1].state, EngagementState::WantsToSpeak);
    assert_eq!(report.decisions[1].score, 1.0);
    assert_eq!(report.speaker.as_deref(), Some(ada_id.as_str()));
}

#[tokio::test]
async fn test_human_speaks_when_agent_has_nothing() {
    let h = Harness::new();
    let ada = h.agent("Ada", thinker("Meh.", 1), AgentConfig::default()).await;
    let ben = h.human("Ben", vec![Some("  I'll check the tides.  ")]);
    let ada_id = ada.id().to_string();
    let ben_id = ben.info().id.clone();

    let mut sim = h.sim(vec![ada.into(), ben.into()], ConversationConfig::default());
    sim.open(&ada_id, "Nice day.").await.unwrap();
    let report = sim.run_turn().await.unwrap();

    assert_eq!(report.speaker.as_deref(), Some(ben_id.as_str()));
    let utterance = sim.conversation().last().unwrap();
    assert_eq!(utterance.text, "I'll check the tides.");
    assert_eq!(utterance.thought_id, None);
    assert_eq!(utterance.embedding.len(), DIMS);
}

#[tokio::test]
async fn test_persona_seeds_two_memories() {
    let h = Harness::new();
    let agent = Agent::create(
        "Ada",
        "Hello world. This is a test.",
        AgentConfig::default(),
        AgentSettings::default(),
        h.services(MockBackend::with_text("unused")),
    )
    .await
    .unwrap();

    let long_term = agent.memory().long_term();
    assert_eq!(long_term.len(), 2);
    assert_eq!(long_term[0].text, "Hello world.");
    assert_eq!(long_term[1].text, "This is a test.");
    for item in long_term {
        assert_eq!(item.turn_number, 0);
        assert_eq!(item.weight, 1.0);
        assert_eq!(item.memory_type.as_str(), "long_term");
        assert_eq!(item.embedding().len(), DIMS);
    }
}

#[tokio::test]
async fn test_run_stops_after_quiet_rounds() {
    let h = Harness::new();
    let ada = h.agent("Ada", thinker("Hmm.", 1), AgentConfig::default()).await;
    let ben = h.human("Ben", vec![]);
    let ben_id = ben.info().id.clone();

    let config = ConversationConfig::default().with_max_silent_rounds(3);
    let mut sim = h.sim(vec![ada.into(), ben.into()], config);
    sim.open(&ben_id, "Hello?").await.unwrap();
    let reports = sim.run(10).await.unwrap();

    assert_eq!(reports.len(), 3);
    assert_eq!(sim.round(), 3);
}

#[tokio::test]
async fn test_queued_thought_survives_into_next_round() {
    let h = Harness::new();
    // Two candidates per round: one urgent, one merely relevant.
    let backend = MockBackend::from_fn(|request| {
        if request.prompt.contains("\nThought: Urgent") {
            r#"{"reasoning": "now", "urgency": 5}"#.to_string()
        } else if request.prompt.contains("\nThought:") {
            r#"{"reasoning": "later", "urgency": 3}"#.to_string()
        } else {
            "[initiate] Urgent: check the anchor.\n[respond] Later: maybe lunch.".to_string()
        }
    });
    let ada = h.agent("Ada", backend, AgentConfig::default()).await;
    let ben = h.human("Ben", vec![]);
    let (ada_id, ben_id) = (ada.id().to_string(), ben.info().id.clone());

    let mut sim = h.sim(vec![ada.into(), ben.into()], ConversationConfig::default());
    sim.open(&ben_id, "Anything to do?").await.unwrap();
    sim.run_turn().await.unwrap();

    let ada = sim.agent(&ada_id).unwrap();
    let statuses: Vec<_> = ada
        .reservoir()
        .thoughts()
        .iter()
        .map(|t| (t.content.as_str(), t.status))
        .collect();
    assert_eq!(statuses, vec![("Later: maybe lunch.", ThoughtStatus::QueuedToSpeak)]);
}
