//! Run command - simulate a conversation.

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use console::{Style, style};
use thoughtful_agent::{
    Agent, ConversationLoop, Human, Participant, StdinInput, TurnReport, Utterance,
};

use super::Context;
use crate::setup;

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Config file layered on top of the discovered ones
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum number of rounds
    #[arg(short, long, default_value_t = 10)]
    pub turns: usize,

    /// Conversation topic (overrides [conversation] topic)
    #[arg(long)]
    pub topic: Option<String>,

    /// First line of the conversation
    #[arg(long)]
    pub opening: Option<String>,

    /// Join as a human participant reading from stdin (repeatable)
    #[arg(long = "human", value_name = "NAME")]
    pub humans: Vec<String>,

    /// Use offline mock services
    #[arg(long)]
    pub mock: bool,
}

/// Run the run command.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let loaded = thoughtful_config::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    let config = loaded.config;
    config.validate()?;

    if config.agents.is_empty() {
        bail!("No agents configured; add at least one [[agents]] entry");
    }
    let topic = args
        .topic
        .clone()
        .or_else(|| config.conversation().topic)
        .context("No topic; pass --topic or set [conversation] topic")?;

    let services = setup::build_services(&config, args.mock)?;
    let settings = setup::agent_settings(&config);

    let mut participants: Vec<Participant> = Vec::new();
    for entry in &config.agents {
        let agent = Agent::create(
            entry.name.as_str(),
            entry.persona.as_str(),
            setup::agent_config(entry),
            settings.clone(),
            services.clone(),
        )
        .await
        .with_context(|| format!("Failed to create agent {}", entry.name))?;
        participants.push(agent.into());
    }

    let human_names = config
        .humans
        .iter()
        .map(|h| h.name.clone())
        .chain(args.humans.iter().cloned());
    let mut first_human = None;
    for name in human_names {
        let human = Human::new(
            name.as_str(),
            Box::new(StdinInput::new(name.as_str())),
            &services.ids,
        )
        .with_score(settings.engagement.human_score);
        first_human.get_or_insert_with(|| human.info().id.clone());
        participants.push(human.into());
    }

    // A human opens if present, otherwise the first agent.
    let opener = first_human
        .or_else(|| participants.first().map(|p| p.id().to_string()))
        .context("No participants")?;
    let opening = args
        .opening
        .clone()
        .unwrap_or_else(|| format!("Let's talk about {topic}."));

    let mut sim = ConversationLoop::from_participants(
        participants,
        topic.as_str(),
        services,
        setup::conversation_config(&config),
    )?;

    println!("{}", style(format!("Topic: {topic}")).bold());
    println!();

    let first = sim.open(&opener, &opening).await?;
    print_utterance(&first, ctx);

    let max_silent = sim.conversation().config().max_silent_rounds;
    for _ in 0..args.turns {
        let report = tokio::select! {
            report = sim.run_turn() => report?,
            _ = tokio::signal::ctrl_c() => {
                println!("{}", style("Interrupted").yellow());
                break;
            }
        };
        print_report(&sim, &report, ctx);

        if max_silent > 0 && sim.silent_rounds() >= max_silent {
            println!(
                "{}",
                style(format!("Nobody spoke for {max_silent} rounds, stopping")).dim()
            );
            break;
        }
    }

    Ok(())
}

fn print_report(sim: &ConversationLoop, report: &TurnReport, ctx: &Context) {
    let dim = Style::new().dim();
    for id in &report.timed_out {
        let name = sim.participant(id).map(Participant::name).unwrap_or(id.as_str());
        println!("{}", dim.apply_to(format!("  ({name} ran out of time)")));
    }

    match report
        .utterance_id
        .as_deref()
        .and_then(|id| sim.conversation().get(id))
    {
        Some(utterance) => print_utterance(utterance, ctx),
        None => println!("{}", dim.apply_to(format!("  [round {}: silence]", report.round))),
    }

    if ctx.verbose {
        for decision in &report.decisions {
            let name = sim
                .participant(&decision.participant_id)
                .map(Participant::name)
                .unwrap_or(decision.participant_id.as_str());
            println!(
                "{}",
                dim.apply_to(format!(
                    "    {name}: {} ({:.2})",
                    decision.state, decision.score
                ))
            );
        }
    }
}

fn print_utterance(utterance: &Utterance, ctx: &Context) {
    println!(
        "{} {}",
        style(format!("{}:", utterance.participant_name)).cyan().bold(),
        utterance.text
    );
    if ctx.verbose
        && let Some(interpretation) = &utterance.interpretation
    {
        println!("{}", style(format!("    ~ {}", interpretation.text)).dim());
    }
}
