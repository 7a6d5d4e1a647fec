//! captcha-skip CLI: replay skip decisions against a scenario file.

use captcha_skip::config::Config;
use captcha_skip::correlate::can_be_skipped_by;
use captcha_skip::model::{AnyChallenge, ChallengeState, SkipScope};
use captcha_skip::registry::{Registry, SubmitResult};
use captcha_skip::scenario::Scenario;
use captcha_skip::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "captcha-skip", about = "Captcha skip correlation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Skip one challenge and show which others go with it
    Evaluate {
        /// Scenario TOML file
        scenario: PathBuf,
        /// Name of the challenge the skip intent is raised against
        #[arg(long)]
        active: String,
        /// Skip scope; unknown values skip only the active challenge
        #[arg(long, default_value = "block_hoster")]
        scope: String,
        /// Print challenge summaries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decide a single pair without touching any state
    Check {
        scenario: PathBuf,
        /// Challenge the intent is raised against
        current: String,
        /// Candidate challenge
        target: String,
        #[arg(long)]
        scope: SkipScope,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let _guard = init_telemetry(TelemetryConfig::from_config(&config))?;

    match cli.command {
        Command::Evaluate {
            scenario,
            active,
            scope,
            json,
        } => cmd_evaluate(&config, scenario, &active, &scope, json),
        Command::Check {
            scenario,
            current,
            target,
            scope,
        } => cmd_check(scenario, &current, &target, scope),
    }
}

fn cmd_evaluate(
    config: &Config,
    path: PathBuf,
    active: &str,
    scope: &str,
    json: bool,
) -> anyhow::Result<()> {
    let scenario = Scenario::load(&path)?;
    let mut registry = Registry::new()
        .with_default_timeout(config.default_timeout_ms)
        .with_event_capacity(config.event_capacity);
    let submitted = scenario.submit_all(&mut registry)?;

    let Some((_, active_result)) = submitted.iter().find(|(name, _)| name == active) else {
        anyhow::bail!("no challenge named '{active}' in {}", path.display());
    };
    if let SubmitResult::Skipped { rule, .. } = active_result {
        anyhow::bail!("'{active}' was already skipped on arrival by {}", rule.origin);
    }

    let outcome = registry.skip_named(active_result.id(), scope, None)?;
    match outcome.scope {
        Some(scope) => println!("Skipped '{active}' with scope {scope}"),
        None => println!("Skipped '{active}' only (scope '{scope}' not recognized)"),
    }

    if json {
        let summaries: Vec<_> = submitted
            .iter()
            .filter_map(|(_, r)| registry.get(r.id()).ok().map(|c| c.summary()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!("{:<16}  {:<6}  {:<24}  STATE", "NAME", "ID", "HOST");
    println!("{}", "-".repeat(60));
    for (name, result) in &submitted {
        let id = result.id();
        let challenge = registry.get(id)?;
        let state = registry.state(id)?;
        let marker = if state == ChallengeState::Skipped && outcome.also_skipped.contains(&id) {
            " (correlated)"
        } else {
            ""
        };
        println!(
            "{:<16}  {:<6}  {:<24}  {}{}",
            name,
            id.to_string(),
            challenge.plugin().map_or("-", |p| p.host()),
            state,
            marker
        );
    }
    println!("\n{} other challenge(s) skipped", outcome.also_skipped.len());
    Ok(())
}

fn cmd_check(
    path: PathBuf,
    current: &str,
    target: &str,
    scope: SkipScope,
) -> anyhow::Result<()> {
    let scenario = Scenario::load(&path)?;
    let skippable = can_be_skipped_by(
        scenario.challenge(current)?,
        scenario.challenge(target)?,
        scope,
        None,
    )?;
    println!("{skippable}");
    Ok(())
}
