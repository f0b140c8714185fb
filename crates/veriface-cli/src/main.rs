use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use veriface_core::decision::{decide, MatchInputs};
use veriface_core::gate::{Direction, GateFeedback};
use veriface_core::types::{Expression, FrameObservation};
use veriface_core::{Attempt, Tunables};

#[derive(Parser)]
#[command(name = "veriface", about = "Veriface presence-verification CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a verification attempt
    Start {
        /// Reference identity photo to match against
        #[arg(short, long)]
        reference: Option<PathBuf>,
    },
    /// Cancel the running attempt
    Cancel,
    /// Reset the running attempt for a fresh capture
    Recapture,
    /// Show daemon status
    Status,
    /// Replay a recorded observation fixture through the pipeline
    /// offline and print the per-tick gate decisions
    Replay {
        /// JSON fixture file
        fixture: PathBuf,
        /// Render directions for a mirrored preview
        #[arg(long)]
        mirror: bool,
    },
}

#[zbus::proxy(
    interface = "org.freedesktop.Veriface1",
    default_service = "org.freedesktop.Veriface1",
    default_path = "/org/freedesktop/Veriface1"
)]
trait Veriface {
    async fn start_verification(&self, reference_path: &str) -> zbus::Result<String>;
    async fn cancel(&self) -> zbus::Result<bool>;
    async fn recapture(&self) -> zbus::Result<bool>;
    async fn status(&self) -> zbus::Result<String>;
}

/// Offline replay input: frame geometry, per-tick observations and the
/// optional match signals to run the decision matrix on afterwards.
#[derive(Deserialize)]
struct Fixture {
    frame: FrameDims,
    #[serde(default)]
    required: Option<Vec<Expression>>,
    ticks: Vec<FrameObservation>,
    #[serde(rename = "match")]
    #[serde(default)]
    match_signals: Option<MatchSignals>,
}

#[derive(Deserialize)]
struct FrameDims {
    width: f32,
    height: f32,
}

#[derive(Deserialize)]
struct MatchSignals {
    local_distance: Option<f32>,
    remote_match: Option<bool>,
    remote_confidence: Option<u8>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { reference } => {
            let proxy = proxy().await?;
            let path = reference
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            let attempt_id = proxy.start_verification(&path).await?;
            println!("attempt started: {attempt_id}");
        }
        Commands::Cancel => {
            let proxy = proxy().await?;
            if proxy.cancel().await? {
                println!("attempt cancelled");
            } else {
                println!("no attempt running");
            }
        }
        Commands::Recapture => {
            let proxy = proxy().await?;
            if proxy.recapture().await? {
                println!("attempt state reset");
            } else {
                println!("no attempt running");
            }
        }
        Commands::Status => {
            let proxy = proxy().await?;
            println!("{}", proxy.status().await?);
        }
        Commands::Replay { fixture, mirror } => replay(&fixture, mirror)?,
    }

    Ok(())
}

async fn proxy() -> Result<VerifaceProxy<'static>> {
    let conn = zbus::Connection::session()
        .await
        .context("connecting to the session bus")?;
    VerifaceProxy::new(&conn)
        .await
        .context("connecting to verifaced")
}

fn replay(path: &PathBuf, mirror: bool) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixture {}", path.display()))?;
    let fixture: Fixture = serde_json::from_str(&raw).context("parsing fixture")?;

    let mut tunables = Tunables::default();
    if let Some(required) = fixture.required {
        tunables.required_expressions = required;
    }
    let mut attempt = Attempt::new(tunables, fixture.frame.width, fixture.frame.height);

    for (i, observation) in fixture.ticks.iter().enumerate() {
        let outcome = attempt.tick(observation);
        println!(
            "tick {i:>3}  score {:>5.1}  {}",
            outcome.score,
            render_feedback(&outcome.feedback, mirror)
        );
        if outcome.ready() {
            println!("capture gate opened after {} ticks", i + 1);
            break;
        }
    }

    if let Some(signals) = fixture.match_signals {
        let decision = decide(&MatchInputs {
            local_distance: signals.local_distance,
            remote_match: signals.remote_match,
            remote_confidence: signals.remote_confidence,
            remote_reason: None,
        });
        println!(
            "match decision: {} (similarity {}, {})",
            if decision.matched { "MATCH" } else { "MISMATCH" },
            decision.similarity,
            decision.reason
        );
    }

    Ok(())
}

/// Render one gate verdict for the terminal. Mirroring is applied here,
/// at the display boundary, never in the pipeline.
fn render_feedback(feedback: &GateFeedback, mirror: bool) -> String {
    let direction = |d: Direction| if mirror { d.mirrored() } else { d };
    match feedback {
        GateFeedback::NoFace => "no face detected".into(),
        GateFeedback::OffCenter { primary, secondary } => {
            let mut text = format!("move {:?}", direction(*primary)).to_lowercase();
            if let Some(secondary) = secondary {
                text.push_str(&format!(" and {:?}", direction(*secondary)).to_lowercase());
            }
            text
        }
        GateFeedback::TooClose => "move back".into(),
        GateFeedback::TooFar => "move closer".into(),
        GateFeedback::SpoofSuspected { hint } => format!("spoof suspected: {hint:?}"),
        GateFeedback::HoldExpression { target, satisfied, required } => {
            format!("show {} ({satisfied}/{required})", target.prompt())
        }
        GateFeedback::KeepLooking => "keep looking at the camera".into(),
        GateFeedback::HoldStill { remaining_ticks } => {
            format!("hold still ({remaining_ticks} ticks left)")
        }
        GateFeedback::Ready => "READY".into(),
        GateFeedback::Finalizing => "finalizing".into(),
    }
}
