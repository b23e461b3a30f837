//! blockquest command-line tools.
//!
//! Provides the `blockquest` binary:
//! - `compile` prints the script source of a saved block program.
//! - `play` runs a program on a level with a headless scene and prints the
//!   outcome report as JSON.
//!
//! Reads configuration from environment variables:
//! - `BLOCKQUEST_SPEED_MS`: per-step playback and effect delay (default: 250)
//! - `BLOCKQUEST_TIMEOUT_MS`: playback wait timeout before scoring
//!   (default: 200000)
//! - `RUST_LOG`: log filter (default: "info")

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::{debug, info};

use blockquest_codegen::{compile_with_options, CompileOptions, GenerationMode};
use blockquest_core::{resolve_bindings, BlockDocument, BlockGraph, LevelContext};
use blockquest_outcome::{play_level, OutcomeConfig, PlayOptions};
use blockquest_runtime::{HeadlessScene, RunControl};

/// Block program compiler and level runner.
#[derive(Parser)]
#[command(name = "blockquest", about = "Block program compiler and level runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a saved block program to script source.
    Compile {
        /// Path to the block program JSON.
        #[arg(short, long)]
        graph: PathBuf,

        /// Generation mode: instrumented or pure.
        #[arg(short, long, default_value = "instrumented")]
        mode: String,

        /// Fail instead of repairing a malformed program.
        #[arg(long)]
        strict: bool,

        /// Print the full compiled program (source, procedures,
        /// diagnostics) as JSON instead of the bare source.
        #[arg(long)]
        json: bool,
    },

    /// Play a block program on a level.
    Play {
        /// Path to the block program JSON.
        #[arg(short, long)]
        graph: PathBuf,

        /// Path to the level JSON.
        #[arg(short, long)]
        level: PathBuf,

        /// Hints used before this attempt.
        #[arg(long, default_value_t = 0)]
        hints: u32,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Compile {
            graph,
            mode,
            strict,
            json,
        } => run_compile(&graph, &mode, strict, json),
        Commands::Play { graph, level, hints } => run_play(&graph, &level, hints).await,
    };
    process::exit(exit_code);
}

/// Execute the compile subcommand.
///
/// Returns exit code: 0 = success, 1 = program rejected, 3 = I/O or parse
/// error.
fn run_compile(graph_path: &Path, mode: &str, strict: bool, json: bool) -> i32 {
    let mode = match parse_mode(mode) {
        Ok(mode) => mode,
        Err(msg) => {
            eprintln!("Error: {msg}");
            return 1;
        }
    };
    let graph = match load_graph(graph_path) {
        Ok(graph) => graph,
        Err(msg) => {
            eprintln!("Error: {msg}");
            return 3;
        }
    };

    let options = CompileOptions {
        deny_diagnostics: strict,
        ..CompileOptions::default()
    };
    match compile_with_options(&graph, mode, &options) {
        Ok(source) => {
            for diagnostic in &source.diagnostics {
                eprintln!("warning: {}", diagnostic.message);
            }
            if json {
                let text = serde_json::to_string_pretty(&source)
                    .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize program: {e}\"}}"));
                println!("{text}");
            } else {
                print!("{}", source.text);
            }
            0
        }
        Err(e) => {
            eprintln!("Compilation rejected: {e}");
            1
        }
    }
}

/// Execute the play subcommand.
///
/// Returns exit code: 0 = level completed, 2 = game over, 1 = program could
/// not run, 3 = I/O or parse error.
async fn run_play(graph_path: &Path, level_path: &Path, hints: u32) -> i32 {
    let graph = match load_graph(graph_path) {
        Ok(graph) => graph,
        Err(msg) => {
            eprintln!("Error: {msg}");
            return 3;
        }
    };
    let level = match fs::read_to_string(level_path)
        .map_err(|e| e.to_string())
        .and_then(|text| LevelContext::from_json_str(&text).map_err(|e| e.to_string()))
    {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Error: failed to load level '{}': {e}", level_path.display());
            return 3;
        }
    };

    let speed_ms = env_ms("BLOCKQUEST_SPEED_MS").unwrap_or(250);
    let mut options = PlayOptions {
        effect_ms: speed_ms,
        hint_usage: hints,
        ..PlayOptions::default()
    };
    options.replay.default_speed_ms = speed_ms;
    let mut config = OutcomeConfig::default();
    if let Some(timeout_ms) = env_ms("BLOCKQUEST_TIMEOUT_MS") {
        config.wait.timeout_ms = timeout_ms;
    }
    debug!(?options, ?config, "play settings");

    let scene = HeadlessScene::new(["agent"]);
    info!(level = %level.name, "playing");
    match play_level(&graph, &level, scene, RunControl::new(), &options, &config).await {
        Ok(report) => {
            let text = serde_json::to_string_pretty(&report)
                .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize report: {e}\"}}"));
            println!("{text}");
            if report.outcome.is_completed() {
                0
            } else {
                2
            }
        }
        Err(e) => {
            eprintln!("Run failed: {e}");
            1
        }
    }
}

/// Loads a block program and resolves its procedure bindings.
fn load_graph(path: &Path) -> Result<BlockGraph, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("failed to read program '{}': {e}", path.display()))?;
    let doc = BlockDocument::from_json_str(&text)
        .map_err(|e| format!("failed to parse program '{}': {e}", path.display()))?;
    let mut graph = BlockGraph::from_document(&doc)
        .map_err(|e| format!("failed to build program '{}': {e}", path.display()))?;
    let report = resolve_bindings(&mut graph);
    debug!(?report, "procedure bindings resolved");
    Ok(graph)
}

fn env_ms(name: &str) -> Option<u64> {
    let value = std::env::var(name).ok()?;
    match value.trim().parse() {
        Ok(ms) => Some(ms),
        Err(_) => {
            tracing::warn!(name, %value, "ignoring non-numeric setting");
            None
        }
    }
}

/// Parse a generation mode name.
fn parse_mode(s: &str) -> Result<GenerationMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "instrumented" => Ok(GenerationMode::Instrumented),
        "pure" => Ok(GenerationMode::Pure),
        _ => Err(format!("invalid mode '{s}', expected instrumented/pure")),
    }
}
