use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use vlm_bridge::config::load_config;
use vlm_bridge::grammar::{parse_explore, parse_grid, parse_reflect};
use vlm_bridge::llm::registry::{build_model, needs_image_server};
use vlm_bridge::{sidecar, BridgeError, BridgeResult};

#[derive(Parser)]
#[command(name = "vlm-bridge", version, about = "Send screenshots to a vision model and decode its answer")]
struct Cli {
    /// Config file (default: config.toml next to the binary or in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one request against the configured backend
    Ask {
        #[arg(long)]
        prompt: String,
        /// Image files, in the order the model should see them
        #[arg(long = "image")]
        images: Vec<PathBuf>,
        /// Decode the answer with this grammar
        #[arg(long, value_enum)]
        grammar: Option<Grammar>,
    },
    /// Decode a saved model response (stdin when no file is given)
    Parse {
        #[arg(value_enum)]
        grammar: Grammar,
        file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Grammar {
    Explore,
    Grid,
    Reflect,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    vlm_bridge::init_tracing("info");

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Ask {
            prompt,
            images,
            grammar,
        } => ask(cli.config, prompt, images, grammar).await,
        Command::Parse { grammar, file } => read_input(file).map(|text| decode(grammar, &text)),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "vlm-bridge failed");
            ExitCode::FAILURE
        }
    }
}

async fn ask(
    config: Option<PathBuf>,
    prompt: String,
    images: Vec<PathBuf>,
    grammar: Option<Grammar>,
) -> BridgeResult<bool> {
    let cfg = load_config(config.as_deref())?;

    let server = if needs_image_server(&cfg) {
        let server = Arc::new(sidecar::from_config(&cfg.sidecar)?);
        server.start().await?;
        Some(server)
    } else {
        None
    };

    let model = build_model(&cfg, server.clone())?;
    let result = model.get_response(&prompt, &images).await;

    if let Some(server) = server {
        server.stop().await;
    }

    match result {
        Ok(text) => {
            println!("{text}");
            Ok(grammar.map_or(true, |g| decode(g, &text)))
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(false)
        }
    }
}

fn decode(grammar: Grammar, text: &str) -> bool {
    let json = match grammar {
        Grammar::Explore => parse_explore(text).map(|c| serde_json::to_string_pretty(&c)),
        Grammar::Grid => parse_grid(text).map(|c| serde_json::to_string_pretty(&c)),
        Grammar::Reflect => parse_reflect(text).map(|c| serde_json::to_string_pretty(&c)),
    };
    match json {
        Ok(Ok(json)) => {
            println!("{json}");
            true
        }
        Ok(Err(e)) => {
            eprintln!("serialize: {e}");
            false
        }
        Err(e) => {
            eprintln!("{e}");
            false
        }
    }
}

fn read_input(file: Option<PathBuf>) -> BridgeResult<String> {
    match file {
        Some(path) => std::fs::read_to_string(&path).map_err(BridgeError::from),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}
