use std::path::PathBuf;

use clap::Parser;
use fracas::prelude::*;

/// WebSocket server for the Fracas trivia game.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to listen on
    #[arg(default_value = "0.0.0.0:8080")]
    bind: String,
    /// Question CSV to use instead of the built-in bank
    #[arg(short, long)]
    questions: Option<PathBuf>,
    /// The question file lists answers without scores
    #[arg(long, requires = "questions")]
    unscored: bool,
    /// Rounds per game
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    rounds: Option<u32>,
    /// Server tick rate in Hz
    #[arg(short, long, default_value = "10")]
    tick_rate: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let mut lobby_config = LobbyConfig::default();
    if let Some(rounds) = args.rounds {
        lobby_config.rounds = rounds;
    }

    let mut builder = FracasServer::builder()
        .bind(&args.bind)
        .lobby_config(lobby_config)
        .tick_config(TickConfig::with_rate(args.tick_rate));

    if let Some(path) = &args.questions {
        let format = if args.unscored {
            QuestionFormat::Unscored
        } else {
            QuestionFormat::Scored
        };
        builder = builder.questions(QuestionBank::load(path, format)?);
    }

    let server = builder.build().await?;
    tracing::info!(addr = %server.local_addr()?, "listening");
    server.run().await?;
    Ok(())
}
