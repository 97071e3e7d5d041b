//! # gemma CLI
//!
//! Command-line interface for querying a local LM Studio server.
//!
//! Usage:
//!   gemma "<prompt>"
//!   gemma complete "<prompt>" [--temperature T] [--max-tokens N] [--stream]
//!   gemma models
//!
//! Examples:
//!   gemma "The capital of France is"
//!   gemma "Write a haiku about programming" --temperature 0.9 --max-tokens 200
//!   gemma --stream "Tell me a short story"
//!   gemma --env-file lan.env models

mod output;

use clap::{Parser, Subcommand};
use gemma_client::{
    CompletionRequest, Error, LmStudioClient, Result, Settings, StreamChunk, Usage,
    DEFAULT_TEMPERATURE,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gemma")]
#[command(author, version, about = "Query LM Studio for text completions")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Prompt to complete (when not using subcommands)
    #[arg(allow_hyphen_values = true)]
    prompt: Option<String>,

    /// Sampling temperature
    #[arg(long, global = true, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Maximum tokens to generate (default: LM_STUDIO_MAX_TOKENS or 100)
    #[arg(long, global = true)]
    max_tokens: Option<usize>,

    /// Print tokens as they are generated
    #[arg(long, global = true)]
    stream: bool,

    /// Print the completion as JSON
    #[arg(long, global = true, conflicts_with = "stream")]
    json: bool,

    /// Read settings from this dotenv file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Enable verbose output (debug logs and generation stats)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - only show the completion text
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Complete a prompt
    Complete {
        /// The text prompt to complete
        #[arg(allow_hyphen_values = true)]
        prompt: String,
    },
    /// List the models the server exposes
    Models,
}

/// Per-invocation completion options taken from the command line
struct CompletionOptions {
    temperature: f32,
    max_tokens: Option<usize>,
    stream: bool,
    json: bool,
    verbose: bool,
    quiet: bool,
}

enum Action {
    Complete(String),
    Models,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "warn,gemma_client=debug,gemma=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_settings(env_file: Option<&Path>) -> Result<Settings> {
    match env_file {
        Some(path) => Settings::from_env_file(path),
        None => Settings::from_env(),
    }
}

async fn list_models(client: &LmStudioClient, quiet: bool) -> Result<()> {
    let models = client.list_models().await?;
    print!(
        "{}",
        output::render_models(&client.settings().base_url(), &models, quiet)
    );
    Ok(())
}

async fn run_completion(client: &LmStudioClient, prompt: &str, opts: &CompletionOptions) -> Result<()> {
    let settings = client.settings();
    let max_tokens = opts.max_tokens.unwrap_or(settings.max_tokens);
    let request = CompletionRequest::new(prompt)
        .with_temperature(opts.temperature)
        .with_max_tokens(max_tokens);

    if !opts.quiet && !opts.json {
        print!("{}", output::render_header(&settings.model, prompt));
    }

    if opts.stream {
        return stream_completion(client, &request, max_tokens, opts.quiet).await;
    }

    let completion = client.complete(&request).await?;

    if opts.json {
        let value = output::render_json(&completion, &settings.model, max_tokens);
        let text = serde_json::to_string_pretty(&value).map_err(|e| {
            Error::serialization_failed(e.to_string())
                .with_operation("cli::complete")
                .set_source(e)
        })?;
        println!("{}", text);
        return Ok(());
    }

    if opts.quiet {
        println!("{}", completion.text);
        return Ok(());
    }

    print!("{}", output::render_completion(&completion, max_tokens));
    if opts.verbose {
        if let Some(stats) = &completion.stats {
            print!("{}", output::render_stats(stats));
        }
    }
    Ok(())
}

async fn stream_completion(
    client: &LmStudioClient,
    request: &CompletionRequest,
    max_tokens: usize,
    quiet: bool,
) -> Result<()> {
    let mut receiver = client.stream(request).await?;
    let mut stdout = std::io::stdout();
    let mut usage: Option<Usage> = None;

    if !quiet {
        println!("Response:");
    }

    while let Some(chunk) = receiver.next_chunk().await {
        match chunk {
            StreamChunk::Text(text) => {
                print!("{}", text);
                stdout.flush()?;
            }
            StreamChunk::Done { usage: final_usage, finish_reason } => {
                debug!(?finish_reason, "stream finished");
                usage = final_usage;
                break;
            }
            StreamChunk::Error(e) => {
                println!();
                return Err(Error::stream_failed(e).with_operation("cli::stream"));
            }
        }
    }
    println!();

    if !quiet {
        if let Some(usage) = usage {
            print!("{}", output::render_usage(&usage, max_tokens));
        }
    }
    Ok(())
}

fn report_error(err: &Error) {
    eprintln!("Error: {}", err.message());
    if let Some(hint) = output::error_hint(err.kind()) {
        eprintln!("{}", hint);
    }
    debug!(error = %err, "command failed");
}

fn print_usage() {
    eprintln!("Error: No prompt provided.");
    eprintln!("Usage: gemma [OPTIONS] <PROMPT>");
    eprintln!("       gemma complete <PROMPT>");
    eprintln!("       gemma models");
    eprintln!("\nExamples:");
    eprintln!("  gemma \"The capital of France is\"");
    eprintln!("  gemma \"Write a haiku about programming\" --temperature 0.9 --max-tokens 200");
    eprintln!("  gemma --help");
}

async fn run(action: Action, env_file: Option<&Path>, opts: &CompletionOptions) -> Result<()> {
    let settings = load_settings(env_file)?;
    debug!(base_url = %settings.base_url(), model = %settings.model, "settings loaded");

    let client = LmStudioClient::new(settings)?;

    match action {
        Action::Models => list_models(&client, opts.quiet).await,
        Action::Complete(prompt) => run_completion(&client, &prompt, opts).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let action = match cli.command {
        Some(Commands::Models) => Action::Models,
        Some(Commands::Complete { prompt }) => Action::Complete(prompt),
        None => match cli.prompt {
            Some(prompt) if !prompt.is_empty() => Action::Complete(prompt),
            _ => {
                print_usage();
                std::process::exit(1);
            }
        },
    };

    let opts = CompletionOptions {
        temperature: cli.temperature,
        max_tokens: cli.max_tokens,
        stream: cli.stream,
        json: cli.json,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    if let Err(e) = run(action, cli.env_file.as_deref(), &opts).await {
        report_error(&e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_positional_prompt_with_options() {
        let cli = Cli::try_parse_from([
            "gemma",
            "--temperature",
            "0.9",
            "--max-tokens",
            "200",
            "Write a haiku about programming",
        ])
        .unwrap();

        assert!(cli.command.is_none());
        assert_eq!(cli.prompt.as_deref(), Some("Write a haiku about programming"));
        assert_eq!(cli.temperature, 0.9);
        assert_eq!(cli.max_tokens, Some(200));
    }

    #[test]
    fn test_options_after_prompt() {
        let cli = Cli::try_parse_from([
            "gemma",
            "Write a haiku about programming",
            "--temperature",
            "0.9",
            "--max-tokens",
            "200",
        ])
        .unwrap();

        assert_eq!(cli.prompt.as_deref(), Some("Write a haiku about programming"));
        assert_eq!(cli.temperature, 0.9);
        assert_eq!(cli.max_tokens, Some(200));
    }

    #[test]
    fn test_prompt_starting_with_hyphen() {
        let cli = Cli::try_parse_from(["gemma", "-5 degrees is cold", "--max-tokens", "20"]).unwrap();
        assert_eq!(cli.prompt.as_deref(), Some("-5 degrees is cold"));
        assert_eq!(cli.max_tokens, Some(20));

        let cli = Cli::try_parse_from(["gemma", "-v", "-42"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.prompt.as_deref(), Some("-42"));

        let cli = Cli::try_parse_from(["gemma", "complete", "-1 is less than 0", "--stream"]).unwrap();
        match cli.command {
            Some(Commands::Complete { prompt }) => assert_eq!(prompt, "-1 is less than 0"),
            _ => panic!("expected complete subcommand"),
        }
        assert!(cli.stream);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["gemma", "hello"]).unwrap();
        assert_eq!(cli.temperature, 0.7);
        assert_eq!(cli.max_tokens, None);
        assert!(!cli.stream);
        assert!(cli.env_file.is_none());
    }

    #[test]
    fn test_complete_subcommand() {
        let cli = Cli::try_parse_from(["gemma", "complete", "--stream", "The capital"]).unwrap();
        match cli.command {
            Some(Commands::Complete { prompt }) => assert_eq!(prompt, "The capital"),
            _ => panic!("expected complete subcommand"),
        }
        assert!(cli.stream);
    }

    #[test]
    fn test_models_subcommand_with_env_file() {
        let cli = Cli::try_parse_from(["gemma", "--env-file", "lan.env", "models"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Models)));
        assert_eq!(cli.env_file, Some(PathBuf::from("lan.env")));
    }

    #[test]
    fn test_json_conflicts_with_stream() {
        assert!(Cli::try_parse_from(["gemma", "--json", "--stream", "hi"]).is_err());
    }

    #[test]
    fn test_bad_temperature_rejected_by_parser() {
        assert!(Cli::try_parse_from(["gemma", "--temperature", "warm", "hi"]).is_err());
    }
}
