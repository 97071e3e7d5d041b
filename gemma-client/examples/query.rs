//! Example: query a running LM Studio server
//!
//! Run with:
//!   # Uses LM_STUDIO_* from the environment or .env
//!   cargo run --example query -- "The capital of France is"
//!
//!   # Stream tokens as they arrive:
//!   cargo run --example query -- --stream "Write a haiku about programming"
//!
//!   # Only list models:
//!   cargo run --example query -- --models

use gemma_client::{CompletionRequest, LmStudioClient, Settings, StreamChunk};
use std::env;
use std::io::Write;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();

    let stream = args.iter().any(|arg| arg == "--stream");
    let models_only = args.iter().any(|arg| arg == "--models");
    let prompt = args
        .iter()
        .filter(|arg| !arg.starts_with("--"))
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");

    let client = LmStudioClient::new(Settings::from_env()?)?;
    println!("Using LM Studio at {}", client.settings().base_url());

    if models_only {
        for model in client.list_models().await? {
            println!("  - {}", model.id);
        }
        return Ok(());
    }

    let prompt = if prompt.is_empty() {
        "The capital of France is".to_string()
    } else {
        prompt
    };
    let request = CompletionRequest::new(prompt);

    if stream {
        let mut receiver = client.stream(&request).await?;
        while let Some(chunk) = receiver.next_chunk().await {
            match chunk {
                StreamChunk::Text(text) => {
                    print!("{}", text);
                    std::io::stdout().flush()?;
                }
                StreamChunk::Done { .. } => break,
                StreamChunk::Error(e) => return Err(e.into()),
            }
        }
        println!();
    } else {
        let completion = client.complete(&request).await?;
        println!("{}", completion.text);
        println!("({} tokens)", completion.usage.total_tokens);
    }

    Ok(())
}
