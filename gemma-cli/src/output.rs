//! Text rendering for the CLI
//!
//! Everything here returns strings so the exact terminal output can be tested.

use gemma_client::{Completion, ErrorKind, GenerationStats, ModelInfo, Usage};
use serde_json::json;

pub fn render_header(model: &str, prompt: &str) -> String {
    format!("Querying LM Studio with model: {}\nPrompt: {}\n\n", model, prompt)
}

pub fn render_completion(completion: &Completion, max_tokens: usize) -> String {
    format!(
        "Response:\n{}\n{}",
        completion.text,
        render_usage(&completion.usage, max_tokens)
    )
}

pub fn render_usage(usage: &Usage, max_tokens: usize) -> String {
    format!(
        "\n---\nToken Usage:\n  Prompt tokens: {}\n  Completion tokens: {}\n  Total tokens: {}\n  Max tokens (limit): {}\n",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens, max_tokens
    )
}

/// Generation statistics; lines for values the server did not report are left out
pub fn render_stats(stats: &GenerationStats) -> String {
    let mut out = String::from("Stats:\n");
    if let Some(tps) = stats.tokens_per_second {
        out.push_str(&format!("  Tokens per second: {:.2}\n", tps));
    }
    if let Some(ttft) = stats.time_to_first_token {
        out.push_str(&format!("  Time to first token: {:.3}s\n", ttft));
    }
    if let Some(gen) = stats.generation_time {
        out.push_str(&format!("  Generation time: {:.3}s\n", gen));
    }
    out
}

pub fn render_json(completion: &Completion, model: &str, max_tokens: usize) -> serde_json::Value {
    json!({
        "model": completion.model.as_deref().unwrap_or(model),
        "text": completion.text,
        "finish_reason": format!("{:?}", completion.finish_reason).to_lowercase(),
        "usage": {
            "prompt_tokens": completion.usage.prompt_tokens,
            "completion_tokens": completion.usage.completion_tokens,
            "total_tokens": completion.usage.total_tokens,
        },
        "max_tokens": max_tokens,
    })
}

pub fn render_models(base_url: &str, models: &[ModelInfo], quiet: bool) -> String {
    if quiet {
        return models.iter().map(|m| format!("{}\n", m.id)).collect();
    }

    let mut out = format!("Models available at {}:\n", base_url);
    if models.is_empty() {
        out.push_str("  (no models loaded)\n");
    }
    for model in models {
        match &model.owned_by {
            Some(owner) => out.push_str(&format!("  - {} ({})\n", model.id, owner)),
            None => out.push_str(&format!("  - {}\n", model.id)),
        }
    }
    out
}

/// Follow-up advice printed under an error message
pub fn error_hint(kind: ErrorKind) -> Option<&'static str> {
    match kind {
        ErrorKind::ConfigMissing => Some("Please copy .env.example to .env and configure it."),
        ErrorKind::ConnectionFailed => Some("Make sure LM Studio is running and accessible."),
        _ => None,
    }
}
