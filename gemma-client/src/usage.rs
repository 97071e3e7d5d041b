//! Token usage accounting across calls

use crate::types::Usage;
use std::collections::HashMap;

/// Tracks token usage across multiple calls
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    pub total_calls: usize,
    pub total_prompt_tokens: usize,
    pub total_completion_tokens: usize,
    pub by_model: HashMap<String, Usage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, model: &str, usage: &Usage) {
        self.total_calls += 1;
        self.total_prompt_tokens += usage.prompt_tokens;
        self.total_completion_tokens += usage.completion_tokens;

        let entry = self.by_model.entry(model.to_string()).or_default();
        entry.prompt_tokens += usage.prompt_tokens;
        entry.completion_tokens += usage.completion_tokens;
        entry.total_tokens += usage.total_tokens;
    }

    pub fn total_tokens(&self) -> usize {
        self.total_prompt_tokens + self.total_completion_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_tracker() {
        let mut tracker = UsageTracker::new();

        tracker.track("gemma-3-4b-it", &Usage {
            prompt_tokens: 100,
            completion_tokens: 50,
            total_tokens: 150,
        });
        tracker.track("gemma-3-4b-it", &Usage {
            prompt_tokens: 200,
            completion_tokens: 100,
            total_tokens: 300,
        });
        tracker.track("gemma-3-12b-it", &Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        });

        assert_eq!(tracker.total_calls, 3);
        assert_eq!(tracker.total_prompt_tokens, 310);
        assert_eq!(tracker.total_completion_tokens, 155);
        assert_eq!(tracker.total_tokens(), 465);
        assert_eq!(tracker.by_model["gemma-3-4b-it"].total_tokens, 450);
        assert_eq!(tracker.by_model.len(), 2);
    }
}
