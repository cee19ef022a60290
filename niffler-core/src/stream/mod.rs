//! Streaming LLM response parsing (spec §4.3).
//!
//! Providers disagree on wire format but agree on the shape the API worker
//! needs: a sequence of content/thinking/tool-call deltas terminated by a
//! usage report and a finish reason. [`StreamEvent`] is that shared shape;
//! [`AnthropicParser`] and [`OpenAiParser`] each translate one provider's SSE
//! frames into it.

mod anthropic;
mod block;
mod event;
mod openai;
mod sse;

pub use anthropic::AnthropicParser;
pub use block::{BlockAccumulator, BlockState};
pub use event::StreamEvent;
pub use openai::OpenAiParser;
pub use sse::{SseDecoder, SseFrame};

/// Which wire format a model's streaming response follows. Chosen once per
/// model via [`crate::config::ModelConfig`], never auto-detected mid-stream —
/// the two formats are not reliably distinguishable from a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFormat {
    Anthropic,
    OpenAi,
}

/// Guesses wire format from a model's base URL, since [`crate::config::ModelConfig`]
/// does not carry an explicit provider tag of its own.
pub fn infer_provider_format(model: &crate::config::ModelConfig) -> ProviderFormat {
    if model.base_url.contains("anthropic") {
        ProviderFormat::Anthropic
    } else {
        ProviderFormat::OpenAi
    }
}

/// Dispatches decoded SSE frames to the provider-appropriate parser, hiding
/// the two implementations behind one call site for the API worker.
pub enum StreamParser {
    Anthropic(AnthropicParser),
    OpenAi(OpenAiParser),
}

impl StreamParser {
    pub fn new(format: ProviderFormat) -> Self {
        match format {
            ProviderFormat::Anthropic => StreamParser::Anthropic(AnthropicParser::new()),
            ProviderFormat::OpenAi => StreamParser::OpenAi(OpenAiParser::new()),
        }
    }

    pub fn feed(&mut self, frame: &SseFrame) -> Vec<StreamEvent> {
        match self {
            StreamParser::Anthropic(p) => p.feed(frame),
            StreamParser::OpenAi(p) => p.feed(frame),
        }
    }

    /// Whether a `Usage` event has already been emitted, so the caller knows
    /// whether it still needs to synthesize one from the tokenizer estimate
    /// (spec §4.3 point 7 / §4.6).
    pub fn usage_emitted(&self) -> bool {
        match self {
            StreamParser::Anthropic(p) => p.usage_emitted,
            StreamParser::OpenAi(p) => p.usage_emitted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_to_anthropic_parser() {
        let mut parser = StreamParser::new(ProviderFormat::Anthropic);
        let frame = SseFrame {
            event: Some("content_block_start".to_string()),
            data: r#"{"index":0,"content_block":{"type":"text","text":""}}"#.to_string(),
        };
        let events = parser.feed(&frame);
        assert!(events.is_empty());
    }

    #[test]
    fn dispatches_to_openai_parser() {
        let mut parser = StreamParser::new(ProviderFormat::OpenAi);
        let frame = SseFrame {
            event: None,
            data: r#"{"choices":[{"index":0,"delta":{"content":"hi"}}]}"#.to_string(),
        };
        let events = parser.feed(&frame);
        assert_eq!(events, vec![StreamEvent::ContentDelta { text: "hi".into() }]);
    }

    #[test]
    fn infers_anthropic_format_from_base_url() {
        let mut model = crate::config::ModelConfig::default_for_test();
        model.base_url = "https://api.anthropic.com/v1/messages".to_string();
        assert_eq!(infer_provider_format(&model), ProviderFormat::Anthropic);
    }

    #[test]
    fn falls_back_to_openai_format_for_other_urls() {
        let mut model = crate::config::ModelConfig::default_for_test();
        model.base_url = "https://api.openai.com/v1/chat/completions".to_string();
        assert_eq!(infer_provider_format(&model), ProviderFormat::OpenAi);
    }
}
