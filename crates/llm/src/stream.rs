//! Streaming output abstractions shared by every adapter.

use serde_json::Value;

/// One increment of model output: text and/or opaque image payloads,
/// in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamEvent {
    /// Text delta; may be empty when only images are present.
    pub text: String,
    /// Opaque provider-supplied image payloads.
    pub images: Vec<Value>,
}

impl StreamEvent {
    /// Create a text-only event.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
        }
    }

    /// Create an image-only event.
    pub fn image(image: Value) -> Self {
        Self {
            text: String::new(),
            images: vec![image],
        }
    }

    /// Whether the event carries neither text nor images.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.images.is_empty()
    }
}

/// Reasoning-channel policy for adapters whose upstream separates
/// "reasoning" from "content".
///
/// Reasoning deltas are forwarded unless excluded by the request; the first
/// content delta after any reasoning delta is preceded by a single `"\n"`
/// separator so consumers see `reasoning <LF> content`.
#[derive(Debug)]
pub struct ReasoningGate {
    exclude: bool,
    seen_reasoning: bool,
    separated: bool,
}

impl ReasoningGate {
    /// Create a gate; `exclude` withholds reasoning entirely.
    pub fn new(exclude: bool) -> Self {
        Self {
            exclude,
            seen_reasoning: false,
            separated: false,
        }
    }

    /// Pass a reasoning delta through the gate.
    pub fn reasoning(&mut self, text: &str) -> Option<StreamEvent> {
        if self.exclude || text.is_empty() {
            return None;
        }
        self.seen_reasoning = true;
        Some(StreamEvent::text(text))
    }

    /// The separator to emit before a content delta, if the stream is
    /// leaving the reasoning channel.
    pub fn before_content(&mut self) -> Option<StreamEvent> {
        if self.seen_reasoning && !self.separated {
            self.separated = true;
            Some(StreamEvent::text("\n"))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_forwarded_by_default() {
        let mut gate = ReasoningGate::new(false);
        assert_eq!(gate.reasoning("think").unwrap().text, "think");
    }

    #[test]
    fn reasoning_withheld_when_excluded() {
        let mut gate = ReasoningGate::new(true);
        assert!(gate.reasoning("think").is_none());
        // No reasoning went out, so no separator either.
        assert!(gate.before_content().is_none());
    }

    #[test]
    fn single_separator_between_reasoning_and_content() {
        let mut gate = ReasoningGate::new(false);
        gate.reasoning("a");
        gate.reasoning("b");
        assert_eq!(gate.before_content().unwrap().text, "\n");
        assert!(gate.before_content().is_none());
    }

    #[test]
    fn no_separator_without_reasoning() {
        let mut gate = ReasoningGate::new(false);
        assert!(gate.before_content().is_none());
    }
}
