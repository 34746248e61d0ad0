//! Offline completion backend for `--mock` runs.
//!
//! Answers each prompt shape with canned but varied text so that a whole
//! conversation can run without network access.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use thoughtful_agent::prompt::{INITIATE_TAG, RESPOND_TAG};
use thoughtful_llm::{CompletionRequest, MockBackend, SharedBackend};

const REACTIONS: &[&str] = &[
    "That reminds me of something I wanted to ask about",
    "I'm not sure I agree with that",
    "There's a part of this nobody has mentioned yet",
    "I'd like to hear more about that",
    "That changes how I see the whole thing",
    "We keep circling back to the same point",
];

const OPENERS: &[&str] = &[
    "Can we look at this from another angle",
    "Something else has been on my mind",
    "Let me bring up a different question",
];

pub fn backend() -> SharedBackend {
    Arc::new(MockBackend::from_fn(respond).with_name("rehearsal"))
}

fn respond(request: &CompletionRequest) -> String {
    let seed = fingerprint(request);
    let system = request.system.as_deref().unwrap_or_default();

    if request.prompt.starts_with("Utterance:") {
        return "They want the others to react to what they just said.".to_string();
    }
    if request.prompt.contains("\nThought: ") {
        let urgency = seed % 5 + 1;
        return format!(r#"{{"reasoning": "rehearsed", "urgency": {urgency}}}"#);
    }
    if system.contains(INITIATE_TAG) {
        return format!(
            "{RESPOND_TAG} {}.\n{INITIATE_TAG} {}.",
            pick(REACTIONS, seed),
            pick(OPENERS, seed / 7)
        );
    }
    format!("{}.", pick(REACTIONS, seed))
}

fn pick(bank: &[&'static str], seed: u64) -> &'static str {
    bank[(seed % bank.len() as u64) as usize]
}

fn fingerprint(request: &CompletionRequest) -> u64 {
    let mut hasher = DefaultHasher::new();
    request.system.hash(&mut hasher);
    request.prompt.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use thoughtful_agent::{parse_candidates, parse_urgency};

    fn request(system: &str, prompt: &str) -> CompletionRequest {
        CompletionRequest::new(prompt).with_system(system)
    }

    #[test]
    fn test_urgency_reply_is_structured() {
        let reply = respond(&request("rate it", "Last line: Ada: hi\nThought: hello"));
        let urgency = parse_urgency(&reply);
        assert!(urgency.structured);
        assert!((0.0..=1.0).contains(&urgency.level));
    }

    #[test]
    fn test_deliberate_reply_parses_two_candidates() {
        let system = format!("Start a line with {RESPOND_TAG} or {INITIATE_TAG}.");
        let reply = respond(&request(&system, "Last line: Ada: hi"));
        assert_eq!(parse_candidates(&reply, 3).len(), 2);
    }

    #[test]
    fn test_replies_are_deterministic() {
        let a = respond(&request("fast", "Ada: the tide is out"));
        let b = respond(&request("fast", "Ada: the tide is out"));
        assert_eq!(a, b);
    }
}
