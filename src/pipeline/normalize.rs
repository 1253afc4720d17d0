//! Response normalisation: find the JSON payload inside a model reply.
//!
//! ## Why a strategy chain?
//!
//! Even when asked for "JSON only", multimodal models wrap their answer in
//! ` ```json ` fences, in bare fences, or in a sentence of prose. Rather than
//! reject decorated-but-valid output, we try a fixed sequence of extraction
//! strategies and take the first that yields something non-blank:
//!
//! 1. content of the first ` ```json ` fence
//! 2. content of the first fence of any kind (info string dropped)
//! 3. span from the earliest `{`/`[` to the latest `}`/`]`
//!
//! If every strategy comes back empty the trimmed reply is passed through as
//! the candidate, so the JSON parser reports a precise error for the page.

use once_cell::sync::Lazy;
use regex::Regex;

/// Outcome of normalising one reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate<'a> {
    /// The reply was blank; the page has nothing to parse.
    NoPayload,
    /// Text believed to hold the JSON payload.
    Json(&'a str),
}

type Strategy = fn(&str) -> Option<&str>;

/// Strategies in the order they are attempted.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("json-fence", json_fence),
    ("any-fence", any_fence),
    ("bracket-span", bracket_span),
];

/// Locate the candidate JSON text in a raw model reply.
pub fn locate_json(raw: &str) -> Candidate<'_> {
    let text = raw.trim();
    if text.is_empty() {
        return Candidate::NoPayload;
    }

    for (name, strategy) in STRATEGIES {
        if let Some(found) = strategy(text).filter(|s| !s.is_empty()) {
            tracing::trace!("Located JSON payload via {name}");
            return Candidate::Json(found);
        }
    }

    Candidate::Json(text)
}

// ── Strategy 1: ```json fence ────────────────────────────────────────────────

// An unterminated fence runs to the end of the reply.
static RE_JSON_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```json(.*?)(?:```|\z)").unwrap());

fn json_fence(text: &str) -> Option<&str> {
    RE_JSON_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

// ── Strategy 2: any fence ────────────────────────────────────────────────────

static RE_ANY_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:[A-Za-z0-9_+.-]+[ \t]*\r?\n)?(.*?)(?:```|\z)").unwrap());

fn any_fence(text: &str) -> Option<&str> {
    RE_ANY_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

// ── Strategy 3: outermost bracket span ───────────────────────────────────────

fn bracket_span(text: &str) -> Option<&str> {
    let open = text.find(['{', '['])?;
    let close = text.rfind(['}', ']'])?;
    // Brackets are ASCII, so both indices sit on char boundaries.
    (open < close).then(|| &text[open..=close])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_reply_has_no_payload() {
        assert_eq!(locate_json(""), Candidate::NoPayload);
        assert_eq!(locate_json("  \n\t "), Candidate::NoPayload);
    }

    #[test]
    fn json_fence_extracted() {
        let raw = " ```json\n{\"transactions\":[]}\n``` ";
        assert_eq!(locate_json(raw), Candidate::Json("{\"transactions\":[]}"));
    }

    #[test]
    fn json_fence_wins_over_earlier_plain_fence() {
        let raw = "```\nnot this\n```\nthen\n```json\n[1]\n```";
        assert_eq!(locate_json(raw), Candidate::Json("[1]"));
    }

    #[test]
    fn unterminated_json_fence_runs_to_end() {
        let raw = "Here you go:\n```json\n{\"a\": 1}";
        assert_eq!(locate_json(raw), Candidate::Json("{\"a\": 1}"));
    }

    #[test]
    fn plain_fence_extracted() {
        let raw = "Result:\n```\n[{\"reference\":\"A1\"}]\n```\nDone.";
        assert_eq!(locate_json(raw), Candidate::Json("[{\"reference\":\"A1\"}]"));
    }

    #[test]
    fn fence_info_string_dropped() {
        let raw = "```JSON\n{\"a\":1}\n```";
        assert_eq!(locate_json(raw), Candidate::Json("{\"a\":1}"));
    }

    #[test]
    fn inline_fence_keeps_payload() {
        let raw = "```{\"a\":1}```";
        assert_eq!(locate_json(raw), Candidate::Json("{\"a\":1}"));
    }

    #[test]
    fn prose_wrapped_object() {
        let raw = "Sure! The data is {\"transactions\": [{\"reference\": \"X\"}]} hope this helps";
        assert_eq!(
            locate_json(raw),
            Candidate::Json("{\"transactions\": [{\"reference\": \"X\"}]}")
        );
    }

    #[test]
    fn earliest_open_and_latest_close_across_kinds() {
        let raw = "list: [ {\"a\": 1} ] end";
        assert_eq!(locate_json(raw), Candidate::Json("[ {\"a\": 1} ]"));
    }

    #[test]
    fn no_brackets_passes_text_through() {
        let raw = "  I could not find any transactions on this page.  ";
        assert_eq!(
            locate_json(raw),
            Candidate::Json("I could not find any transactions on this page.")
        );
    }

    #[test]
    fn reversed_brackets_pass_text_through() {
        let raw = "} nothing here {";
        assert_eq!(locate_json(raw), Candidate::Json("} nothing here {"));
    }

    #[test]
    fn empty_fence_falls_through_to_brackets() {
        let raw = "```json\n```\n{\"a\": 2}";
        // The empty json fence is not usable; the plain-fence pass also
        // matches the empty block, so the bracket span is used.
        assert_eq!(locate_json(raw), Candidate::Json("{\"a\": 2}"));
    }
}
