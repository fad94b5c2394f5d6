//! Candidate extraction — locates the substrings of a model response most
//! likely to hold the tool-invocation JSON, ordered by estimated
//! reliability.

use memchr::memchr;
use smallvec::SmallVec;

use crate::json_scan;

/// Action labels the upstream prompt asks the model to emit. The last
/// occurrence wins, matching models that restate their plan before acting.
const ACTION_LABELS: &[&str] = &["Action:", "action:", "ACTION:", "Acción:", "Aktion:"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CandidateOrigin {
    /// Content of a ```json fenced block.
    FencedJson,
    /// Balanced object following an action label.
    ActionLabel,
    /// Top-level balanced object containing a `tool` key.
    ToolKeyObject,
    /// Longest balanced span, last-resort hypothesis.
    BalancedSpan,
    /// The whole trimmed response, offered only to the legacy tier.
    FullText,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate<'a> {
    pub text: &'a str,
    pub origin: CandidateOrigin,
}

/// Candidate-selection bias per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CandidateBias {
    /// Fenced JSON first (schema tier).
    FencedFirst,
    /// Label-anchored candidates first (secondary tier).
    LabelFirst,
    /// Everything, including bare balanced spans and the full text (legacy).
    Permissive,
}

pub(crate) type Candidates<'a> = SmallVec<[Candidate<'a>; 4]>;

/// Produce zero or more candidates ordered by estimated reliability.
///
/// Inputs with no `{` at all yield zero candidates so downstream tiers fall
/// through to the legacy give-up path.
pub(crate) fn extract_candidates(text: &str, bias: CandidateBias) -> Candidates<'_> {
    let mut out: Candidates<'_> = SmallVec::new();
    if memchr(b'{', text.as_bytes()).is_none() {
        return out;
    }

    let fenced = fenced_json_block(text);
    let labeled = action_label_candidate(text);
    let spans = json_scan::top_level_objects(text);

    match bias {
        CandidateBias::FencedFirst => {
            push_opt(&mut out, fenced, CandidateOrigin::FencedJson);
            push_opt(&mut out, labeled, CandidateOrigin::ActionLabel);
        }
        CandidateBias::LabelFirst | CandidateBias::Permissive => {
            push_opt(&mut out, labeled, CandidateOrigin::ActionLabel);
            push_opt(&mut out, fenced, CandidateOrigin::FencedJson);
        }
    }

    for span in &spans {
        let slice = &text[span.clone()];
        if json_scan::mentions_key(slice, "tool") {
            push_candidate(&mut out, slice, CandidateOrigin::ToolKeyObject);
        }
    }

    if let Some(longest) = spans
        .iter()
        .max_by_key(|span| span.len())
        .map(|span| &text[span.clone()])
    {
        push_candidate(&mut out, longest, CandidateOrigin::BalancedSpan);
    }

    if bias == CandidateBias::Permissive {
        for span in &spans {
            push_candidate(&mut out, &text[span.clone()], CandidateOrigin::BalancedSpan);
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            push_candidate(&mut out, trimmed, CandidateOrigin::FullText);
        }
    }

    out
}

fn push_opt<'a>(out: &mut Candidates<'a>, text: Option<&'a str>, origin: CandidateOrigin) {
    if let Some(text) = text {
        push_candidate(out, text, origin);
    }
}

fn push_candidate<'a>(out: &mut Candidates<'a>, text: &'a str, origin: CandidateOrigin) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    let duplicate = out
        .iter()
        .any(|c| std::ptr::eq(c.text.as_ptr(), trimmed.as_ptr()) && c.text.len() == trimmed.len());
    if !duplicate {
        out.push(Candidate {
            text: trimmed,
            origin,
        });
    }
}

/// Content of the first fenced code block explicitly labeled as JSON.
fn fenced_json_block(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut cursor = 0usize;
    while let Some(rel) = memchr::memmem::find(&bytes[cursor..], b"```") {
        let fence_start = cursor + rel;
        let lang_start = fence_start + 3;
        let line_end = memchr(b'\n', &bytes[lang_start..])
            .map(|rel_nl| lang_start + rel_nl)
            .unwrap_or(bytes.len());
        let lang = text.get(lang_start..line_end)?.trim();
        if !lang.eq_ignore_ascii_case("json") {
            cursor = lang_start;
            continue;
        }
        let content_start = (line_end + 1).min(bytes.len());
        let content_end = memchr::memmem::find(&bytes[content_start..], b"```")
            .map(|rel_close| content_start + rel_close)
            .unwrap_or(bytes.len());
        return text.get(content_start..content_end);
    }
    None
}

/// Balanced object following the last recognized action label.
///
/// When the object never closes (truncated response) the candidate runs to
/// the end of the text and the sanitizer performs truncation repair.
fn action_label_candidate(text: &str) -> Option<&str> {
    let mut best: Option<usize> = None;
    for label in ACTION_LABELS {
        if let Some(pos) = text.rfind(label) {
            let after = pos + label.len();
            if best.is_none_or(|current| after > current) {
                best = Some(after);
            }
        }
    }
    let after = best?;
    let tail = &text[after..];
    let open_rel = memchr(b'{', tail.as_bytes())?;
    let open = after + open_rel;
    match json_scan::object_end(text.as_bytes(), open) {
        Some(end) => text.get(open..end),
        None => text.get(open..),
    }
}
