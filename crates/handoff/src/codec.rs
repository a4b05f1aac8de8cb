//! Canonical on-disk form for a `HandoffDocument`: deterministic key
//! ordering and LF line endings so two encodes of the same document are
//! byte-identical (the round-trip law `decode(encode(doc)) == doc` and
//! `encode(decode(encode(doc))) == encode(doc)`).

use std::collections::BTreeMap;

use serde_json::Value;

use ac_domain::error::{Error, Result};
use ac_domain::handoff::HandoffDocument;

/// Serialize a document to its canonical text form: JSON with keys sorted
/// lexicographically at every level, pretty-printed, LF-terminated.
pub fn encode(doc: &HandoffDocument) -> Result<String> {
    let value = serde_json::to_value(doc).map_err(Error::Json)?;
    let sorted = sort_keys(value);
    let mut text = serde_json::to_string_pretty(&sorted).map_err(Error::Json)?;
    if !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}

/// Parse the canonical text form back into a document. Does not itself
/// validate cross-field invariants — call `HandoffDocument::validate` on
/// the result, or use [`decode_and_validate`].
pub fn decode(text: &str) -> Result<HandoffDocument> {
    serde_json::from_str(text)
        .map_err(|e| Error::MalformedHandoff(e.to_string()))
}

pub fn decode_and_validate(text: &str) -> Result<HandoffDocument> {
    let doc = decode(text)?;
    let errors = doc.validate();
    if !errors.is_empty() {
        return Err(Error::MalformedHandoff(errors.join("; ")));
    }
    Ok(doc)
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Build the natural-language prompt handed to the successor agent: a
/// condensed restatement of the handoff document, not the raw JSON.
pub fn continuation_prompt(doc: &HandoffDocument) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "You are continuing task \"{}\" from a predecessor agent that reached \
         {:.1}% of its context budget.\n\n",
        doc.task_id, doc.token_usage.usage_percentage
    ));
    out.push_str(&format!("ORIGINAL REQUEST:\n{}\n\n", doc.original_request));
    out.push_str(&format!(
        "CURRENT PHASE: {} ({}% complete, status: {:?})\n\n",
        doc.current_phase, doc.completion_percentage, doc.task_status
    ));

    if !doc.decisions.is_empty() {
        out.push_str("DECISIONS MADE:\n");
        for d in &doc.decisions {
            out.push_str(&format!("- {} — {}\n", d.title, d.rationale));
        }
        out.push('\n');
    }

    if !doc.rejected_alternatives.is_empty() {
        out.push_str("ALTERNATIVES REJECTED:\n");
        for r in &doc.rejected_alternatives {
            out.push_str(&format!("- {}: {}\n", r.option, r.reason_rejected));
        }
        out.push('\n');
    }

    if !doc.work_completed.is_empty() {
        out.push_str("WORK COMPLETED:\n");
        for w in &doc.work_completed {
            out.push_str(&format!("- [{}] {}: {}\n", w.artifact_kind, w.identifier, w.summary));
        }
        out.push('\n');
    }

    out.push_str(&format!("WORK IN PROGRESS:\n{}\n\n", doc.work_in_progress));

    if !doc.todo_list.is_empty() {
        out.push_str("REMAINING TODO:\n");
        for t in &doc.todo_list {
            out.push_str(&format!("- ({}) {} — done when: {}\n", t.priority, t.description, t.acceptance_criteria));
        }
        out.push('\n');
    }

    if !doc.assumptions.is_empty() {
        out.push_str(&format!("ASSUMPTIONS: {}\n", doc.assumptions.join("; ")));
    }
    if !doc.constraints.is_empty() {
        out.push_str(&format!("CONSTRAINTS: {}\n", doc.constraints.join("; ")));
    }
    if doc.degraded {
        out.push_str(
            "\nNOTE: this handoff was produced under degraded conditions (context \
             exhausted during state extraction itself) — some detail may be missing.\n",
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::sample_document;

    #[test]
    fn round_trip_law() {
        let doc = sample_document();
        let text1 = encode(&doc).unwrap();
        let decoded = decode_and_validate(&text1).unwrap();
        let text2 = encode(&decoded).unwrap();
        assert_eq!(text1, text2);
    }

    #[test]
    fn encoded_form_has_lexically_sorted_top_level_keys() {
        let doc = sample_document();
        let text = encode(&doc).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn encoded_form_uses_lf_only() {
        let doc = sample_document();
        let text = encode(&doc).unwrap();
        assert!(!text.contains('\r'));
    }

    #[test]
    fn decode_rejects_unknown_decision_reference() {
        let mut doc = sample_document();
        doc.todo_list[0].decision_ref = Some("does-not-exist".into());
        let text = encode(&doc).unwrap();
        assert!(decode_and_validate(&text).is_err());
    }
}
