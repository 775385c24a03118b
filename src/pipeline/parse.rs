//! Loose JSON recovery from free-form model replies.

use serde_json::{Map, Value};

/// Recover a JSON object from `reply`.
///
/// The trimmed reply is parsed strictly first. If that fails or yields a
/// non-object, the span from the first `{` to the last `}` is tried. Returns
/// `None` when neither produces an object. An empty object is returned as-is;
/// callers decide whether it is usable.
pub fn parse_json_loose(reply: &str) -> Option<Map<String, Value>> {
    let s = reply.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(s) {
        return Some(map);
    }
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&s[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_object() {
        let m = parse_json_loose(r#" {"a": 1} "#).unwrap();
        assert_eq!(m["a"], 1);
    }

    #[test]
    fn object_inside_prose_and_fences() {
        let reply = "Sure! Here it is:\n```json\n{\"provider\": \"Acme\", \"nested\": {\"x\": 1}}\n```\nHope that helps.";
        let m = parse_json_loose(reply).unwrap();
        assert_eq!(m["provider"], "Acme");
        assert_eq!(m["nested"]["x"], 1);
    }

    #[test]
    fn empty_object_is_returned() {
        assert_eq!(parse_json_loose("{}").map(|m| m.len()), Some(0));
    }

    #[test]
    fn failures() {
        assert!(parse_json_loose("").is_none());
        assert!(parse_json_loose("no json here").is_none());
        assert!(parse_json_loose("} backwards {").is_none());
        assert!(parse_json_loose("{not: valid}").is_none());
        assert!(parse_json_loose("[1, 2, 3]").is_none());
    }
}
