use crate::registry::Arguments;
use serde_json::Value;

/// A capability invocation requested by the model, recovered from its
/// free-text reply. `None` covers everything that is not a well-formed
/// request: plain prose, malformed JSON, or JSON without a recognized
/// action envelope. The three cases are deliberately indistinguishable.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionRequest {
    Tool { name: String, arguments: Arguments },
    Prompt { name: String, arguments: Arguments },
    None,
}

/// Scans a model reply for an action envelope. Pure and infallible: any
/// reply that does not carry a usable envelope is a final answer.
pub fn parse_action(reply: &str) -> ActionRequest {
    let Some(candidate) = find_json_candidate(reply) else {
        return ActionRequest::None;
    };
    let Ok(value) = serde_json::from_str::<Value>(candidate) else {
        return ActionRequest::None;
    };

    match value.get("action").and_then(Value::as_str) {
        Some("tool") => match value.get("tool_name").and_then(Value::as_str) {
            Some(name) => ActionRequest::Tool {
                name: name.to_string(),
                arguments: arguments_of(&value),
            },
            None => ActionRequest::None,
        },
        Some("prompt") => match value.get("prompt_name").and_then(Value::as_str) {
            Some(name) => ActionRequest::Prompt {
                name: name.to_string(),
                arguments: arguments_of(&value),
            },
            None => ActionRequest::None,
        },
        _ => ActionRequest::None,
    }
}

fn arguments_of(value: &Value) -> Arguments {
    value
        .get("arguments")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Returns the first brace-delimited span, left to right, that contains at
/// most one level of nested braces. Spans with deeper nesting are skipped
/// and the scan resumes at the next opening brace, so arguments that are
/// themselves objects-of-objects will not be recognized. Braces inside
/// string literals are counted like any other; this is a bounded heuristic,
/// not a scanner.
fn find_json_candidate(text: &str) -> Option<&str> {
    let mut from = 0;
    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        if let Some(len) = shallow_span_len(&text[start..]) {
            return Some(&text[start..start + len]);
        }
        from = start + 1;
    }
    None
}

fn shallow_span_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in text.char_indices() {
        match ch {
            '{' => {
                depth += 1;
                if depth > 2 {
                    return None;
                }
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_and_prose_replies_are_no_action() {
        assert_eq!(parse_action(""), ActionRequest::None);
        assert_eq!(
            parse_action("I recommend Dune, a classic of the genre."),
            ActionRequest::None
        );
    }

    #[test]
    fn unrelated_json_lacking_action_field_is_no_action() {
        let reply = r#"Sure, here's a fun fact: {"unrelated":true}. Anyway, I think Dune is great."#;
        assert_eq!(parse_action(reply), ActionRequest::None);
    }

    #[test]
    fn tool_envelope_is_extracted_regardless_of_surrounding_prose() {
        let reply = concat!(
            "Let me look that up.\n",
            r#"{"action":"tool","tool_name":"search_books","arguments":{"query":"science fiction"}}"#,
            "\nOne moment."
        );
        let action = parse_action(reply);
        let ActionRequest::Tool { name, arguments } = action else {
            panic!("expected tool action, got {action:?}");
        };
        assert_eq!(name, "search_books");
        assert_eq!(arguments.get("query"), Some(&json!("science fiction")));
    }

    #[test]
    fn prompt_envelope_is_extracted() {
        let reply = r#"{"action":"prompt","prompt_name":"recommend_books","arguments":{"genre":"Fantasy"}}"#;
        let action = parse_action(reply);
        let ActionRequest::Prompt { name, arguments } = action else {
            panic!("expected prompt action, got {action:?}");
        };
        assert_eq!(name, "recommend_books");
        assert_eq!(arguments.get("genre"), Some(&json!("Fantasy")));
    }

    #[test]
    fn missing_arguments_default_to_empty_map() {
        let action = parse_action(r#"{"action":"tool","tool_name":"search_books"}"#);
        assert_eq!(
            action,
            ActionRequest::Tool {
                name: "search_books".to_string(),
                arguments: Arguments::new(),
            }
        );
    }

    #[test]
    fn envelope_missing_its_name_field_is_no_action() {
        assert_eq!(
            parse_action(r#"{"action":"tool","arguments":{"query":"x"}}"#),
            ActionRequest::None
        );
        assert_eq!(
            parse_action(r#"{"action":"prompt"}"#),
            ActionRequest::None
        );
    }

    #[test]
    fn unknown_action_value_is_no_action() {
        assert_eq!(
            parse_action(r#"{"action":"resource","uri":"library://books/catalog"}"#),
            ActionRequest::None
        );
    }

    #[test]
    fn first_candidate_span_wins() {
        let reply = r#"{"note":"first"} then {"action":"tool","tool_name":"search_books"}"#;
        // The first span decodes but has no action field, so the whole reply
        // counts as a final answer. Matches the single-span scan policy.
        assert_eq!(parse_action(reply), ActionRequest::None);
    }

    // Known limitation, kept on purpose: an envelope whose arguments nest
    // two levels deep exceeds the one-level scan. The scan skips the outer
    // object, lands on the arguments object, finds no action field there,
    // and reports no action.
    #[test]
    fn double_nested_arguments_defeat_the_scan() {
        let reply = r#"{"action":"tool","tool_name":"search_books","arguments":{"filter":{"genre":"scifi"}}}"#;
        assert_eq!(parse_action(reply), ActionRequest::None);
    }
}
