//! Best-effort parsing of incomplete JSON
//!
//! Tool inputs stream in as raw JSON text fragments. While the text is still
//! incomplete we want the most useful value it already describes, so that a
//! UI can show `{"city":"Par"}` while `{"city":"Paris"}` is still arriving.
//!
//! The scanner walks the text once, remembering the last offset at which the
//! text could be closed into a valid document, and the closing brackets that
//! would be needed there. Open value strings are closed in place, object keys
//! and dangling separators are cut back to that checkpoint.

use serde_json::Value;

/// Parse `raw`, falling back to a repaired prefix when it is incomplete.
///
/// Returns `None` when nothing has arrived yet or when the text is invalid
/// beyond repair.
pub fn parse_partial(raw: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(raw) {
        return Some(value);
    }
    repair_candidates(raw)
        .into_iter()
        .find_map(|candidate| serde_json::from_str(&candidate).ok())
}

#[derive(Debug, Clone, Copy)]
enum Container {
    /// Object, with whether the next string is a key
    Object { expect_key: bool },
    Array,
}

impl Container {
    fn closer(self) -> char {
        match self {
            Container::Object { .. } => '}',
            Container::Array => ']',
        }
    }
}

fn closers(stack: &[Container]) -> String {
    stack.iter().rev().map(|c| c.closer()).collect()
}

/// Candidate completions of `raw`, most complete first
fn repair_candidates(raw: &str) -> Vec<String> {
    let bytes = raw.as_bytes();
    let mut stack: Vec<Container> = Vec::new();
    let mut in_string = false;
    let mut string_is_key = false;
    let mut escaped = false;
    // (offset, closing suffix) of the last position that can be closed cleanly
    let mut checkpoint: Option<(usize, String)> = None;
    // Start of a bare scalar (number / literal) still being read
    let mut scalar_start: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
                if !string_is_key {
                    checkpoint = Some((i + 1, closers(&stack)));
                }
            }
            continue;
        }

        if scalar_start.is_some() {
            if !is_delimiter(b) {
                continue;
            }
            scalar_start = None;
            checkpoint = Some((i, closers(&stack)));
        }

        match b {
            b'"' => {
                in_string = true;
                string_is_key = matches!(stack.last(), Some(Container::Object { expect_key: true }));
            }
            b'{' => {
                stack.push(Container::Object { expect_key: true });
                checkpoint = Some((i + 1, closers(&stack)));
            }
            b'[' => {
                stack.push(Container::Array);
                checkpoint = Some((i + 1, closers(&stack)));
            }
            b'}' | b']' => {
                stack.pop();
                checkpoint = Some((i + 1, closers(&stack)));
            }
            b':' => {
                if let Some(Container::Object { expect_key }) = stack.last_mut() {
                    *expect_key = false;
                }
            }
            b',' => {
                if let Some(Container::Object { expect_key }) = stack.last_mut() {
                    *expect_key = true;
                }
            }
            b if b.is_ascii_whitespace() => {}
            _ => scalar_start = Some(i),
        }
    }

    let mut candidates = Vec::new();
    let suffix = closers(&stack);

    if in_string && !string_is_key {
        // Close the open value string; drop a dangling escape first
        let body = if escaped {
            raw.get(..raw.len() - 1)
        } else {
            Some(raw)
        };
        if let Some(body) = body {
            candidates.push(format!("{body}\"{suffix}"));
        }
    } else if scalar_start.is_some() {
        // A trailing number may already be valid (`18`), a literal may not (`tr`)
        candidates.push(format!("{raw}{suffix}"));
    }

    if let Some((offset, suffix)) = checkpoint {
        if let Some(prefix) = raw.get(..offset) {
            candidates.push(format!("{prefix}{suffix}"));
        }
    }

    candidates
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b',' | b'}' | b']' | b':') || b.is_ascii_whitespace()
}
