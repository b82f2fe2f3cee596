use serde::de::DeserializeOwned;

/// A parsed oracle value, plus whether it came from truncation salvage
#[derive(Debug)]
pub struct Extracted<T> {
    pub value: T,
    /// The text was cut off and only its valid prefix was parsed; the last
    /// entry of any open list may be incomplete.
    pub salvaged: bool,
}

/// Robustly extracts and parses JSON from an oracle response.
/// Handles: Markdown code blocks, conversational intro/outro, brace-counting for nested JSON,
/// and output that was cut off mid-object.
pub fn extract_json<T: DeserializeOwned>(response: &str) -> Result<T, String> {
    extract(response).map(|extracted| extracted.value)
}

fn complete<T>(value: T) -> Result<Extracted<T>, String> {
    Ok(Extracted {
        value,
        salvaged: false,
    })
}

/// Like [`extract_json`], but reports whether salvage was needed.
pub fn extract<T: DeserializeOwned>(response: &str) -> Result<Extracted<T>, String> {
    let trimmed = response.trim();

    // Stage 1: Try direct parse (ideal case - pure JSON response)
    if let Ok(parsed) = serde_json::from_str::<T>(trimmed) {
        return complete(parsed);
    }

    // Stage 2: Remove markdown code blocks if present
    let cleaned = remove_markdown_blocks(trimmed);
    if let Ok(parsed) = serde_json::from_str::<T>(&cleaned) {
        return complete(parsed);
    }

    // Stage 3: Use brace-counting to find outermost { } pair
    if let Some(json_str) = find_json_object(&cleaned) {
        if let Ok(parsed) = serde_json::from_str::<T>(json_str) {
            return complete(parsed);
        }
    }

    // Stage 4: Try finding JSON in the original response (in case markdown removal broke something)
    if let Some(json_str) = find_json_object(trimmed) {
        if let Ok(parsed) = serde_json::from_str::<T>(json_str) {
            return complete(parsed);
        }
    }

    // Stage 5: Truncated output, salvage the valid prefix
    if let Some(start) = cleaned.find('{') {
        if let Some(repaired) = salvage_truncated(&cleaned[start..]) {
            if let Ok(parsed) = serde_json::from_str::<T>(&repaired) {
                tracing::warn!(
                    original_len = cleaned.len() - start,
                    repaired_len = repaired.len(),
                    "Recovered truncated oracle JSON"
                );
                return Ok(Extracted {
                    value: parsed,
                    salvaged: true,
                });
            }
        }
    }

    Err(format!(
        "Failed to extract valid JSON from response. Preview: {}...",
        &trimmed.chars().take(200).collect::<String>()
    ))
}

/// Remove markdown code blocks (```json ... ``` or ``` ... ```)
fn remove_markdown_blocks(text: &str) -> String {
    // Fenced block somewhere inside conversational text
    if let Some(open) = text.find("```") {
        let after_fence = &text[open + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let lang = after_fence[..body_start].trim();
        if lang.is_empty() || lang.eq_ignore_ascii_case("json") {
            let body = &after_fence[body_start..];
            let body = match body.find("```") {
                Some(close) => &body[..close],
                None => body,
            };
            return body.trim().to_string();
        }
    }

    let mut result = text.to_string();

    // Remove ```json or ``` at the start
    if result.starts_with("```json") {
        result = result.strip_prefix("```json").unwrap_or(&result).to_string();
    } else if result.starts_with("```") {
        result = result.strip_prefix("```").unwrap_or(&result).to_string();
    }

    // Remove ``` at the end
    result = result.trim().to_string();
    if result.ends_with("```") {
        result = result.strip_suffix("```").unwrap_or(&result).to_string();
    }

    result.trim().to_string()
}

/// Find the outermost JSON object using brace counting (braces inside strings ignored)
fn find_json_object(text: &str) -> Option<&str> {
    let mut brace_count = 0;
    let mut start_idx: Option<usize> = None;
    let mut scanner = StringScanner::default();

    for (i, ch) in text.char_indices() {
        if scanner.in_string(ch) {
            continue;
        }
        match ch {
            '{' => {
                if brace_count == 0 {
                    start_idx = Some(i);
                }
                brace_count += 1;
            }
            '}' if brace_count > 0 => {
                brace_count -= 1;
                if brace_count == 0 {
                    if let Some(start) = start_idx {
                        return Some(&text[start..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Best-effort repair of JSON that was cut off before its closing brackets.
///
/// Only handles the truncation shapes oracles actually produce: output ending
/// inside a string, after a partial key/value, or after a complete value with
/// structures left open. Returns `None` when nothing is left open, so
/// otherwise-malformed JSON is never "repaired" into something else.
///
/// ```text
/// {"moves": [{"a": 1}, {"b": 2      -> {"moves": [{"a": 1}, {"b": 2}]}
/// {"moves": [{"old": "a", "new": "pa -> {"moves": [{"old": "a"}]}
/// ```
pub fn salvage_truncated(text: &str) -> Option<String> {
    let text = text.trim_end();
    let scan = scan_structure(text);
    if scan.stack.is_empty() && !scan.in_string {
        return None;
    }

    let mut text = text.to_string();

    // Inside an unterminated string: drop the partial string
    if scan.in_string {
        let last_quote = text.rfind('"')?;
        text.truncate(last_quote);
    }

    // Closing what is there may already be enough
    let candidate = close_open_structures(&text);
    if serde_json::from_str::<serde_json::Value>(&candidate).is_ok() {
        return Some(candidate);
    }

    // Cut off the partial key/value after the last complete item
    let cut = text.rfind(|c: char| matches!(c, ',' | '{' | '['))?;
    if text[cut..].starts_with(',') {
        text.truncate(cut);
    } else {
        text.truncate(cut + 1);
    }

    let candidate = close_open_structures(&text);
    serde_json::from_str::<serde_json::Value>(&candidate)
        .ok()
        .map(|_| candidate)
}

fn close_open_structures(text: &str) -> String {
    let scan = scan_structure(text);
    let mut closed = text.trim_end().to_string();
    for open in scan.stack.iter().rev() {
        closed.push(if *open == '{' { '}' } else { ']' });
    }
    closed
}

struct Structure {
    stack: Vec<char>,
    in_string: bool,
}

/// String-aware scan recording the brackets left open at the end of `text`
fn scan_structure(text: &str) -> Structure {
    let mut stack = Vec::new();
    let mut scanner = StringScanner::default();

    for ch in text.chars() {
        if scanner.in_string(ch) {
            continue;
        }
        match ch {
            '{' | '[' => stack.push(ch),
            '}' => {
                if stack.last() == Some(&'{') {
                    stack.pop();
                }
            }
            ']' => {
                if stack.last() == Some(&'[') {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    Structure {
        stack,
        in_string: scanner.inside,
    }
}

/// Tracks whether the scan position is inside a JSON string
#[derive(Default)]
struct StringScanner {
    inside: bool,
    escaped: bool,
}

impl StringScanner {
    /// Feed one char; returns true if it belongs to a string (quotes included)
    fn in_string(&mut self, ch: char) -> bool {
        if self.inside {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' {
                self.escaped = true;
            } else if ch == '"' {
                self.inside = false;
            }
            return true;
        }
        if ch == '"' {
            self.inside = true;
            return true;
        }
        false
    }
}
