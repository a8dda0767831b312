//! Cleaning and repair of raw model output.
//!
//! Model output is untrusted text. It is turned into a JSON array in four
//! steps: fence markers are stripped, output cut off mid-object is trimmed
//! back to the last complete object, a strict parse is attempted, and on
//! failure a best-effort structural repair runs before a second parse.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{CoreError, Result};

static FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+-]*").ok());

/// Records parsed out of one model response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOutput {
    pub records: Vec<Value>,
    /// The strict parse failed and the structural repair pass was needed.
    pub repaired: bool,
}

/// Remove code fence markers (with any language tag) and surrounding space.
pub fn strip_code_fences(text: &str) -> String {
    match FENCE.as_ref() {
        Some(re) => re.replace_all(text, "").trim().to_string(),
        None => text.replace("```", "").trim().to_string(),
    }
}

/// Close an array that was cut off by an output length limit.
///
/// Text already ending in `]` is returned trimmed. Otherwise everything after
/// the last `}` is dropped and `]` is appended.
pub fn close_truncated_array(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.ends_with(']') {
        return trimmed.to_string();
    }

    let mut closed = match trimmed.rfind('}') {
        Some(idx) if idx > 0 => trimmed[..=idx].to_string(),
        _ => trimmed.to_string(),
    };
    if !closed.trim_end().ends_with(']') {
        closed.push(']');
    }
    closed
}

/// Fence stripping followed by truncation repair. Idempotent.
pub fn clean_response(text: &str) -> String {
    close_truncated_array(&strip_code_fences(text))
}

/// Clean, parse, and if needed repair model output into a JSON array.
pub fn parse_record_array(raw: &str) -> Result<ParsedOutput> {
    let cleaned = clean_response(raw);

    let (value, repaired) = match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => (value, false),
        Err(strict_err) => {
            let candidate = repair_json(&cleaned);
            let value = serde_json::from_str::<Value>(&candidate).map_err(|err| {
                CoreError::MalformedOutput {
                    reason: format!("{strict_err}; after repair: {err}"),
                    cleaned: cleaned.clone(),
                }
            })?;
            (value, true)
        }
    };

    match value {
        Value::Array(records) => Ok(ParsedOutput { records, repaired }),
        other => Err(CoreError::MalformedOutput {
            reason: format!("expected a JSON array, found {}", value_kind(&other)),
            cleaned,
        }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Best-effort structural repair of almost-JSON text.
///
/// Handles unquoted keys, single-quoted strings, bare words, Python-style
/// literals, trailing and missing commas, comments, unterminated strings,
/// and unbalanced brackets. Leading prose before the first container and
/// anything after the top-level value are dropped.
pub fn repair_json(text: &str) -> String {
    Repairer::new(text).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectState {
    Key,
    Colon,
    Value,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayState {
    Value,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object(ObjectState),
    Array(ArrayState),
}

impl Frame {
    fn closer(self) -> char {
        match self {
            Frame::Object(_) => '}',
            Frame::Array(_) => ']',
        }
    }
}

struct Repairer {
    chars: Vec<char>,
    pos: usize,
    out: String,
    stack: Vec<Frame>,
    started: bool,
    done: bool,
}

impl Repairer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            out: String::with_capacity(text.len() + 8),
            stack: Vec::new(),
            started: false,
            done: false,
        }
    }

    fn run(mut self) -> String {
        while self.pos < self.chars.len() && !self.done {
            let ch = self.chars[self.pos];
            if ch.is_whitespace() {
                if self.started {
                    self.out.push(ch);
                }
                self.pos += 1;
                continue;
            }
            if ch == '/' && self.skip_comment() {
                continue;
            }

            match self.stack.last().copied() {
                None => match ch {
                    '[' | '{' => self.open(ch),
                    _ => self.pos += 1,
                },
                Some(Frame::Object(state)) => self.in_object(state, ch),
                Some(Frame::Array(state)) => self.in_array(state, ch),
            }
        }

        while !self.stack.is_empty() {
            self.seal_top();
        }
        self.out
    }

    fn in_object(&mut self, state: ObjectState, ch: char) {
        match state {
            ObjectState::Key => match ch {
                '}' => self.close(),
                ']' => self.mismatched_closer(ch),
                '"' | '\'' => {
                    self.string(ch);
                    self.set_top(Frame::Object(ObjectState::Colon));
                }
                c if is_word_start(c) => {
                    let word = self.word();
                    self.push_quoted(&word);
                    self.set_top(Frame::Object(ObjectState::Colon));
                }
                _ => self.pos += 1,
            },
            ObjectState::Colon => {
                self.out.push(':');
                self.set_top(Frame::Object(ObjectState::Value));
                if ch == ':' {
                    self.pos += 1;
                }
            }
            ObjectState::Value => match ch {
                '}' | ']' | ',' => {
                    self.out.push_str("null");
                    self.set_top(Frame::Object(ObjectState::Next));
                }
                _ => self.value(ch),
            },
            ObjectState::Next => match ch {
                ',' => {
                    self.out.push(',');
                    self.set_top(Frame::Object(ObjectState::Key));
                    self.pos += 1;
                }
                '}' => self.close(),
                ']' => self.mismatched_closer(ch),
                _ => {
                    self.out.push(',');
                    self.set_top(Frame::Object(ObjectState::Key));
                }
            },
        }
    }

    fn in_array(&mut self, state: ArrayState, ch: char) {
        match state {
            ArrayState::Value => match ch {
                ']' => self.close(),
                '}' => self.mismatched_closer(ch),
                ',' => self.pos += 1,
                _ => self.value(ch),
            },
            ArrayState::Next => match ch {
                ',' => {
                    self.out.push(',');
                    self.set_top(Frame::Array(ArrayState::Value));
                    self.pos += 1;
                }
                ']' => self.close(),
                '}' => self.mismatched_closer(ch),
                _ => {
                    self.out.push(',');
                    self.set_top(Frame::Array(ArrayState::Value));
                }
            },
        }
    }

    fn value(&mut self, ch: char) {
        match ch {
            '{' | '[' => self.open(ch),
            '"' | '\'' => {
                self.string(ch);
                self.value_done();
            }
            '-' | '+' | '.' | '0'..='9' => {
                self.number();
                self.value_done();
            }
            c if is_word_start(c) => {
                let word = self.word();
                match word.as_str() {
                    "true" | "True" | "TRUE" => self.out.push_str("true"),
                    "false" | "False" | "FALSE" => self.out.push_str("false"),
                    "null" | "None" | "NULL" | "undefined" => self.out.push_str("null"),
                    _ => self.push_quoted(&word),
                }
                self.value_done();
            }
            _ => self.pos += 1,
        }
    }

    fn open(&mut self, ch: char) {
        self.started = true;
        self.out.push(ch);
        self.stack.push(if ch == '{' {
            Frame::Object(ObjectState::Key)
        } else {
            Frame::Array(ArrayState::Value)
        });
        self.pos += 1;
    }

    fn close(&mut self) {
        self.seal_top();
        self.pos += 1;
    }

    /// A closer that does not match the innermost container: close the
    /// inner container if an outer one matches, otherwise drop the char.
    fn mismatched_closer(&mut self, ch: char) {
        let depth = self.stack.len();
        let matches_outer = self.stack[..depth.saturating_sub(1)]
            .iter()
            .any(|frame| frame.closer() == ch);
        if matches_outer {
            self.seal_top();
        } else {
            self.pos += 1;
        }
    }

    fn seal_top(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        match frame {
            Frame::Object(ObjectState::Colon) => self.out.push_str(":null"),
            Frame::Object(ObjectState::Value) => self.out.push_str("null"),
            Frame::Object(ObjectState::Key) | Frame::Array(ArrayState::Value) => {
                self.trim_trailing_comma()
            }
            Frame::Object(ObjectState::Next) | Frame::Array(ArrayState::Next) => {}
        }
        self.out.push(frame.closer());
        self.value_done();
    }

    fn value_done(&mut self) {
        match self.stack.last_mut() {
            None => self.done = true,
            Some(frame @ Frame::Object(ObjectState::Value)) => {
                *frame = Frame::Object(ObjectState::Next)
            }
            Some(frame @ Frame::Array(ArrayState::Value)) => *frame = Frame::Array(ArrayState::Next),
            Some(_) => {}
        }
    }

    fn set_top(&mut self, frame: Frame) {
        if let Some(top) = self.stack.last_mut() {
            *top = frame;
        }
    }

    fn trim_trailing_comma(&mut self) {
        let keep = self.out.trim_end().len();
        self.out.truncate(keep);
        if self.out.ends_with(',') {
            self.out.pop();
        }
    }

    fn string(&mut self, quote: char) {
        self.out.push('"');
        self.pos += 1;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if c == '\\' {
                match self.chars.get(self.pos + 1).copied() {
                    Some('\'') => self.out.push('\''),
                    Some(next) if "\"\\/bfnrtu".contains(next) => {
                        self.out.push('\\');
                        self.out.push(next);
                    }
                    Some(next) => {
                        self.out.push_str("\\\\");
                        self.out.push(next);
                    }
                    None => {}
                }
                self.pos += 2;
                continue;
            }
            self.pos += 1;
            if c == quote {
                self.out.push('"');
                return;
            }
            match c {
                '"' => self.out.push_str("\\\""),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                c if (c as u32) < 0x20 => self.out.push_str(&format!("\\u{:04x}", c as u32)),
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }

    fn number(&mut self) {
        let start = self.pos;
        while self.pos < self.chars.len() && "0123456789+-.eE".contains(self.chars[self.pos]) {
            self.pos += 1;
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        let mut number = raw.trim_start_matches('+').to_string();
        if number.starts_with('.') {
            number.insert(0, '0');
        } else if number.starts_with("-.") {
            number.insert(1, '0');
        }
        if number.ends_with('.') {
            number.push('0');
        }
        if number.is_empty() || number == "-" {
            number = "null".to_string();
        }
        self.out.push_str(&number);
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.chars.len() && is_word_char(self.chars[self.pos]) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn push_quoted(&mut self, word: &str) {
        self.out.push('"');
        self.out.push_str(word);
        self.out.push('"');
    }

    fn skip_comment(&mut self) -> bool {
        match self.chars.get(self.pos + 1) {
            Some('/') => {
                while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
                    self.pos += 1;
                }
                true
            }
            Some('*') => {
                self.pos += 2;
                while self.pos < self.chars.len() {
                    if self.chars[self.pos] == '*' && self.chars.get(self.pos + 1) == Some(&'/') {
                        self.pos += 2;
                        return true;
                    }
                    self.pos += 1;
                }
                true
            }
            _ => false,
        }
    }
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '-'
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn truncated_array_is_closed_after_last_object() {
        assert_eq!(clean_response(r#"[{"a":1},{"a":2}"#), r#"[{"a":1},{"a":2}]"#);
        assert_eq!(clean_response(r#"[{"a":1},{"a":2"#), r#"[{"a":1}]"#);
        assert_eq!(clean_response(r#"[{"a":1},"#), r#"[{"a":1}]"#);
    }

    #[test]
    fn cleaning_is_idempotent() {
        let inputs = [
            r#"[{"a":1}]"#,
            "```json\n[{\"a\":1},{\"a\":2}]\n```",
            r#"[{"a":1},{"a":2"#,
            "",
            "   ",
        ];
        for input in inputs {
            let once = clean_response(input);
            assert_eq!(clean_response(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn fences_are_stripped_but_content_kept() {
        let raw = "```json\n[{\"name\":\"Widget\"}]\n```";
        assert_eq!(clean_response(raw), r#"[{"name":"Widget"}]"#);
    }

    #[test]
    fn strict_json_is_parsed_without_repair() {
        let parsed = parse_record_array(r#"[{"a":1},{"a":2}]"#).expect("parse");
        assert_eq!(parsed.records, vec![json!({"a": 1}), json!({"a": 2})]);
        assert!(!parsed.repaired);
    }

    #[test]
    fn repairs_unquoted_keys_quotes_and_trailing_commas() {
        let parsed =
            parse_record_array("[{name: 'Widget', price: 12.5, inStock: True,},]").expect("parse");
        assert!(parsed.repaired);
        assert_eq!(
            parsed.records,
            vec![json!({"name": "Widget", "price": 12.5, "inStock": true})]
        );
    }

    #[test]
    fn repairs_missing_commas_and_unbalanced_brackets() {
        let repaired = repair_json(r#"[{"a": 1} {"a": 2}"#);
        let value: Value = serde_json::from_str(&repaired).expect("valid json");
        assert_eq!(value, json!([{"a": 1}, {"a": 2}]));

        let repaired = repair_json(r#"[{"a": [1, 2}, {"b": "x"]"#);
        let value: Value = serde_json::from_str(&repaired).expect("valid json");
        assert_eq!(value, json!([{"a": [1, 2]}, {"b": "x"}]));
    }

    #[test]
    fn repair_skips_leading_prose_and_comments() {
        let repaired = repair_json("Here you go:\n[ // first\n {\"a\": 1} /* end */ ]");
        let value: Value = serde_json::from_str(&repaired).expect("valid json");
        assert_eq!(value, json!([{"a": 1}]));
    }

    #[test]
    fn repair_fills_missing_values() {
        let repaired = repair_json(r#"[{"a": , "b"}]"#);
        let value: Value = serde_json::from_str(&repaired).expect("valid json");
        assert_eq!(value, json!([{"a": null, "b": null}]));
    }

    #[test]
    fn non_array_output_is_malformed() {
        let err = parse_record_array(r#"{"a": 1}"#).unwrap_err();
        match err {
            CoreError::MalformedOutput { reason, .. } => {
                assert!(reason.contains("an object"), "reason: {reason}")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn hopeless_output_keeps_cleaned_text() {
        let err = parse_record_array("I cannot help with that.").unwrap_err();
        match err {
            CoreError::MalformedOutput { cleaned, .. } => {
                assert_eq!(cleaned, "I cannot help with that.]")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
