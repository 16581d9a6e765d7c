//! Parser module for LLM response parsing.
//!
//! Turns a model reply into either tool calls or final text. Providers that
//! return structured tool calls are passed through; text-only providers are
//! parsed from the formats models actually produce.

use serde_json::{json, Value};

use bouncer_core::{traits::LlmResponse, types::ToolCall};

/// Marker for an explicit final answer.
pub const FINAL_ANSWER: &str = "FINAL ANSWER:";

/// Keys that carry call arguments in the simple JSON format.
const ARGUMENT_KEYS: [&str; 3] = ["arguments", "args", "parameters"];

/// What the model asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    /// One or more tool invocations, in model order.
    ToolCalls(Vec<ToolCall>),
    /// Terminal text.
    Final(String),
}

/// Parser for LLM responses, supporting multiple formats.
pub struct ResponseParser;

impl ResponseParser {
    /// Parse a model response. Structured tool calls win over content.
    pub fn parse(response: &LlmResponse) -> ParsedReply {
        if !response.tool_calls.is_empty() {
            return ParsedReply::ToolCalls(response.tool_calls.clone());
        }
        Self::parse_text(&response.content)
    }

    /// Parse raw reply text.
    pub fn parse_text(text: &str) -> ParsedReply {
        let trimmed = text.trim();

        // 1. Explicit final answer
        if let Some(answer) = trimmed.strip_prefix(FINAL_ANSWER) {
            return ParsedReply::Final(answer.trim().to_string());
        }

        // 2. JSON tool calls, possibly fenced
        if let Some(calls) = Self::try_parse_json_calls(strip_code_fence(trimmed)) {
            return ParsedReply::ToolCalls(calls);
        }

        // 3. ACTION + ARGS text format
        if let Some(call) = Self::try_parse_text_format(trimmed) {
            return ParsedReply::ToolCalls(vec![call]);
        }

        // 4. Final answer after some reasoning
        if let Some(idx) = trimmed.find(FINAL_ANSWER) {
            return ParsedReply::Final(trimmed[idx + FINAL_ANSWER.len()..].trim().to_string());
        }

        ParsedReply::Final(trimmed.to_string())
    }

    fn try_parse_json_calls(text: &str) -> Option<Vec<ToolCall>> {
        if !(text.starts_with('{') || text.starts_with('[')) {
            return None;
        }
        let json: Value = serde_json::from_str(text).ok()?;

        let calls: Vec<ToolCall> = match &json {
            Value::Array(items) => items.iter().filter_map(Self::extract_tool_call).collect(),
            Value::Object(map) => match map.get("tool_calls") {
                Some(Value::Array(items)) => {
                    items.iter().filter_map(Self::extract_tool_call).collect()
                }
                _ => Self::extract_tool_call(&json).into_iter().collect(),
            },
            _ => Vec::new(),
        };

        if calls.is_empty() {
            None
        } else {
            Some(calls)
        }
    }

    /// Extract a tool call from a JSON object.
    fn extract_tool_call(json: &Value) -> Option<ToolCall> {
        // OpenAI format: { "function": { "name": "...", "arguments": "..." } }
        if let Some(func) = json.get("function") {
            let name = func.get("name")?.as_str()?;
            let args = match func.get("arguments") {
                Some(Value::String(raw)) => serde_json::from_str(raw).ok()?,
                Some(other) => other.clone(),
                None => json!({}),
            };
            return Some(Self::with_id(json, name, args));
        }

        // Simple format: { "name": "...", "arguments": {...} }
        // A bare `name` is ordinary data, not a call.
        let name = json.get("name")?.as_str()?;
        let args = ARGUMENT_KEYS.iter().find_map(|key| json.get(*key))?.clone();
        Some(Self::with_id(json, name, args))
    }

    fn with_id(json: &Value, name: &str, args: Value) -> ToolCall {
        let mut call = ToolCall::new(name.trim(), args);
        if let Some(id) = json.get("id").and_then(Value::as_str) {
            call.id = id.to_string();
        }
        call
    }

    /// Try to parse ACTION/ARGS text format.
    fn try_parse_text_format(response: &str) -> Option<ToolCall> {
        let mut tool_name = None;
        let mut args_json = None;

        for line in response.lines() {
            let line = line.trim();
            if let Some(name) = line.strip_prefix("ACTION:") {
                tool_name = Some(name.trim().to_string());
            } else if let Some(args) = line.strip_prefix("ARGS:") {
                args_json = Some(args.trim().to_string());
            }
        }

        // Tool identifiers never contain whitespace; prose after ACTION: is not a call.
        let name = tool_name.filter(|n| !n.is_empty() && !n.contains(char::is_whitespace))?;
        let args = match args_json {
            Some(raw) => serde_json::from_str(&raw).ok()?,
            None => json!({}),
        };
        Some(ToolCall::new(name, args))
    }
}

/// Strip a surrounding markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    match body.split_once('\n') {
        Some((_, inner)) => inner.trim(),
        None => body.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calls(reply: ParsedReply) -> Vec<ToolCall> {
        match reply {
            ParsedReply::ToolCalls(calls) => calls,
            other => panic!("Expected ToolCalls, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_final_answer() {
        let reply = ResponseParser::parse_text("FINAL ANSWER: The result is 42.");
        assert_eq!(reply, ParsedReply::Final("The result is 42.".into()));
    }

    #[test]
    fn test_final_answer_after_reasoning() {
        let reply = ResponseParser::parse_text("I have both parts.\nFINAL ANSWER: Done.");
        assert_eq!(reply, ParsedReply::Final("Done.".into()));
    }

    #[test]
    fn test_plain_text_is_final() {
        let reply = ResponseParser::parse_text("  Here is your report.  ");
        assert_eq!(reply, ParsedReply::Final("Here is your report.".into()));
    }

    #[test]
    fn test_parse_tool_calls_envelope() {
        let text = r#"{"tool_calls": [
            {"name": "Researcher", "arguments": {"task": "find"}},
            {"id": "call_7", "name": "Writer", "arguments": {"task": "write"}}
        ]}"#;
        let calls = calls(ResponseParser::parse_text(text));

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "Researcher");
        assert_eq!(calls[0].arguments["task"], "find");
        assert_eq!(calls[1].id, "call_7");
    }

    #[test]
    fn test_parse_fenced_array() {
        let text = "```json\n[{\"name\": \"web_search\", \"args\": {\"query\": \"rust\"}}]\n```";
        let calls = calls(ResponseParser::parse_text(text));
        assert_eq!(calls[0].name, "web_search");
        assert_eq!(calls[0].arguments["query"], "rust");
    }

    #[test]
    fn test_parse_openai_function_format() {
        let text = r#"{"function": {"name": "calculator", "arguments": "{\"a\": 5}"}}"#;
        let calls = calls(ResponseParser::parse_text(text));
        assert_eq!(calls[0].name, "calculator");
        assert_eq!(calls[0].arguments["a"], 5);
    }

    #[test]
    fn test_parse_text_tool_call() {
        let text = "THOUGHT: I need to search.\nACTION: search\nARGS: {\"query\": \"rust\"}";
        let calls = calls(ResponseParser::parse_text(text));
        assert_eq!(calls[0].name, "search");
        assert_eq!(calls[0].arguments["query"], "rust");
    }

    #[test]
    fn test_json_without_calls_is_final() {
        let reply = ResponseParser::parse_text(r#"{"summary": "all good"}"#);
        assert!(matches!(reply, ParsedReply::Final(text) if text.contains("all good")));
    }

    #[test]
    fn test_json_data_with_name_is_final() {
        let text = r#"{"name": "Alice", "age": 3}"#;
        assert_eq!(ResponseParser::parse_text(text), ParsedReply::Final(text.into()));

        let fenced = "```json\n[{\"name\": \"Bob\"}]\n```";
        assert!(matches!(ResponseParser::parse_text(fenced), ParsedReply::Final(_)));
    }

    #[test]
    fn test_action_prose_is_final() {
        let text = "Summary of the plan.\nACTION: buy more index funds next quarter";
        assert!(matches!(ResponseParser::parse_text(text), ParsedReply::Final(_)));

        let calls = calls(ResponseParser::parse_text("ACTION: web_search\nARGS: {\"query\": \"x\"}"));
        assert_eq!(calls[0].name, "web_search");
    }

    #[test]
    fn test_structured_calls_win() {
        let call = ToolCall::new("Writer", json!({"task": "x"}));
        let mut response = LlmResponse::with_tool_calls(vec![call.clone()]);
        response.content = "FINAL ANSWER: ignored".into();
        assert_eq!(ResponseParser::parse(&response), ParsedReply::ToolCalls(vec![call]));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"tools\": []}\n```"), "{\"tools\": []}");
        assert_eq!(strip_code_fence("```{}```"), "{}");
        assert_eq!(strip_code_fence(" plain "), "plain");
    }
}
