//! 智能体推荐
//!
//! 让模型从名册中挑一个最合适的智能体，回复按三级容错解析：
//! 整段 JSON → 正则截取首个 `{` 到最后一个 `}` → 回退到名册第一个智能体。
//! 名册非空时永远给出可用结果，调用方不会收到错误。

use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::RecommendSection;
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::store::Agent;

const SYSTEM_PROMPT: &str = r#"You are an AI assistant that helps select the most appropriate agent for a given question.
You will be given a list of available agents and their capabilities.
Your task is to analyze the question and select the most suitable agent.
You must respond with a valid JSON object in this exact format:
{
    "selected_agent": "agent_name",
    "reason": "explanation of why this agent is the best choice"
}

Do not include any other text or explanation outside the JSON object."#;

const JSON_BLOCK: &str = r"(?s)\{.*\}";

/// 推荐结果来自哪一级解析
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStage {
    Direct,
    Extracted,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Recommendation {
    Selected {
        agent: String,
        reason: String,
        stage: ParseStage,
    },
    /// 名册为空，未请求模型
    NoAgents,
}

pub struct RecommendationResolver {
    llm: Arc<dyn LlmClient>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl RecommendationResolver {
    pub fn new(llm: Arc<dyn LlmClient>, cfg: &RecommendSection) -> Self {
        Self {
            llm,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }

    pub async fn recommend(&self, question: &str, roster: &[Agent]) -> Recommendation {
        let Some(first) = roster.first() else {
            return Recommendation::NoAgents;
        };

        let request = CompletionRequest::new(
            &self.model,
            self.temperature,
            self.max_tokens,
            vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(roster_prompt(question, roster)),
            ],
        );
        let recommendation = match self.llm.complete(&request).await {
            Ok(text) => resolve_response(&text, roster),
            Err(e) => fallback(first, format!("Default agent selected due to error: {}", e)),
        };
        if let Recommendation::Selected { agent, stage, .. } = &recommendation {
            tracing::info!(agent = %agent, stage = ?stage, "agent recommended");
        }
        recommendation
    }
}

fn roster_prompt(question: &str, roster: &[Agent]) -> String {
    let agents: Vec<Value> = roster
        .iter()
        .map(|a| json!({ "name": a.name, "description": a.description, "tools": a.tools }))
        .collect();
    let agent_info = serde_json::to_string_pretty(&agents).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Available agents:\n{agent_info}\n\nQuestion: {question}\n\n\
         Which agent would be most suitable for this question? Respond with a JSON object only."
    )
}

fn fallback(first: &Agent, reason: String) -> Recommendation {
    tracing::warn!(agent = %first.name, reason = %reason, "recommendation fell back to first agent");
    Recommendation::Selected {
        agent: first.name.clone(),
        reason,
        stage: ParseStage::Fallback,
    }
}

/// 解析模型回复并在名册中定位推荐的智能体；roster 为空时返回 NoAgents
pub fn resolve_response(text: &str, roster: &[Agent]) -> Recommendation {
    let Some(first) = roster.first() else {
        return Recommendation::NoAgents;
    };

    let (value, stage) = match parse_recommendation(text.trim()) {
        Ok(parsed) => parsed,
        Err(reason) => {
            return fallback(
                first,
                format!("Default agent selected due to parsing error. Original error: {}", reason),
            )
        }
    };

    let Some(selected) = value.as_object().and_then(|obj| obj.get("selected_agent")) else {
        return fallback(
            first,
            "Default agent selected due to invalid response format".to_string(),
        );
    };
    let selected = match selected {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let Some(agent) = roster.iter().find(|a| a.name == selected) else {
        return fallback(
            first,
            format!("Default agent selected. Recommended agent '{}' not found", selected),
        );
    };

    let reason = match value.get("reason") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "No reason provided".to_string(),
    };
    Recommendation::Selected {
        agent: agent.name.clone(),
        reason,
        stage,
    }
}

fn parse_recommendation(text: &str) -> Result<(Value, ParseStage), String> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok((value, ParseStage::Direct));
    }
    let re = Regex::new(JSON_BLOCK).map_err(|e| e.to_string())?;
    let block = re
        .find(text)
        .ok_or_else(|| "No JSON object found in response".to_string())?;
    serde_json::from_str::<Value>(block.as_str())
        .map(|value| (value, ParseStage::Extracted))
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};

    fn roster() -> Vec<Agent> {
        vec![
            Agent::new("generalist", "Answers anything").with_tools(["search"]),
            Agent::new("X", "Weather expert").with_tools(["weather"]),
        ]
    }

    fn selected(rec: &Recommendation) -> (&str, &str, ParseStage) {
        match rec {
            Recommendation::Selected { agent, reason, stage } => {
                (agent.as_str(), reason.as_str(), *stage)
            }
            Recommendation::NoAgents => panic!("expected a selection"),
        }
    }

    #[test]
    fn test_direct_parse() {
        let rec = resolve_response(r#"  {"selected_agent":"X","reason":"fits"}  "#, &roster());
        assert_eq!(selected(&rec), ("X", "fits", ParseStage::Direct));
    }

    #[test]
    fn test_extracted_from_surrounding_text() {
        let rec = resolve_response(
            "blah {\"selected_agent\":\"X\",\"reason\":\"fits\"} blah",
            &roster(),
        );
        assert_eq!(selected(&rec), ("X", "fits", ParseStage::Extracted));
    }

    #[test]
    fn test_extracted_across_lines() {
        let rec = resolve_response(
            "Here you go:\n```json\n{\n  \"selected_agent\": \"X\"\n}\n```",
            &roster(),
        );
        assert_eq!(selected(&rec), ("X", "No reason provided", ParseStage::Extracted));
    }

    #[test]
    fn test_unparseable_falls_back() {
        let rec = resolve_response("I think X is best.", &roster());
        let (agent, reason, stage) = selected(&rec);
        assert_eq!(agent, "generalist");
        assert_eq!(stage, ParseStage::Fallback);
        assert_eq!(
            reason,
            "Default agent selected due to parsing error. Original error: No JSON object found in response"
        );

        let rec = resolve_response("{selected_agent: X}", &roster());
        let (_, reason, _) = selected(&rec);
        assert!(reason.starts_with("Default agent selected due to parsing error. Original error: "));
    }

    #[test]
    fn test_missing_field_falls_back() {
        let rec = resolve_response(r#"{"agent":"X"}"#, &roster());
        assert_eq!(
            selected(&rec),
            (
                "generalist",
                "Default agent selected due to invalid response format",
                ParseStage::Fallback
            )
        );
        let rec = resolve_response(r#"["X"]"#, &roster());
        assert_eq!(selected(&rec).2, ParseStage::Fallback);
    }

    #[test]
    fn test_unknown_agent_falls_back_naming_it() {
        let rec = resolve_response(r#"{"selected_agent":"Y","reason":"?"}"#, &roster());
        assert_eq!(
            selected(&rec),
            (
                "generalist",
                "Default agent selected. Recommended agent 'Y' not found",
                ParseStage::Fallback
            )
        );
    }

    #[tokio::test]
    async fn test_empty_roster_skips_provider() {
        let llm = Arc::new(MockLlmClient::new());
        let resolver = RecommendationResolver::new(llm.clone(), &RecommendSection::default());
        assert_eq!(resolver.recommend("anything", &[]).await, Recommendation::NoAgents);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_falls_back() {
        let llm = Arc::new(MockLlmClient::new());
        llm.push_error(LlmError::Timeout(60));
        let resolver = RecommendationResolver::new(llm.clone(), &RecommendSection::default());

        let rec = resolver.recommend("weather?", &roster()).await;
        assert_eq!(
            selected(&rec),
            (
                "generalist",
                "Default agent selected due to error: request timed out after 60s",
                ParseStage::Fallback
            )
        );
    }

    #[tokio::test]
    async fn test_prompt_lists_roster_and_uses_configured_sampling() {
        let llm = Arc::new(MockLlmClient::with_replies([
            r#"{"selected_agent":"X","reason":"weather"}"#,
        ]));
        let resolver = RecommendationResolver::new(llm.clone(), &RecommendSection::default());

        let rec = resolver.recommend("Will it rain?", &roster()).await;
        assert_eq!(selected(&rec), ("X", "weather", ParseStage::Direct));

        let req = &llm.requests()[0];
        assert_eq!(req.temperature, 0.3);
        assert_eq!(req.max_tokens, 1024);
        assert!(req.messages[0].content.contains("\"selected_agent\": \"agent_name\""));
        let user = &req.messages[1].content;
        assert!(user.starts_with("Available agents:\n["));
        assert!(user.contains("\"name\": \"X\""));
        assert!(user.contains("Question: Will it rain?"));
    }
}
