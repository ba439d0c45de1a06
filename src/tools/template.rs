//! 占位符替换
//!
//! - 路径：`<name>`，命中的参数从后续参数集中移除（不再进入 query / body）
//! - body：`$name` 或 `${name}`，`$$` 表示字面量 `$`；所有占位符必须有值，否则报 TemplateSubstitution

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::core::ToolError;

const BODY_PLACEHOLDER: &str =
    r"\$(?:(?P<escaped>\$)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\}|(?P<invalid>))";

/// 参数值转为插入文本：字符串原样，其它 JSON 值用紧凑 JSON 文本
pub fn param_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 替换路径中的 `<name>`，返回替换后的路径与未被路径消耗的参数
pub fn substitute_path(path: &str, params: &Map<String, Value>) -> (String, Map<String, Value>) {
    let mut path = path.to_string();
    let mut remaining = Map::new();
    for (name, value) in params {
        let placeholder = format!("<{name}>");
        if path.contains(&placeholder) {
            path = path.replace(&placeholder, &param_to_string(value));
        } else {
            remaining.insert(name.clone(), value.clone());
        }
    }
    (path, remaining)
}

/// 渲染 body 模板；缺值或非法 `$` 时报错，并列出全部缺失的占位符
pub fn render_body(template: &str, params: &Map<String, Value>) -> Result<String, ToolError> {
    let re = Regex::new(BODY_PLACEHOLDER)
        .map_err(|e| ToolError::TemplateSubstitution(e.to_string()))?;

    let mut missing: Vec<String> = Vec::new();
    let mut invalid_at: Option<usize> = None;

    let rendered = re.replace_all(template, |caps: &Captures| {
        if caps.name("escaped").is_some() {
            return "$".to_string();
        }
        let name = caps.name("named").or_else(|| caps.name("braced"));
        match name {
            Some(m) => match params.get(m.as_str()) {
                Some(v) => param_to_string(v),
                None => {
                    if !missing.iter().any(|n| n == m.as_str()) {
                        missing.push(m.as_str().to_string());
                    }
                    String::new()
                }
            },
            None => {
                invalid_at.get_or_insert(caps.get(0).map(|m| m.start()).unwrap_or(0));
                String::new()
            }
        }
    });

    if let Some(pos) = invalid_at {
        return Err(ToolError::TemplateSubstitution(format!(
            "invalid placeholder at position {pos}"
        )));
    }
    if !missing.is_empty() {
        let names = missing
            .iter()
            .map(|n| format!("${n}"))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ToolError::TemplateSubstitution(format!(
            "no value for placeholder(s) {names}"
        )));
    }
    Ok(rendered.into_owned())
}
