//! Hive 命令行入口
//!
//! 加载配置、初始化日志，按子命令调用编排器 / 推荐器 / 目录，结果以 JSON 打印到 stdout。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use hive::config::{load_config, AppConfig};
use hive::llm::create_llm_from_config;
use hive::store::{Agent, JsonFileStore, Store, Tool};
use hive::tools::HttpToolInvoker;
use hive::{observability, Catalog, DialogOrchestrator, RecommendationResolver};

#[derive(Parser)]
#[command(name = "hive")]
#[command(about = "Agent dispatch engine: single-round HTTP tool calls and agent recommendation")]
struct Cli {
    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask an agent (at most one tool call)
    Ask {
        agent: String,
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Pick the best agent for a question
    Recommend {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Recent interaction logs, newest first
    Logs {
        agent: String,
        /// 默认取 [app].log_limit
        limit: Option<usize>,
    },
    /// List agents
    Agents,
    /// List tools
    Tools,
    /// Create a tool from a JSON record
    AddTool { file: PathBuf },
    /// Create an agent from a JSON record
    AddAgent { file: PathBuf },
    /// Delete a tool not used by any agent
    DeleteTool { name: String },
    /// Delete an agent
    DeleteAgent { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    observability::init();

    let cfg = load_config(cli.config).context("Failed to load config")?;
    let store: Arc<dyn Store> = Arc::new(
        JsonFileStore::open(&cfg.app.data_dir)
            .with_context(|| format!("Failed to open data dir {}", cfg.app.data_dir.display()))?,
    );
    let catalog = Catalog::new(store.clone());

    match cli.command {
        Command::Ask { agent, question } => {
            let llm = create_llm_from_config(&cfg);
            let invoker = Arc::new(HttpToolInvoker::from_config(&cfg.tools));
            let orchestrator = DialogOrchestrator::new(llm, invoker, store);
            let outcome = orchestrator.ask(&agent, &question.join(" ")).await?;
            print_json(&outcome)
        }
        Command::Recommend { question } => {
            let resolver = RecommendationResolver::new(create_llm_from_config(&cfg), &cfg.recommend);
            let roster = catalog.list_agents()?;
            print_json(&resolver.recommend(&question.join(" "), &roster).await)
        }
        Command::Logs { agent, limit } => {
            print_json(&catalog.agent_logs(&agent, limit.unwrap_or(cfg.app.log_limit))?)
        }
        Command::Agents => print_json(&catalog.list_agents()?),
        Command::Tools => print_json(&catalog.list_tools()?),
        Command::AddTool { file } => {
            let tool: Tool = serde_json::from_value(read_json(&file)?)
                .with_context(|| format!("invalid tool record in {}", file.display()))?;
            catalog.create_tool(tool.clone())?;
            print_json(&tool)
        }
        Command::AddAgent { file } => {
            let agent = agent_from_record(read_json(&file)?, &cfg)
                .with_context(|| format!("invalid agent record in {}", file.display()))?;
            catalog.create_agent(agent.clone())?;
            print_json(&agent)
        }
        Command::DeleteTool { name } => {
            print_json(&serde_json::json!({ "deleted": catalog.delete_tool(&name)? }))
        }
        Command::DeleteAgent { name } => {
            print_json(&serde_json::json!({ "deleted": catalog.delete_agent(&name)? }))
        }
    }
}

fn read_json(file: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", file.display()))
}

/// 缺省的模型与采样参数取自 [agents] 配置
fn agent_from_record(mut record: Value, cfg: &AppConfig) -> anyhow::Result<Agent> {
    let Some(obj) = record.as_object_mut() else {
        bail!("agent record must be a JSON object");
    };
    obj.entry("model").or_insert_with(|| Value::from(cfg.agents.model.clone()));
    obj.entry("temperature").or_insert_with(|| Value::from(cfg.agents.temperature));
    obj.entry("max_tokens").or_insert_with(|| Value::from(cfg.agents.max_tokens));
    Ok(serde_json::from_value(record)?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
