//! Hive - 多智能体编排演示
//!
//! 入口：初始化日志、加载配置、用 Mock 模型组装单 Agent 编排器，并在标准输入上逐行对话。
//! 命令：/state <key> 查看状态，/events 打印事件日志，/path 查看活动路径，/quit 退出。

use std::sync::Arc;

use anyhow::Context;
use hive::config::load_config;
use hive::llm::{MockLlmClient, TextModel};
use hive::tools::EchoTool;
use hive::{observability, LlmAgent, OrchestratorBuilder};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config = load_config(std::env::args().nth(1).map(Into::into)).context("Failed to load config")?;

    let model = Arc::new(TextModel::new(Arc::new(MockLlmClient)));
    let assistant = LlmAgent::builder("assistant", model)
        .description("Demo assistant backed by the echo mock model")
        .instruction("You are {app:name?}, a helpful assistant. Use tools when useful.")
        .tool(EchoTool)
        .output_key("last_reply")
        .build();

    let orchestrator = OrchestratorBuilder::new(assistant)
        .with_config(config)
        .build()
        .context("Failed to build orchestrator")?;
    let session_id = orchestrator.start_session("local").await?;
    println!("hive ready (session {session_id}); type /quit to exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/state", key) => {
                let value = orchestrator.get_state(&session_id, key.trim()).await?;
                println!("{} = {}", key.trim(), value.map(|v| v.to_string()).unwrap_or_else(|| "(unset)".into()));
            }
            ("/events", _) => {
                for e in orchestrator.events(&session_id).await? {
                    println!("#{:<3} {:<14} {:<12} {}", e.seq, format!("{:?}", e.kind), e.actor, e.payload);
                }
            }
            ("/path", _) => println!("{:?}", orchestrator.active_path(&session_id).await?),
            _ => match orchestrator.send(&session_id, line).await {
                Ok(resp) => println!("[{}] {}", resp.author, resp.text),
                Err(failure) => eprintln!("turn failed: {failure}"),
            },
        }
    }

    orchestrator.end_session(&session_id).await?;
    Ok(())
}
