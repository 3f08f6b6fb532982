//! 状态重建、回放与持久化测试

use std::collections::HashSet;
use std::sync::Arc;

use hive::agent::LlmAgent;
use hive::config::AppConfig;
use hive::core::OrchestratorBuilder;
use hive::llm::{ModelResponse, ScriptedModel};
use hive::session::EventKind;
use hive::state::reconstruct_state;
use hive::tools::FunctionTool;
use serde_json::json;

fn bookkeeper(responses: Vec<ModelResponse>) -> Arc<LlmAgent> {
    let record = FunctionTool::from_fn(
        "record",
        "Writes the given entries to state",
        json!({
            "type": "object",
            "properties": {
                "set": { "type": "object" },
                "delete": { "type": "array", "items": { "type": "string" } }
            }
        }),
        |args, ctx| {
            if let Some(entries) = args["set"].as_object() {
                for (key, value) in entries {
                    ctx.state.set(key, value.clone())?;
                }
            }
            if let Some(keys) = args["delete"].as_array() {
                for key in keys.iter().filter_map(|k| k.as_str()) {
                    ctx.state.delete(key)?;
                }
            }
            Ok(json!({ "recorded": true }))
        },
    );
    LlmAgent::builder("bookkeeper", Arc::new(ScriptedModel::new(responses)))
        .tool(record)
        .output_key("last_answer")
        .build()
}

#[tokio::test]
async fn test_replayed_state_matches_live_state() {
    let agent = bookkeeper(vec![
        ModelResponse::tool_call(
            "record",
            json!({ "set": { "cart": ["mug"], "temp:step": 1, "user:currency": "EUR" } }),
        ),
        ModelResponse::text("added a mug"),
        ModelResponse::tool_call(
            "record",
            json!({ "set": { "cart": ["mug", "pen"], "temp:step": 2 }, "delete": ["temp:step"] }),
        ),
        ModelResponse::text("added a pen"),
    ]);
    let mut cfg = AppConfig::default();
    cfg.app_state.insert("store".into(), json!("demo"));
    let orch = OrchestratorBuilder::new(agent).with_config(cfg).build().unwrap();
    let sid = orch.start_session("carol").await.unwrap();
    orch.send(&sid, "add a mug").await.unwrap();
    orch.send(&sid, "add a pen").await.unwrap();

    let events = orch.events(&sid).await.unwrap();
    let rebuilt = reconstruct_state(&events);
    let live = orch.state_snapshot(&sid).await.unwrap();
    assert_eq!(rebuilt, live);
    assert_eq!(live.get("cart"), Some(&json!(["mug", "pen"])));
    assert_eq!(live.get("user:currency"), Some(&json!("EUR")));
    assert_eq!(live.get("last_answer"), Some(&json!("added a pen")));
    assert!(!live.contains_key("temp:step"));
    assert!(!live.contains_key("app:store"));

    // 部分回放只能得到中间状态
    let first_turn_end = events
        .iter()
        .find(|e| e.kind == EventKind::AgentResponse)
        .unwrap()
        .seq;
    let partial = reconstruct_state(events.iter().take(first_turn_end as usize + 2));
    assert_eq!(partial.get("cart"), Some(&json!(["mug"])));
    assert_eq!(partial.get("temp:step"), Some(&json!(1)));
}

#[tokio::test]
async fn test_replay_is_bounded_and_restartable() {
    let agent = bookkeeper(vec![
        ModelResponse::text("one"),
        ModelResponse::text("two"),
        ModelResponse::text("three"),
    ]);
    let orch = OrchestratorBuilder::new(agent).build().unwrap();
    let sid = orch.start_session("u").await.unwrap();
    orch.send(&sid, "1").await.unwrap();

    let mut replay = orch.replay(&sid, 1).await.unwrap();
    orch.send(&sid, "2").await.unwrap();

    let (start, end) = replay.bounds();
    assert_eq!(start, 1);
    let first: Vec<u64> = replay.by_ref().map(|e| e.seq).collect();
    assert_eq!(first, (1..end).collect::<Vec<_>>());
    // 回放开始后追加的事件不在区间内
    assert!(end < orch.events(&sid).await.unwrap().len() as u64);

    replay.restart();
    let again: Vec<u64> = replay.map(|e| e.seq).collect();
    assert_eq!(again, first);
}

#[tokio::test]
async fn test_correlation_ids_group_turns() {
    let agent = bookkeeper(vec![ModelResponse::text("a"), ModelResponse::text("b")]);
    let orch = OrchestratorBuilder::new(agent).build().unwrap();
    let sid = orch.start_session("u").await.unwrap();
    let first = orch.send(&sid, "x").await.unwrap();
    let second = orch.send(&sid, "y").await.unwrap();

    let events = orch.events(&sid).await.unwrap();
    let ids: HashSet<&str> = events.iter().map(|e| e.correlation_id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(first.correlation_id.starts_with("turn_"));
    let second_turn: Vec<EventKind> = events
        .iter()
        .filter(|e| e.correlation_id == second.correlation_id)
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        second_turn,
        vec![EventKind::UserMessage, EventKind::AgentResponse, EventKind::StateMutation]
    );
}

#[tokio::test]
async fn test_user_state_persists_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = AppConfig::default();
    cfg.state.backend = "sqlite".into();
    cfg.state.sqlite_path = dir.path().join("state.db");

    {
        let agent = bookkeeper(vec![
            ModelResponse::tool_call("record", json!({ "set": { "user:language": "fr", "draft": "x" } })),
            ModelResponse::text("noted"),
        ]);
        let orch = OrchestratorBuilder::new(agent).with_config(cfg.clone()).build().unwrap();
        let sid = orch.start_session("dana").await.unwrap();
        orch.send(&sid, "I speak French").await.unwrap();
        orch.end_session(&sid).await.unwrap();
    }

    let agent = bookkeeper(vec![]);
    let orch = OrchestratorBuilder::new(agent).with_config(cfg).build().unwrap();
    let sid = orch.start_session("dana").await.unwrap();
    assert_eq!(orch.get_state(&sid, "user:language").await.unwrap(), Some(json!("fr")));
    assert_eq!(orch.get_state(&sid, "draft").await.unwrap(), None);

    let other = orch.start_session("erin").await.unwrap();
    assert_eq!(orch.get_state(&other, "user:language").await.unwrap(), None);
}

#[tokio::test]
async fn test_returning_user_replay_matches_live_state() {
    let agent = bookkeeper(vec![
        ModelResponse::tool_call("record", json!({ "set": { "user:lang": "de" } })),
        ModelResponse::text("saved"),
        ModelResponse::tool_call("record", json!({ "set": { "cart": ["lamp"] } })),
        ModelResponse::text("added"),
    ]);
    let orch = OrchestratorBuilder::new(agent).build().unwrap();

    let first = orch.start_session("dana").await.unwrap();
    orch.send(&first, "I prefer German").await.unwrap();
    orch.end_session(&first).await.unwrap();

    let second = orch.start_session("dana").await.unwrap();
    orch.send(&second, "add a lamp").await.unwrap();

    let live = orch.state_snapshot(&second).await.unwrap();
    assert_eq!(live.get("user:lang"), Some(&json!("de")));
    assert_eq!(live.get("cart"), Some(&json!(["lamp"])));
    assert_eq!(orch.rebuild_state(&second).await.unwrap(), live);

    // 仅回放本会话事件会丢失继承的 user: 键
    let events = orch.events(&second).await.unwrap();
    assert!(!reconstruct_state(&events).contains_key("user:lang"));
}
