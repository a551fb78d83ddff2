//! Monitoring control and status methods.

use crate::settings::SettingsPatch;
use crate::AppContext;
use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn get_status(_params: Value, ctx: &AppContext) -> Result<Value> {
    Ok(serde_json::to_value(ctx.engine.snapshot().await)?)
}

pub async fn get_settings(_params: Value, ctx: &AppContext) -> Result<Value> {
    Ok(serde_json::to_value(
        ctx.engine.settings_store().current().await,
    )?)
}

/// Start an explicit session — the watcher will not auto-stop it.
pub async fn start(_params: Value, ctx: &AppContext) -> Result<Value> {
    let started = Arc::clone(&ctx.engine).start_monitoring(false).await;
    Ok(json!({ "started": started }))
}

pub async fn stop(_params: Value, ctx: &AppContext) -> Result<Value> {
    let stopped = ctx.engine.stop_monitoring().await;
    Ok(json!({ "stopped": stopped }))
}

/// Fire-and-forget wireless restart: the reset runs on its own task and the
/// call returns immediately; the outcome lands in the restart counter and
/// the `link.remediated` event.
pub async fn force_restart(_params: Value, ctx: &AppContext) -> Result<Value> {
    let engine = Arc::clone(&ctx.engine);
    tokio::spawn(async move {
        engine.restart_link().await;
    });
    Ok(json!({ "scheduled": true }))
}

pub async fn update_settings(params: Value, ctx: &AppContext) -> Result<Value> {
    let patch: SettingsPatch = serde_json::from_value(params)?;
    let merged = ctx.engine.apply_settings(&patch).await?;
    Ok(serde_json::to_value(merged)?)
}
