//! Diagnostic bundle methods.

use crate::AppContext;
use anyhow::Result;
use serde_json::{json, Value};
use tracing::error;

/// Bundle generation reports failure in-band rather than as an RPC error,
/// so callers always get a `{ success, error? }` document.
pub async fn generate(_params: Value, ctx: &AppContext) -> Result<Value> {
    match ctx.reporter.generate().await {
        Ok(path) => Ok(json!({
            "success": true,
            "filename": path.file_name().map(|f| f.to_string_lossy().into_owned())
        })),
        Err(e) => {
            error!(err = %e, "diagnostic bundle generation failed");
            Ok(json!({ "success": false, "error": e.to_string() }))
        }
    }
}

pub async fn list(_params: Value, ctx: &AppContext) -> Result<Value> {
    Ok(serde_json::to_value(ctx.reporter.list().await)?)
}

pub async fn delete_all(_params: Value, ctx: &AppContext) -> Result<Value> {
    Ok(json!(ctx.reporter.delete_all().await))
}
