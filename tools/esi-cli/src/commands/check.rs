//! Configuration validation.

use anyhow::{Context as _, Result};
use esi_core::format_duration;
use esi_executor::{EsiMiddleware, ScopeRuntime};
use serde_json::{json, Value};

use crate::context::Context;

/// Run the check command.
pub async fn run(ctx: &Context) -> Result<()> {
    let (path, config) = ctx.config()?;
    let esi = EsiMiddleware::from_config(&config)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    if ctx.output.is_json() {
        let scopes: Vec<Value> = esi.scopes().iter().map(|s| describe(&esi, s)).collect();
        ctx.output.json(&json!({
            "config": path.display().to_string(),
            "scopes": scopes,
        }));
        return Ok(());
    }

    ctx.output
        .success(&format!("{} is valid ({} scopes)", path.display(), esi.scopes().len()));

    for runtime in esi.scopes() {
        let scope = runtime.config();
        ctx.output.header(&format!("Scope {}", scope.scope));
        ctx.output.kv("timeout", &format_duration(scope.timeout));
        ctx.output.kv("ttl", &format_duration(scope.ttl));
        ctx.output.kv("methods", &scope.allowed_methods.join(", "));
        ctx.output.kv("max concurrency", &scope.max_concurrency.to_string());
        ctx.output
            .kv("caches", &esi.caches().store_count(&scope.scope).to_string());
        ctx.output.kv("log", &runtime.logger().sink().to_string());
        for (name, kind) in runtime.backends().describe() {
            ctx.output.list_item(&format!("{} ({})", name, kind));
        }
    }

    Ok(())
}

fn describe(esi: &EsiMiddleware, runtime: &ScopeRuntime) -> Value {
    let scope = runtime.config();
    let backends: Vec<Value> = runtime
        .backends()
        .describe()
        .into_iter()
        .map(|(name, kind)| json!({ "name": name, "kind": kind }))
        .collect();

    json!({
        "scope": scope.scope,
        "timeout": format_duration(scope.timeout),
        "ttl": format_duration(scope.ttl),
        "allowed_methods": scope.allowed_methods,
        "max_concurrency": scope.max_concurrency,
        "key_backend": scope.key_backend,
        "backends": backends,
        "caches": esi.caches().store_count(&scope.scope),
        "log": runtime.logger().sink().to_string(),
    })
}
