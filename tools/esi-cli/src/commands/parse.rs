//! Directive inspection.

use anyhow::{Context as _, Result};
use esi_core::{format_duration, Directive};
use esi_executor::scan;

use super::ParseArgs;
use crate::context::Context;

/// Run the parse command.
pub async fn run(args: ParseArgs, ctx: &Context) -> Result<()> {
    let directive = Directive::parse(directive_text(&args.tag))
        .with_context(|| format!("Failed to parse {}", args.tag))?;

    if ctx.output.is_json() {
        ctx.output.json(&directive);
        return Ok(());
    }

    ctx.output.header("Directive");
    for (i, resource) in directive.resources.iter().enumerate() {
        ctx.output.kv(&format!("src[{}]", i), &resource.url);
    }
    if let Some(key) = directive.key() {
        ctx.output.kv("key", key);
    }
    if !directive.has_resource() {
        ctx.output.warn("no src or key; resolves to its fallback");
    }
    ctx.output.kv("timeout", &or_default(directive.timeout));
    ctx.output.kv("ttl", &or_default(directive.ttl));
    if !directive.on_error.is_empty() {
        ctx.output.kv("onerror", &directive.on_error);
    }
    if !directive.forward_headers.is_empty() {
        ctx.output
            .kv("forwardheaders", &String::from(directive.forward_headers.clone()));
    }
    if !directive.return_headers.is_empty() {
        ctx.output
            .kv("returnheaders", &String::from(directive.return_headers.clone()));
    }

    Ok(())
}

/// The directive text inside a full `<esi:include .../>` tag, or the input as is.
fn directive_text(tag: &str) -> &str {
    match scan(tag.as_bytes()).first() {
        Some(span) => &tag[span.directive.clone()],
        None => tag.trim(),
    }
}

fn or_default(duration: std::time::Duration) -> String {
    if duration.is_zero() {
        "scope default".to_string()
    } else {
        format_duration(duration)
    }
}
