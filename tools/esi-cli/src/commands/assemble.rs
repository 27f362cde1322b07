//! Page assembly from a file.

use anyhow::{bail, Context as _, Result};
use bytes::Bytes;
use esi_executor::{EsiMiddleware, Processed};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::AssembleArgs;
use crate::context::Context;
use crate::output::{format_micros, outcome_badge};

/// Run the assemble command.
pub async fn run(args: AssembleArgs, ctx: &Context) -> Result<()> {
    let (path, config) = ctx.config()?;
    let esi = EsiMiddleware::from_config(&config)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid method {}", args.method))?;
    let headers = parse_headers(&args.headers)?;
    let body = read_page(&args.file, ctx).await?;

    let assembled = match esi.process(&method, &args.path, &headers, body).await {
        Processed::Passthrough(body) => {
            ctx.output.warn(&format!(
                "{} {} is not assembled by any scope; passing through",
                method, args.path
            ));
            if ctx.output.is_json() {
                ctx.output.json(&json!({
                    "assembled": false,
                    "body": String::from_utf8_lossy(&body),
                }));
            } else {
                write_stdout(&body).await?;
            }
            return Ok(());
        }
        Processed::Assembled(assembled) => assembled,
    };

    if ctx.output.is_json() {
        let returned: Vec<_> = assembled
            .headers
            .iter()
            .map(|(name, value)| json!([name.as_str(), String::from_utf8_lossy(value.as_bytes())]))
            .collect();
        ctx.output.json(&json!({
            "assembled": true,
            "body": String::from_utf8_lossy(&assembled.body),
            "headers": returned,
            "metrics": assembled.metrics,
        }));
        return Ok(());
    }

    write_stdout(&assembled.body).await?;

    if ctx.output.is_verbose() {
        let metrics = &assembled.metrics;
        ctx.output.header(&format!(
            "Scope {}: {} fragments in {}",
            metrics.scope,
            metrics.fragments.len(),
            format_micros(metrics.total_duration_us)
        ));
        for fragment in &metrics.fragments {
            ctx.output.list_item(&format!(
                "#{} {} {} {} bytes {}",
                fragment.index,
                outcome_badge(fragment.outcome),
                format_micros(fragment.duration_us),
                fragment.bytes,
                fragment.resource.as_deref().unwrap_or("")
            ));
        }
        for (name, value) in &assembled.headers {
            ctx.output
                .debug(&format!("{}: {}", name, String::from_utf8_lossy(value.as_bytes())));
        }
    }

    Ok(())
}

async fn read_page(file: &str, ctx: &Context) -> Result<Bytes> {
    if file == "-" {
        let mut body = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut body)
            .await
            .context("Failed to read page from stdin")?;
        return Ok(Bytes::from(body));
    }

    let path = ctx.resolve_path(file);
    let body = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read page {}", path.display()))?;
    Ok(Bytes::from(body))
}

async fn write_stdout(body: &[u8]) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(body).await.context("Failed to write page")?;
    stdout.flush().await.context("Failed to write page")?;
    Ok(())
}

/// Parse repeated `Name: value` arguments.
fn parse_headers(raw: &[String]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for header in raw {
        let Some((name, value)) = header.split_once(':') else {
            bail!("Invalid header {:?}, expected `Name: value`", header);
        };
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .with_context(|| format!("Invalid header name in {:?}", header))?;
        let value = HeaderValue::from_str(value.trim())
            .with_context(|| format!("Invalid header value in {:?}", header))?;
        headers.append(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(&[
            "Cookie: session=abc".to_string(),
            "accept-language:  fr ".to_string(),
            "Cookie: theme=dark".to_string(),
        ])
        .unwrap();

        assert_eq!(headers["accept-language"], "fr");
        let cookies: Vec<_> = headers.get_all("cookie").iter().collect();
        assert_eq!(cookies, vec!["session=abc", "theme=dark"]);
    }

    #[test]
    fn test_value_may_contain_colon() {
        let headers = parse_headers(&["Referer: https://shop/cart".to_string()]).unwrap();
        assert_eq!(headers["referer"], "https://shop/cart");
    }

    #[test]
    fn test_invalid_headers() {
        assert!(parse_headers(&["Cookie".to_string()]).is_err());
        assert!(parse_headers(&["Bad Name: x".to_string()]).is_err());
    }
}
