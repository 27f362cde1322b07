//! Page assembly: find includes, resolve them concurrently, splice in order.

use bytes::{Bytes, BytesMut};
use esi_core::Directive;
use esi_observability::{FragmentMetrics, FragmentOutcome, PageMetrics};
use futures::stream::{self, StreamExt};
use http::HeaderMap;
use tokio::time::Instant;

use crate::resolver::{Outcome, ResourceResolver};
use crate::scan::{scan, TagSpan};

/// An assembled page.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub body: Bytes,
    /// Returned headers of every fragment, in document order.
    pub headers: HeaderMap,
    pub metrics: PageMetrics,
}

/// Resolved replacement for one tag.
struct Piece {
    content: Bytes,
    headers: HeaderMap,
    metrics: FragmentMetrics,
}

/// Assembles pages for one scope.
#[derive(Debug, Clone)]
pub struct PageAssembler {
    resolver: ResourceResolver,
}

impl PageAssembler {
    /// Create an assembler.
    pub fn new(resolver: ResourceResolver) -> Self {
        Self { resolver }
    }

    /// The resolver directives go through.
    pub fn resolver(&self) -> &ResourceResolver {
        &self.resolver
    }

    /// Replace every include in `body` with its resolved content.
    ///
    /// At most `max_concurrency` directives are resolved at once. Failures never
    /// abort the page.
    pub async fn assemble(&self, body: &[u8], request_headers: &HeaderMap) -> Assembled {
        let started = Instant::now();
        let scope = self.resolver.scope();
        let tags = scan(body);

        let limit = scope.max_concurrency.max(1);
        let mut pieces: Vec<Option<Piece>> = tags.iter().map(|_| None).collect();
        let mut resolved = stream::iter(tags.iter().enumerate().map(|(index, tag)| async move {
            (index, self.render(index, body, tag, request_headers).await)
        }))
        .buffer_unordered(limit);

        while let Some((index, piece)) = resolved.next().await {
            pieces[index] = Some(piece);
        }

        let mut out = BytesMut::with_capacity(body.len());
        let mut headers = HeaderMap::new();
        let mut fragments = Vec::with_capacity(tags.len());
        let mut pos = 0;
        for (tag, piece) in tags.iter().zip(pieces) {
            out.extend_from_slice(&body[pos..tag.span.start]);
            pos = tag.span.end;
            let Some(piece) = piece else {
                continue;
            };
            out.extend_from_slice(&piece.content);
            for (name, value) in &piece.headers {
                headers.append(name.clone(), value.clone());
            }
            fragments.push(piece.metrics);
        }
        out.extend_from_slice(&body[pos..]);

        Assembled {
            body: out.freeze(),
            headers,
            metrics: PageMetrics {
                scope: scope.scope.clone(),
                page_id: String::new(),
                total_duration_us: started.elapsed().as_micros() as u64,
                fragments,
            },
        }
    }

    async fn render(
        &self,
        index: usize,
        body: &[u8],
        tag: &TagSpan,
        request_headers: &HeaderMap,
    ) -> Piece {
        let started = Instant::now();
        let scope = self.resolver.scope();
        let raw_tag = &body[tag.span.clone()];

        let (content, headers, outcome, resource) =
            match Directive::parse(&body[tag.directive.clone()]) {
                Ok(directive) => {
                    let resolution = self.resolver.resolve(&directive, request_headers).await;
                    let resource = match resolution.outcome {
                        Outcome::Fetched { alternative } => directive
                            .key()
                            .map(str::to_string)
                            .or_else(|| directive.resources.get(alternative).map(|r| r.url.clone())),
                        _ => None,
                    };
                    let outcome = match resolution.outcome {
                        Outcome::Cached => FragmentOutcome::Cached,
                        Outcome::Fetched { .. } => FragmentOutcome::Fetched,
                        Outcome::Fallback => FragmentOutcome::Fallback,
                        Outcome::Empty => FragmentOutcome::Empty,
                    };
                    (resolution.content, resolution.headers, outcome, resource)
                }
                Err(e) => {
                    tracing::warn!(
                        scope = %scope.scope,
                        tag = %String::from_utf8_lossy(raw_tag),
                        error = %e,
                        "invalid include"
                    );
                    (
                        scope.on_error_content.clone(),
                        HeaderMap::new(),
                        FragmentOutcome::Invalid,
                        None,
                    )
                }
            };

        let failed = matches!(outcome, FragmentOutcome::Invalid | FragmentOutcome::Empty);
        let content = if failed && content.is_empty() && scope.keep_failed_tags {
            Bytes::copy_from_slice(raw_tag)
        } else {
            content
        };

        Piece {
            metrics: FragmentMetrics {
                index,
                resource,
                outcome,
                duration_us: started.elapsed().as_micros() as u64,
                bytes: content.len(),
            },
            content,
            headers,
        }
    }
}
