use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::IngestError;
use super::models::{ParsedGameRecord, SourceKind};

/// Result of one resolution strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Found(String),
    NotFound,
    TransientError(String),
}

impl From<Result<Option<String>, IngestError>> for ResolveOutcome {
    fn from(res: Result<Option<String>, IngestError>) -> Self {
        match res {
            Ok(Some(url)) => ResolveOutcome::Found(url),
            Ok(None) => ResolveOutcome::NotFound,
            Err(e) => ResolveOutcome::TransientError(e.to_string()),
        }
    }
}

/// One external provider: turns names into canonical URLs and URLs into records.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn resolve(&self, name: &str, cancel: &CancellationToken) -> ResolveOutcome;

    async fn parse(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ParsedGameRecord, IngestError>;

    /// A copy with per-batch state (e.g. access tokens) reset. `None` reuses `self`.
    fn for_batch(&self) -> Option<Arc<dyn MetadataSource>> {
        None
    }
}

/// Canonical URL plus the source that produced it (which may differ from the
/// requested one after a fallback).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub url: String,
    pub source: SourceKind,
}

/// Ordered strategies tried for a requested source; the first `Found` wins.
pub fn fallback_chain(hint: SourceKind) -> &'static [SourceKind] {
    match hint {
        SourceKind::Wiki => &[SourceKind::Wiki],
        SourceKind::Steam => &[SourceKind::Steam, SourceKind::Wiki],
        SourceKind::Catalog => &[SourceKind::Catalog],
    }
}

#[derive(Clone, Default)]
pub struct SourceResolver {
    sources: HashMap<SourceKind, Arc<dyn MetadataSource>>,
}

impl SourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.sources.insert(source.kind(), source);
        self
    }

    pub fn for_batch(&self) -> Self {
        let sources = self
            .sources
            .iter()
            .map(|(kind, src)| (*kind, src.for_batch().unwrap_or_else(|| src.clone())))
            .collect();
        Self { sources }
    }

    pub async fn resolve(
        &self,
        name: &str,
        hint: SourceKind,
        cancel: &CancellationToken,
    ) -> Result<Resolved, IngestError> {
        let mut last_err: Option<IngestError> = None;
        for &kind in fallback_chain(hint) {
            if cancel.is_cancelled() {
                return Err(IngestError::Timeout);
            }
            let Some(source) = self.sources.get(&kind) else {
                last_err = Some(IngestError::unavailable(kind, "source not configured"));
                continue;
            };
            match source.resolve(name, cancel).await {
                ResolveOutcome::Found(url) => {
                    if kind != hint {
                        info!(game = name, requested = %hint, used = %kind, url = %url, "resolved via fallback source");
                    } else {
                        debug!(game = name, source = %kind, url = %url, "resolved");
                    }
                    return Ok(Resolved { url, source: kind });
                }
                ResolveOutcome::NotFound => {
                    debug!(game = name, source = %kind, "no match");
                    last_err = Some(IngestError::ResolutionNotFound {
                        name: name.to_string(),
                        origin: kind,
                    });
                }
                ResolveOutcome::TransientError(reason) => {
                    warn!(game = name, source = %kind, error = %reason, "resolution failed");
                    last_err = Some(IngestError::SourceUnavailable {
                        origin: kind,
                        reason,
                    });
                }
            }
        }
        if cancel.is_cancelled() {
            return Err(IngestError::Timeout);
        }
        Err(last_err.unwrap_or(IngestError::ResolutionNotFound {
            name: name.to_string(),
            origin: hint,
        }))
    }

    pub async fn parse(
        &self,
        resolved: &Resolved,
        cancel: &CancellationToken,
    ) -> Result<ParsedGameRecord, IngestError> {
        let source = self
            .sources
            .get(&resolved.source)
            .ok_or_else(|| IngestError::unavailable(resolved.source, "source not configured"))?;
        source.parse(&resolved.url, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        kind: SourceKind,
        outcome: ResolveOutcome,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(kind: SourceKind, outcome: ResolveOutcome) -> Arc<Self> {
            Arc::new(Self {
                kind,
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MetadataSource for Scripted {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn resolve(&self, _name: &str, _cancel: &CancellationToken) -> ResolveOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }

        async fn parse(
            &self,
            url: &str,
            _cancel: &CancellationToken,
        ) -> Result<ParsedGameRecord, IngestError> {
            Ok(ParsedGameRecord::new(url))
        }
    }

    #[tokio::test]
    async fn steam_failure_falls_back_to_wiki() {
        let steam = Scripted::new(
            SourceKind::Steam,
            ResolveOutcome::TransientError("connection reset".into()),
        );
        let wiki = Scripted::new(
            SourceKind::Wiki,
            ResolveOutcome::Found("https://ru.wikipedia.org/wiki/Portal".into()),
        );
        let resolver = SourceResolver::new()
            .with_source(steam.clone())
            .with_source(wiki.clone());

        let token = CancellationToken::new();
        let resolved = resolver
            .resolve("Portal", SourceKind::Steam, &token)
            .await
            .unwrap();
        assert_eq!(resolved.source, SourceKind::Wiki);
        assert_eq!(steam.calls.load(Ordering::SeqCst), 1);
        assert_eq!(wiki.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn steam_success_skips_wiki() {
        let steam = Scripted::new(
            SourceKind::Steam,
            ResolveOutcome::Found("https://store.steampowered.com/app/400/Portal/".into()),
        );
        let wiki = Scripted::new(SourceKind::Wiki, ResolveOutcome::NotFound);
        let resolver = SourceResolver::new()
            .with_source(steam)
            .with_source(wiki.clone());

        let resolved = resolver
            .resolve("Portal", SourceKind::Steam, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolved.source, SourceKind::Steam);
        assert_eq!(wiki.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wiki_does_not_fall_back() {
        let steam = Scripted::new(
            SourceKind::Steam,
            ResolveOutcome::Found("https://store.steampowered.com/app/1/".into()),
        );
        let wiki = Scripted::new(SourceKind::Wiki, ResolveOutcome::NotFound);
        let resolver = SourceResolver::new()
            .with_source(steam.clone())
            .with_source(wiki);

        let err = resolver
            .resolve("UnknownGarbageNameXYZ", SourceKind::Wiki, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::ResolutionNotFound {
                origin: SourceKind::Wiki,
                ..
            }
        ));
        assert_eq!(steam.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_batch_reports_timeout() {
        let wiki = Scripted::new(SourceKind::Wiki, ResolveOutcome::NotFound);
        let resolver = SourceResolver::new().with_source(wiki.clone());
        let token = CancellationToken::new();
        token.cancel();

        let err = resolver
            .resolve("Portal", SourceKind::Wiki, &token)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(wiki.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_source_is_unavailable() {
        let resolver = SourceResolver::new();
        let err = resolver
            .resolve("Portal", SourceKind::Catalog, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::SourceUnavailable {
                origin: SourceKind::Catalog,
                ..
            }
        ));
    }
}
