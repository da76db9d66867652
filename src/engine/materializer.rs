use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::expand::{ElementExpander, ExpansionError};
use crate::manifest::{ResolvedElement, StagedElement, TargetOutcome};
use crate::observability::FetchStats;
use crate::request::{
    ElementSpec, Expandable, Leaf, Source, Target, TargetContents, duplicate_name,
};
use crate::resolve::{ResolveError, SourceResolver};

/// Name given to pasted content that has no explicit name
const PASTED_NAME: &str = "Pasted Entry";

/// Why an expandable element produced no children
#[derive(Debug, Error)]
enum ExpandFailure {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Expansion(#[from] ExpansionError),
}

/// Walks one target's element tree and records an outcome per element
#[derive(Clone)]
pub struct TargetMaterializer {
    resolver: SourceResolver,
    expander: ElementExpander,
    stats: Arc<FetchStats>,
}

impl TargetMaterializer {
    pub fn new(resolver: SourceResolver, expander: ElementExpander, stats: Arc<FetchStats>) -> Self {
        Self {
            resolver,
            expander,
            stats,
        }
    }

    /// Resolve every element of `target`.
    ///
    /// Resolution continues past failures. For an `hdca` target with
    /// `allow_failed_collections == false`, any failure in the tree also
    /// fails the target as a whole. A collection that declares the same
    /// element name twice on one level fails without resolving anything.
    pub async fn materialize(&self, target: &Target, allow_failed_collections: bool) -> TargetOutcome {
        let (elements, mut error_message) = match &target.contents {
            TargetContents::Elements(specs) if target.destination.is_collection() => {
                match duplicate_name(specs) {
                    Some(name) => (
                        Vec::new(),
                        Some(format!(
                            "duplicate element name '{name}' within one collection level"
                        )),
                    ),
                    None => (self.walk_all(specs).await, None),
                }
            }
            TargetContents::Elements(specs) => (self.walk_all(specs).await, None),
            TargetContents::ElementsFrom(expandable) => match self.expand(expandable).await {
                Ok(children) => (self.walk_all(&children).await, None),
                Err(err) => (Vec::new(), Some(err.to_string())),
            },
        };

        if error_message.is_none() && target.destination.is_collection() && !allow_failed_collections
        {
            error_message = collection_failure(&elements);
        }

        if let Some(message) = &error_message {
            self.stats.target_failed();
            warn!(destination = ?target.destination, error = %message, "Target failed");
        }

        TargetOutcome {
            destination: target.destination.clone(),
            name: target.name.clone(),
            collection_type: target.collection_type.clone(),
            elements,
            error_message,
        }
    }

    async fn walk_all(&self, specs: &[ElementSpec]) -> Vec<ResolvedElement> {
        let mut resolved = Vec::with_capacity(specs.len());
        for spec in specs {
            resolved.push(self.walk(spec).await);
        }
        resolved
    }

    fn walk<'a>(&'a self, spec: &'a ElementSpec) -> BoxFuture<'a, ResolvedElement> {
        async move {
            match spec {
                ElementSpec::Leaf(leaf) => self.resolve_leaf(leaf).await,
                ElementSpec::Expandable(expandable) => {
                    let name = expandable
                        .metadata
                        .name
                        .clone()
                        .or_else(|| expandable.source.basename());
                    match self.expand(expandable).await {
                        Ok(children) => ResolvedElement::Group {
                            name,
                            elements: self.walk_all(&children).await,
                            error_message: None,
                        },
                        Err(err) => ResolvedElement::Group {
                            name,
                            elements: Vec::new(),
                            error_message: Some(err.to_string()),
                        },
                    }
                }
                ElementSpec::Group(group) => ResolvedElement::Group {
                    name: Some(group.name.clone()),
                    elements: self.walk_all(&group.elements).await,
                    error_message: None,
                },
            }
        }
        .boxed()
    }

    async fn resolve_leaf(&self, leaf: &Leaf) -> ResolvedElement {
        let name = element_name(leaf);

        match self.resolver.resolve(&leaf.source, &leaf.metadata).await {
            Ok(staged) => {
                self.stats.element_staged(staged.size);
                debug!(element = %name, path = %staged.path.display(), size = staged.size, "Element staged");
                ResolvedElement::Staged(StagedElement {
                    filename: staged.path.display().to_string(),
                    name,
                    ext: leaf.metadata.ext.clone(),
                    dbkey: leaf.metadata.dbkey.clone(),
                    info: leaf.metadata.info.clone(),
                    tags: leaf.metadata.tags.clone(),
                    src: leaf.source.kind(),
                    size: staged.size,
                })
            }
            Err(err) => {
                self.stats.element_failed();
                warn!(element = %name, src = %leaf.source.kind(), error = %err, "Element failed");
                ResolvedElement::failed(leaf.metadata.name.clone(), err)
            }
        }
    }

    async fn expand(&self, expandable: &Expandable) -> Result<Vec<ElementSpec>, ExpandFailure> {
        let result = async {
            let source = self.resolver.resolve_to_path(&expandable.source).await?;
            let children = self
                .expander
                .expand(expandable.strategy, &source, &expandable.metadata)
                .await?;
            Ok::<_, ExpandFailure>(children)
        }
        .await;

        if let Err(err) = &result {
            self.stats.expansion_failed();
            warn!(strategy = %expandable.strategy, error = %err, "Expansion failed");
        }
        result
    }
}

/// Explicit name, else the source's file name
fn element_name(leaf: &Leaf) -> String {
    leaf.metadata
        .name
        .clone()
        .or_else(|| leaf.source.basename())
        .unwrap_or_else(|| match &leaf.source {
            Source::Url { url } => url.clone(),
            _ => PASTED_NAME.to_string(),
        })
}

/// Consolidated target error for a collection that does not tolerate failures
fn collection_failure(elements: &[ResolvedElement]) -> Option<String> {
    let mut errors = Vec::new();
    for element in elements {
        element.collect_errors(&mut errors);
    }

    if errors.is_empty() {
        return None;
    }

    Some(format!(
        "{} collection element(s) failed: {}",
        errors.len(),
        errors.join("; ")
    ))
}
