//! Wire-level shapes, converted into the closed request variants on deserialize.

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

use super::models::{
    Destination, ElementMetadata, ElementSpec, Expandable, ExpansionStrategy, Group, Leaf,
    LinkMode, Source, SourceKind, Target, TargetContents,
};

#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("src '{0}' requires a '{1}' field")]
    MissingSourceField(SourceKind, &'static str),
    #[error("element has neither 'src' nor nested 'elements'")]
    MissingSource,
    #[error("'{0}' given without 'src'")]
    FieldWithoutSource(&'static str),
    #[error("nested 'elements' cannot be combined with 'src' or 'elements_from'")]
    GroupWithSource,
    #[error("nested element group requires a 'name'")]
    UnnamedGroup,
    #[error("elements_from '{0}' cannot expand pasted content")]
    PastedExpansion(ExpansionStrategy),
    #[error("target requires exactly one of 'elements' or 'elements_from'")]
    AmbiguousTargetContents,
    #[error("target 'elements_from' requires a source")]
    TargetWithoutSource,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawSource {
    #[serde(default)]
    src: Option<SourceKind>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    paste_content: Option<String>,
    #[serde(default)]
    link_data_only: Option<LinkMode>,
}

impl RawSource {
    fn into_source(self) -> Result<Option<Source>, ShapeError> {
        let Some(kind) = self.src else {
            if self.path.is_some() {
                return Err(ShapeError::FieldWithoutSource("path"));
            }
            if self.url.is_some() {
                return Err(ShapeError::FieldWithoutSource("url"));
            }
            if self.paste_content.is_some() {
                return Err(ShapeError::FieldWithoutSource("paste_content"));
            }
            return Ok(None);
        };

        let source = match kind {
            SourceKind::Path => Source::Path {
                path: self
                    .path
                    .map(PathBuf::from)
                    .ok_or(ShapeError::MissingSourceField(kind, "path"))?,
                link: self.link_data_only.unwrap_or_default(),
            },
            SourceKind::Url => Source::Url {
                url: self
                    .url
                    .ok_or(ShapeError::MissingSourceField(kind, "url"))?,
            },
            SourceKind::Pasted => Source::Pasted {
                content: self
                    .paste_content
                    .ok_or(ShapeError::MissingSourceField(kind, "paste_content"))?,
            },
        };

        Ok(Some(source))
    }

    fn is_empty(&self) -> bool {
        self.src.is_none()
            && self.path.is_none()
            && self.url.is_none()
            && self.paste_content.is_none()
    }
}

fn expandable(
    strategy: ExpansionStrategy,
    source: Source,
    metadata: ElementMetadata,
) -> Result<Expandable, ShapeError> {
    if matches!(source, Source::Pasted { .. }) {
        return Err(ShapeError::PastedExpansion(strategy));
    }

    Ok(Expandable {
        strategy,
        source,
        metadata,
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawElement {
    #[serde(default)]
    elements: Option<Vec<ElementSpec>>,
    #[serde(default)]
    elements_from: Option<ExpansionStrategy>,
    #[serde(flatten)]
    source: RawSource,
    #[serde(flatten)]
    metadata: ElementMetadata,
}

impl TryFrom<RawElement> for ElementSpec {
    type Error = ShapeError;

    fn try_from(raw: RawElement) -> Result<Self, Self::Error> {
        if let Some(elements) = raw.elements {
            if !raw.source.is_empty() || raw.elements_from.is_some() {
                return Err(ShapeError::GroupWithSource);
            }
            let name = raw.metadata.name.ok_or(ShapeError::UnnamedGroup)?;
            return Ok(ElementSpec::Group(Group { name, elements }));
        }

        let source = raw.source.into_source()?.ok_or(ShapeError::MissingSource)?;

        match raw.elements_from {
            Some(strategy) => Ok(ElementSpec::Expandable(expandable(
                strategy,
                source,
                raw.metadata,
            )?)),
            None => Ok(ElementSpec::Leaf(Leaf {
                source,
                metadata: raw.metadata,
            })),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTarget {
    destination: Destination,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    collection_type: Option<String>,
    #[serde(default)]
    elements: Option<Vec<ElementSpec>>,
    #[serde(default)]
    elements_from: Option<ExpansionStrategy>,
    #[serde(flatten)]
    source: RawSource,
    #[serde(flatten)]
    metadata: ElementMetadata,
}

impl TryFrom<RawTarget> for Target {
    type Error = ShapeError;

    fn try_from(raw: RawTarget) -> Result<Self, Self::Error> {
        let contents = match (raw.elements, raw.elements_from) {
            (Some(elements), None) => {
                if !raw.source.is_empty() {
                    return Err(ShapeError::AmbiguousTargetContents);
                }
                TargetContents::Elements(elements)
            }
            (None, Some(strategy)) => {
                let source = raw
                    .source
                    .into_source()?
                    .ok_or(ShapeError::TargetWithoutSource)?;
                TargetContents::ElementsFrom(expandable(strategy, source, raw.metadata)?)
            }
            _ => return Err(ShapeError::AmbiguousTargetContents),
        };

        Ok(Target {
            destination: raw.destination,
            name: raw.name,
            collection_type: raw.collection_type,
            contents,
        })
    }
}
