//! Resolution of loose identifiers into one directory entity.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use deskbot_core::{AppError, AppResult};
use deskbot_domain::{DirectoryEntity, EntityCategory, EntityId};

use crate::{DirectoryGateway, DirectorySearch};

/// Identifying details shown when an identifier matches several entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Directory id.
    pub id: EntityId,
    /// Display name.
    pub display_name: String,
    /// Principal name.
    pub principal_name: String,
}

/// Identifier that matched more than one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousMatch {
    /// Identifier as supplied by the caller.
    pub identifier: String,
    /// Category that was searched.
    pub category: EntityCategory,
    /// Every matching entity.
    pub candidates: Vec<Candidate>,
}

impl AmbiguousMatch {
    /// Renders a disambiguation message listing every candidate.
    #[must_use]
    pub fn describe(&self) -> String {
        let listed = self
            .candidates
            .iter()
            .map(|candidate| {
                format!(
                    "{} <{}> ({})",
                    candidate.display_name, candidate.principal_name, candidate.id
                )
            })
            .collect::<Vec<_>>()
            .join("; ");

        format!(
            "'{}' matches {} {}s: {listed}",
            self.identifier,
            self.candidates.len(),
            self.category.as_str()
        )
    }
}

/// Outcome of resolving one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one entity matched.
    Resolved(DirectoryEntity),
    /// Several entities matched; the caller must disambiguate.
    Ambiguous(AmbiguousMatch),
    /// No entity matched.
    NotFound {
        /// Identifier as supplied by the caller.
        identifier: String,
        /// Category that was searched.
        category: EntityCategory,
    },
}

impl Resolution {
    /// Converts the resolution into the single entity or a descriptive error.
    pub fn into_entity(self) -> AppResult<DirectoryEntity> {
        match self {
            Self::Resolved(entity) => Ok(entity),
            Self::Ambiguous(ambiguous) => Err(AppError::Validation(ambiguous.describe())),
            Self::NotFound {
                identifier,
                category,
            } => Err(AppError::NotFound(format!(
                "no {} matches '{identifier}'",
                category.as_str()
            ))),
        }
    }
}

/// Application service turning identifiers into entities.
#[derive(Clone)]
pub struct DirectoryResolverService {
    gateway: Arc<dyn DirectoryGateway>,
}

impl DirectoryResolverService {
    /// Creates a resolver over a directory gateway.
    #[must_use]
    pub fn new(gateway: Arc<dyn DirectoryGateway>) -> Self {
        Self { gateway }
    }

    /// Resolves a name fragment, address or object id into one entity.
    ///
    /// Canonical ids are looked up directly. Anything else is searched across
    /// the category's candidate fields; multiple matches are never narrowed
    /// down here.
    pub async fn resolve_entity(
        &self,
        identifier: &str,
        category: EntityCategory,
    ) -> AppResult<Resolution> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(AppError::Validation(format!(
                "{} identifier must not be empty",
                category.as_str()
            )));
        }

        if EntityId::looks_canonical(identifier) {
            let id = EntityId::new(identifier)?;
            let entity = self.gateway.get_entity(category, &id).await?;
            return Ok(match entity {
                Some(entity) => Resolution::Resolved(entity),
                None => Resolution::NotFound {
                    identifier: identifier.to_owned(),
                    category,
                },
            });
        }

        let search = DirectorySearch {
            term: identifier.to_owned(),
            fields: category.candidate_fields().to_vec(),
        };
        let mut seen = HashSet::new();
        let mut matches: Vec<DirectoryEntity> = self
            .gateway
            .search_entities(category, &search)
            .await?
            .into_iter()
            .filter(|entity| seen.insert(entity.id.clone()))
            .collect();

        debug!(
            identifier = %identifier,
            category = category.as_str(),
            match_count = matches.len(),
            "directory search completed"
        );

        Ok(match matches.len() {
            0 => Resolution::NotFound {
                identifier: identifier.to_owned(),
                category,
            },
            1 => Resolution::Resolved(matches.remove(0)),
            _ => Resolution::Ambiguous(AmbiguousMatch {
                identifier: identifier.to_owned(),
                category,
                candidates: matches
                    .into_iter()
                    .map(|entity| Candidate {
                        id: entity.id,
                        display_name: entity.display_name,
                        principal_name: entity.principal_name,
                    })
                    .collect(),
            }),
        })
    }

    /// Resolves each identifier independently; one failure does not stop the rest.
    pub async fn resolve_many(
        &self,
        identifiers: &[String],
        category: EntityCategory,
    ) -> Vec<(String, AppResult<Resolution>)> {
        let mut resolutions = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            let resolution = self.resolve_entity(identifier, category).await;
            resolutions.push((identifier.clone(), resolution));
        }

        resolutions
    }
}

#[cfg(test)]
mod tests;
