use std::sync::Arc;

use deskbot_core::AppError;
use deskbot_domain::{EntityCategory, EntityKind, SearchField};

use crate::fake_directory::{FakeDirectory, group, user};

use super::{DirectoryResolverService, Resolution};

const ALICE_ID: &str = "3f0c9a57-1d2e-4b8f-9c61-0a7e5b4d2c10";

fn resolver(directory: FakeDirectory) -> (DirectoryResolverService, Arc<FakeDirectory>) {
    let directory = Arc::new(directory);
    (DirectoryResolverService::new(directory.clone()), directory)
}

fn directory() -> FakeDirectory {
    FakeDirectory::with_entities(vec![
        user(ALICE_ID, "Alice Archer", "alice@contoso.com"),
        user("u-alan", "Alan Turing", "alan@contoso.com"),
        user("u-bob", "Bob Baker", "bob@contoso.com"),
        group("g-finance", "Finance", EntityKind::SecurityGroup),
        group("g-fin-ops", "Finance Ops", EntityKind::UnifiedGroup),
    ])
}

#[tokio::test]
async fn canonical_id_is_looked_up_directly() {
    let (service, directory) = resolver(directory());

    let resolution = service.resolve_entity(ALICE_ID, EntityCategory::User).await;

    assert!(matches!(
        resolution,
        Ok(Resolution::Resolved(ref entity)) if entity.display_name == "Alice Archer"
    ));
    assert!(directory.searches.lock().await.is_empty());
}

#[tokio::test]
async fn unknown_canonical_id_is_not_found() {
    let (service, _) = resolver(directory());

    let resolution = service
        .resolve_entity("00000000-0000-0000-0000-000000000000", EntityCategory::User)
        .await;

    assert!(matches!(resolution, Ok(Resolution::NotFound { .. })));
}

#[tokio::test]
async fn single_fuzzy_match_resolves() {
    let (service, directory) = resolver(directory());

    let resolution = service
        .resolve_entity("bob@contoso.com", EntityCategory::User)
        .await;

    assert!(matches!(
        resolution,
        Ok(Resolution::Resolved(ref entity)) if entity.id.as_str() == "u-bob"
    ));
    let searches = directory.searches.lock().await;
    assert_eq!(
        searches[0].fields,
        vec![
            SearchField::DisplayName,
            SearchField::PrincipalName,
            SearchField::Mail
        ]
    );
}

#[tokio::test]
async fn multiple_matches_are_surfaced_not_guessed() {
    let (service, _) = resolver(directory());

    let resolution = service.resolve_entity("Al", EntityCategory::User).await;

    assert!(resolution.is_ok());
    let Resolution::Ambiguous(ambiguous) = resolution.unwrap_or_else(|_| unreachable!()) else {
        panic!("expected an ambiguous resolution");
    };
    assert_eq!(ambiguous.candidates.len(), 2);
    let message = ambiguous.describe();
    assert!(message.contains("alice@contoso.com"));
    assert!(message.contains("u-alan"));
}

#[tokio::test]
async fn group_search_uses_group_fields_only() {
    let (service, directory) = resolver(directory());

    let resolution = service.resolve_entity("Finance", EntityCategory::Group).await;

    assert!(matches!(resolution, Ok(Resolution::Ambiguous(_))));
    let searches = directory.searches.lock().await;
    assert_eq!(
        searches[0].fields,
        vec![SearchField::DisplayName, SearchField::Mail]
    );
}

#[tokio::test]
async fn no_match_is_not_found() {
    let (service, _) = resolver(directory());

    let resolution = service.resolve_entity("zed", EntityCategory::User).await;

    assert!(matches!(resolution, Ok(Resolution::NotFound { .. })));
}

#[tokio::test]
async fn blank_identifier_is_rejected() {
    let (service, _) = resolver(directory());

    let resolution = service.resolve_entity("   ", EntityCategory::Group).await;

    assert!(matches!(resolution, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn resolve_many_reports_each_identifier() {
    let (service, _) = resolver(directory());

    let resolutions = service
        .resolve_many(
            &["Finance Ops".to_owned(), "Marketing".to_owned()],
            EntityCategory::Group,
        )
        .await;

    assert_eq!(resolutions.len(), 2);
    assert!(matches!(resolutions[0].1, Ok(Resolution::Resolved(_))));
    assert!(matches!(resolutions[1].1, Ok(Resolution::NotFound { .. })));
}

#[test]
fn not_found_resolution_converts_to_not_found_error() {
    let resolution = Resolution::NotFound {
        identifier: "zed".to_owned(),
        category: EntityCategory::User,
    };

    assert!(matches!(
        resolution.into_entity(),
        Err(AppError::NotFound(message)) if message.contains("zed")
    ));
}
