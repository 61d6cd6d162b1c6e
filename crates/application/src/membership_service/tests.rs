use std::collections::HashSet;
use std::sync::Arc;

use deskbot_domain::{EntityKind, GroupMembership, MembershipRole};

use crate::fake_directory::{FakeDirectory, edge, entity_id, group, user};
use crate::{DirectoryGateway, EdgeOutcome, FailureReason, SkipReason};

use super::MembershipService;

fn directory_with_edges(edges: Vec<(&str, MembershipRole)>) -> FakeDirectory {
    let directory = FakeDirectory::with_entities(vec![
        user("u1", "Alice Archer", "alice@contoso.com"),
        group("g-security", "Security Team", EntityKind::SecurityGroup),
        group("g-unified", "Project Falcon", EntityKind::UnifiedGroup),
        group("g-owned", "Ops Leads", EntityKind::SecurityGroup),
        group("g-dynamic", "All Staff", EntityKind::DynamicGroup),
        group("g-dl", "Newsletter", EntityKind::MailEnabledGroup),
    ]);
    let stored = edges
        .into_iter()
        .map(|(target, role)| edge("u1", target, role))
        .collect();
    FakeDirectory {
        edges: tokio::sync::Mutex::new(stored),
        ..directory
    }
}

fn service(directory: FakeDirectory) -> (MembershipService, Arc<FakeDirectory>) {
    let directory = Arc::new(directory);
    (MembershipService::new(directory.clone()), directory)
}

fn subject() -> deskbot_domain::DirectoryEntity {
    user("u1", "Alice Archer", "alice@contoso.com")
}

#[tokio::test]
async fn add_edge_twice_is_idempotent() {
    let (service, directory) = service(directory_with_edges(Vec::new()));
    let target = group("g-security", "Security Team", EntityKind::SecurityGroup);

    let first = service
        .add_edge(&subject(), &target, MembershipRole::Member)
        .await;
    let second = service
        .add_edge(&subject(), &target, MembershipRole::Member)
        .await;

    assert_eq!(first.outcome, EdgeOutcome::Added);
    assert_eq!(
        second.outcome,
        EdgeOutcome::Skipped(SkipReason::AlreadyPresent)
    );
    assert_eq!(directory.edges.lock().await.len(), 1);
    assert_eq!(directory.mutations.lock().await.len(), 1);
}

#[tokio::test]
async fn same_group_different_role_is_a_new_edge() {
    let (service, directory) =
        service(directory_with_edges(vec![("g-security", MembershipRole::Member)]));
    let target = group("g-security", "Security Team", EntityKind::SecurityGroup);

    let report = service
        .add_edge(&subject(), &target, MembershipRole::Owner)
        .await;

    assert_eq!(report.outcome, EdgeOutcome::Added);
    assert_eq!(report.relation, "owner");
    assert_eq!(directory.edges.lock().await.len(), 2);
}

#[tokio::test]
async fn dynamic_group_is_never_mutated_for_any_role() {
    let (service, directory) = service(directory_with_edges(Vec::new()));
    let target = group("g-dynamic", "All Staff", EntityKind::DynamicGroup);

    for role in MembershipRole::all() {
        let added = service.add_edge(&subject(), &target, *role).await;
        let removed = service.remove_edge(&subject(), &target, *role).await;

        assert_eq!(
            added.outcome,
            EdgeOutcome::Skipped(SkipReason::DynamicMembership)
        );
        assert_eq!(
            removed.outcome,
            EdgeOutcome::Skipped(SkipReason::DynamicMembership)
        );
    }
    assert!(directory.mutations.lock().await.is_empty());
}

#[tokio::test]
async fn distribution_group_is_skipped_with_distinct_reason() {
    let (service, directory) = service(directory_with_edges(Vec::new()));
    let target = group("g-dl", "Newsletter", EntityKind::MailEnabledGroup);

    let report = service
        .add_edge(&subject(), &target, MembershipRole::Member)
        .await;

    assert_eq!(
        report.outcome,
        EdgeOutcome::Skipped(SkipReason::MailEnabledDistribution)
    );
    assert!(directory.mutations.lock().await.is_empty());
}

#[tokio::test]
async fn remove_absent_edge_is_skipped() {
    let (service, _) = service(directory_with_edges(Vec::new()));
    let target = group("g-security", "Security Team", EntityKind::SecurityGroup);

    let report = service
        .remove_edge(&subject(), &target, MembershipRole::Member)
        .await;

    assert_eq!(
        report.outcome,
        EdgeOutcome::Skipped(SkipReason::AlreadyAbsent)
    );
}

#[tokio::test]
async fn denied_mutation_is_permission_failure() {
    let mut directory = directory_with_edges(Vec::new());
    directory.denied_targets = HashSet::from(["g-security".to_owned()]);
    let (service, _) = service(directory);
    let target = group("g-security", "Security Team", EntityKind::SecurityGroup);

    let report = service
        .add_edge(&subject(), &target, MembershipRole::Member)
        .await;

    assert!(matches!(
        report.outcome,
        EdgeOutcome::Failed(FailureReason::PermissionDenied(_))
    ));
}

#[tokio::test]
async fn remove_all_skips_dynamic_and_removes_the_rest() {
    let (service, directory) = service(directory_with_edges(vec![
        ("g-security", MembershipRole::Member),
        ("g-unified", MembershipRole::Member),
        ("g-owned", MembershipRole::Owner),
        ("g-dynamic", MembershipRole::Member),
    ]));

    let result = service.remove_all_edges(&subject()).await;

    assert!(result.is_ok());
    let result = result.unwrap_or_default();
    assert_eq!(result.removed.len() + result.failed.len(), 3);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].target_id, "g-dynamic");
    assert_eq!(
        result.skipped[0].outcome,
        EdgeOutcome::Skipped(SkipReason::DynamicMembership)
    );
    assert_eq!(SkipReason::DynamicMembership.as_str(), "dynamic");

    let remaining = directory.edges.lock().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].target_id.as_str(), "g-dynamic");
}

#[tokio::test]
async fn remove_all_continues_after_individual_failures() {
    let mut directory = directory_with_edges(vec![
        ("g-security", MembershipRole::Member),
        ("g-unified", MembershipRole::Member),
        ("g-owned", MembershipRole::Owner),
    ]);
    directory.failing_targets = HashSet::from(["g-security".to_owned()]);
    directory.denied_targets = HashSet::from(["g-unified".to_owned()]);
    let (service, directory) = service(directory);

    let result = service.remove_all_edges(&subject()).await.unwrap_or_default();

    assert_eq!(directory.mutations.lock().await.len(), 3);
    assert_eq!(result.removed.len(), 1);
    assert_eq!(result.failed.len(), 2);
    assert!(result.failed.iter().any(|item| matches!(
        item.outcome,
        EdgeOutcome::Failed(FailureReason::PermissionDenied(_))
    )));
    assert!(result.failed.iter().any(|item| matches!(
        item.outcome,
        EdgeOutcome::Failed(FailureReason::Unexpected(_))
    )));
}

#[tokio::test]
async fn reconcile_adds_missing_and_removes_extra_edges() {
    let (service, directory) = service(directory_with_edges(vec![
        ("g-security", MembershipRole::Member),
        ("g-owned", MembershipRole::Member),
        ("g-dynamic", MembershipRole::Member),
    ]));
    let current = current_memberships(&directory, "u1").await;
    let desired = vec![
        GroupMembership {
            group: group("g-security", "Security Team", EntityKind::SecurityGroup),
            role: MembershipRole::Member,
        },
        GroupMembership {
            group: group("g-unified", "Project Falcon", EntityKind::UnifiedGroup),
            role: MembershipRole::Member,
        },
        GroupMembership {
            group: group("g-unified", "Project Falcon", EntityKind::UnifiedGroup),
            role: MembershipRole::Member,
        },
        GroupMembership {
            group: group("g-dl", "Newsletter", EntityKind::MailEnabledGroup),
            role: MembershipRole::Member,
        },
    ];

    let result = service.reconcile(&subject(), desired, current).await;

    assert_eq!(result.added.len(), 1);
    assert_eq!(result.added[0].target_id, "g-unified");
    assert_eq!(result.removed.len(), 1);
    assert_eq!(result.removed[0].target_id, "g-owned");
    let skipped: HashSet<_> = result
        .skipped
        .iter()
        .map(|item| item.target_id.as_str())
        .collect();
    assert_eq!(skipped, HashSet::from(["g-security", "g-dl", "g-dynamic"]));
    assert!(result.failed.is_empty());
    assert_eq!(result.total(), 5);
}

#[tokio::test]
async fn reconcile_reports_every_target_when_one_fails() {
    let mut directory = directory_with_edges(Vec::new());
    directory.failing_targets = HashSet::from(["g-unified".to_owned()]);
    let (service, _) = service(directory);
    let desired = ["g-security", "g-unified", "g-owned"]
        .into_iter()
        .map(|id| GroupMembership {
            group: group(id, id, EntityKind::SecurityGroup),
            role: MembershipRole::Member,
        })
        .collect();

    let result = service.reconcile(&subject(), desired, Vec::new()).await;

    assert_eq!(result.added.len(), 2);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].target_id, "g-unified");
}

async fn current_memberships(directory: &FakeDirectory, subject: &str) -> Vec<GroupMembership> {
    directory
        .list_memberships(&entity_id(subject))
        .await
        .unwrap_or_default()
}
