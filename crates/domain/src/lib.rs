//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod call;
mod credential;
mod directory;
mod mailbox;
mod membership;
mod operation;

pub use call::{CallOutcome, CallStatus};
pub use credential::{
    AccessToken, ApiScope, Credential, EXCHANGE_RESOURCE, GRAPH_RESOURCE,
    company_domain_secret_name,
};
pub use directory::{
    DYNAMIC_MEMBERSHIP_GROUP_TYPE, DirectoryEntity, EntityCategory, EntityId, EntityKind,
    GroupClass, SearchField, UNIFIED_GROUP_TYPE,
};
pub use mailbox::{MailboxPermissionEdge, MailboxRight};
pub use membership::{GroupMembership, MembershipEdge, MembershipRole, dedupe_memberships};
pub use operation::BotOperation;
