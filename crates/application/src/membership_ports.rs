use async_trait::async_trait;
use ledgerguard_core::{AppResult, BusinessId, UserId};
use ledgerguard_domain::{AuditRecord, Membership, MembershipChange};

/// Port for membership storage.
///
/// Implementations own the transactional boundary: the changed membership row
/// and its audit record are either both visible or neither is.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Finds the membership row for a user in a business, in any status.
    async fn find_membership(
        &self,
        business_id: BusinessId,
        user_id: &UserId,
    ) -> AppResult<Option<Membership>>;

    /// Lists memberships in a business ordered by user id.
    async fn list_memberships(
        &self,
        business_id: BusinessId,
        include_removed: bool,
    ) -> AppResult<Vec<Membership>>;

    /// Applies a change and appends its audit record atomically.
    async fn apply_change(&self, change: MembershipChange) -> AppResult<(Membership, AuditRecord)>;
}
