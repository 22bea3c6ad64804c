use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use ledgerguard_core::{AppError, AppResult, BusinessId, Identity, UserId};
use ledgerguard_domain::{Permission, Role};
use tracing::{debug, warn};

use crate::{EffectivePermissionResolver, MembershipRepository};

/// Request location a business id was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessIdSource {
    /// `x-business-id` header.
    Header,
    /// URL path parameter.
    Path,
    /// JSON body field `businessId`.
    Body,
    /// Query parameter `businessId`.
    Query,
}

impl BusinessIdSource {
    /// Returns a stable label for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Path => "path",
            Self::Body => "body",
            Self::Query => "query",
        }
    }
}

/// Raw business id candidates collected from an inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusinessIdSources {
    /// Value of the `x-business-id` header.
    pub header: Option<String>,
    /// Value of the `businessId` path parameter.
    pub path: Option<String>,
    /// Value of the `businessId` JSON body field.
    pub body: Option<String>,
    /// Value of the `businessId` query parameter.
    pub query: Option<String>,
}

impl BusinessIdSources {
    /// Returns the first non-empty candidate in header, path, body, query order.
    #[must_use]
    pub fn select(&self) -> Option<(BusinessIdSource, &str)> {
        [
            (BusinessIdSource::Header, self.header.as_deref()),
            (BusinessIdSource::Path, self.path.as_deref()),
            (BusinessIdSource::Body, self.body.as_deref()),
            (BusinessIdSource::Query, self.query.as_deref()),
        ]
        .into_iter()
        .find_map(|(source, value)| {
            value
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| (source, value))
        })
    }

    /// Selects and parses the business id.
    pub fn resolve(&self) -> AppResult<(BusinessIdSource, BusinessId)> {
        let (source, value) = self.select().ok_or(AppError::MissingBusinessId)?;
        Ok((source, BusinessId::from_str(value)?))
    }
}

/// Behavior when an authenticated user has no active membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingMembershipPolicy {
    /// Reject the request with `Forbidden`.
    #[default]
    Deny,
    /// Grant owner-equivalent permissions, for data created before memberships
    /// were recorded.
    GrantOwner,
}

impl MissingMembershipPolicy {
    /// Returns a stable configuration value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deny => "deny",
            Self::GrantOwner => "grant_owner",
        }
    }
}

impl FromStr for MissingMembershipPolicy {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "deny" => Ok(Self::Deny),
            "grant_owner" => Ok(Self::GrantOwner),
            _ => Err(AppError::Validation(format!(
                "missing membership policy must be 'deny' or 'grant_owner', got '{value}'"
            ))),
        }
    }
}

/// How a business context obtained its permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextGrant {
    /// Active membership row.
    Membership,
    /// Platform superadmin flag.
    Superadmin,
    /// Owner-equivalent fallback for users without a membership.
    LegacyOwnerFallback,
}

/// Per-request snapshot of a user's authorization state in one business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessContext {
    business_id: BusinessId,
    user_id: UserId,
    role: Role,
    is_owner: bool,
    is_superadmin: bool,
    permissions: BTreeSet<Permission>,
    grant: ContextGrant,
}

impl BusinessContext {
    /// Returns the business scope.
    #[must_use]
    pub fn business_id(&self) -> BusinessId {
        self.business_id
    }

    /// Returns the caller.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the caller's role in the business.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns whether the caller owns the business.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// Returns whether the caller is a platform superadmin.
    #[must_use]
    pub fn is_superadmin(&self) -> bool {
        self.is_superadmin
    }

    /// Returns the resolved effective permissions.
    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }

    /// Returns how the context was granted.
    #[must_use]
    pub fn grant(&self) -> ContextGrant {
        self.grant
    }
}

/// Builds the business context for one request.
///
/// Performs at most one membership read and never caches across calls.
#[derive(Clone)]
pub struct BusinessContextResolver {
    memberships: Arc<dyn MembershipRepository>,
    permissions: EffectivePermissionResolver,
    missing_membership_policy: MissingMembershipPolicy,
}

impl BusinessContextResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        permissions: EffectivePermissionResolver,
        missing_membership_policy: MissingMembershipPolicy,
    ) -> Self {
        Self {
            memberships,
            permissions,
            missing_membership_policy,
        }
    }

    /// Returns the configured missing-membership policy.
    #[must_use]
    pub fn missing_membership_policy(&self) -> MissingMembershipPolicy {
        self.missing_membership_policy
    }

    /// Resolves the context from request sources.
    pub async fn resolve(
        &self,
        identity: Option<&Identity>,
        sources: &BusinessIdSources,
    ) -> AppResult<BusinessContext> {
        let identity =
            identity.ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;
        let (source, business_id) = sources.resolve()?;
        debug!(
            business_id = %business_id,
            source = source.as_str(),
            "resolved business id"
        );

        self.resolve_for(identity, business_id).await
    }

    /// Resolves the context for an already known business id.
    pub async fn resolve_for(
        &self,
        identity: &Identity,
        business_id: BusinessId,
    ) -> AppResult<BusinessContext> {
        let user_id = identity.user_id().clone();

        if identity.is_superadmin() {
            return Ok(BusinessContext {
                business_id,
                user_id,
                role: Role::Superadmin,
                is_owner: false,
                is_superadmin: true,
                permissions: Permission::all().iter().copied().collect(),
                grant: ContextGrant::Superadmin,
            });
        }

        let membership = self
            .memberships
            .find_membership(business_id, &user_id)
            .await?
            .filter(|membership| membership.is_active());

        if let Some(membership) = membership {
            return Ok(BusinessContext {
                business_id,
                user_id,
                role: membership.role(),
                is_owner: membership.is_owner(),
                is_superadmin: false,
                permissions: self
                    .permissions
                    .resolve(membership.role(), membership.custom_permissions()),
                grant: ContextGrant::Membership,
            });
        }

        match self.missing_membership_policy {
            MissingMembershipPolicy::Deny => Err(AppError::Forbidden(format!(
                "no active membership in business '{business_id}'"
            ))),
            MissingMembershipPolicy::GrantOwner => {
                warn!(
                    business_id = %business_id,
                    user_id = %user_id,
                    "granting owner-equivalent permissions to user without membership"
                );

                Ok(BusinessContext {
                    business_id,
                    user_id,
                    role: Role::Owner,
                    is_owner: false,
                    is_superadmin: false,
                    permissions: self.permissions.resolve(Role::Owner, None),
                    grant: ContextGrant::LegacyOwnerFallback,
                })
            }
        }
    }
}
