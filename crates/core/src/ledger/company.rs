//! Companies (legal entities) owned by an organization.

use consolida_shared::types::{CompanyId, Currency, OrganizationId};
use serde::{Deserialize, Serialize};

/// A legal entity with its own books.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Company ID.
    pub id: CompanyId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Legal name.
    pub name: String,
    /// Currency the company keeps its books in.
    pub functional_currency: Currency,
    /// Inactive companies cannot join a group.
    pub is_active: bool,
}
