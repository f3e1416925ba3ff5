/*!
 * # Permissions Module
 *
 * Permission strings are `<resource>:<action>`. Roles map to permissions
 * through the `role_permissions` table; `admin` skips the check entirely.
 */

/// Role that bypasses permission checks
pub const ADMIN_ROLE: &str = "admin";

/// Common permission string constants for compile-time safety
pub mod consts {
    // Documents
    pub const DOCUMENTS_READ: &str = "documents:read";
    pub const DOCUMENTS_CREATE: &str = "documents:create";
    pub const DOCUMENTS_UPDATE: &str = "documents:update";
    pub const DOCUMENTS_DELETE: &str = "documents:delete";

    // Counterparties
    pub const COUNTERPARTIES_READ: &str = "counterparties:read";
    pub const COUNTERPARTIES_MANAGE: &str = "counterparties:manage";

    // Assets
    pub const ASSETS_READ: &str = "assets:read";
    pub const ASSETS_MANAGE: &str = "assets:manage";

    // Attachments
    pub const ATTACHMENTS_READ: &str = "attachments:read";
    pub const ATTACHMENTS_MANAGE: &str = "attachments:manage";

    // Vehicles
    pub const VEHICLES_READ: &str = "vehicles:read";
}

use consts::*;

/// Every permission the service checks
pub const ALL_PERMISSIONS: &[&str] = &[
    DOCUMENTS_READ,
    DOCUMENTS_CREATE,
    DOCUMENTS_UPDATE,
    DOCUMENTS_DELETE,
    COUNTERPARTIES_READ,
    COUNTERPARTIES_MANAGE,
    ASSETS_READ,
    ASSETS_MANAGE,
    ATTACHMENTS_READ,
    ATTACHMENTS_MANAGE,
    VEHICLES_READ,
];

/// Roles seeded by the initial migration
pub const SEEDED_ROLES: &[(&str, &[&str])] = &[
    (
        "clerk",
        &[
            DOCUMENTS_READ,
            DOCUMENTS_CREATE,
            DOCUMENTS_UPDATE,
            COUNTERPARTIES_READ,
            COUNTERPARTIES_MANAGE,
            ASSETS_READ,
            ASSETS_MANAGE,
            ATTACHMENTS_READ,
            ATTACHMENTS_MANAGE,
            VEHICLES_READ,
        ],
    ),
    (
        "viewer",
        &[
            DOCUMENTS_READ,
            COUNTERPARTIES_READ,
            ASSETS_READ,
            ATTACHMENTS_READ,
            VEHICLES_READ,
        ],
    ),
];

pub fn is_known_permission(permission: &str) -> bool {
    ALL_PERMISSIONS.contains(&permission)
}
