//! Role authorization table
//!
//! Static mapping of role to allowed pages and actions. Pure lookups; an
//! unknown page or action is denied and logged as a configuration gap.
//! Roles arrive from the identity provider as opaque strings and are passed
//! explicitly into every check.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::{Error, Result};

/// Roles issued by the identity provider, lowest rank first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    PhotoUser,
    Expert,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::PhotoUser, Role::Expert, Role::Admin, Role::SuperAdmin];

    /// Rank in the hierarchy: photouser(1) < expert(2) < admin(3) < superadmin(4)
    pub fn rank(self) -> u8 {
        match self {
            Role::PhotoUser => 1,
            Role::Expert => 2,
            Role::Admin => 3,
            Role::SuperAdmin => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::PhotoUser => "photouser",
            Role::Expert => "expert",
            Role::Admin => "admin",
            Role::SuperAdmin => "superadmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "photouser" => Ok(Role::PhotoUser),
            "expert" => Ok(Role::Expert),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::SuperAdmin),
            other => Err(Error::Validation(format!("Unknown role: {}", other))),
        }
    }
}

const ALL_ROLES: &[Role] = &Role::ALL;
const PHOTO_USER: &[Role] = &[Role::PhotoUser];
const EXPERT_AND_ABOVE: &[Role] = &[Role::Expert, Role::Admin, Role::SuperAdmin];
const ADMIN_AND_ABOVE: &[Role] = &[Role::Admin, Role::SuperAdmin];
const SUPERADMIN_ONLY: &[Role] = &[Role::SuperAdmin];

/// Page permissions, keyed by normalized path
const PAGE_PERMISSIONS: &[(&str, &[Role])] = &[
    ("/", ALL_ROLES),
    ("/success", ALL_ROLES),
    ("/photo/upload", PHOTO_USER),
    ("/items", EXPERT_AND_ABOVE),
    ("/items/[id]", EXPERT_AND_ABOVE),
    ("/items/[id]/review", EXPERT_AND_ABOVE),
    ("/admin/users", ADMIN_AND_ABOVE),
];

/// Action names for the review engine operations
pub mod actions {
    pub const UPLOAD_PHOTOS: &str = "upload_photos";
    pub const REVIEW_ITEMS: &str = "review_items";
    pub const MANAGE_USERS: &str = "manage_users";
    pub const DELETE_USERS: &str = "delete_users";
    pub const CREATE_SUPERADMIN: &str = "create_superadmin";

    pub const BLOB_PUT: &str = "blob.put";
    pub const SUBMISSION_CREATE: &str = "submission.create";
    pub const SUBMISSION_GET: &str = "submission.get";
    pub const SUBMISSION_LIST: &str = "submission.list";
    pub const IMAGES_UPLOAD: &str = "submission.images.upload";
    pub const IMAGES_DELETE: &str = "submission.images.delete";
    pub const IMAGES_DELETE_HARD: &str = "submission.images.delete.hard";
    pub const IMAGES_HISTORY: &str = "submission.images.history";
    pub const IMAGES_REASSIGN_EXISTING: &str = "submission.images.reassign.existing";
    pub const IMAGES_REASSIGN_NEW: &str = "submission.images.reassign.new";
    pub const REVIEW_START: &str = "submission.review.start";
    pub const COMPLETE: &str = "submission.complete";
    pub const REJECT: &str = "submission.reject";
    pub const REOPEN: &str = "submission.reopen";
}

const ACTION_PERMISSIONS: &[(&str, &[Role])] = &[
    (actions::UPLOAD_PHOTOS, PHOTO_USER),
    (actions::REVIEW_ITEMS, EXPERT_AND_ABOVE),
    (actions::MANAGE_USERS, ADMIN_AND_ABOVE),
    (actions::DELETE_USERS, ADMIN_AND_ABOVE),
    (actions::CREATE_SUPERADMIN, SUPERADMIN_ONLY),
    (actions::BLOB_PUT, ALL_ROLES),
    (actions::SUBMISSION_CREATE, PHOTO_USER),
    (actions::SUBMISSION_GET, EXPERT_AND_ABOVE),
    (actions::SUBMISSION_LIST, EXPERT_AND_ABOVE),
    (actions::IMAGES_UPLOAD, ALL_ROLES),
    (actions::IMAGES_DELETE, EXPERT_AND_ABOVE),
    (actions::IMAGES_DELETE_HARD, ADMIN_AND_ABOVE),
    (actions::IMAGES_HISTORY, EXPERT_AND_ABOVE),
    (actions::IMAGES_REASSIGN_EXISTING, EXPERT_AND_ABOVE),
    (actions::IMAGES_REASSIGN_NEW, EXPERT_AND_ABOVE),
    (actions::REVIEW_START, EXPERT_AND_ABOVE),
    (actions::COMPLETE, EXPERT_AND_ABOVE),
    (actions::REJECT, EXPERT_AND_ABOVE),
    (actions::REOPEN, ADMIN_AND_ABOVE),
];

fn lookup(table: &'static [(&'static str, &'static [Role])], key: &str) -> Option<&'static [Role]> {
    table.iter().find(|(k, _)| *k == key).map(|(_, roles)| *roles)
}

/// Map dynamic routes onto their table keys
pub fn normalize_path(path: &str) -> &str {
    if path.starts_with("/items/") && path.contains("/review") {
        return "/items/[id]/review";
    }
    if path.starts_with("/items/") {
        return "/items/[id]";
    }
    path
}

/// Check a page path or an action name against the table for an opaque role
///
/// Unknown routes and unknown roles are denied.
pub fn is_allowed(route_or_action: &str, role: &str) -> bool {
    let Ok(role) = role.parse::<Role>() else {
        return false;
    };

    let allowed = lookup(ACTION_PERMISSIONS, route_or_action)
        .or_else(|| lookup(PAGE_PERMISSIONS, normalize_path(route_or_action)));

    match allowed {
        Some(roles) => roles.contains(&role),
        None => {
            warn!("No permissions defined for route/action: {}", route_or_action);
            false
        }
    }
}

/// Same as [`is_allowed`] but as a `Result`, for use at service entry points
pub fn authorize(route_or_action: &str, role: &str) -> Result<()> {
    if is_allowed(route_or_action, role) {
        Ok(())
    } else {
        Err(Error::Forbidden(format!(
            "role '{}' may not perform '{}'",
            role, route_or_action
        )))
    }
}

/// Authenticated caller as handed over by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: String,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
        }
    }

    pub fn authorize(&self, action: &str) -> Result<()> {
        authorize(action, &self.role)
    }
}

/// Coarse rank comparison; unknown roles rank 0
pub fn has_minimum_role(role: &str, required: &str) -> bool {
    let rank = |r: &str| r.parse::<Role>().map(Role::rank).unwrap_or(0);
    rank(role) >= rank(required)
}

/// Page paths reachable by a role, in table order
pub fn accessible_pages(role: &str) -> Vec<&'static str> {
    let Ok(role) = role.parse::<Role>() else {
        return Vec::new();
    };
    PAGE_PERMISSIONS
        .iter()
        .filter(|(_, roles)| roles.contains(&role))
        .map(|(path, _)| *path)
        .collect()
}

/// Landing page after sign-in
pub fn default_redirect(role: &str) -> &'static str {
    match role.parse::<Role>() {
        Ok(Role::PhotoUser) => "/photo/upload",
        Ok(Role::Expert | Role::Admin | Role::SuperAdmin) => "/items",
        Err(_) => "/",
    }
}
