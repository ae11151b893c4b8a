use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AccessError;

// --- Pages & Permissions ---

/// PageKey
///
/// The closed set of business pages subject to permission gating. Declaration order is the
/// display order, and the derived `Ord` follows it, so sorted entries read like the menu.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PageKey {
    ProductsList,
    OrderList,
    MarketingList,
    MediaPlans,
    OfferPricingSkus,
    Clients,
    Suppliers,
    CustomerSupport,
    SalesReports,
    FinanceAccounting,
}

impl PageKey {
    pub const ALL: [PageKey; 10] = [
        PageKey::ProductsList,
        PageKey::OrderList,
        PageKey::MarketingList,
        PageKey::MediaPlans,
        PageKey::OfferPricingSkus,
        PageKey::Clients,
        PageKey::Suppliers,
        PageKey::CustomerSupport,
        PageKey::SalesReports,
        PageKey::FinanceAccounting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PageKey::ProductsList => "products_list",
            PageKey::OrderList => "order_list",
            PageKey::MarketingList => "marketing_list",
            PageKey::MediaPlans => "media_plans",
            PageKey::OfferPricingSkus => "offer_pricing_skus",
            PageKey::Clients => "clients",
            PageKey::Suppliers => "suppliers",
            PageKey::CustomerSupport => "customer_support",
            PageKey::SalesReports => "sales_reports",
            PageKey::FinanceAccounting => "finance_accounting",
        }
    }

    /// Human label shown in menus and the permission editor.
    pub fn label(self) -> &'static str {
        match self {
            PageKey::ProductsList => "Products List",
            PageKey::OrderList => "Order List",
            PageKey::MarketingList => "Marketing List",
            PageKey::MediaPlans => "Media Plans",
            PageKey::OfferPricingSkus => "Offer Pricing SKUs",
            PageKey::Clients => "Clients",
            PageKey::Suppliers => "Suppliers",
            PageKey::CustomerSupport => "Customer Support",
            PageKey::SalesReports => "Sales Reports",
            PageKey::FinanceAccounting => "Finance & Accounting",
        }
    }

    /// Route path of the page, e.g. `/clients`.
    pub fn path(self) -> String {
        format!("/{}", self.as_str())
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageKey {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PageKey::ALL
            .into_iter()
            .find(|page| page.as_str() == s)
            .ok_or_else(|| AccessError::validation("Invalid page"))
    }
}

/// One of the four actions a permission entry governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    View,
    Edit,
    Create,
    Delete,
}

/// PermissionFlags
///
/// The four flags of an entry, always written together. Missing fields deserialize as
/// `false`, so an omitted flag means "no access".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(default)]
#[ts(export)]
pub struct PermissionFlags {
    pub can_view: bool,
    pub can_edit: bool,
    pub can_create: bool,
    pub can_delete: bool,
}

impl PermissionFlags {
    pub const NONE: PermissionFlags = PermissionFlags {
        can_view: false,
        can_edit: false,
        can_create: false,
        can_delete: false,
    };

    pub const ALL: PermissionFlags = PermissionFlags {
        can_view: true,
        can_edit: true,
        can_create: true,
        can_delete: true,
    };

    pub fn view_only() -> Self {
        Self {
            can_view: true,
            ..Self::NONE
        }
    }

    pub fn allows(&self, action: PageAction) -> bool {
        match action {
            PageAction::View => self.can_view,
            PageAction::Edit => self.can_edit,
            PageAction::Create => self.can_create,
            PageAction::Delete => self.can_delete,
        }
    }
}

/// PermissionEntry
///
/// The access record of one principal on one page. `(principal_id, page)` is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PermissionEntry {
    pub principal_id: Uuid,
    pub page: PageKey,
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_create: bool,
    #[serde(default)]
    pub can_delete: bool,
}

impl PermissionEntry {
    pub fn new(principal_id: Uuid, page: PageKey, flags: PermissionFlags) -> Self {
        Self {
            principal_id,
            page,
            can_view: flags.can_view,
            can_edit: flags.can_edit,
            can_create: flags.can_create,
            can_delete: flags.can_delete,
        }
    }

    pub fn flags(&self) -> PermissionFlags {
        PermissionFlags {
            can_view: self.can_view,
            can_edit: self.can_edit,
            can_create: self.can_create,
            can_delete: self.can_delete,
        }
    }
}

// --- Principals ---

/// Principal
///
/// An account as the rest of the system sees it. The password hash lives only in
/// `PrincipalRecord` and never reaches a response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub is_superuser: bool,
    #[ts(type = "string")]
    pub date_joined: DateTime<Utc>,
}

/// PrincipalRecord
///
/// Repository-internal row: the principal plus its argon2 PHC string.
#[derive(Clone)]
pub struct PrincipalRecord {
    pub principal: Principal,
    pub password_hash: String,
}

impl fmt::Debug for PrincipalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrincipalRecord")
            .field("principal", &self.principal)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// PrincipalSnapshot
///
/// What the login response (and `/me/permissions`) hands the client: enough to build the
/// Identity Context without another round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PrincipalSnapshot {
    pub id: Uuid,
    pub email: String,
    pub is_superuser: bool,
    pub permissions: Vec<PermissionEntry>,
}

/// One row of the administrator listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PrincipalWithPermissions {
    pub principal: Principal,
    pub permissions: Vec<PermissionEntry>,
}

// --- Session ---

/// SessionCredential
///
/// The bearer pair issued at login. Opaque to the client; `Debug` never prints the tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionCredential {
    pub access: String,
    pub refresh: String,
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

// --- Request Payloads ---

/// LoginRequest
///
/// Input payload for POST /api/login, as clients send it. The login identifier is the
/// email.
#[derive(Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// LoginForm
///
/// What the login handler accepts: a `LoginRequest`, or the same body with `username` in
/// place of `email` from older clients. Kept out of the exported bindings, which describe
/// only the current shape.
#[derive(Clone, Deserialize)]
pub struct LoginForm {
    #[serde(alias = "username")]
    pub email: String,
    pub password: String,
}

impl From<LoginForm> for LoginRequest {
    fn from(form: LoginForm) -> Self {
        Self {
            email: form.email,
            password: form.password,
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// CreatePrincipalRequest
///
/// Input payload for POST /api/admin/users. The password is hashed immediately and never
/// logged.
#[derive(Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePrincipalRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for CreatePrincipalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatePrincipalRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// SetPermissionsRequest
///
/// Input payload for PUT /api/admin/users/{id}/permissions. `page` stays a string so an
/// unknown key is reported as a validation error rather than a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SetPermissionsRequest {
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_create: bool,
    #[serde(default)]
    pub can_delete: bool,
}

impl SetPermissionsRequest {
    pub fn new(page: PageKey, flags: PermissionFlags) -> Self {
        Self {
            page: page.as_str().to_string(),
            can_view: flags.can_view,
            can_edit: flags.can_edit,
            can_create: flags.can_create,
            can_delete: flags.can_delete,
        }
    }

    pub fn flags(&self) -> PermissionFlags {
        PermissionFlags {
            can_view: self.can_view,
            can_edit: self.can_edit,
            can_create: self.can_create,
            can_delete: self.can_delete,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

// --- Response Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub message: String,
    pub user: PrincipalSnapshot,
    pub tokens: SessionCredential,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MeResponse {
    pub user: PrincipalSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UsersResponse {
    pub users: Vec<PrincipalWithPermissions>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatePrincipalResponse {
    pub message: String,
    pub principal: Principal,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
