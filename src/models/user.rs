//! User Model
//!
//! Accounts, roles and the request/response shapes for account management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::Display;

/// Account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Display)]
#[sqlx(type_name = "text")]
pub enum Role {
    #[serde(rename = "admin")]
    #[sqlx(rename = "admin")]
    #[strum(serialize = "admin")]
    Admin,
    #[serde(rename = "church_pastor")]
    #[sqlx(rename = "church_pastor")]
    #[strum(serialize = "church_pastor")]
    ChurchPastor,
    #[serde(rename = "Père")]
    #[sqlx(rename = "Père")]
    #[strum(serialize = "Père")]
    Pere,
    #[serde(rename = "Mère")]
    #[sqlx(rename = "Mère")]
    #[strum(serialize = "Mère")]
    Mere,
    #[serde(rename = "Other")]
    #[sqlx(rename = "Other")]
    #[strum(serialize = "Other")]
    Other,
}

impl Role {
    /// Admin and church pastor see every family and manage prayer chains
    pub fn is_pastor_level(&self) -> bool {
        matches!(self, Role::Admin | Role::ChurchPastor)
    }

    /// Père and Mère manage their own family
    pub fn is_parent(&self) -> bool {
        matches!(self, Role::Pere | Role::Mere)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Display)]
#[sqlx(type_name = "text")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type, Display)]
#[sqlx(type_name = "text")]
pub enum FamilyCategory {
    Young,
    Mature,
}

/// Family roles that grant youth committee powers to `Other` users
const YOUTH_COMMITTEE_ROLES: [&str; 2] = ["youth leader", "youth committee"];

/// Stored account
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub gender: Gender,
    pub role: Role,
    pub family_id: Option<i64>,
    pub family_role: Option<String>,
    pub other: Option<String>,
    pub profile_pic: Option<String>,
    pub biography: Option<String>,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    #[serde(skip_serializing)]
    pub access_code: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_pastor_level(&self) -> bool {
        self.role.is_pastor_level()
    }

    /// Whether this account may read data scoped to `family_id`
    pub fn can_view_family(&self, family_id: i64) -> bool {
        self.is_pastor_level() || self.family_id == Some(family_id)
    }

    /// Whether this account may write data scoped to `family_id`
    pub fn can_manage_family(&self, family_id: i64) -> bool {
        self.is_admin() || (self.role.is_parent() && self.family_id == Some(family_id))
    }

    /// Youth committee: pastor level, or an `Other` user whose family role is youth leader/committee
    pub fn is_youth_committee(&self) -> bool {
        if self.is_pastor_level() {
            return true;
        }
        if self.role != Role::Other {
            return false;
        }
        self.family_role
            .as_deref()
            .map(|role| role.trim().to_lowercase())
            .is_some_and(|role| YOUTH_COMMITTEE_ROLES.contains(&role.as_str()))
    }
}

/// Request to create an account (admin only)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub gender: Gender,
    pub role: Role,
    /// Required for admin accounts; other roles log in with a generated access code
    pub password: Option<String>,
    pub family_category: Option<FamilyCategory>,
    pub family_name: Option<String>,
    pub family_role: Option<String>,
    pub other: Option<String>,
    pub biography: Option<String>,
}

/// Created account, with the plain access code shown once
#[derive(Debug, Clone, Serialize)]
pub struct CreatedUserResponse {
    pub user: User,
    pub access_code: Option<String>,
}

/// Self-service profile update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub biography: Option<String>,
    pub profile_pic: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// Administrative account update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub family_id: Option<i64>,
    pub family_role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessCodeResponse {
    pub user_id: i64,
    pub access_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: User,
}
