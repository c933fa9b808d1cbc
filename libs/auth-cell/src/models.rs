use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::{Record, Table};
use shared_models::auth::Role;

/// A stored user account. Handlers expose it through [`AccountProfile`] so the
/// password hash never leaves the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub is_active: bool,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn table() -> Table<Account> {
        Table::new("accounts").unique("accounts_email", |a: &Account| Some(a.email.to_lowercase()))
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            full_name: self.full_name(),
            role: self.role,
            phone: self.phone.clone(),
            address: self.address.clone(),
            date_of_birth: self.date_of_birth,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

impl Record for Account {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

/// Admin-only account creation. Unlike self-registration the role is chosen.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountRequest {
    #[serde(flatten)]
    pub details: RegisterRequest,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: AccountProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountQuery {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}
