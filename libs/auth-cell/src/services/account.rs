use std::sync::{Arc, OnceLock};

use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::Table;
use shared_models::auth::Role;
use shared_utils::jwt::issue_token;

use crate::services::password::{hash_password, verify_password};
use crate::{Account, AccountError, AccountQuery, LoginResponse, RegisterRequest};

const MIN_PASSWORD_LENGTH: usize = 8;

fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
        .map_or(false, |pattern| pattern.is_match(email))
}

pub struct AccountService {
    config: Arc<AppConfig>,
    accounts: Arc<Table<Account>>,
}

impl AccountService {
    pub fn new(config: Arc<AppConfig>, accounts: Arc<Table<Account>>) -> Self {
        Self { config, accounts }
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    pub async fn get(&self, id: Uuid) -> Result<Account, AccountError> {
        Ok(self.accounts.require(id).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Option<Account> {
        let email = email.trim().to_lowercase();
        self.accounts.find(|a| a.email.to_lowercase() == email).await
    }

    pub async fn list(&self, query: &AccountQuery) -> Vec<Account> {
        let mut accounts = self
            .accounts
            .filter(|a| {
                query.role.map_or(true, |role| a.role == role)
                    && query.is_active.map_or(true, |active| a.is_active == active)
            })
            .await;
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        accounts
    }

    /// Public self-registration always creates a patient account.
    pub async fn register(&self, request: RegisterRequest) -> Result<Account, AccountError> {
        self.create(request, Role::Patient).await
    }

    pub async fn create(&self, request: RegisterRequest, role: Role) -> Result<Account, AccountError> {
        let email = request.email.trim().to_string();
        if !is_valid_email(&email) {
            return Err(AccountError::InvalidEmail);
        }
        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AccountError::WeakPassword(MIN_PASSWORD_LENGTH));
        }
        if request.first_name.trim().is_empty() {
            return Err(AccountError::MissingField("first_name"));
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            role,
            phone: request.phone,
            address: request.address,
            date_of_birth: request.date_of_birth,
            is_active: true,
            password_hash: hash_password(&request.password)?,
            created_at: now,
            updated_at: now,
        };

        let account = self.accounts.insert(account).await?;
        info!("Created {} account {} ({})", account.role, account.id, account.email);
        Ok(account)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AccountError> {
        let Some(account) = self.find_by_email(email).await else {
            debug!("Login for unknown email {}", email);
            return Err(AccountError::InvalidCredentials);
        };

        if !verify_password(password, &account.password_hash)? {
            warn!("Failed login for account {}", account.id);
            return Err(AccountError::InvalidCredentials);
        }
        if !account.is_active {
            warn!("Login attempt on inactive account {}", account.id);
            return Err(AccountError::Inactive);
        }

        let token = issue_token(
            account.id,
            &account.email,
            account.role,
            &self.config.jwt_secret,
            self.config.token_ttl_hours,
        )
        .map_err(AccountError::Token)?;

        info!("Account {} logged in", account.id);
        Ok(LoginResponse {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.token_ttl_hours * 3600,
            user: account.profile(),
        })
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<Account, AccountError> {
        let account = self
            .accounts
            .update(id, |a| {
                a.is_active = false;
                a.updated_at = Utc::now();
            })
            .await?;
        info!("Deactivated account {}", id);
        Ok(account)
    }

    /// Creates the configured admin account unless one with that email exists.
    pub async fn ensure_admin(&self) -> Result<Option<Account>, AccountError> {
        let (Some(email), Some(password)) = (&self.config.admin_email, &self.config.admin_password) else {
            return Ok(None);
        };

        if self.find_by_email(email).await.is_some() {
            debug!("Bootstrap admin {} already present", email);
            return Ok(None);
        }

        let request = RegisterRequest {
            email: email.clone(),
            password: password.clone(),
            first_name: "Site".to_string(),
            last_name: "Administrator".to_string(),
            phone: None,
            address: None,
            date_of_birth: None,
        };
        self.create(request, Role::Admin).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service() -> AccountService {
        let config = AppConfig {
            jwt_secret: "account-test-secret".to_string(),
            ..AppConfig::default()
        };
        AccountService::new(Arc::new(config), Arc::new(Account::table()))
    }

    fn request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "s3cret-pass".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: None,
            address: None,
            date_of_birth: None,
        }
    }

    #[tokio::test]
    async fn email_is_unique_ignoring_case() {
        let service = service();
        service.register(request("ada@example.com")).await.unwrap();
        let err = service.register(request("ADA@example.com")).await.unwrap_err();
        assert_matches!(err, AccountError::EmailTaken);
    }

    #[tokio::test]
    async fn registration_validates_input() {
        let service = service();
        assert_matches!(service.register(request("not-an-email")).await, Err(AccountError::InvalidEmail));

        let mut short = request("short@example.com");
        short.password = "abc".to_string();
        assert_matches!(service.register(short).await, Err(AccountError::WeakPassword(_)));
    }

    #[tokio::test]
    async fn inactive_accounts_cannot_log_in() {
        let service = service();
        let account = service.register(request("ada@example.com")).await.unwrap();
        assert!(service.login("ada@example.com", "s3cret-pass").await.is_ok());

        service.deactivate(account.id).await.unwrap();
        assert_matches!(
            service.login("ada@example.com", "s3cret-pass").await,
            Err(AccountError::Inactive)
        );
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let service = service();
        service.register(request("ada@example.com")).await.unwrap();
        assert_matches!(
            service.login("ada@example.com", "nope-nope").await,
            Err(AccountError::InvalidCredentials)
        );
    }
}
