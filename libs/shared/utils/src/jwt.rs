use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{JwtClaims, Role, User};

type HmacSha256 = Hmac<Sha256>;

/// Issues an HS256 token for the given account.
pub fn issue_token(
    user_id: Uuid,
    email: &str,
    role: Role,
    jwt_secret: &str,
    ttl_hours: i64,
) -> Result<String, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let now = Utc::now();
    let exp = now + Duration::hours(ttl_hours);

    let header = json!({ "alg": "HS256", "typ": "JWT" });
    let claims = json!({
        "sub": user_id.to_string(),
        "email": email,
        "role": role.as_str(),
        "iat": now.timestamp(),
        "exp": exp.timestamp(),
    });

    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    debug!("Issued token for user {} ({})", user_id, role);
    Ok(format!("{}.{}", signing_input, signature))
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    // Split token into parts
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let signature = match URL_SAFE_NO_PAD.decode(signature_b64) {
        Ok(sig) => sig,
        Err(e) => {
            debug!("Failed to decode signature: {}", e);
            return Err("Invalid signature encoding".to_string());
        }
    };

    let signature_string = format!("{}.{}", header_b64, claims_b64);

    let mut mac = match HmacSha256::new_from_slice(jwt_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return Err("Failed to create HMAC".to_string()),
    };

    mac.update(signature_string.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims_json = match URL_SAFE_NO_PAD.decode(claims_b64) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(json_str) => json_str,
            Err(_) => return Err("Invalid claims encoding".to_string()),
        },
        Err(_) => return Err("Invalid claims encoding".to_string()),
    };

    let claims: JwtClaims = match serde_json::from_str(&claims_json) {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to parse claims: {}", e);
            return Err("Invalid claims format".to_string());
        }
    };

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid subject claim".to_string())?;

    let role = claims
        .role
        .as_deref()
        .ok_or_else(|| "Missing role claim".to_string())?
        .parse::<Role>()?;

    let created_at = claims
        .iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        id,
        email: claims.email,
        role,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn issued_token_validates() {
        let id = Uuid::new_v4();
        let token = issue_token(id, "doc@example.com", Role::Doctor, SECRET, 1).unwrap();

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, Role::Doctor);
        assert_eq!(user.email.as_deref(), Some("doc@example.com"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(Uuid::new_v4(), "a@b.c", Role::Patient, SECRET, 1).unwrap();
        assert_eq!(
            validate_token(&token, "other-secret").unwrap_err(),
            "Invalid token signature"
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token(Uuid::new_v4(), "a@b.c", Role::Patient, SECRET, -1).unwrap();
        assert_eq!(validate_token(&token, SECRET).unwrap_err(), "Token expired");
    }

    #[test]
    fn empty_secret_refuses_to_issue() {
        assert!(issue_token(Uuid::new_v4(), "a@b.c", Role::Admin, "", 1).is_err());
    }
}
