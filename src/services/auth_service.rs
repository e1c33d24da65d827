//! Authentication Service
//!
//! PBKDF2-HMAC-SHA256 password hashing, access codes, JWT issue/verify and
//! login.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use sqlx::{query_as, SqlitePool};

use crate::error::{AppError, AppResult};
use crate::logging::log_auth_event;
use crate::models::user::{Role, TokenResponse, User};

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const LOGIN_FAILED: &str = "Incorrect email or password";

/// Salted PBKDF2 password hashes in PHC string format
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    /// Hash to `$pbkdf2-sha256$i=<iterations>,l=32$<salt>$<hash>`
    pub fn hash(&self, password: &str) -> AppResult<String> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = SaltString::encode_b64(&salt)
            .map_err(|e| AppError::internal_error(&format!("Salt encoding failed: {}", e)))?;
        let params = Params {
            rounds: self.iterations,
            output_length: HASH_LEN,
        };
        let hash = Pbkdf2
            .hash_password_customized(password.as_bytes(), None, None, params, &salt)
            .map_err(|e| AppError::internal_error(&format!("Password hashing failed: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Check a password against a stored hash. Malformed hashes never verify.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}

/// Random 4-digit access code
pub fn generate_access_code() -> String {
    format!("{:04}", rand::thread_rng().gen_range(0..10_000))
}

/// JWT claims carried by every bearer token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub uid: i64,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 token issue and validation
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expire_minutes: i64,
}

impl TokenService {
    pub fn new(secret: &str, expire_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expire_minutes,
        }
    }

    pub fn issue(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.email.clone(),
            uid: user.id,
            role: user.role,
            iat: now,
            exp: now + self.expire_minutes * 60,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))?;
        Ok(data.claims)
    }
}

/// Credential checks against the users table
#[derive(Clone)]
pub struct AuthService {
    pool: SqlitePool,
    hasher: PasswordHasher,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(pool: SqlitePool, hasher: PasswordHasher, tokens: TokenService) -> Self {
        Self {
            pool,
            hasher,
            tokens,
        }
    }

    pub fn hasher(&self) -> PasswordHasher {
        self.hasher
    }

    /// Exchange email and password (or access code) for a bearer token
    pub async fn login(&self, email: &str, password: &str) -> AppResult<TokenResponse> {
        let email = email.trim().to_lowercase();
        let user: Option<User> = query_as("SELECT * FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;

        let Some(user) = user.filter(|user| self.hasher.verify(password, &user.hashed_password)) else {
            log_auth_event("login", Some(&email), false);
            return Err(AppError::authentication_failed(LOGIN_FAILED));
        };

        if !user.is_active {
            log_auth_event("login_inactive", Some(&email), false);
            return Err(AppError::forbidden("Inactive user"));
        }

        let access_token = self.tokens.issue(&user)?;
        log_auth_event("login", Some(&email), true);

        Ok(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            user,
        })
    }

    /// Resolve a bearer token to its active account
    pub async fn authenticate(&self, token: &str) -> AppResult<User> {
        let claims = self.tokens.verify(token)?;
        let user: Option<User> = query_as("SELECT * FROM users WHERE id = ?")
            .bind(claims.uid)
            .fetch_optional(&self.pool)
            .await?;

        match user {
            Some(user) if user.email == claims.sub => {
                if user.is_active {
                    Ok(user)
                } else {
                    Err(AppError::forbidden("Inactive user"))
                }
            }
            _ => Err(AppError::authentication_failed("Could not validate credentials")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Gender;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: 7,
            full_name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
            phone: "0788000000".to_string(),
            gender: Gender::Female,
            role: Role::Mere,
            family_id: Some(2),
            family_role: None,
            other: None,
            profile_pic: None,
            biography: None,
            hashed_password: String::new(),
            access_code: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new(1_000);
        let hash = hasher.hash("secret-pass").unwrap();
        assert!(hash.starts_with("$pbkdf2-sha256$i=1000,l=32$"));
        assert!(hasher.verify("secret-pass", &hash));
        assert!(!hasher.verify("wrong-pass", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = PasswordHasher::new(10);
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn test_stored_rounds_win_over_configured() {
        let hash = PasswordHasher::new(20).hash("choir").unwrap();
        assert!(PasswordHasher::new(5_000).verify("choir", &hash));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        let hasher = PasswordHasher::new(10);
        assert!(!hasher.verify("x", ""));
        assert!(!hasher.verify("x", "plaintext"));
        assert!(!hasher.verify("x", "pbkdf2-sha256$10$AAAA$AAAA"));
        assert!(!hasher.verify("x", "$pbkdf2-sha256$i=abc,l=32$c2FsdHNhbHQ$AAAA"));
        assert!(!hasher.verify("x", "$bcrypt$i=10$c2FsdHNhbHQ$AAAA"));
        assert!(!hasher.verify("x", "$pbkdf2-sha256$i=10,l=32$!!$AAAA"));
    }

    #[test]
    fn test_known_vector() {
        // RFC 7914 section 11, first 32 bytes of the 64-byte output
        let stored = format!(
            "$pbkdf2-sha256$i=1,l=32$c2FsdA${}",
            "VawEblbjCJ/sFpHCJUS2BflBhSFt3gRl5oudV8INrLw"
        );
        assert!(PasswordHasher::new(1).verify("passwd", &stored));
    }

    #[test]
    fn test_access_code_shape() {
        for _ in 0..50 {
            let code = generate_access_code();
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_token_round_trip_and_tamper() {
        let tokens = TokenService::new("a-test-secret-that-is-long-enough!!", 30);
        let token = tokens.issue(&user()).unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.uid, 7);
        assert_eq!(claims.sub, "grace@example.com");
        assert_eq!(claims.role, Role::Mere);
        assert_eq!(claims.exp - claims.iat, 30 * 60);

        let other = TokenService::new("another-secret-entirely-different", 30);
        assert!(matches!(other.verify(&token), Err(AppError::Token(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = TokenService::new("a-test-secret-that-is-long-enough!!", -10);
        let token = tokens.issue(&user()).unwrap();
        assert!(tokens.verify(&token).is_err());
    }
}
