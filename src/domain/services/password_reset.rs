use std::sync::Arc;
use chrono::Duration;
use rand::{distributions::Alphanumeric, Rng};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::models::{
    notification::{Notification, NotificationPurpose},
    password_reset::{IssuedToken, PasswordResetToken},
    user::normalize_email,
};
use crate::domain::ports::{Clock, Notifier, PasswordResetRepository, UserRepository};
use crate::domain::services::credentials::{hash_password, validate_password};
use crate::domain::services::rate_limiter::{RateAction, RateIdentity, RateLimiter};
use crate::error::AppError;

const TOKEN_LENGTH: usize = 48;

pub struct PasswordResetService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn PasswordResetRepository>,
    notifier: Arc<dyn Notifier>,
    rate_limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    frontend_url: String,
}

impl PasswordResetService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn PasswordResetRepository>,
        notifier: Arc<dyn Notifier>,
        rate_limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        frontend_url: String,
    ) -> Self {
        Self { users, tokens, notifier, rate_limiter, clock, ttl, frontend_url }
    }

    /// Entry point for "forgot password". The result is identical whether or
    /// not the address belongs to an account.
    pub async fn request_reset(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        self.rate_limiter.enforce(RateAction::PasswordResetRequest, &RateIdentity::Email(email.clone()))?;

        let Some(user) = self.users.find_by_email(&email).await? else {
            info!("Password reset requested for unknown address");
            return Ok(());
        };

        let issued = self.issue(&user.id).await?;
        let link = format!("{}/reset-password?token={}", self.frontend_url.trim_end_matches('/'), issued.token);
        let notification = Notification {
            recipient: user.email.clone(),
            purpose: NotificationPurpose::PasswordReset,
            context: json!({
                "user_id": user.id,
                "user_name": user.display_name(),
                "token": issued.token,
                "reset_link": link,
                "expires_at": issued.record.expires_at,
            }),
            created_at: self.clock.now(),
        };
        if let Err(e) = self.notifier.dispatch(notification).await {
            warn!(user_id = %user.id, "Failed to hand off reset notification: {}", e);
        }
        Ok(())
    }

    pub async fn issue(&self, user_id: &str) -> Result<IssuedToken, AppError> {
        let now = self.clock.now();
        let token: String = rand::thread_rng().sample_iter(&Alphanumeric).take(TOKEN_LENGTH).map(char::from).collect();

        let record = PasswordResetToken {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            token_hash: hash_token(&token),
            expires_at: now + self.ttl,
            used: false,
            created_at: now,
        };

        let invalidated = self.tokens.issue(&record).await?;
        info!(user_id = %user_id, invalidated, "password_reset_issued");
        Ok(IssuedToken { token, record })
    }

    pub async fn consume(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        validate_password(new_password)?;
        let password_hash = hash_password(new_password)?;

        let user_id = self.tokens.consume(&hash_token(token), &password_hash, self.clock.now()).await?;
        info!(user_id = %user_id, "password_reset_completed");
        Ok(())
    }

    /// Deletes used and expired tokens older than `retention`.
    pub async fn purge(&self, retention: Duration) -> Result<u64, AppError> {
        let cutoff = self.clock.now() - retention;
        self.tokens.purge(cutoff).await
    }
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
