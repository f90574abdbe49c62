use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::domain::ports::Clock;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateAction {
    AccountRegistration,
    Login,
    PasswordResetRequest,
    PasswordResetConfirm,
    ResendConfirmation,
}

impl RateAction {
    pub const ALL: [RateAction; 5] = [
        RateAction::AccountRegistration,
        RateAction::Login,
        RateAction::PasswordResetRequest,
        RateAction::PasswordResetConfirm,
        RateAction::ResendConfirmation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RateAction::AccountRegistration => "register",
            RateAction::Login => "login",
            RateAction::PasswordResetRequest => "password_reset_request",
            RateAction::PasswordResetConfirm => "password_reset_confirm",
            RateAction::ResendConfirmation => "resend_registration_email",
        }
    }
}

/// Who is being throttled. A claimed email beats the network address so that
/// attempts against one account are counted together wherever they come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateIdentity {
    Email(String),
    Peer(String),
}

impl RateIdentity {
    pub fn resolve(email_hint: Option<&str>, peer: &str) -> Self {
        match email_hint.map(|e| e.trim().to_lowercase()) {
            Some(email) if !email.is_empty() => RateIdentity::Email(email),
            _ => RateIdentity::Peer(peer.to_string()),
        }
    }

    fn key(&self) -> String {
        match self {
            RateIdentity::Email(e) => format!("email:{}", e),
            RateIdentity::Peer(p) => format!("peer:{}", p),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub limit: usize,
    pub window: Duration,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self { limit: 20, window: Duration::seconds(60) }
    }
}

impl RatePolicy {
    /// Parses `"<limit>/<window_secs>"`, e.g. `"5/300"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (limit, window) = raw.trim().split_once('/')?;
        let limit: usize = limit.trim().parse().ok()?;
        let window: i64 = window.trim().parse().ok()?;
        if limit == 0 || window <= 0 {
            return None;
        }
        Some(Self { limit, window: Duration::try_seconds(window)? })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RateLimitConfig {
    overrides: HashMap<RateAction, RatePolicy>,
}

impl RateLimitConfig {
    pub fn with_policy(mut self, action: RateAction, policy: RatePolicy) -> Self {
        self.overrides.insert(action, policy);
        self
    }

    pub fn policy(&self, action: RateAction) -> RatePolicy {
        self.overrides.get(&action).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    Reject { retry_after: Duration },
}

type WindowKey = (RateAction, String);

/// Hits for one key, together with the window they were last checked against.
struct Window {
    span: Duration,
    hits: VecDeque<DateTime<Utc>>,
}

/// In-process sliding-window limiter. One instance per process, shared through `AppState`.
pub struct RateLimiter {
    windows: Mutex<HashMap<WindowKey, Window>>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self { windows: Mutex::new(HashMap::new()), config, clock }
    }

    pub fn check(&self, action: RateAction, identity: &RateIdentity, limit: usize, window: Duration, now: DateTime<Utc>) -> RateDecision {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = windows
            .entry((action, identity.key()))
            .or_insert_with(|| Window { span: window, hits: VecDeque::new() });
        entry.span = window;
        let entries = &mut entry.hits;

        while let Some(oldest) = entries.front() {
            if now - *oldest >= window {
                entries.pop_front();
            } else {
                break;
            }
        }

        if entries.len() >= limit {
            let retry_after = entries
                .front()
                .map(|oldest| *oldest + window - now)
                .unwrap_or(window);
            return RateDecision::Reject { retry_after };
        }

        entries.push_back(now);
        RateDecision::Allow
    }

    /// Applies the configured policy for `action` at the current instant.
    pub fn enforce(&self, action: RateAction, identity: &RateIdentity) -> Result<(), AppError> {
        let policy = self.config.policy(action);
        match self.check(action, identity, policy.limit, policy.window, self.clock.now()) {
            RateDecision::Allow => Ok(()),
            RateDecision::Reject { retry_after } => {
                warn!(action = action.as_str(), identity = %identity.key(), "rate_limited");
                // Round up so a client waiting the advertised time is admitted.
                let secs = (retry_after.num_milliseconds().max(0) as u64).div_ceil(1000);
                Err(AppError::RateLimited { action: action.as_str(), retry_after_secs: secs.max(1) })
            }
        }
    }

    /// Drops keys whose every entry has aged out of its action's window.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let before = windows.len();
        windows.retain(|_, entry| entry.hits.back().is_some_and(|newest| now - *newest < entry.span));
        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, "Swept idle rate-limit windows");
        }
        removed
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
