use std::sync::Arc;
use crate::config::Config;
use crate::domain::ports::{
    Clock, EventRepository, Notifier, PasswordResetRepository, RegistrationRepository, UserRepository,
};
use crate::domain::services::{
    ledger::RegistrationLedger,
    password_reset::PasswordResetService,
    rate_limiter::RateLimiter,
    recommendations::RecommendationSelector,
};

/// Store adapters for one backend.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub events: Arc<dyn EventRepository>,
    pub registrations: Arc<dyn RegistrationRepository>,
    pub password_resets: Arc<dyn PasswordResetRepository>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub user_repo: Arc<dyn UserRepository>,
    pub event_repo: Arc<dyn EventRepository>,
    pub registration_repo: Arc<dyn RegistrationRepository>,
    pub password_reset_repo: Arc<dyn PasswordResetRepository>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
    pub rate_limiter: Arc<RateLimiter>,
    pub ledger: Arc<RegistrationLedger>,
    pub recommender: Arc<RecommendationSelector>,
    pub password_resets: Arc<PasswordResetService>,
}

impl AppState {
    pub fn new(config: Config, repos: Repositories, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limits.clone(), clock.clone()));

        let ledger = Arc::new(RegistrationLedger::new(
            repos.events.clone(),
            repos.registrations.clone(),
            repos.users.clone(),
            notifier.clone(),
            rate_limiter.clone(),
            clock.clone(),
        ));
        let recommender = Arc::new(RecommendationSelector::new(repos.events.clone(), clock.clone()));
        let password_resets = Arc::new(PasswordResetService::new(
            repos.users.clone(),
            repos.password_resets.clone(),
            notifier.clone(),
            rate_limiter.clone(),
            clock.clone(),
            config.reset_token_ttl,
            config.frontend_url.clone(),
        ));

        Self {
            config,
            user_repo: repos.users,
            event_repo: repos.events,
            registration_repo: repos.registrations,
            password_reset_repo: repos.password_resets,
            clock,
            notifier,
            rate_limiter,
            ledger,
            recommender,
            password_resets,
        }
    }
}
