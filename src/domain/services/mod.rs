pub mod credentials;
pub mod ledger;
pub mod password_reset;
pub mod rate_limiter;
pub mod recommendations;
pub mod schedule;
