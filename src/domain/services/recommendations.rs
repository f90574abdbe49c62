use std::sync::Arc;
use tracing::debug;

use crate::domain::models::event::EventSummary;
use crate::domain::ports::{Clock, EventRepository};
use crate::domain::services::ledger::has_free_seat;
use crate::error::AppError;

pub const RECOMMENDATION_LIMIT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    TagMatch,
    Popularity,
}

#[derive(Debug, Clone)]
pub struct Recommendations {
    pub tier: Tier,
    pub events: Vec<EventSummary>,
}

pub struct RecommendationSelector {
    events: Arc<dyn EventRepository>,
    clock: Arc<dyn Clock>,
}

impl RecommendationSelector {
    pub fn new(events: Arc<dyn EventRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { events, clock }
    }

    pub async fn recommend(&self, user_id: &str) -> Result<Recommendations, AppError> {
        let now = self.clock.now();
        let interests = self.events.interest_tags(user_id).await?;

        let mut tier = Tier::TagMatch;
        let mut candidates = if interests.is_empty() {
            Vec::new()
        } else {
            self.events.upcoming_matching_tags(user_id, &interests, now, RECOMMENDATION_LIMIT).await?
        };

        if candidates.is_empty() {
            tier = Tier::Popularity;
            candidates = self.events.upcoming_by_popularity(user_id, now, RECOMMENDATION_LIMIT).await?;
        }

        // No backfill: full events are dropped from the already-limited window.
        candidates.retain(|c| has_free_seat(&c.event, c.seats_taken));
        debug!(user_id = %user_id, ?tier, count = candidates.len(), "recommendations_selected");

        Ok(Recommendations { tier, events: candidates })
    }
}
