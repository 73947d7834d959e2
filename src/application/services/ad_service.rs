//! Advertisement catalogue reads.

use std::sync::Arc;

use crate::domain::entities::Advertisement;
use crate::domain::repositories::AdRepository;
use crate::error::AppError;
use crate::resilience::{BreakerRegistry, Dependency};

pub struct AdService {
    ads: Arc<dyn AdRepository>,
    breakers: Arc<BreakerRegistry>,
}

impl AdService {
    pub fn new(ads: Arc<dyn AdRepository>, breakers: Arc<BreakerRegistry>) -> Self {
        Self { ads, breakers }
    }

    /// Lists every advertisement, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dependency`] if the durable store is unavailable.
    pub async fn list_advertisements(&self) -> Result<Vec<Advertisement>, AppError> {
        let ads = self
            .breakers
            .get(Dependency::Database)
            .call_with(|| self.ads.fetch_all(), AppError::is_caller_fault)
            .await?;
        Ok(ads)
    }
}
