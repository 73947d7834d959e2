//! DTOs for the advertisement listing.

use serde::Serialize;

use crate::domain::entities::Advertisement;

#[derive(Debug, Serialize)]
pub struct AdResponse {
    pub id: String,
    pub image_url: String,
    pub target_url: String,
}

impl From<Advertisement> for AdResponse {
    fn from(ad: Advertisement) -> Self {
        Self {
            id: ad.id,
            image_url: ad.image_url,
            target_url: ad.target_url,
        }
    }
}
