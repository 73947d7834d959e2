//! Advertisement entity.

use serde::Serialize;

/// An advertisement that clicks can be recorded against.
///
/// Read-only for this service; rows are created by the `admin seed` command or
/// by external tooling.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Advertisement {
    pub id: String,
    pub image_url: String,
    pub target_url: String,
}

impl Advertisement {
    pub fn new(
        id: impl Into<String>,
        image_url: impl Into<String>,
        target_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            image_url: image_url.into(),
            target_url: target_url.into(),
        }
    }
}
