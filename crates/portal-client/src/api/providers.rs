use portal_core::{Provider, ProviderUpdate};

use crate::{ApiError, Portal};

impl Portal {
    /// `GET /api/providers/me/`
    pub async fn my_provider(&self) -> Result<Provider, ApiError> {
        self.get("/api/providers/me/").await
    }

    /// `PATCH /api/providers/me/`
    pub async fn update_my_provider(&self, update: &ProviderUpdate) -> Result<Provider, ApiError> {
        self.patch("/api/providers/me/", update).await
    }
}
