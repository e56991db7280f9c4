use portal_core::{Id, NewServiceOffer, ServiceOffer, ServiceOfferStatus, StatusUpdate};

use crate::{ApiError, Portal};

impl Portal {
    pub async fn list_service_offers(&self) -> Result<Vec<ServiceOffer>, ApiError> {
        self.get_list("/api/service-offers/").await
    }

    pub async fn get_service_offer(&self, id: Id) -> Result<ServiceOffer, ApiError> {
        self.get(&format!("/api/service-offers/{id}/")).await
    }

    pub async fn create_service_offer(&self, offer: &NewServiceOffer) -> Result<ServiceOffer, ApiError> {
        self.post("/api/service-offers/", offer).await
    }

    pub async fn update_service_offer_status(
        &self,
        id: Id,
        status: ServiceOfferStatus,
    ) -> Result<ServiceOffer, ApiError> {
        self.patch(
            &format!("/api/service-offers/{id}/status/"),
            &StatusUpdate { status },
        )
        .await
    }
}
