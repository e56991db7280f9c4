use portal_core::{Id, ServiceOrder, ServiceOrderChangeRequest, SubstitutionRequest};

use crate::{ApiError, Portal};

impl Portal {
    pub async fn list_service_orders(&self) -> Result<Vec<ServiceOrder>, ApiError> {
        self.get_list("/api/service-orders/").await
    }

    pub async fn get_service_order(&self, id: Id) -> Result<ServiceOrder, ApiError> {
        self.get(&format!("/api/service-orders/{id}/")).await
    }

    pub async fn request_substitution(
        &self,
        order_id: Id,
        request: &SubstitutionRequest,
    ) -> Result<ServiceOrderChangeRequest, ApiError> {
        self.post(&format!("/api/service-orders/{order_id}/substitution/"), request)
            .await
    }
}
