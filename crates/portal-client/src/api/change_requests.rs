use portal_core::{ChangeDecision, DecisionUpdate, Id, NewChangeRequest, ServiceOrderChangeRequest};

use crate::{ApiError, Portal};

impl Portal {
    pub async fn list_change_requests(&self) -> Result<Vec<ServiceOrderChangeRequest>, ApiError> {
        self.get_list("/api/service-order-change-requests/").await
    }

    pub async fn create_change_request(
        &self,
        request: &NewChangeRequest,
    ) -> Result<ServiceOrderChangeRequest, ApiError> {
        self.post("/api/service-order-change-requests/", request)
            .await
    }

    pub async fn decide_change_request(
        &self,
        id: Id,
        decision: ChangeDecision,
    ) -> Result<ServiceOrderChangeRequest, ApiError> {
        self.patch(
            &format!("/api/service-order-change-requests/{id}/decision/"),
            &DecisionUpdate { decision },
        )
        .await
    }
}
