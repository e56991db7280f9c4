use portal_core::{Id, ServiceRequest, Specialist};
use serde_json::Value as JsonValue;

use crate::{ApiError, Portal};

impl Portal {
    pub async fn list_service_requests(&self) -> Result<Vec<ServiceRequest>, ApiError> {
        self.get_list("/api/service-requests/").await
    }

    pub async fn get_service_request(&self, id: Id) -> Result<ServiceRequest, ApiError> {
        self.get(&format!("/api/service-requests/{id}/")).await
    }

    /// Asks the backend to pull fresh requests from the service-management
    /// system. The response body is passed through untouched.
    pub async fn sync_service_requests(&self) -> Result<JsonValue, ApiError> {
        self.post(
            "/api/integrations/group3/sync-service-requests/",
            &serde_json::json!({}),
        )
        .await
    }

    pub async fn suggested_specialists(&self, request_id: Id) -> Result<Vec<Specialist>, ApiError> {
        self.get_list(&format!(
            "/api/service-requests/{request_id}/suggested-specialists/"
        ))
        .await
    }
}
