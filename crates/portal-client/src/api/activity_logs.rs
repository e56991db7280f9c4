use portal_core::ActivityLog;

use crate::{ApiError, Portal};

impl Portal {
    pub async fn list_activity_logs(&self) -> Result<Vec<ActivityLog>, ApiError> {
        self.get_list("/api/activity-logs/").await
    }
}
