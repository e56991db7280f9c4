use portal_core::Specialist;

use crate::{ApiError, Portal};

impl Portal {
    pub async fn list_specialists(&self) -> Result<Vec<Specialist>, ApiError> {
        self.get_list("/api/specialists/").await
    }
}
