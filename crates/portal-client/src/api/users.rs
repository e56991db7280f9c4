use portal_core::{Id, Role, RoleUpdate, User, UserUpdate};
use serde_json::Value as JsonValue;

use crate::{ApiError, Portal};

impl Portal {
    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.get_list("/api/users/").await
    }

    pub async fn get_user(&self, id: Id) -> Result<User, ApiError> {
        self.get(&format!("/api/users/{id}/")).await
    }

    pub async fn update_user(&self, id: Id, update: &UserUpdate) -> Result<User, ApiError> {
        self.patch(&format!("/api/users/{id}/"), update).await
    }

    /// `PATCH /api/users/{id}/role/`, then a fresh `GET`. The PATCH body is
    /// not trusted to reflect the stored user.
    pub async fn update_user_role(&self, id: Id, role: Role) -> Result<User, ApiError> {
        let _: JsonValue = self
            .patch(&format!("/api/users/{id}/role/"), &RoleUpdate { role })
            .await?;
        self.get_user(id).await
    }
}
