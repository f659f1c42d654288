//! Mapping of externally authenticated usernames onto local user records.

use std::sync::Arc;

use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

/// Identity of the current request as established by the fronting auth layer.
#[derive(Debug, Clone, Default)]
pub struct ViewerContext {
    pub user: Option<UserRecord>,
}

impl ViewerContext {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.username.as_str())
    }
}

#[derive(Clone)]
pub struct IdentityService {
    users: Arc<dyn UsersRepo>,
}

impl IdentityService {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self { users }
    }

    /// Unknown or blank usernames resolve to an anonymous viewer.
    pub async fn resolve(&self, username: Option<&str>) -> Result<ViewerContext, RepoError> {
        let Some(username) = username.map(str::trim).filter(|name| !name.is_empty()) else {
            return Ok(ViewerContext::anonymous());
        };

        let user = self.users.find_by_username(username).await?;
        Ok(ViewerContext { user })
    }
}
