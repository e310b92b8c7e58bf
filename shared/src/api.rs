use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::model::{DetailId, InterestState, ListingGroup};

/// Remote store the tracker persists to. Implementations report the value the
/// server confirmed; anything that is not a confirmation is an error.
#[async_trait::async_trait]
pub trait ListingApi: Send + Sync {
    async fn set_interest(
        &self,
        detail_id: DetailId,
        interest: InterestState,
    ) -> Result<InterestState, ApiError>;

    async fn set_contact(&self, detail_id: DetailId, contact: bool) -> Result<bool, ApiError>;

    /// `query` is an already encoded query string, passed through as is.
    async fn fetch_results(&self, query: &str) -> Result<Vec<ListingGroup>, ApiError>;
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct InterestPatch {
    pub interest: InterestState,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ContactPatch {
    pub contact: bool,
}

/// Body echoed by `PATCH /api/interest/<id>/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestAck {
    pub detail_id: DetailId,
    pub interest: InterestState,
}

impl InterestAck {
    /// Checks the echo is about the listing that was patched.
    pub fn confirm(self, requested: DetailId) -> Result<InterestState, ApiError> {
        if self.detail_id != requested {
            return Err(ApiError::MalformedResponse(format!(
                "echo for detail {} while patching {requested}",
                self.detail_id
            )));
        }
        Ok(self.interest)
    }
}

/// Body echoed by `PATCH /api/contact/<id>/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactAck {
    pub detail_id: DetailId,
    pub contact: bool,
}

impl ContactAck {
    pub fn confirm(self, requested: DetailId) -> Result<bool, ApiError> {
        if self.detail_id != requested {
            return Err(ApiError::MalformedResponse(format!(
                "echo for detail {} while patching {requested}",
                self.detail_id
            )));
        }
        Ok(self.contact)
    }
}
