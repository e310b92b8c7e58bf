//! `reqwest` implementation of [`ListingApi`] against the dashboard backend.

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::api::{ContactAck, ContactPatch, InterestAck, InterestPatch, ListingApi};
use crate::config::TrackerConfig;
use crate::error::{ApiError, ValidationError};
use crate::model::{parse_results, DetailId, InterestState, ListingGroup};

pub const CSRF_HEADER: &str = "X-CSRFToken";
pub const MAX_RESPONSE_BODY_SIZE: usize = 32 * 1024 * 1024;

const INTEREST_PATH: &str = "api/interest";
const CONTACT_PATH: &str = "api/contact";
const RESULTS_PATH: &str = "api/all_filtered_results/";

#[derive(Debug, Clone)]
pub struct HttpListingApi {
    client: Client,
    base: Url,
    csrf_token: Option<String>,
}

impl HttpListingApi {
    pub fn new(config: &TrackerConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        let client = Client::builder()
            .build()
            .map_err(|e| ValidationError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base: config.api_url()?,
            csrf_token: config.csrf_token.clone(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn interest_url(&self, detail_id: DetailId) -> Result<Url, ApiError> {
        self.endpoint(&format!("{INTEREST_PATH}/{detail_id}/"))
    }

    pub fn contact_url(&self, detail_id: DetailId) -> Result<Url, ApiError> {
        self.endpoint(&format!("{CONTACT_PATH}/{detail_id}/"))
    }

    pub fn results_url(&self, query: &str) -> Result<Url, ApiError> {
        let mut url = self.endpoint(RESULTS_PATH)?;
        let query = query.trim_start_matches('?');
        url.set_query((!query.is_empty()).then_some(query));
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|e| ApiError::Transport(format!("cannot build URL for {path}: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.csrf_token {
            Some(token) => builder.header(CSRF_HEADER, token),
            None => builder,
        }
    }

    async fn read_body(mut response: Response) -> Result<Vec<u8>, ApiError> {
        let status = response.status();
        if let Some(declared) = response.content_length() {
            ensure_within_cap(declared)?;
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?
        {
            ensure_within_cap((body.len() + chunk.len()) as u64)?;
            body.extend_from_slice(&chunk);
        }

        if !status.is_success() {
            return Err(ApiError::from_http_status(status.as_u16(), Some(&body)));
        }

        Ok(body)
    }

    async fn patch<B, T>(&self, url: Url, body: &B) -> Result<T, ApiError>
    where
        B: serde::Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::PATCH, url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let body = Self::read_body(response).await?;
        serde_json::from_slice(&body).map_err(|e| ApiError::MalformedResponse(e.to_string()))
    }
}

/// Fails once a body has grown, or declares it will grow, past the cap.
fn ensure_within_cap(len: u64) -> Result<(), ApiError> {
    if len > MAX_RESPONSE_BODY_SIZE as u64 {
        return Err(ApiError::MalformedResponse(format!(
            "response body of {len} bytes exceeds {MAX_RESPONSE_BODY_SIZE}"
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl ListingApi for HttpListingApi {
    #[instrument(skip(self))]
    async fn set_interest(
        &self,
        detail_id: DetailId,
        interest: InterestState,
    ) -> Result<InterestState, ApiError> {
        let url = self.interest_url(detail_id)?;
        debug!(%url, %interest, "patching interest");
        let ack: InterestAck = self.patch(url, &InterestPatch { interest }).await?;
        ack.confirm(detail_id)
    }

    #[instrument(skip(self))]
    async fn set_contact(&self, detail_id: DetailId, contact: bool) -> Result<bool, ApiError> {
        let url = self.contact_url(detail_id)?;
        debug!(%url, contact, "patching contact");
        let ack: ContactAck = self.patch(url, &ContactPatch { contact }).await?;
        ack.confirm(detail_id)
    }

    #[instrument(skip(self))]
    async fn fetch_results(&self, query: &str) -> Result<Vec<ListingGroup>, ApiError> {
        let url = self.results_url(query)?;
        debug!(%url, "fetching results");
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let body = Self::read_body(response).await?;
        parse_results(&body).map_err(|e| ApiError::MalformedResponse(e.to_string()))
    }
}
