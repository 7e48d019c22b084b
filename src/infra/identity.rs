//! Bearer token verification against a Firebase-style `accounts:lookup` endpoint.

use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::accounts::{IdentityError, IdentityVerifier, VerifiedIdentity};
use crate::config::IdentitySettings;

use super::error::InfraError;
use super::image_host::build_client;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

impl From<LookupUser> for VerifiedIdentity {
    fn from(user: LookupUser) -> Self {
        Self {
            user_id: user.local_id,
            email: user.email,
            display_name: user.display_name,
            photo_url: user.photo_url,
        }
    }
}

#[derive(Clone)]
pub struct HttpIdentityVerifier {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpIdentityVerifier {
    pub fn new(settings: &IdentitySettings) -> Result<Self, InfraError> {
        Ok(Self {
            client: build_client(settings.timeout)?,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    fn lookup_url(&self) -> Result<Url, IdentityError> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            IdentityError::Unavailable("identity provider api key is not configured".to_string())
        })?;
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("key", key);
        Ok(url)
    }
}

fn rejected(reason: impl Into<String>) -> IdentityError {
    counter!("kumoscan_identity_rejections_total").increment(1);
    IdentityError::Invalid(reason.into())
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let url = self.lookup_url()?;
        let response = self
            .client
            .post(url)
            .json(&LookupRequest { id_token: token })
            .send()
            .await
            .map_err(|err| IdentityError::Unavailable(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            debug!(
                target = "kumoscan::identity",
                status = status.as_u16(),
                body = %body,
                "identity token rejected"
            );
            return Err(rejected(format!("status {status}")));
        }
        if !status.is_success() {
            warn!(
                target = "kumoscan::identity",
                status = status.as_u16(),
                "identity provider returned an unexpected status"
            );
            return Err(IdentityError::Unavailable(format!("status {status}")));
        }

        let lookup: LookupResponse = response
            .json()
            .await
            .map_err(|err| IdentityError::Unavailable(err.to_string()))?;

        lookup
            .users
            .into_iter()
            .next()
            .map(VerifiedIdentity::from)
            .ok_or_else(|| rejected("token does not belong to any account"))
    }
}
