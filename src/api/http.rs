//! reqwest-backed implementation of [`Backend`].

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use super::backend::Backend;
use super::types::{ClientProfile, Envelope, NdaStatus, Proposal};
use crate::error::ApiError;
use crate::onboarding::OnboardingStatus;
use crate::scoping::{ScopingAnswers, ScopingForm};
use crate::session::SessionContext;

/// Talks to the REST backend over HTTP. No timeouts or retries are applied.
pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }

    /// Append percent-encoded path segments to the base URL.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        session: &SessionContext,
        method: Method,
        segments: &[&str],
        body: Option<serde_json::Value>,
        endpoint: &str,
    ) -> Result<Envelope<T>, ApiError> {
        let url = self.url(segments);
        debug!(%method, %url, "Backend request");

        let mut request = self
            .client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, session.bearer());
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| ApiError::Network {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|e| ApiError::Network {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope<serde_json::Value>>(&text)
                .ok()
                .and_then(|env| env.message)
                .unwrap_or_default();
            warn!(endpoint, %status, message = %message, "Backend returned an error status");
            return Err(ApiError::Http {
                endpoint: endpoint.to_string(),
                status,
                message,
            });
        }

        let envelope: Envelope<T> =
            serde_json::from_str(&text).map_err(|e| ApiError::MalformedResponse {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        if !envelope.success {
            let message = envelope.message.clone().unwrap_or_default();
            warn!(endpoint, message = %message, "Backend rejected request");
            return Err(ApiError::Rejected {
                endpoint: endpoint.to_string(),
                message,
            });
        }
        Ok(envelope)
    }

    /// Like [`call`](Self::call) but the payload must be present.
    async fn fetch<T: DeserializeOwned>(
        &self,
        session: &SessionContext,
        method: Method,
        segments: &[&str],
        body: Option<serde_json::Value>,
        endpoint: &str,
    ) -> Result<T, ApiError> {
        self.call::<T>(session, method, segments, body, endpoint)
            .await?
            .data
            .ok_or_else(|| ApiError::MalformedResponse {
                endpoint: endpoint.to_string(),
                reason: "response has no data".to_string(),
            })
    }

    /// Like [`call`](Self::call) but any payload is ignored.
    async fn execute(
        &self,
        session: &SessionContext,
        method: Method,
        segments: &[&str],
        body: Option<serde_json::Value>,
        endpoint: &str,
    ) -> Result<(), ApiError> {
        self.call::<serde_json::Value>(session, method, segments, body, endpoint)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_profile(&self, session: &SessionContext) -> Result<ClientProfile, ApiError> {
        self.fetch(
            session,
            Method::GET,
            &["clients", "user", session.user_id.as_str()],
            None,
            "GET /clients/user/{userId}",
        )
        .await
    }

    async fn update_status(
        &self,
        session: &SessionContext,
        client_id: &str,
        status: OnboardingStatus,
    ) -> Result<(), ApiError> {
        self.execute(
            session,
            Method::POST,
            &["clients", client_id, "status"],
            Some(json!({ "status": status })),
            "POST /clients/{id}/status",
        )
        .await
    }

    async fn sign_nda(
        &self,
        session: &SessionContext,
        client_id: &str,
        signature_data: &str,
    ) -> Result<(), ApiError> {
        self.execute(
            session,
            Method::POST,
            &["clients", client_id, "sign-nda"],
            Some(json!({ "signatureData": signature_data })),
            "POST /clients/{id}/sign-nda",
        )
        .await
    }

    async fn nda_status(
        &self,
        session: &SessionContext,
        client_id: &str,
    ) -> Result<NdaStatus, ApiError> {
        self.fetch(
            session,
            Method::POST,
            &["clients", client_id, "nda-status"],
            None,
            "POST /clients/{id}/nda-status",
        )
        .await
    }

    async fn scoping_answers(
        &self,
        session: &SessionContext,
        client_id: &str,
        service_type: &str,
    ) -> Result<ScopingAnswers, ApiError> {
        self.fetch(
            session,
            Method::GET,
            &["scoping-forms", "client", client_id, "service", service_type],
            None,
            "GET /scoping-forms/client/{id}/service/{serviceType}",
        )
        .await
    }

    async fn proposal(
        &self,
        session: &SessionContext,
        service_type: &str,
    ) -> Result<Proposal, ApiError> {
        self.fetch(
            session,
            Method::GET,
            &["proposals", "getProposal", service_type],
            None,
            "GET /proposals/getProposal/{serviceType}",
        )
        .await
    }

    async fn list_scoping_forms(
        &self,
        session: &SessionContext,
    ) -> Result<Vec<ScopingForm>, ApiError> {
        self.fetch(
            session,
            Method::GET,
            &["scoping-forms"],
            None,
            "GET /scoping-forms",
        )
        .await
    }

    async fn scoping_form(
        &self,
        session: &SessionContext,
        form_id: &str,
    ) -> Result<ScopingForm, ApiError> {
        self.fetch(
            session,
            Method::GET,
            &["scoping-forms", form_id],
            None,
            "GET /scoping-forms/{id}",
        )
        .await
    }

    async fn scoping_form_for_service(
        &self,
        session: &SessionContext,
        service_type: &str,
    ) -> Result<ScopingForm, ApiError> {
        self.fetch(
            session,
            Method::GET,
            &["scoping-forms", "service", service_type],
            None,
            "GET /scoping-forms/service/{serviceType}",
        )
        .await
    }

    async fn save_scoping_form(
        &self,
        session: &SessionContext,
        form: &ScopingForm,
    ) -> Result<ScopingForm, ApiError> {
        let body = serde_json::to_value(form).map_err(|e| ApiError::MalformedResponse {
            endpoint: "scoping form".to_string(),
            reason: e.to_string(),
        })?;
        match form.id.as_deref() {
            Some(id) => {
                self.fetch(
                    session,
                    Method::PUT,
                    &["scoping-forms", id],
                    Some(body),
                    "PUT /scoping-forms/{id}",
                )
                .await
            }
            None => {
                self.fetch(
                    session,
                    Method::POST,
                    &["scoping-forms"],
                    Some(body),
                    "POST /scoping-forms",
                )
                .await
            }
        }
    }

    async fn delete_scoping_form(
        &self,
        session: &SessionContext,
        form_id: &str,
    ) -> Result<(), ApiError> {
        self.execute(
            session,
            Method::DELETE,
            &["scoping-forms", form_id],
            None,
            "DELETE /scoping-forms/{id}",
        )
        .await
    }
}
