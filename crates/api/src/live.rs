use super::{
    AirtimeRequest, ApiTokenInfo, BundleOffer, BundleRequest, Channel, DepositRecord,
    DepositRequest, ElectricityRequest, ElectricityToken, LoginRequest, NewApiToken, Page,
    PortalApi, RegisterRequest, RegisterResponse, Session, TransactionRecord, TransferRequest,
    WalletBalance,
};
use crate::error::{ApiError, ErrorBody};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// HTTP client for the hosted portal API.
#[derive(Clone)]
pub struct LiveClient {
    base_url: String,
    http: reqwest::Client,
    token: Arc<RwLock<Option<String>>>,
}

impl LiveClient {
    pub fn new(base_url: String) -> Arc<Self> {
        Self::with_token(base_url, None)
    }

    /// Resume with a previously stored session token.
    pub fn with_token(base_url: String, token: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            token: Arc::new(RwLock::new(token)),
        })
    }

    pub async fn set_token(&self, token: String) {
        *self.token.write().await = Some(token);
    }

    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn bearer(&self) -> Result<String, ApiError> {
        let token = self.token.read().await;
        match token.as_ref() {
            Some(t) => Ok(format!("Bearer {t}")),
            None => Err(ApiError::NotAuthenticated),
        }
    }

    /// Map a non-2xx response onto the error taxonomy: 401 is a dead
    /// session, 422 carries per-field messages, anything else surfaces the
    /// server's message when one can be decoded.
    async fn error_from(resp: reqwest::Response) -> ApiError {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return ApiError::SessionExpired;
        }

        let body = resp.text().await.unwrap_or_default();
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&body) {
            if status == StatusCode::UNPROCESSABLE_ENTITY {
                if let Some(errors) = parsed.errors {
                    return ApiError::Validation(errors);
                }
            }
            if let Some(message) = parsed.message {
                return ApiError::Api(message);
            }
        }
        ApiError::Api(format!("{status} - {body}"))
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn expect_ok(resp: reqwest::Response) -> Result<(), ApiError> {
        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let auth = self.bearer().await?;
        let resp = self
            .http
            .get(self.url(path))
            .header("Authorization", auth)
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// Authenticated POST. Every mutating call carries a fresh
    /// idempotency key; the server dedupes retries on it.
    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let auth = self.bearer().await?;
        let resp = self
            .http
            .post(self.url(path))
            .header("Authorization", auth)
            .header("Idempotency-Key", uuid::Uuid::new_v4().to_string())
            .json(body)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn delete_authed(&self, path: &str) -> Result<(), ApiError> {
        let auth = self.bearer().await?;
        let resp = self
            .http
            .delete(self.url(path))
            .header("Authorization", auth)
            .send()
            .await?;
        Self::expect_ok(resp).await
    }
}

#[async_trait]
impl PortalApi for LiveClient {
    async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse, ApiError> {
        let resp = self
            .http
            .post(self.url("/auth/register"))
            .json(req)
            .send()
            .await?;
        let out: RegisterResponse = Self::decode(resp).await?;
        tracing::info!(customer = %out.customer_id, "registration submitted");
        Ok(out)
    }

    async fn login(&self, req: &LoginRequest) -> Result<Session, ApiError> {
        let resp = self
            .http
            .post(self.url("/auth/login"))
            .json(req)
            .send()
            .await?;
        let session: Session = Self::decode(resp).await?;
        self.set_token(session.token.clone()).await;
        tracing::info!(customer = %session.customer.id, "signed in");
        Ok(session)
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let auth = self.bearer().await?;
        let resp = self
            .http
            .post(self.url("/auth/logout"))
            .header("Authorization", auth)
            .send()
            .await?;
        Self::expect_ok(resp).await?;
        self.clear_token().await;
        Ok(())
    }

    async fn balance(&self) -> Result<Vec<WalletBalance>, ApiError> {
        self.get_json("/wallet").await
    }

    async fn buy_airtime(&self, req: &AirtimeRequest) -> Result<TransactionRecord, ApiError> {
        self.post_json("/purchases/airtime", req).await
    }

    async fn list_bundles(&self) -> Result<Vec<BundleOffer>, ApiError> {
        self.get_json("/purchases/bundles").await
    }

    async fn buy_bundle(&self, req: &BundleRequest) -> Result<TransactionRecord, ApiError> {
        self.post_json("/purchases/bundles", req).await
    }

    async fn buy_electricity(
        &self,
        req: &ElectricityRequest,
    ) -> Result<ElectricityToken, ApiError> {
        self.post_json("/purchases/electricity", req).await
    }

    async fn transfer(&self, req: &TransferRequest) -> Result<TransactionRecord, ApiError> {
        self.post_json("/transfers", req).await
    }

    async fn initiate_deposit(
        &self,
        channel: Channel,
        req: &DepositRequest,
    ) -> Result<DepositRecord, ApiError> {
        let path = format!("/deposits/{}", channel.as_path_segment());
        let record: DepositRecord = self.post_json(&path, req).await?;
        tracing::info!(
            deposit_id = %record.id,
            %channel,
            amount = %record.amount,
            "deposit initiated"
        );
        Ok(record)
    }

    async fn deposit_status(&self, channel: Channel, id: &str) -> Result<DepositRecord, ApiError> {
        let path = format!("/deposits/{}/{}", channel.as_path_segment(), id);
        let record: DepositRecord = self.get_json(&path).await?;
        tracing::debug!(deposit_id = %record.id, status = %record.status, "deposit status");
        Ok(record)
    }

    async fn transactions(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Page<TransactionRecord>, ApiError> {
        let path = format!("/transactions?page={page}&per_page={per_page}");
        self.get_json(&path).await
    }

    async fn api_tokens(&self) -> Result<Vec<ApiTokenInfo>, ApiError> {
        self.get_json("/tokens").await
    }

    async fn create_api_token(&self, name: &str) -> Result<NewApiToken, ApiError> {
        self.post_json("/tokens", &serde_json::json!({ "name": name }))
            .await
    }

    async fn revoke_api_token(&self, id: &str) -> Result<(), ApiError> {
        self.delete_authed(&format!("/tokens/{id}")).await
    }
}
