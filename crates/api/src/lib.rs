//! Wire contract with the remote portal API.
//!
//! Every portal operation is one method on [`PortalApi`]; the live
//! implementation is a thin HTTP wrapper and the mock is scripted for tests
//! and offline use. All request/response shapes live here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mari_core::{Amount, Msisdn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod error;
pub mod live;
pub mod mock;

pub use error::ApiError;

/// Funding channel for deposits. Doubles as the URL path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    /// Push payment to the customer's mobile wallet (USSD prompt on their
    /// handset); the request carries the wallet number.
    MobileWallet,
    /// Redemption code paid at a third-party counter; amount only.
    Voucher,
}

impl Channel {
    pub fn as_path_segment(self) -> &'static str {
        match self {
            Channel::MobileWallet => "mobile-wallet",
            Channel::Voucher => "voucher",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path_segment())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile-wallet" => Ok(Channel::MobileWallet),
            "voucher" => Ok(Channel::Voucher),
            other => Err(format!("unknown deposit channel: {other}")),
        }
    }
}

/// Server-side state of a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
    Expired,
}

impl DepositStatus {
    /// Terminal statuses never change again; polling stops on the first one.
    pub fn is_terminal(self) -> bool {
        !matches!(self, DepositStatus::Pending)
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DepositStatus::Pending => "pending",
            DepositStatus::Success => "success",
            DepositStatus::Failed => "failed",
            DepositStatus::Cancelled => "cancelled",
            DepositStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    pub amount: Amount,
    /// Wallet number for the push channel; absent for vouchers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_msisdn: Option<Msisdn>,
}

/// The client's read-only copy of a deposit. Refreshed only by replacing the
/// whole record with the latest response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRecord {
    pub id: String,
    pub status: DepositStatus,
    pub amount: Amount,
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub msisdn: Msisdn,
    pub pin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub customer_id: String,
    #[serde(default)]
    pub verification_pending: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub msisdn: Msisdn,
    pub pin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub full_name: String,
    pub msisdn: Msisdn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub customer: Customer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletBalance {
    pub currency: String,
    pub available: Amount,
    #[serde(default)]
    pub reserved: Amount,
}

#[derive(Debug, Clone, Serialize)]
pub struct AirtimeRequest {
    pub msisdn: Msisdn,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleOffer {
    pub code: String,
    pub name: String,
    pub amount: Amount,
    pub validity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleRequest {
    pub msisdn: Msisdn,
    pub bundle_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElectricityRequest {
    pub meter_number: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectricityToken {
    pub token: String,
    pub units_kwh: String,
    pub meter_number: String,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    pub recipient: Msisdn,
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub kind: String,
    pub amount: Amount,
    pub currency: String,
    pub reference: String,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTokenInfo {
    pub id: String,
    pub name: String,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewApiToken {
    #[serde(flatten)]
    pub info: ApiTokenInfo,
    /// Shown to the user exactly once; only the fingerprint is kept.
    pub secret: String,
}

#[async_trait]
pub trait PortalApi: Send + Sync {
    async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse, ApiError>;
    async fn login(&self, req: &LoginRequest) -> Result<Session, ApiError>;
    async fn logout(&self) -> Result<(), ApiError>;

    async fn balance(&self) -> Result<Vec<WalletBalance>, ApiError>;

    async fn buy_airtime(&self, req: &AirtimeRequest) -> Result<TransactionRecord, ApiError>;
    async fn list_bundles(&self) -> Result<Vec<BundleOffer>, ApiError>;
    async fn buy_bundle(&self, req: &BundleRequest) -> Result<TransactionRecord, ApiError>;
    async fn buy_electricity(&self, req: &ElectricityRequest)
        -> Result<ElectricityToken, ApiError>;

    async fn transfer(&self, req: &TransferRequest) -> Result<TransactionRecord, ApiError>;

    async fn initiate_deposit(
        &self,
        channel: Channel,
        req: &DepositRequest,
    ) -> Result<DepositRecord, ApiError>;
    async fn deposit_status(&self, channel: Channel, id: &str) -> Result<DepositRecord, ApiError>;

    async fn transactions(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Page<TransactionRecord>, ApiError>;

    async fn api_tokens(&self) -> Result<Vec<ApiTokenInfo>, ApiError>;
    async fn create_api_token(&self, name: &str) -> Result<NewApiToken, ApiError>;
    async fn revoke_api_token(&self, id: &str) -> Result<(), ApiError>;
}
