//! Scripted in-process stand-in for the hosted API.
//!
//! Used by the test suites and by `client = "mock"` in the app config so the
//! portal can be driven without credentials. Deposit polling behavior is
//! programmable: an initial status for initiation plus an ordered script of
//! statuses handed out to successive status queries.

use super::{
    AirtimeRequest, ApiTokenInfo, BundleOffer, BundleRequest, Channel, Customer, DepositRecord,
    DepositRequest, DepositStatus, ElectricityRequest, ElectricityToken, LoginRequest,
    NewApiToken, Page, PortalApi, RegisterRequest, RegisterResponse, Session, TransactionRecord,
    TransferRequest, WalletBalance,
};
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use mari_core::digest::sha256_hex;
use mari_core::{Amount, FieldErrors};
use rand::{distributions::Alphanumeric, Rng};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockInner {
    initial_status: Option<DepositStatus>,
    poll_script: VecDeque<DepositStatus>,
    fail_initiate: Option<String>,
    fail_polls: u32,
    status_calls: HashMap<String, u32>,
    records: HashMap<String, DepositRecord>,
    last_deposit: Option<(Channel, DepositRequest)>,
    tokens: Vec<ApiTokenInfo>,
    reference_seq: u64,
}

#[derive(Default)]
pub struct MockClient {
    inner: Mutex<MockInner>,
}

fn alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Program the next deposit: the status returned at initiation and the
    /// statuses handed out to successive polls. Once the script runs dry,
    /// further polls keep answering `Pending`.
    pub fn script_deposit(
        &self,
        initial: DepositStatus,
        polls: impl IntoIterator<Item = DepositStatus>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.initial_status = Some(initial);
        inner.poll_script = polls.into_iter().collect();
    }

    /// Make the next `n` status queries fail with a transport-style error.
    pub fn fail_polls(&self, n: u32) {
        self.inner.lock().unwrap().fail_polls = n;
    }

    /// Reject the next initiation with a server-sent failure message.
    pub fn fail_next_initiate(&self, message: &str) {
        self.inner.lock().unwrap().fail_initiate = Some(message.to_string());
    }

    /// How many status queries have been issued for a deposit id.
    pub fn status_calls(&self, id: &str) -> u32 {
        self.inner
            .lock()
            .unwrap()
            .status_calls
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    /// The channel and request of the most recent initiation, as the server
    /// would have seen it.
    pub fn last_deposit(&self) -> Option<(Channel, DepositRequest)> {
        self.inner.lock().unwrap().last_deposit.clone()
    }

    fn next_reference(inner: &mut MockInner) -> String {
        inner.reference_seq += 1;
        format!("MAR-{:06}", inner.reference_seq)
    }

    fn transaction(kind: &str, amount: Amount, description: String) -> TransactionRecord {
        TransactionRecord {
            id: format!("txn_{}", alphanumeric(12)),
            kind: kind.to_string(),
            amount,
            currency: "USD".to_string(),
            reference: format!("MAR-{}", alphanumeric(6).to_uppercase()),
            description,
            status: "completed".to_string(),
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl PortalApi for MockClient {
    async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse, ApiError> {
        if req.full_name.trim().is_empty() {
            return Err(ApiError::Validation(FieldErrors::single(
                "full_name",
                "is required",
            )));
        }
        Ok(RegisterResponse {
            customer_id: format!("cus_{}", alphanumeric(10)),
            verification_pending: true,
        })
    }

    async fn login(&self, req: &LoginRequest) -> Result<Session, ApiError> {
        if req.pin.len() < 4 {
            return Err(ApiError::Validation(FieldErrors::single(
                "pin",
                "must be at least 4 digits",
            )));
        }
        Ok(Session {
            token: alphanumeric(32),
            expires_at: Utc::now() + Duration::hours(8),
            customer: Customer {
                id: "cus_mock".to_string(),
                full_name: "Mock Customer".to_string(),
                msisdn: req.msisdn.clone(),
            },
        })
    }

    async fn logout(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn balance(&self) -> Result<Vec<WalletBalance>, ApiError> {
        Ok(vec![
            WalletBalance {
                currency: "USD".to_string(),
                available: Amount::from_cents(12_550),
                reserved: Amount::from_cents(1_000),
            },
            WalletBalance {
                currency: "ZWG".to_string(),
                available: Amount::from_cents(250_000),
                reserved: Amount::ZERO,
            },
        ])
    }

    async fn buy_airtime(&self, req: &AirtimeRequest) -> Result<TransactionRecord, ApiError> {
        Ok(Self::transaction(
            "airtime",
            req.amount,
            format!("Airtime for {}", req.msisdn),
        ))
    }

    async fn list_bundles(&self) -> Result<Vec<BundleOffer>, ApiError> {
        Ok(vec![
            BundleOffer {
                code: "daily-250mb".to_string(),
                name: "Daily 250MB".to_string(),
                amount: Amount::from_cents(50),
                validity: "24h".to_string(),
            },
            BundleOffer {
                code: "weekly-1gb".to_string(),
                name: "Weekly 1GB".to_string(),
                amount: Amount::from_cents(300),
                validity: "7d".to_string(),
            },
            BundleOffer {
                code: "monthly-5gb".to_string(),
                name: "Monthly 5GB".to_string(),
                amount: Amount::from_cents(1_200),
                validity: "30d".to_string(),
            },
        ])
    }

    async fn buy_bundle(&self, req: &BundleRequest) -> Result<TransactionRecord, ApiError> {
        let offers = self.list_bundles().await?;
        let offer = offers
            .into_iter()
            .find(|o| o.code == req.bundle_code)
            .ok_or_else(|| {
                ApiError::Validation(FieldErrors::single("bundle_code", "unknown bundle"))
            })?;
        Ok(Self::transaction(
            "bundle",
            offer.amount,
            format!("{} for {}", offer.name, req.msisdn),
        ))
    }

    async fn buy_electricity(
        &self,
        req: &ElectricityRequest,
    ) -> Result<ElectricityToken, ApiError> {
        if req.meter_number.trim().is_empty() {
            return Err(ApiError::Validation(FieldErrors::single(
                "meter_number",
                "is required",
            )));
        }
        let mut rng = rand::thread_rng();
        let token: String = (0..20).map(|_| rng.gen_range(0..10).to_string()).collect();
        Ok(ElectricityToken {
            token,
            units_kwh: "52.3".to_string(),
            meter_number: req.meter_number.clone(),
            reference: format!("MAR-{}", alphanumeric(6).to_uppercase()),
        })
    }

    async fn transfer(&self, req: &TransferRequest) -> Result<TransactionRecord, ApiError> {
        Ok(Self::transaction(
            "transfer",
            req.amount,
            format!("Transfer to {}", req.recipient),
        ))
    }

    async fn initiate_deposit(
        &self,
        channel: Channel,
        req: &DepositRequest,
    ) -> Result<DepositRecord, ApiError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(message) = inner.fail_initiate.take() {
            return Err(ApiError::Api(message));
        }

        // Same rules the hosted API enforces.
        let mut errors = FieldErrors::new();
        if req.amount < mari_core::money::MIN_DEPOSIT {
            errors.push("amount", "must be at least 0.10");
        }
        if channel == Channel::MobileWallet && req.wallet_msisdn.is_none() {
            errors.push("wallet_msisdn", "is required");
        }
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        let reference = Self::next_reference(&mut inner);
        let record = DepositRecord {
            id: format!("dep_{}", alphanumeric(12)),
            status: inner.initial_status.take().unwrap_or(DepositStatus::Pending),
            amount: req.amount,
            reference,
            code: match channel {
                Channel::Voucher => {
                    let mut rng = rand::thread_rng();
                    Some((0..9).map(|_| rng.gen_range(0..10).to_string()).collect())
                }
                Channel::MobileWallet => None,
            },
            expires_at: match channel {
                Channel::Voucher => Some(Utc::now() + Duration::minutes(30)),
                Channel::MobileWallet => None,
            },
        };

        inner.last_deposit = Some((channel, req.clone()));
        inner.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn deposit_status(&self, _channel: Channel, id: &str) -> Result<DepositRecord, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        *inner.status_calls.entry(id.to_string()).or_insert(0) += 1;

        if inner.fail_polls > 0 {
            inner.fail_polls -= 1;
            return Err(ApiError::Api("mock: simulated outage".to_string()));
        }

        let next = inner.poll_script.pop_front().unwrap_or(DepositStatus::Pending);
        let record = inner
            .records
            .get_mut(id)
            .ok_or_else(|| ApiError::Api(format!("unknown deposit: {id}")))?;
        record.status = next;
        Ok(record.clone())
    }

    async fn transactions(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Page<TransactionRecord>, ApiError> {
        let items = vec![
            Self::transaction("deposit", Amount::from_cents(2_000), "Wallet deposit".into()),
            Self::transaction(
                "airtime",
                Amount::from_cents(500),
                "Airtime for 263771234567".into(),
            ),
            Self::transaction(
                "transfer",
                Amount::from_cents(1_250),
                "Transfer to 263771000000".into(),
            ),
        ];
        let total = items.len() as u64;
        Ok(Page {
            items,
            page,
            per_page,
            total,
        })
    }

    async fn api_tokens(&self) -> Result<Vec<ApiTokenInfo>, ApiError> {
        Ok(self.inner.lock().unwrap().tokens.clone())
    }

    async fn create_api_token(&self, name: &str) -> Result<NewApiToken, ApiError> {
        if name.trim().is_empty() {
            return Err(ApiError::Validation(FieldErrors::single(
                "name",
                "is required",
            )));
        }
        let secret = format!("mari_{}", alphanumeric(40));
        let info = ApiTokenInfo {
            id: format!("tok_{}", alphanumeric(10)),
            name: name.to_string(),
            fingerprint: sha256_hex(secret.as_bytes()),
            created_at: Utc::now(),
            last_used_at: None,
        };
        self.inner.lock().unwrap().tokens.push(info.clone());
        Ok(NewApiToken { info, secret })
    }

    async fn revoke_api_token(&self, id: &str) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.tokens.len();
        inner.tokens.retain(|t| t.id != id);
        if inner.tokens.len() == before {
            return Err(ApiError::Api(format!("unknown token: {id}")));
        }
        Ok(())
    }
}
