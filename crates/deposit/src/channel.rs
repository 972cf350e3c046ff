//! Per-channel request rules and timing.
//!
//! Both funding channels share the initiate/poll contract; they differ in
//! what the request carries and how long the portal keeps checking before
//! giving up.

use api_client::{Channel, DepositRequest};
use mari_core::money::MIN_DEPOSIT;
use mari_core::{Amount, FieldErrors, Msisdn};
use std::time::Duration;

/// Gap between status queries.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How long a poll loop may run before it stops checking. The push channel
/// waits on the customer approving a prompt on their handset; vouchers
/// settle out-of-band, so the portal only watches briefly.
pub fn poll_ceiling(channel: Channel) -> Duration {
    match channel {
        Channel::MobileWallet => Duration::from_secs(60),
        Channel::Voucher => Duration::from_secs(15),
    }
}

/// Validate raw user input and build the wire request. All problems are
/// collected per field; nothing touches the network here.
pub fn build_request(
    channel: Channel,
    amount: &str,
    wallet: Option<&str>,
) -> Result<DepositRequest, FieldErrors> {
    let mut errors = FieldErrors::new();

    let amount = match Amount::parse(amount) {
        Ok(a) if a < MIN_DEPOSIT => {
            errors.push("amount", format!("must be at least {MIN_DEPOSIT}"));
            None
        }
        Ok(a) => Some(a),
        Err(e) => {
            errors.push("amount", e.to_string());
            None
        }
    };

    let wallet_msisdn = match channel {
        Channel::MobileWallet => match wallet {
            Some(raw) => match Msisdn::normalize(raw) {
                Ok(m) => Some(m),
                Err(e) => {
                    errors.push("wallet_msisdn", e.to_string());
                    None
                }
            },
            None => {
                errors.push("wallet_msisdn", "is required for mobile-wallet deposits");
                None
            }
        },
        // Voucher requests carry only an amount.
        Channel::Voucher => None,
    };

    match amount {
        Some(amount) if errors.is_empty() => Ok(DepositRequest {
            amount,
            wallet_msisdn,
        }),
        _ => Err(errors),
    }
}
