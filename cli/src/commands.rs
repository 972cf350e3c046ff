use crate::export;
use crate::{BuyCommand, Command, DepositCommand, TokenCommand};
use anyhow::{bail, Context, Result};
use api_client::{
    AirtimeRequest, ApiError, BundleRequest, Channel, ElectricityRequest, LoginRequest,
    PortalApi, RegisterRequest, TransactionRecord, TransferRequest,
};
use deposit::audit::{write_audit_event, AuditEvent};
use deposit::{DepositError, DepositFlow, Ledger, PollPhase};
use mari_core::{Amount, Msisdn};
use std::sync::Arc;

pub async fn run(
    client: Arc<dyn PortalApi>,
    cfg: &config::AppConfig,
    command: Command,
) -> Result<()> {
    match dispatch(client, cfg, command).await {
        Err(e) if needs_sign_in(&e) => Err(e).context("sign in with `mari login` and retry"),
        other => other,
    }
}

fn needs_sign_in(e: &anyhow::Error) -> bool {
    if let Some(api) = e.downcast_ref::<ApiError>() {
        return matches!(api, ApiError::SessionExpired | ApiError::NotAuthenticated);
    }
    if let Some(dep) = e.downcast_ref::<DepositError>() {
        return matches!(
            dep,
            DepositError::Api(ApiError::SessionExpired | ApiError::NotAuthenticated)
        );
    }
    false
}

async fn dispatch(
    client: Arc<dyn PortalApi>,
    cfg: &config::AppConfig,
    command: Command,
) -> Result<()> {
    match command {
        Command::Register { full_name, phone } => register(client, full_name, phone).await,
        Command::Login { phone } => login(client, phone).await,
        Command::Logout => logout(client).await,
        Command::Balance => balance(client).await,
        Command::Buy(buy) => match buy {
            BuyCommand::Airtime { phone, amount } => buy_airtime(client, phone, amount).await,
            BuyCommand::Bundles => list_bundles(client).await,
            BuyCommand::Bundle { phone, code } => buy_bundle(client, phone, code).await,
            BuyCommand::Electricity { meter, amount } => {
                buy_electricity(client, meter, amount).await
            }
        },
        Command::Transfer { to, amount, note } => transfer(client, to, amount, note).await,
        Command::Deposit(dep) => match dep {
            DepositCommand::MobileWallet { amount, wallet } => {
                let wallet = wallet.or_else(|| cfg.deposit.default_wallet.clone());
                run_deposit(client, cfg, Channel::MobileWallet, amount, wallet).await
            }
            DepositCommand::Voucher { amount } => {
                run_deposit(client, cfg, Channel::Voucher, amount, None).await
            }
            DepositCommand::List => deposit_list(cfg),
        },
        Command::History {
            page,
            per_page,
            export,
        } => history(client, page, per_page, export).await,
        Command::Tokens(tok) => match tok {
            TokenCommand::List => token_list(client).await,
            TokenCommand::Create { name } => token_create(client, name).await,
            TokenCommand::Revoke { id } => token_revoke(client, id).await,
        },
    }
}

fn prompt_pin(prompt: &str) -> Result<String> {
    let pin = rpassword::prompt_password(prompt).context("failed to read PIN")?;
    if pin.trim().len() < 4 {
        bail!("PIN must be at least 4 digits");
    }
    Ok(pin.trim().to_string())
}

async fn register(client: Arc<dyn PortalApi>, full_name: String, phone: String) -> Result<()> {
    let msisdn = Msisdn::normalize(&phone)?;
    let pin = prompt_pin("Choose a PIN: ")?;
    let confirm = prompt_pin("Confirm PIN: ")?;
    if pin != confirm {
        bail!("PINs do not match");
    }

    let out = client
        .register(&RegisterRequest {
            full_name,
            msisdn,
            pin,
        })
        .await?;

    println!("Account created: {}", out.customer_id);
    if out.verification_pending {
        println!("Verification is pending; you will be notified by SMS.");
    }
    Ok(())
}

async fn login(client: Arc<dyn PortalApi>, phone: String) -> Result<()> {
    let msisdn = Msisdn::normalize(&phone)?;
    let pin = prompt_pin("PIN: ")?;

    let session = client.login(&LoginRequest { msisdn, pin }).await?;

    if let Err(e) = config::store_secret(config::SESSION_TOKEN_KEY, &session.token) {
        tracing::warn!(error = %e, "could not store session token in keychain");
    }

    println!(
        "Signed in as {} ({}); session valid until {}",
        session.customer.full_name,
        session.customer.msisdn,
        session.expires_at.to_rfc3339()
    );
    Ok(())
}

async fn logout(client: Arc<dyn PortalApi>) -> Result<()> {
    match client.logout().await {
        Ok(()) | Err(ApiError::NotAuthenticated) | Err(ApiError::SessionExpired) => {}
        Err(e) => return Err(e.into()),
    }
    let _ = config::delete_secret(config::SESSION_TOKEN_KEY);
    println!("Signed out.");
    Ok(())
}

async fn balance(client: Arc<dyn PortalApi>) -> Result<()> {
    let balances = client.balance().await?;
    for b in balances {
        if b.reserved.is_zero() {
            println!("{}  {}", b.currency, b.available);
        } else {
            println!("{}  {}  (reserved {})", b.currency, b.available, b.reserved);
        }
    }
    Ok(())
}

fn parse_positive_amount(input: &str) -> Result<Amount> {
    let amount = Amount::parse(input)?;
    if amount.is_zero() {
        bail!("amount must be greater than zero");
    }
    Ok(amount)
}

fn print_transaction(t: &TransactionRecord) {
    println!(
        "{}  {}  {} {}  {}  {}",
        t.reference, t.kind, t.amount, t.currency, t.status, t.description
    );
}

async fn buy_airtime(client: Arc<dyn PortalApi>, phone: String, amount: String) -> Result<()> {
    let req = AirtimeRequest {
        msisdn: Msisdn::normalize(&phone)?,
        amount: parse_positive_amount(&amount)?,
    };
    let txn = client.buy_airtime(&req).await?;
    print_transaction(&txn);
    Ok(())
}

async fn list_bundles(client: Arc<dyn PortalApi>) -> Result<()> {
    for offer in client.list_bundles().await? {
        println!(
            "{}  {}  {}  valid {}",
            offer.code, offer.name, offer.amount, offer.validity
        );
    }
    Ok(())
}

async fn buy_bundle(client: Arc<dyn PortalApi>, phone: String, code: String) -> Result<()> {
    let req = BundleRequest {
        msisdn: Msisdn::normalize(&phone)?,
        bundle_code: code,
    };
    let txn = client.buy_bundle(&req).await?;
    print_transaction(&txn);
    Ok(())
}

async fn buy_electricity(client: Arc<dyn PortalApi>, meter: String, amount: String) -> Result<()> {
    let meter = meter.trim().to_string();
    if meter.is_empty() {
        bail!("meter number is required");
    }
    let req = ElectricityRequest {
        meter_number: meter,
        amount: parse_positive_amount(&amount)?,
    };
    let token = client.buy_electricity(&req).await?;
    println!("Meter:  {}", token.meter_number);
    println!("Token:  {}", token.token);
    println!("Units:  {} kWh", token.units_kwh);
    println!("Ref:    {}", token.reference);
    Ok(())
}

async fn transfer(
    client: Arc<dyn PortalApi>,
    to: String,
    amount: String,
    note: Option<String>,
) -> Result<()> {
    let req = TransferRequest {
        recipient: Msisdn::normalize(&to)?,
        amount: parse_positive_amount(&amount)?,
        note,
    };
    let txn = client.transfer(&req).await?;
    print_transaction(&txn);
    Ok(())
}

async fn run_deposit(
    client: Arc<dyn PortalApi>,
    cfg: &config::AppConfig,
    channel: Channel,
    amount: String,
    wallet: Option<String>,
) -> Result<()> {
    let ledger = Ledger::open(cfg.deposit.ledger_path())?;
    let mut flow = DepositFlow::new(client, ledger);

    let record = flow.begin(channel, &amount, wallet.as_deref()).await?;

    println!("Deposit {} initiated ({} {})", record.reference, record.amount, channel);
    if let Some(code) = &record.code {
        println!("Redemption code: {}", code);
        if let Some(expires) = &record.expires_at {
            println!("Pay it at any agent before {}", expires.to_rfc3339());
        }
    }
    if channel == Channel::MobileWallet {
        println!("Approve the prompt on your handset; checking status...");
    }

    let phase = flow.wait().await?;
    match phase {
        Some(PollPhase::Settled(rec)) => {
            println!("Deposit {}: {}", rec.reference, rec.status);
        }
        Some(PollPhase::TimedOut(rec)) => {
            println!(
                "Deposit {} is still {}; stopped checking. See `mari deposit list` or retry later.",
                rec.reference, rec.status
            );
        }
        Some(PollPhase::Polling(_)) | None => {}
    }
    Ok(())
}

fn deposit_list(cfg: &config::AppConfig) -> Result<()> {
    let ledger = Ledger::open(cfg.deposit.ledger_path())?;
    for attempt in ledger.list()? {
        println!(
            "{}  {}  {}  {}  {}  {}",
            attempt.created_at.to_rfc3339(),
            attempt.channel,
            attempt.amount,
            attempt.state,
            attempt
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            attempt.deposit_id.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

async fn history(
    client: Arc<dyn PortalApi>,
    page: u32,
    per_page: u32,
    export_path: Option<std::path::PathBuf>,
) -> Result<()> {
    let statement = client.transactions(page, per_page).await?;
    for t in &statement.items {
        println!(
            "{}  {}  {}  {} {}  {}",
            t.created_at.to_rfc3339(),
            t.reference,
            t.kind,
            t.amount,
            t.currency,
            t.status
        );
    }
    println!(
        "page {} ({} transactions total)",
        statement.page, statement.total
    );

    if let Some(path) = export_path {
        let fingerprint = export::write_csv(&path, &statement.items)?;
        if let Err(e) = write_audit_event(
            &AuditEvent::new("statement_exported", &path.display().to_string(), "exported")
                .with_hash(fingerprint.clone()),
        ) {
            tracing::warn!(error = %e, "failed to write audit event");
        }
        println!("Exported {} rows to {} (sha256 {})", statement.items.len(), path.display(), fingerprint);
    }
    Ok(())
}

async fn token_list(client: Arc<dyn PortalApi>) -> Result<()> {
    let tokens = client.api_tokens().await?;
    if tokens.is_empty() {
        println!("No API tokens.");
        return Ok(());
    }
    for t in tokens {
        println!(
            "{}  {}  sha256:{}  created {}  last used {}",
            t.id,
            t.name,
            t.fingerprint.get(..16).unwrap_or(&t.fingerprint),
            t.created_at.to_rfc3339(),
            t.last_used_at
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        );
    }
    Ok(())
}

async fn token_create(client: Arc<dyn PortalApi>, name: String) -> Result<()> {
    let new = client.create_api_token(&name).await?;
    println!("Token {} created.", new.info.id);
    println!("Secret (shown once, store it now): {}", new.secret);
    println!("Fingerprint: sha256:{}", new.info.fingerprint);
    Ok(())
}

async fn token_revoke(client: Arc<dyn PortalApi>, id: String) -> Result<()> {
    client.revoke_api_token(&id).await?;
    println!("Token {} revoked.", id);
    Ok(())
}
