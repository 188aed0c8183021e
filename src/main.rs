//! OCS charger
//!
//! Loads a balance snapshot, reads charge requests as JSON lines on stdin,
//! debits them through the charging dispatcher and writes one JSON result per
//! request to stdout, in input order. Logs go to stderr.
//!
//! Usage: `ocs-charger [balances.json [balances.out.json]]`. Paths default to
//! `charging.balances_path` and `charging.snapshot_out_path`; without an output
//! path the final balances are not written.

use anyhow::{bail, Context};
use ocs_core::{
    config::LoggingConfig,
    models::{AccountBalances, ChargeRequest, DebitOutcome},
    AppConfig, OcsError, OcsResult,
};
use ocs_services::{BalanceRegistry, ChargingDispatcher, InMemoryFilterService};
use serde::Serialize;
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Error part of a reply line
#[derive(Debug, Serialize)]
struct ReplyError {
    code: &'static str,
    message: String,
    retryable: bool,
}

/// One stdout line
#[derive(Debug, Serialize)]
struct ChargeReply {
    line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    balance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<DebitOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ReplyError>,
}

impl ChargeReply {
    fn new(line: usize, request: Option<&ChargeRequest>, result: OcsResult<DebitOutcome>) -> Self {
        let (outcome, error) = match result {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => (
                None,
                Some(ReplyError {
                    code: e.error_code(),
                    message: e.to_string(),
                    retryable: e.is_retryable(),
                }),
            ),
        };

        Self {
            line,
            event_id: request.map(|r| r.event.id.clone()),
            account_id: request.map(|r| r.account_id.clone()),
            balance_id: request.map(|r| r.balance_id.clone()),
            outcome,
            error,
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "ocs_charging={},ocs_services={},ocs_core={}",
            logging.level, logging.level, logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    if logging.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Read every request line from stdin, keeping parse failures in place
async fn read_requests() -> anyhow::Result<Vec<OcsResult<ChargeRequest>>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut requests = Vec::new();

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        requests.push(serde_json::from_str::<ChargeRequest>(&line).map_err(OcsError::from));
    }

    Ok(requests)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    init_tracing(&config.logging);

    info!(
        "Starting OCS charger v{} on node {}",
        env!("CARGO_PKG_VERSION"),
        config.general.node_id
    );

    let mut args = env::args().skip(1);
    let balances_path = match args.next().or_else(|| config.charging.balances_path.clone()) {
        Some(path) => path,
        None => bail!("no balance snapshot given (argument or charging.balances_path)"),
    };
    let snapshot_out_path = args
        .next()
        .or_else(|| config.charging.snapshot_out_path.clone());

    let raw = tokio::fs::read_to_string(&balances_path)
        .await
        .with_context(|| format!("reading {}", balances_path))?;
    let snapshot: Vec<AccountBalances> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", balances_path))?;

    let registry = Arc::new(BalanceRegistry::new(config.charging.lock_timeout()));
    registry.load(snapshot)?;

    let filters = Arc::new(InMemoryFilterService::from_config(
        &config.general.default_tenant,
        &config.filters,
    )?);
    info!("Registered {} filter profiles", config.filters.len());

    let dispatcher = Arc::new(ChargingDispatcher::from_config(
        &config.general.default_tenant,
        &config.charging,
        registry.clone(),
        filters,
    )?);

    let parsed = read_requests().await?;
    info!("Read {} charge requests", parsed.len());

    let mut slots = Vec::with_capacity(parsed.len());
    let mut batch = Vec::new();
    for request in parsed {
        match request {
            Ok(request) => {
                slots.push(Ok(request.clone()));
                batch.push(request);
            }
            Err(e) => {
                warn!("Skipping malformed charge request: {}", e);
                slots.push(Err(e));
            }
        }
    }

    let mut results = dispatcher.process_all(batch).await.into_iter();

    let mut failed = 0;
    for (idx, slot) in slots.into_iter().enumerate() {
        let reply = match slot {
            Ok(request) => {
                let result = results.next().unwrap_or_else(|| {
                    Err(OcsError::Internal("missing charge result".to_string()))
                });
                ChargeReply::new(idx + 1, Some(&request), result)
            }
            Err(e) => ChargeReply::new(idx + 1, None, Err(e)),
        };
        if reply.error.is_some() {
            failed += 1;
        }
        println!("{}", serde_json::to_string(&reply)?);
    }

    info!("Processed charge requests, {} failed", failed);

    if let Some(path) = snapshot_out_path {
        tokio::fs::write(&path, registry.snapshot_json()?)
            .await
            .with_context(|| format!("writing {}", path))?;
        info!("Wrote balance snapshot to {}", path);
    }

    Ok(())
}
