//! Charging dispatcher
//!
//! Runs one unit of work per charge request, capped by the configured number
//! of concurrent requests. Failures are logged and reported per request; they
//! never stop the dispatcher.

use futures::future::join_all;
use ocs_core::{
    config::ChargingConfig,
    models::{ChargeRequest, DebitOutcome, DynamicDecimalOpt, EventContext},
    traits::FilterService,
    OcsError, OcsResult,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::registry::BalanceRegistry;
use crate::unit_factor::resolve_dynamic_decimal;

/// Bounded-concurrency charge processor
pub struct ChargingDispatcher {
    registry: Arc<BalanceRegistry>,
    filters: Arc<dyn FilterService>,
    increments: Vec<DynamicDecimalOpt>,
    limiter: Option<Arc<Semaphore>>,
    default_tenant: String,
}

impl ChargingDispatcher {
    /// Create a dispatcher; `concurrency_limit` of `None` means unbounded
    pub fn new(
        registry: Arc<BalanceRegistry>,
        filters: Arc<dyn FilterService>,
        increments: Vec<DynamicDecimalOpt>,
        concurrency_limit: Option<usize>,
    ) -> Self {
        Self {
            registry,
            filters,
            increments,
            limiter: concurrency_limit.map(|limit| Arc::new(Semaphore::new(limit))),
            default_tenant: String::new(),
        }
    }

    /// Tenant given to events that arrive without one
    pub fn with_default_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.default_tenant = tenant.into();
        self
    }

    /// Create a dispatcher from the charging section of the configuration
    pub fn from_config(
        default_tenant: &str,
        config: &ChargingConfig,
        registry: Arc<BalanceRegistry>,
        filters: Arc<dyn FilterService>,
    ) -> OcsResult<Self> {
        if config.concurrent_requests == 0 {
            return Err(OcsError::Config(
                "charging.concurrent_requests must be -1 or greater than zero".to_string(),
            ));
        }

        Ok(Self::new(
            registry,
            filters,
            config.increment_opts()?,
            config.concurrency_limit(),
        )
        .with_default_tenant(default_tenant))
    }

    /// Permits left, `None` when unbounded
    pub fn available_permits(&self) -> Option<usize> {
        self.limiter.as_ref().map(|limiter| limiter.available_permits())
    }

    /// Increment to use for a request
    ///
    /// The request's own increment wins, then the first configured increment
    /// whose filters pass, then `1`.
    pub async fn resolve_increment(
        &self,
        increment: Option<Decimal>,
        event: &EventContext,
    ) -> OcsResult<Decimal> {
        if let Some(increment) = increment {
            return Ok(increment);
        }

        let resolved =
            resolve_dynamic_decimal(self.filters.as_ref(), &event.tenant, &self.increments, event)
                .await?;
        Ok(resolved.unwrap_or(Decimal::ONE))
    }

    /// Process one charge request
    #[instrument(skip(self, request), fields(
        account_id = %request.account_id,
        balance_id = %request.balance_id,
        event_id = %request.event.id,
    ))]
    pub async fn process(&self, mut request: ChargeRequest) -> OcsResult<DebitOutcome> {
        if request.event.tenant.is_empty() {
            request.event.tenant = self.default_tenant.clone();
        }

        let _permit = match &self.limiter {
            Some(limiter) => Some(
                Arc::clone(limiter)
                    .acquire_owned()
                    .await
                    .map_err(|e| OcsError::Internal(format!("dispatcher closed: {}", e)))?,
            ),
            None => None,
        };

        let result = self.charge(&request).await;
        if let Err(e) = &result {
            warn!(
                "Failed processing charge for {}:{} (event {}): {} (retryable: {})",
                request.account_id,
                request.balance_id,
                request.event.id,
                e,
                e.is_retryable()
            );
        }
        result
    }

    async fn charge(&self, request: &ChargeRequest) -> OcsResult<DebitOutcome> {
        let balance = self
            .registry
            .get(&request.account_id, &request.balance_id)?;
        let increment = self
            .resolve_increment(request.increment, &request.event)
            .await?;

        debug!(
            "Charging {} with increment {} on {}:{}",
            request.amount, increment, request.account_id, request.balance_id
        );

        balance
            .debit(
                self.filters.as_ref(),
                request.amount,
                increment,
                &request.event,
            )
            .await
    }

    /// Process a batch concurrently, returning results in input order
    pub async fn process_all(
        self: &Arc<Self>,
        requests: Vec<ChargeRequest>,
    ) -> Vec<OcsResult<DebitOutcome>> {
        let handles = requests.into_iter().map(|request| {
            let dispatcher = Arc::clone(self);
            tokio::spawn(async move { dispatcher.process(request).await })
        });

        join_all(handles)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(OcsError::Internal(format!("charge task failed: {}", e)))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::InMemoryFilterService;
    use ocs_core::config::IncrementEntry;
    use ocs_core::models::{AccountBalances, Balance};
    use rust_decimal_macros::dec;

    fn dispatcher(increments: Vec<DynamicDecimalOpt>, limit: Option<usize>) -> ChargingDispatcher {
        let registry = Arc::new(BalanceRegistry::new(None));
        registry
            .load(vec![AccountBalances {
                account_id: "1001".to_string(),
                balances: vec![Balance::concrete("MONETARY", dec!(10))],
            }])
            .unwrap();
        ChargingDispatcher::new(
            registry,
            Arc::new(InMemoryFilterService::new()),
            increments,
            limit,
        )
    }

    fn request(amount: Decimal, increment: Option<Decimal>) -> ChargeRequest {
        ChargeRequest {
            account_id: "1001".to_string(),
            balance_id: "MONETARY".to_string(),
            amount,
            increment,
            event: EventContext::new("ocs.local").with_field("ToR", "*voice"),
        }
    }

    #[tokio::test]
    async fn test_resolve_increment_order() {
        let dispatcher = dispatcher(
            vec![
                DynamicDecimalOpt::new(vec!["*string:~*req.ToR:*data".to_string()], dec!(1024)),
                DynamicDecimalOpt::new(vec!["*string:~*req.ToR:*voice".to_string()], dec!(6)),
            ],
            None,
        );
        let ev = EventContext::new("ocs.local").with_field("ToR", "*voice");

        assert_eq!(
            dispatcher.resolve_increment(Some(dec!(0.5)), &ev).await.unwrap(),
            dec!(0.5)
        );
        assert_eq!(dispatcher.resolve_increment(None, &ev).await.unwrap(), dec!(6));

        let ev = EventContext::new("ocs.local").with_field("ToR", "*sms");
        assert_eq!(dispatcher.resolve_increment(None, &ev).await.unwrap(), Decimal::ONE);
    }

    #[tokio::test]
    async fn test_process() {
        let dispatcher = dispatcher(Vec::new(), Some(2));

        let outcome = dispatcher.process(request(dec!(4), None)).await.unwrap();
        assert_eq!(outcome.granted, dec!(4));
        assert_eq!(outcome.units_after, dec!(6));
        assert_eq!(dispatcher.available_permits(), Some(2));
    }

    #[tokio::test]
    async fn test_process_unknown_balance() {
        let dispatcher = dispatcher(Vec::new(), None);
        let mut req = request(dec!(1), None);
        req.balance_id = "SMS".to_string();

        let err = dispatcher.process(req).await.unwrap_err();
        assert_eq!(err.error_code(), "balance_not_found");
        assert_eq!(dispatcher.available_permits(), None);
    }

    #[test]
    fn test_from_config_rejects_zero_cap() {
        let config = ChargingConfig {
            concurrent_requests: 0,
            ..ChargingConfig::default()
        };
        let result = ChargingDispatcher::from_config(
            "ocs.local",
            &config,
            Arc::new(BalanceRegistry::new(None)),
            Arc::new(InMemoryFilterService::new()),
        );
        assert!(matches!(result, Err(OcsError::Config(_))));
    }

    #[tokio::test]
    async fn test_empty_tenant_uses_default() {
        let registry = Arc::new(BalanceRegistry::new(None));
        registry
            .load(vec![AccountBalances {
                account_id: "1001".to_string(),
                balances: vec![Balance::concrete("MONETARY", dec!(1))],
            }])
            .unwrap();
        let filters = InMemoryFilterService::new()
            .with_profile("ocs.local", "FLTR_VOICE", &["*string:~*req.ToR:*voice"])
            .unwrap();
        let config = ChargingConfig {
            increments: vec![IncrementEntry {
                filter_ids: "FLTR_VOICE".to_string(),
                value: "0.4".to_string(),
            }],
            ..ChargingConfig::default()
        };
        let dispatcher =
            ChargingDispatcher::from_config("ocs.local", &config, registry, Arc::new(filters))
                .unwrap();

        let mut req = request(dec!(2), None);
        req.event.tenant = String::new();

        // the increment profile only exists under the default tenant
        let outcome = dispatcher.process(req).await.unwrap();
        assert_eq!(outcome.granted, dec!(0.8));
        assert_eq!(outcome.units_after, dec!(0.2));
    }
}
