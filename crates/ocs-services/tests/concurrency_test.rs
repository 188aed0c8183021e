//! Concurrency tests for guarded balances and the charging dispatcher

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use ocs_core::models::{AccountBalances, Balance, ChargeRequest, EventContext, UnitFactor};
    use ocs_core::traits::FilterService;
    use ocs_core::OcsResult;
    use ocs_services::{BalanceRegistry, ChargingDispatcher, GuardedBalance, InMemoryFilterService};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Filter service that passes everything slowly and records peak load
    #[derive(Default)]
    struct SlowFilters {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl FilterService for SlowFilters {
        async fn pass(
            &self,
            _tenant: &str,
            _filter_ids: &[String],
            _event: &EventContext,
        ) -> OcsResult<bool> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    fn request(account_id: &str, balance_id: &str, amount: Decimal) -> ChargeRequest {
        ChargeRequest {
            account_id: account_id.to_string(),
            balance_id: balance_id.to_string(),
            amount,
            increment: Some(dec!(1)),
            event: EventContext::new("ocs.local").with_field("ToR", "*voice"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_debits_never_breach_floor() {
        let filters = Arc::new(InMemoryFilterService::new());
        let guarded = Arc::new(
            GuardedBalance::new(Balance::concrete("MONETARY", dec!(50)).with_limit(dec!(-10)))
                .unwrap(),
        );

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let guarded = Arc::clone(&guarded);
                let filters = Arc::clone(&filters);
                tokio::spawn(async move {
                    guarded
                        .debit(filters.as_ref(), dec!(3), dec!(1), &EventContext::new("ocs.local"))
                        .await
                        .unwrap()
                        .granted
                })
            })
            .collect();

        let mut total = Decimal::ZERO;
        for handle in handles {
            let granted = handle.await.unwrap();
            assert!(granted >= Decimal::ZERO && granted <= dec!(3));
            total += granted;
        }

        let units = guarded.units().unwrap();
        assert_eq!(units, dec!(-10));
        assert_eq!(total, dec!(60));
        assert_eq!(dec!(50) - total, units);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dispatcher_respects_concurrency_cap() {
        let filters = Arc::new(SlowFilters::default());
        let registry = Arc::new(BalanceRegistry::new(None));
        registry
            .load(vec![AccountBalances {
                account_id: "1001".to_string(),
                balances: vec![Balance::concrete("VOICE", dec!(1000)).with_unit_factor(
                    UnitFactor::new(vec!["FLTR_VOICE".to_string()], dec!(60)),
                )],
            }])
            .unwrap();

        let dispatcher = Arc::new(ChargingDispatcher::new(
            registry,
            filters.clone(),
            Vec::new(),
            Some(2),
        ));

        let requests = (0..8).map(|_| request("1001", "VOICE", dec!(1))).collect();
        let results = dispatcher.process_all(requests).await;

        assert_eq!(results.len(), 8);
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(filters.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(dispatcher.available_permits(), Some(2));
    }

    #[tokio::test]
    async fn test_dispatcher_keeps_input_order() {
        let registry = Arc::new(BalanceRegistry::new(None));
        registry
            .load(vec![AccountBalances {
                account_id: "1001".to_string(),
                balances: vec![
                    Balance::concrete("A", dec!(100)),
                    Balance::concrete("B", dec!(100)),
                ],
            }])
            .unwrap();

        let dispatcher = Arc::new(ChargingDispatcher::new(
            registry,
            Arc::new(InMemoryFilterService::new()),
            Vec::new(),
            None,
        ));

        let requests = vec![
            request("1001", "A", dec!(5)),
            request("1001", "MISSING", dec!(1)),
            request("1001", "B", dec!(7)),
            request("2002", "A", dec!(1)),
        ];
        let results = dispatcher.process_all(requests).await;

        assert_eq!(results[0].as_ref().unwrap().granted, dec!(5));
        assert_eq!(
            results[1].as_ref().unwrap_err().error_code(),
            "balance_not_found"
        );
        assert_eq!(results[2].as_ref().unwrap().balance_id, "B");
        assert_eq!(
            results[3].as_ref().unwrap_err().error_code(),
            "account_not_found"
        );
    }
}
