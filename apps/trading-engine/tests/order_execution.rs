//! Integration tests for order execution and portfolio reconciliation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use trading_engine::{
    HoldingsLedger, InMemoryOrderRepository, Instrument, InstrumentId, Money, OrderExecutor,
    OrderKind, OrderRequest, OrderSide, OrderStatus, PortfolioId, PriceFeed, RejectReason, UserId,
};

struct Harness {
    executor: OrderExecutor,
    ledger: Arc<HoldingsLedger>,
    feed: Arc<PriceFeed>,
    instrument: InstrumentId,
    portfolio: PortfolioId,
    user: UserId,
}

fn harness(price: Decimal) -> Harness {
    let feed = Arc::new(PriceFeed::new(dec!(2)));
    let instrument = InstrumentId::new("inst-AAPL");
    feed.register(
        instrument.clone(),
        Instrument::new("AAPL", "USD"),
        Some(Money::new(price)),
    );

    let ledger = Arc::new(HoldingsLedger::new());
    let executor = OrderExecutor::new(
        Arc::clone(&feed),
        Arc::clone(&ledger),
        Arc::new(InMemoryOrderRepository::new()),
    );
    Harness {
        executor,
        ledger,
        feed,
        instrument,
        portfolio: PortfolioId::new("pf-1"),
        user: UserId::new("user-1"),
    }
}

impl Harness {
    fn request(&self, side: OrderSide, kind: OrderKind, quantity: u32) -> OrderRequest {
        OrderRequest {
            user_id: self.user.clone(),
            portfolio_id: self.portfolio.clone(),
            instrument_id: self.instrument.clone(),
            side,
            kind,
            quantity,
            limit_or_stop_price: None,
        }
    }
}

#[tokio::test]
async fn market_buy_fills_and_opens_position() {
    let h = harness(dec!(100));
    let report = h
        .executor
        .submit(h.request(OrderSide::Buy, OrderKind::Market, 10))
        .await
        .unwrap();

    assert!(report.is_filled());
    assert_eq!(report.order.status(), OrderStatus::Filled);
    assert_eq!(report.order.filled_price(), Some(Money::new(dec!(100))));
    assert_eq!(report.order.total_value(), Some(Money::new(dec!(1000))));

    let fill = report.fill.unwrap();
    assert_eq!(fill.quantity_after, 10);
    assert_eq!(fill.average_cost_after, Money::new(dec!(100)));
    assert_eq!(h.ledger.held_quantity(&h.portfolio, &h.instrument), 10);
}

#[tokio::test]
async fn buys_at_different_prices_average_out() {
    let h = harness(dec!(100));
    h.executor
        .submit(h.request(OrderSide::Buy, OrderKind::Market, 10))
        .await
        .unwrap();

    // Move the price and buy again.
    h.feed
        .apply_delta(&h.instrument, Money::new(dec!(200)), None)
        .unwrap();

    let report = h
        .executor
        .submit(h.request(OrderSide::Buy, OrderKind::Market, 10))
        .await
        .unwrap();
    let fill = report.fill.unwrap();
    assert_eq!(fill.quantity_after, 20);
    assert_eq!(fill.average_cost_after, Money::new(dec!(150)));
}

#[tokio::test]
async fn sell_realizes_pnl_against_average_cost() {
    let h = harness(dec!(100));
    h.executor
        .submit(h.request(OrderSide::Buy, OrderKind::Market, 10))
        .await
        .unwrap();

    h.feed
        .apply_delta(&h.instrument, Money::new(dec!(120)), None)
        .unwrap();

    let report = h
        .executor
        .submit(h.request(OrderSide::Sell, OrderKind::Market, 4))
        .await
        .unwrap();
    let fill = report.fill.unwrap();

    assert_eq!(fill.quantity_after, 6);
    assert_eq!(fill.average_cost_after, Money::new(dec!(100)));
    assert_eq!(fill.realized_pnl, Some(Money::new(dec!(80))));
}

#[tokio::test]
async fn buy_buy_sell_round_trip() {
    // 10 @ 100, 5 @ 130 -> 15 @ 110; sell all 15 @ 140 -> P&L 450.
    let h = harness(dec!(100));
    h.executor
        .submit(h.request(OrderSide::Buy, OrderKind::Market, 10))
        .await
        .unwrap();

    h.feed
        .apply_delta(&h.instrument, Money::new(dec!(130)), None)
        .unwrap();
    let report = h
        .executor
        .submit(h.request(OrderSide::Buy, OrderKind::Market, 5))
        .await
        .unwrap();
    assert_eq!(
        report.fill.unwrap().average_cost_after,
        Money::new(dec!(110))
    );

    h.feed
        .apply_delta(&h.instrument, Money::new(dec!(140)), None)
        .unwrap();
    let report = h
        .executor
        .submit(h.request(OrderSide::Sell, OrderKind::Market, 15))
        .await
        .unwrap();
    let fill = report.fill.unwrap();
    assert_eq!(fill.quantity_after, 0);
    assert_eq!(fill.realized_pnl, Some(Money::new(dec!(450))));

    // The emptied position is gone; a further sell rejects.
    assert!(h.ledger.position(&h.portfolio, &h.instrument).is_none());
    let report = h
        .executor
        .submit(h.request(OrderSide::Sell, OrderKind::Market, 1))
        .await
        .unwrap();
    assert_eq!(
        report.order.reject_reason(),
        Some(&RejectReason::InsufficientPosition)
    );
}

#[tokio::test]
async fn oversell_rejects_with_insufficient_position() {
    let h = harness(dec!(100));
    h.executor
        .submit(h.request(OrderSide::Buy, OrderKind::Market, 3))
        .await
        .unwrap();

    let report = h
        .executor
        .submit(h.request(OrderSide::Sell, OrderKind::Market, 5))
        .await
        .unwrap();

    assert_eq!(report.order.status(), OrderStatus::Rejected);
    assert_eq!(
        report.order.reject_reason(),
        Some(&RejectReason::InsufficientPosition)
    );
    // The failed sell left the position untouched.
    assert_eq!(h.ledger.held_quantity(&h.portfolio, &h.instrument), 3);
}

#[tokio::test]
async fn unknown_instrument_rejects() {
    let h = harness(dec!(100));
    let mut request = h.request(OrderSide::Buy, OrderKind::Market, 1);
    request.instrument_id = InstrumentId::new("inst-missing");

    let report = h.executor.submit(request).await.unwrap();
    assert_eq!(
        report.order.reject_reason(),
        Some(&RejectReason::UnknownInstrument)
    );
}

#[tokio::test]
async fn unpriced_instrument_rejects_as_price_unavailable() {
    let h = harness(dec!(100));
    // Registered, but no price has ever been recorded for it.
    let unpriced = InstrumentId::new("inst-IPO");
    h.feed
        .register(unpriced.clone(), Instrument::new("IPO", "USD"), None);

    let mut request = h.request(OrderSide::Buy, OrderKind::Market, 1);
    request.instrument_id = unpriced;

    let report = h.executor.submit(request).await.unwrap();
    assert_eq!(report.order.status(), OrderStatus::Rejected);
    assert_eq!(
        report.order.reject_reason(),
        Some(&RejectReason::PriceUnavailable)
    );
}

#[tokio::test]
async fn zero_quantity_rejects_as_invalid() {
    let h = harness(dec!(100));
    let report = h
        .executor
        .submit(h.request(OrderSide::Buy, OrderKind::Market, 0))
        .await
        .unwrap();

    assert_eq!(report.order.status(), OrderStatus::Rejected);
    assert!(matches!(
        report.order.reject_reason(),
        Some(RejectReason::InvalidOrder { .. })
    ));
}

#[tokio::test]
async fn limit_buy_respects_current_price() {
    let h = harness(dec!(100));

    // Limit above the market: fills at the market price, not the limit.
    let mut request = h.request(OrderSide::Buy, OrderKind::Limit, 2);
    request.limit_or_stop_price = Some(Money::new(dec!(105)));
    let report = h.executor.submit(request).await.unwrap();
    assert_eq!(report.order.filled_price(), Some(Money::new(dec!(100))));

    // Limit below the market: immediate-or-reject, so it rejects.
    let mut request = h.request(OrderSide::Buy, OrderKind::Limit, 2);
    request.limit_or_stop_price = Some(Money::new(dec!(95)));
    let report = h.executor.submit(request).await.unwrap();
    assert_eq!(
        report.order.reject_reason(),
        Some(&RejectReason::PriceConditionNotMet)
    );
}

#[tokio::test]
async fn stop_sell_triggers_only_under_the_stop() {
    let h = harness(dec!(100));
    h.executor
        .submit(h.request(OrderSide::Buy, OrderKind::Market, 10))
        .await
        .unwrap();

    let mut request = h.request(OrderSide::Sell, OrderKind::Stop, 5);
    request.limit_or_stop_price = Some(Money::new(dec!(90)));
    let report = h.executor.submit(request).await.unwrap();
    assert_eq!(
        report.order.reject_reason(),
        Some(&RejectReason::PriceConditionNotMet)
    );

    let mut request = h.request(OrderSide::Sell, OrderKind::Stop, 5);
    request.limit_or_stop_price = Some(Money::new(dec!(100)));
    let report = h.executor.submit(request).await.unwrap();
    assert!(report.is_filled());
}

#[tokio::test]
async fn every_submission_is_retrievable_afterwards() {
    let h = harness(dec!(100));
    let filled = h
        .executor
        .submit(h.request(OrderSide::Buy, OrderKind::Market, 1))
        .await
        .unwrap();
    let rejected = h
        .executor
        .submit(h.request(OrderSide::Sell, OrderKind::Market, 99))
        .await
        .unwrap();

    let found = h.executor.order(filled.order.id()).await.unwrap();
    assert_eq!(found.status(), OrderStatus::Filled);

    let found = h.executor.order(rejected.order.id()).await.unwrap();
    assert_eq!(found.status(), OrderStatus::Rejected);
    assert!(found.reject_reason().is_some());

    let orders = h.executor.orders_for_user(&h.user).await.unwrap();
    assert_eq!(orders.len(), 2);
}

#[tokio::test]
async fn concurrent_sells_never_oversell() {
    let h = Arc::new(harness(dec!(100)));
    h.executor
        .submit(h.request(OrderSide::Buy, OrderKind::Market, 50))
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let h = Arc::clone(&h);
        tasks.push(tokio::spawn(async move {
            let report = h
                .executor
                .submit(h.request(OrderSide::Sell, OrderKind::Market, 5))
                .await
                .unwrap();
            report.is_filled()
        }));
    }

    let mut filled = 0;
    for task in tasks {
        if task.await.unwrap() {
            filled += 1;
        }
    }

    // 50 shares, 5 per sell: exactly 10 can fill.
    assert_eq!(filled, 10);
    assert_eq!(h.ledger.held_quantity(&h.portfolio, &h.instrument), 0);
}

proptest! {
    /// Average cost after any sequence of buys equals total spend over
    /// total shares, independent of order.
    #[test]
    fn average_cost_is_volume_weighted(
        fills in prop::collection::vec((1_u32..500, 1_i64..100_000), 1..20)
    ) {
        let ledger = HoldingsLedger::new();
        let portfolio = PortfolioId::new("pf-prop");
        let instrument = InstrumentId::new("inst-prop");

        let mut total_shares = 0_u64;
        let mut total_cost = Decimal::ZERO;
        let mut last_avg = Decimal::ZERO;
        for (quantity, cents) in fills {
            let price = Money::from_cents(cents);
            let outcome = ledger
                .apply_fill(&portfolio, &instrument, OrderSide::Buy, quantity, price)
                .unwrap();
            total_shares += u64::from(quantity);
            total_cost += price.amount() * Decimal::from(quantity);
            last_avg = outcome.average_cost_after.amount();
        }

        let expected = total_cost / Decimal::from(total_shares);
        prop_assert!((last_avg - expected).abs() < dec!(0.0001));
    }
}
