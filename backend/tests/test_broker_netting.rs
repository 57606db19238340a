//! Tests for the broker netting algorithm
//!
//! CRITICAL: All money values are i64 (cents)

use chrono::{DateTime, TimeZone, Utc};
use netting_simulator_core::policy::StochasticOverridePolicy;
use netting_simulator_core::{
    Broker, BrokerError, BrokerId, DomainError, InvalidEventPolicy, SettlementChoice,
    SettlementDomain, Side, TradeEvent,
};
use std::sync::Arc;

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 6, hour, minute, 0).unwrap()
}

fn trade(hour: u32, side: Side, price: i64, size: u64) -> TradeEvent {
    TradeEvent::new(0, at(hour, 30), side, price, size).unwrap()
}

/// Broker with the random override disabled
fn netting_broker(orders: Vec<TradeEvent>) -> Broker {
    Broker::new(BrokerId(0), Arc::new(SettlementDomain::default()), orders)
        .with_policy(Box::new(StochasticOverridePolicy::new(0.0)))
}

#[test]
fn test_bid_nets_against_earlier_surplus() {
    let mut broker = netting_broker(Vec::new());
    broker.process_event(&trade(14, Side::Ask, 50, 1)).unwrap();
    assert_eq!(broker.net_cash_flow().get_label("14:00"), Some(50));

    let bid_14_before = broker.bid_volume().get_label("14:00").unwrap();

    let choice = broker.process_event(&trade(15, Side::Bid, 100, 1)).unwrap();
    assert!(!choice.is_override());

    assert_eq!(broker.net_cash_flow().get_label("14:00"), Some(0));
    assert_eq!(broker.net_cash_flow().get_label("15:00"), Some(-50));
    assert_eq!(broker.bid_volume().get_label("14:00"), Some(bid_14_before + 50));
    // 100 attributed on arrival, 50 moved to 14:00
    assert_eq!(broker.bid_volume().get_label("15:00"), Some(50));
    assert_eq!(broker.stats().netted_amount, 50);
}

#[test]
fn test_ask_nets_against_earlier_deficit() {
    let mut broker = netting_broker(Vec::new());
    broker.process_event(&trade(14, Side::Bid, 80, 1)).unwrap();
    broker.process_event(&trade(17, Side::Ask, 30, 1)).unwrap();

    assert_eq!(broker.net_cash_flow().get_label("14:00"), Some(-50));
    assert_eq!(broker.net_cash_flow().get_label("17:00"), Some(0));
    assert_eq!(broker.ask_volume().get_label("14:00"), Some(30));
    assert_eq!(broker.ask_volume().get_label("17:00"), Some(0));
}

#[test]
fn test_earliest_bucket_netted_first() {
    let mut broker = netting_broker(Vec::new());
    broker.process_event(&trade(14, Side::Ask, 40, 1)).unwrap();
    broker.process_event(&trade(15, Side::Ask, 40, 1)).unwrap();

    broker.process_event(&trade(18, Side::Bid, 60, 1)).unwrap();

    let net = broker.net_cash_flow();
    assert_eq!(net.get_label("14:00"), Some(0));
    assert_eq!(net.get_label("15:00"), Some(20));
    assert_eq!(net.get_label("18:00"), Some(0));
    assert_eq!(broker.bid_volume().get_label("14:00"), Some(40));
    assert_eq!(broker.bid_volume().get_label("15:00"), Some(20));
    assert_eq!(broker.bid_volume().get_label("18:00"), Some(0));
}

#[test]
fn test_same_direction_buckets_not_netted() {
    let mut broker = netting_broker(Vec::new());
    broker.process_event(&trade(14, Side::Bid, 10, 1)).unwrap();
    broker.process_event(&trade(16, Side::Bid, 25, 1)).unwrap();

    assert_eq!(broker.net_cash_flow().get_label("14:00"), Some(-10));
    assert_eq!(broker.net_cash_flow().get_label("16:00"), Some(-25));
    assert_eq!(broker.stats().netted_amount, 0);
}

#[test]
fn test_later_buckets_never_netted() {
    let mut broker = netting_broker(Vec::new());
    broker.process_event(&trade(20, Side::Ask, 100, 1)).unwrap();
    broker.process_event(&trade(16, Side::Bid, 100, 1)).unwrap();

    assert_eq!(broker.net_cash_flow().get_label("20:00"), Some(100));
    assert_eq!(broker.net_cash_flow().get_label("16:00"), Some(-100));
}

#[test]
fn test_first_bucket_accumulates_without_netting_pass() {
    let mut broker = netting_broker(Vec::new());
    broker.process_event(&trade(14, Side::Ask, 70, 1)).unwrap();
    broker.process_event(&trade(14, Side::Bid, 20, 1)).unwrap();
    broker.process_event(&trade(14, Side::Ask, 5, 2)).unwrap();

    assert_eq!(broker.net_cash_flow().get_label("14:00"), Some(60));
    assert_eq!(broker.ask_volume().get_label("14:00"), Some(80));
    assert_eq!(broker.bid_volume().get_label("14:00"), Some(20));
    assert_eq!(broker.stats().netting_passes, 0);
}

#[test]
fn test_target_bucket_keeps_prior_balance() {
    let mut broker = netting_broker(Vec::new());
    broker.process_event(&trade(16, Side::Ask, 30, 1)).unwrap();
    broker.process_event(&trade(16, Side::Ask, 45, 1)).unwrap();

    assert_eq!(broker.net_cash_flow().get_label("16:00"), Some(75));
    assert_eq!(broker.net_cash_flow().total(), 75);
}

#[test]
fn test_volume_shifts_preserve_side_totals() {
    let mut broker = netting_broker(Vec::new());
    broker.process_event(&trade(14, Side::Ask, 500, 1)).unwrap();
    broker.process_event(&trade(15, Side::Bid, 100, 1)).unwrap();
    broker.process_event(&trade(15, Side::Ask, 300, 1)).unwrap();
    broker.process_event(&trade(16, Side::Bid, 1000, 1)).unwrap();

    // 16:00 bid nets 400 off 14:00, then 300 off 15:00
    assert_eq!(broker.net_cash_flow().get_label("14:00"), Some(0));
    assert_eq!(broker.net_cash_flow().get_label("15:00"), Some(0));
    assert_eq!(broker.net_cash_flow().get_label("16:00"), Some(-300));
    assert_eq!(broker.bid_volume().get_label("14:00"), Some(500));
    assert_eq!(broker.bid_volume().get_label("15:00"), Some(300));
    assert_eq!(broker.bid_volume().get_label("16:00"), Some(300));

    // Attribution moves volume between buckets, never creates it
    assert_eq!(broker.bid_volume().total(), 1100);
    assert_eq!(broker.ask_volume().total(), 800);
}

#[test]
fn test_out_of_domain_event_fails_fast_without_mutation() {
    let mut broker = netting_broker(Vec::new());
    broker.process_event(&trade(15, Side::Ask, 10, 1)).unwrap();
    let before = (
        broker.net_cash_flow().clone(),
        broker.ask_volume().clone(),
        broker.bid_volume().clone(),
    );

    let early = TradeEvent::new(0, at(9, 0), Side::Bid, 100, 1).unwrap();
    let err = broker.process_event(&early).unwrap_err();
    assert_eq!(
        err,
        BrokerError::Domain(DomainError::HourOutsideDomain {
            hour: 9,
            start: 14,
            end: 22
        })
    );

    let late = TradeEvent::new(0, at(22, 0), Side::Bid, 100, 1).unwrap();
    assert!(broker.process_event(&late).is_err());

    assert_eq!(broker.net_cash_flow(), &before.0);
    assert_eq!(broker.ask_volume(), &before.1);
    assert_eq!(broker.bid_volume(), &before.2);
    assert_eq!(broker.net_cash_flow().len(), 8);
    assert_eq!(broker.stats().events_processed, 1);
}

#[test]
fn test_malformed_event_rejected() {
    let mut broker = netting_broker(Vec::new());
    let bad = TradeEvent {
        order_id: 1,
        timestamp: at(15, 0),
        side: Side::Ask,
        price: -5,
        size: 10,
    };
    assert!(matches!(
        broker.process_event(&bad),
        Err(BrokerError::Trade(_))
    ));
    assert!(broker.net_cash_flow().is_zero());
}

#[test]
fn test_skip_policy_counts_and_continues() {
    let orders = vec![
        trade(14, Side::Ask, 10, 1),
        TradeEvent::new(0, at(23, 0), Side::Bid, 10, 1).unwrap(),
        trade(15, Side::Bid, 4, 1),
    ];
    let mut broker = netting_broker(orders);
    broker.process_client_orders(InvalidEventPolicy::Skip).unwrap();

    assert_eq!(broker.stats().skipped_events, 1);
    assert_eq!(broker.stats().events_processed, 2);
    assert_eq!(broker.net_cash_flow().total(), 6);
}

#[test]
fn test_fail_policy_stops_at_first_bad_event() {
    let orders = vec![
        trade(14, Side::Ask, 10, 1),
        TradeEvent::new(0, at(3, 0), Side::Bid, 10, 1).unwrap(),
        trade(15, Side::Bid, 4, 1),
    ];
    let mut broker = netting_broker(orders);
    let err = broker
        .process_client_orders(InvalidEventPolicy::Fail)
        .unwrap_err();

    assert!(matches!(err, BrokerError::Domain(_)));
    assert_eq!(broker.stats().events_processed, 1);
}

#[test]
fn test_override_posts_full_value_to_drawn_bucket() {
    let mut broker = Broker::new(BrokerId(5), Arc::new(SettlementDomain::default()), Vec::new())
        .with_policy(Box::new(StochasticOverridePolicy::new(1.0)));

    broker.process_event(&trade(14, Side::Ask, 500, 1)).unwrap();
    let choice = broker.process_event(&trade(20, Side::Bid, 200, 1)).unwrap();

    match choice {
        SettlementChoice::RandomOverride { bucket } => {
            assert!(broker.bid_volume().get(bucket) >= 200);
        }
        other => panic!("expected override, got {:?}", other),
    }
    // No netting on override: gross bid volume stays whole
    assert_eq!(broker.bid_volume().total(), 200);
    assert_eq!(broker.ask_volume().total(), 500);
    assert_eq!(broker.net_cash_flow().total(), 300);
    assert_eq!(broker.stats().netted_amount, 0);
}

#[test]
fn test_override_fraction_converges() {
    let orders: Vec<TradeEvent> = (0..100_000)
        .map(|i| {
            let side = if i % 2 == 0 { Side::Ask } else { Side::Bid };
            trade(14 + (i % 8) as u32, side, 100, 1)
        })
        .collect();

    let mut broker = Broker::new(BrokerId(0), Arc::new(SettlementDomain::default()), orders);
    broker.process_client_orders(InvalidEventPolicy::Fail).unwrap();

    let fraction = broker.stats().override_fraction().unwrap();
    // sigma = sqrt(0.2 * 0.8 / 100_000) ≈ 0.00126
    assert!(
        (fraction - 0.2).abs() < 0.0065,
        "override fraction {} too far from 0.2",
        fraction
    );
}

/// Passes `TradeEvent::new` on its own; two of them overflow a bucket
const HALF_RANGE: i64 = i64::MAX / 2 + 1;

#[test]
fn test_bucket_overflow_rejected_without_mutation() {
    let mut broker = netting_broker(Vec::new());
    broker.process_event(&trade(15, Side::Ask, HALF_RANGE, 1)).unwrap();
    let before = (
        broker.net_cash_flow().clone(),
        broker.ask_volume().clone(),
        broker.stats().clone(),
    );

    let err = broker
        .process_event(&trade(15, Side::Ask, HALF_RANGE, 1))
        .unwrap_err();
    assert!(
        matches!(err, BrokerError::BalanceOverflow { broker: BrokerId(0), .. }),
        "unexpected error {:?}",
        err
    );

    assert_eq!(broker.net_cash_flow(), &before.0);
    assert_eq!(broker.ask_volume(), &before.1);
    assert_eq!(broker.stats(), &before.2);

    // Still usable afterwards
    broker.process_event(&trade(16, Side::Bid, 10, 1)).unwrap();
    assert_eq!(broker.stats().events_processed, 2);
}

#[test]
fn test_gross_value_overflow_across_buckets() {
    let mut broker = netting_broker(Vec::new());
    broker.process_event(&trade(14, Side::Ask, HALF_RANGE, 1)).unwrap();

    // Different bucket, so only the gross total would overflow
    let err = broker
        .process_event(&trade(20, Side::Ask, HALF_RANGE, 1))
        .unwrap_err();
    assert_eq!(
        err,
        BrokerError::BalanceOverflow {
            broker: BrokerId(0),
            accumulator: "gross_value".to_string()
        }
    );
    assert_eq!(broker.net_cash_flow().get_label("20:00"), Some(0));
}

#[test]
fn test_override_overflow_rejected() {
    let mut broker = Broker::new(BrokerId(3), Arc::new(SettlementDomain::default()), Vec::new())
        .with_policy(Box::new(StochasticOverridePolicy::new(1.0)));
    broker.process_event(&trade(15, Side::Bid, HALF_RANGE, 1)).unwrap();

    let err = broker
        .process_event(&trade(15, Side::Bid, HALF_RANGE, 1))
        .unwrap_err();
    assert!(matches!(err, BrokerError::BalanceOverflow { .. }));
    assert_eq!(broker.bid_volume().total(), HALF_RANGE);
    assert_eq!(broker.stats().random_overrides, 1);
}

#[test]
fn test_overflow_skipped_under_skip_policy() {
    let orders = vec![
        trade(15, Side::Ask, HALF_RANGE, 1),
        trade(15, Side::Ask, HALF_RANGE, 1),
        trade(16, Side::Bid, 7, 1),
    ];
    let mut broker = netting_broker(orders);
    broker.process_client_orders(InvalidEventPolicy::Skip).unwrap();

    assert_eq!(broker.stats().skipped_events, 1);
    assert_eq!(broker.stats().events_processed, 2);
}
