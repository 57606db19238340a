//! Tests for trade event sources

use netting_simulator_core::source::{
    collect_events, JsonLinesSource, PriceDistribution, SourceError, SyntheticConfig,
    SyntheticSource, TradeSource, VecSource,
};
use netting_simulator_core::{Side, TradeEvent};

#[test]
fn test_json_lines_parses_side_aliases() {
    let data = r#"{"timestamp":"2024-12-06T14:00:00Z","side":"B","price":100,"size":2}
{"timestamp":"2024-12-06T15:30:00Z","side":"ask","price":101,"size":1}
{"timestamp":"2024-12-06T16:00:00Z","side":"Ask","price":99,"size":5}"#;
    let events = collect_events(&mut JsonLinesSource::new(data.as_bytes())).unwrap();

    let sides: Vec<Side> = events.iter().map(|e| e.side).collect();
    assert_eq!(sides, vec![Side::Bid, Side::Ask, Side::Ask]);
    assert_eq!(events[0].order_id, 0);
    assert_eq!(events[2].value(), Ok(495));
}

#[test]
fn test_collect_stops_at_first_error() {
    let data = r#"{"timestamp":"2024-12-06T14:00:00Z","side":"B","price":100,"size":2}
not json
{"timestamp":"2024-12-06T16:00:00Z","side":"Ask","price":99,"size":5}"#;
    let err = collect_events(&mut JsonLinesSource::new(data.as_bytes())).unwrap_err();
    assert!(matches!(err, SourceError::Parse { line: 2, .. }));
}

#[test]
fn test_vec_source_yields_in_order() {
    let data = r#"{"order_id":1,"timestamp":"2024-12-06T14:00:00Z","side":"B","price":100,"size":2}"#;
    let event: TradeEvent = serde_json::from_str(data).unwrap();

    let mut source = VecSource::new(vec![event, event]);
    assert_eq!(source.next_event().map(|r| r.is_ok()), Some(true));
    assert_eq!(source.next_event().map(|r| r.is_ok()), Some(true));
    assert!(source.next_event().is_none());
}

#[test]
fn test_synthetic_is_deterministic() {
    let config = SyntheticConfig {
        num_events: 500,
        seed: 77,
        ..Default::default()
    };
    let a = collect_events(&mut SyntheticSource::new(&config).unwrap()).unwrap();
    let b = collect_events(&mut SyntheticSource::new(&config).unwrap()).unwrap();
    assert_eq!(a, b);

    let other = SyntheticConfig { seed: 78, ..config };
    let c = collect_events(&mut SyntheticSource::new(&other).unwrap()).unwrap();
    assert_ne!(a, c);
}

#[test]
fn test_synthetic_events_are_valid_and_numbered() {
    let config = SyntheticConfig {
        num_events: 1_000,
        price: PriceDistribution::Uniform { min: 50, max: 60 },
        size_range: (1, 3),
        ..Default::default()
    };
    let events = collect_events(&mut SyntheticSource::new(&config).unwrap()).unwrap();

    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.order_id, i as u64 + 1);
        assert!((50..=60).contains(&event.price));
        assert!((1..=3).contains(&event.size));
        assert!(event.validate().is_ok());
    }
}

#[test]
fn test_synthetic_ask_probability_extremes() {
    let all_asks = SyntheticConfig {
        num_events: 200,
        ask_probability: 1.0,
        ..Default::default()
    };
    let events = collect_events(&mut SyntheticSource::new(&all_asks).unwrap()).unwrap();
    assert!(events.iter().all(|e| e.side == Side::Ask));
}

#[test]
fn test_synthetic_rejects_bad_config() {
    let bad_hours = SyntheticConfig {
        start_hour: 20,
        end_hour: 20,
        ..Default::default()
    };
    assert!(matches!(
        SyntheticSource::new(&bad_hours),
        Err(SourceError::InvalidConfig(_))
    ));

    let bad_size = SyntheticConfig {
        size_range: (0, 10),
        ..Default::default()
    };
    assert!(SyntheticSource::new(&bad_size).is_err());
}
