use depthsync::{
    DiffEvent, EngineState, Error, MemoryHistory, Outcome, PriceLevel, RecordKind,
    ReconciliationEngine, Rejection, Snapshot, StopCondition,
};
use rust_decimal::Decimal;

fn d(value: &str) -> Decimal {
    value.parse().unwrap()
}

fn lvl(price: &str, size: &str) -> PriceLevel {
    PriceLevel::new(d(price), d(size))
}

fn snapshot() -> Snapshot {
    Snapshot {
        last_update_id: 1000,
        event_time_ms: 1_700_000_000_000,
        bids: vec![lvl("99", "5")],
        asks: vec![lvl("101", "3")],
    }
}

#[test]
fn bootstrap_then_level_removal() -> anyhow::Result<()> {
    let mut engine = ReconciliationEngine::new(MemoryHistory::new(), StopCondition::never());

    let outcome = engine.apply_snapshot(&snapshot())?;
    assert_eq!(outcome, Outcome::Applied { ordinal: 0, gap: None });

    let first = engine.recorder().last().cloned().unwrap();
    assert_eq!(first.kind, RecordKind::Bootstrap);
    assert_eq!(first.ordinal, 0);
    assert_eq!(first.best_bid, Some(d("99")));
    assert_eq!(first.best_ask, Some(d("101")));
    assert_eq!(first.spread, Some(d("2")));
    assert_eq!(first.midprice, Some(d("100")));
    assert_eq!(first.length, 2);
    assert_eq!((first.first_update_id, first.final_update_id), (1000, 1000));

    let diff = DiffEvent::new(998, 1002, 1_700_000_000_100).with_bids([lvl("99", "0")]);
    let outcome = engine.apply_diff(&diff)?;
    assert_eq!(outcome, Outcome::Applied { ordinal: 1, gap: None });
    assert_eq!(engine.state(), EngineState::Streaming);

    let second = engine.recorder().last().cloned().unwrap();
    assert_eq!(second.kind, RecordKind::Diff);
    assert_eq!(second.ordinal, 1);
    assert!(second.bids.is_empty());
    assert_eq!(second.asks, vec![lvl("101", "3")]);
    assert_eq!(second.best_bid, None);
    assert_eq!(second.best_ask, Some(d("101")));
    assert_eq!(second.spread, None);
    assert_eq!(second.midprice, None);
    assert_eq!(second.length, 1);
    Ok(())
}

#[test]
fn buffered_events_before_the_straddle_are_dropped() -> anyhow::Result<()> {
    let mut engine = ReconciliationEngine::new(MemoryHistory::new(), StopCondition::never());

    // Arrives before the snapshot is known.
    let early = DiffEvent::new(990, 995, 1).with_bids([lvl("98", "1")]);
    assert_eq!(
        engine.apply_diff(&early)?,
        Outcome::Discarded(Rejection::NoBaseline)
    );

    engine.apply_snapshot(&snapshot())?;

    // Entirely covered by the snapshot.
    let stale = DiffEvent::new(996, 999, 2).with_asks([lvl("100", "9")]);
    assert_eq!(engine.apply_diff(&stale)?, Outcome::Discarded(Rejection::Stale));

    // Starts beyond lastUpdateId + 1; cannot be the first event.
    let ahead = DiffEvent::new(1003, 1004, 3);
    assert_eq!(engine.apply_diff(&ahead)?, Outcome::Discarded(Rejection::Ahead));
    assert_eq!(engine.state(), EngineState::Bootstrapping);

    let straddle = DiffEvent::new(1001, 1001, 4).with_asks([lvl("100.5", "2")]);
    assert!(matches!(engine.apply_diff(&straddle)?, Outcome::Applied { ordinal: 1, .. }));

    let history = engine.recorder();
    assert_eq!(history.len(), 2);
    // The stale ask at 100 never reached the book.
    assert_eq!(history.last().unwrap().best_ask, Some(d("100.5")));
    assert_eq!(history.last().unwrap().spread, Some(d("1.5")));
    assert_eq!(engine.stats().discarded, 3);
    Ok(())
}

#[test]
fn gap_is_surfaced_without_stopping_the_run() -> anyhow::Result<()> {
    let mut engine = ReconciliationEngine::new(MemoryHistory::new(), StopCondition::never());
    engine.apply_snapshot(&snapshot())?;
    engine.apply_diff(&DiffEvent::new(1000, 1005, 1))?;

    let outcome = engine.apply_diff(&DiffEvent::new(1010, 1012, 2).with_bids([lvl("99.5", "1")]))?;
    let gap = outcome.gap().expect("gap expected");
    assert_eq!(gap.expected, 1006);
    assert_eq!(gap.received, 1010);
    assert_eq!(gap.missing(), 4);

    engine.apply_diff(&DiffEvent::new(1013, 1013, 3))?;
    assert_eq!(engine.stats().gaps, 1);
    assert_eq!(engine.stats().applied, 3);
    assert_eq!(engine.recorder().last().unwrap().best_bid, Some(d("99.5")));
    Ok(())
}

#[test]
fn prev_final_mismatch_counts_as_gap() -> anyhow::Result<()> {
    let mut engine = ReconciliationEngine::new(MemoryHistory::new(), StopCondition::never());
    engine.apply_snapshot(&snapshot())?;
    engine.apply_diff(&DiffEvent::new(999, 1004, 1).with_prev_final(998))?;

    let contiguous = DiffEvent::new(1005, 1007, 2).with_prev_final(1004);
    assert_eq!(engine.apply_diff(&contiguous)?.gap(), None);

    let broken = DiffEvent::new(1008, 1009, 3).with_prev_final(1006);
    let gap = engine.apply_diff(&broken)?.gap().expect("gap expected");
    assert_eq!(gap.prev_final, Some(1006));
    Ok(())
}

#[test]
fn stop_condition_counts_diffs_only() -> anyhow::Result<()> {
    let mut engine = ReconciliationEngine::new(MemoryHistory::new(), StopCondition::after_events(2));
    engine.apply_snapshot(&snapshot())?;
    engine.apply_diff(&DiffEvent::new(990, 995, 1))?;
    engine.apply_diff(&DiffEvent::new(1001, 1001, 2))?;
    assert!(!engine.is_terminated());
    engine.apply_diff(&DiffEvent::new(1002, 1002, 3))?;
    assert!(engine.is_terminated());

    assert!(matches!(
        engine.apply_diff(&DiffEvent::new(1003, 1003, 4)),
        Err(Error::Terminated)
    ));
    assert!(matches!(engine.apply_snapshot(&snapshot()), Err(Error::Terminated)));

    let history = engine.into_recorder();
    assert_eq!(history.len(), 3);
    assert_eq!(history.flush_count(), 1);
    Ok(())
}
