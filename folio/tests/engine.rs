mod common;

use std::time::Duration;

use folio::{reserved, Config, Diff, Engine, FolioError, HisItem, ReadOpts, Span, Value, Word, WriteOpts};
use url::Url;

async fn test_engine() -> std::sync::Arc<Engine> {
    let fake = common::spawn().await;
    let endpoint = Url::parse(&format!("redis://{}", fake.addr)).unwrap();
    let config = Config::builder(endpoint)
        .connect_timeout(Duration::from_secs(2))
        .receive_timeout(Duration::from_secs(2))
        .build();
    Engine::open(config).await.unwrap()
}

#[tokio::test]
async fn create_then_read_round_trips() {
    let engine = test_engine().await;
    let diff = Diff::create("site.a").set(Word::new_unchecked("dis"), Value::Str("Site A".into()));
    let committed = engine.records.commit(vec![diff]).await.unwrap();
    assert_eq!(committed.len(), 1);

    let read = engine.records.read_by_id("site.a", &ReadOpts::default()).unwrap();
    assert_eq!(read.get(&Word::new_unchecked("dis")), Some(&Value::Str("Site A".into())));
    assert!(read.mod_millis().is_some());
}

#[tokio::test]
async fn removing_a_record_destroys_it_from_cache_and_every_index() {
    let engine = test_engine().await;
    let created = engine
        .records
        .commit(vec![
            Diff::create("site.a").set(Word::new_unchecked("site"), Value::Marker)
        ])
        .await
        .unwrap();
    let mod1 = created[0].mod_millis().unwrap();
    assert_eq!(engine.records.ids_with_tag(&Word::new_unchecked("site")), vec!["site.a".to_string()]);

    engine
        .records
        .commit(vec![Diff::remove("site.a", mod1)])
        .await
        .unwrap();

    assert!(engine
        .records
        .read_by_id("site.a", &ReadOpts { trash: true, ..Default::default() })
        .is_none());
    assert!(engine.records.ids_with_tag(&Word::new_unchecked("site")).is_empty());
    assert_eq!(engine.records.read_all(None, &ReadOpts::default()).len(), 0);
}

#[tokio::test]
async fn trashing_a_record_marks_it_without_deleting_it() {
    let engine = test_engine().await;
    let created = engine
        .records
        .commit(vec![Diff::create("site.a")])
        .await
        .unwrap();
    let mod1 = created[0].mod_millis().unwrap();

    engine
        .records
        .commit(vec![Diff::update("site.a", mod1).set(reserved::trash(), Value::Marker)])
        .await
        .unwrap();

    let default_opts = ReadOpts::default();
    assert!(engine.records.read_by_id("site.a", &default_opts).is_none());

    let with_trash = ReadOpts { trash: true, ..Default::default() };
    let after = engine.records.read_by_id("site.a", &with_trash).unwrap();
    assert!(after.is_trash());
}

#[tokio::test]
async fn update_with_a_stale_expected_mod_is_rejected() {
    let engine = test_engine().await;
    let created = engine
        .records
        .commit(vec![Diff::create("site.a")])
        .await
        .unwrap();
    let mod1 = created[0].mod_millis().unwrap();

    // Advance the record once so `mod1` is now stale.
    engine
        .records
        .commit(vec![
            Diff::update("site.a", mod1).set(Word::new_unchecked("dis"), Value::Str("A".into()))
        ])
        .await
        .unwrap();

    let stale = engine
        .records
        .commit(vec![
            Diff::update("site.a", mod1).set(Word::new_unchecked("dis"), Value::Str("B".into()))
        ])
        .await;
    assert!(matches!(stale, Err(FolioError::ConcurrentChange { .. })));
}

#[tokio::test]
async fn a_transient_write_never_advances_mod() {
    let engine = test_engine().await;
    let created = engine
        .records
        .commit(vec![Diff::create("site.a")])
        .await
        .unwrap();
    let mod1 = created[0].mod_millis().unwrap();

    let transient = engine
        .records
        .commit(vec![Diff::update("site.a", mod1)
            .set(Word::new_unchecked("curVal"), Value::number(21.5))
            .transient(true)])
        .await
        .unwrap();
    assert_eq!(transient[0].mod_millis(), Some(mod1));
    assert_eq!(
        transient[0].get(&Word::new_unchecked("curVal")),
        Some(&Value::number(21.5))
    );
}

#[tokio::test]
async fn committing_a_record_advances_the_version_counter() {
    let engine = test_engine().await;
    let v0 = engine.records.cur_ver();
    engine
        .records
        .commit(vec![Diff::create("site.a")])
        .await
        .unwrap();
    assert!(engine.records.cur_ver() > v0);
}

#[tokio::test]
async fn history_write_then_read_returns_the_window_and_lookahead() {
    let engine = test_engine().await;
    engine
        .records
        .commit(vec![Diff::create("point.a").set(reserved::his(), Value::Marker).set(reserved::point(), Value::Marker)])
        .await
        .unwrap();

    let items: Vec<HisItem> = [100, 200, 300, 400, 500]
        .into_iter()
        .map(|ts| HisItem::new(ts, Value::number(ts as f64)))
        .collect();
    let outcome = engine
        .history
        .write("point.a", items, WriteOpts::default())
        .await
        .unwrap();
    assert_eq!(outcome.written, 5);

    let span = Span::new(200, 400).unwrap();
    let read = engine.history.read("point.a", span, None).await.unwrap();
    assert_eq!(read.prev.map(|i| i.ts), Some(100));
    assert_eq!(read.items.iter().map(|i| i.ts).collect::<Vec<_>>(), vec![200, 300]);
    assert_eq!(read.next.iter().map(|i| i.ts).collect::<Vec<_>>(), vec![400, 500]);
}

#[tokio::test]
async fn history_summary_tags_follow_writes() {
    let engine = test_engine().await;
    engine
        .records
        .commit(vec![Diff::create("point.a").set(reserved::his(), Value::Marker).set(reserved::point(), Value::Marker)])
        .await
        .unwrap();

    engine
        .history
        .write("point.a", vec![HisItem::new(100, Value::number(1.0))], WriteOpts::default())
        .await
        .unwrap();
    engine
        .history
        .write("point.a", vec![HisItem::new(200, Value::number(2.0))], WriteOpts::default())
        .await
        .unwrap();

    let record = engine.records.read_by_id("point.a", &ReadOpts::default()).unwrap();
    assert_eq!(
        record.get(&reserved::his_size()).and_then(Value::as_number),
        Some(2.0)
    );
    assert_eq!(
        record.get(&reserved::his_end_val()).and_then(Value::as_number),
        Some(2.0)
    );
}

#[tokio::test]
async fn history_sentinel_delete_removes_a_single_point() {
    let engine = test_engine().await;
    engine
        .records
        .commit(vec![Diff::create("point.a").set(reserved::his(), Value::Marker).set(reserved::point(), Value::Marker)])
        .await
        .unwrap();

    engine
        .history
        .write(
            "point.a",
            vec![HisItem::new(100, Value::number(1.0)), HisItem::new(200, Value::number(2.0))],
            WriteOpts::default(),
        )
        .await
        .unwrap();

    let outcome = engine
        .history
        .write("point.a", vec![HisItem::new(100, Value::Remove)], WriteOpts::default())
        .await
        .unwrap();
    assert_eq!(outcome.written, 0);
    assert_eq!(outcome.cleared, 1);

    let read = engine
        .history
        .read("point.a", Span::everything(), None)
        .await
        .unwrap();
    assert_eq!(read.items.iter().map(|i| i.ts).collect::<Vec<_>>(), vec![200]);
}

#[tokio::test]
async fn history_requires_the_host_record_to_be_a_non_trashed_point() {
    let engine = test_engine().await;
    engine
        .records
        .commit(vec![Diff::create("point.a").set(reserved::his(), Value::Marker)])
        .await
        .unwrap();

    let err = engine
        .history
        .write("point.a", vec![HisItem::new(1, Value::number(1.0))], WriteOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FolioError::HisConfig { .. }));
}
