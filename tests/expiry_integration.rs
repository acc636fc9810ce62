use std::time::Duration;
use telegate::application::exporter::{CollectorSet, ExporterOptions};
use telegate::domain::metric::{Metric, MetricType};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

fn sample(name: &str, value: f64, interval: Duration) -> Metric {
    Metric::new(
        name.to_string(),
        0.0,
        MetricType::Gauge,
        interval,
        value,
        vec!["host".to_string()],
        vec!["node-1".to_string()],
    )
}

fn fast_set(cancel: CancellationToken) -> CollectorSet {
    CollectorSet::new(
        ExporterOptions {
            expiration_multiple: 2,
            with_timestamp: false,
            collector_sweep: Duration::from_millis(50),
            default_interval: Duration::from_millis(40),
        },
        cancel,
    )
    .unwrap()
}

#[tokio::test]
async fn test_series_leave_only_after_a_scrape_has_seen_them() {
    let cancel = CancellationToken::new();
    let set = fast_set(cancel.clone());
    set.start();

    set.receive_metric(sample(
        "probe_temperature",
        21.5,
        Duration::from_millis(40),
    ));

    // Staleness hits at 80ms and sweeps run every 40ms, yet the series
    // must survive: no scrape has seen it.
    sleep(Duration::from_millis(300)).await;
    assert_eq!(set.entry_count(), 1, "unscraped series was evicted");

    // The first scrape arms eviction; staleness is long past.
    assert!(set.render().contains("probe_temperature"));
    for _ in 0..100 {
        if set.entry_count() == 0 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(set.entry_count(), 0, "scraped stale series never left");
    assert!(!set.render().contains("probe_temperature{"));

    cancel.cancel();
    set.drain(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_drained_label_group_retires_and_rebuilds() {
    let cancel = CancellationToken::new();
    let set = fast_set(cancel.clone());
    set.start();

    set.receive_metric(sample("cascade_probe", 1.0, Duration::from_millis(40)));
    assert_eq!(set.collector_count(), 1);
    assert!(set.render().contains("cascade_probe"));

    // Series goes stale, leaves, and the drained group follows.
    for _ in 0..200 {
        if set.collector_count() == 0 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(set.entry_count(), 0);
    assert_eq!(set.collector_count(), 0, "drained group was never retired");

    // The same shape of metric builds a fresh group.
    set.receive_metric(sample("cascade_probe", 2.0, Duration::from_millis(40)));
    assert_eq!(set.collector_count(), 1);
    assert!(set.render().contains("cascade_probe{host=\"node-1\"} 2"));

    cancel.cancel();
    set.drain(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_refreshed_series_survive_scrapes_and_sweeps() {
    let cancel = CancellationToken::new();
    let set = fast_set(cancel.clone());
    set.start();

    let interval = Duration::from_millis(100);
    set.receive_metric(sample("heartbeat", 0.0, interval));

    // Re-arrivals every 50ms stay well inside the 200ms staleness window,
    // so scrape after scrape sees the same, single series.
    for round in 1..=5 {
        sleep(Duration::from_millis(50)).await;
        set.receive_metric(sample("heartbeat", round as f64, interval));
        assert!(set.render().contains("heartbeat"));
        assert_eq!(set.entry_count(), 1);
    }
    assert!(set.render().contains("heartbeat{host=\"node-1\"} 5"));

    cancel.cancel();
    set.drain(Duration::from_secs(1)).await;
}
