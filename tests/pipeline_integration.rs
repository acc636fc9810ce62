use serde_json::json;
use std::time::Duration;
use telegate::application::system::{Gateway, GatewayHandle};
use telegate::config::Config;
use tokio::net::UdpSocket;
use tokio::time::sleep;

fn test_config(pipelines: &[&str]) -> Config {
    Config {
        pipelines: pipelines.iter().map(|p| p.parse().unwrap()).collect(),
        ..Config::default()
    }
}

async fn await_render(handle: &GatewayHandle, needle: &str) -> String {
    let mut rendered = String::new();
    for _ in 0..200 {
        rendered = handle.render();
        if rendered.contains(needle) {
            return rendered;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("scrape output never contained '{}':\n{}", needle, rendered);
}

#[tokio::test]
async fn test_collectd_datagram_reaches_scrape_output() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();

    let gateway = Gateway::build(test_config(&["udp:127.0.0.1:0:collectd"])).unwrap();
    let handle = gateway.start().await.unwrap();
    let target = handle.listeners[0];

    let frame = json!([{
        "values": [0.35, 0.28, 0.31],
        "dstypes": ["gauge", "gauge", "gauge"],
        "dsnames": ["shortterm", "midterm", "longterm"],
        "time": 1683028800.0,
        "interval": 10.0,
        "host": "node-1",
        "plugin": "load",
        "plugin_instance": "",
        "type": "load",
        "type_instance": ""
    }])
    .to_string();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(frame.as_bytes(), target).await.unwrap();

    // Deliveries are in publish order, so the last value arriving means
    // the whole list made it through.
    let rendered = await_render(&handle, "collectd_load_longterm").await;
    assert!(rendered.contains("collectd_load_shortterm{host=\"node-1\"} 0.35"));
    assert!(rendered.contains("collectd_load_midterm{host=\"node-1\"} 0.28"));
    assert!(rendered.contains("telegate_metrics_received_total 3"));
    assert!(rendered.contains("telegate_entries_tracked 3"));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_ceilometer_datagram_reaches_scrape_output() {
    let gateway = Gateway::build(test_config(&["udp:127.0.0.1:0:ceilometer"])).unwrap();
    let handle = gateway.start().await.unwrap();
    let target = handle.listeners[0];

    let message = json!({
        "payload": [{
            "counter_name": "memory.usage",
            "counter_type": "gauge",
            "counter_unit": "MB",
            "counter_volume": 512.0,
            "project_id": "proj-1",
            "resource_id": "inst-7",
            "timestamp": "2023-05-02T12:00:00+00:00"
        }]
    })
    .to_string();
    let frame = json!({
        "request": { "oslo.version": "2.0", "oslo.message": message }
    })
    .to_string();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(frame.as_bytes(), target).await.unwrap();

    let rendered = await_render(&handle, "ceilometer_memory_usage").await;
    assert!(rendered.contains(
        "ceilometer_memory_usage{project=\"proj-1\",resource=\"inst-7\",unit=\"MB\"} 512"
    ));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_mixed_pipelines_feed_metrics_and_events() {
    let gateway = Gateway::build(test_config(&[
        "udp:127.0.0.1:0:collectd",
        "udp:127.0.0.1:0:sensubility",
    ]))
    .unwrap();
    let handle = gateway.start().await.unwrap();
    let metric_target = handle.listeners[0];
    let event_target = handle.listeners[1];

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let metric_frame = json!([{
        "values": [42.0],
        "dstypes": ["gauge"],
        "dsnames": ["value"],
        "time": 0.0,
        "interval": 10.0,
        "host": "node-2",
        "plugin": "uptime",
        "plugin_instance": "",
        "type": "uptime",
        "type_instance": ""
    }])
    .to_string();
    sender
        .send_to(metric_frame.as_bytes(), metric_target)
        .await
        .unwrap();

    let event_frame = json!({
        "client": "node-2",
        "check": "disk-health",
        "status": 1,
        "output": "83% full",
        "executed": 1683028800.0
    })
    .to_string();
    sender
        .send_to(event_frame.as_bytes(), event_target)
        .await
        .unwrap();

    let rendered = await_render(&handle, "collectd_uptime").await;
    assert!(rendered.contains("collectd_uptime{host=\"node-2\"} 42"));

    for _ in 0..200 {
        if handle.event_log.seen() == 1 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(handle.event_log.seen(), 1, "event never reached the log");

    handle.shutdown().await;
}

#[tokio::test]
async fn test_garbage_datagram_does_not_stop_the_pipeline() {
    let gateway = Gateway::build(test_config(&["udp:127.0.0.1:0:collectd"])).unwrap();
    let handle = gateway.start().await.unwrap();
    let target = handle.listeners[0];

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(b"not json at all", target).await.unwrap();

    let frame = json!([{
        "values": [1.0],
        "dstypes": ["derive"],
        "dsnames": ["value"],
        "time": 0.0,
        "interval": 10.0,
        "host": "node-3",
        "plugin": "interface",
        "plugin_instance": "eth0",
        "type": "if_packets",
        "type_instance": ""
    }])
    .to_string();
    sender.send_to(frame.as_bytes(), target).await.unwrap();

    let rendered = await_render(&handle, "collectd_interface_if_packets").await;
    assert!(
        rendered
            .contains("collectd_interface_if_packets{host=\"node-3\",plugin_instance=\"eth0\"} 1")
    );

    handle.shutdown().await;
}
