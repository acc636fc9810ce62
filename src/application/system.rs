use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::event_log::EventLog;
use crate::application::exporter::CollectorSet;
use crate::config::Config;
use crate::infrastructure::bus::{Bus, EventBus, MetricBus};

/// Handle to the running gateway. Dropping it does not stop anything;
/// call `shutdown` for an orderly stop.
pub struct GatewayHandle {
    pub exporter: Arc<CollectorSet>,
    pub event_log: Arc<EventLog>,
    /// Bound listener addresses, with OS-assigned ports filled in.
    pub listeners: Vec<SocketAddr>,
    cancel: CancellationToken,
    transports: Vec<JoinHandle<()>>,
    shutdown_grace: Duration,
}

impl GatewayHandle {
    /// Current scrape output, prometheus text format.
    pub fn render(&self) -> String {
        self.exporter.render()
    }

    /// Stop listeners, let bus workers drain, then stop the exporter.
    /// Tasks still running after the grace period are abandoned.
    pub async fn shutdown(mut self) {
        info!("Stopping telemetry gateway...");
        self.cancel.cancel();

        let transports = std::mem::take(&mut self.transports);
        if !transports.is_empty()
            && tokio::time::timeout(
                self.shutdown_grace,
                futures_util::future::join_all(transports),
            )
            .await
            .is_err()
        {
            warn!("udp listeners did not stop within the grace period");
        }

        self.exporter.drain(self.shutdown_grace).await;
        info!("Telemetry gateway stopped.");
    }
}

/// The assembled gateway: two buses, the exporter, the event log, and the
/// configured pipelines, all sharing one cancellation tree.
pub struct Gateway {
    pub config: Config,
    pub metric_bus: MetricBus,
    pub event_bus: EventBus,
    pub exporter: Arc<CollectorSet>,
    pub event_log: Arc<EventLog>,
    cancel: CancellationToken,
}

impl Gateway {
    pub fn build(config: Config) -> Result<Self> {
        info!(
            pipelines = config.pipelines.len(),
            "Building telemetry gateway..."
        );

        let cancel = CancellationToken::new();
        let exporter = Arc::new(CollectorSet::new(
            config.exporter.options(),
            cancel.child_token(),
        )?);

        let bus_options = config.bus.options();
        let metric_bus = Bus::new(
            "metrics",
            bus_options,
            cancel.child_token(),
            exporter
                .telemetry()
                .bus_dropped
                .with_label_values(&["metrics"]),
        );
        let event_bus = Bus::new(
            "events",
            bus_options,
            cancel.child_token(),
            exporter
                .telemetry()
                .bus_dropped
                .with_label_values(&["events"]),
        );

        Ok(Self {
            config,
            metric_bus,
            event_bus,
            exporter,
            event_log: Arc::new(EventLog::new()),
            cancel,
        })
    }

    /// Wire subscribers, start the expiry loops, and bind every configured
    /// listener. A socket that cannot bind fails the whole start.
    pub async fn start(self) -> Result<GatewayHandle> {
        info!("Starting telemetry gateway...");

        self.metric_bus.subscribe(self.exporter.clone()).await;
        self.event_bus.subscribe(self.event_log.clone()).await;
        self.exporter.start();

        let mut transports = Vec::with_capacity(self.config.pipelines.len());
        let mut listeners = Vec::with_capacity(self.config.pipelines.len());
        for pipeline in &self.config.pipelines {
            let handler = pipeline
                .handler
                .build(self.metric_bus.clone(), self.event_bus.clone());
            let transport =
                crate::infrastructure::transports::UdpTransport::bind(&pipeline.address, handler)
                    .await?;
            listeners.push(transport.local_addr()?);
            transports.push(tokio::spawn(transport.run(self.cancel.child_token())));
        }

        info!(listeners = transports.len(), "Telemetry gateway running.");

        Ok(GatewayHandle {
            exporter: self.exporter,
            event_log: self.event_log,
            listeners,
            cancel: self.cancel,
            transports,
            shutdown_grace: self.config.shutdown_grace,
        })
    }
}
