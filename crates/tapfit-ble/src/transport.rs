//! btleplug implementation of the Puck transport

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use tapfit_core::{
    ConnectOptions, Connection, DeviceHandle, LinkEvent, LinkEventSender, PuckTransport,
    TransportError,
};

// ----------------------------------------------------------------------------
// Transport Implementation
// ----------------------------------------------------------------------------

/// BLE transport backed by the platform's first available adapter.
///
/// Holds one active link per device handle. The supervisor serializes
/// `connect_first` calls, so no scan-coordination state is needed here.
pub struct BlePuckTransport {
    adapter: Adapter,
    links: Arc<Mutex<HashMap<String, ActiveLink>>>,
}

struct ActiveLink {
    peripheral: Peripheral,
    characteristic: Characteristic,
    /// Set before an explicit disconnect so the forwarder suppresses
    /// the `Disconnected` event for this link.
    explicit_disconnect: Arc<AtomicBool>,
}

impl BlePuckTransport {
    /// Create a transport on the first available BLE adapter
    pub async fn new() -> Result<Self, TransportError> {
        let manager = Manager::new()
            .await
            .map_err(|e| TransportError::AdapterUnavailable(e.to_string()))?;

        let adapters = manager
            .adapters()
            .await
            .map_err(|e| TransportError::AdapterUnavailable(e.to_string()))?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::AdapterUnavailable("no BLE adapters found".into()))?;

        info!("BLE adapter initialized");
        Ok(Self {
            adapter,
            links: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Scan until a peripheral advertising the wanted service shows up
    async fn discover_peripheral(
        &self,
        options: &ConnectOptions,
        deadline: Instant,
    ) -> Result<Peripheral, TransportError> {
        let mut events = self
            .adapter
            .events()
            .await
            .map_err(|e| TransportError::AdapterUnavailable(e.to_string()))?;

        self.adapter
            .start_scan(ScanFilter {
                services: vec![options.service],
            })
            .await
            .map_err(|e| TransportError::ConnectFailed(format!("failed to start scan: {}", e)))?;

        let found = timeout_at(deadline, async {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDiscovered(id) = event {
                    if let Some(peripheral) = self.peripheral_with_service(&id, options).await {
                        return Some(peripheral);
                    }
                }
            }
            None
        })
        .await;

        let _ = self.adapter.stop_scan().await;

        match found {
            Ok(Some(peripheral)) => Ok(peripheral),
            // Event stream ended without a match
            Ok(None) => Err(TransportError::ConnectFailed(
                "BLE event stream closed during scan".into(),
            )),
            Err(_) => Err(TransportError::ConnectTimeout {
                timeout_ms: options.timeout.as_millis() as u64,
            }),
        }
    }

    async fn peripheral_with_service(
        &self,
        id: &PeripheralId,
        options: &ConnectOptions,
    ) -> Option<Peripheral> {
        let peripheral = self.adapter.peripheral(id).await.ok()?;
        let properties = peripheral.properties().await.ok()??;
        if properties.services.contains(&options.service) {
            debug!(
                "Discovered Puck candidate: {} ({:?})",
                id, properties.local_name
            );
            Some(peripheral)
        } else {
            None
        }
    }

    /// Forward notifications and the one-shot disconnect event for a link
    fn spawn_link_forwarder(
        &self,
        peripheral: &Peripheral,
        characteristic: &Characteristic,
        tx: LinkEventSender,
        explicit_disconnect: Arc<AtomicBool>,
    ) -> Result<(), TransportError> {
        let peripheral_id = peripheral.id();
        let characteristic_uuid = characteristic.uuid;
        let adapter = self.adapter.clone();
        let peripheral = peripheral.clone();

        tokio::spawn(async move {
            let mut notifications = match peripheral.notifications().await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Failed to open notification stream: {}", e);
                    if !explicit_disconnect.load(Ordering::SeqCst) {
                        let _ = tx.send(LinkEvent::Disconnected);
                    }
                    return;
                }
            };
            let mut central_events = match adapter.events().await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Failed to open adapter event stream: {}", e);
                    if !explicit_disconnect.load(Ordering::SeqCst) {
                        let _ = tx.send(LinkEvent::Disconnected);
                    }
                    return;
                }
            };

            loop {
                tokio::select! {
                    note = notifications.next() => match note {
                        Some(data) if data.uuid == characteristic_uuid => {
                            if tx.send(LinkEvent::Notification(data.value)).is_err() {
                                // Receiver dropped, session is gone
                                break;
                            }
                        }
                        Some(_) => {}
                        None => {
                            if !explicit_disconnect.load(Ordering::SeqCst) {
                                let _ = tx.send(LinkEvent::Disconnected);
                            }
                            break;
                        }
                    },
                    event = central_events.next() => match event {
                        Some(CentralEvent::DeviceDisconnected(id)) if id == peripheral_id => {
                            if !explicit_disconnect.load(Ordering::SeqCst) {
                                let _ = tx.send(LinkEvent::Disconnected);
                            }
                            break;
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
            debug!("Link forwarder for {} ended", peripheral_id);
        });

        Ok(())
    }
}

#[async_trait]
impl PuckTransport for BlePuckTransport {
    async fn connect_first(&self, options: ConnectOptions) -> Result<Connection, TransportError> {
        let deadline = Instant::now() + options.timeout;
        let peripheral = self.discover_peripheral(&options, deadline).await?;

        timeout_at(deadline, peripheral.connect())
            .await
            .map_err(|_| TransportError::ConnectTimeout {
                timeout_ms: options.timeout.as_millis() as u64,
            })?
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        peripheral
            .discover_services()
            .await
            .map_err(|e| TransportError::ServiceDiscoveryFailed(e.to_string()))?;

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == options.characteristic)
            .ok_or_else(|| TransportError::CharacteristicNotFound {
                characteristic: options.characteristic.to_string(),
            })?;

        peripheral
            .subscribe(&characteristic)
            .await
            .map_err(|e| TransportError::SubscriptionFailed(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let explicit_disconnect = Arc::new(AtomicBool::new(false));
        self.spawn_link_forwarder(&peripheral, &characteristic, tx, explicit_disconnect.clone())?;

        let device_id = peripheral.id().to_string();
        let name = peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|p| p.local_name);

        info!("Connected to Puck {} ({:?})", device_id, name);

        self.links.lock().await.insert(
            device_id.clone(),
            ActiveLink {
                peripheral,
                characteristic,
                explicit_disconnect,
            },
        );

        Ok(Connection {
            device: DeviceHandle { device_id, name },
            events: rx,
        })
    }

    async fn write(&self, device: &DeviceHandle, payload: &[u8]) -> Result<(), TransportError> {
        let links = self.links.lock().await;
        let link = links
            .get(&device.device_id)
            .ok_or(TransportError::NotConnected)?;

        link.peripheral
            .write(&link.characteristic, payload, WriteType::WithoutResponse)
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;

        debug!("Wrote {} bytes to {}", payload.len(), device.device_id);
        Ok(())
    }

    async fn disconnect(&self, device: &DeviceHandle) -> Result<(), TransportError> {
        let link = self.links.lock().await.remove(&device.device_id);

        // Idempotent: an unknown or already-dropped handle is fine
        if let Some(link) = link {
            link.explicit_disconnect.store(true, Ordering::SeqCst);
            if let Err(e) = link.peripheral.disconnect().await {
                warn!("Failed to disconnect from {}: {}", device.device_id, e);
            } else {
                info!("Disconnected from Puck {}", device.device_id);
            }
        }
        Ok(())
    }
}
