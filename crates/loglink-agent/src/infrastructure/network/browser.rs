//! mDNS/DNS-SD service browsing for LAN viewer discovery.
//!
//! Viewers advertise a `_loglink._tcp.local.` service; this browser watches
//! for them and converts resolved service records into [`Peer`] values:
//!
//! - instance fullname → [`PeerEndpoint::Service`] (the stable identity)
//! - TXT key `name`    → display name (optional)
//! - TXT key `protected` → passcode-protection flag
//! - first resolved address + port → handshake target
//!
//! The `mdns-sd` daemon runs its own background thread; we pump its flume
//! receiver from a tokio task and forward typed [`BrowserEvent`]s to the
//! orchestrator, mirroring how the discovery responder feeds the application
//! layer elsewhere in this workspace.

use std::net::SocketAddr;

use mdns_sd::{ResolvedService, ServiceDaemon, ServiceEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use loglink_core::domain::peer::{protected_from_metadata, Peer, PeerEndpoint, PROTECTED_KEY};

use super::{BrowserEvent, Discoverer, DiscoveryError};

/// TXT key under which viewers advertise their display name.
const NAME_KEY: &str = "name";

/// DNS-SD browser for LogLink viewers.
pub struct ServiceBrowser {
    service_type: String,
    daemon: Option<ServiceDaemon>,
}

impl ServiceBrowser {
    pub fn new(service_type: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            daemon: None,
        }
    }
}

impl Discoverer for ServiceBrowser {
    fn start(&mut self) -> Result<mpsc::Receiver<BrowserEvent>, DiscoveryError> {
        // A restart always gets a fresh daemon; a stale one may hold a dead
        // socket from before the network condition that stopped us.
        self.stop();

        let daemon =
            ServiceDaemon::new().map_err(|e| DiscoveryError::DaemonUnavailable(e.to_string()))?;
        let receiver =
            daemon
                .browse(&self.service_type)
                .map_err(|e| DiscoveryError::BrowseFailed {
                    service_type: self.service_type.clone(),
                    message: e.to_string(),
                })?;

        info!("browsing for {}", self.service_type);
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            loop {
                let event = match receiver.recv_async().await {
                    Ok(event) => event,
                    // The daemon thread is gone; the browse is dead.
                    Err(e) => {
                        warn!(err = %e, "browse event stream died");
                        let _ = tx
                            .send(BrowserEvent::Failed(DiscoveryError::DaemonUnavailable(
                                e.to_string(),
                            )))
                            .await;
                        break;
                    }
                };
                match event {
                    ServiceEvent::ServiceResolved(info) => {
                        let Some(peer) = peer_from_service(&info) else {
                            debug!("resolved service without usable address: {}", info.get_fullname());
                            continue;
                        };
                        debug!("resolved peer {} at {}", peer.display_name(), peer.addr);
                        if tx.send(BrowserEvent::PeerFound(peer)).await.is_err() {
                            break; // owner gone
                        }
                    }
                    ServiceEvent::ServiceRemoved(_ty, fullname) => {
                        debug!("peer left: {fullname}");
                        let endpoint = PeerEndpoint::Service { fullname };
                        if tx.send(BrowserEvent::PeerLost(endpoint)).await.is_err() {
                            break;
                        }
                    }
                    // The daemon ended the search itself.  On an owner-driven
                    // stop the receiver is already dropped and this send is a
                    // no-op; otherwise the owner learns the browse is dead.
                    ServiceEvent::SearchStopped(service_type) => {
                        warn!("search for {service_type} stopped by the daemon");
                        let _ = tx
                            .send(BrowserEvent::Failed(DiscoveryError::BrowseFailed {
                                service_type,
                                message: "search stopped by the daemon".to_string(),
                            }))
                            .await;
                        break;
                    }
                    other => {
                        debug!("ignoring service event: {other:?}");
                    }
                }
            }
            debug!("browse event pump stopped");
        });

        self.daemon = Some(daemon);
        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(daemon) = self.daemon.take() {
            if let Err(e) = daemon.stop_browse(&self.service_type) {
                warn!(err = %e, "stop_browse failed");
            }
            if let Err(e) = daemon.shutdown() {
                warn!(err = %e, "mDNS daemon shutdown failed");
            }
            info!("stopped browsing for {}", self.service_type);
        }
    }
}

impl Drop for ServiceBrowser {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builds a [`Peer`] from a resolved service record.
///
/// Returns `None` when the record carries no address; such a record cannot
/// be connected to, so it is not worth showing.
fn peer_from_service(info: &ResolvedService) -> Option<Peer> {
    // ScopedIp renders v6 link-local with a scope suffix, so extract the
    // bare IpAddr rather than going through Display.
    let ip = info.get_addresses().iter().next().map(|a| a.to_ip_addr())?;

    let name = info
        .get_property_val_str(NAME_KEY)
        .map(str::to_string)
        .filter(|n| !n.is_empty());

    Some(Peer {
        endpoint: PeerEndpoint::Service {
            fullname: info.get_fullname().to_string(),
        },
        name,
        addr: SocketAddr::new(ip, info.get_port()),
        protected: protected_from_metadata(info.get_property_val_str(PROTECTED_KEY)),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
