//! Local /24 sweep for hosts answering the adb protocol.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::app::adb::client::BridgeClient;
use crate::app::config::DiscoverySettings;
use crate::app::error::AppError;
use crate::app::models::{DiscoveredHost, HostStatus};
use crate::app::network::subnet_candidates;
use crate::app::scheduler::GlobalSemaphore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOptions {
    pub port: u16,
    pub probe_timeout: Duration,
    pub max_concurrent_probes: usize,
    pub disconnect_probed: bool,
}

impl From<&DiscoverySettings> for SweepOptions {
    fn from(settings: &DiscoverySettings) -> Self {
        Self {
            port: settings.port,
            probe_timeout: Duration::from_millis(settings.probe_timeout_ms),
            max_concurrent_probes: settings.max_concurrent_probes,
            disconnect_probed: settings.disconnect_probed,
        }
    }
}

/// Sweeps the /24 around `local`. `local` itself is never probed.
pub fn sweep_subnet(
    bridge: Arc<dyn BridgeClient>,
    local: Ipv4Addr,
    options: &SweepOptions,
    trace_id: &str,
) -> Result<Vec<DiscoveredHost>, AppError> {
    let candidates = subnet_candidates(local);
    if candidates.is_empty() {
        warn!(trace_id = %trace_id, local = %local, "no network address found, nothing to sweep");
    }
    sweep_candidates(bridge, candidates, options, trace_id)
}

/// Classifies every candidate against one device listing, then probes the rest in parallel.
///
/// A failing listing aborts the sweep; failing probes are dropped. Results are sorted by address.
pub fn sweep_candidates(
    bridge: Arc<dyn BridgeClient>,
    candidates: Vec<Ipv4Addr>,
    options: &SweepOptions,
    trace_id: &str,
) -> Result<Vec<DiscoveredHost>, AppError> {
    let started = Instant::now();
    let listing = bridge.list_devices()?;

    let mut found: BTreeMap<Ipv4Addr, HostStatus> = BTreeMap::new();
    let mut to_probe = Vec::new();
    for candidate in candidates.into_iter().collect::<BTreeSet<_>>() {
        if listing.iter().any(|device| device.matches_address(candidate)) {
            found.insert(candidate, HostStatus::Connected);
        } else {
            to_probe.push(candidate);
        }
    }
    let semaphore = Arc::new(GlobalSemaphore::new(options.max_concurrent_probes));
    info!(
        trace_id = %trace_id,
        connected = found.len(),
        probing = to_probe.len(),
        max_concurrent = semaphore.limit(),
        "sweep started"
    );

    let (tx, rx) = mpsc::channel::<Ipv4Addr>();
    let mut handles = Vec::with_capacity(to_probe.len());
    for address in to_probe {
        let bridge = Arc::clone(&bridge);
        let semaphore = Arc::clone(&semaphore);
        let tx = tx.clone();
        let trace_id = trace_id.to_string();
        let target = format!("{address}:{}", options.port);
        let timeout = options.probe_timeout;
        handles.push(std::thread::spawn(move || {
            let _permit = semaphore.acquire();
            match bridge.connect(&target, timeout) {
                Ok(_) => {
                    let _ = tx.send(address);
                }
                Err(err) => {
                    debug!(trace_id = %trace_id, address = %target, error = %err.error, "probe failed");
                }
            }
        }));
    }
    drop(tx);

    for handle in handles {
        if handle.join().is_err() {
            warn!(trace_id = %trace_id, "probe thread panicked");
        }
    }

    let probed: Vec<Ipv4Addr> = rx.into_iter().collect();
    for address in &probed {
        found.entry(*address).or_insert(HostStatus::Discoverable);
    }

    if options.disconnect_probed {
        for address in &probed {
            let target = format!("{address}:{}", options.port);
            if let Err(err) = bridge.disconnect(&target) {
                warn!(trace_id = %trace_id, address = %target, error = %err.error, "failed to release probed host");
            }
        }
    }

    info!(
        trace_id = %trace_id,
        found = found.len(),
        discoverable = probed.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "sweep finished"
    );

    Ok(found
        .into_iter()
        .map(|(address, status)| DiscoveredHost { address, status })
        .collect())
}
