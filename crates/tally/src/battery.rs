//! Battery sampling from sysfs.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use tally_core::SessionHandle;
use tokio::{task::JoinHandle, time};
use tracing::{debug, info, instrument};

/// Where the kernel exposes power supply state.
const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// How often the battery is sampled.
const POLL_PERIOD: Duration = Duration::from_secs(30);

/// Spawn the battery watcher.
///
/// Reports discharging readings to the controller, which applies the active
/// session's low-battery policy. Exits quietly when the host has no battery
/// or when the controller goes away.
pub(crate) fn spawn(handle: SessionHandle) -> JoinHandle<()> {
    tokio::spawn(watch_battery(handle, PathBuf::from(POWER_SUPPLY_ROOT)))
}

#[instrument(skip(handle, root))]
async fn watch_battery(handle: SessionHandle, root: PathBuf) {
    let Some(battery) = find_battery(&root).await else {
        info!("No battery found, battery policy disabled");
        return;
    };

    info!(battery = %battery.display(), "Battery watcher running");

    let mut ticker = time::interval(POLL_PERIOD);

    loop {
        ticker.tick().await;

        let Some(reading) = read_battery(&battery).await else {
            continue;
        };

        if !reading.discharging {
            continue;
        }

        debug!(percent = reading.percent, "Battery discharging");

        if handle.report_battery(reading.percent).await.is_err() {
            // Controller is gone, nothing left to report to.
            break;
        }
    }
}

/// One sample of the battery's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BatteryReading {
    /// Remaining charge in percent.
    pub(crate) percent: u8,
    /// Whether the supply is currently discharging.
    pub(crate) discharging: bool,
}

/// The first supply under `root` whose type reads `Battery`.
pub(crate) async fn find_battery(root: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(root).await.ok()?;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if let Ok(kind) = tokio::fs::read_to_string(path.join("type")).await {
            if kind.trim() == "Battery" {
                return Some(path);
            }
        }
    }

    None
}

/// Read one sample from a battery's sysfs directory.
pub(crate) async fn read_battery(battery: &Path) -> Option<BatteryReading> {
    let capacity = tokio::fs::read_to_string(battery.join("capacity")).await.ok()?;
    let status = tokio::fs::read_to_string(battery.join("status")).await.ok()?;

    let percent = capacity.trim().parse().ok()?;

    Some(BatteryReading {
        percent,
        discharging: status.trim() == "Discharging",
    })
}
