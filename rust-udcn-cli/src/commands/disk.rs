//! Disk store round-trip check.

use crate::commands::simulate::print_disk_counters;
use crate::utils::{format_bytes, print_header, Timer};
use anyhow::{bail, Context, Result};
use bytes::Bytes;
use log::{debug, info};
use rust_udcn_common::ndn::{Data, Interest, Name, MAX_NDN_PACKET_SIZE};
use rust_udcn_common::types::{DiskSlotId, DISK_BLOCK_SIZE};
use rust_udcn_pcct::{DiskConfig, DiskStore, FileDevice, GetDataCompletion};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Write `count` Data packets of varying size to slots 1..=count and read them back.
pub async fn run_disk_check(path: PathBuf, count: u64) -> Result<()> {
    if count == 0 {
        bail!("count must be positive");
    }
    info!("Running disk check: path={}, count={}", path.display(), count);
    let _timer = Timer::new("disk check");

    let disk = DiskConfig::new(path, count);
    let device = FileDevice::open(&disk.path, disk.num_blocks())
        .await
        .with_context(|| format!("Failed to open {}", disk.path.display()))?;
    let (tx, mut rx) = mpsc::unbounded_channel::<GetDataCompletion>();
    let (store, handle) = DiskStore::spawn(device, disk.blocks_per_slot, Arc::new(tx))
        .context("Failed to start disk store")?;

    let mut expected = HashMap::new();
    for slot in 1..=count {
        let size = ((slot * 397) as usize) % (MAX_NDN_PACKET_SIZE / 2);
        let name = Name::from_string(&format!("/disk-check/{}", slot));
        let data = Data::new(name, Bytes::from(vec![slot as u8; size]));
        expected.insert(slot, data.to_wire());
        store.put_data(DiskSlotId(slot), data)?;
    }
    for (&slot, wire) in &expected {
        let interest = Interest::new(Name::from_string(&format!("/disk-check/{}", slot)));
        store.get_data(DiskSlotId(slot), interest, wire.len())?;
    }

    let mut ok = 0u64;
    for _ in 0..count {
        let done = match timeout(Duration::from_secs(10), rx.recv()).await {
            Ok(Some(done)) => done,
            Ok(None) => bail!("disk store stopped with reads outstanding"),
            Err(_) => bail!("timed out waiting for disk reads"),
        };
        let matches = match (&done.data, expected.get(&done.slot.0)) {
            (Some(data), Some(wire)) => data.to_wire() == *wire,
            _ => false,
        };
        if matches {
            ok += 1;
        } else {
            debug!("{} did not round-trip", done.slot);
        }
    }

    print_header("Disk Check Results");
    println!(
        "Device: {} ({} slots of {})",
        disk.path.display(),
        count,
        format_bytes((disk.blocks_per_slot * DISK_BLOCK_SIZE) as usize)
    );
    println!("Round trips: {}/{} succeeded", ok, count);
    print_disk_counters(&store);

    store.close().await?;
    handle.await.context("Disk store task failed")?;
    if ok != count {
        bail!("{} of {} Data packets did not round-trip", count - ok, count);
    }
    Ok(())
}
