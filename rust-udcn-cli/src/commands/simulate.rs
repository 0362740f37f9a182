//! Synthetic workload through a PCCT.

use crate::utils::{print_header, Timer};
use anyhow::{bail, Context, Result};
use bytes::Bytes;
use log::{info, warn};
use rust_udcn_common::ndn::{Data, Interest, Name};
use rust_udcn_common::types::FaceId;
use rust_udcn_pcct::{
    CsHit, CsListId, DiskStore, FileDevice, GetDataCompletion, Pcct, PcctConfig, PitInsertResult,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;

const CONTENT_SIZE: usize = 100;
const DISK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Tally {
    forwarded: u64,
    aggregated: u64,
    served_memory: u64,
    served_disk: u64,
    disk_failures: u64,
    rejected: u64,
}

/// Run `repeat` rounds of one Interest per name, answering every forwarded
/// Interest with a Data packet.
pub async fn run_simulation(cfg: &PcctConfig, names: usize, repeat: usize) -> Result<()> {
    info!("Running simulation: names={}, repeat={}", names, repeat);
    let _timer = Timer::new("simulation");

    let mut pcct = Pcct::new(cfg);
    let (tx, mut completions) = mpsc::unbounded_channel::<GetDataCompletion>();
    let mut store_handle = None;
    if let Some(disk) = &cfg.disk {
        let device = FileDevice::open(&disk.path, disk.num_blocks())
            .await
            .with_context(|| format!("Failed to open disk device {}", disk.path.display()))?;
        let (store, handle) = DiskStore::spawn(device, disk.blocks_per_slot, Arc::new(tx))
            .context("Failed to start disk store")?;
        pcct = pcct.with_disk(store);
        store_handle = Some(handle);
    }

    let content = Bytes::from(vec![0x5A; CONTENT_SIZE]);
    let mut tally = Tally::default();
    let mut pending_disk = 0u64;

    for round in 0..repeat {
        for i in 0..names {
            let name = Name::from_string(&format!("/sim/{}", i));
            let interest = Interest::new(name.clone()).with_nonce((round * names + i) as u32);
            let now = Instant::now();

            match pcct.insert_interest(&interest, FaceId(1), now) {
                Ok(PitInsertResult::Created { token, .. }) => {
                    tally.forwarded += 1;
                    let data = Data::new(name, content.clone()).with_freshness(60_000);
                    let found = pcct.find_by_data(&data, Some(token));
                    pcct.insert_data(data, &found);
                }
                Ok(PitInsertResult::Aggregated { .. }) => tally.aggregated += 1,
                Ok(PitInsertResult::CsHit { entry }) => match pcct.cs_hit(entry) {
                    CsHit::Memory(_) => tally.served_memory += 1,
                    CsHit::Disk { slot, len } => {
                        if let Some(store) = pcct.disk_store() {
                            store.get_data(slot, interest, len)?;
                            pending_disk += 1;
                        }
                    }
                },
                Err(e) => {
                    warn!("Interest {} rejected: {}", interest.name, e);
                    tally.rejected += 1;
                }
            }
        }
    }

    for _ in 0..pending_disk {
        match timeout(DISK_TIMEOUT, completions.recv()).await {
            Ok(Some(GetDataCompletion { data: Some(_), .. })) => tally.served_disk += 1,
            Ok(Some(GetDataCompletion { data: None, .. })) => tally.disk_failures += 1,
            Ok(None) => bail!("disk store stopped with reads outstanding"),
            Err(_) => bail!("timed out waiting for disk reads"),
        }
    }

    print_report(&pcct, &tally);

    if let (Some(store), Some(handle)) = (pcct.disk_store(), store_handle) {
        print_disk_counters(store);
        store.close().await?;
        handle.await.context("Disk store task failed")?;
    }
    Ok(())
}

fn print_report(pcct: &Pcct, tally: &Tally) {
    print_header("Simulation Results");
    println!("Interests forwarded: {}", tally.forwarded);
    println!("Interests aggregated: {}", tally.aggregated);
    println!("Interests rejected: {}", tally.rejected);
    println!("CS hits (memory): {}", tally.served_memory);
    println!("CS hits (disk): {}", tally.served_disk);
    println!("Disk read failures: {}", tally.disk_failures);
    println!("PCCT entries: {}", pcct.len());

    let cs = pcct.cs();
    let counters = cs.counters();
    print_header("Content Store");
    for (label, list) in [
        ("direct", CsListId::Direct),
        ("indirect", CsListId::Indirect),
        ("disk", CsListId::Disk),
    ] {
        println!("{} entries: {}/{}", label, cs.count_entries(list), cs.capacity(list));
    }
    println!("Inserts: {}", counters.n_insert.value());
    println!("Misses: {}", counters.n_miss.value());
    println!(
        "Evictions: direct={} indirect={} disk={}",
        counters.n_evict_direct.value(),
        counters.n_evict_indirect.value(),
        counters.n_evict_disk.value()
    );
    println!(
        "Spills: {} (dropped {})",
        counters.n_spill.value(),
        counters.n_spill_drop.value()
    );

    let pit = pcct.pit_counters();
    print_header("PIT");
    println!("Inserts: {}", pit.n_insert.value());
    println!("Aggregated: {}", pit.n_aggregated.value());
    println!("CS matches: {}", pit.n_cs_match.value());
    println!("Data hits: {}", pit.n_data_hit.value());
    println!("Data misses: {}", pit.n_data_miss.value());
}

pub(crate) fn print_disk_counters(store: &DiskStore) {
    let counters = store.counters();
    print_header("Disk Store");
    println!("Writes: {} (failed {})", counters.n_put.value(), counters.n_put_failure.value());
    println!("Reads: {} (failed {})", counters.n_get.value(), counters.n_get_failure.value());
    println!("Average read latency: {:.1} us", counters.get_latency_us.average());
    match counters.get_latency_us.quantile(0.99) {
        Some(bound) => println!("p99 read latency: <= {} us", bound),
        None if counters.get_latency_us.count() > 0 => println!("p99 read latency: > 1 s"),
        None => {}
    }
}
