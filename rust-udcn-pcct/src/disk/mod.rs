//! Disk-backed overflow store for evicted Data.
//!
//! The store owns a [`BlockDevice`] on a dedicated tokio task. Requests are
//! handed to that task over a channel, so [`DiskStore::put_data`] and
//! [`DiskStore::get_data`] never block and may be called from any thread.
//! Read completions are delivered through a [`DiskCallback`] that runs on the
//! I/O task; there is no cancellation of a submitted read, and every read
//! produces exactly one completion.
//!
//! Slot `s` starts at block `s * blocks_per_slot`. Slot 0 is reserved.

mod alloc;
mod device;

pub use alloc::DiskAlloc;
pub use device::{BlockDevice, FileDevice, MemoryDevice};

use log::{debug, trace, warn};
use rust_udcn_common::metrics::{Counter, Histogram};
use rust_udcn_common::ndn::{Data, Interest};
use rust_udcn_common::types::{DiskSlotId, DISK_BLOCK_SIZE};
use rust_udcn_common::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Result of a [`DiskStore::get_data`] request.
#[derive(Debug)]
pub struct GetDataCompletion {
    pub slot: DiskSlotId,
    /// The Interest passed to `get_data`, handed back unchanged.
    pub interest: Interest,
    /// The Data read from disk, or `None` if the read or parse failed.
    pub data: Option<Data>,
}

/// Receiver of read completions; invoked on the disk store's I/O task.
pub trait DiskCallback: Send + Sync {
    fn on_get_data(&self, completion: GetDataCompletion);
}

impl DiskCallback for mpsc::UnboundedSender<GetDataCompletion> {
    fn on_get_data(&self, completion: GetDataCompletion) {
        if self.send(completion).is_err() {
            debug!("disk completion dropped, receiver closed");
        }
    }
}

/// Disk store statistics.
#[derive(Debug, Clone)]
pub struct DiskCounters {
    pub n_put: Counter,
    pub n_put_failure: Counter,
    pub n_get: Counter,
    pub n_get_failure: Counter,
    /// Read latency in microseconds.
    pub get_latency_us: Histogram,
}

impl Default for DiskCounters {
    fn default() -> Self {
        Self {
            n_put: Counter::new(),
            n_put_failure: Counter::new(),
            n_get: Counter::new(),
            n_get_failure: Counter::new(),
            get_latency_us: Histogram::exponential(10, 1_000_000, 12),
        }
    }
}

enum Request {
    Put { slot: DiskSlotId, data: Data },
    Get { slot: DiskSlotId, interest: Interest, data_len: usize },
    Close(oneshot::Sender<()>),
}

/// Handle to a running disk store.
#[derive(Clone)]
pub struct DiskStore {
    requests: mpsc::UnboundedSender<Request>,
    blocks_per_slot: u64,
    max_slot: u64,
    counters: Arc<DiskCounters>,
}

impl std::fmt::Debug for DiskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskStore")
            .field("blocks_per_slot", &self.blocks_per_slot)
            .field("max_slot", &self.max_slot)
            .finish()
    }
}

impl DiskStore {
    /// Start a disk store over `device` on the current tokio runtime.
    ///
    /// The device must use 512-byte blocks and hold at least slot 1.
    pub fn spawn<D>(
        device: D,
        blocks_per_slot: u64,
        callback: Arc<dyn DiskCallback>,
    ) -> Result<(Self, JoinHandle<()>)>
    where
        D: BlockDevice + 'static,
    {
        if device.block_size() != DISK_BLOCK_SIZE {
            return Err(Error::DiskStore(format!(
                "device block size {} is not {}",
                device.block_size(),
                DISK_BLOCK_SIZE
            )));
        }
        if blocks_per_slot == 0 {
            return Err(Error::DiskStore("blocks_per_slot must be positive".into()));
        }
        let n_slots = device.num_blocks() / blocks_per_slot;
        if n_slots < 2 {
            return Err(Error::DiskStore(format!(
                "device with {} blocks has no usable slot of {} blocks",
                device.num_blocks(),
                blocks_per_slot
            )));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::DiskStore(format!("no tokio runtime: {}", e)))?;

        let (requests, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(DiskCounters::default());
        let io = IoTask {
            device: Box::new(device),
            blocks_per_slot,
            callback,
            counters: Arc::clone(&counters),
        };
        let handle = runtime.spawn(io.run(rx));

        debug!("disk store started with slots 1..={} of {} blocks", n_slots - 1, blocks_per_slot);
        let store = Self {
            requests,
            blocks_per_slot,
            max_slot: n_slots - 1,
            counters,
        };
        Ok((store, handle))
    }

    pub fn blocks_per_slot(&self) -> u64 {
        self.blocks_per_slot
    }

    /// Highest usable slot number.
    pub fn max_slot(&self) -> u64 {
        self.max_slot
    }

    /// Largest Data wire size that fits in one slot.
    pub fn slot_size(&self) -> usize {
        (self.blocks_per_slot * DISK_BLOCK_SIZE) as usize
    }

    pub fn counters(&self) -> &DiskCounters {
        &self.counters
    }

    /// First block of `slot`.
    pub fn block_offset(&self, slot: DiskSlotId) -> u64 {
        slot.0 * self.blocks_per_slot
    }

    /// Number of blocks spanned by a `len`-byte payload.
    pub fn block_count(len: usize) -> u64 {
        (len as u64).div_ceil(DISK_BLOCK_SIZE)
    }

    fn check_slot(&self, slot: DiskSlotId) {
        assert!(slot.0 != 0, "disk slot 0 is reserved");
        assert!(slot.0 <= self.max_slot, "{} beyond last slot {}", slot, self.max_slot);
    }

    fn submit(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| Error::DiskStore("disk store is closed".into()))
    }

    /// Queue `data` to be written to `slot`. No completion is reported.
    pub fn put_data(&self, slot: DiskSlotId, data: Data) -> Result<()> {
        self.check_slot(slot);
        let len = data.wire_size();
        if len > self.slot_size() {
            return Err(Error::DiskStore(format!(
                "Data of {} bytes exceeds slot size {}",
                len,
                self.slot_size()
            )));
        }
        trace!("put {} ({} bytes)", slot, len);
        self.submit(Request::Put { slot, data })
    }

    /// Queue a read of `data_len` bytes from `slot`, answering `interest`.
    ///
    /// `data_len` must be the wire size of the Data stored in the slot; any
    /// other length, including one the slot cannot hold, yields a completion
    /// with `data: None`. Only a closed store is reported as an error.
    pub fn get_data(&self, slot: DiskSlotId, interest: Interest, data_len: usize) -> Result<()> {
        self.check_slot(slot);
        trace!("get {} ({} bytes)", slot, data_len);
        self.submit(Request::Get {
            slot,
            interest,
            data_len,
        })
    }

    /// Process every request queued so far, then stop the I/O task.
    pub async fn close(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.submit(Request::Close(tx))?;
        rx.await
            .map_err(|_| Error::DiskStore("disk store stopped before close".into()))
    }
}

struct IoTask {
    device: Box<dyn BlockDevice>,
    blocks_per_slot: u64,
    callback: Arc<dyn DiskCallback>,
    counters: Arc<DiskCounters>,
}

impl IoTask {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Request>) {
        while let Some(request) = rx.recv().await {
            match request {
                Request::Put { slot, data } => self.put(slot, data).await,
                Request::Get {
                    slot,
                    interest,
                    data_len,
                } => self.get(slot, interest, data_len).await,
                Request::Close(ack) => {
                    let _ = ack.send(());
                    break;
                }
            }
        }
        debug!("disk store stopped");
    }

    async fn put(&mut self, slot: DiskSlotId, data: Data) {
        let wire = data.to_wire();
        let blocks = DiskStore::block_count(wire.len());
        let mut buf = vec![0u8; (blocks * DISK_BLOCK_SIZE) as usize];
        buf[..wire.len()].copy_from_slice(&wire);

        let offset = slot.0 * self.blocks_per_slot;
        match self.device.write_blocks(offset, &buf).await {
            Ok(()) => self.counters.n_put.increment(),
            Err(e) => {
                self.counters.n_put_failure.increment();
                warn!("write {} failed: {}", slot, e);
            }
        }
    }

    async fn get(&mut self, slot: DiskSlotId, interest: Interest, data_len: usize) {
        let start = Instant::now();
        let data = if data_len == 0 || data_len as u64 > self.blocks_per_slot * DISK_BLOCK_SIZE {
            debug!("read length {} does not fit {}", data_len, slot);
            None
        } else {
            self.read(slot, data_len).await
        };

        self.counters.n_get.increment();
        if data.is_none() {
            self.counters.n_get_failure.increment();
        }
        self.counters
            .get_latency_us
            .observe(start.elapsed().as_micros() as u64);

        self.callback.on_get_data(GetDataCompletion {
            slot,
            interest,
            data,
        });
    }

    async fn read(&mut self, slot: DiskSlotId, data_len: usize) -> Option<Data> {
        let blocks = DiskStore::block_count(data_len);
        let mut buf = vec![0u8; (blocks * DISK_BLOCK_SIZE) as usize];
        let offset = slot.0 * self.blocks_per_slot;

        match self.device.read_blocks(offset, &mut buf).await {
            Ok(()) => match Data::from_wire(&buf[..data_len]) {
                Ok(data) => Some(data),
                Err(e) => {
                    debug!("{} does not hold a {}-byte Data: {}", slot, data_len, e);
                    None
                }
            },
            Err(e) => {
                warn!("read {} failed: {}", slot, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rust_udcn_common::ndn::Name;
    use std::sync::atomic::Ordering;

    fn data(name: &str, size: usize) -> Data {
        Data::new(Name::from_string(name), Bytes::from(vec![0x42; size])).with_freshness(5000)
    }

    fn start(
        blocks: u64,
    ) -> (
        DiskStore,
        mpsc::UnboundedReceiver<GetDataCompletion>,
        Arc<std::sync::atomic::AtomicBool>,
    ) {
        let device = MemoryDevice::new(blocks);
        let failing = device.failure_switch();
        let (tx, rx) = mpsc::unbounded_channel();
        let (store, _) = DiskStore::spawn(device, 4, Arc::new(tx)).unwrap();
        (store, rx, failing)
    }

    #[test]
    fn test_block_math() {
        assert_eq!(DiskStore::block_count(1), 1);
        assert_eq!(DiskStore::block_count(512), 1);
        assert_eq!(DiskStore::block_count(513), 2);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (store, mut rx, _) = start(64);
        assert_eq!(store.max_slot(), 15);
        assert_eq!(store.block_offset(DiskSlotId(3)), 12);

        let d = data("/disk/a", 1000);
        let len = d.wire_size();
        store.put_data(DiskSlotId(3), d.clone()).unwrap();
        let interest = Interest::new(Name::from_string("/disk/a")).with_nonce(7);
        store.get_data(DiskSlotId(3), interest, len).unwrap();

        let done = rx.recv().await.unwrap();
        assert_eq!(done.slot, DiskSlotId(3));
        assert_eq!(done.interest.nonce, 7);
        let got = done.data.unwrap();
        assert_eq!(got.to_wire(), d.to_wire());
        assert_eq!(store.counters().n_put.value(), 1);
        assert_eq!(store.counters().get_latency_us.count(), 1);
    }

    #[tokio::test]
    async fn test_length_mismatch_clears_result() {
        let (store, mut rx, _) = start(64);
        let d = data("/disk/b", 300);
        let len = d.wire_size();
        store.put_data(DiskSlotId(1), d).unwrap();

        for wrong in [len - 1, len + 1, 0, store.slot_size() + 1] {
            let interest = Interest::new(Name::from_string("/disk/b")).with_nonce(wrong as u32);
            store.get_data(DiskSlotId(1), interest, wrong).unwrap();
            let done = rx.recv().await.unwrap();
            assert_eq!(done.slot, DiskSlotId(1));
            assert_eq!(done.interest.nonce, wrong as u32);
            assert!(done.data.is_none());
        }
        assert_eq!(store.counters().n_get_failure.value(), 4);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_device_failure_still_completes() {
        let (store, mut rx, failing) = start(64);
        let d = data("/disk/c", 10);
        let len = d.wire_size();
        store.put_data(DiskSlotId(2), d).unwrap();

        let interest = Interest::new(Name::from_string("/disk/c"));
        store.get_data(DiskSlotId(2), interest.clone(), len).unwrap();
        assert!(rx.recv().await.unwrap().data.is_some());

        failing.store(true, Ordering::Relaxed);
        store.get_data(DiskSlotId(2), interest, len).unwrap();
        assert!(rx.recv().await.unwrap().data.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_drains_and_rejects() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (store, handle) = DiskStore::spawn(MemoryDevice::new(64), 4, Arc::new(tx)).unwrap();
        let d = data("/disk/d", 10);
        let len = d.wire_size();
        store.put_data(DiskSlotId(5), d).unwrap();
        store
            .get_data(DiskSlotId(5), Interest::new(Name::from_string("/disk/d")), len)
            .unwrap();
        store.close().await.unwrap();
        handle.await.unwrap();

        assert!(rx.recv().await.unwrap().data.is_some());
        assert!(store.put_data(DiskSlotId(5), data("/disk/d", 10)).is_err());
    }

    #[tokio::test]
    async fn test_oversized_data_rejected() {
        let (store, _rx, _) = start(64);
        assert!(store.put_data(DiskSlotId(1), data("/big", 4096)).is_err());
    }

    #[tokio::test]
    async fn test_rejects_bad_device() {
        let (tx, _rx) = mpsc::unbounded_channel::<GetDataCompletion>();
        assert!(DiskStore::spawn(MemoryDevice::new(4), 4, Arc::new(tx)).is_err());
    }

    #[tokio::test]
    #[should_panic(expected = "reserved")]
    async fn test_slot_zero_panics() {
        let (store, _rx, _) = start(64);
        let _ = store.put_data(DiskSlotId(0), data("/zero", 1));
    }
}
