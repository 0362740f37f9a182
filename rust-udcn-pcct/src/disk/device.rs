//! Block devices underneath the disk store.

use async_trait::async_trait;
use log::debug;
use rust_udcn_common::types::DISK_BLOCK_SIZE;
use rust_udcn_common::{Error, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};

/// A block-addressed storage device.
///
/// Offsets are in blocks; buffer lengths must be a multiple of the block size.
#[async_trait]
pub trait BlockDevice: Send {
    fn block_size(&self) -> u64;

    fn num_blocks(&self) -> u64;

    async fn read_blocks(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    async fn write_blocks(&mut self, offset: u64, buf: &[u8]) -> Result<()>;
}

fn check_extent(device: &dyn BlockDevice, offset: u64, len: usize) -> Result<u64> {
    let block_size = device.block_size();
    if len as u64 % block_size != 0 {
        return Err(Error::DiskStore(format!(
            "buffer of {} bytes is not a whole number of {}-byte blocks",
            len, block_size
        )));
    }
    let end = offset + len as u64 / block_size;
    if end > device.num_blocks() {
        return Err(Error::DiskStore(format!(
            "blocks {}..{} beyond device end {}",
            offset,
            end,
            device.num_blocks()
        )));
    }
    Ok(offset * block_size)
}

/// RAM-backed device.
#[derive(Debug)]
pub struct MemoryDevice {
    storage: Vec<u8>,
    failing: Arc<AtomicBool>,
}

impl MemoryDevice {
    pub fn new(num_blocks: u64) -> Self {
        Self {
            storage: vec![0; (num_blocks * DISK_BLOCK_SIZE) as usize],
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Switch that makes every subsequent I/O fail while set.
    pub fn failure_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.failing)
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(Error::Io(std::io::Error::other("injected device failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl BlockDevice for MemoryDevice {
    fn block_size(&self) -> u64 {
        DISK_BLOCK_SIZE
    }

    fn num_blocks(&self) -> u64 {
        self.storage.len() as u64 / DISK_BLOCK_SIZE
    }

    async fn read_blocks(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.check_failing()?;
        let start = check_extent(&*self, offset, buf.len())? as usize;
        buf.copy_from_slice(&self.storage[start..start + buf.len()]);
        Ok(())
    }

    async fn write_blocks(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        self.check_failing()?;
        let start = check_extent(&*self, offset, buf.len())? as usize;
        self.storage[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

/// Device backed by a regular file.
#[derive(Debug)]
pub struct FileDevice {
    file: File,
    num_blocks: u64,
}

impl FileDevice {
    /// Open or create `path` and size it to `num_blocks` blocks.
    pub async fn open(path: impl AsRef<Path>, num_blocks: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await?;
        file.set_len(num_blocks * DISK_BLOCK_SIZE).await?;
        debug!("opened file device {} with {} blocks", path.display(), num_blocks);
        Ok(Self { file, num_blocks })
    }
}

#[async_trait]
impl BlockDevice for FileDevice {
    fn block_size(&self) -> u64 {
        DISK_BLOCK_SIZE
    }

    fn num_blocks(&self) -> u64 {
        self.num_blocks
    }

    async fn read_blocks(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = check_extent(&*self, offset, buf.len())?;
        self.file.seek(SeekFrom::Start(start)).await?;
        self.file.read_exact(buf).await?;
        Ok(())
    }

    async fn write_blocks(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        let start = check_extent(&*self, offset, buf.len())?;
        self.file.seek(SeekFrom::Start(start)).await?;
        self.file.write_all(buf).await?;
        self.file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_device_extent_checks() {
        let mut dev = MemoryDevice::new(4);
        let block = vec![0xEE; DISK_BLOCK_SIZE as usize];
        dev.write_blocks(3, &block).await.unwrap();
        assert!(dev.write_blocks(4, &block).await.is_err());
        assert!(dev.write_blocks(0, &block[..100]).await.is_err());

        let mut out = vec![0; DISK_BLOCK_SIZE as usize];
        dev.read_blocks(3, &mut out).await.unwrap();
        assert_eq!(out, block);
    }

    #[tokio::test]
    async fn test_memory_device_failure_switch() {
        let mut dev = MemoryDevice::new(1);
        dev.failure_switch().store(true, Ordering::Relaxed);
        let mut out = vec![0; DISK_BLOCK_SIZE as usize];
        assert!(matches!(dev.read_blocks(0, &mut out).await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_file_device_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cs.img");
        let mut dev = FileDevice::open(&path, 8).await.unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8 * DISK_BLOCK_SIZE);

        let data: Vec<u8> = (0..1024).map(|i| i as u8).collect();
        dev.write_blocks(2, &data).await.unwrap();
        let mut out = vec![0; 1024];
        dev.read_blocks(2, &mut out).await.unwrap();
        assert_eq!(out, data);
    }
}
