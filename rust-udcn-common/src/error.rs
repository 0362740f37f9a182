//! Error types for the μDCN implementation.

use thiserror::Error;

/// All possible errors that can occur within the μDCN implementation.
#[derive(Error, Debug)]
pub enum Error {
    /// Error related to TLV encoding/decoding.
    #[error("TLV error: {0}")]
    Tlv(String),

    /// Error related to NDN packet processing.
    #[error("NDN packet error: {0}")]
    NdnPacket(String),

    /// The composite table cannot hold another entry.
    #[error("PCCT is full ({0} entries)")]
    TableFull(usize),

    /// No extension block could be allocated for slot 2 or 3.
    #[error("PCC extension blocks exhausted ({0} in use)")]
    ExtensionExhausted(usize),

    /// Error related to the disk-backed Data store.
    #[error("disk store error: {0}")]
    DiskStore(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Other error: {0}")]
    Other(String),
}
