//! µDCN PIT-CS composite table.
//!
//! Facade over the workspace crates: [`common`] holds the NDN packet model
//! and shared types, [`pcct`] the composite table, content store and disk store.

pub use rust_udcn_common as common;
pub use rust_udcn_pcct as pcct;

pub use rust_udcn_common::{Error, Result};
pub use rust_udcn_pcct::{Pcct, PcctConfig};
