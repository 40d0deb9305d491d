//! # lsb_shard 库
//!
//! 本库包含多图像 LSB 隐写工具的核心逻辑：位游标、载体头部、容量规划，
//! 以及把载荷分散写入一组图像、再从图像中重组载荷的编解码流程。

// 声明库包含的所有模块。

pub mod archive;
pub mod bits;
pub mod carrier;
pub mod cli;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod discovery;
pub mod encoder;
pub mod error;
pub mod handler;
pub mod header;
pub mod logging;
pub mod planner;
pub mod steganography;

pub use carrier::CarrierImage;
pub use config::LsbConfig;
pub use encoder::Encoder;
pub use error::{ArchiveError, StegoError};
pub use header::{CarrierHeader, CollectionId};
