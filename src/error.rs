//! # 错误类型模块
//!
//! [`StegoError`] 覆盖从图像扫描、容量规划到写出与提取的全部失败情形，
//! [`ArchiveError`] 覆盖载荷打包与解包。

use crate::constants::exit_code;
use crate::header::CollectionId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StegoError>;

#[derive(Debug, Error)]
pub enum StegoError {
    #[error("bits per channel must be within 1..=8, got {0}")]
    InvalidBitsPerChannel(u8),

    #[error(
        "image is too small to carry a header: {} ({capacity_bits} bits available)",
        .path.display()
    )]
    ImageTooSmall { path: PathBuf, capacity_bits: u64 },

    #[error(
        "image signature mismatch (fingerprint {found:#018x}), the image was probably not created by this tool"
    )]
    InvalidSignature { found: i64 },

    #[error("carrier header declares {stored_length} bytes but the image holds at most {capacity} bytes")]
    CorruptHeader { stored_length: u32, capacity: u64 },

    #[error(
        "images capacity is less than data size: required {required} bytes, available {available} bytes, {shortfall} more bytes needed"
    )]
    InsufficientCapacity {
        required: u64,
        available: u64,
        shortfall: u64,
    },

    #[error("no supported images were found in the given paths")]
    NoImagesFound,

    #[error("collection {0} was not found")]
    CollectionNotFound(CollectionId),

    #[error("no hidden collections were found in the given images")]
    NoCollectionsFound,

    #[error("payload stream ended early: expected {expected} bits, embedded {embedded}")]
    TruncatedPayload { expected: u64, embedded: u64 },

    #[error("Output file already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("output directory can't be created or is write-protected: {}", .path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to process image {}", .path.display())]
    ImageProcess {
        path: PathBuf,
        #[source]
        source: Box<StegoError>,
    },

    #[error("{failed} of {total} images could not be processed")]
    ImagesFailed { failed: usize, total: usize },

    #[error("{failed} of {total} collections failed to extract")]
    ExtractionFailed { failed: usize, total: usize },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StegoError {
    /// 该错误终止运行时对应的进程退出码。
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InsufficientCapacity { .. } => exit_code::INSUFFICIENT_CAPACITY,
            Self::ImageProcess { .. } | Self::ImagesFailed { .. } | Self::TruncatedPayload { .. } => {
                exit_code::IMAGE_PROCESS_FAIL
            }
            Self::NoImagesFound => exit_code::NO_IMAGE_FOUND,
            Self::CollectionNotFound(_)
            | Self::NoCollectionsFound
            | Self::ExtractionFailed { .. } => exit_code::COLLECTION_EXTRACT_FAIL,
            Self::OutputDirectory { .. } | Self::OutputExists(_) => exit_code::OUTPUT_DIR_FAIL,
            Self::Archive(_) => exit_code::PAYLOAD_FAIL,
            _ => exit_code::UNKNOWN,
        }
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("no files were found in the given data paths")]
    Empty,

    #[error("refusing to unpack unsafe path: {0}")]
    UnsafePath(String),

    #[error("path is too long to be archived: {}", .0.display())]
    PathTooLong(PathBuf),

    #[error("archive entry {0} is truncated")]
    Truncated(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
