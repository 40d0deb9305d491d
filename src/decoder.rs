//! # 解码与重组模块
//!
//! 1. 发现：读取每张候选图像的头部，丢弃指纹不符或无法读取的图像。
//! 2. 分组：按集合 ID 划分，可选只保留指定的集合。
//! 3. 排序：组内按图像序号升序排列。
//! 4. 重组：依次跳过每张图像的头部，读出其存储的载荷并顺序写出。

use crate::carrier::CarrierImage;
use crate::error::{Result, StegoError};
use crate::header::{CarrierHeader, CollectionId};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;

/// 发现阶段的结果。
#[derive(Debug, Default)]
pub struct Discovery {
    /// 头部已读取并缓存的载体。
    pub carriers: Vec<CarrierImage>,
    pub rejected: Vec<(PathBuf, StegoError)>,
}

pub fn discover(candidates: impl IntoIterator<Item = CarrierImage>) -> Discovery {
    let mut discovery = Discovery::default();
    for mut carrier in candidates {
        match carrier.read_header() {
            Ok(header) => {
                log::debug!(
                    "Found image {} of collection {} in {}",
                    header.image_index,
                    header.collection_id,
                    carrier.path().display()
                );
                discovery.carriers.push(carrier);
            }
            Err(err) => {
                log::debug!("Skipping {}: {err}", carrier.path().display());
                discovery.rejected.push((carrier.path().to_path_buf(), err));
            }
        }
    }
    discovery
}

/// 把已发现的载体按集合分组，组内按图像序号排序。
/// 没有缓存头部的载体会被忽略。
///
/// # Errors
///
/// 指定的 `target` 不存在时返回 [`StegoError::CollectionNotFound`]。
pub fn regroup(
    carriers: Vec<CarrierImage>,
    target: Option<CollectionId>,
) -> Result<Vec<Collection>> {
    let mut groups: BTreeMap<CollectionId, Vec<CarrierImage>> = BTreeMap::new();
    for carrier in carriers {
        if let Some(header) = carrier.header() {
            groups.entry(header.collection_id).or_default().push(carrier);
        }
    }

    if let Some(target) = target {
        let images = groups
            .remove(&target)
            .ok_or(StegoError::CollectionNotFound(target))?;
        groups = BTreeMap::from([(target, images)]);
    }

    Ok(groups
        .into_iter()
        .map(|(id, mut images)| {
            images.sort_by_key(|carrier| carrier.header().map(|header| header.image_index));
            Collection { id, images }
        })
        .collect())
}

/// 组内序号的异常。重组照常按排序后的顺序进行，这些异常只用于提示。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceIssue {
    Duplicate(u32),
    /// 缺失的序号区间，两端都包含在内。
    Missing { from: u32, to: u32 },
    CountMismatch { declared: u32, found: usize },
}

impl fmt::Display for SequenceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate(index) => write!(f, "image index {index} appears more than once"),
            Self::Missing { from, to } if from == to => write!(f, "image index {from} is missing"),
            Self::Missing { from, to } => write!(f, "image indices {from} to {to} are missing"),
            Self::CountMismatch { declared, found } => write!(
                f,
                "collection declares {declared} images but {found} were found"
            ),
        }
    }
}

#[derive(Debug)]
pub struct Collection {
    id: CollectionId,
    images: Vec<CarrierImage>,
}

impl Collection {
    pub fn id(&self) -> CollectionId {
        self.id
    }

    /// 按图像序号排好序的载体。
    pub fn images(&self) -> &[CarrierImage] {
        &self.images
    }

    pub fn payload_len(&self) -> u64 {
        self.headers()
            .map(|header| u64::from(header.stored_length))
            .sum()
    }

    pub fn is_compressed(&self) -> bool {
        self.headers().any(|header| header.is_compressed())
    }

    pub fn sequence_issues(&self) -> Vec<SequenceIssue> {
        let mut issues = Vec::new();
        // 下一个期望的序号，可能越过 u32::MAX
        let mut expected = 0u64;
        let mut previous = None;

        for header in self.headers() {
            let index = header.image_index;
            if previous == Some(index) {
                issues.push(SequenceIssue::Duplicate(index));
                continue;
            }
            issues.extend(missing_range(expected, index));
            expected = u64::from(index) + 1;
            previous = Some(index);
        }

        if let Some(declared) = self.headers().map(|header| header.total_images).max() {
            issues.extend(missing_range(expected, declared));
            if declared as usize != self.images.len() {
                issues.push(SequenceIssue::CountMismatch {
                    declared,
                    found: self.images.len(),
                });
            }
        }

        issues
    }

    /// 按序号顺序把每张图像的载荷写入 `writer`，返回写出的总字节数。
    pub fn reassemble<W>(&mut self, writer: &mut W) -> Result<u64>
    where
        W: Write + ?Sized,
    {
        let mut total = 0;
        for image in &mut self.images {
            total += image.read_payload(writer)?;
        }
        writer.flush()?;
        Ok(total)
    }

    fn headers(&self) -> impl Iterator<Item = &CarrierHeader> + '_ {
        self.images.iter().filter_map(CarrierImage::header)
    }
}

/// `expected..end` 非空时返回对应的缺失区间。
fn missing_range(expected: u64, end: u32) -> Option<SequenceIssue> {
    let from = u32::try_from(expected).ok()?;
    (from < end).then(|| SequenceIssue::Missing { from, to: end - 1 })
}
