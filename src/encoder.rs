//! # 编码模块
//!
//! 驱动容量规划，为每张选中的图像构造头部，把头部位与该图像分到的
//! 载荷片段拼接后写入像素通道的副本，再保存为新的图像文件。

use crate::bits::{BitCursor, StreamBytes};
use crate::carrier::CarrierImage;
use crate::constants::HEADER_BITS;
use crate::error::{Result, StegoError};
use crate::header::{CarrierHeader, CollectionId};
use crate::planner::{self, Allocation};
use crate::steganography::embed;
use image::{ImageFormat, RgbaImage};
use std::collections::HashSet;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// 一张成功写出的载体图像。
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub source: PathBuf,
    pub output: PathBuf,
    pub header: CarrierHeader,
}

#[derive(Debug, Default)]
pub struct EncodeReport {
    pub written: Vec<EncodedImage>,
    /// 每一项都是 [`StegoError::ImageProcess`]。
    pub failures: Vec<StegoError>,
}

impl EncodeReport {
    pub fn selected(&self) -> usize {
        self.written.len() + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Encoder {
    collection_id: CollectionId,
    output_dir: PathBuf,
    format: ImageFormat,
    compressed: bool,
    overwrite: bool,
}

impl Encoder {
    pub fn new(collection_id: CollectionId, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            collection_id,
            output_dir: output_dir.into(),
            format: ImageFormat::Png,
            compressed: false,
            overwrite: false,
        }
    }

    /// 输出图像格式，必须是无损格式。
    pub fn format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// 载荷是否已被压缩，写入每个头部的标志位 0。
    pub fn compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// 把长度为 `payload_len` 的载荷分散写入 `carriers` 中选出的图像。
    ///
    /// 单张图像的处理失败记录在 [`EncodeReport::failures`] 中，其余图像继续处理。
    ///
    /// # Errors
    ///
    /// * 容量规划失败 ([`StegoError::InsufficientCapacity`] 等)。
    /// * 未允许覆盖时目标文件已存在 ([`StegoError::OutputExists`])，此时不会写出任何文件。
    /// * 读取载荷流失败或载荷比声明的短，整个过程中止。
    pub fn encode<R: Read>(
        &self,
        mut payload: R,
        payload_len: u64,
        carriers: &[CarrierImage],
    ) -> Result<EncodeReport> {
        let capacities: Vec<u64> = carriers.iter().map(CarrierImage::capacity_bytes).collect();
        let allocations = planner::plan(payload_len, &capacities)?;
        log::debug!(
            "Selected {} of {} images for {} bytes",
            allocations.len(),
            carriers.len(),
            payload_len
        );

        let selected: Vec<&CarrierImage> = allocations
            .iter()
            .map(|allocation| &carriers[allocation.pool_index])
            .collect();
        let outputs = self.output_paths(&selected);

        if !self.overwrite {
            if let Some(existing) = outputs.iter().find(|path| path.exists()) {
                return Err(StegoError::OutputExists(existing.clone()));
            }
        }

        let total_images = u32::try_from(allocations.len()).unwrap_or(u32::MAX);
        let mut report = EncodeReport::default();

        for (index, ((allocation, carrier), output)) in
            allocations.iter().zip(selected).zip(outputs).enumerate()
        {
            let header = self.header_for(index, total_images, allocation);
            let mut slice = BitCursor::from_reader(&mut payload, allocation.stored_length);
            let result = self.write_carrier(carrier, &header, &mut slice, &output);

            // 失败的图像没有消费它那一段载荷，跳过它，后续图像才能对齐
            slice.by_ref().for_each(drop);
            if let Some(err) = slice.take_error() {
                return Err(StegoError::Io(err));
            }

            match result {
                Ok(()) => {
                    log::debug!(
                        "Wrote image {} ({} bytes, index {}) to {}",
                        carrier.path().display(),
                        header.stored_length,
                        header.image_index,
                        output.display()
                    );
                    report.written.push(EncodedImage {
                        source: carrier.path().to_path_buf(),
                        output,
                        header,
                    });
                }
                Err(err @ StegoError::TruncatedPayload { .. }) => return Err(err),
                Err(err) => report.failures.push(StegoError::ImageProcess {
                    path: carrier.path().to_path_buf(),
                    source: Box::new(err),
                }),
            }
        }

        Ok(report)
    }

    fn header_for(&self, index: usize, total_images: u32, allocation: &Allocation) -> CarrierHeader {
        CarrierHeader::new(
            self.collection_id,
            u32::try_from(index).unwrap_or(u32::MAX),
            total_images,
            // 容量已被限制在 u32 范围内
            u32::try_from(allocation.stored_length).unwrap_or(u32::MAX),
            self.compressed,
        )
    }

    fn write_carrier<R: Read>(
        &self,
        carrier: &CarrierImage,
        header: &CarrierHeader,
        payload: &mut BitCursor<StreamBytes<R>>,
        output: &Path,
    ) -> Result<()> {
        let mut pixels = carrier.load_pixels()?;
        let expected = HEADER_BITS as u64 + 8 * u64::from(header.stored_length);

        let mut bits = header.encode().chain(payload.by_ref());
        let embedded = embed(&mut pixels, carrier.config(), &mut bits);
        if embedded != expected {
            return Err(StegoError::TruncatedPayload { expected, embedded });
        }

        self.save(&pixels, output)
    }

    /// 先写入同目录下的临时文件，成功后再改名，失败时不留下残缺文件。
    fn save(&self, pixels: &RgbaImage, output: &Path) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix(".lsb_shard")
            .suffix(".partial")
            .tempfile_in(&self.output_dir)?;

        {
            let mut writer = BufWriter::new(&mut file);
            pixels.write_to(&mut writer, self.format)?;
            writer.flush()?;
        }

        if self.overwrite {
            file.persist(output).map_err(|err| err.error)?;
        } else {
            file.persist_noclobber(output).map_err(|err| err.error)?;
        }
        Ok(())
    }

    fn output_paths(&self, selected: &[&CarrierImage]) -> Vec<PathBuf> {
        let extension = self.format.extensions_str().first().copied().unwrap_or("png");
        unique_names(selected.iter().map(|carrier| carrier.base_name()))
            .into_iter()
            .map(|name| self.output_dir.join(format!("{name}.{extension}")))
            .collect()
    }
}

/// 为同名图像追加 `_1`、`_2`… 后缀，直到名称唯一。
fn unique_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut taken = HashSet::new();
    names
        .into_iter()
        .map(|base| {
            let mut name = base.clone();
            let mut suffix = 1;
            while !taken.insert(name.clone()) {
                name = format!("{base}_{suffix}");
                suffix += 1;
            }
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_get_numeric_suffixes() {
        let names = ["cat", "dog", "cat", "cat", "cat_1"].map(String::from);
        assert_eq!(
            unique_names(names),
            vec!["cat", "dog", "cat_1", "cat_2", "cat_1_1"]
        );
    }
}
