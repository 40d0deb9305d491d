//! # 载体图像模块
//!
//! [`CarrierImage`] 描述一张候选载体图像：尺寸、容量与头部。
//! 构造时只读取图像尺寸；像素缓冲区在每次需要时重新解码，
//! 并在离开作用域时立即释放。

use crate::bits::{BitCursor, BitRead};
use crate::config::LsbConfig;
use crate::constants::HEADER_SIZE;
use crate::error::{Result, StegoError};
use crate::header::CarrierHeader;
use image::{ImageReader, RgbaImage};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CarrierImage {
    path: PathBuf,
    width: u32,
    height: u32,
    config: LsbConfig,
    capacity: u64,
    header: Option<CarrierHeader>,
}

impl CarrierImage {
    /// 读取图像尺寸并计算容量，不解码像素。
    ///
    /// # Errors
    ///
    /// * 无法打开或识别图像文件。
    /// * 图像容量不足以容纳头部 ([`StegoError::ImageTooSmall`])。
    pub fn open(path: impl Into<PathBuf>, config: LsbConfig) -> Result<Self> {
        let path = path.into();
        let (width, height) = ImageReader::open(&path)?
            .with_guessed_format()?
            .into_dimensions()?;
        Self::from_dimensions(path, width, height, config)
    }

    pub fn from_dimensions(
        path: impl Into<PathBuf>,
        width: u32,
        height: u32,
        config: LsbConfig,
    ) -> Result<Self> {
        let path = path.into();
        let capacity_bits = config.capacity_bits(width, height);
        let capacity = (capacity_bits / 8).saturating_sub(HEADER_SIZE as u64);
        if capacity == 0 {
            return Err(StegoError::ImageTooSmall {
                path,
                capacity_bits,
            });
        }

        Ok(Self {
            path,
            width,
            height,
            config,
            // 头部的存储长度字段只有 32 位
            capacity: capacity.min(u64::from(u32::MAX)),
            header: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 不带扩展名的文件名，用于生成输出文件名。
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_owned())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn config(&self) -> LsbConfig {
        self.config
    }

    /// 扣除头部后可存放的载荷字节数。
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity
    }

    /// 已读取并缓存的头部。
    pub fn header(&self) -> Option<&CarrierHeader> {
        self.header.as_ref()
    }

    /// 解码出一份新的 RGBA 像素缓冲区，原文件不受影响。
    pub fn load_pixels(&self) -> Result<RgbaImage> {
        let pixels = image::open(&self.path)?.into_rgba8();
        if pixels.dimensions() != (self.width, self.height) {
            return Err(StegoError::Io(std::io::Error::other(format!(
                "image dimensions changed since it was scanned: {}",
                self.path.display()
            ))));
        }
        Ok(pixels)
    }

    /// 读取头部，第一次成功后缓存结果。
    ///
    /// # Errors
    ///
    /// * 图像解码失败。
    /// * 指纹不匹配 ([`StegoError::InvalidSignature`])。
    /// * 存储长度超出本图像容量 ([`StegoError::CorruptHeader`])。
    pub fn read_header(&mut self) -> Result<CarrierHeader> {
        if let Some(header) = self.header {
            return Ok(header);
        }

        let pixels = self.load_pixels()?;
        let header = CarrierHeader::decode(&mut BitCursor::from_channels(&pixels, self.config))?;
        if u64::from(header.stored_length) > self.capacity {
            return Err(StegoError::CorruptHeader {
                stored_length: header.stored_length,
                capacity: self.capacity,
            });
        }

        self.header = Some(header);
        Ok(header)
    }

    /// 把本图像承载的 `stored_length` 个载荷字节写入 `writer`。
    pub fn read_payload<W>(&mut self, writer: &mut W) -> Result<u64>
    where
        W: Write + ?Sized,
    {
        let header = self.read_header()?;
        let pixels = self.load_pixels()?;
        let mut bits = BitCursor::from_channels(&pixels, self.config);
        CarrierHeader::skip(&mut bits);
        Ok(bits.copy_bytes(u64::from(header.stored_length), writer)?)
    }

    #[cfg(test)]
    pub(crate) fn with_header(mut self, header: CarrierHeader) -> Self {
        self.header = Some(header);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_reserves_the_header() {
        let config = LsbConfig::new(1, true).unwrap();
        let carrier = CarrierImage::from_dimensions("a.png", 7, 10, config).unwrap();
        assert_eq!(carrier.capacity_bytes(), 10);
        assert_eq!(carrier.base_name(), "a");
    }

    #[test]
    fn header_sized_images_are_rejected() {
        let config = LsbConfig::new(1, true).unwrap();
        // 5 * 10 * 4 * 1 = 200 位，恰好只够头部
        let result = CarrierImage::from_dimensions("tiny.png", 5, 10, config);
        assert!(matches!(
            result,
            Err(StegoError::ImageTooSmall { capacity_bits: 200, .. })
        ));

        let config = LsbConfig::new(1, false).unwrap();
        assert!(CarrierImage::from_dimensions("tiny.png", 2, 2, config).is_err());
    }
}
