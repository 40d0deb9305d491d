//! # 通道布局配置
//!
//! [`LsbConfig`] 是所有位布局计算共享的唯一参数：每通道使用的位数，
//! 以及是否把 alpha 通道算作载体通道。编码与解码必须使用同一份配置。

use crate::constants::DEFAULT_BITS_PER_CHANNEL;
use crate::error::{Result, StegoError};

/// RGBA 像素中各通道的下标。
const RED: usize = 0;
const GREEN: usize = 1;
const BLUE: usize = 2;
const ALPHA: usize = 3;

const ORDER_RGB: [usize; 3] = [RED, GREEN, BLUE];
const ORDER_ARGB: [usize; 4] = [ALPHA, RED, GREEN, BLUE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LsbConfig {
    bits_per_channel: u8,
    alpha: bool,
}

impl LsbConfig {
    /// # Errors
    ///
    /// `bits_per_channel` 不在 1..=8 范围内时返回 [`StegoError::InvalidBitsPerChannel`]。
    pub fn new(bits_per_channel: u8, alpha: bool) -> Result<Self> {
        if !(1..=8).contains(&bits_per_channel) {
            return Err(StegoError::InvalidBitsPerChannel(bits_per_channel));
        }
        Ok(Self {
            bits_per_channel,
            alpha,
        })
    }

    pub fn bits_per_channel(&self) -> u8 {
        self.bits_per_channel
    }

    pub fn alpha(&self) -> bool {
        self.alpha
    }

    pub fn channel_count(&self) -> u8 {
        self.channel_order().len() as u8
    }

    /// 单个像素内通道的读写顺序 (RGBA 缓冲区中的下标)。
    /// 启用 alpha 时为 A,R,G,B，否则为 R,G,B。
    pub fn channel_order(&self) -> &'static [usize] {
        if self.alpha { &ORDER_ARGB } else { &ORDER_RGB }
    }

    /// 给定尺寸的图像能容纳的总位数 (包含头部)。
    pub fn capacity_bits(&self, width: u32, height: u32) -> u64 {
        u64::from(width)
            * u64::from(height)
            * u64::from(self.channel_count())
            * u64::from(self.bits_per_channel)
    }
}

impl Default for LsbConfig {
    fn default() -> Self {
        Self {
            bits_per_channel: DEFAULT_BITS_PER_CHANNEL,
            alpha: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_bits() {
        assert!(matches!(
            LsbConfig::new(0, false),
            Err(StegoError::InvalidBitsPerChannel(0))
        ));
        assert!(LsbConfig::new(9, true).is_err());
        assert!(LsbConfig::new(8, true).is_ok());
    }

    #[test]
    fn alpha_adds_a_leading_channel() {
        let rgb = LsbConfig::new(2, false).unwrap();
        let argb = LsbConfig::new(2, true).unwrap();
        assert_eq!(rgb.channel_order(), &[0, 1, 2]);
        assert_eq!(argb.channel_order(), &[3, 0, 1, 2]);
        assert_eq!(rgb.capacity_bits(10, 10), 600);
        assert_eq!(argb.capacity_bits(10, 10), 800);
    }
}
