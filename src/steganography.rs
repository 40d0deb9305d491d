//! # 通道写入
//!
//! 读取方向由 [`BitCursor::from_channels`](crate::bits::BitCursor::from_channels) 完成，
//! 本模块负责相反的方向：把位序列写进像素通道的低位。

use crate::config::LsbConfig;
use image::RgbaImage;

/// 按光栅顺序把 `bits` 写入每个像素的低 `bits_per_channel` 位，
/// 通道顺序与读取路径一致，每个通道内 MSB 优先。
///
/// 位序列耗尽时立即停止，之后的通道 (包括未写满的那个通道中剩余的低位)
/// 保持原样。返回实际写入的位数。
pub fn embed<I>(pixels: &mut RgbaImage, config: LsbConfig, bits: &mut I) -> u64
where
    I: Iterator<Item = u8>,
{
    let order = config.channel_order();
    let width = config.bits_per_channel();
    let mut written = 0u64;

    for pixel in pixels.pixels_mut() {
        for &channel in order {
            let value = &mut pixel.0[channel];
            for offset in (0..width).rev() {
                let Some(bit) = bits.next() else {
                    return written;
                };
                *value = (*value & !(1u8 << offset)) | ((bit & 1) << offset);
                written += 1;
            }
        }
    }

    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::{BitCursor, BitRead};
    use image::Rgba;

    #[test]
    fn embedded_bits_read_back() {
        let mut pixels = RgbaImage::from_pixel(4, 4, Rgba([0xAA, 0x55, 0xC3, 0x3C]));
        let config = LsbConfig::new(3, true).unwrap();
        let data = [0xDE, 0xAD, 0xBE, 0xEF];

        let written = embed(&mut pixels, config, &mut BitCursor::from_bytes(&data));
        assert_eq!(written, 32);

        let mut read = BitCursor::from_channels(&pixels, config);
        assert_eq!(read.take_bytes(4), data);
    }

    #[test]
    fn only_low_bits_change() {
        let mut pixels = RgbaImage::from_pixel(2, 2, Rgba([0xFF; 4]));
        let config = LsbConfig::new(2, false).unwrap();
        embed(&mut pixels, config, &mut BitCursor::from_bytes(&[0x00, 0x00, 0x00]));

        for pixel in pixels.pixels() {
            assert_eq!(pixel.0, [0xFC, 0xFC, 0xFC, 0xFF]);
        }
    }

    #[test]
    fn untouched_region_is_identical() {
        let source = RgbaImage::from_fn(8, 8, |x, y| Rgba([x as u8, y as u8, (x * y) as u8, 200]));
        let mut pixels = source.clone();
        let config = LsbConfig::new(8, false).unwrap();

        // 8 位 / 通道时 2 个字节恰好填满前两个通道
        let written = embed(&mut pixels, config, &mut BitCursor::from_bytes(&[0x11, 0x22]));
        assert_eq!(written, 16);
        assert_eq!(pixels.get_pixel(0, 0).0, [0x11, 0x22, 0, 200]);
        assert_eq!(&pixels.as_raw()[4..], &source.as_raw()[4..]);
    }

    #[test]
    fn partial_channel_keeps_remaining_low_bits() {
        let mut pixels = RgbaImage::from_pixel(1, 1, Rgba([0b0000_0111, 0, 0, 0]));
        let config = LsbConfig::new(3, false).unwrap();
        let mut bits = [0u8].into_iter();

        let written = embed(&mut pixels, config, &mut bits);
        assert_eq!(written, 1);
        assert_eq!(pixels.get_pixel(0, 0).0[0], 0b0000_0011);
    }
}
