//! # 位游标模块
//!
//! 把字节缓冲区、字节流或图像像素通道转换为只能向前读取的单个位序列，
//! 以及把位序列重新拼回字节。
//!
//! 每个来源都被看作一串固定宽度的"符号"：字节的宽度为 8，
//! 像素通道的宽度为每通道使用的位数。游标按 MSB 优先的顺序逐位产出
//! 每个符号的低 `width` 位。两个游标的拼接直接使用 [`Iterator::chain`]。

use crate::config::LsbConfig;
use image::RgbaImage;
use std::io::{self, Read, Write};
use std::slice::ChunksExact;

/// `copy_bytes` 每次从游标取出的字节数。
const COPY_CHUNK: usize = 64 * 1024;

/// 把符号序列展开为位序列的游标。每个实例独立持有自己的读取位置。
#[derive(Debug, Clone)]
pub struct BitCursor<S> {
    symbols: S,
    width: u8,
    current: u8,
    pending: u8,
}

impl<S> BitCursor<S>
where
    S: Iterator<Item = u8>,
{
    /// 以每个符号 `width` 位 (1..=8) 创建游标。
    pub fn new(symbols: S, width: u8) -> Self {
        assert!(
            (1..=8).contains(&width),
            "symbol width must be within 1..=8, got {width}"
        );
        Self {
            symbols,
            width,
            current: 0,
            pending: 0,
        }
    }
}

impl<'a> BitCursor<std::iter::Copied<std::slice::Iter<'a, u8>>> {
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self::new(bytes.iter().copied(), 8)
    }
}

impl<R: Read> BitCursor<StreamBytes<R>> {
    /// 最多从 `reader` 读取 `max_len` 个字节。
    pub fn from_reader(reader: R, max_len: u64) -> Self {
        Self::new(StreamBytes::new(reader, max_len), 8)
    }

    /// 取出底层读取过程中遇到的 I/O 错误 (如果有)。
    /// 出错后游标会提前结束，调用方必须在消费完之后检查这里。
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.symbols.error.take()
    }
}

impl<'a> BitCursor<ChannelSymbols<'a>> {
    /// 按光栅顺序读取像素通道的低 `bits_per_channel` 位。
    pub fn from_channels(pixels: &'a RgbaImage, config: LsbConfig) -> Self {
        Self::new(
            ChannelSymbols::new(pixels, config.channel_order()),
            config.bits_per_channel(),
        )
    }
}

impl<S> Iterator for BitCursor<S>
where
    S: Iterator<Item = u8>,
{
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.pending == 0 {
            self.current = self.symbols.next()?;
            self.pending = self.width;
        }
        self.pending -= 1;
        Some((self.current >> self.pending) & 1)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.symbols.size_hint();
        let width = usize::from(self.width);
        let pending = usize::from(self.pending);
        (
            lower.saturating_mul(width).saturating_add(pending),
            upper
                .and_then(|n| n.checked_mul(width))
                .and_then(|n| n.checked_add(pending)),
        )
    }
}

/// 从 [`Read`] 中逐字节读取，最多 `max_len` 个字节。
/// 遇到 I/O 错误时记录下来并结束迭代。
#[derive(Debug)]
pub struct StreamBytes<R> {
    bytes: io::Bytes<io::Take<R>>,
    error: Option<io::Error>,
}

impl<R: Read> StreamBytes<R> {
    pub fn new(reader: R, max_len: u64) -> Self {
        Self {
            bytes: reader.take(max_len).bytes(),
            error: None,
        }
    }
}

impl<R: Read> Iterator for StreamBytes<R> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.error.is_some() {
            return None;
        }
        match self.bytes.next()? {
            Ok(byte) => Some(byte),
            Err(err) => {
                self.error = Some(err);
                None
            }
        }
    }
}

/// 按光栅顺序、固定通道顺序产出 RGBA 缓冲区中的通道值。
#[derive(Debug, Clone)]
pub struct ChannelSymbols<'a> {
    pixels: ChunksExact<'a, u8>,
    order: &'static [usize],
    current: Option<&'a [u8]>,
    channel: usize,
}

impl<'a> ChannelSymbols<'a> {
    pub fn new(pixels: &'a RgbaImage, order: &'static [usize]) -> Self {
        Self {
            pixels: pixels.as_raw().chunks_exact(4),
            order,
            current: None,
            channel: 0,
        }
    }
}

impl Iterator for ChannelSymbols<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        loop {
            if let Some(pixel) = self.current {
                if let Some(&index) = self.order.get(self.channel) {
                    self.channel += 1;
                    return Some(pixel[index]);
                }
            }
            self.current = Some(self.pixels.next()?);
            self.channel = 0;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let in_pixel = match self.current {
            Some(_) => self.order.len() - self.channel,
            None => 0,
        };
        let n = self.pixels.len() * self.order.len() + in_pixel;
        (n, Some(n))
    }
}

/// 位序列上的读取操作。
///
/// 读取超过游标剩余长度是调用方的编程错误，会直接 panic，
/// 游标从不以填充位冒充数据。
pub trait BitRead: Iterator<Item = u8> {
    /// 精确取出 `n` 个字节 (8n 位)，每个字节 MSB 优先。
    fn take_bytes(&mut self, n: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(n);
        for taken in 0..n {
            let mut byte = 0u8;
            for _ in 0..8 {
                let Some(bit) = self.next() else {
                    panic!("bit cursor exhausted after {taken} of {n} requested bytes");
                };
                byte = (byte << 1) | (bit & 1);
            }
            out.push(byte);
        }
        out
    }

    /// 跳过 `n` 位而不组装它们。
    fn skip_bits(&mut self, n: usize) {
        if n > 0 {
            assert!(
                self.nth(n - 1).is_some(),
                "bit cursor exhausted while skipping {n} bits"
            );
        }
    }

    /// 把 `len` 个字节分块写入 `writer`，返回写入的字节数。
    fn copy_bytes<W>(&mut self, len: u64, writer: &mut W) -> io::Result<u64>
    where
        W: Write + ?Sized,
    {
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(COPY_CHUNK as u64) as usize;
            writer.write_all(&self.take_bytes(chunk))?;
            remaining -= chunk as u64;
        }
        Ok(len)
    }
}

impl<I> BitRead for I where I: Iterator<Item = u8> + ?Sized {}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::io::Cursor;

    #[test]
    fn bytes_are_read_msb_first() {
        let bits: Vec<u8> = BitCursor::from_bytes(&[0b1010_0001]).collect();
        assert_eq!(bits, vec![1, 0, 1, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn chained_cursors_neither_skip_nor_repeat() {
        let head = [0xAB, 0xCD];
        let tail = [0x01, 0x02, 0x03];
        let mut bits = BitCursor::from_bytes(&head).chain(BitCursor::from_bytes(&tail));
        assert_eq!(bits.size_hint(), (40, Some(40)));
        assert_eq!(bits.take_bytes(5), vec![0xAB, 0xCD, 0x01, 0x02, 0x03]);
        assert_eq!(bits.next(), None);
    }

    #[test]
    fn reader_cursor_stops_at_max_len() {
        let data = Cursor::new(vec![0xFF, 0x00, 0x7E]);
        let mut cursor = BitCursor::from_reader(data, 2);
        assert_eq!(cursor.take_bytes(2), vec![0xFF, 0x00]);
        assert_eq!(cursor.next(), None);
        assert!(cursor.take_error().is_none());
    }

    #[test]
    fn channel_cursor_yields_low_bits_in_channel_order() {
        let mut pixels = RgbaImage::new(2, 1);
        pixels.put_pixel(0, 0, Rgba([0b101, 0b010, 0b111, 0b001]));
        pixels.put_pixel(1, 0, Rgba([0b000, 0b110, 0b011, 0b100]));

        let config = LsbConfig::new(3, false).unwrap();
        let bits: Vec<u8> = BitCursor::from_channels(&pixels, config).collect();
        assert_eq!(
            bits,
            vec![1, 0, 1, 0, 1, 0, 1, 1, 1, 0, 0, 0, 1, 1, 0, 0, 1, 1]
        );

        let config = LsbConfig::new(1, true).unwrap();
        let bits: Vec<u8> = BitCursor::from_channels(&pixels, config).collect();
        assert_eq!(bits, vec![1, 1, 0, 1, 0, 0, 0, 1]);
    }

    #[test]
    fn skip_then_take() {
        let mut bits = BitCursor::from_bytes(&[0x00, 0xF0, 0x0F]);
        bits.skip_bits(8);
        assert_eq!(bits.take_bytes(2), vec![0xF0, 0x0F]);
    }

    #[test]
    #[should_panic(expected = "bit cursor exhausted")]
    fn over_read_is_a_contract_violation() {
        let mut bits = BitCursor::from_bytes(&[0x01]);
        bits.take_bytes(2);
    }

    #[test]
    fn copy_bytes_writes_everything() {
        let data: Vec<u8> = (0..=255).cycle().take(COPY_CHUNK + 17).collect();
        let mut out = Vec::new();
        let copied = BitCursor::from_bytes(&data)
            .copy_bytes(data.len() as u64, &mut out)
            .unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(out, data);
    }
}
