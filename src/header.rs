//! # 载体头部模块
//!
//! 每张载体图像的通道位序列都以一个 25 字节的头部开始，
//! 所有多字节字段均为大端序：
//!
//! | 偏移 | 字段 | 大小 |
//! |---|---|---|
//! | 0 | 指纹 | 8 |
//! | 8 | 集合 ID | 4 |
//! | 12 | 图像序号 | 4 |
//! | 16 | 图像总数 | 4 |
//! | 20 | 存储长度 | 4 |
//! | 24 | 标志 | 1 |

use crate::bits::{BitCursor, BitRead};
use crate::constants::{FINGERPRINT, FLAG_COMPRESSED, HEADER_BITS, HEADER_SIZE};
use crate::error::{Result, StegoError};
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// 把属于同一份载荷的图像归为一组的标识，对用户显示为 8 位十六进制。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionId(pub u32);

impl CollectionId {
    /// 随机生成一个非零的集合 ID。
    pub fn random() -> Self {
        let mut rng = rand::rng();
        loop {
            let value: u32 = rng.random();
            if value != 0 {
                return Self(value);
            }
        }
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl FromStr for CollectionId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let invalid = || {
            format!(
                "expected a hexadecimal collection id of at most 8 digits but got [{s}], \
                 allowed symbols are [0123456789ABCDEF]"
            )
        };
        // from_str_radix 还接受前导的 '+'
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        u32::from_str_radix(digits, 16).map(Self).map_err(|_| invalid())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarrierHeader {
    pub fingerprint: i64,
    pub collection_id: CollectionId,
    pub image_index: u32,
    pub total_images: u32,
    pub stored_length: u32,
    pub flags: u8,
}

impl CarrierHeader {
    pub fn new(
        collection_id: CollectionId,
        image_index: u32,
        total_images: u32,
        stored_length: u32,
        compressed: bool,
    ) -> Self {
        Self {
            fingerprint: FINGERPRINT,
            collection_id,
            image_index,
            total_images,
            stored_length,
            flags: if compressed { FLAG_COMPRESSED } else { 0 },
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..8].copy_from_slice(&self.fingerprint.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.collection_id.0.to_be_bytes());
        bytes[12..16].copy_from_slice(&self.image_index.to_be_bytes());
        bytes[16..20].copy_from_slice(&self.total_images.to_be_bytes());
        bytes[20..24].copy_from_slice(&self.stored_length.to_be_bytes());
        bytes[24] = self.flags;
        bytes
    }

    /// 按布局还原字段，不校验指纹。
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut fingerprint = [0u8; 8];
        fingerprint.copy_from_slice(&bytes[0..8]);
        Self {
            fingerprint: i64::from_be_bytes(fingerprint),
            collection_id: CollectionId(be_u32(bytes, 8)),
            image_index: be_u32(bytes, 12),
            total_images: be_u32(bytes, 16),
            stored_length: be_u32(bytes, 20),
            flags: bytes[24],
        }
    }

    /// 头部的 200 位。
    pub fn encode(&self) -> BitCursor<std::array::IntoIter<u8, HEADER_SIZE>> {
        BitCursor::new(self.to_bytes().into_iter(), 8)
    }

    /// 从游标中恰好消费 200 位并还原头部。
    ///
    /// # Errors
    ///
    /// 指纹与 [`FINGERPRINT`] 不一致时返回 [`StegoError::InvalidSignature`]。
    ///
    /// # Panics
    ///
    /// 游标不足 200 位时 panic，调用方需保证来源足够长。
    pub fn decode<I>(bits: &mut I) -> Result<Self>
    where
        I: Iterator<Item = u8> + ?Sized,
    {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes.copy_from_slice(&bits.take_bytes(HEADER_SIZE));
        let header = Self::from_bytes(&bytes);
        if header.fingerprint != FINGERPRINT {
            return Err(StegoError::InvalidSignature {
                found: header.fingerprint,
            });
        }
        Ok(header)
    }

    /// 跳过头部区域，使游标停在载荷的第一位。
    pub fn skip<I>(bits: &mut I)
    where
        I: Iterator<Item = u8> + ?Sized,
    {
        bits.skip_bits(HEADER_BITS);
    }
}

fn be_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CarrierHeader {
        CarrierHeader::new(CollectionId(0x1234_ABCD), 2, 5, 0x0102_0304, true)
    }

    #[test]
    fn layout_is_big_endian_in_field_order() {
        let bytes = sample().to_bytes();
        assert_eq!(&bytes[0..8], &[0xFF, 0xFF, 0xFF, 0x3F, 0x01, 0xF0, 0x3F, 0x21]);
        assert_eq!(&bytes[8..12], &[0x12, 0x34, 0xAB, 0xCD]);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 2]);
        assert_eq!(&bytes[16..20], &[0, 0, 0, 5]);
        assert_eq!(&bytes[20..24], &[1, 2, 3, 4]);
        assert_eq!(bytes[24], 1);
    }

    #[test]
    fn encode_decode_round_trip() {
        for header in [
            sample(),
            CarrierHeader::new(CollectionId(u32::MAX), u32::MAX, u32::MAX, u32::MAX, false),
            CarrierHeader::new(CollectionId(0), 0, 0, 0, false),
        ] {
            let mut bits = header.encode();
            assert_eq!(bits.size_hint(), (HEADER_BITS, Some(HEADER_BITS)));
            assert_eq!(CarrierHeader::decode(&mut bits).unwrap(), header);
            assert_eq!(bits.next(), None);
        }
    }

    #[test]
    fn foreign_fingerprint_is_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[3] ^= 0x40;
        let result = CarrierHeader::decode(&mut BitCursor::from_bytes(&bytes));
        assert!(matches!(result, Err(StegoError::InvalidSignature { .. })));
    }

    #[test]
    fn skip_lands_on_payload() {
        let header = sample().to_bytes();
        let mut bits = BitCursor::from_bytes(&header).chain(BitCursor::from_bytes(&[0x5A]));
        CarrierHeader::skip(&mut bits);
        assert_eq!(bits.take_bytes(1), vec![0x5A]);
    }

    #[test]
    fn collection_id_parses_and_displays_hex() {
        assert_eq!("1a2b".parse::<CollectionId>(), Ok(CollectionId(0x1A2B)));
        assert_eq!("0xFFFFFFFF".parse::<CollectionId>(), Ok(CollectionId(u32::MAX)));
        assert!("xyz".parse::<CollectionId>().is_err());
        assert!("123456789".parse::<CollectionId>().is_err());
        assert!("+ff".parse::<CollectionId>().is_err());
        assert!("0x".parse::<CollectionId>().is_err());
        assert_eq!(CollectionId(0xAB).to_string(), "000000AB");
        assert_ne!(CollectionId::random(), CollectionId(0));
    }
}
