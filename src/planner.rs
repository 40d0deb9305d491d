//! # 容量规划模块
//!
//! 根据载荷大小从候选图像中挑选要使用的图像及其写入顺序：
//!
//! 1. 如果有单张图像就能放下全部载荷，选其中容量最小的那一张。
//! 2. 否则从容量最大的图像开始依次累加，直到总容量覆盖载荷。
//! 3. 全部图像加起来仍不够时报告确切的差额。

use crate::error::{Result, StegoError};

/// 规划结果中的一项：使用候选池中的哪张图像，以及在其中存放多少字节。
/// 结果列表的顺序即图像序号 (`image_index`) 的分配顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub pool_index: usize,
    pub stored_length: u64,
}

/// `capacities` 是候选图像的容量 (字节)，通常已按升序排列。
///
/// # Errors
///
/// * 候选池为空 ([`StegoError::NoImagesFound`])。
/// * 总容量不足 ([`StegoError::InsufficientCapacity`])，附带所需、可用与差额。
pub fn plan(payload_size: u64, capacities: &[u64]) -> Result<Vec<Allocation>> {
    if capacities.is_empty() {
        return Err(StegoError::NoImagesFound);
    }

    // 按容量升序的稳定排列；对已排序的输入就是原顺序
    let mut ascending: Vec<usize> = (0..capacities.len()).collect();
    ascending.sort_by_key(|&i| capacities[i]);

    if let Some(&tightest) = ascending.iter().find(|&&i| capacities[i] >= payload_size) {
        return Ok(vec![Allocation {
            pool_index: tightest,
            stored_length: payload_size,
        }]);
    }

    let mut remaining = payload_size;
    let mut allocations = Vec::new();
    for &pool_index in ascending.iter().rev() {
        let stored_length = remaining.min(capacities[pool_index]);
        allocations.push(Allocation {
            pool_index,
            stored_length,
        });
        remaining -= stored_length;
        if remaining == 0 {
            return Ok(allocations);
        }
    }

    Err(StegoError::InsufficientCapacity {
        required: payload_size,
        available: capacities.iter().sum(),
        shortfall: remaining,
    })
}
