/// 载体头部的魔数指纹。
/// 任何其他值都表示该图像不是本工具生成的载体。
pub const FINGERPRINT: i64 = !0xC0_FE0F_C0DE_i64;

/// 载体头部编码后的字节数：
/// 指纹 8 + 集合 ID 4 + 图像序号 4 + 图像总数 4 + 存储长度 4 + 标志 1。
pub const HEADER_SIZE: usize = 25;

/// 载体头部占用的位数，总是写在每张图像通道位序列的最前面。
pub const HEADER_BITS: usize = HEADER_SIZE * 8;

/// 标志位 0：载荷在隐藏前经过了压缩。
pub const FLAG_COMPRESSED: u8 = 1 << 0;

/// 每个通道默认使用的低位数量。
pub const DEFAULT_BITS_PER_CHANNEL: u8 = 3;

/// 默认的 zstd 压缩级别。
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// 进程退出码。1 与 2 保留给参数解析错误。
pub mod exit_code {
    pub const PAYLOAD_FAIL: u8 = 3;
    pub const INSUFFICIENT_CAPACITY: u8 = 4;
    pub const IMAGE_PROCESS_FAIL: u8 = 5;
    pub const NO_IMAGE_FOUND: u8 = 7;
    pub const COLLECTION_EXTRACT_FAIL: u8 = 8;
    pub const UNKNOWN: u8 = 9;
    pub const OUTPUT_DIR_FAIL: u8 = 10;
}
