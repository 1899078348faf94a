//! 常量定义
//!
//! 这个模块包含缓冲区缓存与物理页分配器的默认几何参数：
//! - 缓冲块大小、数量与哈希桶数量
//! - 页大小、处理器核数与窃取批量
//! - 释放/分配时填充的哨兵字节

//=============================================================================
// 缓冲区缓存
//=============================================================================

/// 缓冲块负载大小（字节），与磁盘块大小一致
pub const BSIZE: usize = 1024;

/// 缓冲块总数（MAXOPBLOCKS * 3）
pub const NBUF: usize = 30;

/// 哈希桶数量（取素数以分散块号）
pub const NBUCKET: usize = 13;

//=============================================================================
// 物理页分配器
//=============================================================================

/// 物理页大小（字节）
pub const PGSIZE: usize = 4096;

/// 默认处理器核数
pub const NCPU: usize = 8;

/// 单次窃取最多迁移的页数
pub const STEAL_BATCH: usize = 1024;

/// 锁依赖检查支持的最大核数
pub const MAX_CPUS: usize = 64;

/// 释放页时写入的填充字节，用于暴露悬垂引用
pub const FREE_JUNK: u8 = 0x01;

/// 分配页时写入的填充字节，用于暴露未初始化读取
pub const ALLOC_JUNK: u8 = 0x05;

//=============================================================================
// 链表
//=============================================================================

/// 链表空指针（槽位索引 / 页帧号）
pub const NIL: u32 = u32::MAX;
