//! 数据结构定义
//!
//! 标识类型别名与两个子系统的配置。

use crate::consts::{BSIZE, MAX_CPUS, NBUCKET, NBUF, NCPU, PGSIZE, STEAL_BATCH};
use crate::error::{Error, ErrorKind, Result};

/// 设备号
pub type DevNo = u32;

/// 设备内块号
pub type BlockNo = u32;

/// 缓冲槽位在池数组中的索引
pub type SlotId = usize;

/// 物理地址（内核直接映射下与虚拟地址一致）
pub type PhysAddr = usize;

/// 缓冲区缓存配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// 缓冲槽位总数，初始化后不再增长
    pub nbuf: usize,
    /// 哈希桶数量
    pub nbucket: usize,
    /// 每个槽位的负载大小（字节），必须等于设备块大小
    pub block_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            nbuf: NBUF,
            nbucket: NBUCKET,
            block_size: BSIZE,
        }
    }
}

impl CacheConfig {
    /// 检查配置是否可用
    pub fn validate(&self) -> Result<()> {
        if self.nbuf == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "nbuf must be non-zero"));
        }
        if self.nbuf >= crate::consts::NIL as usize {
            return Err(Error::new(ErrorKind::InvalidInput, "nbuf too large"));
        }
        if self.nbucket == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "nbucket must be non-zero"));
        }
        if self.block_size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "block_size must be non-zero"));
        }
        Ok(())
    }

    /// 块号对应的哈希桶
    #[inline]
    pub fn bucket_of(&self, blockno: BlockNo) -> usize {
        blockno as usize % self.nbucket
    }
}

/// 物理页分配器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocConfig {
    /// 处理器核数（每核一条空闲链表）
    pub ncpu: usize,
    /// 页大小（字节），必须是 2 的幂
    pub page_size: usize,
    /// 单次窃取最多迁移的页数
    pub steal_batch: usize,
}

impl Default for AllocConfig {
    fn default() -> Self {
        Self {
            ncpu: NCPU,
            page_size: PGSIZE,
            steal_batch: STEAL_BATCH,
        }
    }
}

impl AllocConfig {
    /// 检查配置是否可用
    pub fn validate(&self) -> Result<()> {
        if self.ncpu == 0 || self.ncpu > MAX_CPUS {
            return Err(Error::new(ErrorKind::InvalidInput, "ncpu out of range"));
        }
        if !self.page_size.is_power_of_two() {
            return Err(Error::new(ErrorKind::InvalidInput, "page_size must be a power of two"));
        }
        if self.steal_batch == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "steal_batch must be non-zero"));
        }
        Ok(())
    }

    /// 向上对齐到页边界
    #[inline]
    pub fn page_round_up(&self, addr: PhysAddr) -> PhysAddr {
        (addr + self.page_size - 1) & !(self.page_size - 1)
    }
}
