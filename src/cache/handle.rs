//! 缓冲块句柄 - RAII 风格的块访问
//!
//! 对应 xv6 中 `bget`/`bread` 返回的已加锁 `struct buf *`。

use super::block_cache::BufferCache;
use super::buffer::CacheFlags;
use crate::block::BlockIo;
use crate::hal::Hal;
use crate::types::{BlockNo, DevNo, SlotId};

/// 已加锁的缓冲块
///
/// 提供 RAII 风格的块访问：
/// - 由 [`BufferCache::get`] / [`BufferCache::read`] 创建，此时已持有内容锁并计入一个引用
/// - 持有期间独占负载，可读可写
/// - 丢弃时释放内容锁、扣减引用计数，计数归零时记录空闲时间戳
///
/// 同一时刻一个槽位至多存在一个 `Buf`。
///
/// # 示例
///
/// ```rust,ignore
/// let mut buf = cache.read(dev, 7)?;
/// buf.data_mut()[0] = 0x42;
/// cache.write(&buf)?;
///
/// // 让日志层跨操作保留该块
/// cache.pin(buf.id());
/// drop(buf);
/// ```
pub struct Buf<'a, D: BlockIo, H: Hal> {
    cache: &'a BufferCache<D, H>,
    id: SlotId,
}

impl<'a, D: BlockIo, H: Hal> Buf<'a, D, H> {
    /// 调用者已经持有 `id` 的内容锁
    pub(super) fn new(cache: &'a BufferCache<D, H>, id: SlotId) -> Self {
        Self { cache, id }
    }

    /// 槽位索引，可用于 [`BufferCache::pin`] / [`BufferCache::unpin`]
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// 设备号
    pub fn dev(&self) -> DevNo {
        self.cache.slots[self.id].dev()
    }

    /// 块号
    pub fn blockno(&self) -> BlockNo {
        self.cache.slots[self.id].blockno()
    }

    /// 负载是否已从磁盘读入
    pub fn is_valid(&self) -> bool {
        self.cache.slots[self.id].flags().contains(CacheFlags::VALID)
    }

    /// 只读访问负载
    pub fn data(&self) -> &[u8] {
        // SAFETY: Buf 存在即内容锁被持有，且 Buf 唯一
        unsafe { &self.cache.slots[self.id].content.get()[..] }
    }

    /// 可变访问负载
    pub fn data_mut(&mut self) -> &mut [u8] {
        // SAFETY: 同上，&mut self 保证引用唯一
        unsafe { &mut self.cache.slots[self.id].content.get_mut()[..] }
    }
}

impl<D: BlockIo, H: Hal> Drop for Buf<'_, D, H> {
    fn drop(&mut self) {
        self.cache.release_slot(self.id);
    }
}

impl<D: BlockIo, H: Hal> core::fmt::Debug for Buf<'_, D, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Buf")
            .field("id", &self.id)
            .field("dev", &self.dev())
            .field("blockno", &self.blockno())
            .field("valid", &self.is_valid())
            .finish()
    }
}
