//! 缓冲槽位结构
//!
//! 槽位在初始化时一次性创建，此后反复回收，从不销毁。

use crate::consts::NIL;
use crate::sync::SleepLock;
use crate::types::{BlockNo, DevNo, SlotId};
use alloc::boxed::Box;
use bitflags::bitflags;
use core::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

bitflags! {
    /// 缓冲块标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CacheFlags: u8 {
        /// 负载已从磁盘读入（有效）
        const VALID = 0x01;
        /// 设备传输进行中，仅供诊断（`slot_info`）
        const DISK  = 0x02;
    }
}

/// 缓冲槽位
///
/// 在 C 实现中槽位通过嵌入的 `next` 指针串成哈希链。这里链接是一个槽位索引，
/// 元数据字段用原子类型存放，但只在所属桶锁下修改，原子操作仅用来避免
/// 跨锁别名的可变引用，顺序由桶锁保证（`Relaxed` 即可）。
///
/// # 字段说明
///
/// - `dev` / `blockno`: 当前身份，引用计数 > 0 时不变
/// - `refcnt`: 引用计数，为 0 时才可被驱逐
/// - `timestamp`: 引用计数降为 0 时的时钟计数
/// - `next`: 同桶链表中的下一个槽位
/// - `flags`: [`CacheFlags`]，由内容锁持有者修改（驱逐时除外，此时无人持有）
/// - `content`: 内容锁及其保护的负载
pub(crate) struct Slot {
    dev: AtomicU32,
    blockno: AtomicU32,
    refcnt: AtomicU32,
    timestamp: AtomicU64,
    next: AtomicU32,
    flags: AtomicU8,
    pub(crate) content: SleepLock<Box<[u8]>>,
}

impl Slot {
    /// 创建未初始化身份的槽位
    pub(crate) fn new(block_size: usize) -> Self {
        Self {
            dev: AtomicU32::new(0),
            blockno: AtomicU32::new(0),
            refcnt: AtomicU32::new(0),
            timestamp: AtomicU64::new(0),
            next: AtomicU32::new(NIL),
            flags: AtomicU8::new(0),
            content: SleepLock::new(alloc::vec![0u8; block_size].into_boxed_slice()),
        }
    }

    pub(crate) fn dev(&self) -> DevNo {
        self.dev.load(Ordering::Relaxed)
    }

    pub(crate) fn blockno(&self) -> BlockNo {
        self.blockno.load(Ordering::Relaxed)
    }

    pub(crate) fn matches(&self, dev: DevNo, blockno: BlockNo) -> bool {
        self.dev() == dev && self.blockno() == blockno
    }

    /// 赋予新身份：清除有效标志，引用计数置 1
    pub(crate) fn repurpose(&self, dev: DevNo, blockno: BlockNo) {
        self.dev.store(dev, Ordering::Relaxed);
        self.blockno.store(blockno, Ordering::Relaxed);
        self.flags.fetch_and(!CacheFlags::VALID.bits(), Ordering::Relaxed);
        self.refcnt.store(1, Ordering::Relaxed);
    }

    pub(crate) fn refcnt(&self) -> u32 {
        self.refcnt.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_ref(&self) {
        self.refcnt.fetch_add(1, Ordering::Relaxed);
    }

    /// 引用计数减一，返回新值；调用者保证当前值 > 0
    pub(crate) fn dec_ref(&self) -> u32 {
        self.refcnt.fetch_sub(1, Ordering::Relaxed) - 1
    }

    pub(crate) fn timestamp(&self) -> u64 {
        self.timestamp.load(Ordering::Relaxed)
    }

    pub(crate) fn stamp(&self, ticks: u64) {
        self.timestamp.store(ticks, Ordering::Relaxed);
    }

    pub(crate) fn next(&self) -> Option<SlotId> {
        match self.next.load(Ordering::Relaxed) {
            NIL => None,
            n => Some(n as SlotId),
        }
    }

    pub(crate) fn set_next(&self, next: Option<SlotId>) {
        let raw = next.map_or(NIL, |n| n as u32);
        self.next.store(raw, Ordering::Relaxed);
    }

    pub(crate) fn flags(&self) -> CacheFlags {
        CacheFlags::from_bits_truncate(self.flags.load(Ordering::Relaxed))
    }

    pub(crate) fn insert_flags(&self, flags: CacheFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::Relaxed);
    }

    pub(crate) fn remove_flags(&self, flags: CacheFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::Relaxed);
    }

    pub(crate) fn info(&self, id: SlotId) -> SlotInfo {
        SlotInfo {
            id,
            dev: self.dev(),
            blockno: self.blockno(),
            refcnt: self.refcnt(),
            timestamp: self.timestamp(),
            flags: self.flags(),
        }
    }
}

/// 槽位元数据快照，用于诊断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    /// 槽位索引
    pub id: SlotId,
    /// 设备号
    pub dev: DevNo,
    /// 块号
    pub blockno: BlockNo,
    /// 引用计数
    pub refcnt: u32,
    /// 最近一次空闲时的时钟计数
    pub timestamp: u64,
    /// 标志
    pub flags: CacheFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_creation() {
        let slot = Slot::new(1024);
        assert_eq!(slot.refcnt(), 0);
        assert_eq!(slot.next(), None);
        assert_eq!(slot.flags(), CacheFlags::empty());
        assert!(!slot.content.is_locked());
    }

    #[test]
    fn test_repurpose_clears_valid_only() {
        let slot = Slot::new(64);
        slot.insert_flags(CacheFlags::VALID | CacheFlags::DISK);
        slot.repurpose(1, 42);

        assert!(slot.matches(1, 42));
        assert!(!slot.matches(2, 42));
        assert_eq!(slot.refcnt(), 1);
        assert_eq!(slot.flags(), CacheFlags::DISK);
    }

    #[test]
    fn test_reference_counting() {
        let slot = Slot::new(64);
        slot.repurpose(1, 1);
        slot.inc_ref();
        assert_eq!(slot.refcnt(), 2);
        assert_eq!(slot.dec_ref(), 1);
        assert_eq!(slot.dec_ref(), 0);
    }

    #[test]
    fn test_next_link() {
        let slot = Slot::new(64);
        slot.set_next(Some(7));
        assert_eq!(slot.next(), Some(7));
        slot.set_next(None);
        assert_eq!(slot.next(), None);
    }

    #[test]
    fn test_info_snapshot() {
        let slot = Slot::new(64);
        slot.repurpose(3, 9);
        slot.stamp(17);
        slot.insert_flags(CacheFlags::VALID);

        let info = slot.info(5);
        assert_eq!(
            info,
            SlotInfo { id: 5, dev: 3, blockno: 9, refcnt: 1, timestamp: 17, flags: CacheFlags::VALID }
        );
    }
}
