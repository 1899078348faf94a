//! 每核物理页分配器
//!
//! # 数据布局
//!
//! ```text
//! struct PageAllocator {
//!     base..base + npages * page_size   // 受管物理内存
//!     links: [AtomicU32; npages],       // 空闲链表的后继页帧号（旁路表）
//!     cores: [ShardLock<FreeList>; ncpu], // 每核一把锁，锁名 "kmem_cpu"
//! }
//! ```
//!
//! 分配与释放只取本核的锁；本核链表空时按核号顺序向其他核窃取，
//! 窃取期间只持有被窃核的锁。

use super::freelist::FreeList;
use crate::consts::{FREE_JUNK, NIL};
use crate::error::{Error, ErrorKind, Result};
use crate::hal::Hal;
use crate::sync::{LockDep, ShardLock};
use crate::types::{AllocConfig, PhysAddr};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// 分配器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// 成功分配次数
    pub allocations: u64,
    /// `free` 调用次数（不含初始化）
    pub frees: u64,
    /// 成功窃取的次数
    pub steals: u64,
    /// 窃取搬运的页数
    pub pages_stolen: u64,
    /// 内存耗尽导致的分配失败次数
    pub failed_allocations: u64,
}

#[derive(Default)]
pub(super) struct Counters {
    pub(super) allocations: AtomicU64,
    pub(super) frees: AtomicU64,
    pub(super) steals: AtomicU64,
    pub(super) pages_stolen: AtomicU64,
    pub(super) failed_allocations: AtomicU64,
}

impl Counters {
    #[inline]
    pub(super) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    fn snapshot(&self) -> AllocStats {
        AllocStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            steals: self.steals.load(Ordering::Relaxed),
            pages_stolen: self.pages_stolen.load(Ordering::Relaxed),
            failed_allocations: self.failed_allocations.load(Ordering::Relaxed),
        }
    }
}

/// 物理页分配器
///
/// 整个系统生命周期内只构造一次，由所有核共享。
///
/// # 示例
///
/// ```rust,ignore
/// let kmem = unsafe { PageAllocator::new(kernel_end, PHYSTOP, AllocConfig::default(), hal)? };
///
/// if let Some(mut page) = kmem.allocate() {
///     page.as_mut_slice()[0] = 1;
///     kmem.free(page);
/// }
/// ```
pub struct PageAllocator<H: Hal> {
    pub(super) config: AllocConfig,
    /// 第一个受管页的地址
    pub(super) base: PhysAddr,
    pub(super) npages: usize,
    pub(super) links: Box<[AtomicU32]>,
    pub(super) cores: Box<[ShardLock<FreeList>]>,
    pub(super) lockdep: LockDep,
    pub(super) hal: H,
    pub(super) counters: Counters,
}

impl<H: Hal> PageAllocator<H> {
    /// 接管 `[start, end)` 内的整页并全部放入调用核的空闲链表
    ///
    /// `start` 向上取整到页边界，末尾不足一页的部分被丢弃。
    ///
    /// # Safety
    ///
    /// 该区间必须是可读写的内存，在分配器存续期间不被其他代码使用。
    /// 初始化会覆写整段内存。
    pub unsafe fn new(start: PhysAddr, end: PhysAddr, config: AllocConfig, hal: H) -> Result<Self> {
        config.validate()?;

        let base = config.page_round_up(start);
        if base >= end || end - base < config.page_size {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Memory range holds no whole page",
            ));
        }
        let npages = (end - base) / config.page_size;
        if npages >= NIL as usize {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Memory range exceeds page frame number space",
            ));
        }

        let cpu = hal.cpu_id();
        if cpu >= config.ncpu {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "Initializing cpu outside configured core count",
            ));
        }

        let links: Vec<AtomicU32> = (0..npages).map(|_| AtomicU32::new(NIL)).collect();
        let cores: Vec<ShardLock<FreeList>> = (0..config.ncpu)
            .map(|_| ShardLock::new("kmem_cpu", FreeList::new()))
            .collect();

        let kmem = Self {
            config,
            base,
            npages,
            links: links.into_boxed_slice(),
            cores: cores.into_boxed_slice(),
            lockdep: LockDep::new(),
            hal,
            counters: Counters::default(),
        };

        for pfn in 0..npages {
            kmem.release_frame(kmem.addr_of(pfn as u32), cpu);
        }

        log::info!(
            "[KALLOC] init: {} pages x {} bytes at {:#x} on cpu {}",
            npages,
            config.page_size,
            base,
            cpu
        );

        Ok(kmem)
    }

    /// 分配器配置
    pub fn config(&self) -> &AllocConfig {
        &self.config
    }

    /// 平台接口
    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// 受管页总数
    pub fn total_pages(&self) -> usize {
        self.npages
    }

    /// 受管区间 `[start, end)`
    pub fn range(&self) -> (PhysAddr, PhysAddr) {
        (self.base, self.limit())
    }

    /// 指定核空闲链表上的页数
    pub fn free_pages_on(&self, cpu: usize) -> usize {
        let me = self.hal.cpu_id();
        self.cores[cpu].lock(&self.lockdep, me).len()
    }

    /// 所有核空闲页之和
    ///
    /// 逐核加锁读取，并发分配时结果只是近似值。
    pub fn free_pages(&self) -> usize {
        (0..self.config.ncpu).map(|cpu| self.free_pages_on(cpu)).sum()
    }

    /// 统计信息快照
    pub fn stats(&self) -> AllocStats {
        self.counters.snapshot()
    }

    /// 调用核号，必须落在配置的核数之内
    pub(super) fn current_cpu(&self) -> usize {
        let cpu = self.hal.cpu_id();
        if cpu >= self.config.ncpu {
            log::error!(
                "[KALLOC] cpu {} outside the {} configured cores",
                cpu,
                self.config.ncpu
            );
            panic!("kalloc: cpu out of range");
        }
        cpu
    }

    pub(super) fn limit(&self) -> PhysAddr {
        self.base + self.npages * self.config.page_size
    }

    #[inline]
    pub(super) fn addr_of(&self, pfn: u32) -> PhysAddr {
        self.base + pfn as usize * self.config.page_size
    }

    #[inline]
    pub(super) fn pfn_of(&self, addr: PhysAddr) -> u32 {
        ((addr - self.base) / self.config.page_size) as u32
    }

    /// 填充释放值并挂到 `cpu` 的链表上，调用者已校验地址
    pub(super) fn release_frame(&self, addr: PhysAddr, cpu: usize) {
        // SAFETY: addr 是受管区内的整页，且此刻没有其他持有者
        unsafe { core::ptr::write_bytes(addr as *mut u8, FREE_JUNK, self.config.page_size) };

        let pfn = self.pfn_of(addr);
        self.cores[cpu].lock(&self.lockdep, cpu).push(&self.links, pfn);
    }

    /// 指定核空闲链表上的页地址，按链表顺序
    #[cfg(test)]
    pub(crate) fn free_list(&self, cpu: usize) -> Vec<PhysAddr> {
        let me = self.hal.cpu_id();
        let list = self.cores[cpu].lock(&self.lockdep, me);
        list.pfns(&self.links).map(|pfn| self.addr_of(pfn)).collect()
    }
}

impl<H: Hal> core::fmt::Debug for PageAllocator<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PageAllocator")
            .field("base", &format_args!("{:#x}", self.base))
            .field("npages", &self.npages)
            .field("ncpu", &self.config.ncpu)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::PGSIZE;
    use crate::test_support::{PhysArena, TestHal};

    fn config(ncpu: usize) -> AllocConfig {
        AllocConfig {
            ncpu,
            ..AllocConfig::default()
        }
    }

    #[test]
    fn test_init_places_all_pages_on_calling_cpu() {
        let arena = PhysArena::new(16, PGSIZE);
        let hal = TestHal::new();
        hal.bind_cpu(2);

        let kmem = unsafe {
            PageAllocator::new(arena.start() as PhysAddr, arena.end() as PhysAddr, config(4), &hal)
        }
        .unwrap();

        assert_eq!(kmem.total_pages(), 16);
        assert_eq!(kmem.free_pages_on(2), 16);
        assert_eq!(kmem.free_pages_on(0), 0);
        assert_eq!(kmem.free_pages_on(1), 0);
        assert_eq!(kmem.free_pages_on(3), 0);
        assert_eq!(kmem.free_pages(), 16);
        assert_eq!(kmem.stats(), AllocStats::default());
    }

    #[test]
    fn test_init_fills_free_pattern() {
        let arena = PhysArena::new(4, PGSIZE);
        let hal = TestHal::new();
        let _kmem = unsafe {
            PageAllocator::new(arena.start() as PhysAddr, arena.end() as PhysAddr, config(2), &hal)
        }
        .unwrap();

        // SAFETY: arena 覆盖这段内存，且此时没有分配出去的页
        let bytes = unsafe { core::slice::from_raw_parts(arena.start(), 4 * PGSIZE) };
        assert!(bytes.iter().all(|&b| b == FREE_JUNK));
    }

    #[test]
    fn test_init_rounds_start_up() {
        let arena = PhysArena::new(8, PGSIZE);
        let hal = TestHal::new();
        let start = arena.start() as PhysAddr + 100;

        let kmem =
            unsafe { PageAllocator::new(start, arena.end() as PhysAddr, config(1), &hal) }.unwrap();

        assert_eq!(kmem.total_pages(), 7);
        assert_eq!(kmem.range(), (arena.start() as PhysAddr + PGSIZE, arena.end() as PhysAddr));
        assert!(kmem
            .free_list(0)
            .iter()
            .all(|&addr| addr % PGSIZE == 0 && addr >= start));
    }

    #[test]
    fn test_init_rejects_range_without_whole_page() {
        let arena = PhysArena::new(1, PGSIZE);
        let hal = TestHal::new();
        let start = arena.start() as PhysAddr;

        let err = unsafe { PageAllocator::new(start, start + 100, config(1), &hal) }.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = unsafe { PageAllocator::new(start + 1, start + PGSIZE, config(1), &hal) }
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_init_rejects_bad_config() {
        let arena = PhysArena::new(1, PGSIZE);
        let hal = TestHal::new();
        let bad = AllocConfig {
            page_size: 3000,
            ..AllocConfig::default()
        };

        let res = unsafe {
            PageAllocator::new(arena.start() as PhysAddr, arena.end() as PhysAddr, bad, &hal)
        };
        assert_eq!(res.unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_init_rejects_cpu_outside_core_count() {
        let arena = PhysArena::new(2, PGSIZE);
        let hal = TestHal::new();
        hal.bind_cpu(5);

        let res = unsafe {
            PageAllocator::new(arena.start() as PhysAddr, arena.end() as PhysAddr, config(4), &hal)
        };
        assert_eq!(res.unwrap_err().kind(), ErrorKind::InvalidState);
    }
}
