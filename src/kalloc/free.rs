//! 页释放

use super::allocator::{Counters, PageAllocator};
use super::page::Page;
use crate::hal::Hal;

impl<H: Hal> PageAllocator<H> {
    /// 归还一页到当前核的空闲链表
    ///
    /// 页内容被覆写为释放填充值。
    ///
    /// # Panics
    ///
    /// 地址未按页对齐或不在受管区间内时 panic（内核不变量被破坏）；
    /// 调用核号不小于配置的核数时 panic。
    pub fn free(&self, page: Page<'_>) {
        let addr = page.into_raw();
        let (start, end) = self.range();

        if addr % self.config.page_size != 0 || addr < start || addr >= end {
            log::error!(
                "[KALLOC] free of bad address {:#x}, managed range [{:#x}, {:#x})",
                addr,
                start,
                end
            );
            panic!("kfree: bad address {:#x}", addr);
        }

        let cpu = self.current_cpu();
        self.release_frame(addr, cpu);
        Counters::add(&self.counters.frees, 1);
        log::trace!("[KALLOC] cpu {} free {:#x}", cpu, addr);
    }
}

#[cfg(test)]
mod tests {
    use crate::consts::{FREE_JUNK, PGSIZE};
    use crate::kalloc::{Page, PageAllocator};
    use crate::test_support::{PhysArena, TestHal};
    use crate::types::{AllocConfig, PhysAddr};

    fn setup<'h>(arena: &PhysArena, hal: &'h TestHal, ncpu: usize) -> PageAllocator<&'h TestHal> {
        let config = AllocConfig {
            ncpu,
            ..AllocConfig::default()
        };
        unsafe {
            PageAllocator::new(arena.start() as PhysAddr, arena.end() as PhysAddr, config, hal)
        }
        .unwrap()
    }

    #[test]
    fn test_free_fills_free_pattern() {
        let arena = PhysArena::new(2, PGSIZE);
        let hal = TestHal::new();
        let kmem = setup(&arena, &hal, 1);

        let mut page = kmem.allocate().unwrap();
        page.as_mut_slice().fill(0xAB);
        let addr = page.addr();
        kmem.free(page);

        // SAFETY: 页在 arena 内，已归还且没有其他持有者
        let bytes = unsafe { core::slice::from_raw_parts(addr as *const u8, PGSIZE) };
        assert!(bytes.iter().all(|&b| b == FREE_JUNK));
        assert_eq!(kmem.stats().frees, 1);
    }

    #[test]
    fn test_free_goes_to_calling_cpu() {
        let arena = PhysArena::new(4, PGSIZE);
        let hal = TestHal::new();
        hal.bind_cpu(0);
        let kmem = setup(&arena, &hal, 4);

        let page = kmem.allocate().unwrap();
        hal.bind_cpu(3);
        kmem.free(page);

        assert_eq!(kmem.free_pages_on(0), 3);
        assert_eq!(kmem.free_pages_on(3), 1);
    }

    #[test]
    fn test_free_then_allocate_reuses_page() {
        let arena = PhysArena::new(4, PGSIZE);
        let hal = TestHal::new();
        let kmem = setup(&arena, &hal, 2);

        let a = kmem.allocate().unwrap();
        let _b = kmem.allocate().unwrap();
        let addr = a.addr();
        kmem.free(a);

        assert_eq!(kmem.allocate().unwrap().addr(), addr);
    }

    #[test]
    #[should_panic(expected = "kalloc: cpu out of range")]
    fn test_free_on_unconfigured_cpu_panics() {
        let arena = PhysArena::new(2, PGSIZE);
        let hal = TestHal::new();
        hal.bind_cpu(0);
        let kmem = setup(&arena, &hal, 2);

        let page = kmem.allocate().unwrap();
        hal.bind_cpu(5);
        kmem.free(page);
    }

    #[test]
    #[should_panic(expected = "kfree: bad address")]
    fn test_free_misaligned_panics() {
        let arena = PhysArena::new(2, PGSIZE);
        let hal = TestHal::new();
        let kmem = setup(&arena, &hal, 1);

        let addr = kmem.allocate().unwrap().into_raw();
        // SAFETY: 地址在 arena 内；free 在写入前拒绝它
        kmem.free(unsafe { Page::from_raw(addr + 8, PGSIZE) });
    }

    #[test]
    #[should_panic(expected = "kfree: bad address")]
    fn test_free_past_end_panics() {
        let arena = PhysArena::new(2, PGSIZE);
        let hal = TestHal::new();
        let kmem = setup(&arena, &hal, 1);

        // SAFETY: free 在写入前拒绝区间外地址
        kmem.free(unsafe { Page::from_raw(arena.end() as PhysAddr, PGSIZE) });
    }

    #[test]
    #[should_panic(expected = "kfree: bad address")]
    fn test_free_below_start_panics() {
        let arena = PhysArena::new(3, PGSIZE);
        let hal = TestHal::new();
        let start = arena.start() as PhysAddr + PGSIZE;
        let kmem = unsafe {
            PageAllocator::new(start, arena.end() as PhysAddr, AllocConfig::default(), &hal)
        }
        .unwrap();

        // SAFETY: free 在写入前拒绝区间外地址
        kmem.free(unsafe { Page::from_raw(arena.start() as PhysAddr, PGSIZE) });
    }
}
