//! 页分配与跨核窃取

use super::allocator::{Counters, PageAllocator};
use super::page::Page;
use crate::consts::ALLOC_JUNK;
use crate::hal::Hal;

impl<H: Hal> PageAllocator<H> {
    /// 分配一页
    ///
    /// 先从本核链表取；为空时按核号顺序从其他核窃取至多 `steal_batch` 页。
    /// 返回的页内容全部为分配填充值。所有核都没有空闲页时返回 `None`。
    ///
    /// # Panics
    ///
    /// 调用核号不小于配置的核数时 panic。
    pub fn allocate(&self) -> Option<Page<'_>> {
        let cpu = self.current_cpu();

        let popped = self.cores[cpu].lock(&self.lockdep, cpu).pop(&self.links);
        let pfn = match popped {
            Some(pfn) => Some(pfn),
            None => self.steal(cpu),
        };

        let Some(pfn) = pfn else {
            Counters::add(&self.counters.failed_allocations, 1);
            log::warn!("[KALLOC] cpu {} out of memory", cpu);
            return None;
        };

        let addr = self.addr_of(pfn);
        // SAFETY: 页已从空闲链表摘下，只有本次调用能访问
        let mut page = unsafe { Page::from_raw(addr, self.config.page_size) };
        page.as_mut_slice().fill(ALLOC_JUNK);
        Counters::add(&self.counters.allocations, 1);
        log::trace!("[KALLOC] cpu {} alloc {:#x}", cpu, addr);
        Some(page)
    }

    /// 从其他核搬运一批页到 `cpu` 的链表，并弹出其中一页
    ///
    /// 调用时不得持有任何分配器锁。任何时刻只持有一把核锁：
    /// 在被窃核的锁下摘下前缀，释放后再取本核锁接入。
    fn steal(&self, cpu: usize) -> Option<u32> {
        for victim in (0..self.config.ncpu).filter(|&c| c != cpu) {
            let run = self.cores[victim]
                .lock(&self.lockdep, cpu)
                .split_prefix(&self.links, self.config.steal_batch);

            let Some(run) = run else {
                continue;
            };

            Counters::add(&self.counters.steals, 1);
            Counters::add(&self.counters.pages_stolen, run.len as u64);
            log::debug!("[KALLOC] cpu {} stole {} pages from cpu {}", cpu, run.len, victim);

            let mut mine = self.cores[cpu].lock(&self.lockdep, cpu);
            mine.splice(&self.links, run);
            return mine.pop(&self.links);
        }
        None
    }
}
