//! 每核空闲链表
//!
//! 空闲页以页帧号（相对受管区起点的页序号）串成单链表，链接存放在分配器的
//! 旁路表 `links[pfn]` 中，因此空闲页的全部字节都保持为释放填充值。
//! 链表只在所属核的锁下修改；窃取时由窃取方短暂持有捐出方的锁。

use crate::consts::NIL;
use core::sync::atomic::{AtomicU32, Ordering};

#[inline]
fn next_of(links: &[AtomicU32], pfn: u32) -> Option<u32> {
    match links[pfn as usize].load(Ordering::Relaxed) {
        NIL => None,
        n => Some(n),
    }
}

#[inline]
fn set_next(links: &[AtomicU32], pfn: u32, next: Option<u32>) {
    links[pfn as usize].store(next.unwrap_or(NIL), Ordering::Relaxed);
}

/// 从某条链表上摘下的一段前缀，此时不属于任何链表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Run {
    pub(crate) head: u32,
    pub(crate) tail: u32,
    pub(crate) len: usize,
}

/// 单核空闲链表
#[derive(Debug, Default)]
pub(crate) struct FreeList {
    head: Option<u32>,
    len: usize,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn push(&mut self, links: &[AtomicU32], pfn: u32) {
        set_next(links, pfn, self.head);
        self.head = Some(pfn);
        self.len += 1;
    }

    pub(crate) fn pop(&mut self, links: &[AtomicU32]) -> Option<u32> {
        let pfn = self.head?;
        self.head = next_of(links, pfn);
        set_next(links, pfn, None);
        self.len -= 1;
        Some(pfn)
    }

    /// 摘下至多 `max` 个页的前缀，其余留在本链表
    pub(crate) fn split_prefix(&mut self, links: &[AtomicU32], max: usize) -> Option<Run> {
        let head = self.head?;
        let mut tail = head;
        let mut len = 1;
        while len < max {
            match next_of(links, tail) {
                Some(next) => {
                    tail = next;
                    len += 1;
                }
                None => break,
            }
        }
        self.head = next_of(links, tail);
        set_next(links, tail, None);
        self.len -= len;
        Some(Run { head, tail, len })
    }

    /// 把一段前缀接到链表头部
    pub(crate) fn splice(&mut self, links: &[AtomicU32], run: Run) {
        set_next(links, run.tail, self.head);
        self.head = Some(run.head);
        self.len += run.len;
    }

    /// 按链表顺序列出页帧号
    #[cfg(test)]
    pub(crate) fn pfns<'a>(&self, links: &'a [AtomicU32]) -> impl Iterator<Item = u32> + 'a {
        let mut cur = self.head;
        core::iter::from_fn(move || {
            let pfn = cur?;
            cur = next_of(links, pfn);
            Some(pfn)
        })
    }
}
