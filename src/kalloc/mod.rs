//! 物理页分配模块
//!
//! 每个核维护独立的空闲页链表与锁，分配和释放通常只触及本核的锁。
//! 本核链表为空时从其他核批量窃取，窃取量有上限，避免一次掏空别的核。
//!
//! # 主要组件
//!
//! - [`PageAllocator`] - 分配器上下文对象
//! - [`Page`] - 已分配物理页的所有权句柄
//! - [`AllocStats`] - 分配统计信息
//!
//! # 与 xv6 的对应关系
//!
//! | xv6 C                          | Rust                          |
//! |--------------------------------|-------------------------------|
//! | `kmem[NCPU]`                   | `ShardLock<FreeList>` 每核一个 |
//! | `struct run` 嵌在空闲页内      | 旁路表 `links[pfn]`           |
//! | `kinit()` / `freerange()`      | [`PageAllocator::new()`]      |
//! | `kalloc()`                     | [`PageAllocator::allocate()`] |
//! | `kfree()`                      | [`PageAllocator::free()`]     |
//!
//! # 填充值
//!
//! 空闲页全部字节为 [`FREE_JUNK`](crate::consts::FREE_JUNK)，刚分配的页全部字节为
//! [`ALLOC_JUNK`](crate::consts::ALLOC_JUNK)。

mod alloc;
mod allocator;
mod free;
mod freelist;
mod page;

pub use allocator::{AllocStats, PageAllocator};
pub use page::Page;
