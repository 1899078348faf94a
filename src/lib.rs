//! kresource_core: 多核内核的共享资源子系统
//!
//! 这个库提供教学内核中两个高争用资源的可伸缩实现：
//! - **块缓冲区缓存**：按块号分片的哈希桶，每桶一把锁，池满后按空闲时间戳驱逐
//! - **物理页分配器**：每核一条空闲链表，本核耗尽时有上限地向其他核窃取
//!
//! 两者都是显式构造、由所有核共享的上下文对象。调度器、时钟与 CPU 识别
//! 由内核通过 [`Hal`] 注入，磁盘驱动通过 [`BlockIo`] 注入。
//!
//! # 示例
//!
//! ```rust,ignore
//! use kresource_core::{BufferCache, CacheConfig, PageAllocator, AllocConfig, Result};
//!
//! fn boot(disk: VirtioDisk, hal: KernelHal) -> Result<()> {
//!     let bcache = BufferCache::new(CacheConfig::default(), disk, hal.clone())?;
//!     let kmem = unsafe { PageAllocator::new(kernel_end, PHYSTOP, AllocConfig::default(), hal)? };
//!
//!     let buf = bcache.read(ROOTDEV, 1)?;
//!     bcache.release(buf);
//!
//!     let page = kmem.allocate().expect("out of memory");
//!     kmem.free(page);
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`consts`] - 默认几何参数与填充值
//! - [`types`] - 标识类型与配置
//! - [`hal`] - 平台抽象
//! - [`sync`] - 分片自旋锁与睡眠锁
//! - [`block`] - 块设备抽象
//! - [`cache`] - 块缓冲区缓存
//! - [`kalloc`] - 物理页分配器

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// 数据结构定义
pub mod types;

/// 平台抽象
pub mod hal;

/// 同步原语
pub mod sync;

/// 块设备抽象
pub mod block;

/// 块缓冲区缓存
pub mod cache;

/// 物理页分配
pub mod kalloc;

#[cfg(test)]
mod test_support;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 配置与标识
pub use types::{AllocConfig, BlockNo, CacheConfig, DevNo, PhysAddr, SlotId};

// 平台与设备
pub use block::BlockIo;
pub use hal::Hal;

// Cache
pub use cache::{Buf, BufferCache, CacheFlags, CacheStats, SlotInfo};

// Kalloc
pub use kalloc::{AllocStats, Page, PageAllocator};
