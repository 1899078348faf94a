//! 块缓存模块
//!
//! 固定大小的缓冲槽位池，按块号分片到多个哈希桶，每个桶各有一把锁，
//! 多个核查找不同块时互不干扰。
//!
//! # 主要组件
//!
//! - [`BufferCache`] - 缓存上下文对象：查找、领取、驱逐、释放
//! - [`Buf`] - 已加锁缓冲块的 RAII 句柄
//! - [`CacheFlags`] - 槽位状态标志
//! - [`CacheStats`] - 缓存统计信息
//! - [`SlotInfo`] - 槽位元数据快照
//!
//! # 与 xv6 的对应关系
//!
//! | xv6 C                              | Rust                                  |
//! |------------------------------------|---------------------------------------|
//! | `struct buf`                       | `Slot`（内部）+ [`Buf`]                |
//! | `bcache.buf[NBUF]` + `bcache.size` | `BufferCache::slots` + 池计数          |
//! | `bcache.buckets[i]` + `locks[i]`   | `ShardLock<Bucket>`                    |
//! | `bcache.hashlock`                  | 驱逐 epoch 锁                          |
//! | `bget()`                           | [`BufferCache::get()`]                 |
//! | `bread()`                          | [`BufferCache::read()`]                |
//! | `bwrite()`                         | [`BufferCache::write()`]               |
//! | `brelse()`                         | [`BufferCache::release()`] / `drop`    |
//! | `bpin()` / `bunpin()`              | [`BufferCache::pin()`] / [`BufferCache::unpin()`] |
//!
//! # 驱逐策略
//!
//! 池中槽位领完之后，未命中的请求进入驱逐扫描：从目标桶开始环绕，
//! 选出第一个含空闲槽位的桶中空闲时间戳最小的槽位。时间戳相等时取链表中先遇到的。
//! 任何时刻只有一个扫描在进行，因此两个核不会选中同一个空闲槽位。
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use kresource_core::cache::BufferCache;
//! use kresource_core::types::CacheConfig;
//!
//! let cache = BufferCache::new(CacheConfig::default(), disk, hal)?;
//!
//! let mut buf = cache.read(1, 100)?;
//! buf.data_mut()[0] = 42;
//! cache.write(&buf)?;
//! cache.release(buf);
//!
//! let stats = cache.stats();
//! log::info!("hits={} evictions={}", stats.hits, stats.evictions);
//! ```

mod block_cache;
mod bucket;
mod buffer;
mod handle;

pub use block_cache::{BufferCache, CacheStats};
pub use buffer::{CacheFlags, SlotInfo};
pub use handle::Buf;
