//! 同步原语
//!
//! - [`ShardLock`] - 短临界区自旋锁（哈希桶锁、每核空闲链表锁），基于 `spin` crate
//! - [`LockDep`] - 每核分片锁持有计数，调试构建下断言任何核不会同时持有两把分片锁
//! - [`SleepLock`] - 缓冲块内容锁，获取时可能让出处理器，支持"是否由我持有"查询
//!
//! 分片锁只用于不会阻塞的短临界区；持有分片锁期间绝不能获取 [`SleepLock`]
//! 或调用块设备 I/O。

mod shard;
mod sleep;

pub use shard::{LockDep, ShardGuard, ShardLock};
pub use sleep::SleepLock;
