//! 分片哈希块缓存
//!
//! # 锁结构
//!
//! ```text
//! struct BufferCache {
//!     slots:   [Slot; nbuf],               // 固定槽位池
//!     buckets: [ShardLock<Bucket>; nbucket], // 每桶一把锁：链表、引用计数、时间戳
//!     pool:    Mutex<usize>,               // 已从池尾领取的槽位数
//!     epoch:   Mutex<()>,                  // 驱逐扫描全局串行化
//! }
//! ```
//!
//! 命中路径只取目标桶锁；池未领完时在目标桶锁下短暂取池锁；池领完后进入驱逐扫描，
//! 扫描期间持有 epoch 锁，并且每次只持有一把桶锁。

use super::buffer::{CacheFlags, Slot, SlotInfo};
use super::bucket::Bucket;
use super::handle::Buf;
use crate::block::BlockIo;
use crate::error::{Error, ErrorKind, Result};
use crate::hal::Hal;
use crate::sync::{LockDep, ShardGuard, ShardLock};
use crate::types::{BlockNo, CacheConfig, DevNo, SlotId};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::Mutex;

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// `get` 调用次数
    pub lookups: u64,
    /// 快速路径命中次数
    pub hits: u64,
    /// 快速路径未命中次数
    pub misses: u64,
    /// 驱逐扫描中复查命中的次数（并发插入了同一块）
    pub recheck_hits: u64,
    /// 从池尾领取新槽位的次数
    pub claims: u64,
    /// 驱逐扫描次数
    pub sweeps: u64,
    /// 实际驱逐并复用槽位的次数
    pub evictions: u64,
    /// 磁盘读次数
    pub disk_reads: u64,
    /// 磁盘写次数
    pub disk_writes: u64,
    /// `pin` 调用次数
    pub pins: u64,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            (self.hits + self.recheck_hits) as f64 / self.lookups as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    recheck_hits: AtomicU64,
    claims: AtomicU64,
    sweeps: AtomicU64,
    evictions: AtomicU64,
    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
    pins: AtomicU64,
}

impl Counters {
    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            recheck_hits: self.recheck_hits.load(Ordering::Relaxed),
            claims: self.claims.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            disk_reads: self.disk_reads.load(Ordering::Relaxed),
            disk_writes: self.disk_writes.load(Ordering::Relaxed),
            pins: self.pins.load(Ordering::Relaxed),
        }
    }
}

/// 块缓存
///
/// 整个系统生命周期内只构造一次，由所有核共享（`&BufferCache` 或 `Arc`）。
///
/// # 示例
///
/// ```rust,ignore
/// let cache = BufferCache::new(CacheConfig::default(), disk, hal)?;
///
/// let mut buf = cache.read(ROOTDEV, 33)?;
/// buf.data_mut()[0] = 0x42;
/// cache.write(&buf)?;
/// cache.release(buf);
/// ```
pub struct BufferCache<D: BlockIo, H: Hal> {
    config: CacheConfig,
    pub(super) slots: Box<[Slot]>,
    buckets: Box<[ShardLock<Bucket>]>,
    /// 已领取的槽位数，达到 nbuf 后只能靠驱逐获得槽位
    pool: Mutex<usize>,
    /// 驱逐扫描串行化
    epoch: Mutex<()>,
    lockdep: LockDep,
    device: D,
    hal: H,
    counters: Counters,
}

impl<D: BlockIo, H: Hal> BufferCache<D, H> {
    /// 创建块缓存
    ///
    /// # 参数
    ///
    /// * `config` - 槽位数、桶数与负载大小
    /// * `device` - 块 I/O 驱动，块大小必须等于 `config.block_size`
    /// * `hal` - 平台接口
    pub fn new(config: CacheConfig, device: D, hal: H) -> Result<Self> {
        config.validate()?;
        if device.block_size() != config.block_size {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Device block size must match cache payload size",
            ));
        }

        let slots: Vec<Slot> = (0..config.nbuf).map(|_| Slot::new(config.block_size)).collect();
        let buckets: Vec<ShardLock<Bucket>> = (0..config.nbucket)
            .map(|_| ShardLock::new("bcache_bucket", Bucket::new()))
            .collect();

        log::info!(
            "[BCACHE] init: {} buffers x {} bytes, {} buckets",
            config.nbuf,
            config.block_size,
            config.nbucket
        );

        Ok(Self {
            config,
            slots: slots.into_boxed_slice(),
            buckets: buckets.into_boxed_slice(),
            pool: Mutex::new(0),
            epoch: Mutex::new(()),
            lockdep: LockDep::new(),
            device,
            hal,
            counters: Counters::default(),
        })
    }

    /// 获取 `(dev, blockno)` 对应的缓冲块，返回时已持有其内容锁
    ///
    /// 对应 xv6 的 `bget`。返回的块可能尚未从磁盘读入（`is_valid() == false`）。
    /// 等待内容锁时可能阻塞。
    ///
    /// # Panics
    ///
    /// 池已领完且没有任何引用计数为 0 的槽位时 panic。
    pub fn get(&self, dev: DevNo, blockno: BlockNo) -> Buf<'_, D, H> {
        let id = self.lookup(dev, blockno);
        self.slots[id].content.acquire(&self.hal);
        Buf::new(self, id)
    }

    /// 获取并保证内容有效的缓冲块
    ///
    /// 对应 xv6 的 `bread`。若槽位无效则从设备读取；读取失败时返回设备错误，
    /// 槽位保持无效并被释放。
    pub fn read(&self, dev: DevNo, blockno: BlockNo) -> Result<Buf<'_, D, H>> {
        let mut buf = self.get(dev, blockno);
        if !buf.is_valid() {
            let slot = &self.slots[buf.id()];
            slot.insert_flags(CacheFlags::DISK);
            let res = self.device.read_block(dev, blockno, buf.data_mut());
            slot.remove_flags(CacheFlags::DISK);
            if let Err(e) = res {
                log::warn!("[BCACHE] read dev={} block={} failed: {}", dev, blockno, e);
                return Err(e);
            }
            slot.insert_flags(CacheFlags::VALID);
            Counters::bump(&self.counters.disk_reads);
        }
        Ok(buf)
    }

    /// 把缓冲块内容写回设备
    ///
    /// 对应 xv6 的 `bwrite`。不改变有效标志与引用计数。
    ///
    /// # Panics
    ///
    /// 当前上下文未持有该块内容锁时 panic。
    pub fn write(&self, buf: &Buf<'_, D, H>) -> Result<()> {
        let slot = &self.slots[buf.id()];
        if !slot.content.holding(&self.hal) {
            log::error!("[BCACHE] bwrite slot={} without holding its lock", buf.id());
            panic!("bwrite: not holding");
        }
        slot.insert_flags(CacheFlags::DISK);
        let res = self.device.write_block(slot.dev(), slot.blockno(), buf.data());
        slot.remove_flags(CacheFlags::DISK);
        res?;
        Counters::bump(&self.counters.disk_writes);
        Ok(())
    }

    /// 释放缓冲块
    ///
    /// 对应 xv6 的 `brelse`，与直接丢弃 [`Buf`] 等价。
    pub fn release(&self, buf: Buf<'_, D, H>) {
        drop(buf);
    }

    /// 增加引用计数，使块不被驱逐，不涉及内容锁
    ///
    /// 调用者必须已经持有该槽位的一个引用（一个 [`Buf`] 或一次未配对的 `pin`）。
    ///
    /// # Panics
    ///
    /// 槽位引用计数为 0 时 panic。
    pub fn pin(&self, id: SlotId) {
        let slot = &self.slots[id];
        let _bucket = self.lock_bucket_of(id);
        if slot.refcnt() == 0 {
            log::error!("[BCACHE] bpin slot={} with no reference held", id);
            panic!("bpin: buffer not referenced");
        }
        slot.inc_ref();
        Counters::bump(&self.counters.pins);
    }

    /// 撤销一次 [`pin`](Self::pin)
    ///
    /// # Panics
    ///
    /// 引用计数已经为 0 时 panic。
    pub fn unpin(&self, id: SlotId) {
        let slot = &self.slots[id];
        let _bucket = self.lock_bucket_of(id);
        if slot.refcnt() == 0 {
            log::error!("[BCACHE] bunpin slot={} below zero", id);
            panic!("bunpin: refcnt underflow");
        }
        if slot.dec_ref() == 0 {
            slot.stamp(self.hal.ticks());
        }
    }

    /// 释放内容锁并扣减引用计数，由 [`Buf`] 析构调用
    pub(super) fn release_slot(&self, id: SlotId) {
        let slot = &self.slots[id];
        if !slot.content.holding(&self.hal) {
            log::error!("[BCACHE] brelse slot={} without holding its lock", id);
            panic!("brelse: not holding");
        }
        slot.content.release();

        let _bucket = self.lock_bucket_of(id);
        if slot.dec_ref() == 0 {
            slot.stamp(self.hal.ticks());
        }
    }

    /// 锁住槽位当前所在的桶；调用者持有引用，身份不会变化
    fn lock_bucket_of(&self, id: SlotId) -> ShardGuard<'_, Bucket> {
        let idx = self.config.bucket_of(self.slots[id].blockno());
        self.buckets[idx].lock(&self.lockdep, self.hal.cpu_id())
    }

    /// 查找或分配槽位，返回时引用计数已计入，但未持有内容锁
    fn lookup(&self, dev: DevNo, blockno: BlockNo) -> SlotId {
        Counters::bump(&self.counters.lookups);
        let idx = self.config.bucket_of(blockno);
        {
            let mut bucket = self.buckets[idx].lock(&self.lockdep, self.hal.cpu_id());
            if let Some(id) = bucket.find(&self.slots, dev, blockno) {
                self.slots[id].inc_ref();
                Counters::bump(&self.counters.hits);
                log::trace!("[BCACHE] get dev={} block={} HIT slot={}", dev, blockno, id);
                return id;
            }
            Counters::bump(&self.counters.misses);

            // 持有桶锁领取新槽位，同一块的并发请求会在桶锁上串行
            if let Some(id) = self.claim_fresh() {
                self.slots[id].repurpose(dev, blockno);
                bucket.push_front(&self.slots, id);
                Counters::bump(&self.counters.claims);
                log::debug!("[BCACHE] get dev={} block={} MISS, claimed slot={}", dev, blockno, id);
                return id;
            }
        }
        self.evict(dev, blockno, idx)
    }

    /// 从池尾领取一个从未使用过的槽位
    fn claim_fresh(&self) -> Option<SlotId> {
        let mut claimed = self.pool.lock();
        if *claimed < self.config.nbuf {
            let id = *claimed;
            *claimed += 1;
            Some(id)
        } else {
            None
        }
    }

    /// 驱逐扫描
    ///
    /// 从目标桶开始环绕遍历所有桶，每次只持有一把桶锁：
    /// 1. 在目标桶中复查是否已有并发插入的同一块，有则直接返回
    /// 2. 记录本桶内引用计数为 0 且时间戳最小的槽位（相等时保留先遇到的）
    /// 3. 本桶有候选则复用它；若不在目标桶，先从原桶摘除，释放原桶锁后再挂入目标桶
    fn evict(&self, dev: DevNo, blockno: BlockNo, target: usize) -> SlotId {
        let _epoch = self.epoch.lock();
        Counters::bump(&self.counters.sweeps);
        let cpu = self.hal.cpu_id();
        let nbucket = self.config.nbucket;

        let mut idx = target;
        for _ in 0..nbucket {
            let mut bucket = self.buckets[idx].lock(&self.lockdep, cpu);

            let mut victim: Option<(Option<SlotId>, SlotId)> = None;
            let mut oldest = 0;
            for (prev, id) in bucket.chain(&self.slots) {
                let slot = &self.slots[id];
                if idx == target && slot.matches(dev, blockno) {
                    slot.inc_ref();
                    Counters::bump(&self.counters.recheck_hits);
                    log::trace!("[BCACHE] sweep found dev={} block={} inserted concurrently", dev, blockno);
                    return id;
                }
                if slot.refcnt() == 0 && (victim.is_none() || slot.timestamp() < oldest) {
                    victim = Some((prev, id));
                    oldest = slot.timestamp();
                }
            }

            if let Some((prev, id)) = victim {
                let slot = &self.slots[id];
                let (old_dev, old_blockno) = (slot.dev(), slot.blockno());
                slot.repurpose(dev, blockno);
                if idx != target {
                    bucket.unlink(&self.slots, id, prev);
                    drop(bucket);
                    self.buckets[target]
                        .lock(&self.lockdep, cpu)
                        .push_front(&self.slots, id);
                }
                Counters::bump(&self.counters.evictions);
                log::debug!(
                    "[BCACHE] evicted slot={} (dev={} block={} idle since {}) for dev={} block={}",
                    id,
                    old_dev,
                    old_blockno,
                    oldest,
                    dev,
                    blockno
                );
                return id;
            }

            idx = (idx + 1) % nbucket;
        }

        log::error!("[BCACHE] all {} buffers are referenced, cannot evict", self.config.nbuf);
        panic!("bget: no buffers");
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    /// 缓存配置
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// 已从池中领取的槽位数
    pub fn claimed(&self) -> usize {
        *self.pool.lock()
    }

    /// 槽位元数据快照（不加锁，仅供诊断）
    pub fn slot_info(&self, id: SlotId) -> SlotInfo {
        self.slots[id].info(id)
    }

    /// 按链表顺序列出桶内所有槽位
    pub fn bucket_snapshot(&self, idx: usize) -> Vec<SlotInfo> {
        let bucket = self.buckets[idx].lock(&self.lockdep, self.hal.cpu_id());
        bucket
            .chain(&self.slots)
            .map(|(_, id)| self.slots[id].info(id))
            .collect()
    }

    /// 块 I/O 驱动
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 平台接口
    pub fn hal(&self) -> &H {
        &self.hal
    }
}

impl<D: BlockIo, H: Hal> core::fmt::Debug for BufferCache<D, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufferCache")
            .field("config", &self.config)
            .field("claimed", &self.claimed())
            .field("stats", &self.stats())
            .finish()
    }
}
