//! 分片自旋锁与锁依赖检查

use crate::consts::MAX_CPUS;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU32, Ordering};
use spin::{Mutex, MutexGuard};

/// 每核分片锁持有计数
///
/// 桶锁与每核空闲链表锁属于同一"分片"类别。这些锁之间没有规定获取顺序，
/// 死锁自由依赖于一个核任何时刻最多持有其中一把；调试构建下在获取前断言。
pub struct LockDep {
    held: Box<[AtomicU32]>,
}

impl LockDep {
    /// 创建覆盖 [`MAX_CPUS`] 个核的计数表
    pub fn new() -> Self {
        let held: Vec<AtomicU32> = (0..MAX_CPUS).map(|_| AtomicU32::new(0)).collect();
        Self {
            held: held.into_boxed_slice(),
        }
    }

    /// 指定核当前持有的分片锁数量
    pub fn held(&self, cpu: usize) -> u32 {
        self.held[cpu].load(Ordering::Relaxed)
    }

    fn enter(&self, cpu: usize, name: &'static str) {
        let prev = self.held[cpu].fetch_add(1, Ordering::Relaxed);
        debug_assert!(
            prev == 0,
            "lockdep: cpu {} acquiring {} while holding {} shard lock(s)",
            cpu,
            name,
            prev
        );
    }

    fn exit(&self, cpu: usize) {
        self.held[cpu].fetch_sub(1, Ordering::Relaxed);
    }
}

impl Default for LockDep {
    fn default() -> Self {
        Self::new()
    }
}

/// 分片自旋锁
pub struct ShardLock<T> {
    name: &'static str,
    inner: Mutex<T>,
}

impl<T> ShardLock<T> {
    /// 创建分片锁，`name` 用于诊断
    pub const fn new(name: &'static str, data: T) -> Self {
        Self {
            name,
            inner: Mutex::new(data),
        }
    }

    /// 锁名
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 在 `cpu` 上获取锁，计入 `dep`
    pub fn lock<'a>(&'a self, dep: &'a LockDep, cpu: usize) -> ShardGuard<'a, T> {
        dep.enter(cpu, self.name);
        ShardGuard {
            guard: self.inner.lock(),
            dep,
            cpu,
        }
    }
}

/// 分片锁守卫，析构时释放锁并扣减持有计数
pub struct ShardGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    dep: &'a LockDep,
    cpu: usize,
}

impl<T> Deref for ShardGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for ShardGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for ShardGuard<'_, T> {
    fn drop(&mut self) {
        // 计数先于解锁扣减（guard 字段随后析构）
        self.dep.exit(self.cpu);
    }
}
