//! 睡眠锁
//!
//! 缓冲块内容锁。等待期间通过 [`Hal::relax`] 把处理器交还内核，
//! 因此不能在持有分片锁时获取。

use crate::hal::Hal;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

const UNLOCKED: usize = usize::MAX;

/// 可能阻塞调用者的排他锁
///
/// 不使用 RAII 守卫：持有关系跨越 [`BufferCache::get`](crate::cache::BufferCache::get)
/// 与 `release` 两次调用，由 [`Buf`](crate::cache::Buf) 负责配对。
pub struct SleepLock<T: ?Sized> {
    /// 持有者的上下文 ID，`UNLOCKED` 表示空闲
    holder: AtomicUsize,
    data: UnsafeCell<T>,
}

// SAFETY: 数据只在持锁期间由持有者访问
unsafe impl<T: ?Sized + Send> Send for SleepLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SleepLock<T> {}

impl<T> SleepLock<T> {
    /// 创建空闲的睡眠锁
    pub const fn new(data: T) -> Self {
        Self {
            holder: AtomicUsize::new(UNLOCKED),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> SleepLock<T> {
    /// 获取锁，被占用时反复让出处理器直到获得
    pub fn acquire<H: Hal>(&self, hal: &H) {
        let me = hal.context_id();
        debug_assert_ne!(me, UNLOCKED, "context id collides with the unlocked marker");
        while self
            .holder
            .compare_exchange_weak(UNLOCKED, me, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            hal.relax();
        }
    }

    /// 尝试获取锁，不等待
    pub fn try_acquire<H: Hal>(&self, hal: &H) -> bool {
        self.holder
            .compare_exchange(UNLOCKED, hal.context_id(), Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// 释放锁
    ///
    /// 调用者必须先确认 [`holding`](Self::holding)。
    pub fn release(&self) {
        self.holder.store(UNLOCKED, Ordering::Release);
    }

    /// 当前上下文是否持有该锁
    pub fn holding<H: Hal>(&self, hal: &H) -> bool {
        self.holder.load(Ordering::Relaxed) == hal.context_id()
    }

    /// 是否被任意上下文持有
    pub fn is_locked(&self) -> bool {
        self.holder.load(Ordering::Relaxed) != UNLOCKED
    }

    /// 共享访问受保护数据
    ///
    /// # Safety
    ///
    /// 调用者必须持有该锁，且持锁期间不存在可变引用。
    pub unsafe fn get(&self) -> &T {
        // SAFETY: 由调用者保证持锁
        unsafe { &*self.data.get() }
    }

    /// 可变访问受保护数据
    ///
    /// # Safety
    ///
    /// 调用者必须持有该锁，且返回的引用是唯一引用。
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self) -> &mut T {
        // SAFETY: 由调用者保证持锁且引用唯一
        unsafe { &mut *self.data.get() }
    }
}
