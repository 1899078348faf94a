//! 平台抽象
//!
//! 核心不实现调度器、时钟中断与 CPU 识别，这些由内核通过 [`Hal`] 提供。

use alloc::sync::Arc;

/// 平台接口
///
/// 缓冲区缓存与页分配器需要向外部查询的全部信息。
///
/// # 示例
///
/// ```ignore
/// struct KernelHal;
/// impl Hal for KernelHal {
///     fn cpu_id(&self) -> usize { cpuid() }
///     fn context_id(&self) -> usize { myproc().pid as usize }
///     fn ticks(&self) -> u64 { TICKS.load(Ordering::Relaxed) }
///     fn relax(&self) { yield_cpu() }
/// }
/// ```
pub trait Hal: Send + Sync {
    /// 当前执行所在的核编号，必须小于 [`MAX_CPUS`](crate::consts::MAX_CPUS)
    ///
    /// 在 [`PageAllocator`](crate::kalloc::PageAllocator) 上调用时还必须小于
    /// [`AllocConfig::ncpu`](crate::types::AllocConfig::ncpu)，否则分配与释放会 panic。
    fn cpu_id(&self) -> usize;

    /// 当前执行上下文（进程/内核线程）的唯一标识
    ///
    /// 用于睡眠锁的"是否由我持有"查询。不得返回 `usize::MAX`。
    fn context_id(&self) -> usize;

    /// 时钟中断计数
    fn ticks(&self) -> u64;

    /// 等待睡眠锁时让出处理器
    fn relax(&self) {
        core::hint::spin_loop();
    }
}

impl<T: Hal + ?Sized> Hal for &T {
    fn cpu_id(&self) -> usize {
        (**self).cpu_id()
    }

    fn context_id(&self) -> usize {
        (**self).context_id()
    }

    fn ticks(&self) -> u64 {
        (**self).ticks()
    }

    fn relax(&self) {
        (**self).relax()
    }
}

impl<T: Hal + ?Sized> Hal for Arc<T> {
    fn cpu_id(&self) -> usize {
        (**self).cpu_id()
    }

    fn context_id(&self) -> usize {
        (**self).context_id()
    }

    fn ticks(&self) -> u64 {
        (**self).ticks()
    }

    fn relax(&self) {
        (**self).relax()
    }
}
