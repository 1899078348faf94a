//! 测试夹具：模拟平台、内存磁盘与页对齐的物理内存区

use crate::block::BlockIo;
use crate::consts::MAX_CPUS;
use crate::error::{Error, ErrorKind, Result};
use crate::hal::Hal;
use crate::types::{BlockNo, DevNo};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread::{self, ThreadId};
use std::vec::Vec;

#[derive(Clone, Copy)]
struct ThreadSlot {
    cpu: usize,
    ctx: usize,
}

/// 以操作系统线程模拟核与执行上下文
///
/// 每个线程首次调用时分配独立的核号与上下文 ID，可用 [`bind_cpu`](Self::bind_cpu) 覆盖核号。
pub struct TestHal {
    ticks: AtomicU64,
    next: AtomicUsize,
    threads: Mutex<HashMap<ThreadId, ThreadSlot>>,
}

impl TestHal {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            next: AtomicUsize::new(0),
            threads: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self) -> ThreadSlot {
        let mut threads = self.threads.lock().unwrap();
        *threads.entry(thread::current().id()).or_insert_with(|| {
            let n = self.next.fetch_add(1, Ordering::Relaxed);
            assert!(n < MAX_CPUS, "too many test threads for one TestHal");
            ThreadSlot { cpu: n, ctx: n + 1 }
        })
    }

    /// 把当前线程绑定到指定核
    pub fn bind_cpu(&self, cpu: usize) {
        let ctx = self.slot().ctx;
        self.threads
            .lock()
            .unwrap()
            .insert(thread::current().id(), ThreadSlot { cpu, ctx });
    }

    pub fn set_ticks(&self, ticks: u64) {
        self.ticks.store(ticks, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: u64) {
        self.ticks.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Hal for TestHal {
    fn cpu_id(&self) -> usize {
        self.slot().cpu
    }

    fn context_id(&self) -> usize {
        self.slot().ctx
    }

    fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    fn relax(&self) {
        thread::yield_now();
    }
}

/// 内存磁盘，统计传输次数
///
/// 未写过的块读出 [`MemDisk::seed`] 填充的内容。
pub struct MemDisk {
    block_size: usize,
    blocks: Mutex<HashMap<(DevNo, BlockNo), Vec<u8>>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
}

impl MemDisk {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            blocks: Mutex::new(HashMap::new()),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// 未写过的块的填充字节
    pub fn seed(dev: DevNo, blockno: BlockNo) -> u8 {
        (dev.wrapping_mul(31).wrapping_add(blockno) % 251) as u8
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// 直接查看磁盘上的块内容
    pub fn block(&self, dev: DevNo, blockno: BlockNo) -> Option<Vec<u8>> {
        self.blocks.lock().unwrap().get(&(dev, blockno)).cloned()
    }
}

impl BlockIo for MemDisk {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&self, dev: DevNo, blockno: BlockNo, buf: &mut [u8]) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::Io, "injected read failure"));
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.blocks.lock().unwrap().get(&(dev, blockno)) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(Self::seed(dev, blockno)),
        }
        Ok(())
    }

    fn write_block(&self, dev: DevNo, blockno: BlockNo, buf: &[u8]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.blocks.lock().unwrap().insert((dev, blockno), buf.to_vec());
        Ok(())
    }
}

/// 页对齐的堆内存区，模拟一段物理内存
pub struct PhysArena {
    ptr: *mut u8,
    layout: Layout,
}

impl PhysArena {
    pub fn new(pages: usize, page_size: usize) -> Self {
        let layout = Layout::from_size_align(pages * page_size, page_size).unwrap();
        // SAFETY: layout 大小非零
        let ptr = unsafe { alloc_zeroed(layout) };
        assert!(!ptr.is_null());
        Self { ptr, layout }
    }

    pub fn start(&self) -> *mut u8 {
        self.ptr
    }

    pub fn end(&self) -> *mut u8 {
        // SAFETY: 指向分配末尾
        unsafe { self.ptr.add(self.layout.size()) }
    }
}

impl Drop for PhysArena {
    fn drop(&mut self) {
        // SAFETY: 与 alloc_zeroed 使用同一 layout
        unsafe { dealloc(self.ptr, self.layout) };
    }
}
