//! 错误类型定义
//!
//! 提供缓冲区缓存与页分配器的可恢复错误类型。
//!
//! 不变量被破坏（无可驱逐缓冲块、未持锁释放、非法页地址）属于调用方 bug，
//! 这些情况直接 `panic!`，不经过本模块。

use core::fmt;

/// 资源管理操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误
    Io,
    /// 无效参数
    InvalidInput,
    /// 无效状态
    InvalidState,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_accessors() {
        let err = Error::new(ErrorKind::Io, "disk transfer failed");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.message(), "disk transfer failed");
    }

    #[test]
    fn test_error_display() {
        let err = Error::new(ErrorKind::InvalidInput, "nbuf must be non-zero");
        assert_eq!(err.to_string(), "InvalidInput: nbuf must be non-zero");
    }
}
