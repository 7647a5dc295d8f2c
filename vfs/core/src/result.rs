use std::fmt;

/// Raw result word returned by the storage service.
///
/// Bit 31 set means failure; everything else is success.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResultCode(u32);

impl ResultCode {
    pub const SUCCESS: ResultCode = ResultCode(0);

    /// Create-file/create-directory target already present (status level).
    pub const ALREADY_EXISTS_INFO: ResultCode = ResultCode(0x0820_44BE);
    pub const DISK_FULL: ResultCode = ResultCode(0x0860_44D2);
    pub const ALREADY_EXISTS: ResultCode = ResultCode(0xC820_44BE);
    pub const NOT_FOUND: ResultCode = ResultCode(0xC880_4478);
    pub const PATH_NOT_FOUND: ResultCode = ResultCode(0xC920_44FA);
    pub const INVALID_ARGUMENT: ResultCode = ResultCode(0xE0E0_46BE);
    pub const PATH_TOO_LONG: ResultCode = ResultCode(0xE0E0_46BF);

    /// Codes the service returns that have no POSIX counterpart.
    pub const INVALID_HANDLE: ResultCode = ResultCode(0xD8E0_06F7);
    pub const WRITE_PROTECTED: ResultCode = ResultCode(0xC8A0_4555);
    pub const NOT_EMPTY: ResultCode = ResultCode(0xC8A0_44F0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_failure(self) -> bool {
        (self.0 as i32) < 0
    }
}

impl fmt::Debug for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResultCode({:#010X})", self.0)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_is_the_sign_bit() {
        assert!(ResultCode::NOT_FOUND.is_failure());
        assert!(!ResultCode::SUCCESS.is_failure());
        assert!(!ResultCode::ALREADY_EXISTS_INFO.is_failure());
    }
}
