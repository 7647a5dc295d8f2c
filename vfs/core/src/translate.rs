//! Service result code → adapter error translation.

use crate::error::{SdmcError, SdmcErrorKind};
use crate::result::ResultCode;

/// Sorted ascending by code; looked up with a binary search.
static ERROR_TABLE: &[(ResultCode, SdmcErrorKind)] = &[
    (ResultCode::ALREADY_EXISTS_INFO, SdmcErrorKind::AlreadyExists),
    (ResultCode::DISK_FULL, SdmcErrorKind::NoSpace),
    (ResultCode::ALREADY_EXISTS, SdmcErrorKind::AlreadyExists),
    (ResultCode::NOT_FOUND, SdmcErrorKind::NotFound),
    (ResultCode::PATH_NOT_FOUND, SdmcErrorKind::NotFound),
    (ResultCode::INVALID_ARGUMENT, SdmcErrorKind::InvalidArgument),
    (ResultCode::PATH_TOO_LONG, SdmcErrorKind::NameTooLong),
];

/// Map a service result code to an error kind.
///
/// Codes missing from the table are passed through unchanged as
/// [`SdmcErrorKind::Service`].
pub fn translate_kind(code: ResultCode) -> SdmcErrorKind {
    match ERROR_TABLE.binary_search_by_key(&code, |(code, _)| *code) {
        Ok(index) => ERROR_TABLE[index].1,
        Err(_) => SdmcErrorKind::Service(code),
    }
}

pub fn translate(code: ResultCode, context: &'static str) -> SdmcError {
    SdmcError::new(translate_kind(code), context)
}
