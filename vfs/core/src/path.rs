//! Path normalization and wire-path production.
//!
//! Caller paths look like `sdmc:/dir/file` or `dir/file`. Normalization strips
//! the device prefix, resolves relative paths against the current directory
//! and enforces `PATH_MAX`. Results live in a per-thread [`PathScratch`] and
//! borrow it, so a result cannot outlive the next normalization on the same
//! scratch.

use std::cell::RefCell;
use std::fmt;

use crate::error::{SdmcError, SdmcErrorKind, SdmcResult};
use crate::wide::utf8_to_utf16;

/// Longest normalized path, in bytes. Wire paths must stay strictly below
/// this many code units.
pub const PATH_MAX: usize = 4096;

const DEVICE_DELIMITER: char = ':';

/// A canonical absolute path borrowed from a [`PathScratch`] or a
/// [`NormalizedPathBuf`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NormalizedPath<'a>(&'a str);

impl<'a> NormalizedPath<'a> {
    pub fn as_str(&self) -> &'a str {
        self.0
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_path_buf(&self) -> NormalizedPathBuf {
        NormalizedPathBuf(self.0.to_owned())
    }
}

impl fmt::Debug for NormalizedPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.0, f)
    }
}

impl fmt::Display for NormalizedPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct NormalizedPathBuf(String);

impl NormalizedPathBuf {
    pub fn root() -> Self {
        Self(String::from("/"))
    }

    pub fn as_path(&self) -> NormalizedPath<'_> {
        NormalizedPath(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Turn this path into a directory prefix ending in `/`, so relative
    /// paths can be appended to it directly.
    pub fn into_directory(mut self) -> SdmcResult<Self> {
        if !self.0.ends_with('/') {
            if self.0.len() + 1 > PATH_MAX {
                return Err(SdmcError::new(SdmcErrorKind::NameTooLong, "path.directory"));
            }
            self.0.push('/');
        }
        Ok(self)
    }
}

impl Default for NormalizedPathBuf {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Debug for NormalizedPathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for NormalizedPathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A NUL-terminated UTF-16 path as sent to the storage service.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WirePath<'a>(&'a [u16]);

impl<'a> WirePath<'a> {
    /// Code units without the terminator.
    pub fn units(&self) -> &'a [u16] {
        &self.0[..self.0.len() - 1]
    }

    pub fn units_with_nul(&self) -> &'a [u16] {
        self.0
    }

    pub fn to_path_buf(&self) -> WirePathBuf {
        WirePathBuf(self.0.to_vec())
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.units())
    }
}

impl fmt::Debug for WirePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string_lossy(), f)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct WirePathBuf(Vec<u16>);

impl WirePathBuf {
    pub fn as_path(&self) -> WirePath<'_> {
        WirePath(&self.0)
    }
}

impl fmt::Debug for WirePathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.as_path(), f)
    }
}

/// Both forms of one resolved caller path.
#[derive(Clone, Copy, Debug)]
pub struct ResolvedPath<'a> {
    pub path: NormalizedPath<'a>,
    pub wire: WirePath<'a>,
}

/// Reusable buffers for path normalization and transcoding.
pub struct PathScratch {
    fixed: String,
    wide: Vec<u16>,
}

impl PathScratch {
    pub fn new() -> Self {
        Self {
            fixed: String::with_capacity(PATH_MAX + 1),
            wide: Vec::with_capacity(PATH_MAX + 1),
        }
    }

    /// Strip the device prefix from `path` and make it absolute against `cwd`.
    ///
    /// `path` may be NUL terminated; anything after the first NUL is ignored.
    pub fn normalize<'s>(
        &'s mut self,
        cwd: NormalizedPath<'_>,
        path: &[u8],
    ) -> SdmcResult<NormalizedPath<'s>> {
        let real = strip_device(path)?;

        self.fixed.clear();
        let absolute = real.starts_with('/');
        let len = if absolute {
            real.len()
        } else {
            cwd.len() + real.len()
        };
        if len > PATH_MAX {
            return Err(SdmcError::new(SdmcErrorKind::NameTooLong, "path.normalize"));
        }
        if !absolute {
            self.fixed.push_str(cwd.as_str());
        }
        self.fixed.push_str(real);
        Ok(NormalizedPath(&self.fixed))
    }

    /// Normalize `path` and transcode the result into its wire form.
    pub fn resolve<'s>(
        &'s mut self,
        cwd: NormalizedPath<'_>,
        path: &[u8],
    ) -> SdmcResult<ResolvedPath<'s>> {
        self.normalize(cwd, path)?;
        utf8_to_utf16(self.fixed.as_bytes(), &mut self.wide, PATH_MAX)?;
        Ok(ResolvedPath {
            path: NormalizedPath(&self.fixed),
            wire: WirePath(&self.wide),
        })
    }
}

impl Default for PathScratch {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static SCRATCH: RefCell<PathScratch> = RefCell::new(PathScratch::new());
}

/// Run `f` with this thread's path scratch.
///
/// A nested call on the same thread gets a fresh scratch instead of the
/// shared one.
pub fn with_scratch<R>(f: impl FnOnce(&mut PathScratch) -> R) -> R {
    SCRATCH.with(|cell| match cell.try_borrow_mut() {
        Ok(mut scratch) => f(&mut scratch),
        Err(_) => f(&mut PathScratch::new()),
    })
}

/// Return the text after the device delimiter, if any.
///
/// Each scan stops at the first delimiter or the first malformed sequence,
/// whichever comes first, so `a:b:\xff` is `InvalidPath` and `a:\xff:b` is
/// `EncodingError`.
fn strip_device(path: &[u8]) -> SdmcResult<&str> {
    let path = match path.iter().position(|&b| b == 0) {
        Some(end) => &path[..end],
        None => path,
    };

    let (head, head_valid) = valid_prefix(path);
    let rest = match head.find(DEVICE_DELIMITER) {
        Some(index) => &path[index + 1..],
        None if head_valid => path,
        None => return Err(SdmcError::new(SdmcErrorKind::EncodingError, "path.normalize")),
    };

    let (tail, tail_valid) = valid_prefix(rest);
    if tail.contains(DEVICE_DELIMITER) {
        return Err(SdmcError::new(SdmcErrorKind::InvalidPath, "path.normalize"));
    }
    if !tail_valid {
        return Err(SdmcError::new(SdmcErrorKind::EncodingError, "path.normalize"));
    }
    Ok(tail)
}

/// The longest well-formed prefix of `bytes`, and whether it is all of it.
fn valid_prefix(bytes: &[u8]) -> (&str, bool) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text, true),
        Err(err) => (
            std::str::from_utf8(&bytes[..err.valid_up_to()]).unwrap_or_default(),
            false,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn normalize(cwd: &str, path: &[u8]) -> SdmcResult<String> {
        let cwd = NormalizedPathBuf(cwd.to_owned());
        let mut scratch = PathScratch::new();
        scratch
            .normalize(cwd.as_path(), path)
            .map(|p| p.as_str().to_owned())
    }

    #[test]
    fn absolute_paths_are_unchanged() {
        assert_eq!(normalize("/", b"/3ds/app.3dsx").unwrap(), "/3ds/app.3dsx");
        assert_eq!(normalize("/x/", b"/").unwrap(), "/");
    }

    #[test]
    fn device_prefix_is_stripped() {
        assert_eq!(normalize("/", b"sdmc:/data/log.txt").unwrap(), "/data/log.txt");
        assert_eq!(normalize("/home/", b"sdmc:notes").unwrap(), "/home/notes");
        assert_eq!(normalize("/home/", b"sdmc:").unwrap(), "/home/");
    }

    #[test]
    fn relative_paths_join_the_current_directory() {
        assert_eq!(normalize("/3ds/", b"save.bin").unwrap(), "/3ds/save.bin");
        assert_eq!(normalize("/3ds/", b"").unwrap(), "/3ds/");
    }

    #[test]
    fn second_delimiter_is_invalid() {
        let err = normalize("/", b"sdmc:/a:b").unwrap_err();
        assert_eq!(err.kind(), SdmcErrorKind::InvalidPath);

        let err = normalize("/", b"sdmc:/a:b\xff").unwrap_err();
        assert_eq!(err.kind(), SdmcErrorKind::InvalidPath);
    }

    #[test]
    fn malformed_text_is_an_encoding_error() {
        let err = normalize("/", b"/bad\xc3").unwrap_err();
        assert_eq!(err.kind(), SdmcErrorKind::EncodingError);

        let err = normalize("/", b"sd\xffmc:/a").unwrap_err();
        assert_eq!(err.kind(), SdmcErrorKind::EncodingError);

        let err = normalize("/", b"sdmc:/\xff:b").unwrap_err();
        assert_eq!(err.kind(), SdmcErrorKind::EncodingError);
    }

    #[test]
    fn input_ends_at_nul() {
        assert_eq!(normalize("/", b"sdmc:/a\0:junk").unwrap(), "/a");
    }

    #[test]
    fn length_limit() {
        let mut path = vec![b'/'];
        path.resize(PATH_MAX, b'a');
        assert_eq!(normalize("/", &path).unwrap().len(), PATH_MAX);

        path.push(b'a');
        let err = normalize("/", &path).unwrap_err();
        assert_eq!(err.kind(), SdmcErrorKind::NameTooLong);

        let relative = vec![b'a'; PATH_MAX];
        let err = normalize("/x/", &relative).unwrap_err();
        assert_eq!(err.kind(), SdmcErrorKind::NameTooLong);
    }

    #[test]
    fn wire_path_must_leave_room_for_the_terminator() {
        let mut path = vec![b'/'];
        path.resize(PATH_MAX, b'a');
        let mut scratch = PathScratch::new();
        let err = scratch
            .resolve(NormalizedPathBuf::root().as_path(), &path)
            .unwrap_err();
        assert_eq!(err.kind(), SdmcErrorKind::NameTooLong);

        path.pop();
        let resolved = scratch
            .resolve(NormalizedPathBuf::root().as_path(), &path)
            .unwrap();
        assert_eq!(resolved.wire.units().len(), PATH_MAX - 1);
        assert_eq!(resolved.wire.units_with_nul().last(), Some(&0));
    }

    #[test]
    fn resolve_produces_matching_wire_path() {
        let cwd = NormalizedPathBuf(String::from("/日本/"));
        let mut scratch = PathScratch::new();
        let resolved = scratch.resolve(cwd.as_path(), "sdmc:ファイル".as_bytes()).unwrap();
        assert_eq!(resolved.path.as_str(), "/日本/ファイル");
        assert_eq!(resolved.wire.to_string_lossy(), "/日本/ファイル");
    }

    #[test]
    fn copied_results_survive_later_calls() {
        let mut scratch = PathScratch::new();
        let root = NormalizedPathBuf::root();
        let first = scratch.resolve(root.as_path(), b"/old").unwrap().wire.to_path_buf();
        let second = scratch.resolve(root.as_path(), b"/new").unwrap().wire.to_string_lossy();
        assert_eq!(first.as_path().to_string_lossy(), "/old");
        assert_eq!(second, "/new");
    }

    #[test]
    fn nested_scratch_use_does_not_clobber() {
        let root = NormalizedPathBuf::root();
        with_scratch(|outer| {
            let outer_path = outer.normalize(root.as_path(), b"/outer").unwrap();
            let inner = with_scratch(|inner| {
                inner
                    .normalize(root.as_path(), b"/inner")
                    .unwrap()
                    .to_path_buf()
            });
            assert_eq!(outer_path.as_str(), "/outer");
            assert_eq!(inner.as_str(), "/inner");
        });
    }

    #[test]
    fn directory_form_ends_with_slash() {
        let dir = NormalizedPathBuf(String::from("/3ds")).into_directory().unwrap();
        assert_eq!(dir.as_str(), "/3ds/");
        assert_eq!(NormalizedPathBuf::root().into_directory().unwrap().as_str(), "/");
    }
}
