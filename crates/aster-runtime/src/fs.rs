//! Lecture d’un fichier entier dans un buffer possédé.
//!
//! Séquence : ouverture → taille (`metadata`) → allocation `taille + 1` →
//! lecture de `taille` octets → terminateur NUL. Tout écart (taille non
//! représentable, allocation refusée, lecture courte, erreur d’E/S) donne une
//! erreur récupérable ; le fichier et le buffer partiel sont rendus par leurs
//! `Drop` avant le retour.
//!
//! Aucun verrou n’est pris sur le fichier : s’il rétrécit entre la mesure et
//! la lecture, on obtient `ShortRead`, pas un crash.

use std::ffi::{c_char, CStr};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::ptr;

use thiserror::Error;

use crate::heap::{HostAllocator, LibcAllocator, RawBuffer};

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("ouverture de {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("taille indéterminable: {0}")]
    Metadata(#[source] io::Error),

    #[error("taille non représentable: {size} octets")]
    TooLarge { size: u64 },

    #[error("allocation de {size} octets refusée")]
    Alloc { size: usize },

    #[error("lecture courte: {got}/{expected} octets")]
    ShortRead { expected: usize, got: usize },

    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// Contenu exact d’un fichier + terminateur NUL implicite (non compté dans `len`).
pub struct FileBuffer<A: HostAllocator = LibcAllocator> {
    buf: RawBuffer<A>,
    len: usize,
}

impl<A: HostAllocator> std::fmt::Debug for FileBuffer<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBuffer").field("len", &self.len).finish_non_exhaustive()
    }
}

impl<A: HostAllocator> FileBuffer<A> {
    /// Nombre d’octets réels (sans le terminateur).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf.as_slice()[..self.len]
    }

    /// Contenu suivi du terminateur.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.buf.as_slice()[..=self.len]
    }

    /// Cède `(pointeur, len)` à l’appelant, qui libère via l’allocateur d’origine.
    pub fn into_raw(self) -> (*mut u8, usize) {
        (self.buf.into_raw(), self.len)
    }
}

/// ReadFile(path) avec l’allocateur hôte (`malloc`).
pub fn read_file(path: impl AsRef<Path>) -> Result<FileBuffer, ReadError> {
    read_file_with(LibcAllocator, path)
}

/// ReadFile(path) avec un allocateur explicite.
pub fn read_file_with<A: HostAllocator>(
    host: A,
    path: impl AsRef<Path>,
) -> Result<FileBuffer<A>, ReadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ReadError::Open { path: path.to_path_buf(), source })?;
    let size = file.metadata().map_err(ReadError::Metadata)?.len();
    read_sized(file, size, host)
}

/// Lit exactement `size` octets de `reader` dans un buffer `size + 1`.
///
/// `size` est la taille annoncée par l’hôte ; un flux qui en fournit moins
/// donne `ShortRead`. Les octets au-delà de `size` ne sont pas consommés.
pub fn read_sized<R: Read, A: HostAllocator>(
    mut reader: R,
    size: u64,
    host: A,
) -> Result<FileBuffer<A>, ReadError> {
    let len = usize::try_from(size)
        .ok()
        .filter(|&n| n < isize::MAX as usize)
        .ok_or(ReadError::TooLarge { size })?;
    let total = len + 1;
    let mut buf = RawBuffer::try_new_in(total, host).ok_or(ReadError::Alloc { size: total })?;

    let got = fill(&mut reader, &mut buf.as_mut_slice()[..len])?;
    if got != len {
        return Err(ReadError::ShortRead { expected: len, got });
    }
    buf.as_mut_slice()[len] = 0;
    Ok(FileBuffer { buf, len })
}

/// Remplit `dst` autant que possible ; s’arrête à EOF.
fn fill<R: Read>(reader: &mut R, dst: &mut [u8]) -> io::Result<usize> {
    let mut off = 0;
    while off < dst.len() {
        match reader.read(&mut dst[off..]) {
            Ok(0) => break,
            Ok(n) => off += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(off)
}

#[cfg(unix)]
fn cstr_to_path(s: &CStr) -> Option<PathBuf> {
    use std::os::unix::ffi::OsStrExt;
    Some(PathBuf::from(std::ffi::OsStr::from_bytes(s.to_bytes())))
}

#[cfg(not(unix))]
fn cstr_to_path(s: &CStr) -> Option<PathBuf> {
    s.to_str().ok().map(PathBuf::from)
}

// -----------------------------
// ABI C
// -----------------------------

/// `char* aster_read_file(const char* path, size_t* out_len)`
///
/// Buffer NUL-terminé à libérer avec `aster_free`, ou nul en cas d’échec
/// (`*out_len` n’est alors pas modifié).
///
/// # Safety
/// `path` est nul ou une chaîne NUL-terminée ; `out_len` est nul ou inscriptible.
#[cfg_attr(feature = "exports", no_mangle)]
pub unsafe extern "C" fn aster_read_file(path: *const c_char, out_len: *mut usize) -> *mut c_char {
    if path.is_null() || out_len.is_null() {
        return ptr::null_mut();
    }
    // SAFETY: contrat de l’appelant.
    let raw = unsafe { CStr::from_ptr(path) };
    let Some(path) = cstr_to_path(raw) else {
        log::debug!(target: "aster::fs", "chemin non représentable: {raw:?}");
        return ptr::null_mut();
    };
    match read_file(&path) {
        Ok(fb) => {
            let (p, len) = fb.into_raw();
            // SAFETY: out_len non nul, inscriptible (contrat).
            unsafe { out_len.write(len) };
            p.cast()
        }
        Err(e) => {
            log::debug!(target: "aster::fs", "aster_read_file({}): {e}", path.display());
            ptr::null_mut()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::ptr::NonNull;

    /// Refuse tout.
    struct Exhausted;
    impl HostAllocator for Exhausted {
        fn alloc(&self, _size: usize) -> Option<NonNull<u8>> {
            None
        }
        unsafe fn release(&self, _ptr: NonNull<u8>) {}
    }

    /// Lecteur qui échoue après quelques octets.
    struct Flaky(usize);
    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0 == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "disque parti"));
            }
            let n = self.0.min(buf.len());
            buf[..n].fill(b'z');
            self.0 -= n;
            Ok(n)
        }
    }

    /// Lecteur qui rend un octet à la fois, avec un EINTR au milieu.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        interrupted: bool,
    }
    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pos == 1 && !self.interrupted {
                self.interrupted = true;
                return Err(io::ErrorKind::Interrupted.into());
            }
            if self.pos >= self.data.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn exact_content_plus_terminator() {
        let fb = read_sized(Cursor::new(b"abc".to_vec()), 3, LibcAllocator).unwrap();
        assert_eq!(fb.len(), 3);
        assert_eq!(fb.as_bytes(), b"abc");
        assert_eq!(fb.as_bytes_with_nul(), b"abc\0");
    }

    #[test]
    fn empty_source_is_present_with_len_zero() {
        let fb = read_sized(io::empty(), 0, LibcAllocator).unwrap();
        assert!(fb.is_empty());
        assert_eq!(fb.as_bytes_with_nul(), b"\0");
    }

    #[test]
    fn shrunk_source_is_a_short_read() {
        let err = read_sized(Cursor::new(b"ab".to_vec()), 5, LibcAllocator).unwrap_err();
        assert!(matches!(err, ReadError::ShortRead { expected: 5, got: 2 }), "{err:?}");
    }

    #[test]
    fn grown_source_is_truncated_to_announced_size() {
        let fb = read_sized(Cursor::new(b"abcdef".to_vec()), 4, LibcAllocator).unwrap();
        assert_eq!(fb.as_bytes(), b"abcd");
    }

    #[test]
    fn mid_read_error_is_reported() {
        let err = read_sized(Flaky(3), 10, LibcAllocator).unwrap_err();
        assert!(matches!(err, ReadError::Io(_)), "{err:?}");
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let src = Trickle { data: b"xyz".to_vec(), pos: 0, interrupted: false };
        let fb = read_sized(src, 3, LibcAllocator).unwrap();
        assert_eq!(fb.as_bytes(), b"xyz");
    }

    #[test]
    fn unrepresentable_size() {
        let err = read_sized(io::empty(), u64::MAX, LibcAllocator).unwrap_err();
        assert!(matches!(err, ReadError::TooLarge { size: u64::MAX }), "{err:?}");
    }

    #[test]
    fn allocation_refusal_is_recoverable() {
        let err = read_sized(Cursor::new(vec![1u8; 8]), 8, Exhausted).unwrap_err();
        assert!(matches!(err, ReadError::Alloc { size: 9 }), "{err:?}");
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.aster");
        let err = read_file(&missing).unwrap_err();
        assert!(matches!(err, ReadError::Open { .. }));
        assert!(err.to_string().contains("nope.aster"));
    }

    #[test]
    fn c_entry_rejects_null_arguments() {
        let mut len = 77usize;
        unsafe {
            assert!(aster_read_file(ptr::null(), &mut len).is_null());
            assert!(aster_read_file(c"/dev/null".as_ptr(), ptr::null_mut()).is_null());
        }
        assert_eq!(len, 77);
    }
}
