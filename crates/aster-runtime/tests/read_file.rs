//! tests/read_file.rs — lecture de fichiers entiers (API Rust + ABI C)

#![allow(unsafe_code)]

use std::ffi::CString;
use std::fs;
use std::path::Path;

use aster_runtime::fs::{aster_read_file, read_file, ReadError};
use aster_runtime::heap::aster_free;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn c_path(p: &Path) -> CString {
    CString::new(p.as_os_str().as_encoded_bytes()).unwrap()
}

#[test]
fn known_content_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.aster");
    fs::write(&path, "fn main() { print(\"é\") }\n").unwrap();

    let fb = read_file(&path).unwrap();
    assert_eq!(fb.as_bytes(), "fn main() { print(\"é\") }\n".as_bytes());
    assert_eq!(fb.len(), fs::metadata(&path).unwrap().len() as usize);
    assert_eq!(*fb.as_bytes_with_nul().last().unwrap(), 0);
}

#[test]
fn empty_file_is_present_with_zero_length() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let fb = read_file(file.path()).unwrap();
    assert!(fb.is_empty());
    assert_eq!(fb.len(), 0);
}

#[test]
fn missing_path_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_file(dir.path().join("missing")).unwrap_err();
    assert!(matches!(err, ReadError::Open { .. }), "{err:?}");
}

#[cfg(unix)]
#[test]
fn directory_is_absent_not_a_crash() {
    let dir = tempfile::tempdir().unwrap();
    assert!(read_file(dir.path()).is_err());
}

#[test]
fn c_entry_returns_terminated_buffer_and_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bytes.bin");
    let content = [0u8, 1, 2, 255, b'\n', 0];
    fs::write(&path, content).unwrap();

    let cp = c_path(&path);
    let mut len = usize::MAX;
    let buf = unsafe { aster_read_file(cp.as_ptr(), &mut len) };
    assert!(!buf.is_null());
    assert_eq!(len, content.len());
    let got = unsafe { std::slice::from_raw_parts(buf.cast::<u8>(), len + 1) };
    assert_eq!(&got[..len], &content);
    assert_eq!(got[len], 0);
    unsafe { aster_free(buf.cast()) };
}

#[test]
fn c_entry_failure_leaves_length_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let cp = c_path(&dir.path().join("nope"));
    let mut len = 1234usize;
    let buf = unsafe { aster_read_file(cp.as_ptr(), &mut len) };
    assert!(buf.is_null());
    assert_eq!(len, 1234);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn any_content_reads_back_exactly(content in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &content).unwrap();
        let fb = read_file(file.path()).unwrap();
        prop_assert_eq!(fb.len(), content.len());
        prop_assert_eq!(fb.as_bytes(), &content[..]);
    }
}
