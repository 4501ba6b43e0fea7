//! Écritures sur la sortie standard.
//!
//! Chaque appel écrit puis force un `flush` : aucun état bufferisé n’est
//! conservé d’un appel à l’autre, donc la sortie survit à un `aster_panic`
//! (abort) qui suivrait immédiatement.
//!
//! Les variantes `*_to` prennent n’importe quel `Write` (tests en mémoire).

use std::ffi::{c_char, c_int, c_longlong, CStr};
use std::io::{self, Write};

/// Terminateur de ligne écrit par `print_newline` / `put_line`.
pub const NEWLINE: u8 = b'\n';

// ==============================
// API générique (Write)
// ==============================

/// Écrit `data` tel quel puis flush.
pub fn write_bytes_to<W: Write + ?Sized>(w: &mut W, data: &[u8]) -> io::Result<()> {
    w.write_all(data)?;
    w.flush()
}

/// Écrit `text` suivi d’un saut de ligne ; renvoie le nombre d’octets écrits.
pub fn put_line_to<W: Write + ?Sized>(w: &mut W, text: &[u8]) -> io::Result<usize> {
    let mut line = Vec::with_capacity(text.len() + 1);
    line.extend_from_slice(text);
    line.push(NEWLINE);
    write_bytes_to(w, &line)?;
    Ok(line.len())
}

/// Représentation décimale d’un `i64` (signe `-` éventuel, pas de padding).
pub fn print_int_to<W: Write + ?Sized>(w: &mut W, value: i64) -> io::Result<()> {
    write!(w, "{value}")?;
    w.flush()
}

pub fn print_newline_to<W: Write + ?Sized>(w: &mut W) -> io::Result<()> {
    write_bytes_to(w, &[NEWLINE])
}

// ==============================
// Sortie standard du process
// ==============================

pub fn write_bytes(data: &[u8]) -> io::Result<()> {
    write_bytes_to(&mut io::stdout().lock(), data)
}

pub fn put_line(text: &[u8]) -> io::Result<usize> {
    put_line_to(&mut io::stdout().lock(), text)
}

pub fn print_int(value: i64) -> io::Result<()> {
    print_int_to(&mut io::stdout().lock(), value)
}

pub fn print_newline() -> io::Result<()> {
    print_newline_to(&mut io::stdout().lock())
}

fn log_failure(what: &str, e: &io::Error) {
    log::debug!(target: "aster::io", "{what}: écriture stdout échouée: {e}");
}

// -----------------------------
// ABI C
// -----------------------------

/// `void aster_write_stdout(const char* ptr, size_t len)`
///
/// # Safety
/// `ptr` pointe sur `len` octets lisibles (ou est nul, auquel cas rien n’est écrit).
#[cfg_attr(feature = "exports", no_mangle)]
pub unsafe extern "C" fn aster_write_stdout(ptr: *const c_char, len: usize) {
    if ptr.is_null() || len == 0 {
        return;
    }
    // SAFETY: contrat de l’appelant.
    let data = unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), len) };
    if let Err(e) = write_bytes(data) {
        log_failure("aster_write_stdout", &e);
    }
}

/// `int aster_puts(const char* str)` — octets écrits (texte + `\n`) ou `-1`.
///
/// # Safety
/// `s` est nul ou pointe sur une chaîne terminée par NUL.
#[cfg_attr(feature = "exports", no_mangle)]
pub unsafe extern "C" fn aster_puts(s: *const c_char) -> c_int {
    if s.is_null() {
        return -1;
    }
    // SAFETY: contrat de l’appelant.
    let text = unsafe { CStr::from_ptr(s) }.to_bytes();
    match put_line(text) {
        Ok(n) => c_int::try_from(n).unwrap_or(c_int::MAX),
        Err(e) => {
            log_failure("aster_puts", &e);
            -1
        }
    }
}

/// `void aster_print_int(long long value)`
#[cfg_attr(feature = "exports", no_mangle)]
pub extern "C" fn aster_print_int(value: c_longlong) {
    if let Err(e) = print_int(value) {
        log_failure("aster_print_int", &e);
    }
}

/// `void aster_println(void)`
#[cfg_attr(feature = "exports", no_mangle)]
pub extern "C" fn aster_println() {
    if let Err(e) = print_newline() {
        log_failure("aster_println", &e);
    }
}
