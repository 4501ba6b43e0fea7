//! Rapporteur d’erreurs fatales.
//!
//! Unique chemin non récupérable du runtime : une ligne `panic: <msg>` sur
//! stderr, puis `abort()`. Les handlers `atexit` ne tournent pas (contrairement
//! à `process::exit`).

use std::ffi::c_char;
use std::io::{self, Write};

/// Préfixe de la ligne de diagnostic.
pub const PANIC_PREFIX: &str = "panic: ";

/// Écrit le diagnostic puis termine le process anormalement. Ne revient jamais.
///
/// N’alloue pas : ce chemin sert aussi quand le tas est épuisé.
#[cold]
pub fn fatal(msg: &[u8]) -> ! {
    // Une erreur d’écriture ne change rien à l’issue.
    #[cfg(unix)]
    let _ = write_diagnostic(&mut RawStderr, msg);
    #[cfg(not(unix))]
    let _ = write_diagnostic(&mut io::stderr().lock(), msg);
    std::process::abort()
}

/// Écrit `panic: <msg>\n` sur `w`, sans tampon intermédiaire.
pub fn write_diagnostic<W: Write + ?Sized>(w: &mut W, msg: &[u8]) -> io::Result<()> {
    w.write_all(PANIC_PREFIX.as_bytes())?;
    w.write_all(msg)?;
    w.write_all(b"\n")?;
    w.flush()
}

/// Descripteur 2 via `write(2)` : ni verrou, ni tampon, ni allocation.
#[cfg(unix)]
struct RawStderr;

#[cfg(unix)]
impl Write for RawStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: `buf` est lisible sur toute sa longueur.
        let n = unsafe { libc::write(libc::STDERR_FILENO, buf.as_ptr().cast(), buf.len()) };
        usize::try_from(n).map_err(|_| io::Error::last_os_error())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// -----------------------------
// ABI C
// -----------------------------

/// `void aster_panic(const char* msg, size_t len)`
///
/// # Safety
/// `msg` doit pointer sur `len` octets lisibles, ou être nul.
#[cfg_attr(feature = "exports", no_mangle)]
pub unsafe extern "C" fn aster_panic(msg: *const c_char, len: usize) -> ! {
    let bytes: &[u8] = if msg.is_null() || len == 0 {
        &[]
    } else {
        // SAFETY: contrat de l’appelant (msg, len).
        unsafe { std::slice::from_raw_parts(msg.cast::<u8>(), len) }
    };
    fatal(bytes)
}
