//! Contrôle du process : sortie ordonnée.
//!
//! `exit` passe par `exit(3)` de l’hôte, donc les handlers `atexit` tournent.
//! Le chemin fatal (`panic::fatal`) les saute via `abort`.

use std::ffi::c_int;
use std::io::Write;

/// Vide stdout puis termine avec `code` (0 = succès). Ne revient jamais.
pub fn exit(code: i32) -> ! {
    // Chaque écriture est déjà flushée ; on couvre les `print!` du côté Rust.
    let _ = std::io::stdout().lock().flush();
    log::trace!(target: "aster::process", "exit({code})");
    std::process::exit(code)
}

/// `void aster_exit(int code)`
#[cfg_attr(feature = "exports", no_mangle)]
pub extern "C" fn aster_exit(code: c_int) -> ! {
    exit(code)
}
