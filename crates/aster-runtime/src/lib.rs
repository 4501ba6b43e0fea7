//! aster-runtime — intrinsics runtime du langage Aster
//!
//! Couche minimale liée par le code machine généré : tout ce que le langage
//! ne sait pas exprimer lui-même passe par ici (tas, panic, sortie standard,
//! arguments du process, lecture de fichiers).
//!
//! ## Modules
//! - `panic`   : rapporteur d’erreurs fatales (`panic: …` sur stderr puis `abort`).
//! - `heap`    : shim d’allocation (`malloc`/`free` hôte) + politique d’échec.
//! - `io`      : écritures stdout non bufferisées (octets, entiers, lignes).
//! - `process` : sortie propre du process.
//! - `args`    : vecteur d’arguments global, initialisé une seule fois.
//! - `fs`      : lecture d’un fichier entier dans un buffer possédé.
//! - `abi`     : table des symboles exportés (en-tête C, déclarations LLVM).
//!
//! ## Deux niveaux d’erreur
//! - **Fatal** : épuisement mémoire (taille > 0) → `panic::fatal`, jamais
//!   renvoyé comme valeur.
//! - **Récupérable** : fichier absent, index hors bornes, lecture courte…
//!   → `Result`/`Option` côté Rust, pointeur nul ou `-1` côté C.
//!
//! ## Features
//! - **exports** *(par défaut)* : émet les symboles `#[no_mangle] extern "C"`.
//! - **serde** : manifest ABI sérialisable en JSON.
//!
//! Le crate ne fait que des appels synchrones sur le thread appelant ; il
//! n’ajoute aucun verrou au-delà de ceux de l’allocateur et de stdout hôtes.

// Frontière FFI : les pointeurs bruts arrivent du code généré.
#![allow(unsafe_code)]
#![deny(rust_2018_idioms, unused_must_use)]

pub mod abi;
pub mod args;
pub mod fs;
pub mod heap;
pub mod io;
pub mod panic;
pub mod process;

// ---------- Reexports de confort ----------
pub use args::{ArgContext, ArgError};
pub use fs::{read_file, read_file_with, FileBuffer, ReadError};
pub use heap::{CappedAllocator, HostAllocator, LibcAllocator, RawBuffer};
pub use panic::{fatal, PANIC_PREFIX};

// ---------- Version ----------
/// Version du crate (lisible, via Cargo).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bannière de version (utile pour logs/outils).
pub fn version() -> String {
    format!("aster-runtime {VERSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_banner() {
        assert!(version().starts_with("aster-runtime "));
        assert!(version().ends_with(VERSION));
    }
}
