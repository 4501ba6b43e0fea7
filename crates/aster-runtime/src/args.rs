//! Vecteur d’arguments du process.
//!
//! Le loader possède `argv` ; on n’en garde qu’une vue (compte + pointeur),
//! posée une seule fois au démarrage par `aster_init_args`. L’`OnceCell`
//! fournit la barrière « initialisation avant toute lecture » entre threads.
//! Toute lecture avant initialisation donne un résultat absent.

use std::ffi::{c_char, c_int, c_longlong, CStr, CString, OsString};
use std::ptr;

use once_cell::sync::OnceCell;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgError {
    #[error("arguments déjà initialisés")]
    AlreadyInitialized,
    #[error("argc négatif: {0}")]
    NegativeCount(i64),
    #[error("argv nul avec argc > 0")]
    NullVector,
}

/// Vue non possédante sur `argc`/`argv`.
#[derive(Debug, Clone, Copy)]
pub struct ArgContext {
    argc: usize,
    argv: *const *const c_char,
}

// SAFETY: le vecteur vit toute la durée du process et n’est jamais modifié
// après l’initialisation (contrat de `from_raw`).
unsafe impl Send for ArgContext {}
// SAFETY: idem, accès en lecture seule.
unsafe impl Sync for ArgContext {}

impl ArgContext {
    /// Contexte vide (équivalent d’un process sans arguments).
    pub const fn empty() -> Self {
        Self { argc: 0, argv: ptr::null() }
    }

    /// Construit la vue depuis le couple C `(argc, argv)`.
    ///
    /// # Safety
    /// `argv` pointe sur `argc` pointeurs, chacun nul ou vers une chaîne
    /// terminée par NUL ; le tout reste valide et inchangé jusqu’à la fin du
    /// process.
    pub unsafe fn from_raw(argc: i64, argv: *const *const c_char) -> Result<Self, ArgError> {
        let count = usize::try_from(argc).map_err(|_| ArgError::NegativeCount(argc))?;
        if count > 0 && argv.is_null() {
            return Err(ArgError::NullVector);
        }
        Ok(Self { argc: count, argv })
    }

    /// Fabrique un `argv` à la C (terminé par un pointeur nul) à partir
    /// d’arguments du système, et le fait vivre jusqu’à la fin du process.
    ///
    /// Sert aux hôtes Rust (sonde, tests) qui jouent le rôle du `main` généré.
    /// Un octet NUL interne tronque l’argument à cet endroit.
    pub fn leak_from_os<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let owned: Vec<CString> = args.into_iter().map(|a| to_cstring(a.into())).collect();
        let owned: &'static [CString] = Box::leak(owned.into_boxed_slice());
        let mut ptrs: Vec<*const c_char> = owned.iter().map(|s| s.as_ptr()).collect();
        ptrs.push(ptr::null());
        let ptrs: &'static [*const c_char] = Box::leak(ptrs.into_boxed_slice());
        Self { argc: owned.len(), argv: ptrs.as_ptr() }
    }

    /// Couple `(argc, argv)` à passer à `aster_init_args`.
    pub fn as_raw(&self) -> (usize, *const *const c_char) {
        (self.argc, self.argv)
    }

    pub fn count(&self) -> usize {
        self.argc
    }

    /// Argument `index`, ou `None` hors de `[0, count)` (jamais de lecture hors bornes).
    pub fn get(&self, index: usize) -> Option<&'static CStr> {
        if index >= self.argc {
            return None;
        }
        // SAFETY: index < argc et argv non nul (garanti par from_raw / leak_from_os).
        let p = unsafe { *self.argv.add(index) };
        if p.is_null() {
            return None;
        }
        // SAFETY: chaîne NUL-terminée valide pour la durée du process.
        Some(unsafe { CStr::from_ptr(p) })
    }

    /// Variante pour l’ABI : index signé, pointeur nul si absent.
    pub fn get_raw(&self, index: i64) -> *const c_char {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.get(i))
            .map_or(ptr::null(), CStr::as_ptr)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&'static CStr>> + '_ {
        (0..self.argc).map(move |i| self.get(i))
    }
}

impl Default for ArgContext {
    fn default() -> Self {
        Self::empty()
    }
}

fn to_cstring(arg: OsString) -> CString {
    let mut bytes = arg.into_encoded_bytes();
    if let Some(nul) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(nul);
    }
    // Plus aucun NUL après la troncature.
    CString::new(bytes).unwrap_or_default()
}

// ==============================
// Handle global (écrit une fois)
// ==============================

static ARGS: OnceCell<ArgContext> = OnceCell::new();

/// Pose le contexte global. Un second appel est refusé (la vue ne change jamais).
pub fn init(ctx: ArgContext) -> Result<(), ArgError> {
    let argc = ctx.count();
    ARGS.set(ctx).map_err(|_| ArgError::AlreadyInitialized)?;
    log::trace!(target: "aster::args", "arguments initialisés (argc={argc})");
    Ok(())
}

pub fn is_initialized() -> bool {
    ARGS.get().is_some()
}

/// ArgumentCount() : 0 tant que rien n’est initialisé.
pub fn count() -> usize {
    ARGS.get().map_or(0, ArgContext::count)
}

/// ArgumentAt(index)
pub fn get(index: usize) -> Option<&'static CStr> {
    ARGS.get().and_then(|ctx| ctx.get(index))
}

// -----------------------------
// ABI C
// -----------------------------

/// `void aster_init_args(int argc, const char* const* argv)`
///
/// # Safety
/// Voir [`ArgContext::from_raw`].
#[cfg_attr(feature = "exports", no_mangle)]
pub unsafe extern "C" fn aster_init_args(argc: c_int, argv: *const *const c_char) {
    // SAFETY: contrat de l’appelant.
    let res = unsafe { ArgContext::from_raw(i64::from(argc), argv) }.and_then(init);
    if let Err(e) = res {
        log::warn!(target: "aster::args", "aster_init_args ignoré: {e}");
    }
}

/// `long long aster_argc(void)`
#[cfg_attr(feature = "exports", no_mangle)]
pub extern "C" fn aster_argc() -> c_longlong {
    c_longlong::try_from(count()).unwrap_or(c_longlong::MAX)
}

/// `const char* aster_argv(long long index)` — nul si hors bornes ou non initialisé.
#[cfg_attr(feature = "exports", no_mangle)]
pub extern "C" fn aster_argv(index: c_longlong) -> *const c_char {
    ARGS.get().map_or(ptr::null(), |ctx| ctx.get_raw(index))
}
