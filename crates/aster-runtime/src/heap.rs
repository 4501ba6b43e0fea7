//! Shim d’allocation au-dessus de l’allocateur hôte.
//!
//! Politique :
//! - taille > 0 et l’hôte échoue → chemin fatal (`panic: allocation failed`) ;
//! - taille == 0 → jamais fatal, le résultat peut être absent ;
//! - libérer un pointeur nul est un no-op.
//!
//! Le contenu d’un bloc frais n’est pas garanti à zéro via `allocate_with`.
//! `RawBuffer`, lui, remet à zéro pour pouvoir exposer des slices.

use std::ffi::c_void;
use std::ptr::{self, NonNull};

use crate::panic::fatal;

/// Message du chemin fatal en cas d’épuisement mémoire.
pub const ALLOC_FAILED: &[u8] = b"allocation failed";

// ==============================
// Allocateurs hôtes
// ==============================

/// Abstraction de l’allocateur hôte (permet les allocateurs contraints/mocks).
pub trait HostAllocator {
    /// Demande `size` octets ; `None` si l’hôte refuse (ou renvoie nul pour 0).
    fn alloc(&self, size: usize) -> Option<NonNull<u8>>;

    /// Rend un bloc à l’hôte.
    ///
    /// # Safety
    /// `ptr` vient de `alloc` sur ce même allocateur et n’a pas déjà été rendu.
    unsafe fn release(&self, ptr: NonNull<u8>);
}

impl<A: HostAllocator + ?Sized> HostAllocator for &A {
    fn alloc(&self, size: usize) -> Option<NonNull<u8>> {
        (**self).alloc(size)
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        // SAFETY: même contrat, transmis tel quel.
        unsafe { (**self).release(ptr) }
    }
}

/// `malloc`/`free` de la libc.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcAllocator;

impl HostAllocator for LibcAllocator {
    fn alloc(&self, size: usize) -> Option<NonNull<u8>> {
        // SAFETY: malloc accepte toute taille et signale l’échec par nul.
        NonNull::new(unsafe { libc::malloc(size) }.cast::<u8>())
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        // SAFETY: ptr vient de malloc (contrat du trait).
        unsafe { libc::free(ptr.as_ptr().cast::<c_void>()) }
    }
}

/// Allocateur contraint : refuse toute demande au-delà de `max_request` octets.
#[derive(Debug, Clone, Copy)]
pub struct CappedAllocator<A = LibcAllocator> {
    inner: A,
    max_request: usize,
}

impl<A: HostAllocator> CappedAllocator<A> {
    pub const fn new(inner: A, max_request: usize) -> Self {
        Self { inner, max_request }
    }

    pub const fn max_request(&self) -> usize {
        self.max_request
    }
}

impl<A: HostAllocator> HostAllocator for CappedAllocator<A> {
    fn alloc(&self, size: usize) -> Option<NonNull<u8>> {
        if size > self.max_request {
            return None;
        }
        self.inner.alloc(size)
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        // SAFETY: le bloc vient de `inner` (on ne fait que filtrer les tailles).
        unsafe { self.inner.release(ptr) }
    }
}

// ==============================
// Politique d’échec
// ==============================

/// Allocate(size) : bloc de `size` octets, ou chemin fatal si l’hôte échoue
/// pour `size > 0`. Pour `size == 0`, un échec donne simplement `None`.
pub fn allocate_with<A: HostAllocator + ?Sized>(host: &A, size: usize) -> Option<NonNull<u8>> {
    match host.alloc(size) {
        Some(p) => Some(p),
        None if size == 0 => None,
        None => fatal(ALLOC_FAILED),
    }
}

/// Variante non fatale (lecture de fichier : l’échec y est récupérable).
pub fn try_allocate_with<A: HostAllocator + ?Sized>(host: &A, size: usize) -> Option<NonNull<u8>> {
    let p = host.alloc(size);
    if p.is_none() {
        log::debug!(target: "aster::heap", "allocation refusée ({size} octets)");
    }
    p
}

/// Release(buffer) : no-op sur nul.
///
/// # Safety
/// `ptr` est nul, ou vient de `host` et n’a pas déjà été rendu.
pub unsafe fn release_with<A: HostAllocator + ?Sized>(host: &A, ptr: *mut u8) {
    if let Some(p) = NonNull::new(ptr) {
        // SAFETY: contrat de l’appelant.
        unsafe { host.release(p) }
    }
}

// ==============================
// Buffer possédé
// ==============================

/// Région allouée possédée de façon exclusive ; rendue une seule fois au drop.
///
/// Le contenu est remis à zéro à la création. `into_raw` transfère la
/// propriété à l’appelant C (qui libère avec `aster_free`).
pub struct RawBuffer<A: HostAllocator = LibcAllocator> {
    ptr: NonNull<u8>,
    capacity: usize,
    host: A,
}

impl<A: HostAllocator> RawBuffer<A> {
    /// Alloue `capacity` octets (> 0) sans passer par le chemin fatal.
    pub fn try_new_in(capacity: usize, host: A) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        let ptr = try_allocate_with(&host, capacity)?;
        // SAFETY: bloc frais de `capacity` octets.
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, capacity) };
        Some(Self { ptr, capacity, host })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: région initialisée de `capacity` octets, possédée par self.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.capacity) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: idem, accès exclusif via &mut self.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.capacity) }
    }

    /// Cède le pointeur sans le libérer.
    pub fn into_raw(self) -> *mut u8 {
        let me = std::mem::ManuallyDrop::new(self);
        me.ptr.as_ptr()
    }
}

impl<A: HostAllocator> Drop for RawBuffer<A> {
    fn drop(&mut self) {
        // SAFETY: ptr vient de host.alloc et n’a jamais été cédé (sinon pas de drop).
        unsafe { self.host.release(self.ptr) }
    }
}

impl<A: HostAllocator> std::fmt::Debug for RawBuffer<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawBuffer").field("capacity", &self.capacity).finish_non_exhaustive()
    }
}

// -----------------------------
// ABI C
// -----------------------------

/// `void* aster_malloc(size_t size)`
#[cfg_attr(feature = "exports", no_mangle)]
pub extern "C" fn aster_malloc(size: usize) -> *mut c_void {
    allocate_with(&LibcAllocator, size).map_or(ptr::null_mut(), |p| p.as_ptr().cast())
}

/// `void aster_free(void* ptr)`
///
/// # Safety
/// `ptr` est nul ou vient de `aster_malloc`/`aster_read_file`, pas encore libéré.
#[cfg_attr(feature = "exports", no_mangle)]
pub unsafe extern "C" fn aster_free(ptr: *mut c_void) {
    // SAFETY: contrat de l’appelant.
    unsafe { release_with(&LibcAllocator, ptr.cast()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Compte les blocs vivants.
    #[derive(Default)]
    struct Counting {
        live: AtomicUsize,
        total: AtomicUsize,
    }

    impl HostAllocator for Counting {
        fn alloc(&self, size: usize) -> Option<NonNull<u8>> {
            let p = LibcAllocator.alloc(size.max(1))?;
            self.live.fetch_add(1, Ordering::SeqCst);
            self.total.fetch_add(1, Ordering::SeqCst);
            Some(p)
        }
        unsafe fn release(&self, ptr: NonNull<u8>) {
            self.live.fetch_sub(1, Ordering::SeqCst);
            unsafe { LibcAllocator.release(ptr) }
        }
    }

    /// Hôte qui refuse tout, y compris les demandes de taille nulle.
    struct Exhausted;
    impl HostAllocator for Exhausted {
        fn alloc(&self, _size: usize) -> Option<NonNull<u8>> {
            None
        }
        unsafe fn release(&self, _ptr: NonNull<u8>) {
            unreachable!("rien n’a été alloué")
        }
    }

    #[test]
    fn allocate_gives_usable_bytes() {
        let p = allocate_with(&LibcAllocator, 64).expect("64 octets");
        unsafe {
            ptr::write_bytes(p.as_ptr(), 0xAB, 64);
            assert_eq!(*p.as_ptr().add(63), 0xAB);
            LibcAllocator.release(p);
        }
    }

    #[test]
    fn zero_size_failure_is_not_fatal() {
        // On serait déjà mort si le chemin fatal avait été pris.
        assert!(allocate_with(&Exhausted, 0).is_none());
    }

    #[test]
    fn zero_size_may_return_a_block() {
        if let Some(p) = allocate_with(&LibcAllocator, 0) {
            unsafe { LibcAllocator.release(p) };
        }
    }

    #[test]
    fn release_null_is_noop() {
        unsafe {
            release_with(&Exhausted, ptr::null_mut());
            aster_free(ptr::null_mut());
        }
    }

    #[test]
    fn c_malloc_free_pair() {
        let p = aster_malloc(16);
        assert!(!p.is_null());
        unsafe { aster_free(p) };
    }

    #[test]
    fn capped_allocator_refuses_large_requests() {
        let capped = CappedAllocator::new(LibcAllocator, 32);
        assert_eq!(capped.max_request(), 32);
        assert!(try_allocate_with(&capped, 33).is_none());
        let p = try_allocate_with(&capped, 32).expect("sous le plafond");
        unsafe { capped.release(p) };
    }

    #[test]
    fn raw_buffer_is_zeroed_and_released_once() {
        let host = Counting::default();
        {
            let mut buf = RawBuffer::try_new_in(8, &host).unwrap();
            assert_eq!(buf.capacity(), 8);
            assert!(buf.as_slice().iter().all(|&b| b == 0));
            buf.as_mut_slice()[0] = 7;
            assert_eq!(buf.as_slice()[0], 7);
            assert_eq!(host.live.load(Ordering::SeqCst), 1);
        }
        assert_eq!(host.live.load(Ordering::SeqCst), 0);
        assert_eq!(host.total.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn raw_buffer_into_raw_transfers_ownership() {
        let host = Counting::default();
        let buf = RawBuffer::try_new_in(4, &host).unwrap();
        let raw = buf.into_raw();
        assert_eq!(host.live.load(Ordering::SeqCst), 1);
        unsafe { release_with(&host, raw) };
        assert_eq!(host.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn raw_buffer_reports_refusal() {
        assert!(RawBuffer::try_new_in(16, Exhausted).is_none());
        assert!(RawBuffer::try_new_in(0, LibcAllocator).is_none());
    }
}
