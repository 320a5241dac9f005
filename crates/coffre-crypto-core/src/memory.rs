//! Storage for derived key bytes.
//!
//! A derived key exists only for the span of one seal or open. It lives in a
//! [`SecretBuffer`], which wipes its heap copy when dropped, asks the kernel to
//! keep that copy out of swap, and never formats its contents.

use std::fmt;

use secrecy::{ExposeSecret, SecretSlice};

use crate::error::CryptoError;

// ---------------------------------------------------------------------------
// SecretBuffer
// ---------------------------------------------------------------------------

/// Heap-allocated key bytes, zeroized on drop by `secrecy`.
pub struct SecretBuffer {
    bytes: SecretSlice<u8>,
    pin: MemLock,
}

impl SecretBuffer {
    /// Copy `data` into a new buffer and try to pin it in RAM.
    ///
    /// `data` is left untouched; wiping it is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SecureMemory`] if the copy cannot be made.
    pub fn new(data: &[u8]) -> Result<Self, CryptoError> {
        let mut copy = Vec::new();
        copy.try_reserve_exact(data.len())
            .map_err(|e| CryptoError::SecureMemory(format!("key buffer allocation failed: {e}")))?;
        copy.extend_from_slice(data);

        let bytes: SecretSlice<u8> = copy.into();
        let pin = MemLock::acquire(bytes.expose_secret());
        Ok(Self { bytes, pin })
    }

    /// Borrow the key for one cipher call.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.bytes.expose_secret()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.expose().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    /// Whether the kernel accepted the `mlock` request.
    #[must_use]
    pub const fn is_mlocked(&self) -> bool {
        self.pin.held
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

impl fmt::Display for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Pinning
// ---------------------------------------------------------------------------

/// An `mlock` on the buffer's heap range, released on drop.
///
/// Failure to pin is tolerated: the buffer still zeroizes.
struct MemLock {
    addr: usize,
    len: usize,
    held: bool,
}

impl MemLock {
    fn acquire(region: &[u8]) -> Self {
        let held = sys::lock(region.as_ptr(), region.len());
        if !held {
            static ONCE: std::sync::Once = std::sync::Once::new();
            ONCE.call_once(|| {
                tracing::warn!(
                    bytes = region.len(),
                    "could not mlock derived key; it may reach swap"
                );
            });
        }
        Self {
            addr: region.as_ptr() as usize,
            len: region.len(),
            held,
        }
    }
}

impl Drop for MemLock {
    fn drop(&mut self) {
        if self.held {
            sys::unlock(self.addr as *const u8, self.len);
        }
    }
}

// ---------------------------------------------------------------------------
// Process hardening
// ---------------------------------------------------------------------------

/// Forbid core dumps for this process (`RLIMIT_CORE = 0`). No-op off Unix.
///
/// # Errors
///
/// Returns [`CryptoError::SecureMemory`] if the limit cannot be set.
pub fn disable_core_dumps() -> Result<(), CryptoError> {
    sys::no_core_dumps()
}

#[cfg(unix)]
mod sys {
    use crate::error::CryptoError;

    pub(super) fn lock(ptr: *const u8, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        // SAFETY: mlock only inspects the range; a bad range fails with ENOMEM.
        unsafe { libc::mlock(ptr.cast(), len) == 0 }
    }

    pub(super) fn unlock(ptr: *const u8, len: usize) {
        if len == 0 {
            return;
        }
        // SAFETY: same range that `lock` accepted; the result is irrelevant.
        unsafe {
            libc::munlock(ptr.cast(), len);
        }
    }

    pub(super) fn no_core_dumps() -> Result<(), CryptoError> {
        let zero = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: `zero` is a valid rlimit on the stack.
        if unsafe { libc::setrlimit(libc::RLIMIT_CORE, &raw const zero) } == 0 {
            Ok(())
        } else {
            Err(CryptoError::SecureMemory(format!(
                "setrlimit(RLIMIT_CORE) failed: {}",
                std::io::Error::last_os_error()
            )))
        }
    }
}

#[cfg(not(unix))]
mod sys {
    use crate::error::CryptoError;

    pub(super) fn lock(_ptr: *const u8, _len: usize) -> bool {
        false
    }

    pub(super) fn unlock(_ptr: *const u8, _len: usize) {}

    pub(super) fn no_core_dumps() -> Result<(), CryptoError> {
        Ok(())
    }
}
