//! Identity-safe references.
//!
//! A [`SafeRef`] points at a shared value without owning it and hashes that
//! value through a reentrancy guard. When hashing a value transitively asks
//! for the hash of the same reference again, the inner request gets the
//! stand-in [`REENTRANT_HASH`] instead of recursing forever.

use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::canonical::stable_hash;

/// Integer signature produced by structural hashing.
pub type Signature = u64;

/// Stand-in returned when a reference is hashed while its own hash is in flight.
pub const REENTRANT_HASH: Signature = 0x2545_f491_4f6c_dd1d;

/// Hash of a reference whose referent has been dropped.
pub const UNAVAILABLE_HASH: Signature = 0xd6e8_feb8_6659_fd93;

/// Hash substituted when the referent's own hash fails.
pub const FAILED_HASH: Signature = 0xa076_1d64_78bd_642f;

static NEXT_REF_ID: AtomicU64 = AtomicU64::new(0);

fn next_ref_id() -> u64 {
    NEXT_REF_ID.fetch_add(1, Ordering::Relaxed)
}

/// Error raised by a referent's structural hash.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    /// The referent is mutably borrowed and cannot be read.
    #[error("referent is mutably borrowed")]
    Busy,
    /// The referent's hash panicked.
    #[error("referent hash panicked: {0}")]
    Panicked(String),
    /// Any other failure reported by the referent.
    #[error("{0}")]
    Custom(String),
}

/// Structural hash that may fail.
///
/// Implementations may recurse into other values, including values held
/// through [`SafeRef`]s, which is where cycles get cut.
pub trait StructuralHash {
    /// Compute the structural hash of `self`.
    fn structural_hash(&self) -> Result<Signature, HashError>;
}

macro_rules! stable_structural_hash {
    ($($ty:ty),* $(,)?) => {
        $(
            impl StructuralHash for $ty {
                fn structural_hash(&self) -> Result<Signature, HashError> {
                    Ok(stable_hash(self))
                }
            }
        )*
    };
}

stable_structural_hash!(
    u8, u16, u32, u64, u128, usize,
    i8, i16, i32, i64, i128, isize,
    bool, char, String, &str,
);

/// Hash a value outside of any reference, absorbing failures.
///
/// Panics and `Err` results are logged and replaced by [`FAILED_HASH`].
pub(crate) fn settled_hash<T: StructuralHash + ?Sized>(value: &T, ref_id: Option<u64>) -> Signature {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| value.structural_hash()))
        .unwrap_or_else(|payload| Err(HashError::Panicked(panic_message(payload.as_ref()))));

    match outcome {
        Ok(signature) => signature,
        Err(e) => {
            tracing::warn!(
                ref_id = ?ref_id,
                error = %e,
                "Structural hash failed, substituting fallback"
            );
            FAILED_HASH
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Clears the hashing flag when dropped, including during unwinding.
struct HashingGuard<'a>(&'a Cell<bool>);

impl Drop for HashingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Non-owning, reentrancy-guarded reference to a shared value.
pub struct SafeRef<T> {
    id: u64,
    referent: Weak<T>,
    hashing: Cell<bool>,
}

impl<T> SafeRef<T> {
    /// Create a reference to a shared value. The reference does not keep it alive.
    pub fn new(value: &Rc<T>) -> Self {
        Self {
            id: next_ref_id(),
            referent: Rc::downgrade(value),
            hashing: Cell::new(false),
        }
    }

    /// Create a reference whose value is already unavailable.
    pub fn dangling() -> Self {
        Self {
            id: next_ref_id(),
            referent: Weak::new(),
            hashing: Cell::new(false),
        }
    }

    /// Process-wide unique id, increasing in creation order.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The referent, if it is still alive.
    pub fn value(&self) -> Option<Rc<T>> {
        self.referent.upgrade()
    }

    /// Whether a hash of this reference is currently in flight.
    pub fn is_hashing(&self) -> bool {
        self.hashing.get()
    }

    /// Whether this reference points at the given shared value.
    pub fn points_to(&self, value: &Rc<T>) -> bool {
        std::ptr::eq(self.referent.as_ptr(), Rc::as_ptr(value))
    }
}

impl<T: StructuralHash> SafeRef<T> {
    /// Hash of the referent, guarded against reentry on this reference.
    pub fn signature(&self) -> Signature {
        if self.hashing.replace(true) {
            return REENTRANT_HASH;
        }
        let _guard = HashingGuard(&self.hashing);

        match self.referent.upgrade() {
            Some(value) => settled_hash(value.as_ref(), Some(self.id)),
            None => UNAVAILABLE_HASH,
        }
    }
}

impl<T: StructuralHash + PartialEq> SafeRef<T> {
    /// Whether this reference holds `value` and hashes like it.
    ///
    /// `target` caches the hash of `value`, computed once a value-equal
    /// referent is found.
    pub(crate) fn matches(&self, value: &T, target: &mut Option<Signature>) -> bool {
        match self.value() {
            Some(held) if *held == *value => {
                let expected = *target.get_or_insert_with(|| settled_hash(value, None));
                self.signature() == expected
            }
            _ => false,
        }
    }
}

impl<T: StructuralHash + PartialEq> PartialEq for SafeRef<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => *a == *b && self.signature() == other.signature(),
            (None, None) => self.id == other.id,
            _ => false,
        }
    }
}

impl<T> fmt::Debug for SafeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeRef")
            .field("id", &self.id)
            .field("available", &(self.referent.strong_count() > 0))
            .field("hashing", &self.hashing.get())
            .finish()
    }
}
