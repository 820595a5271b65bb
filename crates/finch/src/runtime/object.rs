//! Objects and reference counting for the `Finch` runtime.
//!
//! Every instance is a heap-allocated [`RawObject`] holding:
//! - the class handle used for dispatch
//! - an atomic reference count, starting at 1
//! - a class-specific payload (the instance's "ivars")
//!
//! [`Object`] is an owning handle. `Clone` (or [`Object::inc_ref`]) takes a
//! new reference; dropping a handle (or [`Object::dec_ref`]) gives one back.
//! When the last handle goes away the class's destroy chain runs, the payload
//! is dropped and the storage is freed, exactly once. The chain sees the
//! object with a count of 1 and may take temporary references to it, but
//! must give them all back; a reference that outlives teardown aborts.
//!
//! # Thread Safety
//!
//! Handles are `Send + Sync`. Increments use `Relaxed`; decrements use
//! `Release` with an `Acquire` fence before teardown, so every write made
//! through any handle is visible to the destroy chain.

use crate::error::{Error, Result};
use crate::runtime::vtable::Payload;
use crate::runtime::{Class, Str};
use finch_log::{error, trace};
use std::any::Any;
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::ManuallyDrop;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering, fence};

/// Highest reference count an object may reach.
const MAX_REFCOUNT: u32 = i32::MAX as u32;

/// Heap representation of an instance.
pub(crate) struct RawObject {
    class: Class,
    refcount: AtomicU32,
    payload: Payload,
}

/// Owning, reference-counted handle to a runtime object.
///
/// ```rust
/// use finch::{Class, Str};
///
/// let text = Str::new("hello");
/// let obj = text.as_object().clone();
/// assert_eq!(obj.refcount(), 2);
///
/// drop(text);
/// assert_eq!(obj.refcount(), 1);
/// assert!(obj.is_a(&Class::root()));
/// ```
pub struct Object {
    ptr: NonNull<RawObject>,
}

// SAFETY: the refcount is atomic, the class handle is immutable and the
// payload is `Send + Sync`.
unsafe impl Send for Object {}
unsafe impl Sync for Object {}

impl Object {
    /// Allocates an instance of `class` with refcount 1.
    pub(crate) fn alloc(class: Class, payload: Payload) -> Self {
        let raw = Box::new(RawObject {
            class,
            refcount: AtomicU32::new(1),
            payload,
        });

        Object {
            ptr: NonNull::from(Box::leak(raw)),
        }
    }

    #[inline]
    fn raw(&self) -> &RawObject {
        // SAFETY: a live handle keeps the allocation alive.
        unsafe { self.ptr.as_ref() }
    }

    /// Takes another reference to this object.
    ///
    /// # Panics
    ///
    /// Panics if the count would exceed `i32::MAX`. Reviving an object whose
    /// count already reached zero aborts the process.
    #[must_use]
    pub fn inc_ref(&self) -> Object {
        let old = self.raw().refcount.fetch_add(1, Ordering::Relaxed);

        if old == 0 {
            error!(
                "attempt to resurrect {}@{:#x} during teardown",
                self.class_name(),
                self.addr()
            );
            std::process::abort();
        }
        if old >= MAX_REFCOUNT {
            self.raw().refcount.fetch_sub(1, Ordering::Relaxed);
            panic!("Reference count overflow on {}", self.class_name());
        }

        Object { ptr: self.ptr }
    }

    /// Gives this reference back. Same as dropping the handle.
    pub fn dec_ref(self) {
        drop(self);
    }

    /// Current reference count. Another thread may change it at any time.
    #[must_use]
    pub fn refcount(&self) -> u32 {
        self.raw().refcount.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn class(&self) -> Class {
        self.raw().class
    }

    #[must_use]
    pub fn class_name(&self) -> &'static str {
        self.raw().class.name()
    }

    /// True if the object's class is `class` or descends from it.
    #[must_use]
    pub fn is_a(&self, class: &Class) -> bool {
        self.raw().class.is_subclass_of(class)
    }

    /// Address of the underlying allocation.
    #[must_use]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr().addr()
    }

    /// True if both handles refer to the same object.
    #[must_use]
    pub fn is_same(&self, other: &Object) -> bool {
        self.ptr == other.ptr
    }

    /// Typed view of the payload, `None` if it holds a different type.
    #[must_use]
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.raw().payload.downcast_ref::<T>()
    }

    /// Returns `self` if it is an instance of `class`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassMismatch`] otherwise.
    pub fn certify(&self, class: &Class) -> Result<&Object> {
        if self.is_a(class) {
            Ok(self)
        } else {
            Err(Error::class_mismatch(class.name(), self.class_name()))
        }
    }

    /// Runs the class's initializer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AbstractMethod`] if the class never overrode `init`,
    /// or whatever the override reports.
    pub fn init(self) -> Result<Object> {
        let init = self.class().vtable().init;
        init(self)
    }

    #[must_use]
    pub fn equals(&self, other: &Object) -> bool {
        let equals = self.class().vtable().equals;
        equals(self, other)
    }

    /// 32-bit hash, consistent with [`Object::equals`].
    #[must_use]
    pub fn hash_sum(&self) -> u32 {
        let hash_sum = self.class().vtable().hash_sum;
        hash_sum(self)
    }

    /// Dispatches `to_string`.
    #[must_use]
    pub fn to_str(&self) -> Str {
        let to_string = self.class().vtable().to_string;
        to_string(self)
    }

    /// Dispatches `clone`. Unlike [`Clone::clone`], this asks the class for a
    /// copy instead of taking another reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AbstractMethod`] if the class never overrode it.
    pub fn clone_obj(&self) -> Result<Object> {
        let clone = self.class().vtable().clone;
        clone(self)
    }

    /// # Errors
    ///
    /// Returns [`Error::AbstractMethod`] if the class never overrode it.
    pub fn compare_to(&self, other: &Object) -> Result<CmpOrdering> {
        let compare_to = self.class().vtable().compare_to;
        compare_to(self, other)
    }

    /// # Errors
    ///
    /// Returns [`Error::AbstractMethod`] if the class never overrode it.
    pub fn to_i64(&self) -> Result<i64> {
        let to_i64 = self.class().vtable().to_i64;
        to_i64(self)
    }

    /// # Errors
    ///
    /// Returns [`Error::AbstractMethod`] if the class never overrode it.
    pub fn to_f64(&self) -> Result<f64> {
        let to_f64 = self.class().vtable().to_f64;
        to_f64(self)
    }

    /// Makes `self` take on the state of `other`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AbstractMethod`] if the class never overrode it.
    pub fn mimic(&self, other: &Object) -> Result<()> {
        let mimic = self.class().vtable().mimic;
        mimic(self, other)
    }

    /// Continues the destroy chain above `class`.
    ///
    /// `class` is the class whose destroy entry is currently running (the
    /// second argument it received). Does nothing for the root.
    pub fn super_destroy(&self, class: Class) {
        if let Some(parent) = class.parent() {
            let (destroy, owner) = parent.destroy_entry();
            destroy(self, owner);
        }
    }

    /// Runs the destroy chain and frees the allocation.
    ///
    /// # Safety
    ///
    /// The caller must have observed the count drop to zero, so no other
    /// handle to `ptr` exists.
    unsafe fn teardown(ptr: NonNull<RawObject>) {
        struct Reclaim(NonNull<RawObject>);

        impl Drop for Reclaim {
            fn drop(&mut self) {
                // SAFETY: the allocation came from `Box::leak` in `alloc`
                // and this guard is its only remaining owner.
                drop(unsafe { Box::from_raw(self.0.as_ptr()) });
            }
        }

        // Storage is freed even if a destroy entry panics.
        let _reclaim = Reclaim(ptr);
        let view = ManuallyDrop::new(Object { ptr });
        let class = view.class();
        trace!("destroying {}@{:#x}", class.name(), view.addr());

        // The view holds the last reference while the chain runs, so
        // references taken and released inside destroy balance out.
        view.raw().refcount.store(1, Ordering::Relaxed);

        let (destroy, owner) = class.destroy_entry();
        if std::thread::panicking() {
            // A second panic escaping here would abort the process.
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| destroy(&view, owner)));
            if outcome.is_err() {
                error!(
                    "destroy of {}@{:#x} panicked during unwinding",
                    class.name(),
                    view.addr()
                );
            }
        } else {
            destroy(&view, owner);
        }

        let left = view.raw().refcount.load(Ordering::Acquire);
        if left != 1 {
            error!(
                "{}@{:#x} left its destroy chain with refcount {}, expected 1",
                class.name(),
                view.addr(),
                left
            );
            std::process::abort();
        }
    }
}

impl Clone for Object {
    fn clone(&self) -> Self {
        self.inc_ref()
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        let old = self.raw().refcount.fetch_sub(1, Ordering::Release);
        debug_assert!(old != 0, "released an object with a zero refcount");

        if old != 1 {
            return;
        }

        fence(Ordering::Acquire);
        // SAFETY: this handle observed the 1 -> 0 transition.
        unsafe { Object::teardown(self.ptr) };
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash_sum());
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class_name())
            .field("refcount", &self.refcount())
            .field("addr", &format_args!("{:#x}", self.addr()))
            .finish()
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str().as_str())
    }
}
