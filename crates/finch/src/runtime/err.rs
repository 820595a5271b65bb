//! The `Err` class: recoverable faults as runtime objects.
//!
//! An [`ErrObject`] is an ordinary object (refcounted, dispatchable, an
//! instance of `Obj`) that carries a message. Creating one has no effect on
//! control flow. It only unwinds when [`ErrObject::throw`] is called, and
//! then only as far as the innermost [`trap`](crate::runtime::trap::trap).
//!
//! ```rust
//! use finch::{ErrObject, trap};
//!
//! let caught = trap(|| {
//!     let err = ErrObject::new("disk full");
//!     err.cat_mess(" while saving");
//!     err.throw()
//! })
//! .unwrap();
//!
//! assert_eq!(caught.message(), "disk full while saving");
//! ```

use crate::error::{Error, Result};
use crate::runtime::vtable::{self, Imp, Payload};
use crate::runtime::{Class, Object, Str, registry};
use finch_log::warn;
use std::fmt;
use std::ops::Deref;
use std::sync::{Mutex, PoisonError};

/// Payload of `Err` instances.
#[derive(Debug, Default)]
pub(crate) struct ErrIvars {
    mess: Mutex<String>,
    #[cfg(feature = "backtrace")]
    backtrace: Mutex<Option<backtrace::Backtrace>>,
}

impl ErrIvars {
    fn with_message(mess: String) -> Self {
        ErrIvars {
            mess: Mutex::new(mess),
            ..ErrIvars::default()
        }
    }
}

pub(crate) fn alloc_ivars() -> Payload {
    Box::new(ErrIvars::default())
}

pub(crate) const ERR_METHODS: &[Imp] = &[Imp::ToString(err_to_string)];

fn err_to_string(obj: &Object) -> Str {
    match obj.payload::<ErrIvars>() {
        Some(ivars) => Str::new(ivars.mess.lock().unwrap_or_else(PoisonError::into_inner).clone()),
        None => vtable::root_to_string(obj),
    }
}

/// Panic payload used by [`ErrObject::throw`]; recognised by `trap`.
pub(crate) struct Thrown(pub(crate) ErrObject);

/// Handle to an `Err` object.
#[derive(Clone, PartialEq, Eq)]
pub struct ErrObject(Object);

impl ErrObject {
    /// The core `Err` class.
    #[must_use]
    pub fn class() -> Class {
        registry::core().err
    }

    #[must_use]
    pub fn new(mess: impl Into<String>) -> Self {
        let ivars = ErrIvars::with_message(mess.into());
        ErrObject(Object::alloc(Self::class(), Box::new(ivars)))
    }

    /// Creates an error whose class is `class`, a subclass of `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassMismatch`] if `class` does not descend from `Err`.
    pub fn new_in(class: &Class, mess: impl Into<String>) -> Result<Self> {
        if !class.is_subclass_of(&Self::class()) {
            return Err(Error::class_mismatch(Self::class().name(), class.name()));
        }
        let ivars = ErrIvars::with_message(mess.into());
        Ok(ErrObject(Object::alloc(*class, Box::new(ivars))))
    }

    /// Views a generic object as an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassMismatch`] unless the object is an `Err`
    /// carrying error data.
    pub fn from_object(obj: Object) -> Result<Self> {
        obj.certify(&Self::class())?;
        if obj.payload::<ErrIvars>().is_none() {
            return Err(Error::class_mismatch(Self::class().name(), obj.class_name()));
        }
        Ok(ErrObject(obj))
    }

    fn ivars(&self) -> &ErrIvars {
        match self.0.payload::<ErrIvars>() {
            Some(ivars) => ivars,
            None => unreachable!("ErrObject always carries ErrIvars"),
        }
    }

    /// Copy of the current message.
    #[must_use]
    pub fn message(&self) -> String {
        self.ivars()
            .mess
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Appends `more` to the message.
    pub fn cat_mess(&self, more: &str) {
        self.ivars()
            .mess
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(more);
    }

    /// Appends a source location line to the message.
    pub fn add_frame(&self, file: &str, line: u32, func: &str) {
        self.cat_mess(&format!("\n\t{func} at {file} line {line}"));
    }

    /// Unwinds to the innermost active trap, which returns this error.
    ///
    /// Outside any trap this is an ordinary panic and takes the thread
    /// down with a diagnostic naming the error.
    pub fn throw(self) -> ! {
        #[cfg(feature = "backtrace")]
        self.capture_backtrace();

        crate::runtime::trap::install_panic_hook();
        std::panic::panic_any(Thrown(self))
    }

    /// Records the current location and throws again.
    pub fn rethrow(self, file: &str, line: u32, func: &str) -> ! {
        self.add_frame(file, line, func);
        self.throw()
    }

    /// Backtrace captured by the most recent [`ErrObject::throw`].
    #[cfg(feature = "backtrace")]
    #[must_use]
    pub fn backtrace(&self) -> Option<String> {
        self.ivars()
            .backtrace
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|bt| format!("{bt:?}"))
    }

    #[cfg(feature = "backtrace")]
    fn capture_backtrace(&self) {
        let mut slot = self
            .ivars()
            .backtrace
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(backtrace::Backtrace::new());
    }

    #[must_use]
    pub fn as_object(&self) -> &Object {
        &self.0
    }

    #[must_use]
    pub fn into_object(self) -> Object {
        self.0
    }
}

/// Logs `mess` as a warning without interrupting control flow.
pub fn warn_mess(mess: impl AsRef<str>) {
    warn!("{}", mess.as_ref());
}

impl From<Error> for ErrObject {
    fn from(error: Error) -> Self {
        match error {
            Error::Raised(err) => err,
            other => ErrObject::new(other.to_string()),
        }
    }
}

impl Deref for ErrObject {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.0
    }
}

impl fmt::Debug for ErrObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrObject")
            .field("class", &self.class_name())
            .field("message", &self.message())
            .finish()
    }
}

impl fmt::Display for ErrObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Throws a new `Err` with a formatted message and the call site recorded.
///
/// ```rust
/// use finch::{throw, trap};
///
/// let err = trap(|| throw!("bad index {}", 7)).unwrap();
/// assert!(err.message().starts_with("bad index 7"));
/// ```
#[macro_export]
macro_rules! throw {
    ($($arg:tt)*) => {{
        let err = $crate::ErrObject::new(format!($($arg)*));
        err.add_frame(file!(), line!(), module_path!());
        err.throw()
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::vtable::Op;

    #[test]
    fn test_err_is_an_object() {
        let err = ErrObject::new("oops");

        assert_eq!(err.class_name(), "Err");
        assert!(err.is_a(&ErrObject::class()));
        assert!(err.is_a(&Class::root()));
        assert_eq!(err.refcount(), 1);
    }

    #[test]
    fn test_message_round_trip() {
        let err = ErrObject::new("first");
        err.cat_mess(", second");

        assert_eq!(err.message(), "first, second");
        assert_eq!(err.to_str(), "first, second");
        assert_eq!(err.to_string(), "first, second");
    }

    #[test]
    fn test_add_frame() {
        let err = ErrObject::new("base");
        err.add_frame("lib.rs", 12, "finch::demo");

        let mess = err.message();
        assert!(mess.starts_with("base\n"));
        assert!(mess.contains("finch::demo at lib.rs line 12"));
    }

    #[test]
    fn test_from_error() {
        let abstract_fault = Error::AbstractMethod {
            method: "mimic",
            class: "Widget".into(),
        };
        let err = ErrObject::from(abstract_fault);
        assert!(err.message().contains("mimic() is abstract"));

        let original = ErrObject::new("carried");
        let carried = ErrObject::from(Error::Raised(original.clone()));
        assert!(carried.is_same(&original));
    }

    #[test]
    fn test_subclass_construction() {
        let io_err = Class::singleton("ErrTestIoErr", &ErrObject::class());
        let err = ErrObject::new_in(&io_err, "pipe closed").unwrap();

        assert_eq!(err.class_name(), "ErrTestIoErr");
        assert!(err.is_a(&ErrObject::class()));
        assert_eq!(err.message(), "pipe closed");

        assert!(ErrObject::new_in(&Str::class(), "nope").is_err());
    }

    #[test]
    fn test_from_object_checks_class() {
        let err = ErrObject::new("typed");
        assert!(ErrObject::from_object(err.clone().into_object()).is_ok());
        assert!(ErrObject::from_object(Str::new("typed").into_object()).is_err());
    }

    #[test]
    fn test_err_keeps_root_abstract_ops() {
        assert!(ErrObject::class().is_abstract(Op::Clone));
        assert!(!ErrObject::class().is_abstract(Op::ToString));
    }

    #[test]
    fn test_warn_mess_does_not_unwind() {
        warn_mess("just a warning");
        warn_mess(String::from("another"));
    }
}
