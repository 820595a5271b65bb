//! Fault trapping.
//!
//! [`trap`] runs a routine and turns any fault raised inside it into an
//! [`ErrObject`] instead of letting it escape:
//!
//! | routine outcome                     | `trap` returns                    |
//! |-------------------------------------|-----------------------------------|
//! | `Ok(())`                            | `None`                            |
//! | `Err(Error::Raised(err))`           | `Some(err)`, the same object      |
//! | any other `Err(error)`              | `Some` with `error`'s message     |
//! | [`ErrObject::throw`] / [`throw!`]   | `Some(thrown)`                    |
//! | any other panic                     | `Some` with the panic message     |
//!
//! Unwinding drops every handle the routine held, so objects it created are
//! released before `trap` returns. Traps nest; the innermost one catches.
//!
//! Thrown errors are not printed by the panic hook while a trap is active on
//! the current thread. Outside a trap a throw still reports itself.
//!
//! [`throw!`]: crate::throw

use crate::error::Result;
use crate::runtime::ErrObject;
use crate::runtime::err::Thrown;
use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

thread_local! {
    static TRAP_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as inside a trap while alive.
struct Boundary;

impl Boundary {
    fn enter() -> Self {
        TRAP_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Boundary
    }
}

impl Drop for Boundary {
    fn drop(&mut self) {
        TRAP_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

/// True while a [`trap`] is running on the current thread.
#[must_use]
pub fn in_trap() -> bool {
    TRAP_DEPTH.with(|depth| depth.get() > 0)
}

/// Chains a hook in front of the existing one that keeps thrown errors quiet
/// inside a trap and names them outside one.
pub(crate) fn install_panic_hook() {
    static INSTALL: Once = Once::new();

    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let Some(Thrown(err)) = info.payload().downcast_ref::<Thrown>() else {
                previous(info);
                return;
            };
            if in_trap() {
                return;
            }

            let thread = std::thread::current();
            let location = info
                .location()
                .map_or_else(String::new, |loc| format!(" at {loc}"));
            eprintln!(
                "thread '{}' threw uncaught {}{}: {}",
                thread.name().unwrap_or("<unnamed>"),
                err.class_name(),
                location,
                err.message()
            );
        }));
    });
}

/// Runs `routine`, returning the fault it raised, if any.
///
/// ```rust
/// use finch::{Class, trap};
///
/// let obj = Class::root().make_obj();
/// let err = trap(|| {
///     obj.clone_obj()?;
///     Ok(())
/// })
/// .unwrap();
///
/// assert!(err.message().contains("is abstract"));
/// assert!(trap(|| Ok(())).is_none());
/// ```
pub fn trap<F>(routine: F) -> Option<ErrObject>
where
    F: FnOnce() -> Result<()>,
{
    install_panic_hook();
    let _boundary = Boundary::enter();

    match panic::catch_unwind(AssertUnwindSafe(routine)) {
        Ok(Ok(())) => None,
        Ok(Err(error)) => Some(ErrObject::from(error)),
        Err(payload) => Some(fault_from_payload(payload)),
    }
}

/// [`trap`] for a routine that takes a context argument.
///
/// ```rust
/// use finch::{Str, trap_with};
///
/// let text = Str::new("12 monkeys");
/// let err = trap_with(
///     |text: &Str| {
///         text.mimic(text)?;
///         Ok(())
///     },
///     &text,
/// );
/// assert!(err.is_some());
/// ```
pub fn trap_with<C, F>(routine: F, context: &C) -> Option<ErrObject>
where
    C: ?Sized,
    F: FnOnce(&C) -> Result<()>,
{
    trap(|| routine(context))
}

fn fault_from_payload(payload: Box<dyn Any + Send>) -> ErrObject {
    let payload = match payload.downcast::<Thrown>() {
        Ok(thrown) => {
            let Thrown(err) = *thrown;
            return err;
        }
        Err(other) => other,
    };

    let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    };

    ErrObject::new(message)
}
