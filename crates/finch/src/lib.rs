//! `Finch`: a minimal object runtime.
//!
//! `Finch` provides the substrate an object-oriented core library is built
//! on:
//!
//! - **Refcounted objects** with exactly-once teardown
//! - **Single-inheritance classes** kept in a thread-safe registry, including
//!   singleton classes created on demand
//! - **Virtual dispatch** through per-class tables copied at class creation
//! - **Abstract methods** that fail with a typed error instead of crashing
//! - **`trap`**, which turns faults raised by a routine into `Err` objects
//!
//! # Example
//!
//! ```rust
//! use finch::{Class, ClassBuilder, Imp, Object, Str, trap};
//!
//! fn widget_to_string(_obj: &Object) -> Str {
//!     Str::new("a widget")
//! }
//!
//! let mut builder = ClassBuilder::new("DocWidget", &Class::root());
//! builder.add_method(Imp::ToString(widget_to_string));
//! let widget = builder.register().unwrap();
//!
//! let obj = widget.make_obj();
//! assert_eq!(obj.to_str(), "a widget");
//! assert!(obj.is_a(&Class::root()));
//!
//! // `compare_to` is abstract on the root and was never overridden.
//! let err = trap(|| obj.compare_to(&obj).map(drop)).unwrap();
//! assert!(err.message().contains("is abstract"));
//! ```
//!
//! # Logging
//!
//! Diagnostics go through `finch-log`. Set `FINCH_LOG=debug` to see class
//! registration, or `trace` to see every object teardown.

pub mod error;
pub mod runtime;

pub use error::{Error, Result};
pub use runtime::{
    Class, ClassBuilder, ClassKind, ErrObject, Imp, Object, Op, OpSet, Str, in_trap, trap,
    trap_with, warn_mess,
};
