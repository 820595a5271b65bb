//! `Finch` runtime module.
//!
//! # Architecture
//!
//! - [`registry`]: process-wide name to class table, seeded with the core
//!   classes
//! - [`class`]: class descriptors and [`ClassBuilder`]
//! - [`vtable`]: operation ids, implementation entries and the root
//!   (partly abstract) implementations
//! - [`object`]: refcounted instances and dispatch
//! - [`string`]: the `String` class
//! - [`err`]: the `Err` class
//! - [`trap`]: converting faults into `Err` objects
//!
//! Class descriptors live in the global arena from `finch-mem` and are never
//! freed. Objects are individually heap-allocated and freed when their last
//! handle is dropped.

pub mod class;
pub mod err;
pub mod object;
pub mod registry;
pub mod string;
pub mod trap;
pub mod vtable;

pub use class::{Ancestors, Class, ClassBuilder, ClassKind, ROOT_CLASS_NAME};
pub use err::{ErrObject, warn_mess};
pub use object::Object;
pub use string::Str;
pub use trap::{in_trap, trap, trap_with};
pub use vtable::{Imp, Op, OpSet};
