//! Class descriptors for the `Finch` runtime.
//!
//! A [`Class`] is a `Copy` handle to a descriptor that lives in the global
//! arena for the rest of the process. Descriptors carry:
//!
//! - the registration name
//! - the parent class (absent only for the root, `Obj`)
//! - the allocator producing default instance payloads
//! - the resolved dispatch table
//!
//! Classes come from three places. The registry bootstraps the core classes
//! (`Obj`, `Err`, `String`); [`ClassBuilder`] declares compiled classes with
//! their own overrides; [`Class::singleton`] creates subclasses on demand.
//!
//! # Example
//!
//! ```rust
//! use finch::{Class, ClassBuilder, Imp, Object};
//!
//! fn answer(_obj: &Object) -> finch::Result<i64> {
//!     Ok(42)
//! }
//!
//! let mut builder = ClassBuilder::new("DocAnswer", &Class::root());
//! builder.add_method(Imp::ToI64(answer));
//! let class = builder.register().unwrap();
//!
//! let obj = class.make_obj();
//! assert_eq!(obj.to_i64(), Ok(42));
//! assert!(obj.is_a(&Class::root()));
//! ```

use crate::error::{Error, Result};
use crate::runtime::registry;
use crate::runtime::vtable::{AllocFn, DestroyFn, Imp, Op, OpSet, Payload, VTable};
use crate::runtime::Object;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{PoisonError, RwLock};

/// Name of the root class every class descends from.
pub const ROOT_CLASS_NAME: &str = "Obj";

/// How a class came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    /// Created when the registry bootstraps (`Obj`, `Err`, `String`).
    Core,
    /// Declared through [`ClassBuilder`].
    Compiled,
    /// Created on demand by [`Class::singleton`].
    Singleton,
}

pub(crate) struct ClassInner {
    name: Box<str>,
    parent: Option<Class>,
    kind: ClassKind,
    alloc: AllocFn,
    vtable: RwLock<VTable>,
}

/// Handle to a registered class.
///
/// Equality is descriptor identity: two handles are equal only if they refer
/// to the same registration.
#[derive(Clone, Copy)]
pub struct Class {
    inner: &'static ClassInner,
}

impl Class {
    /// Creates a descriptor in the global arena. The caller registers it.
    ///
    /// The table starts as a copy of the parent's resolved table (or the root
    /// table when there is no parent) with `overrides` applied on top.
    pub(crate) fn allocate(
        name: &str,
        parent: Option<Class>,
        kind: ClassKind,
        alloc: AllocFn,
        overrides: &[Imp],
    ) -> Class {
        let vtable = parent.map_or_else(VTable::root, |p| p.vtable());
        let inner: &'static ClassInner = finch_mem::global_arena().alloc(ClassInner {
            name: name.into(),
            parent,
            kind,
            alloc,
            vtable: RwLock::new(vtable),
        });
        debug_assert!(finch_mem::global_arena().contains(inner));
        let class = Class { inner };

        {
            let mut table = class.write_vtable();
            if table.destroy_owner.is_none() {
                table.destroy_owner = Some(class);
            }
            for imp in overrides {
                table.apply(*imp, class);
            }
        }

        class
    }

    /// Looks up a registered class by exact name.
    #[must_use]
    pub fn fetch(name: &str) -> Option<Class> {
        registry::fetch_class(name)
    }

    /// Returns the class called `name`, creating it as a subclass of
    /// `parent` if it does not exist yet.
    ///
    /// Concurrent callers racing on the same name all receive the same
    /// class. If the existing class has a different parent, a warning is
    /// logged and the existing class is returned unchanged.
    #[must_use]
    pub fn singleton(name: &str, parent: &Class) -> Class {
        registry::register_singleton(name, parent)
    }

    /// Every registered class, sorted by name.
    #[must_use]
    pub fn all() -> Vec<Class> {
        registry::all_classes()
    }

    /// The root class, `Obj`.
    #[must_use]
    pub fn root() -> Class {
        registry::core().obj
    }

    /// Registration name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        let inner: &'static ClassInner = self.inner;
        &inner.name
    }

    /// Parent class, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Class> {
        self.inner.parent
    }

    #[must_use]
    pub fn kind(&self) -> ClassKind {
        self.inner.kind
    }

    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.inner.kind == ClassKind::Singleton
    }

    /// Iterates this class and then each ancestor up to the root.
    #[must_use]
    pub fn ancestors(&self) -> Ancestors {
        Ancestors { next: Some(*self) }
    }

    /// Returns true if `self` is `other` or descends from it.
    #[must_use]
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        self.ancestors().any(|class| class == *other)
    }

    /// Returns true if `op` still resolves to the root's abstract stub.
    #[must_use]
    pub fn is_abstract(&self, op: Op) -> bool {
        self.read_vtable().abstract_ops.contains(op)
    }

    /// All operations that are still abstract for this class.
    #[must_use]
    pub fn abstract_ops(&self) -> OpSet {
        self.read_vtable().abstract_ops
    }

    /// Allocates an instance with the class's default payload.
    ///
    /// The object starts with a refcount of 1. `init` is not run.
    #[must_use]
    pub fn make_obj(&self) -> Object {
        Object::alloc(*self, (self.inner.alloc)())
    }

    /// Allocates an instance carrying `payload` instead of the default one.
    #[must_use]
    pub fn make_obj_with<T: Any + Send + Sync>(&self, payload: T) -> Object {
        Object::alloc(*self, Box::new(payload))
    }

    /// Replaces one dispatch entry of this class.
    ///
    /// Subclasses created earlier keep the table they copied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SealedClass`] for core classes.
    pub fn override_method(&self, imp: Imp) -> Result<()> {
        if self.inner.kind == ClassKind::Core {
            return Err(Error::SealedClass {
                name: self.name().to_string(),
            });
        }

        self.write_vtable().apply(imp, *self);
        Ok(())
    }

    /// Snapshot of the resolved table.
    pub(crate) fn vtable(&self) -> VTable {
        *self.read_vtable()
    }

    /// Destroy entry together with the class that installed it.
    pub(crate) fn destroy_entry(&self) -> (DestroyFn, Class) {
        let table = self.read_vtable();
        (table.destroy, table.destroy_owner.unwrap_or(*self))
    }

    pub(crate) fn alloc_fn(&self) -> AllocFn {
        self.inner.alloc
    }

    fn read_vtable(&self) -> std::sync::RwLockReadGuard<'static, VTable> {
        self.inner
            .vtable
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_vtable(&self) -> std::sync::RwLockWriteGuard<'static, VTable> {
        self.inner
            .vtable
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner, other.inner)
    }
}

impl Eq for Class {}

impl Hash for Class {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::from_ref(self.inner).addr().hash(state);
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name())
            .field("parent", &self.parent().map(|p| p.name()))
            .field("kind", &self.kind())
            .finish()
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Iterator over a class and its ancestors, see [`Class::ancestors`].
#[derive(Debug, Clone)]
pub struct Ancestors {
    next: Option<Class>,
}

impl Iterator for Ancestors {
    type Item = Class;

    fn next(&mut self) -> Option<Class> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

fn alloc_default<T: Default + Any + Send + Sync>() -> Payload {
    Box::new(T::default())
}

/// Declares a compiled class.
///
/// ```rust
/// use finch::{Class, ClassBuilder, Imp, Object};
///
/// #[derive(Default)]
/// struct Counter {
///     start: i64,
/// }
///
/// fn counter_to_i64(obj: &Object) -> finch::Result<i64> {
///     Ok(obj.payload::<Counter>().map_or(0, |c| c.start))
/// }
///
/// let mut builder = ClassBuilder::new("DocCounter", &Class::root());
/// builder
///     .set_ivars::<Counter>()
///     .add_method(Imp::ToI64(counter_to_i64));
/// let class = builder.register().unwrap();
///
/// assert_eq!(class.make_obj_with(Counter { start: 5 }).to_i64(), Ok(5));
/// assert!(ClassBuilder::new("DocCounter", &Class::root()).register().is_err());
/// ```
pub struct ClassBuilder {
    name: String,
    parent: Class,
    alloc: Option<AllocFn>,
    methods: Vec<Imp>,
}

impl ClassBuilder {
    /// Starts a class called `name` inheriting from `parent`.
    #[must_use]
    pub fn new(name: &str, parent: &Class) -> Self {
        ClassBuilder {
            name: name.to_string(),
            parent: *parent,
            alloc: None,
            methods: Vec::new(),
        }
    }

    /// Instances get `T::default()` as their payload. Without this the
    /// parent's allocator is used.
    pub fn set_ivars<T: Default + Any + Send + Sync>(&mut self) -> &mut Self {
        self.alloc = Some(alloc_default::<T> as AllocFn);
        self
    }

    /// Overrides one dispatch entry. Later calls for the same slot win.
    pub fn add_method(&mut self, imp: Imp) -> &mut Self {
        self.methods.push(imp);
        self
    }

    /// Creates the class and adds it to the registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassAlreadyExists`] if the name is taken.
    pub fn register(self) -> Result<Class> {
        let alloc = self.alloc.unwrap_or_else(|| self.parent.alloc_fn());
        registry::register_compiled(&self.name, self.parent, alloc, &self.methods)
    }
}

impl fmt::Debug for ClassBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("name", &self.name)
            .field("parent", &self.parent.name())
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}
