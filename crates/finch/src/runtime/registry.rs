//! Process-wide class registry.
//!
//! Maps class names to [`Class`] handles. The registry is created on first
//! use and seeded with the three core classes:
//!
//! - `Obj`, the root
//! - `Err`, the runtime error class
//! - `String`, the immutable text class
//!
//! # Thread Safety
//!
//! The name table sits behind a `RwLock`. Lookups take the read lock only.
//! Creation re-checks under the write lock, so concurrent callers racing on
//! one name all get the same class.

use crate::error::{Error, Result};
use crate::runtime::class::{ClassKind, ROOT_CLASS_NAME};
use crate::runtime::vtable::{AllocFn, Imp, Payload};
use crate::runtime::{Class, err, string};
use finch_log::{debug, warn};
use fxhash::FxHashMap;
use std::sync::{OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Handles of the bootstrapped classes.
pub(crate) struct CoreClasses {
    pub(crate) obj: Class,
    pub(crate) err: Class,
    pub(crate) string: Class,
}

struct ClassRegistry {
    /// Keys borrow the arena-allocated class names.
    classes: RwLock<FxHashMap<&'static str, Class>>,
    core: CoreClasses,
}

static REGISTRY: OnceLock<ClassRegistry> = OnceLock::new();

fn registry() -> &'static ClassRegistry {
    REGISTRY.get_or_init(ClassRegistry::bootstrap)
}

/// The bootstrapped core classes.
pub(crate) fn core() -> &'static CoreClasses {
    &registry().core
}

fn empty_payload() -> Payload {
    Box::new(())
}

impl ClassRegistry {
    fn bootstrap() -> Self {
        let obj = Class::allocate(ROOT_CLASS_NAME, None, ClassKind::Core, empty_payload, &[]);
        let err = Class::allocate(
            "Err",
            Some(obj),
            ClassKind::Core,
            err::alloc_ivars,
            err::ERR_METHODS,
        );
        let string = Class::allocate(
            "String",
            Some(obj),
            ClassKind::Core,
            string::alloc_ivars,
            string::STRING_METHODS,
        );

        let mut classes = FxHashMap::default();
        for class in [obj, err, string] {
            classes.insert(class.name(), class);
        }
        debug!("class registry seeded with {} core classes", classes.len());

        ClassRegistry {
            classes: RwLock::new(classes),
            core: CoreClasses { obj, err, string },
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, FxHashMap<&'static str, Class>> {
        self.classes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FxHashMap<&'static str, Class>> {
        self.classes.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn fetch(&self, name: &str) -> Option<Class> {
        self.read().get(name).copied()
    }

    fn singleton(&self, name: &str, parent: Class) -> Class {
        if let Some(class) = self.fetch(name) {
            return expect_parent(class, parent);
        }

        let mut classes = self.write();
        // Another thread may have won the race while we waited.
        if let Some(class) = classes.get(name).copied() {
            drop(classes);
            return expect_parent(class, parent);
        }

        let class = Class::allocate(
            name,
            Some(parent),
            ClassKind::Singleton,
            parent.alloc_fn(),
            &[],
        );
        classes.insert(class.name(), class);
        debug!("registered singleton class {} (parent {})", name, parent.name());
        class
    }

    fn register(&self, name: &str, parent: Class, alloc: AllocFn, methods: &[Imp]) -> Result<Class> {
        let mut classes = self.write();
        if classes.contains_key(name) {
            return Err(Error::ClassAlreadyExists {
                name: name.to_string(),
            });
        }

        let class = Class::allocate(name, Some(parent), ClassKind::Compiled, alloc, methods);
        classes.insert(class.name(), class);
        debug!(
            "registered class {} (parent {}, {} overrides)",
            name,
            parent.name(),
            methods.len()
        );
        Ok(class)
    }

    fn all(&self) -> Vec<Class> {
        let mut classes: Vec<Class> = self.read().values().copied().collect();
        classes.sort_unstable_by_key(|class| class.name());
        classes
    }
}

fn expect_parent(class: Class, parent: Class) -> Class {
    if class.parent() != Some(parent) {
        warn!(
            "singleton {} requested with parent {}, but it inherits from {}",
            class.name(),
            parent.name(),
            class.parent().map_or("<none>", |p| p.name())
        );
    }
    class
}

/// Looks up a class by exact name.
///
/// ```rust
/// use finch::runtime::registry::fetch_class;
///
/// assert_eq!(fetch_class("Obj").map(|c| c.name()), Some("Obj"));
/// assert!(fetch_class("obj").is_none());
/// ```
#[must_use]
pub fn fetch_class(name: &str) -> Option<Class> {
    registry().fetch(name)
}

/// Returns the class called `name`, creating it under `parent` if needed.
///
/// See [`Class::singleton`].
#[must_use]
pub fn register_singleton(name: &str, parent: &Class) -> Class {
    registry().singleton(name, *parent)
}

/// Every registered class, sorted by name.
#[must_use]
pub fn all_classes() -> Vec<Class> {
    registry().all()
}

pub(crate) fn register_compiled(
    name: &str,
    parent: Class,
    alloc: AllocFn,
    methods: &[Imp],
) -> Result<Class> {
    registry().register(name, parent, alloc, methods)
}
