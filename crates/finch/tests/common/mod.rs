// Shared helpers for the finch integration tests.
//
// Class names are process-global, so every helper that registers a class
// takes a prefix and appends a counter.

#![allow(dead_code)]

use finch::{Class, ClassBuilder, Imp, Object};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

static CLASS_ID: AtomicUsize = AtomicUsize::new(0);

/// Returns `"{prefix}_{n}"` with `n` unique across the test binary.
pub fn unique_name(prefix: &str) -> String {
    let id = CLASS_ID.fetch_add(1, Ordering::SeqCst);
    format!("{prefix}_{id}")
}

/// Registers a fresh singleton subclass of `Obj`.
pub fn plain_class(prefix: &str) -> Class {
    Class::singleton(&unique_name(prefix), &Class::root())
}

/// Payload that counts how many times it has been dropped.
pub struct Tracked {
    drops: Arc<AtomicUsize>,
}

impl Tracked {
    pub fn new(drops: &Arc<AtomicUsize>) -> Self {
        Tracked {
            drops: Arc::clone(drops),
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Allocates an object of a fresh class whose payload reports its drop.
pub fn tracked_object(prefix: &str, drops: &Arc<AtomicUsize>) -> Object {
    plain_class(prefix).make_obj_with(Tracked::new(drops))
}

/// Registers a compiled class with the given overrides.
pub fn class_with(prefix: &str, parent: &Class, methods: &[Imp]) -> Class {
    let mut builder = ClassBuilder::new(&unique_name(prefix), parent);
    for imp in methods {
        builder.add_method(*imp);
    }
    builder.register().expect("fresh class name")
}
