//! Dispatch tables for the `Finch` runtime.
//!
//! Every class owns one [`VTable`]: a fixed set of typed function pointers,
//! one per [`Op`]. A new class starts from a copy of its parent's resolved
//! table and then applies its own overrides, so a call never walks the
//! inheritance chain. What the parent had at creation time is what the
//! child inherits.
//!
//! The root class (`Obj`) fills the table with:
//!
//! - identity-based `equals` and `hash_sum`
//! - a `to_string` of the form `ClassName@0x7f..`
//! - a no-op `destroy`
//! - abstract stubs for `init`, `clone`, `compare_to`, `to_i64`, `to_f64`
//!   and `mimic`, which fail with [`Error::AbstractMethod`]

use crate::error::{Error, Result};
use crate::runtime::{Class, Object, Str};
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;

/// Instance payload ("ivars") stored inside every object.
pub type Payload = Box<dyn Any + Send + Sync>;

/// Produces the default payload for a fresh instance.
pub type AllocFn = fn() -> Payload;

/// Initializer. Consumes the freshly allocated object and returns the
/// initialized one (usually the same object).
pub type InitFn = fn(Object) -> Result<Object>;

/// Teardown hook. The second argument is the class that installed this
/// entry; pass it to [`Object::super_destroy`] to continue the chain.
///
/// The object's count reads 1 for the whole chain. References taken to it
/// must be released before the entry returns. A fault raised while the
/// thread is already unwinding is logged and discarded, so the first fault
/// is the one a [`trap`](crate::trap) sees.
pub type DestroyFn = fn(&Object, Class);

/// Equality.
pub type EqualsFn = fn(&Object, &Object) -> bool;

/// 32-bit hash consistent with [`EqualsFn`].
pub type HashSumFn = fn(&Object) -> u32;

/// Human-readable rendering.
pub type ToStringFn = fn(&Object) -> Str;

/// Copy of the object.
pub type CloneFn = fn(&Object) -> Result<Object>;

/// Total ordering against another object.
pub type CompareToFn = fn(&Object, &Object) -> Result<Ordering>;

/// Integer conversion.
pub type ToI64Fn = fn(&Object) -> Result<i64>;

/// Float conversion.
pub type ToF64Fn = fn(&Object) -> Result<f64>;

/// Makes the receiver take on the state of the argument.
pub type MimicFn = fn(&Object, &Object) -> Result<()>;

/// Identifier of a dispatchable operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Op {
    Init = 0,
    Destroy = 1,
    Equals = 2,
    HashSum = 3,
    ToString = 4,
    Clone = 5,
    CompareTo = 6,
    ToI64 = 7,
    ToF64 = 8,
    Mimic = 9,
}

impl Op {
    /// Every operation, in table order.
    pub const ALL: [Op; 10] = [
        Op::Init,
        Op::Destroy,
        Op::Equals,
        Op::HashSum,
        Op::ToString,
        Op::Clone,
        Op::CompareTo,
        Op::ToI64,
        Op::ToF64,
        Op::Mimic,
    ];

    /// Name used in diagnostics, e.g. `"compare_to"`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Op::Init => "init",
            Op::Destroy => "destroy",
            Op::Equals => "equals",
            Op::HashSum => "hash_sum",
            Op::ToString => "to_string",
            Op::Clone => "clone",
            Op::CompareTo => "compare_to",
            Op::ToI64 => "to_i64",
            Op::ToF64 => "to_f64",
            Op::Mimic => "mimic",
        }
    }

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Small bit set of [`Op`]s.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OpSet(u16);

impl OpSet {
    /// The empty set.
    pub const EMPTY: OpSet = OpSet(0);

    /// Builds a set from a list of operations.
    #[must_use]
    pub const fn of(ops: &[Op]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < ops.len() {
            bits |= ops[i].bit();
            i += 1;
        }
        OpSet(bits)
    }

    #[must_use]
    pub const fn contains(self, op: Op) -> bool {
        self.0 & op.bit() != 0
    }

    pub fn insert(&mut self, op: Op) {
        self.0 |= op.bit();
    }

    pub fn remove(&mut self, op: Op) {
        self.0 &= !op.bit();
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the members in table order.
    pub fn iter(self) -> impl Iterator<Item = Op> {
        Op::ALL.into_iter().filter(move |op| self.contains(*op))
    }
}

impl fmt::Debug for OpSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Op::name)).finish()
    }
}

/// Operations that have no implementation on the root class.
pub const ABSTRACT_OPS: OpSet = OpSet::of(&[
    Op::Init,
    Op::Clone,
    Op::CompareTo,
    Op::ToI64,
    Op::ToF64,
    Op::Mimic,
]);

/// A concrete implementation for one table slot.
///
/// The variant names the slot; the payload is the function installed in it.
///
/// ```rust
/// use finch::{Imp, Object, Op};
///
/// fn forty_two(_obj: &Object) -> finch::Result<i64> {
///     Ok(42)
/// }
///
/// let imp = Imp::ToI64(forty_two);
/// assert_eq!(imp.op(), Op::ToI64);
/// ```
#[derive(Clone, Copy)]
pub enum Imp {
    Init(InitFn),
    Destroy(DestroyFn),
    Equals(EqualsFn),
    HashSum(HashSumFn),
    ToString(ToStringFn),
    Clone(CloneFn),
    CompareTo(CompareToFn),
    ToI64(ToI64Fn),
    ToF64(ToF64Fn),
    Mimic(MimicFn),
}

impl Imp {
    /// The slot this implementation fills.
    #[must_use]
    pub const fn op(&self) -> Op {
        match self {
            Imp::Init(_) => Op::Init,
            Imp::Destroy(_) => Op::Destroy,
            Imp::Equals(_) => Op::Equals,
            Imp::HashSum(_) => Op::HashSum,
            Imp::ToString(_) => Op::ToString,
            Imp::Clone(_) => Op::Clone,
            Imp::CompareTo(_) => Op::CompareTo,
            Imp::ToI64(_) => Op::ToI64,
            Imp::ToF64(_) => Op::ToF64,
            Imp::Mimic(_) => Op::Mimic,
        }
    }
}

impl fmt::Debug for Imp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Imp::{}", self.op().name())
    }
}

/// Resolved dispatch table of one class.
#[derive(Clone, Copy)]
pub(crate) struct VTable {
    pub(crate) init: InitFn,
    pub(crate) destroy: DestroyFn,
    /// Class that installed `destroy`; `None` only while the root class is
    /// being built.
    pub(crate) destroy_owner: Option<Class>,
    pub(crate) equals: EqualsFn,
    pub(crate) hash_sum: HashSumFn,
    pub(crate) to_string: ToStringFn,
    pub(crate) clone: CloneFn,
    pub(crate) compare_to: CompareToFn,
    pub(crate) to_i64: ToI64Fn,
    pub(crate) to_f64: ToF64Fn,
    pub(crate) mimic: MimicFn,
    /// Slots still holding an abstract stub.
    pub(crate) abstract_ops: OpSet,
}

impl VTable {
    /// Table of the root class.
    pub(crate) fn root() -> Self {
        VTable {
            init: abstract_init,
            destroy: root_destroy,
            destroy_owner: None,
            equals: root_equals,
            hash_sum: root_hash_sum,
            to_string: root_to_string,
            clone: abstract_clone,
            compare_to: abstract_compare_to,
            to_i64: abstract_to_i64,
            to_f64: abstract_to_f64,
            mimic: abstract_mimic,
            abstract_ops: ABSTRACT_OPS,
        }
    }

    /// Installs `imp` in its slot on behalf of `owner`.
    pub(crate) fn apply(&mut self, imp: Imp, owner: Class) {
        match imp {
            Imp::Init(f) => self.init = f,
            Imp::Destroy(f) => {
                self.destroy = f;
                self.destroy_owner = Some(owner);
            }
            Imp::Equals(f) => self.equals = f,
            Imp::HashSum(f) => self.hash_sum = f,
            Imp::ToString(f) => self.to_string = f,
            Imp::Clone(f) => self.clone = f,
            Imp::CompareTo(f) => self.compare_to = f,
            Imp::ToI64(f) => self.to_i64 = f,
            Imp::ToF64(f) => self.to_f64 = f,
            Imp::Mimic(f) => self.mimic = f,
        }
        self.abstract_ops.remove(imp.op());
    }
}

fn abstract_init(obj: Object) -> Result<Object> {
    Err(Error::abstract_method(Op::Init.name(), obj.class_name()))
}

fn root_destroy(_obj: &Object, _class: Class) {}

fn root_equals(obj: &Object, other: &Object) -> bool {
    obj.is_same(other)
}

#[allow(clippy::cast_possible_truncation)] // truncation is the hash
fn root_hash_sum(obj: &Object) -> u32 {
    obj.addr() as u32
}

pub(crate) fn root_to_string(obj: &Object) -> Str {
    Str::new(format!("{}@{:#x}", obj.class_name(), obj.addr()))
}

fn abstract_clone(obj: &Object) -> Result<Object> {
    Err(Error::abstract_method(Op::Clone.name(), obj.class_name()))
}

fn abstract_compare_to(obj: &Object, _other: &Object) -> Result<Ordering> {
    Err(Error::abstract_method(Op::CompareTo.name(), obj.class_name()))
}

fn abstract_to_i64(obj: &Object) -> Result<i64> {
    Err(Error::abstract_method(Op::ToI64.name(), obj.class_name()))
}

fn abstract_to_f64(obj: &Object) -> Result<f64> {
    Err(Error::abstract_method(Op::ToF64.name(), obj.class_name()))
}

fn abstract_mimic(obj: &Object, _other: &Object) -> Result<()> {
    Err(Error::abstract_method(Op::Mimic.name(), obj.class_name()))
}
