//! Call Argument Module
//!
//! Uniform representation of a call's arguments: an ordered list of
//! positional values plus a keyword map.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::key::encode::sorted_pairs;
use crate::key::ser;

/// Reserved keyword that forces recomputation when truthy.
///
/// It is removed from the arguments before key derivation and before the
/// wrapped function sees them, so wrapped functions must not use it.
pub const REFRESH_PARAM: &str = "refresh_";

/// Source of [`Arg::Unique`] tokens.
static NEXT_UNIQUE: AtomicU64 = AtomicU64::new(0);

// == Pinned ==
/// A shared value keyed by its address.
///
/// The `Arc` is held for as long as the argument (or any cache entry built
/// from it) exists, so the address cannot be reused by another value while
/// a key derived from it is still live.
#[derive(Clone)]
pub struct Pinned {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl Pinned {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Address of the shared allocation.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.value) as *const () as usize
    }

    /// Number of strong references to the pinned value.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.value)
    }
}

impl PartialEq for Pinned {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr() && self.type_name == other.type_name
    }
}

impl Eq for Pinned {}

impl fmt::Debug for Pinned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pinned({}@{:#x})", self.type_name, self.addr())
    }
}

// == Arg ==
/// A single argument value as seen by the memoizer.
#[derive(Debug, Clone)]
pub enum Arg {
    Null,
    Bool(bool),
    /// Any integer that fits in an i64
    Int(i64),
    /// Integers above i64::MAX
    UInt(u64),
    /// Compared and keyed by bit pattern: `0.0` and `-0.0` differ, NaN
    /// equals itself
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Arg>),
    /// Keys are kept sorted, so insertion order never matters
    Map(BTreeMap<String, Arg>),
    /// A map whose keys are not all strings. Entry order never matters.
    Pairs(Vec<(Arg, Arg)>),
    /// An enum variant and its payload
    Variant { name: String, value: Box<Arg> },
    /// A value keyed by where it lives rather than what it holds
    Identity(Pinned),
    /// Equal only to itself; calls carrying it are never served from or
    /// written to the store
    Unique(u64),
}

impl Arg {
    /// Builds an argument from any serializable value.
    ///
    /// Integer map keys, non-finite floats, byte strings and enum variants
    /// all keep their own keys. A value whose `Serialize` impl fails becomes
    /// [`Arg::unique`], so the call is always recomputed instead of served
    /// from a possibly wrong entry.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match ser::to_arg(value) {
            Ok(arg) => arg,
            Err(err) => {
                debug!("Argument cannot be keyed, call will not be cached: {}", err);
                Self::unique()
            }
        }
    }

    /// Keys a shared value by its type and address.
    ///
    /// Two calls hit the same entry only when they pass the very same
    /// allocation. The argument keeps a reference to it, and so does any
    /// entry stored for the call.
    pub fn identity<T: Any + Send + Sync>(value: &Arc<T>) -> Self {
        Arg::Identity(Pinned {
            type_name: std::any::type_name::<T>(),
            value: value.clone(),
        })
    }

    /// A fresh value equal to no other argument.
    pub fn unique() -> Self {
        Arg::Unique(NEXT_UNIQUE.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps raw bytes.
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Arg::Bytes(value.into())
    }

    /// Builds a map argument from key/value pairs of any kind.
    ///
    /// All-string keys give [`Arg::Map`], anything else [`Arg::Pairs`].
    pub fn pairs<K: Into<Arg>, V: Into<Arg>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        ser::map_from_entries(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Truthiness used for the refresh flag.
    ///
    /// Null, false, zero and empty containers are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Arg::Null => false,
            Arg::Bool(b) => *b,
            Arg::Int(i) => *i != 0,
            Arg::UInt(u) => *u != 0,
            Arg::Float(f) => *f != 0.0,
            Arg::Str(s) => !s.is_empty(),
            Arg::Bytes(b) => !b.is_empty(),
            Arg::List(items) => !items.is_empty(),
            Arg::Map(map) => !map.is_empty(),
            Arg::Pairs(pairs) => !pairs.is_empty(),
            Arg::Variant { .. } | Arg::Identity(_) | Arg::Unique(_) => true,
        }
    }

    /// Visits this argument and everything nested inside it.
    fn walk(&self, visit: &mut impl FnMut(&Arg)) {
        visit(self);
        match self {
            Arg::List(items) => items.iter().for_each(|item| item.walk(visit)),
            Arg::Map(map) => map.values().for_each(|value| value.walk(visit)),
            Arg::Pairs(pairs) => pairs.iter().for_each(|(k, v)| {
                k.walk(visit);
                v.walk(visit);
            }),
            Arg::Variant { value, .. } => value.walk(visit),
            _ => {}
        }
    }
}

impl PartialEq for Arg {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Arg::Null, Arg::Null) => true,
            (Arg::Bool(a), Arg::Bool(b)) => a == b,
            (Arg::Int(a), Arg::Int(b)) => a == b,
            (Arg::UInt(a), Arg::UInt(b)) => a == b,
            // Same rule as the key encoding
            (Arg::Float(a), Arg::Float(b)) => a.to_bits() == b.to_bits(),
            (Arg::Str(a), Arg::Str(b)) => a == b,
            (Arg::Bytes(a), Arg::Bytes(b)) => a == b,
            (Arg::List(a), Arg::List(b)) => a == b,
            (Arg::Map(a), Arg::Map(b)) => a == b,
            (Arg::Pairs(a), Arg::Pairs(b)) => sorted_pairs(a) == sorted_pairs(b),
            (
                Arg::Variant { name: a, value: x },
                Arg::Variant { name: b, value: y },
            ) => a == b && x == y,
            (Arg::Identity(a), Arg::Identity(b)) => a == b,
            (Arg::Unique(a), Arg::Unique(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Arg {}

// == Conversions ==

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(value: $t) -> Self {
                Arg::Int(i64::from(value))
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(value: $t) -> Self {
                Arg::from(u64::from(value))
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32);

impl From<u64> for Arg {
    fn from(value: u64) -> Self {
        // Same number, same key, whatever integer type carried it
        match i64::try_from(value) {
            Ok(i) => Arg::Int(i),
            Err(_) => Arg::UInt(value),
        }
    }
}

impl From<usize> for Arg {
    fn from(value: usize) -> Self {
        Arg::from(value as u64)
    }
}

impl From<isize> for Arg {
    fn from(value: isize) -> Self {
        Arg::Int(value as i64)
    }
}

impl From<f32> for Arg {
    fn from(value: f32) -> Self {
        Arg::Float(f64::from(value))
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg::Str(value.clone())
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Self {
        Arg::Bytes(value.to_vec())
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Arg::Null, Into::into)
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(value: Vec<T>) -> Self {
        Arg::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Arg>> From<BTreeMap<String, T>> for Arg {
    fn from(value: BTreeMap<String, T>) -> Self {
        Arg::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Arg>> From<HashMap<String, T>> for Arg {
    fn from(value: HashMap<String, T>) -> Self {
        Arg::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Arg::Null,
            Value::Bool(b) => Arg::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Arg::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Arg::UInt(u)
                } else {
                    Arg::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Arg::Str(s),
            Value::Array(items) => Arg::List(items.into_iter().map(Arg::from).collect()),
            Value::Object(map) => Arg::Map(map.into_iter().map(|(k, v)| (k, Arg::from(v))).collect()),
        }
    }
}

// == Call Args ==
/// Positional and keyword arguments of one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallArgs {
    /// Positional arguments; order is significant
    pub positional: Vec<Arg>,
    /// Keyword arguments; order is not significant
    pub keyword: BTreeMap<String, Arg>,
}

impl CallArgs {
    /// Creates an empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Arg>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Sets a keyword argument, replacing any previous value for `name`.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Returns the positional argument at `index`.
    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.positional.get(index)
    }

    /// Returns the keyword argument called `name`.
    pub fn get_kw(&self, name: &str) -> Option<&Arg> {
        self.keyword.get(name)
    }

    /// Total number of arguments, positional and keyword.
    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Removes the reserved refresh keyword and reports whether it was truthy.
    pub fn take_refresh(&mut self) -> bool {
        self.keyword
            .remove(REFRESH_PARAM)
            .is_some_and(|flag| flag.is_truthy())
    }

    /// Whether a result for these arguments may be stored.
    ///
    /// False when any argument, at any depth, is an [`Arg::Unique`].
    pub fn is_cacheable(&self) -> bool {
        let mut cacheable = true;
        self.walk(&mut |arg| {
            if matches!(arg, Arg::Unique(_)) {
                cacheable = false;
            }
        });
        cacheable
    }

    /// Every identity-keyed value in the arguments, at any depth.
    pub fn pins(&self) -> Vec<Pinned> {
        let mut pins = Vec::new();
        self.walk(&mut |arg| {
            if let Arg::Identity(pinned) = arg {
                pins.push(pinned.clone());
            }
        });
        pins
    }

    fn walk(&self, visit: &mut impl FnMut(&Arg)) {
        for arg in self.positional.iter().chain(self.keyword.values()) {
            arg.walk(visit);
        }
    }
}
