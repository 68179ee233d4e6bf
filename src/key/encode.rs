//! Cache Key Module
//!
//! Derives a [`CacheKey`] from [`CallArgs`].
//!
//! # Encoding
//! Each value is written as a one-byte type tag followed by its payload.
//! Strings, byte strings, lists and maps carry a little-endian u64 length
//! before their contents, so no two distinct argument sets share an
//! encoding: `f("a", "bc")` and `f("ab", "c")`, or `x="\0B"` and
//! `x="\0\0C"`, always differ. Integers and floats have distinct tags, so
//! `1` and `1.0` are different keys. Maps, including the keyword set, are
//! written in sorted key order; maps with non-string keys are sorted by the
//! encoding of each entry. Floats are written as their bit pattern. The
//! encoding is then hashed with SHA-256; the only collisions left are
//! SHA-256 collisions.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::key::{Arg, CallArgs};

// == Type Tags ==
const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_UINT: u8 = 0x03;
const TAG_FLOAT: u8 = 0x04;
const TAG_STR: u8 = 0x05;
const TAG_BYTES: u8 = 0x06;
const TAG_LIST: u8 = 0x07;
const TAG_MAP: u8 = 0x08;
const TAG_IDENTITY: u8 = 0x09;
const TAG_PAIRS: u8 = 0x0A;
const TAG_VARIANT: u8 = 0x0B;
const TAG_UNIQUE: u8 = 0x0C;
const TAG_CALL: u8 = 0x10;

// == Cache Key ==
/// SHA-256 digest identifying one argument set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Derives the key for a call.
    pub fn derive(args: &CallArgs) -> Self {
        let digest = Sha256::digest(canonical_bytes(args));
        Self(digest.into())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 16 hex characters, enough to tell keys apart in logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.short())
    }
}

impl CallArgs {
    /// Key under which results of this call are stored.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::derive(self)
    }
}

// == Encoding ==
/// Unhashed encoding of a whole call.
pub fn canonical_bytes(args: &CallArgs) -> Vec<u8> {
    let mut out = vec![TAG_CALL];

    write_len(&mut out, args.positional.len());
    for arg in &args.positional {
        write_arg(&mut out, arg);
    }

    write_len(&mut out, args.keyword.len());
    for (name, arg) in &args.keyword {
        write_str(&mut out, name);
        write_arg(&mut out, arg);
    }

    out
}

/// Unhashed encoding of a single argument.
pub(crate) fn arg_bytes(arg: &Arg) -> Vec<u8> {
    let mut out = Vec::new();
    write_arg(&mut out, arg);
    out
}

/// Encoded entries of a pair map in canonical order.
pub(crate) fn sorted_pairs(pairs: &[(Arg, Arg)]) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut encoded: Vec<_> = pairs
        .iter()
        .map(|(key, value)| (arg_bytes(key), arg_bytes(value)))
        .collect();
    encoded.sort();
    encoded
}

fn write_arg(out: &mut Vec<u8>, arg: &Arg) {
    match arg {
        Arg::Null => out.push(TAG_NULL),
        Arg::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*b));
        }
        Arg::Int(i) => {
            out.push(TAG_INT);
            out.extend_from_slice(&i.to_le_bytes());
        }
        Arg::UInt(u) => {
            out.push(TAG_UINT);
            out.extend_from_slice(&u.to_le_bytes());
        }
        Arg::Float(f) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&f.to_bits().to_le_bytes());
        }
        Arg::Str(s) => {
            out.push(TAG_STR);
            write_str(out, s);
        }
        Arg::Bytes(bytes) => {
            out.push(TAG_BYTES);
            write_len(out, bytes.len());
            out.extend_from_slice(bytes);
        }
        Arg::List(items) => {
            out.push(TAG_LIST);
            write_len(out, items.len());
            for item in items {
                write_arg(out, item);
            }
        }
        Arg::Map(map) => {
            out.push(TAG_MAP);
            write_len(out, map.len());
            for (name, value) in map {
                write_str(out, name);
                write_arg(out, value);
            }
        }
        Arg::Pairs(pairs) => {
            out.push(TAG_PAIRS);
            write_len(out, pairs.len());
            for (key, value) in sorted_pairs(pairs) {
                out.extend_from_slice(&key);
                out.extend_from_slice(&value);
            }
        }
        Arg::Variant { name, value } => {
            out.push(TAG_VARIANT);
            write_str(out, name);
            write_arg(out, value);
        }
        Arg::Identity(pinned) => {
            out.push(TAG_IDENTITY);
            write_str(out, pinned.type_name());
            out.extend_from_slice(&(pinned.addr() as u64).to_le_bytes());
        }
        Arg::Unique(token) => {
            out.push(TAG_UNIQUE);
            out.extend_from_slice(&token.to_le_bytes());
        }
    }
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    write_len(out, s.len());
    out.extend_from_slice(s.as_bytes());
}

fn write_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u64).to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_args_same_key() {
        let a = CallArgs::new().arg(1).arg("x").kwarg("k", 2.5);
        let b = CallArgs::new().arg(1).arg("x").kwarg("k", 2.5);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_keyword_order_ignored() {
        let a = CallArgs::new().kwarg("a", 1).kwarg("b", 2);
        let b = CallArgs::new().kwarg("b", 2).kwarg("a", 1);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_positional_order_matters() {
        let a = CallArgs::new().arg(1).arg(2);
        let b = CallArgs::new().arg(2).arg(1);
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_argument_boundaries_are_unambiguous() {
        let a = CallArgs::new().arg("a").arg("bc");
        let b = CallArgs::new().arg("ab").arg("c");
        assert_ne!(canonical_bytes(&a), canonical_bytes(&b));
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_nul_prefixed_strings_differ() {
        let a = CallArgs::new().kwarg("x", "\0B");
        let b = CallArgs::new().kwarg("x", "\0\0C");
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_positional_and_keyword_forms_differ() {
        let positional = CallArgs::new().arg(1);
        let keyword = CallArgs::new().kwarg("x", 1);
        assert_ne!(positional.cache_key(), keyword.cache_key());
    }

    #[test]
    fn test_type_tags_separate_equal_looking_values() {
        let int = CallArgs::new().arg(1);
        let float = CallArgs::new().arg(1.0);
        let string = CallArgs::new().arg("1");
        let boolean = CallArgs::new().arg(true);

        let keys = [int, float, string, boolean].map(|args| args.cache_key());
        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                assert_ne!(keys[i], keys[j]);
            }
        }
    }

    #[test]
    fn test_nested_list_boundaries() {
        let a = CallArgs::new().arg(vec![vec![1], vec![2, 3]]);
        let b = CallArgs::new().arg(vec![vec![1, 2], vec![3]]);
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_signed_zeros_differ() {
        let positive = CallArgs::new().arg(0.0);
        let negative = CallArgs::new().arg(-0.0);
        assert_ne!(positive, negative);
        assert_ne!(positive.cache_key(), negative.cache_key());
    }

    #[test]
    fn test_pair_maps_key_by_content_not_order() {
        let a = CallArgs::new().arg(Arg::Pairs(vec![
            (Arg::Int(1), Arg::from("x")),
            (Arg::Int(2), Arg::from("y")),
        ]));
        let b = CallArgs::new().arg(Arg::Pairs(vec![
            (Arg::Int(2), Arg::from("y")),
            (Arg::Int(1), Arg::from("x")),
        ]));
        assert_eq!(a, b);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_empty_call_is_stable() {
        assert_eq!(CallArgs::new().cache_key(), CallArgs::default().cache_key());
    }

    #[test]
    fn test_key_formatting() {
        let key = CallArgs::new().arg(1).cache_key();
        assert_eq!(key.to_string().len(), 64);
        assert_eq!(key.short().len(), 16);
        assert!(key.to_string().starts_with(&key.short()));
        assert_eq!(format!("{:?}", key), format!("CacheKey({})", key.short()));
    }
}
