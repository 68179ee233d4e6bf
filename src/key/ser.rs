//! Serde Bridge Module
//!
//! A `serde::Serializer` whose output is an [`Arg`]. Every serde data
//! model type has a lossless home: maps with non-string keys become
//! [`Arg::Pairs`], non-finite floats stay [`Arg::Float`], byte strings stay
//! [`Arg::Bytes`] and enum variants keep their name.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{self, Serialize};
use thiserror::Error;

use crate::key::encode::arg_bytes;
use crate::key::Arg;

/// A value serde could not turn into an [`Arg`].
#[derive(Error, Debug)]
#[error("Unkeyable value: {0}")]
pub struct Unkeyable(String);

impl ser::Error for Unkeyable {
    fn custom<M: fmt::Display>(msg: M) -> Self {
        Unkeyable(msg.to_string())
    }
}

type Result<T> = std::result::Result<T, Unkeyable>;

pub(crate) fn to_arg<T: Serialize + ?Sized>(value: &T) -> Result<Arg> {
    value.serialize(ArgSerializer)
}

/// Map with string keys when every key is a string, pairs otherwise.
pub(crate) fn map_from_entries(entries: Vec<(Arg, Arg)>) -> Arg {
    if entries.iter().all(|(key, _)| matches!(key, Arg::Str(_))) {
        let map: BTreeMap<String, Arg> = entries
            .into_iter()
            .filter_map(|(key, value)| match key {
                Arg::Str(name) => Some((name, value)),
                _ => None,
            })
            .collect();
        Arg::Map(map)
    } else {
        let mut entries = entries;
        entries.sort_by_cached_key(|(key, _)| arg_bytes(key));
        Arg::Pairs(entries)
    }
}

// == Serializer ==
struct ArgSerializer;

impl ser::Serializer for ArgSerializer {
    type Ok = Arg;
    type Error = Unkeyable;

    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantBuilder<SeqBuilder>;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantBuilder<MapBuilder>;

    fn serialize_bool(self, v: bool) -> Result<Arg> {
        Ok(Arg::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Arg> {
        Ok(Arg::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Arg> {
        Ok(Arg::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Arg> {
        Ok(Arg::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Arg> {
        Ok(Arg::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Arg> {
        if let Ok(i) = i64::try_from(v) {
            return Ok(Arg::Int(i));
        }
        u64::try_from(v)
            .map(Arg::UInt)
            .map_err(|_| Unkeyable(format!("{} does not fit in 64 bits", v)))
    }

    fn serialize_u8(self, v: u8) -> Result<Arg> {
        Ok(Arg::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Arg> {
        Ok(Arg::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Arg> {
        Ok(Arg::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Arg> {
        Ok(Arg::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Arg> {
        u64::try_from(v)
            .map(Arg::from)
            .map_err(|_| Unkeyable(format!("{} does not fit in 64 bits", v)))
    }

    fn serialize_f32(self, v: f32) -> Result<Arg> {
        Ok(Arg::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Arg> {
        Ok(Arg::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<Arg> {
        Ok(Arg::Str(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Arg> {
        Ok(Arg::from(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Arg> {
        Ok(Arg::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Arg> {
        Ok(Arg::Null)
    }

    fn serialize_some<T>(self, value: &T) -> Result<Arg>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Arg> {
        Ok(Arg::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Arg> {
        Ok(Arg::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Arg> {
        Ok(Arg::Variant {
            name: variant.to_string(),
            value: Box::new(Arg::Null),
        })
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Arg>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Arg>
    where
        T: ?Sized + Serialize,
    {
        Ok(Arg::Variant {
            name: variant.to_string(),
            value: Box::new(value.serialize(self)?),
        })
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder> {
        Ok(SeqBuilder::with_capacity(len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder> {
        Ok(SeqBuilder::with_capacity(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqBuilder> {
        Ok(SeqBuilder::with_capacity(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantBuilder<SeqBuilder>> {
        Ok(VariantBuilder {
            name: variant,
            inner: SeqBuilder::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder> {
        Ok(MapBuilder::default())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<MapBuilder> {
        Ok(MapBuilder::default())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<VariantBuilder<MapBuilder>> {
        Ok(VariantBuilder {
            name: variant,
            inner: MapBuilder::default(),
        })
    }
}

// == Builders ==
struct SeqBuilder {
    items: Vec<Arg>,
}

impl SeqBuilder {
    fn with_capacity(len: usize) -> Self {
        Self {
            items: Vec::with_capacity(len),
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.items.push(to_arg(value)?);
        Ok(())
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Arg;
    type Error = Unkeyable;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Arg> {
        Ok(Arg::List(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Arg;
    type Error = Unkeyable;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Arg> {
        Ok(Arg::List(self.items))
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Arg;
    type Error = Unkeyable;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Arg> {
        Ok(Arg::List(self.items))
    }
}

#[derive(Default)]
struct MapBuilder {
    entries: Vec<(Arg, Arg)>,
    pending_key: Option<Arg>,
}

impl MapBuilder {
    fn finish(self) -> Arg {
        map_from_entries(self.entries)
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Arg;
    type Error = Unkeyable;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.pending_key = Some(to_arg(key)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| Unkeyable("map value without a key".to_string()))?;
        self.entries.push((key, to_arg(value)?));
        Ok(())
    }

    fn end(self) -> Result<Arg> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Arg;
    type Error = Unkeyable;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.entries.push((Arg::from(key), to_arg(value)?));
        Ok(())
    }

    fn end(self) -> Result<Arg> {
        Ok(self.finish())
    }
}

/// Collects a variant's fields, then wraps them with the variant name.
struct VariantBuilder<B> {
    name: &'static str,
    inner: B,
}

impl ser::SerializeTupleVariant for VariantBuilder<SeqBuilder> {
    type Ok = Arg;
    type Error = Unkeyable;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.inner.push(value)
    }

    fn end(self) -> Result<Arg> {
        Ok(Arg::Variant {
            name: self.name.to_string(),
            value: Box::new(Arg::List(self.inner.items)),
        })
    }
}

impl ser::SerializeStructVariant for VariantBuilder<MapBuilder> {
    type Ok = Arg;
    type Error = Unkeyable;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.inner.entries.push((Arg::from(key), to_arg(value)?));
        Ok(())
    }

    fn end(self) -> Result<Arg> {
        Ok(Arg::Variant {
            name: self.name.to_string(),
            value: Box::new(self.inner.finish()),
        })
    }
}
