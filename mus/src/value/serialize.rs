use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{ser, Serialize, Serializer};

use crate::error::{Error, ErrorKind};
use crate::utils::OnDrop;
use crate::value::{StringType, Value, ValueMap, ValueRepr};

// Values that get serialized while we are building values are passed
// through in-band.  serde has no other way to hand back an opaque object.
const VALUE_HANDLE_MARKER: &str = "\x01__mus_ValueHandle";

thread_local! {
    static INTERNAL_SERIALIZATION: Cell<bool> = const { Cell::new(false) };
    static LAST_VALUE_HANDLE: Cell<u32> = const { Cell::new(0) };
    static VALUE_HANDLES: RefCell<BTreeMap<u32, Value>> = RefCell::new(BTreeMap::new());
}

fn mark_internal_serialization() -> impl Drop {
    let old = INTERNAL_SERIALIZATION.with(|flag| {
        let old = flag.get();
        flag.set(true);
        old
    });
    OnDrop::new(move || {
        if !old {
            INTERNAL_SERIALIZATION.with(|flag| flag.set(false));
        }
    })
}

/// Function that returns true when serialization for [`Value`] is taking place.
///
/// The render context and the return values of filters pass through serde
/// on their way into the engine.  A custom [`Serialize`] implementation can
/// call this to emit a representation tuned for templates.
pub fn serializing_for_value() -> bool {
    INTERNAL_SERIALIZATION.with(|flag| flag.get())
}

fn transform<T: Serialize + ?Sized>(value: &T) -> Result<Value, Error> {
    value.serialize(ValueSerializer)
}

impl Value {
    /// Creates a value from something that can be serialized.
    ///
    /// If serialization fails the result is undefined.  Use
    /// [`try_from_serializable`](Value::try_from_serializable) to observe
    /// the failure.
    ///
    /// ```
    /// # use mus::value::Value;
    /// let val = Value::from_serializable(&vec![1, 2, 3]);
    /// assert_eq!(val.to_string(), "1,2,3");
    /// ```
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Value {
        match Value::try_from_serializable(value) {
            Ok(rv) => rv,
            Err(_err) => {
                debug!(error = %_err, "serialization into value failed");
                Value::UNDEFINED
            }
        }
    }

    /// Creates a value from something that can be serialized or fails with
    /// [`ErrorKind::BadSerialization`].
    pub fn try_from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Value, Error> {
        let _serialization_guard = mark_internal_serialization();
        transform(value)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializing_for_value() {
            let handle = LAST_VALUE_HANDLE.with(|x| {
                // handles only live for a single serialization call so
                // wrapping around is harmless.
                let rv = x.get().wrapping_add(1);
                x.set(rv);
                rv
            });
            VALUE_HANDLES.with(|handles| handles.borrow_mut().insert(handle, self.clone()));
            return serializer.serialize_unit_variant(
                VALUE_HANDLE_MARKER,
                handle,
                VALUE_HANDLE_MARKER,
            );
        }

        match self.0 {
            ValueRepr::Bool(b) => serializer.serialize_bool(b),
            ValueRepr::I64(i) => serializer.serialize_i64(i),
            ValueRepr::F64(f) => serializer.serialize_f64(f),
            ValueRepr::None | ValueRepr::Undefined => serializer.serialize_unit(),
            ValueRepr::String(ref s, _) => serializer.serialize_str(s),
            ValueRepr::Seq(ref elements) => elements.serialize(serializer),
            ValueRepr::Map(ref entries) => {
                use serde::ser::SerializeMap;
                let mut map = ok!(serializer.serialize_map(Some(entries.len())));
                for (k, v) in entries.iter() {
                    ok!(map.serialize_entry(k, v));
                }
                map.end()
            }
            ValueRepr::Regex(ref re) => {
                serializer.serialize_str(&format!("/{}/{}", re.source, re.flags))
            }
        }
    }
}

fn map_key(key: Value) -> Result<String, Error> {
    match key.0 {
        ValueRepr::String(s, _) => Ok(s.to_string()),
        ValueRepr::I64(_) | ValueRepr::F64(_) | ValueRepr::Bool(_) => Ok(key.to_string()),
        _ => Err(Error::new(
            ErrorKind::BadSerialization,
            format!("unsupported map key of kind {}", key.kind()),
        )),
    }
}

fn seq(values: Vec<Value>) -> Value {
    ValueRepr::Seq(Arc::new(values)).into()
}

fn single_entry_map(key: &str, value: Value) -> Value {
    let mut map = ValueMap::new();
    map.insert(key.to_string(), value);
    Value::from(map)
}

pub struct ValueSerializer;

impl Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;

    type SerializeSeq = SerializeSeq;
    type SerializeTuple = SerializeSeq;
    type SerializeTupleStruct = SerializeSeq;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeStruct;
    type SerializeStructVariant = SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> Result<Value, Error> {
        Ok(ValueRepr::Bool(v).into())
    }

    fn serialize_i8(self, v: i8) -> Result<Value, Error> {
        Ok(ValueRepr::I64(v as i64).into())
    }

    fn serialize_i16(self, v: i16) -> Result<Value, Error> {
        Ok(ValueRepr::I64(v as i64).into())
    }

    fn serialize_i32(self, v: i32) -> Result<Value, Error> {
        Ok(ValueRepr::I64(v as i64).into())
    }

    fn serialize_i64(self, v: i64) -> Result<Value, Error> {
        Ok(ValueRepr::I64(v).into())
    }

    fn serialize_i128(self, v: i128) -> Result<Value, Error> {
        Ok(match i64::try_from(v) {
            Ok(v) => ValueRepr::I64(v),
            Err(_) => ValueRepr::F64(v as f64),
        }
        .into())
    }

    fn serialize_u8(self, v: u8) -> Result<Value, Error> {
        Ok(ValueRepr::I64(v as i64).into())
    }

    fn serialize_u16(self, v: u16) -> Result<Value, Error> {
        Ok(ValueRepr::I64(v as i64).into())
    }

    fn serialize_u32(self, v: u32) -> Result<Value, Error> {
        Ok(ValueRepr::I64(v as i64).into())
    }

    fn serialize_u64(self, v: u64) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, Error> {
        Ok(match i64::try_from(v) {
            Ok(v) => ValueRepr::I64(v),
            Err(_) => ValueRepr::F64(v as f64),
        }
        .into())
    }

    fn serialize_f32(self, v: f32) -> Result<Value, Error> {
        Ok(ValueRepr::F64(v as f64).into())
    }

    fn serialize_f64(self, v: f64) -> Result<Value, Error> {
        Ok(ValueRepr::F64(v).into())
    }

    fn serialize_char(self, v: char) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_str(self, value: &str) -> Result<Value, Error> {
        Ok(ValueRepr::String(Arc::from(value), StringType::Normal).into())
    }

    fn serialize_bytes(self, value: &[u8]) -> Result<Value, Error> {
        Ok(value.iter().copied().map(Value::from).collect())
    }

    fn serialize_none(self) -> Result<Value, Error> {
        Ok(ValueRepr::None.into())
    }

    fn serialize_some<T: ?Sized>(self, value: &T) -> Result<Value, Error>
    where
        T: Serialize,
    {
        transform(value)
    }

    fn serialize_unit(self) -> Result<Value, Error> {
        Ok(ValueRepr::None.into())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, Error> {
        Ok(ValueRepr::None.into())
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, Error> {
        if name == VALUE_HANDLE_MARKER && variant == VALUE_HANDLE_MARKER {
            VALUE_HANDLES
                .with(|handles| handles.borrow_mut().remove(&variant_index))
                .ok_or_else(|| {
                    Error::new(ErrorKind::BadSerialization, "value handle not in registry")
                })
        } else {
            Ok(Value::from(variant))
        }
    }

    fn serialize_newtype_struct<T: ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, Error>
    where
        T: Serialize,
    {
        transform(value)
    }

    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, Error>
    where
        T: Serialize,
    {
        Ok(single_entry_map(variant, ok!(transform(value))))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Error> {
        Ok(SerializeSeq {
            elements: Vec::with_capacity(len.unwrap_or(0).min(1024)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, Error> {
        Ok(SerializeTupleVariant {
            name: variant,
            fields: Vec::with_capacity(len.min(1024)),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Error> {
        Ok(SerializeMap {
            entries: ValueMap::new(),
            key: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Error> {
        Ok(SerializeStruct {
            fields: ValueMap::new(),
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Error> {
        Ok(SerializeStructVariant {
            variant,
            map: ValueMap::new(),
        })
    }
}

pub struct SerializeSeq {
    elements: Vec<Value>,
}

impl ser::SerializeSeq for SerializeSeq {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<(), Error>
    where
        T: Serialize,
    {
        self.elements.push(ok!(transform(value)));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(seq(self.elements))
    }
}

impl ser::SerializeTuple for SerializeSeq {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<(), Error>
    where
        T: Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, Error> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeSeq {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<(), Error>
    where
        T: Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, Error> {
        ser::SerializeSeq::end(self)
    }
}

pub struct SerializeTupleVariant {
    name: &'static str,
    fields: Vec<Value>,
}

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<(), Error>
    where
        T: Serialize,
    {
        self.fields.push(ok!(transform(value)));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(single_entry_map(self.name, seq(self.fields)))
    }
}

pub struct SerializeMap {
    entries: ValueMap,
    key: Option<String>,
}

impl ser::SerializeMap for SerializeMap {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: ?Sized>(&mut self, key: &T) -> Result<(), Error>
    where
        T: Serialize,
    {
        self.key = Some(ok!(map_key(ok!(transform(key)))));
        Ok(())
    }

    fn serialize_value<T: ?Sized>(&mut self, value: &T) -> Result<(), Error>
    where
        T: Serialize,
    {
        let key = ok!(self
            .key
            .take()
            .ok_or_else(|| Error::new(ErrorKind::BadSerialization, "map value without key")));
        self.entries.insert(key, ok!(transform(value)));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(Value::from(self.entries))
    }
}

pub struct SerializeStruct {
    fields: ValueMap,
}

impl ser::SerializeStruct for SerializeStruct {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, key: &'static str, value: &T) -> Result<(), Error>
    where
        T: Serialize,
    {
        self.fields.insert(key.to_string(), ok!(transform(value)));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(Value::from(self.fields))
    }
}

pub struct SerializeStructVariant {
    variant: &'static str,
    map: ValueMap,
}

impl ser::SerializeStructVariant for SerializeStructVariant {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, key: &'static str, value: &T) -> Result<(), Error>
    where
        T: Serialize,
    {
        self.map.insert(key.to_string(), ok!(transform(value)));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(single_entry_map(self.variant, Value::from(self.map)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct User {
        name: &'static str,
        tags: Vec<&'static str>,
    }

    #[derive(Serialize)]
    enum Shape {
        Circle(f64),
        Point,
    }

    #[test]
    fn test_struct_becomes_map() {
        let v = Value::from_serializable(&User {
            name: "Ann",
            tags: vec!["a", "b"],
        });
        insta::assert_debug_snapshot!(v, @r###"
        {
            "name": "Ann",
            "tags": [
                "a",
                "b",
            ],
        }
        "###);
    }

    #[test]
    fn test_enum_variants() {
        let v = Value::from_serializable(&Shape::Circle(1.5));
        assert_eq!(v.get_path(["Circle"]), Value::from(1.5));
        assert_eq!(Value::from_serializable(&Shape::Point), Value::from("Point"));
    }

    #[test]
    fn test_value_roundtrip() {
        let re = Value::from_regex("a+", "g").unwrap();
        let v = Value::from_serializable(&vec![re.clone(), Value::from_safe_string("<b>".into())]);
        let items = v.as_slice().unwrap();
        assert_eq!(items[0], re);
        assert!(items[1].is_safe());
    }

    #[test]
    fn test_large_u64() {
        let v = Value::from_serializable(&u64::MAX);
        assert_eq!(v.as_f64(), Some(u64::MAX as f64));
    }

    #[test]
    fn test_bad_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(vec![1], 2);
        let err = Value::try_from_serializable(&map).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadSerialization);
    }

    #[test]
    fn test_serializing_for_value_flag() {
        assert!(!serializing_for_value());
    }
}
