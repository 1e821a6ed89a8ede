//! The JSON view comparators run over.
//!
//! Matches `serde_json::to_value`, except for non-finite floats: `to_value`
//! turns `NaN` and the infinities into `null`, which would make them equal to
//! each other and to `None`. Here each becomes a one-entry object under
//! [`NON_FINITE_KEY`], so `NaN` only equals `NaN`.

use serde::ser::{self, Error as _, Serialize};
use serde_json::{Error, Map, Value};

/// Key of the marker object standing in for a non-finite float.
pub const NON_FINITE_KEY: &str = "\u{0}f64";

/// The comparison view of `value`.
///
/// ```
/// use provision::compare::{data_view, full_equal};
///
/// let nan = data_view(&f64::NAN).unwrap();
/// assert!(full_equal(&nan, &data_view(&f64::NAN).unwrap()));
/// assert!(!full_equal(&nan, &data_view(&f64::INFINITY).unwrap()));
/// assert!(!full_equal(&nan, &data_view(&None::<f64>).unwrap()));
/// ```
pub fn data_view<T: Serialize + ?Sized>(value: &T) -> Result<Value, Error> {
    value.serialize(ViewSerializer)
}

fn float(v: f64) -> Value {
    if v.is_finite() {
        return Value::from(v);
    }
    let name = if v.is_nan() {
        "NaN"
    } else if v > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    };
    let mut marker = Map::new();
    marker.insert(NON_FINITE_KEY.to_owned(), Value::from(name));
    Value::Object(marker)
}

fn key_string(key: Value) -> Result<String, Error> {
    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(Error::custom("map key must be a string")),
    }
}

struct ViewSerializer;

impl ser::Serializer for ViewSerializer {
    type Ok = Value;
    type Error = Error;
    type SerializeSeq = SeqView;
    type SerializeTuple = SeqView;
    type SerializeTupleStruct = SeqView;
    type SerializeTupleVariant = VariantView<Vec<Value>>;
    type SerializeMap = MapView;
    type SerializeStruct = MapView;
    type SerializeStructVariant = VariantView<Map<String, Value>>;

    fn serialize_bool(self, v: bool) -> Result<Value, Error> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, Error> {
        serde_json::to_value(v)
    }

    fn serialize_u8(self, v: u8) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, Error> {
        serde_json::to_value(v)
    }

    fn serialize_f32(self, v: f32) -> Result<Value, Error> {
        Ok(float(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, Error> {
        Ok(float(v))
    }

    fn serialize_char(self, v: char) -> Result<Value, Error> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, Error> {
        Ok(Value::String(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, Error> {
        Ok(Value::Array(v.iter().map(|&b| Value::from(b)).collect()))
    }

    fn serialize_none(self) -> Result<Value, Error> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, Error> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, Error> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Value, Error> {
        Ok(Value::String(variant.to_owned()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, Error> {
        let mut map = Map::new();
        map.insert(variant.to_owned(), data_view(value)?);
        Ok(Value::Object(map))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqView, Error> {
        Ok(SeqView(Vec::with_capacity(len.unwrap_or(0))))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqView, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqView, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantView<Vec<Value>>, Error> {
        Ok(VariantView {
            variant,
            fields: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapView, Error> {
        Ok(MapView::default())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<MapView, Error> {
        Ok(MapView::default())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<VariantView<Map<String, Value>>, Error> {
        Ok(VariantView {
            variant,
            fields: Map::new(),
        })
    }
}

struct SeqView(Vec<Value>);

impl ser::SerializeSeq for SeqView {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        self.0.push(data_view(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(Value::Array(self.0))
    }
}

impl ser::SerializeTuple for SeqView {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, Error> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqView {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, Error> {
        ser::SerializeSeq::end(self)
    }
}

#[derive(Default)]
struct MapView {
    map: Map<String, Value>,
    key: Option<String>,
}

impl ser::SerializeMap for MapView {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Error> {
        self.key = Some(key_string(data_view(key)?)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        let key = self
            .key
            .take()
            .ok_or_else(|| Error::custom("map value without a key"))?;
        self.map.insert(key, data_view(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(Value::Object(self.map))
    }
}

impl ser::SerializeStruct for MapView {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.map.insert(key.to_owned(), data_view(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(Value::Object(self.map))
    }
}

/// Enum variants with fields view as `{ variant: fields }`.
struct VariantView<F> {
    variant: &'static str,
    fields: F,
}

impl<F: Into<Value>> VariantView<F> {
    fn finish(self) -> Value {
        let mut map = Map::new();
        map.insert(self.variant.to_owned(), self.fields.into());
        Value::Object(map)
    }
}

impl ser::SerializeTupleVariant for VariantView<Vec<Value>> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        self.fields.push(data_view(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for VariantView<Map<String, Value>> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.fields.insert(key.to_owned(), data_view(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn matches_to_value_for_finite_data() {
        #[derive(Serialize)]
        enum Shape {
            Unit,
            Circle(f64),
            Pair(i32, i32),
            Rect { w: u8, h: u8 },
        }
        #[derive(Serialize)]
        struct Data {
            name: String,
            tags: Vec<char>,
            shapes: Vec<Shape>,
            by_id: BTreeMap<u32, bool>,
            missing: Option<i64>,
        }
        let data = Data {
            name: "x".into(),
            tags: vec!['a'],
            shapes: vec![
                Shape::Unit,
                Shape::Circle(1.5),
                Shape::Pair(1, 2),
                Shape::Rect { w: 3, h: 4 },
            ],
            by_id: BTreeMap::from([(7, true)]),
            missing: None,
        };
        assert_eq!(data_view(&data).unwrap(), serde_json::to_value(&data).unwrap());
    }

    #[test]
    fn non_finite_floats_get_markers() {
        assert_eq!(data_view(&f64::NAN).unwrap(), json!({ "\u{0}f64": "NaN" }));
        assert_eq!(data_view(&f32::INFINITY).unwrap(), json!({ "\u{0}f64": "Infinity" }));
        assert_eq!(
            data_view(&vec![f64::NEG_INFINITY]).unwrap(),
            json!([{ "\u{0}f64": "-Infinity" }])
        );
        assert_eq!(data_view(&-0.0f64).unwrap(), json!(-0.0));
    }
}
