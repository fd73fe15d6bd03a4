//! Event sources and sinks for `serde_json` values and JSON text.

use std::fmt;
use std::io::{self, Read, Write};

use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use serde_json::{Map, Number, Value};

use crate::filter::{copy_filtered, unbalanced, JsonEvent, JsonSink, JsonSource};
use crate::tree::Tree;
use crate::types::FilterError;

impl JsonSource for &Value {
    fn emit_into<S: JsonSink + ?Sized>(self, sink: &mut S) -> Result<(), FilterError> {
        match self {
            Value::Object(map) => {
                sink.write_event(JsonEvent::StartObject)?;
                for (key, value) in map {
                    sink.write_event(JsonEvent::FieldName(key.clone()))?;
                    value.emit_into(sink)?;
                }
                sink.write_event(JsonEvent::EndObject)
            }
            Value::Array(items) => {
                sink.write_event(JsonEvent::StartArray)?;
                for item in items {
                    item.emit_into(sink)?;
                }
                sink.write_event(JsonEvent::EndArray)
            }
            scalar => sink.write_event(JsonEvent::Scalar(scalar.clone())),
        }
    }
}

/// JSON text read from `R`, emitted token by token in document order without building a
/// [`Value`] for the whole document.
#[derive(Debug)]
pub struct JsonText<R> {
    reader: R,
}

impl<R: Read> JsonText<R> {
    pub fn new(reader: R) -> Self {
        JsonText { reader }
    }
}

impl<R: Read> JsonSource for JsonText<R> {
    fn emit_into<S: JsonSink + ?Sized>(self, sink: &mut S) -> Result<(), FilterError> {
        let mut failure = None;
        let mut deserializer = serde_json::Deserializer::from_reader(self.reader);
        let outcome = EventSeed {
            sink,
            failure: &mut failure,
        }
        .deserialize(&mut deserializer)
        .and_then(|()| deserializer.end());

        // sink errors travel through serde as strings, report the original instead
        match (outcome, failure) {
            (_, Some(err)) => Err(err),
            (Err(err), None) => Err(err.into()),
            (Ok(()), None) => Ok(()),
        }
    }
}

// map key serde_json uses to hand over a number's source digits under `arbitrary_precision`
const NUMBER_TOKEN: &str = "$serde_json::private::Number";

struct EventSeed<'a, S: ?Sized> {
    sink: &'a mut S,
    failure: &'a mut Option<FilterError>,
}

impl<'de, S: JsonSink + ?Sized> DeserializeSeed<'de> for EventSeed<'_, S> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<S: JsonSink + ?Sized> EventSeed<'_, S> {
    fn emit<E: de::Error>(&mut self, event: JsonEvent) -> Result<(), E> {
        self.sink.write_event(event).map_err(|err| {
            let message = err.to_string();
            *self.failure = Some(err);
            E::custom(message)
        })
    }

    fn scalar<E: de::Error>(mut self, value: Value) -> Result<(), E> {
        self.emit(JsonEvent::Scalar(value))
    }

    fn nested(&mut self) -> EventSeed<'_, S> {
        EventSeed {
            sink: &mut *self.sink,
            failure: &mut *self.failure,
        }
    }
}

impl<'de, S: JsonSink + ?Sized> Visitor<'de> for EventSeed<'_, S> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<(), E> {
        self.scalar(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<(), E> {
        self.scalar(Value::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<(), E> {
        self.scalar(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<(), E> {
        self.scalar(Value::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<(), E> {
        self.scalar(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<(), E> {
        self.scalar(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<(), E> {
        self.scalar(Value::Null)
    }

    fn visit_seq<A: SeqAccess<'de>>(mut self, mut seq: A) -> Result<(), A::Error> {
        self.emit(JsonEvent::StartArray)?;
        while seq.next_element_seed(self.nested())?.is_some() {}
        self.emit(JsonEvent::EndArray)
    }

    fn visit_map<A: MapAccess<'de>>(mut self, mut map: A) -> Result<(), A::Error> {
        let Some(first) = map.next_key::<String>()? else {
            self.emit(JsonEvent::StartObject)?;
            return self.emit(JsonEvent::EndObject);
        };
        if first == NUMBER_TOKEN {
            let digits = map.next_value::<String>()?;
            let number = digits
                .parse::<Number>()
                .map_err(<A::Error as de::Error>::custom)?;
            return self.scalar(Value::Number(number));
        }

        self.emit(JsonEvent::StartObject)?;
        let mut key = Some(first);
        while let Some(name) = key {
            self.emit(JsonEvent::FieldName(name))?;
            map.next_value_seed(self.nested())?;
            key = map.next_key::<String>()?;
        }
        self.emit(JsonEvent::EndObject)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    Object { first: bool, has_key: bool },
    Array { first: bool },
}

/// Writes events as JSON text, compact by default.
///
/// Keys and scalars are escaped by `serde_json`, layout comes from a `serde_json`
/// [`Formatter`].
#[derive(Debug)]
pub struct JsonWriter<W, F = CompactFormatter> {
    writer: W,
    formatter: F,
    open: Vec<Open>,
    root_written: bool,
}

impl<W: Write> JsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_formatter(writer, CompactFormatter)
    }
}

impl<W: Write> JsonWriter<W, PrettyFormatter<'static>> {
    /// Two-space indented output.
    pub fn pretty(writer: W) -> Self {
        Self::with_formatter(writer, PrettyFormatter::new())
    }
}

impl<W: Write, F: Formatter> JsonWriter<W, F> {
    pub fn with_formatter(writer: W, formatter: F) -> Self {
        JsonWriter {
            writer,
            formatter,
            open: Vec::new(),
            root_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn begin_value(&mut self) -> Result<(), FilterError> {
        match self.open.last_mut() {
            None if self.root_written => Err(unbalanced("more than one root value")),
            None => Ok(()),
            Some(Open::Array { first }) => {
                self.formatter.begin_array_value(&mut self.writer, *first)?;
                *first = false;
                Ok(())
            }
            Some(Open::Object { has_key: true, .. }) => Ok(()),
            Some(Open::Object { .. }) => Err(unbalanced("object value without a field name")),
        }
    }

    fn end_value(&mut self) -> Result<(), FilterError> {
        match self.open.last_mut() {
            None => self.root_written = true,
            Some(Open::Array { .. }) => self.formatter.end_array_value(&mut self.writer)?,
            Some(Open::Object { has_key, .. }) => {
                *has_key = false;
                self.formatter.end_object_value(&mut self.writer)?;
            }
        }
        Ok(())
    }

    fn key(&mut self, name: &str) -> Result<(), FilterError> {
        let Some(Open::Object { first, has_key }) = self.open.last_mut() else {
            return Err(unbalanced("field name outside of an object"));
        };
        if *has_key {
            return Err(unbalanced("field name without a value"));
        }
        self.formatter.begin_object_key(&mut self.writer, *first)?;
        serde_json::to_writer(&mut self.writer, name)?;
        self.formatter.end_object_key(&mut self.writer)?;
        self.formatter.begin_object_value(&mut self.writer)?;
        *first = false;
        *has_key = true;
        Ok(())
    }
}

impl<W: Write, F: Formatter> JsonSink for JsonWriter<W, F> {
    fn write_event(&mut self, event: JsonEvent) -> Result<(), FilterError> {
        match event {
            JsonEvent::StartObject => {
                self.begin_value()?;
                self.formatter.begin_object(&mut self.writer)?;
                self.open.push(Open::Object {
                    first: true,
                    has_key: false,
                });
            }
            JsonEvent::StartArray => {
                self.begin_value()?;
                self.formatter.begin_array(&mut self.writer)?;
                self.open.push(Open::Array { first: true });
            }
            JsonEvent::EndObject => {
                match self.open.pop() {
                    Some(Open::Object { has_key: false, .. }) => {}
                    _ => return Err(unbalanced("unexpected end of object")),
                }
                self.formatter.end_object(&mut self.writer)?;
                self.end_value()?;
            }
            JsonEvent::EndArray => {
                if !matches!(self.open.pop(), Some(Open::Array { .. })) {
                    return Err(unbalanced("unexpected end of array"));
                }
                self.formatter.end_array(&mut self.writer)?;
                self.end_value()?;
            }
            JsonEvent::FieldName(name) => self.key(&name)?,
            JsonEvent::Scalar(value) => {
                self.begin_value()?;
                serde_json::to_writer(&mut self.writer, &value)?;
                self.end_value()?;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), FilterError> {
        if !self.open.is_empty() {
            return Err(unbalanced("stream ended inside a container"));
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Debug)]
enum Partial {
    Object(Map<String, Value>, Option<String>),
    Array(Vec<Value>),
}

/// Collects events back into a [`Value`].
#[derive(Debug, Default)]
pub struct ValueBuilder {
    partial: Vec<Partial>,
    value: Option<Value>,
}

impl ValueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The finished value, `None` if no complete value was written.
    pub fn into_value(self) -> Option<Value> {
        if self.partial.is_empty() {
            self.value
        } else {
            None
        }
    }

    fn attach(&mut self, value: Value) -> Result<(), FilterError> {
        match self.partial.last_mut() {
            None if self.value.is_some() => Err(unbalanced("more than one root value")),
            None => {
                self.value = Some(value);
                Ok(())
            }
            Some(Partial::Array(items)) => {
                items.push(value);
                Ok(())
            }
            Some(Partial::Object(map, key)) => {
                let key = key
                    .take()
                    .ok_or_else(|| unbalanced("object value without a field name"))?;
                map.insert(key, value);
                Ok(())
            }
        }
    }
}

impl JsonSink for ValueBuilder {
    fn write_event(&mut self, event: JsonEvent) -> Result<(), FilterError> {
        match event {
            JsonEvent::StartObject => self.partial.push(Partial::Object(Map::new(), None)),
            JsonEvent::StartArray => self.partial.push(Partial::Array(Vec::new())),
            JsonEvent::EndObject => match self.partial.pop() {
                Some(Partial::Object(map, None)) => self.attach(Value::Object(map))?,
                _ => return Err(unbalanced("unexpected end of object")),
            },
            JsonEvent::EndArray => match self.partial.pop() {
                Some(Partial::Array(items)) => self.attach(Value::Array(items))?,
                _ => return Err(unbalanced("unexpected end of array")),
            },
            JsonEvent::FieldName(name) => match self.partial.last_mut() {
                Some(Partial::Object(_, key)) if key.is_none() => *key = Some(name),
                _ => return Err(unbalanced("field name outside of an object")),
            },
            JsonEvent::Scalar(value) => self.attach(value)?,
        }
        Ok(())
    }
}

/// Filters a [`Value`] through `tree`.
///
/// ## Example
///
/// ```rust
/// use fieldmask::{filter_value, FieldsExpression};
/// use serde_json::json;
///
/// let expression = FieldsExpression::parse("items(id)").unwrap();
/// let response = json!({"etag": "x", "items": [{"id": 1, "title": "a"}, {"id": 2}]});
///
/// let filtered = filter_value(&response, expression.filter_tree()).unwrap();
/// assert_eq!(filtered, json!({"items": [{"id": 1}, {"id": 2}]}));
/// ```
pub fn filter_value(value: &Value, tree: &Tree) -> Result<Value, FilterError> {
    copy_filtered(value, ValueBuilder::new(), tree)?
        .into_value()
        .ok_or_else(|| unbalanced("no value was produced"))
}

/// Filters JSON text through `tree`, keeping the field order of the input.
pub fn filter_str(json: &str, tree: &Tree) -> Result<String, FilterError> {
    let bytes = filter_reader(json.as_bytes(), Vec::new(), tree)?;
    String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err).into())
}

/// Streams JSON text from `reader` to `writer`, filtered through `tree`.
pub fn filter_reader<R: Read, W: Write>(reader: R, writer: W, tree: &Tree) -> Result<W, FilterError> {
    copy_filtered(JsonText::new(reader), JsonWriter::new(writer), tree).map(JsonWriter::into_inner)
}
