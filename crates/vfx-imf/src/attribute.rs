//! Typed attributes and their binary form.
//!
//! An attribute is a name, a type name and a payload. Known type names map
//! to a variant of [`AttributeValue`]; anything else is kept verbatim as
//! [`AttributeValue::Opaque`] so files from newer writers survive a
//! read-modify-write cycle unchanged.
//!
//! # Wire format
//!
//! ```text
//! name \0 type_name \0 size:u32 payload[size]   (repeated)
//! \0                                             (end of header)
//! ```
//!
//! # Example
//!
//! ```rust
//! use vfx_imf::{AttributeStore, AttributeValue, Rational};
//!
//! let mut store = AttributeStore::new();
//! store.set("framesPerSecond", Rational::new(24, 1)).unwrap();
//! store.set("owner", vfx_imf::Text::new("ILM").unwrap()).unwrap();
//!
//! let bytes = store.serialize().unwrap();
//! let parsed = AttributeStore::parse(&bytes).unwrap();
//! assert_eq!(parsed, store);
//! assert_eq!(parsed.get_as::<Rational>("framesPerSecond").unwrap(), Rational::new(24, 1));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};

use tracing::trace;

use crate::channel::ChannelLayout;
use crate::enums::{Compression, EnvMap, LineOrder};
use crate::error::{Error, Result};
use crate::format::{LONG_NAME_LIMIT, SHORT_NAME_LIMIT};
use crate::io::*;
use crate::types::*;

// === Text ===

/// ASCII string as stored in `string` and `stringvector` attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Text(String);

impl Text {
    /// Wraps `text`, failing with a contract violation if it is not ASCII.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if !text.is_ascii() {
            return Err(Error::contract(format!(
                "text attribute value is not ASCII: {text:?}"
            )));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Text {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// === Values ===

/// Value of one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Box2i(Box2i),
    Box2f(Box2f),
    ChannelList(ChannelLayout),
    Chromaticities(Chromaticities),
    Compression(Compression),
    Double(f64),
    EnvMap(EnvMap),
    Float(f32),
    FloatVector(Vec<f32>),
    Int(i32),
    KeyCode(KeyCode),
    LineOrder(LineOrder),
    M33f(M33f),
    M44f(M44f),
    Preview(Preview),
    Rational(Rational),
    Text(Text),
    TextVector(Vec<Text>),
    TileDescription(TileDescription),
    TimeCode(TimeCode),
    V2i(V2i),
    V2f(V2f),
    V3i(V3i),
    V3f(V3f),

    /// Payload of a type this crate does not interpret.
    Opaque {
        type_name: String,
        bytes: Vec<u8>,
    },
}

/// Type names with a dedicated decoder.
pub const KNOWN_TYPE_NAMES: &[&str] = &[
    "box2i",
    "box2f",
    "chlist",
    "chromaticities",
    "compression",
    "double",
    "envmap",
    "float",
    "floatvector",
    "int",
    "keycode",
    "lineOrder",
    "m33f",
    "m44f",
    "preview",
    "rational",
    "string",
    "stringvector",
    "tiledesc",
    "timecode",
    "v2i",
    "v2f",
    "v3i",
    "v3f",
];

impl AttributeValue {
    /// The type name written to the file.
    pub fn type_name(&self) -> &str {
        use AttributeValue::*;
        match self {
            Box2i(_) => "box2i",
            Box2f(_) => "box2f",
            ChannelList(_) => "chlist",
            Chromaticities(_) => "chromaticities",
            Compression(_) => "compression",
            Double(_) => "double",
            EnvMap(_) => "envmap",
            Float(_) => "float",
            FloatVector(_) => "floatvector",
            Int(_) => "int",
            KeyCode(_) => "keycode",
            LineOrder(_) => "lineOrder",
            M33f(_) => "m33f",
            M44f(_) => "m44f",
            Preview(_) => "preview",
            Rational(_) => "rational",
            Text(_) => "string",
            TextVector(_) => "stringvector",
            TileDescription(_) => "tiledesc",
            TimeCode(_) => "timecode",
            V2i(_) => "v2i",
            V2f(_) => "v2f",
            V3i(_) => "v3i",
            V3f(_) => "v3f",
            Opaque { type_name, .. } => type_name.as_str(),
        }
    }

    /// Returns `true` for [`AttributeValue::Opaque`].
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Opaque { .. })
    }

    /// Encodes the payload without name, type name or size.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        use AttributeValue::*;

        let mut out = Vec::new();
        let w = &mut out;
        match self {
            Box2i(b) => {
                for v in [b.min.x, b.min.y, b.max.x, b.max.y] {
                    write_i32(w, v)?;
                }
            }
            Box2f(b) => write_f32s(w, &[b.min.x, b.min.y, b.max.x, b.max.y])?,
            ChannelList(layout) => layout.write_to(w)?,
            Chromaticities(c) => write_f32s(
                w,
                &[
                    c.red.x, c.red.y, c.green.x, c.green.y, c.blue.x, c.blue.y, c.white.x,
                    c.white.y,
                ],
            )?,
            Compression(c) => w.push(c.ordinal()),
            Double(v) => write_f64(w, *v)?,
            EnvMap(e) => w.push(e.ordinal()),
            Float(v) => write_f32(w, *v)?,
            FloatVector(values) => write_f32s(w, values)?,
            Int(v) => write_i32(w, *v)?,
            KeyCode(k) => {
                for v in [
                    k.film_mfc_code,
                    k.film_type,
                    k.prefix,
                    k.count,
                    k.perf_offset,
                    k.perfs_per_frame,
                    k.perfs_per_count,
                ] {
                    write_i32(w, v)?;
                }
            }
            LineOrder(l) => w.push(l.ordinal()),
            M33f(m) => write_f32s(w, &m.0)?,
            M44f(m) => write_f32s(w, &m.0)?,
            Preview(p) => {
                write_u32(w, p.width())?;
                write_u32(w, p.height())?;
                w.extend_from_slice(p.pixels());
            }
            Rational(r) => {
                write_i32(w, r.numerator)?;
                write_i32(w, r.denominator)?;
            }
            Text(t) => w.extend_from_slice(t.as_str().as_bytes()),
            TextVector(texts) => {
                for t in texts {
                    write_i32(w, length_i32(t.as_str().len())?)?;
                    w.extend_from_slice(t.as_str().as_bytes());
                }
            }
            TileDescription(t) => {
                write_u32(w, t.x_size)?;
                write_u32(w, t.y_size)?;
                w.push(t.mode_byte());
            }
            TimeCode(t) => {
                write_u32(w, t.time_and_flags)?;
                write_u32(w, t.user_data)?;
            }
            V2i(v) => {
                write_i32(w, v.x)?;
                write_i32(w, v.y)?;
            }
            V2f(v) => write_f32s(w, &[v.x, v.y])?,
            V3i(v) => {
                write_i32(w, v.x)?;
                write_i32(w, v.y)?;
                write_i32(w, v.z)?;
            }
            V3f(v) => write_f32s(w, &[v.x, v.y, v.z])?,
            Opaque { bytes, .. } => w.extend_from_slice(bytes),
        }
        Ok(out)
    }

    /// Decodes a payload of the given type name.
    ///
    /// Unknown type names, and `string`/`stringvector` payloads that are
    /// not ASCII, come back as [`AttributeValue::Opaque`]. Known types must
    /// consume the payload exactly.
    pub fn from_payload(type_name: &str, payload: &[u8], name_limit: usize) -> Result<Self> {
        let mut r = payload;
        let value = match type_name {
            "box2i" => {
                let min = V2::new(read_i32(&mut r)?, read_i32(&mut r)?);
                let max = V2::new(read_i32(&mut r)?, read_i32(&mut r)?);
                Self::Box2i(Box2::new(min, max))
            }
            "box2f" => {
                let [a, b, c, d] = read_f32s::<4>(&mut r)?;
                Self::Box2f(Box2::new(V2::new(a, b), V2::new(c, d)))
            }
            "chlist" => Self::ChannelList(ChannelLayout::read_from(&mut r, name_limit)?),
            "chromaticities" => {
                let v = read_f32s::<8>(&mut r)?;
                Self::Chromaticities(Chromaticities {
                    red: Chromaticity::new(v[0], v[1]),
                    green: Chromaticity::new(v[2], v[3]),
                    blue: Chromaticity::new(v[4], v[5]),
                    white: Chromaticity::new(v[6], v[7]),
                })
            }
            "compression" => Self::Compression(Compression::from_ordinal(read_byte(&mut r)?)?),
            "double" => Self::Double(read_f64(&mut r)?),
            "envmap" => Self::EnvMap(EnvMap::from_ordinal(read_byte(&mut r)?)?),
            "float" => Self::Float(read_f32(&mut r)?),
            "floatvector" => {
                if payload.len() % 4 != 0 {
                    return Err(Error::format(format!(
                        "floatvector payload of {} bytes",
                        payload.len()
                    )));
                }
                let mut values = Vec::with_capacity(payload.len() / 4);
                while !r.is_empty() {
                    values.push(read_f32(&mut r)?);
                }
                Self::FloatVector(values)
            }
            "int" => Self::Int(read_i32(&mut r)?),
            "keycode" => Self::KeyCode(KeyCode {
                film_mfc_code: read_i32(&mut r)?,
                film_type: read_i32(&mut r)?,
                prefix: read_i32(&mut r)?,
                count: read_i32(&mut r)?,
                perf_offset: read_i32(&mut r)?,
                perfs_per_frame: read_i32(&mut r)?,
                perfs_per_count: read_i32(&mut r)?,
            }),
            "lineOrder" => Self::LineOrder(LineOrder::from_ordinal(read_byte(&mut r)?)?),
            "m33f" => Self::M33f(M33f(read_f32s::<9>(&mut r)?)),
            "m44f" => Self::M44f(M44f(read_f32s::<16>(&mut r)?)),
            "preview" => {
                let width = read_u32(&mut r)?;
                let height = read_u32(&mut r)?;
                let len = width as usize * height as usize * 4;
                let pixels = read_bytes(&mut r, len)?;
                Self::Preview(Preview::new(width, height, pixels).map_err(Error::into_format)?)
            }
            "rational" => Self::Rational(Rational::new(read_i32(&mut r)?, read_i32(&mut r)?)),
            "string" => {
                r = &[];
                match std::str::from_utf8(payload) {
                    Ok(s) if s.is_ascii() => Self::Text(Text(s.to_string())),
                    _ => Self::Opaque {
                        type_name: type_name.to_string(),
                        bytes: payload.to_vec(),
                    },
                }
            }
            "stringvector" => {
                let mut entries = Vec::new();
                while !r.is_empty() {
                    let len = read_i32(&mut r)?;
                    let len = usize::try_from(len)
                        .map_err(|_| Error::format(format!("negative string length {len}")))?;
                    entries.push(read_bytes(&mut r, len)?);
                }
                if entries.iter().all(|e| e.is_ascii()) {
                    Self::TextVector(
                        entries
                            .into_iter()
                            .map(|e| Text(e.into_iter().map(char::from).collect()))
                            .collect(),
                    )
                } else {
                    Self::Opaque {
                        type_name: type_name.to_string(),
                        bytes: payload.to_vec(),
                    }
                }
            }
            "tiledesc" => {
                let x_size = read_u32(&mut r)?;
                let y_size = read_u32(&mut r)?;
                let (mode, rounding) = TileDescription::split_mode_byte(read_byte(&mut r)?)?;
                Self::TileDescription(TileDescription {
                    x_size,
                    y_size,
                    mode,
                    rounding,
                })
            }
            "timecode" => {
                let time = read_u32(&mut r)?;
                let user = read_u32(&mut r)?;
                Self::TimeCode(TimeCode::unpack(time, user))
            }
            "v2i" => Self::V2i(V2::new(read_i32(&mut r)?, read_i32(&mut r)?)),
            "v2f" => Self::V2f(V2::new(read_f32(&mut r)?, read_f32(&mut r)?)),
            "v3i" => Self::V3i(V3::new(
                read_i32(&mut r)?,
                read_i32(&mut r)?,
                read_i32(&mut r)?,
            )),
            "v3f" => Self::V3f(V3::new(
                read_f32(&mut r)?,
                read_f32(&mut r)?,
                read_f32(&mut r)?,
            )),
            _ => {
                r = &[];
                Self::Opaque {
                    type_name: type_name.to_string(),
                    bytes: payload.to_vec(),
                }
            }
        };

        if !r.is_empty() {
            return Err(Error::format(format!(
                "{type_name} payload has {} trailing bytes",
                r.len()
            )));
        }
        Ok(value)
    }
}

fn write_f32s(w: &mut Vec<u8>, values: &[f32]) -> Result<()> {
    for &v in values {
        write_f32(w, v)?;
    }
    Ok(())
}

fn read_f32s<const N: usize>(r: &mut &[u8]) -> Result<[f32; N]> {
    let mut values = [0.0; N];
    for v in &mut values {
        *v = read_f32(r)?;
    }
    Ok(values)
}

fn read_byte(r: &mut &[u8]) -> Result<u8> {
    let mut b = [0u8; 1];
    r.read_exact(&mut b)?;
    Ok(b[0])
}

fn length_i32(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| Error::contract(format!("payload of {len} bytes is too large")))
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use AttributeValue::*;
        match self {
            Box2i(v) => write!(f, "{v}"),
            Box2f(v) => write!(f, "{v}"),
            ChannelList(v) => write!(f, "{v}"),
            Chromaticities(v) => write!(f, "{v}"),
            Compression(v) => write!(f, "{v}"),
            Double(v) => write!(f, "{v}"),
            EnvMap(v) => write!(f, "{v}"),
            Float(v) => write!(f, "{v}"),
            FloatVector(v) => write!(f, "{v:?}"),
            Int(v) => write!(f, "{v}"),
            KeyCode(v) => write!(f, "{v}"),
            LineOrder(v) => write!(f, "{v}"),
            M33f(v) => write!(f, "{v}"),
            M44f(v) => write!(f, "{v}"),
            Preview(v) => write!(f, "{v}"),
            Rational(v) => write!(f, "{v}"),
            Text(v) => write!(f, "{:?}", v.as_str()),
            TextVector(v) => {
                let items: Vec<_> = v.iter().map(|t| t.as_str()).collect();
                write!(f, "{items:?}")
            }
            TileDescription(v) => write!(f, "{v}"),
            TimeCode(v) => write!(f, "{v}"),
            V2i(v) => write!(f, "{v}"),
            V2f(v) => write!(f, "{v}"),
            V3i(v) => write!(f, "{v}"),
            V3f(v) => write!(f, "{v}"),
            Opaque { bytes, .. } => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

// === Typed access ===

/// A Rust type that corresponds to one attribute type name.
pub trait AttributeType: Sized {
    /// Type name in the file.
    const TYPE_NAME: &'static str;

    /// Extracts the value if `value` holds this type.
    fn from_value(value: &AttributeValue) -> Option<Self>;

    /// Wraps the value.
    fn into_value(self) -> AttributeValue;
}

macro_rules! attribute_type {
    ($($ty:ty => $variant:ident, $name:literal;)+) => {
        $(
            impl AttributeType for $ty {
                const TYPE_NAME: &'static str = $name;

                fn from_value(value: &AttributeValue) -> Option<Self> {
                    match value {
                        AttributeValue::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }

                fn into_value(self) -> AttributeValue {
                    AttributeValue::$variant(self)
                }
            }

            impl From<$ty> for AttributeValue {
                fn from(value: $ty) -> Self {
                    AttributeValue::$variant(value)
                }
            }
        )+
    };
}

attribute_type! {
    Box2i => Box2i, "box2i";
    Box2f => Box2f, "box2f";
    ChannelLayout => ChannelList, "chlist";
    Chromaticities => Chromaticities, "chromaticities";
    Compression => Compression, "compression";
    f64 => Double, "double";
    EnvMap => EnvMap, "envmap";
    f32 => Float, "float";
    Vec<f32> => FloatVector, "floatvector";
    i32 => Int, "int";
    KeyCode => KeyCode, "keycode";
    LineOrder => LineOrder, "lineOrder";
    M33f => M33f, "m33f";
    M44f => M44f, "m44f";
    Preview => Preview, "preview";
    Rational => Rational, "rational";
    Text => Text, "string";
    Vec<Text> => TextVector, "stringvector";
    TileDescription => TileDescription, "tiledesc";
    TimeCode => TimeCode, "timecode";
    V2i => V2i, "v2i";
    V2f => V2f, "v2f";
    V3i => V3i, "v3i";
    V3f => V3f, "v3f";
}

// === Store ===

/// Attributes ordered by name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeStore {
    attributes: BTreeMap<String, AttributeValue>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an attribute.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Result<()> {
        let name = name.into();
        check_name("attribute", &name)?;
        let value = value.into();
        if let AttributeValue::Opaque { type_name, .. } = &value {
            check_name("attribute type", type_name)?;
        }
        self.attributes.insert(name, value);
        Ok(())
    }

    /// Inserts a value under a name known to be valid.
    pub(crate) fn insert(&mut self, name: &str, value: AttributeValue) {
        self.attributes.insert(name.to_string(), value);
    }

    /// Stores raw bytes under an explicit type name.
    ///
    /// If `type_name` is a known type the payload is decoded right away, so
    /// the stored value matches what a reader of the file will see. A payload
    /// that does not decode is a contract violation.
    pub fn set_opaque(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let type_name = type_name.into();
        check_name("attribute type", &type_name)?;
        let value = if KNOWN_TYPE_NAMES.contains(&type_name.as_str()) {
            AttributeValue::from_payload(&type_name, &bytes, LONG_NAME_LIMIT).map_err(|e| {
                Error::contract(format!("payload is not a valid {type_name}: {e}"))
            })?
        } else {
            AttributeValue::Opaque { type_name, bytes }
        };
        self.set(name, value)
    }

    /// Looks up an attribute.
    pub fn get(&self, name: &str) -> Result<&AttributeValue> {
        self.attributes
            .get(name)
            .ok_or_else(|| Error::not_found("attribute", name))
    }

    /// Looks up an attribute and extracts it as `T`.
    pub fn get_as<T: AttributeType>(&self, name: &str) -> Result<T> {
        let value = self.get(name)?;
        T::from_value(value).ok_or_else(|| Error::type_mismatch(T::TYPE_NAME, value.type_name()))
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        self.attributes.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Returns `true` if any attribute, type or channel name exceeds 31 bytes.
    pub fn has_long_names(&self) -> bool {
        self.attributes.iter().any(|(name, value)| {
            name.len() > SHORT_NAME_LIMIT
                || value.type_name().len() > SHORT_NAME_LIMIT
                || matches!(value, AttributeValue::ChannelList(c) if c.longest_name() > SHORT_NAME_LIMIT)
        })
    }

    /// Writes all attributes and the terminating NUL.
    pub fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        for (name, value) in &self.attributes {
            let payload = value.to_payload()?;
            write_name(write, name)?;
            write_name(write, value.type_name())?;
            write_u32(write, length_i32(payload.len())? as u32)?;
            write.write_all(&payload)?;
        }
        write.write_all(&[0])?;
        Ok(())
    }

    /// Reads attributes up to and including the terminating NUL.
    ///
    /// Names may be up to `name_limit` bytes; payloads larger than
    /// `size_limit` are rejected before they are read.
    pub fn read_from<R: Read>(read: &mut R, name_limit: usize, size_limit: usize) -> Result<Self> {
        let mut store = Self::new();
        loop {
            let name = read_name(read, name_limit)?;
            if name.is_empty() {
                return Ok(store);
            }

            let type_name = read_name(read, name_limit)?;
            if type_name.is_empty() {
                return Err(Error::format(format!("attribute `{name}` has no type name")));
            }

            let size = read_u32(read)? as usize;
            if size > size_limit {
                return Err(Error::format(format!(
                    "attribute `{name}` of {size} bytes exceeds the limit of {size_limit}"
                )));
            }

            let payload = read_bytes(read, size)?;
            let value = AttributeValue::from_payload(&type_name, &payload, name_limit)?;
            trace!(attribute = %name, kind = %type_name, size, "read attribute");

            if store.attributes.insert(name.clone(), value).is_some() {
                return Err(Error::format(format!("duplicate attribute `{name}`")));
            }
        }
    }

    /// Serializes the store, terminator included.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Parses a serialized store. All bytes must be consumed.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut read = bytes;
        let store = Self::read_from(&mut read, LONG_NAME_LIMIT, usize::MAX)?;
        if !read.is_empty() {
            return Err(Error::format(format!(
                "{} bytes after the attribute terminator",
                read.len()
            )));
        }
        Ok(store)
    }
}

impl<'a> IntoIterator for &'a AttributeStore {
    type Item = (&'a String, &'a AttributeValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::enums::{LevelMode, LevelRoundingMode, PixelType};

    fn sample_store() -> AttributeStore {
        let mut s = AttributeStore::new();
        s.set("box", Box2i::new(V2::new(-3, 4), V2::new(10, 20))).unwrap();
        s.set("boxf", Box2f::new(V2::new(0.5, 1.5), V2::new(2.5, 3.5))).unwrap();
        s.set(
            "channels",
            ChannelLayout::uniform(&["A", "B"], PixelType::Half).unwrap(),
        )
        .unwrap();
        s.set("chroma", Chromaticities::default()).unwrap();
        s.set("comp", Compression::Piz).unwrap();
        s.set("double", 1.0e100_f64).unwrap();
        s.set("env", EnvMap::Cube).unwrap();
        s.set("float", 0.25_f32).unwrap();
        s.set("fv", vec![1.0_f32, -2.0, 3.5]).unwrap();
        s.set("int", -7_i32).unwrap();
        s.set("key", KeyCode { prefix: 3, count: 9, ..Default::default() }).unwrap();
        s.set("order", LineOrder::DecreasingY).unwrap();
        s.set("m33", M33f::default()).unwrap();
        s.set("m44", M44f::default()).unwrap();
        s.set("preview", Preview::new(1, 2, (0..8).collect()).unwrap()).unwrap();
        s.set("rate", Rational::new(24000, 1001)).unwrap();
        s.set("text", Text::new("hello").unwrap()).unwrap();
        s.set(
            "texts",
            vec![Text::new("a").unwrap(), Text::new("").unwrap()],
        )
        .unwrap();
        s.set(
            "tiles",
            TileDescription {
                x_size: 32,
                y_size: 64,
                mode: LevelMode::MipmapLevels,
                rounding: LevelRoundingMode::RoundUp,
            },
        )
        .unwrap();
        s.set("tc", TimeCode::new(10, 20, 30, 12).unwrap()).unwrap();
        s.set("v2i", V2::new(1, 2)).unwrap();
        s.set("v2f", V2::new(1.5_f32, 2.5)).unwrap();
        s.set("v3i", V3::new(1, 2, 3)).unwrap();
        s.set("v3f", V3::new(1.5_f32, 2.5, 3.5)).unwrap();
        s
    }

    #[test]
    fn test_every_known_type_roundtrips() {
        let store = sample_store();
        let names: Vec<_> = store.iter().map(|(_, v)| v.type_name().to_string()).collect();
        for known in KNOWN_TYPE_NAMES {
            assert!(names.iter().any(|n| n == known), "{known} not covered");
        }

        let parsed = AttributeStore::parse(&store.serialize().unwrap()).unwrap();
        assert_eq!(parsed, store);
    }

    #[test]
    fn test_wire_layout() {
        let mut s = AttributeStore::new();
        s.set("i", 5_i32).unwrap();
        let bytes = s.serialize().unwrap();
        assert_eq!(bytes, b"i\0int\0\x04\0\0\0\x05\0\0\0\0");
    }

    #[test]
    fn test_opaque_preserved() {
        let mut s = AttributeStore::new();
        s.set_opaque("blob", "myCustomType", vec![0, 1, 0, 255]).unwrap();
        s.set_opaque("empty", "nothing", Vec::new()).unwrap();
        let parsed = AttributeStore::parse(&s.serialize().unwrap()).unwrap();
        assert_eq!(parsed, s);
        match parsed.get("blob").unwrap() {
            AttributeValue::Opaque { type_name, bytes } => {
                assert_eq!(type_name, "myCustomType");
                assert_eq!(bytes, &[0, 1, 0, 255]);
            }
            other => panic!("expected opaque, got {other:?}"),
        }
    }

    #[test]
    fn test_opaque_with_known_type_is_decoded() {
        let mut s = AttributeStore::new();
        s.set_opaque("n", "int", 9_i32.to_le_bytes().to_vec()).unwrap();
        assert_eq!(s.get_as::<i32>("n").unwrap(), 9);
        assert!(s.set_opaque("bad", "int", vec![1, 2, 3]).unwrap_err().is_contract_violation());
    }

    #[test]
    fn test_non_ascii_text() {
        assert!(Text::new("caf\u{e9}").unwrap_err().is_contract_violation());

        let mut s = AttributeStore::new();
        s.set_opaque("note", "string", "caf\u{e9}".as_bytes().to_vec()).unwrap();
        assert!(s.get("note").unwrap().is_opaque());
        let parsed = AttributeStore::parse(&s.serialize().unwrap()).unwrap();
        assert_eq!(parsed, s);
    }

    fn wire_entry(name: &str, type_name: &str, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(name.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(type_name.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    fn string_vector(entries: &[&[u8]]) -> Vec<u8> {
        let mut payload = Vec::new();
        for entry in entries {
            payload.extend_from_slice(&(entry.len() as i32).to_le_bytes());
            payload.extend_from_slice(entry);
        }
        payload
    }

    #[test]
    fn test_non_ascii_string_vector() {
        let payload = string_vector(&[b"left", "caf\u{e9}".as_bytes()]);

        let mut s = AttributeStore::new();
        s.set_opaque("multiView", "stringvector", payload.clone()).unwrap();
        match s.get("multiView").unwrap() {
            AttributeValue::Opaque { type_name, bytes } => {
                assert_eq!(type_name, "stringvector");
                assert_eq!(bytes, &payload);
            }
            other => panic!("expected opaque, got {other:?}"),
        }
        assert!(s.get_as::<Vec<Text>>("multiView").unwrap_err().is_type_error());

        let mut bytes = wire_entry("multiView", "stringvector", &payload);
        bytes.push(0);
        let parsed = AttributeStore::parse(&bytes).unwrap();
        assert_eq!(parsed, s);
        assert_eq!(parsed.serialize().unwrap(), bytes);

        // ASCII entries still decode
        s.set_opaque("views", "stringvector", string_vector(&[b"left", b"right"])).unwrap();
        let views = s.get_as::<Vec<Text>>("views").unwrap();
        assert_eq!(views[1].as_str(), "right");
    }

    #[test]
    fn test_foreign_bytes_reserialize_exactly() {
        let mut chlist = b"Z\0".to_vec();
        chlist.extend_from_slice(&2i32.to_le_bytes());
        chlist.extend_from_slice(&[3, 7, 7, 7]);
        chlist.extend_from_slice(&1i32.to_le_bytes());
        chlist.extend_from_slice(&1i32.to_le_bytes());
        chlist.push(0);

        let mut timecode = 0x0000_000a_u32.to_le_bytes().to_vec();
        timecode.extend_from_slice(&0x1234_5678_u32.to_le_bytes());

        // entries in name order, as the store writes them
        let mut bytes = Vec::new();
        bytes.extend(wire_entry("extra", "chlist", &chlist));
        bytes.extend(wire_entry("nan", "float", &0x7fc0_1234_u32.to_le_bytes()));
        bytes.extend(wire_entry("note", "string", "\u{fc}ber".as_bytes()));
        bytes.extend(wire_entry("tc", "timecode", &timecode));
        bytes.extend(wire_entry("vendor", "vendorBlob", &[0, 0, 9]));
        bytes.extend(wire_entry(
            "views",
            "stringvector",
            &string_vector(&[b"ok", &[0xff, 0x00]]),
        ));
        bytes.push(0);

        let parsed = AttributeStore::parse(&bytes).unwrap();
        assert_eq!(parsed.len(), 6);
        assert_eq!(parsed.serialize().unwrap(), bytes);
    }

    #[test]
    fn test_get_as_type_mismatch() {
        let s = sample_store();
        let err = s.get_as::<f32>("int").unwrap_err();
        match err {
            Error::Type { expected, found } => {
                assert_eq!(expected, "float");
                assert_eq!(found, "int");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(s.get_as::<i32>("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_size_mismatch_is_format_error() {
        let mut bytes = b"i\0int\0".to_vec();
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 0]);
        assert!(AttributeStore::parse(&bytes).unwrap_err().is_format_error());
    }

    #[test]
    fn test_truncated_is_format_error() {
        let bytes = sample_store().serialize().unwrap();
        let err = AttributeStore::parse(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_long_names() {
        let mut s = AttributeStore::new();
        s.set("short", 1_i32).unwrap();
        assert!(!s.has_long_names());

        let mut layout = ChannelLayout::new();
        layout.insert("c".repeat(40), Channel::default()).unwrap();
        s.set("channels", layout).unwrap();
        assert!(s.has_long_names());
        assert!(s.set("", 1_i32).is_err());
    }

    #[test]
    fn test_display() {
        let s = sample_store();
        assert_eq!(s.get("comp").unwrap().to_string(), "PIZ_COMPRESSION");
        assert_eq!(s.get("channels").unwrap().to_string(), "A HALF, B HALF");
        assert_eq!(s.get("text").unwrap().to_string(), "\"hello\"");
    }
}
