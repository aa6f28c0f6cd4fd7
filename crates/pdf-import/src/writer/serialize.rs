//! Object body serialization
//!
//! lopdf writes whole files; the host needs individual object bodies whose
//! references point into its own numbering, so bodies are written here.
//! In hash mode each reference is written as a 40 character placeholder and
//! its byte offset recorded.

use crate::types::ObjectId;
use lopdf::{Dictionary, Object, StringFormat};
use std::collections::BTreeMap;

/// Serialized object body plus the placeholder positions it contains
pub(crate) struct SerializedObject {
    pub bytes: Vec<u8>,
    pub hash_positions: BTreeMap<usize, ObjectId>,
}

pub(crate) fn serialize_object<F>(obj: &Object, resolve: F) -> SerializedObject
where
    F: Fn(lopdf::ObjectId) -> Option<ObjectId>,
{
    let mut writer = BodyWriter {
        out: Vec::new(),
        hash_positions: BTreeMap::new(),
        resolve,
    };

    match obj {
        Object::Stream(stream) => writer.write_stream(&stream.dict, &stream.content),
        other => writer.write_object(other),
    }

    SerializedObject {
        bytes: writer.out,
        hash_positions: writer.hash_positions,
    }
}

struct BodyWriter<F> {
    out: Vec<u8>,
    hash_positions: BTreeMap<usize, ObjectId>,
    resolve: F,
}

impl<F> BodyWriter<F>
where
    F: Fn(lopdf::ObjectId) -> Option<ObjectId>,
{
    fn write_object(&mut self, obj: &Object) {
        match obj {
            Object::Null => self.out.extend_from_slice(b"null"),
            Object::Boolean(value) => {
                self.out
                    .extend_from_slice(if *value { b"true" } else { b"false" })
            }
            Object::Integer(value) => self.write_str(&value.to_string()),
            Object::Real(value) => self.write_str(&format_real(*value)),
            Object::Name(name) => write_name(&mut self.out, name),
            Object::String(text, StringFormat::Literal) => write_literal(&mut self.out, text),
            Object::String(text, StringFormat::Hexadecimal) => {
                self.out.push(b'<');
                self.write_str(&hex::encode_upper(text));
                self.out.push(b'>');
            }
            Object::Array(items) => {
                self.out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push(b' ');
                    }
                    self.write_object(item);
                }
                self.out.push(b']');
            }
            Object::Dictionary(dict) => self.write_dictionary(dict, None),
            // Streams are only valid as top-level objects
            Object::Stream(_) => self.out.extend_from_slice(b"null"),
            Object::Reference(id) => self.write_reference(*id),
        }
    }

    fn write_dictionary(&mut self, dict: &Dictionary, length: Option<usize>) {
        self.out.extend_from_slice(b"<<");
        let mut first = true;
        for (key, value) in dict.iter() {
            if length.is_some() && key.as_slice() == b"Length" {
                continue;
            }
            if !first {
                self.out.push(b' ');
            }
            first = false;
            write_name(&mut self.out, key);
            self.out.push(b' ');
            self.write_object(value);
        }
        if let Some(length) = length {
            if !first {
                self.out.push(b' ');
            }
            self.write_str(&format!("/Length {}", length));
        }
        self.out.extend_from_slice(b">>");
    }

    fn write_stream(&mut self, dict: &Dictionary, content: &[u8]) {
        self.write_dictionary(dict, Some(content.len()));
        self.out.extend_from_slice(b"\nstream\n");
        self.out.extend_from_slice(content);
        self.out.extend_from_slice(b"\nendstream");
    }

    fn write_reference(&mut self, source: lopdf::ObjectId) {
        match (self.resolve)(source) {
            Some(ObjectId::Sequential(number)) => self.write_str(&format!("{} 0 R", number)),
            Some(target @ ObjectId::ContentHash(hash)) => {
                self.hash_positions.insert(self.out.len(), target);
                self.write_str(&hash.to_hex());
                self.out.extend_from_slice(b" 0 R");
            }
            None => self.out.extend_from_slice(b"null"),
        }
    }

    fn write_str(&mut self, s: &str) {
        self.out.extend_from_slice(s.as_bytes());
    }
}

/// Format a real without exponent and without trailing zeros
pub(crate) fn format_real(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1.0e9 {
        return format!("{}", value as i64);
    }

    let formatted = format!("{:.5}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

fn write_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &b in name {
        if b < 0x21 || b > 0x7e || b"()<>[]{}/%#".contains(&b) {
            out.extend_from_slice(format!("#{:02X}", b).as_bytes());
        } else {
            out.push(b);
        }
    }
}

fn write_literal(out: &mut Vec<u8>, text: &[u8]) {
    out.push(b'(');
    for &b in text {
        match b {
            b'\\' | b'(' | b')' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(b),
        }
    }
    out.push(b')');
}
