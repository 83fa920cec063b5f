//! Byte-level PDF serialization with offset bookkeeping

use crate::encoding::{escape_literal, escape_name};
use crate::error::Result;
use crate::objects::{format_real, Dictionary, Object, ObjectId};
use std::io::Write;

/// Binary marker comment placed after the header line
const BINARY_MARKER: &[u8] = &[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n'];

/// Writes indirect objects to `W` and remembers where each one starts.
pub(crate) struct PdfSink<W: Write> {
    writer: W,
    current_position: u64,
    /// Byte offset per object number; index 0 is the free list head
    offsets: Vec<Option<u64>>,
}

impl<W: Write> PdfSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            current_position: 0,
            offsets: Vec::new(),
        }
    }

    pub fn position(&self) -> u64 {
        self.current_position
    }

    /// Size the offset table for object numbers `1..=max_object`
    pub fn reserve(&mut self, max_object: u32) {
        self.offsets = vec![None; max_object as usize + 1];
    }

    pub fn max_object(&self) -> u32 {
        self.offsets.len().saturating_sub(1) as u32
    }

    pub fn offset_of(&self, id: ObjectId) -> Option<u64> {
        self.offsets.get(id.number() as usize).copied().flatten()
    }

    /// Drop the recorded offset of an object that was not completely written
    pub fn forget(&mut self, id: ObjectId) {
        if let Some(slot) = self.offsets.get_mut(id.number() as usize) {
            *slot = None;
        }
    }

    pub fn write_header(&mut self, version: &str) -> Result<()> {
        self.write_bytes(format!("%PDF-{version}\n").as_bytes())?;
        self.write_bytes(BINARY_MARKER)
    }

    fn begin_object(&mut self, id: ObjectId) -> Result<()> {
        let slot = id.number() as usize;
        if slot >= self.offsets.len() {
            self.offsets.resize(slot + 1, None);
        }
        self.offsets[slot] = Some(self.current_position);
        self.write_bytes(format!("{} {} obj\n", id.number(), id.generation()).as_bytes())
    }

    pub fn write_object(&mut self, id: ObjectId, object: &Object) -> Result<()> {
        self.begin_object(id)?;
        self.write_object_value(object)?;
        self.write_bytes(b"\nendobj\n")
    }

    /// Write a stream object; `/Length` is appended to `dict`
    pub fn write_stream(&mut self, id: ObjectId, dict: Dictionary, data: &[u8]) -> Result<()> {
        let mut dict = dict;
        dict.set("Length", data.len());

        self.begin_object(id)?;
        self.write_object_value(&Object::Dictionary(dict))?;
        self.write_bytes(b"\nstream\n")?;
        self.write_bytes(data)?;
        self.write_bytes(b"\nendstream\nendobj\n")
    }

    pub fn write_object_value(&mut self, object: &Object) -> Result<()> {
        match object {
            Object::Null => self.write_bytes(b"null")?,
            Object::Boolean(b) => self.write_bytes(if *b { b"true" } else { b"false" })?,
            Object::Integer(i) => self.write_bytes(i.to_string().as_bytes())?,
            Object::Real(f) => self.write_bytes(format_real(*f).as_bytes())?,
            Object::String(s) => {
                self.write_bytes(b"(")?;
                self.write_bytes(&escape_literal(s))?;
                self.write_bytes(b")")?;
            }
            Object::HexString(s) => {
                self.write_bytes(b"<")?;
                self.write_bytes(hex::encode_upper(s).as_bytes())?;
                self.write_bytes(b">")?;
            }
            Object::Name(n) => {
                self.write_bytes(b"/")?;
                self.write_bytes(escape_name(n).as_bytes())?;
            }
            Object::Array(arr) => {
                self.write_bytes(b"[")?;
                for (i, obj) in arr.iter().enumerate() {
                    if i > 0 {
                        self.write_bytes(b" ")?;
                    }
                    self.write_object_value(obj)?;
                }
                self.write_bytes(b"]")?;
            }
            Object::Dictionary(dict) => {
                self.write_bytes(b"<<")?;
                for (key, value) in dict.entries() {
                    self.write_bytes(b" /")?;
                    self.write_bytes(escape_name(key).as_bytes())?;
                    self.write_bytes(b" ")?;
                    self.write_object_value(value)?;
                }
                self.write_bytes(b" >>")?;
            }
            Object::Reference(id) => {
                self.write_bytes(id.to_string().as_bytes())?;
            }
        }
        Ok(())
    }

    /// Write a classic cross-reference table covering every reserved number.
    ///
    /// Returns the offset of the `xref` keyword.
    pub fn write_xref(&mut self) -> Result<u64> {
        let xref_position = self.current_position;
        let max_obj_num = self.max_object();

        self.write_bytes(b"xref\n")?;
        self.write_bytes(format!("0 {}\n", max_obj_num + 1).as_bytes())?;
        self.write_bytes(b"0000000000 65535 f \n")?;

        for obj_num in 1..=max_obj_num as usize {
            match self.offsets[obj_num] {
                Some(position) => {
                    let entry = format!("{position:010} 00000 n \n");
                    self.write_bytes(entry.as_bytes())?;
                }
                None => self.write_bytes(b"0000000000 00000 f \n")?,
            }
        }

        Ok(xref_position)
    }

    pub fn write_trailer(
        &mut self,
        root: ObjectId,
        info: ObjectId,
        xref_position: u64,
    ) -> Result<()> {
        let mut trailer = Dictionary::new();
        trailer.set("Size", self.max_object() + 1);
        trailer.set("Root", root);
        trailer.set("Info", info);

        self.write_bytes(b"trailer\n")?;
        self.write_object_value(&Object::Dictionary(trailer))?;
        self.write_bytes(b"\nstartxref\n")?;
        self.write_bytes(xref_position.to_string().as_bytes())?;
        self.write_bytes(b"\n%%EOF\n")
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.current_position += data.len() as u64;
        Ok(())
    }
}
