//! Little endian byte builder for hand assembled test inputs

use std::io::Cursor;

#[derive(Debug, Default)]
pub(crate) struct Bytes {
    pub data: Vec<u8>,
}

impl Bytes {
    pub fn pos(&self) -> usize {
        self.data.len()
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.data.push(value);
        self
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn i16(&mut self, value: i16) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn f32(&mut self, value: f32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.data.extend_from_slice(value);
        self
    }

    pub fn cstring(&mut self, value: &str) -> &mut Self {
        self.bytes(value.as_bytes()).u8(0)
    }

    pub fn zeros(&mut self, count: usize) -> &mut Self {
        self.data.resize(self.data.len() + count, 0);
        self
    }

    /// Write a zeroed u32 offset field and return its position for [`Bytes::point`]
    pub fn offset(&mut self) -> usize {
        let at = self.pos();
        self.u32(0);
        at
    }

    /// Patch the offset field at `at` so it points to the current position
    pub fn point(&mut self, at: usize) -> &mut Self {
        let relative = (self.pos() - at) as u32;
        self.patch_u32(at, relative);
        self
    }

    pub fn patch_u32(&mut self, at: usize, value: u32) -> &mut Self {
        self.data[at..at + 4].copy_from_slice(&value.to_le_bytes());
        self
    }

    pub fn cursor(&self) -> Cursor<Vec<u8>> {
        Cursor::new(self.data.clone())
    }
}

/// Assemble a resource file from `(tag, block)` pairs, blocks following the directory in order
pub(crate) fn resource_file(version: u16, blocks: &[(&[u8; 4], &Bytes)]) -> Bytes {
    let mut b = Bytes::default();
    b.u32(0).u16(12).u16(version).u32(8).u32(blocks.len() as u32);

    let mut entries = Vec::new();
    for (tag, block) in blocks {
        b.bytes(&tag[..]);
        entries.push(b.offset());
        b.u32(block.data.len() as u32);
    }
    for ((_, block), entry) in blocks.iter().zip(entries) {
        b.point(entry).bytes(&block.data);
    }

    let size = b.pos() as u32;
    b.patch_u32(0, size);
    b
}

/// REDI block whose only entry is a single special dependency
pub(crate) fn edit_info(compiler_identifier: &str, string: &str) -> Bytes {
    let mut b = Bytes::default();
    let mut headers = Vec::new();
    for _ in 0..10 {
        headers.push(b.offset());
        b.u32(0);
    }
    b.patch_u32(headers[3] + 4, 1);

    b.point(headers[3]);
    let string_offset = b.offset();
    let identifier_offset = b.offset();
    b.u32(0).u32(0);

    b.point(string_offset).cstring(string);
    b.point(identifier_offset).cstring(compiler_identifier);
    b
}

/// NTRO block listing field-less structs with ids 1, 2, ...
pub(crate) fn manifest(struct_names: &[&str]) -> Bytes {
    let mut b = Bytes::default();
    b.u32(4);
    let structs = b.offset();
    b.u32(struct_names.len() as u32);
    b.u32(0).u32(0);

    b.point(structs);
    let mut names = Vec::new();
    for id in 0..struct_names.len() {
        b.u32(4).u32(id as u32 + 1);
        names.push(b.offset());
        b.u32(0).i32(0).u16(0).u16(4).u32(0);
        b.u32(0).u32(0);
        b.u8(0).zeros(3);
    }
    for (name, offset) in struct_names.iter().zip(names) {
        b.point(offset).cstring(name);
    }
    b
}
