//! LAS "extra bytes" dimensions.
//!
//! Per-point attributes that do not fit the fixed LAS point formats (the
//! semantic label, height above the terrain model) travel as extra bytes
//! appended to every point record. Their layout is declared by a VLR with
//! user id `LASF_Spec` and record id 4 holding one 192-byte descriptor per
//! dimension.

use byteorder::{ByteOrder as _, LittleEndian};

pub const EXTRA_BYTES_USER_ID: &str = "LASF_Spec";
pub const EXTRA_BYTES_RECORD_ID: u16 = 4;
pub const DESCRIPTOR_LEN: usize = 192;

const NAME_OFFSET: usize = 4;
const NAME_LEN: usize = 32;
const DESCRIPTION_OFFSET: usize = 160;
const DESCRIPTION_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraBytesType {
    /// Opaque bytes; the width is carried in the descriptor's `options` byte.
    Undocumented(u8),
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ExtraBytesType {
    pub fn from_code(code: u8, options: u8) -> Option<Self> {
        Some(match code {
            0 => ExtraBytesType::Undocumented(options),
            1 => ExtraBytesType::U8,
            2 => ExtraBytesType::I8,
            3 => ExtraBytesType::U16,
            4 => ExtraBytesType::I16,
            5 => ExtraBytesType::U32,
            6 => ExtraBytesType::I32,
            7 => ExtraBytesType::U64,
            8 => ExtraBytesType::I64,
            9 => ExtraBytesType::F32,
            10 => ExtraBytesType::F64,
            // deprecated 2- and 3-element arrays are carried as opaque bytes
            11..=30 => {
                let element = ExtraBytesType::from_code((code - 1) % 10 + 1, 0)?;
                let count = (code - 1) / 10 + 1;
                ExtraBytesType::Undocumented(element.size() as u8 * count)
            }
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        match self {
            ExtraBytesType::Undocumented(_) => 0,
            ExtraBytesType::U8 => 1,
            ExtraBytesType::I8 => 2,
            ExtraBytesType::U16 => 3,
            ExtraBytesType::I16 => 4,
            ExtraBytesType::U32 => 5,
            ExtraBytesType::I32 => 6,
            ExtraBytesType::U64 => 7,
            ExtraBytesType::I64 => 8,
            ExtraBytesType::F32 => 9,
            ExtraBytesType::F64 => 10,
        }
    }

    pub fn size(self) -> usize {
        match self {
            ExtraBytesType::Undocumented(width) => width as usize,
            ExtraBytesType::U8 | ExtraBytesType::I8 => 1,
            ExtraBytesType::U16 | ExtraBytesType::I16 => 2,
            ExtraBytesType::U32 | ExtraBytesType::I32 | ExtraBytesType::F32 => 4,
            ExtraBytesType::U64 | ExtraBytesType::I64 | ExtraBytesType::F64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtraBytesDescriptor {
    pub data_type: ExtraBytesType,
    pub name: String,
    pub description: String,
}

impl ExtraBytesDescriptor {
    pub fn new(name: &str, data_type: ExtraBytesType) -> Self {
        Self {
            data_type,
            name: name.to_string(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn to_bytes(&self) -> [u8; DESCRIPTOR_LEN] {
        let mut bytes = [0u8; DESCRIPTOR_LEN];
        bytes[2] = self.data_type.code();
        if let ExtraBytesType::Undocumented(width) = self.data_type {
            bytes[3] = width;
        }
        write_padded(&mut bytes[NAME_OFFSET..NAME_OFFSET + NAME_LEN], &self.name);
        write_padded(
            &mut bytes[DESCRIPTION_OFFSET..DESCRIPTION_OFFSET + DESCRIPTION_LEN],
            &self.description,
        );
        bytes
    }

    /// Parses every complete descriptor in a VLR payload, skipping unknown type codes.
    pub fn parse_all(data: &[u8]) -> Vec<ExtraBytesDescriptor> {
        data.chunks_exact(DESCRIPTOR_LEN)
            .filter_map(|chunk| {
                let data_type = ExtraBytesType::from_code(chunk[2], chunk[3])?;
                Some(ExtraBytesDescriptor {
                    data_type,
                    name: read_padded(&chunk[NAME_OFFSET..NAME_OFFSET + NAME_LEN]),
                    description: read_padded(
                        &chunk[DESCRIPTION_OFFSET..DESCRIPTION_OFFSET + DESCRIPTION_LEN],
                    ),
                })
            })
            .collect()
    }
}

/// Byte offsets of each dimension within a point's extra bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraBytesLayout {
    entries: Vec<(ExtraBytesDescriptor, usize)>,
    record_len: usize,
}

impl ExtraBytesLayout {
    pub fn new(descriptors: Vec<ExtraBytesDescriptor>) -> Self {
        let mut offset = 0;
        let mut entries = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let size = descriptor.data_type.size();
            entries.push((descriptor, offset));
            offset += size;
        }
        Self {
            entries,
            record_len: offset,
        }
    }

    pub fn record_len(&self) -> usize {
        self.record_len
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ExtraBytesDescriptor> {
        self.entries.iter().map(|(descriptor, _)| descriptor)
    }

    /// Serialized VLR payload describing this layout.
    pub fn vlr_data(&self) -> Vec<u8> {
        self.descriptors()
            .flat_map(|descriptor| descriptor.to_bytes())
            .collect()
    }

    /// Case-insensitive lookup by dimension name.
    pub fn find(&self, name: &str) -> Option<ExtraBytesField> {
        self.entries
            .iter()
            .find(|(descriptor, _)| descriptor.name.eq_ignore_ascii_case(name))
            .map(|(descriptor, offset)| ExtraBytesField {
                data_type: descriptor.data_type,
                offset: *offset,
            })
    }
}

/// A located dimension that can be read from or written to a point's extra bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtraBytesField {
    pub data_type: ExtraBytesType,
    pub offset: usize,
}

impl ExtraBytesField {
    pub fn read(&self, extra_bytes: &[u8]) -> Option<f64> {
        let end = self.offset + self.data_type.size();
        let bytes = extra_bytes.get(self.offset..end)?;
        Some(match self.data_type {
            ExtraBytesType::Undocumented(_) => return None,
            ExtraBytesType::U8 => bytes[0] as f64,
            ExtraBytesType::I8 => bytes[0] as i8 as f64,
            ExtraBytesType::U16 => LittleEndian::read_u16(bytes) as f64,
            ExtraBytesType::I16 => LittleEndian::read_i16(bytes) as f64,
            ExtraBytesType::U32 => LittleEndian::read_u32(bytes) as f64,
            ExtraBytesType::I32 => LittleEndian::read_i32(bytes) as f64,
            ExtraBytesType::U64 => LittleEndian::read_u64(bytes) as f64,
            ExtraBytesType::I64 => LittleEndian::read_i64(bytes) as f64,
            ExtraBytesType::F32 => LittleEndian::read_f32(bytes) as f64,
            ExtraBytesType::F64 => LittleEndian::read_f64(bytes),
        })
    }

    /// Writes `value` converted to the field's type. Returns false if the
    /// buffer is too short or the field is opaque.
    pub fn write(&self, extra_bytes: &mut [u8], value: f64) -> bool {
        let end = self.offset + self.data_type.size();
        let Some(bytes) = extra_bytes.get_mut(self.offset..end) else {
            return false;
        };
        match self.data_type {
            ExtraBytesType::Undocumented(_) => return false,
            ExtraBytesType::U8 => bytes[0] = value as u8,
            ExtraBytesType::I8 => bytes[0] = value as i8 as u8,
            ExtraBytesType::U16 => LittleEndian::write_u16(bytes, value as u16),
            ExtraBytesType::I16 => LittleEndian::write_i16(bytes, value as i16),
            ExtraBytesType::U32 => LittleEndian::write_u32(bytes, value as u32),
            ExtraBytesType::I32 => LittleEndian::write_i32(bytes, value as i32),
            ExtraBytesType::U64 => LittleEndian::write_u64(bytes, value as u64),
            ExtraBytesType::I64 => LittleEndian::write_i64(bytes, value as i64),
            ExtraBytesType::F32 => LittleEndian::write_f32(bytes, value as f32),
            ExtraBytesType::F64 => LittleEndian::write_f64(bytes, value),
        }
        true
    }
}

fn write_padded(target: &mut [u8], text: &str) {
    let bytes = text.as_bytes();
    let len = bytes.len().min(target.len());
    target[..len].copy_from_slice(&bytes[..len]);
}

fn read_padded(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}
