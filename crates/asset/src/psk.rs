//! PSK chunk decoding into typed records.
//!
//! Layout per record (little-endian):
//! - `PNTS0000`: 3 × f32, stored on disk as (x, z, y)
//! - `VTXW0000`: u32 point index, f32 u, f32 v, i32 material index
//! - `FACE0000`: 3 × u16 wedge, i8 material, i8 aux material, i32 smoothing
//! - `FACE0032` / `FACE3200`: as above with 3 × u32 wedges
//! - `MATT0000`: 64-byte name, 6 × i32
//!
//! Anything else is skipped by its declared length.

use std::{
    fs::File,
    io::{self, BufReader, Read, Seek},
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt};
use corelib::{CoreError, CoreResult, Diagnostics};

use crate::{
    chunk::{CHUNK_HEADER_LEN, ChunkHeader, ChunkReader},
    keyvalue::trim_line_end,
};

pub const POINT_SIZE: usize = 12;
pub const WEDGE_SIZE: usize = 16;
pub const MATERIAL_SIZE: usize = 88;
pub const MATERIAL_NAME_LEN: usize = 64;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point {
    #[inline]
    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Wedge {
    pub point_index: u32,
    pub u: f32,
    pub v: f32,
    pub material_index: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Face {
    /// Wedge references, widened to 32 bits regardless of on-disk layout.
    pub wedges: [i32; 3],
    pub material_index: i8,
    pub aux_material_index: i8,
    pub smoothing_groups: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaterialRecord {
    pub name: String,
    pub texture_index: i32,
    pub poly_flags: i32,
    pub aux_material: i32,
    pub aux_flags: i32,
    pub lod_bias: i32,
    pub lod_style: i32,
}

/// Records decoded from one PSK file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub points: Vec<Point>,
    pub wedges: Vec<Wedge>,
    pub faces: Vec<Face>,
    pub materials: Vec<MaterialRecord>,
}

/// On-disk face record variant, chosen once per chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceLayout {
    /// 16-bit wedge references.
    Legacy,
    /// 32-bit wedge references.
    Extended,
}

impl FaceLayout {
    pub const fn record_size(self) -> usize {
        match self {
            FaceLayout::Legacy => 12,
            FaceLayout::Extended => 18,
        }
    }

    fn read_face<R: Read>(self, r: &mut R) -> io::Result<Face> {
        let mut wedges = [0i32; 3];
        for w in &mut wedges {
            *w = match self {
                FaceLayout::Legacy => i32::from(r.read_u16::<LittleEndian>()?),
                FaceLayout::Extended => r.read_i32::<LittleEndian>()?,
            };
        }
        Ok(Face {
            wedges,
            material_index: r.read_i8()?,
            aux_material_index: r.read_i8()?,
            smoothing_groups: r.read_i32::<LittleEndian>()?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkKind {
    Points,
    Wedges,
    Faces(FaceLayout),
    Materials,
    Unknown,
}

impl ChunkKind {
    pub fn from_id(id: &[u8]) -> Self {
        match id {
            b"PNTS0000" => ChunkKind::Points,
            b"VTXW0000" => ChunkKind::Wedges,
            b"FACE0000" => ChunkKind::Faces(FaceLayout::Legacy),
            b"FACE0032" | b"FACE3200" => ChunkKind::Faces(FaceLayout::Extended),
            b"MATT0000" => ChunkKind::Materials,
            _ => ChunkKind::Unknown,
        }
    }

    /// Bytes this decoder consumes per record, `None` for skipped chunks.
    pub const fn record_size(self) -> Option<usize> {
        match self {
            ChunkKind::Points => Some(POINT_SIZE),
            ChunkKind::Wedges => Some(WEDGE_SIZE),
            ChunkKind::Faces(layout) => Some(layout.record_size()),
            ChunkKind::Materials => Some(MATERIAL_SIZE),
            ChunkKind::Unknown => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Abort on the first format irregularity instead of collecting it.
    pub strict: bool,
}

/// Open `path` and decode every chunk. Only an unreadable file is fatal
/// unless `options.strict` is set.
pub fn load_psk(
    path: impl AsRef<Path>,
    options: DecodeOptions,
    diag: &mut Diagnostics,
) -> CoreResult<MeshData> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| CoreError::io(path, e))?;
    let len = file.metadata().map_err(|e| CoreError::io(path, e))?.len();
    log::info!("Loading PSK {:?} ({} KB)", path, len / 1000);

    let mut reader = ChunkReader::new(BufReader::new(file), len);
    decode_psk(&mut reader, options, diag)
}

/// Decode chunks until the cursor reaches the end of the stream.
pub fn decode_psk<R: Read + Seek>(
    reader: &mut ChunkReader<R>,
    options: DecodeOptions,
    diag: &mut Diagnostics,
) -> CoreResult<MeshData> {
    let mut sink = WarningSink {
        strict: options.strict,
        diag,
    };
    let mut data = MeshData::default();

    while !reader.is_at_end() {
        let at = reader.position();
        if reader.remaining() < CHUNK_HEADER_LEN {
            sink.warn(format!(
                "{} trailing bytes at offset {at} are too short for a chunk header",
                reader.remaining()
            ))?;
            break;
        }
        let header = match reader.read_header() {
            Ok(header) => header,
            Err(e) => {
                sink.warn(format!("chunk header at offset {at}: {e}"))?;
                break;
            }
        };
        log::debug!(
            "Chunk {} | type flag {} | record size {} | record count {}",
            header.id_str(),
            header.type_flag,
            header.record_size,
            header.record_count
        );

        let Some(declared) = header.payload_len() else {
            sink.warn(format!(
                "chunk {} declares negative size {}x{}",
                header.id_str(),
                header.record_size,
                header.record_count
            ))?;
            break;
        };

        let kind = ChunkKind::from_id(header.id());
        if kind == ChunkKind::Unknown {
            if let Err(e) = reader.skip(declared) {
                sink.warn(format!("skipping chunk {}: {e}", header.id_str()))?;
                break;
            }
            continue;
        }

        let start = reader.position();
        let outcome = decode_chunk(reader, kind, &header, &mut data);
        let consumed = reader.position() - start;

        if let Err(e) = outcome {
            sink.warn(format!(
                "chunk {} truncated after {consumed} of {declared} bytes: {e}",
                header.id_str()
            ))?;
            break;
        }
        if consumed != declared {
            sink.warn(format!(
                "chunk {} consumed {consumed} bytes, header declares {declared}",
                header.id_str()
            ))?;
        }
    }

    Ok(data)
}

/// Decode one known chunk into `data`, keeping whatever was read before a failure.
fn decode_chunk<R: Read + Seek>(
    reader: &mut ChunkReader<R>,
    kind: ChunkKind,
    header: &ChunkHeader,
    data: &mut MeshData,
) -> io::Result<()> {
    let count = usize::try_from(header.record_count).unwrap_or(0);
    let record_size = kind.record_size().unwrap_or(1);
    // Bound the allocation by what the stream can actually hold.
    let capacity = count.min(reader.remaining() as usize / record_size);

    match kind {
        ChunkKind::Points => read_records(reader, count, capacity, &mut data.points, read_point),
        ChunkKind::Wedges => read_records(reader, count, capacity, &mut data.wedges, read_wedge),
        ChunkKind::Faces(layout) => {
            if layout == FaceLayout::Extended {
                log::debug!("Extended face layout ({})", header.id_str());
            }
            read_records(reader, count, capacity, &mut data.faces, |r| {
                layout.read_face(r)
            })
        }
        ChunkKind::Materials => {
            read_records(reader, count, capacity, &mut data.materials, read_material)
        }
        ChunkKind::Unknown => Ok(()),
    }
}

/// Replace `out` with up to `count` records. On error `out` keeps the records read so far.
fn read_records<R, T>(
    reader: &mut R,
    count: usize,
    capacity: usize,
    out: &mut Vec<T>,
    mut read_one: impl FnMut(&mut R) -> io::Result<T>,
) -> io::Result<()> {
    *out = Vec::with_capacity(capacity);
    for _ in 0..count {
        out.push(read_one(reader)?);
    }
    Ok(())
}

fn read_point<R: Read>(r: &mut R) -> io::Result<Point> {
    // Second field on disk is z, third is y.
    let x = r.read_f32::<LittleEndian>()?;
    let z = r.read_f32::<LittleEndian>()?;
    let y = r.read_f32::<LittleEndian>()?;
    Ok(Point { x, y, z })
}

fn read_wedge<R: Read>(r: &mut R) -> io::Result<Wedge> {
    Ok(Wedge {
        point_index: r.read_u32::<LittleEndian>()?,
        u: r.read_f32::<LittleEndian>()?,
        v: r.read_f32::<LittleEndian>()?,
        material_index: r.read_i32::<LittleEndian>()?,
    })
}

fn read_material<R: Read>(r: &mut R) -> io::Result<MaterialRecord> {
    let mut name = [0u8; MATERIAL_NAME_LEN];
    r.read_exact(&mut name)?;
    let material = MaterialRecord {
        name: String::from_utf8_lossy(trim_line_end(&name)).into_owned(),
        texture_index: r.read_i32::<LittleEndian>()?,
        poly_flags: r.read_i32::<LittleEndian>()?,
        aux_material: r.read_i32::<LittleEndian>()?,
        aux_flags: r.read_i32::<LittleEndian>()?,
        lod_bias: r.read_i32::<LittleEndian>()?,
        lod_style: r.read_i32::<LittleEndian>()?,
    };
    log::debug!(
        "Material {} | texture {} | poly flags {} | aux {} / {} | lod {} / {}",
        material.name,
        material.texture_index,
        material.poly_flags,
        material.aux_material,
        material.aux_flags,
        material.lod_bias,
        material.lod_style
    );
    Ok(material)
}

struct WarningSink<'a> {
    strict: bool,
    diag: &'a mut Diagnostics,
}

impl WarningSink<'_> {
    fn warn(&mut self, message: String) -> CoreResult<()> {
        let err = CoreError::Format(message);
        if self.strict {
            return Err(err);
        }
        self.diag.push(err);
        Ok(())
    }
}
