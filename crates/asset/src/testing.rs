//! In-memory fixture builders for PSK streams and TGA images.

use crate::{
    chunk::CHUNK_TAG_LEN,
    psk::{MATERIAL_NAME_LEN, MATERIAL_SIZE, POINT_SIZE, WEDGE_SIZE},
};

/// Appends chunks in call order. Record sizes in the headers match the
/// layouts the decoder expects unless [`PskBuilder::raw_chunk`] is used.
#[derive(Clone, Debug, Default)]
pub struct PskBuilder {
    bytes: Vec<u8>,
}

impl PskBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// One triangle using material 0 named `MI_Test`.
    pub fn triangle() -> Self {
        Self::new()
            .raw_chunk(b"ACTRHEAD", 1999801, 0, 0, &[])
            .points(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]])
            .wedges(&[(0, 0.0, 0.0, 0), (1, 1.0, 0.0, 0), (2, 0.0, 1.0, 0)])
            .faces_legacy(&[([0, 1, 2], 0, 0, 1)])
            .materials(&["MI_Test"])
    }

    /// Arbitrary chunk with an explicit header and payload.
    pub fn raw_chunk(
        mut self,
        id: &[u8],
        type_flag: i32,
        record_size: i32,
        record_count: i32,
        payload: &[u8],
    ) -> Self {
        let mut tag = [0u8; CHUNK_TAG_LEN];
        let n = id.len().min(CHUNK_TAG_LEN);
        tag[..n].copy_from_slice(&id[..n]);
        self.bytes.extend_from_slice(&tag);
        self.bytes.extend_from_slice(&type_flag.to_le_bytes());
        self.bytes.extend_from_slice(&record_size.to_le_bytes());
        self.bytes.extend_from_slice(&record_count.to_le_bytes());
        self.bytes.extend_from_slice(payload);
        self
    }

    /// Points given in file order (f0, f1, f2).
    pub fn points(self, points: &[[f32; 3]]) -> Self {
        let mut payload = Vec::with_capacity(points.len() * POINT_SIZE);
        for p in points {
            for f in p {
                payload.extend_from_slice(&f.to_le_bytes());
            }
        }
        self.records(b"PNTS0000", POINT_SIZE, points.len(), &payload)
    }

    /// `(point_index, u, v, material_index)`.
    pub fn wedges(self, wedges: &[(u32, f32, f32, i32)]) -> Self {
        let mut payload = Vec::with_capacity(wedges.len() * WEDGE_SIZE);
        for &(point, u, v, mat) in wedges {
            payload.extend_from_slice(&point.to_le_bytes());
            payload.extend_from_slice(&u.to_le_bytes());
            payload.extend_from_slice(&v.to_le_bytes());
            payload.extend_from_slice(&mat.to_le_bytes());
        }
        self.records(b"VTXW0000", WEDGE_SIZE, wedges.len(), &payload)
    }

    /// `FACE0000` records: `(wedges, material, aux material, smoothing groups)`.
    pub fn faces_legacy(self, faces: &[([u16; 3], i8, i8, i32)]) -> Self {
        let mut payload = Vec::with_capacity(faces.len() * 12);
        for &(wedges, mat, aux, smoothing) in faces {
            for w in wedges {
                payload.extend_from_slice(&w.to_le_bytes());
            }
            payload.extend_from_slice(&mat.to_le_bytes());
            payload.extend_from_slice(&aux.to_le_bytes());
            payload.extend_from_slice(&smoothing.to_le_bytes());
        }
        self.records(b"FACE0000", 12, faces.len(), &payload)
    }

    /// 32-bit face records under `id` (`FACE0032` or `FACE3200`).
    pub fn faces_extended(self, id: &[u8], faces: &[([u32; 3], i8, i8, i32)]) -> Self {
        let mut payload = Vec::with_capacity(faces.len() * 18);
        for &(wedges, mat, aux, smoothing) in faces {
            for w in wedges {
                payload.extend_from_slice(&w.to_le_bytes());
            }
            payload.extend_from_slice(&mat.to_le_bytes());
            payload.extend_from_slice(&aux.to_le_bytes());
            payload.extend_from_slice(&smoothing.to_le_bytes());
        }
        self.records(id, 18, faces.len(), &payload)
    }

    /// Material records; `texture_index` is the record's position, other ints are zero.
    pub fn materials(self, names: &[&str]) -> Self {
        let mut payload = Vec::with_capacity(names.len() * MATERIAL_SIZE);
        for (i, name) in names.iter().enumerate() {
            let mut field = [0u8; MATERIAL_NAME_LEN];
            let n = name.len().min(MATERIAL_NAME_LEN);
            field[..n].copy_from_slice(&name.as_bytes()[..n]);
            payload.extend_from_slice(&field);
            payload.extend_from_slice(&(i as i32).to_le_bytes());
            payload.extend_from_slice(&[0u8; 20]);
        }
        self.records(b"MATT0000", MATERIAL_SIZE, names.len(), &payload)
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }

    fn records(self, id: &[u8], size: usize, count: usize, payload: &[u8]) -> Self {
        self.raw_chunk(id, 0, size as i32, count as i32, payload)
    }
}

/// Uncompressed top-left-origin TGA filled with one colour.
///
/// `pixel` holds 1 (grey), 3 (RGB) or 4 (RGBA) channels.
pub fn tga_solid(width: u16, height: u16, pixel: &[u8]) -> Vec<u8> {
    let (image_type, descriptor) = match pixel.len() {
        1 => (3u8, 0x20u8),
        3 => (2, 0x20),
        4 => (2, 0x28),
        n => panic!("unsupported channel count {n} for fixture"),
    };
    let mut out = vec![0u8; 18];
    out[2] = image_type;
    out[12..14].copy_from_slice(&width.to_le_bytes());
    out[14..16].copy_from_slice(&height.to_le_bytes());
    out[16] = (pixel.len() * 8) as u8;
    out[17] = descriptor;

    // TGA stores colour channels as BGR(A).
    let stored: Vec<u8> = match pixel {
        [r, g, b] => vec![*b, *g, *r],
        [r, g, b, a] => vec![*b, *g, *r, *a],
        other => other.to_vec(),
    };
    for _ in 0..(width as usize * height as usize) {
        out.extend_from_slice(&stored);
    }
    out
}
