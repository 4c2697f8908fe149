//! RITE container loader.
//!
//! Parses the compiled bytecode container into an [`Irep`] tree, and
//! re-serializes a tree back into a container (`dump`) so round-trips can be
//! checked without the external compiler.
//!
//! Container layout (all multi-byte integers big-endian):
//!
//! ```text
//! header:   "RITE" version[4] crc:u16 size:u32 "MATZ" "0000"     (22 bytes)
//! section:  kind[4] length:u32  payload...      repeated until "END "
//! IREP:     version[4], then one recursive record:
//!           nlocals:u16 nregs:u16 rlen:u16 ilen:u32 [pad] code[ilen*4]
//!           plen:u32 plen*(kind:u8 len:u16 bytes)
//!           slen:u32 slen*(len:u16 bytes nul)
//!           rlen child records
//! ```
//!
//! Structural errors fail the whole load; nothing is installed partially.

use crate::irep::{Irep, PoolValue};
use std::fmt;
use std::sync::Arc;

const MAGIC: &[u8; 4] = b"RITE";
const VERSION: &[u8; 4] = b"0004";
const COMPILER: &[u8; 8] = b"MATZ0000";
const HEADER_LEN: usize = 22;
const SECTION_HEADER_LEN: usize = 8;
const SECTION_IREP: &[u8; 4] = b"IREP";
const SECTION_DEBUG: &[u8; 4] = b"DBG ";
const SECTION_LV: &[u8; 4] = b"LV  ";
const SECTION_END: &[u8; 4] = b"END\0";
const SECTION_END_ASCII: &[u8; 4] = b"END ";
const IREP_VERSION: &[u8; 4] = b"0000";

// =============================================================================
// Errors
// =============================================================================

/// Structural failure while parsing a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Input ended before a required field.
    Truncated,
    /// The 8-byte identifier is not `RITE0004`.
    BadIdentifier,
    /// The header's total size does not match the input length.
    SizeMismatch { declared: u32, actual: usize },
    /// Unknown compiler signature.
    BadCompiler,
    /// A section length is shorter than its own header or runs past the input.
    BadSectionLength,
    /// The IREP section version is unsupported.
    BadIrepVersion,
    /// A record field (`ilen`/`plen`/`slen`) overruns its section.
    RecordOverrun,
    /// Unknown literal pool kind byte.
    BadPoolKind(u8),
    /// A literal could not be parsed (bad number spelling, float disabled).
    BadPoolValue,
    /// A symbol entry is malformed (missing nul, bad UTF-8).
    BadSymbol,
    /// The container carries no IREP section.
    MissingIrep,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Truncated => write!(f, "bytecode truncated"),
            LoadError::BadIdentifier => write!(f, "not a RITE0004 container"),
            LoadError::SizeMismatch { declared, actual } => {
                write!(f, "declared size {} does not match input {}", declared, actual)
            }
            LoadError::BadCompiler => write!(f, "unknown compiler signature"),
            LoadError::BadSectionLength => write!(f, "bad section length"),
            LoadError::BadIrepVersion => write!(f, "unsupported IREP section version"),
            LoadError::RecordOverrun => write!(f, "irep record overruns its section"),
            LoadError::BadPoolKind(k) => write!(f, "unknown pool kind {}", k),
            LoadError::BadPoolValue => write!(f, "unparsable pool literal"),
            LoadError::BadSymbol => write!(f, "malformed symbol entry"),
            LoadError::MissingIrep => write!(f, "container has no IREP section"),
        }
    }
}

impl std::error::Error for LoadError {}

// =============================================================================
// Byte reader
// =============================================================================

/// Bounded big-endian reader over the container bytes.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    limit: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0, limit: buf.len() }
    }

    fn remaining(&self) -> usize {
        self.limit - self.pos
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], LoadError> {
        if self.remaining() < n {
            return Err(LoadError::Truncated);
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn u8(&mut self) -> Result<u8, LoadError> {
        Ok(self.bytes(1)?[0])
    }

    fn u16_be(&mut self) -> Result<u16, LoadError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32_be(&mut self) -> Result<u32, LoadError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Advance to the next 4-byte boundary (relative to the container start).
    #[cfg(feature = "require-32bit-alignment")]
    fn align4(&mut self) -> Result<(), LoadError> {
        let pad = (4 - self.pos % 4) % 4;
        self.bytes(pad).map(|_| ())
    }
}

// =============================================================================
// Load
// =============================================================================

/// Parse a RITE container into an IREP tree.
pub fn load(blob: &[u8]) -> Result<Irep, LoadError> {
    let mut r = Reader::new(blob);

    // Header.
    let ident = r.bytes(8).map_err(|_| LoadError::Truncated)?;
    if &ident[0..4] != MAGIC || &ident[4..8] != VERSION {
        return Err(LoadError::BadIdentifier);
    }
    let _crc = r.u16_be()?;
    let declared = r.u32_be()?;
    if declared as usize != blob.len() {
        return Err(LoadError::SizeMismatch { declared, actual: blob.len() });
    }
    if r.bytes(8)? != COMPILER {
        return Err(LoadError::BadCompiler);
    }

    // Sections.
    let mut root = None;
    loop {
        let b = r.bytes(4)?;
        let kind = [b[0], b[1], b[2], b[3]];
        let length = r.u32_be()? as usize;
        if length < SECTION_HEADER_LEN || length - SECTION_HEADER_LEN > r.remaining() {
            return Err(LoadError::BadSectionLength);
        }
        let section_end = r.pos + (length - SECTION_HEADER_LEN);

        match &kind {
            SECTION_IREP => {
                if r.bytes(4)? != IREP_VERSION {
                    return Err(LoadError::BadIrepVersion);
                }
                let saved_limit = r.limit;
                r.limit = section_end;
                let irep = read_irep(&mut r)?;
                r.limit = saved_limit;
                r.pos = section_end;
                root = Some(irep);
            }
            SECTION_END | SECTION_END_ASCII => break,
            SECTION_DEBUG | SECTION_LV => {
                r.pos = section_end;
            }
            _ => {
                // Unknown sections are tolerated and skipped.
                r.pos = section_end;
            }
        }
    }

    root.ok_or(LoadError::MissingIrep)
}

fn read_irep(r: &mut Reader<'_>) -> Result<Irep, LoadError> {
    let nlocals = r.u16_be()?;
    let nregs = r.u16_be()?;
    let rlen = r.u16_be()? as usize;
    let ilen = r.u32_be()? as usize;

    #[cfg(feature = "require-32bit-alignment")]
    r.align4()?;

    if ilen.checked_mul(4).map_or(true, |b| b > r.remaining()) {
        return Err(LoadError::RecordOverrun);
    }
    let mut code = Vec::with_capacity(ilen);
    for _ in 0..ilen {
        code.push(r.u32_be()?);
    }

    let plen = r.u32_be()? as usize;
    if plen > r.remaining() {
        return Err(LoadError::RecordOverrun);
    }
    let mut pools = Vec::with_capacity(plen);
    for _ in 0..plen {
        let kind = r.u8()?;
        let len = r.u16_be()? as usize;
        let bytes = r.bytes(len).map_err(|_| LoadError::RecordOverrun)?;
        pools.push(parse_pool_entry(kind, bytes)?);
    }

    let slen = r.u32_be()? as usize;
    if slen > r.remaining() {
        return Err(LoadError::RecordOverrun);
    }
    let mut sym_names = Vec::with_capacity(slen);
    for _ in 0..slen {
        let len = r.u16_be()? as usize;
        let bytes = r.bytes(len).map_err(|_| LoadError::RecordOverrun)?;
        if r.u8()? != 0 {
            return Err(LoadError::BadSymbol);
        }
        let name = std::str::from_utf8(bytes).map_err(|_| LoadError::BadSymbol)?;
        sym_names.push(name.into());
    }

    let mut reps = Vec::with_capacity(rlen);
    for _ in 0..rlen {
        reps.push(Arc::new(read_irep(r)?));
    }

    Ok(Irep { nlocals, nregs, code, pools, sym_names, reps })
}

fn parse_pool_entry(kind: u8, bytes: &[u8]) -> Result<PoolValue, LoadError> {
    match kind {
        0 => Ok(PoolValue::Str(bytes.into())),
        1 => {
            let s = std::str::from_utf8(bytes).map_err(|_| LoadError::BadPoolValue)?;
            let n: i64 = s.trim().parse().map_err(|_| LoadError::BadPoolValue)?;
            Ok(PoolValue::Fixnum(n))
        }
        #[cfg(feature = "float")]
        2 => {
            let s = std::str::from_utf8(bytes).map_err(|_| LoadError::BadPoolValue)?;
            let d: f64 = s.trim().parse().map_err(|_| LoadError::BadPoolValue)?;
            Ok(PoolValue::Float(d))
        }
        #[cfg(not(feature = "float"))]
        2 => Err(LoadError::BadPoolValue),
        k => Err(LoadError::BadPoolKind(k)),
    }
}

// =============================================================================
// Dump
// =============================================================================

/// Serialize an IREP tree into a RITE container.
///
/// The output loads back into a structurally identical tree.
pub fn dump(irep: &Irep) -> Vec<u8> {
    let mut irep_payload = Vec::new();
    write_irep(irep, HEADER_LEN + SECTION_HEADER_LEN + 4, &mut irep_payload);

    let irep_section_len = SECTION_HEADER_LEN + 4 + irep_payload.len();
    let total = HEADER_LEN + irep_section_len + SECTION_HEADER_LEN;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(VERSION);
    out.extend_from_slice(&0u16.to_be_bytes()); // crc, ignored on load
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(COMPILER);

    out.extend_from_slice(SECTION_IREP);
    out.extend_from_slice(&(irep_section_len as u32).to_be_bytes());
    out.extend_from_slice(IREP_VERSION);
    out.extend_from_slice(&irep_payload);

    out.extend_from_slice(SECTION_END_ASCII);
    out.extend_from_slice(&(SECTION_HEADER_LEN as u32).to_be_bytes());
    out
}

/// `base` is the absolute container offset where this record begins, needed
/// to reproduce the loader's 4-byte code alignment.
fn write_irep(irep: &Irep, base: usize, out: &mut Vec<u8>) {
    let start = out.len();
    out.extend_from_slice(&irep.nlocals.to_be_bytes());
    out.extend_from_slice(&irep.nregs.to_be_bytes());
    out.extend_from_slice(&(irep.reps.len() as u16).to_be_bytes());
    out.extend_from_slice(&(irep.code.len() as u32).to_be_bytes());

    #[cfg(feature = "require-32bit-alignment")]
    {
        let pos = base + (out.len() - start);
        for _ in 0..(4 - pos % 4) % 4 {
            out.push(0);
        }
    }

    for word in &irep.code {
        out.extend_from_slice(&word.to_be_bytes());
    }

    out.extend_from_slice(&(irep.pools.len() as u32).to_be_bytes());
    for p in &irep.pools {
        match p {
            PoolValue::Str(s) => {
                out.push(0);
                out.extend_from_slice(&(s.len() as u16).to_be_bytes());
                out.extend_from_slice(s);
            }
            PoolValue::Fixnum(n) => {
                let s = n.to_string();
                out.push(1);
                out.extend_from_slice(&(s.len() as u16).to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            #[cfg(feature = "float")]
            PoolValue::Float(d) => {
                let s = format!("{:?}", d);
                out.push(2);
                out.extend_from_slice(&(s.len() as u16).to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            }
        }
    }

    out.extend_from_slice(&(irep.sym_names.len() as u32).to_be_bytes());
    for name in &irep.sym_names {
        out.extend_from_slice(&(name.len() as u16).to_be_bytes());
        out.extend_from_slice(name.as_bytes());
        out.push(0);
    }

    for child in &irep.reps {
        let child_base = base + (out.len() - start);
        write_irep(child, child_base, out);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{mk_abc, mk_abx, Opcode};

    fn sample_irep() -> Irep {
        let child = Irep {
            nlocals: 1,
            nregs: 3,
            code: vec![mk_abc(Opcode::Return, 1, 0, 0)],
            pools: vec![],
            sym_names: vec![],
            reps: vec![],
        };
        let mut pools = vec![
            PoolValue::Str(b"hello".as_slice().into()),
            PoolValue::Fixnum(-42),
        ];
        #[cfg(feature = "float")]
        pools.push(PoolValue::Float(2.5));
        Irep {
            nlocals: 2,
            nregs: 5,
            code: vec![
                mk_abx(Opcode::LoadL, 1, 0),
                mk_abc(Opcode::Stop, 0, 0, 0),
            ],
            pools,
            sym_names: vec!["puts".into(), "@count".into()],
            reps: vec![Arc::new(child)],
        }
    }

    #[test]
    fn round_trip_identical() {
        let irep = sample_irep();
        let blob = dump(&irep);
        let loaded = load(&blob).unwrap();
        assert_eq!(irep, loaded);

        // load -> dump -> load is a fixed point.
        let blob2 = dump(&loaded);
        assert_eq!(blob, blob2);
    }

    #[test]
    fn rejects_bad_identifier() {
        let mut blob = dump(&sample_irep());
        blob[0] = b'X';
        assert_eq!(load(&blob), Err(LoadError::BadIdentifier));
    }

    #[test]
    fn rejects_size_mismatch() {
        let mut blob = dump(&sample_irep());
        blob.push(0);
        assert!(matches!(load(&blob), Err(LoadError::SizeMismatch { .. })));
    }

    #[test]
    fn rejects_truncated_input() {
        let blob = dump(&sample_irep());
        assert!(load(&blob[..10]).is_err());
    }

    #[test]
    fn rejects_ilen_overrun() {
        // Corrupt ilen so the code array claims more space than the section
        // holds. ilen lives 6 bytes into the irep record, which begins after
        // the 22-byte header, 8-byte section header and 4-byte version.
        let mut blob = dump(&sample_irep());
        let ilen_at = 22 + 8 + 4 + 6;
        blob[ilen_at..ilen_at + 4].copy_from_slice(&0xffff_0000u32.to_be_bytes());
        assert_eq!(load(&blob), Err(LoadError::RecordOverrun));
    }

    #[test]
    fn rejects_bad_pool_kind() {
        let irep = Irep {
            pools: vec![PoolValue::Fixnum(1)],
            ..Default::default()
        };
        let mut blob = dump(&irep);
        // Pool entry kind byte sits right after plen.
        let kind_at = 22 + 8 + 4 + 10 + 4;
        assert_eq!(blob[kind_at], 1);
        blob[kind_at] = 9;
        assert_eq!(load(&blob), Err(LoadError::BadPoolKind(9)));
    }

    #[test]
    fn missing_irep_section() {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(VERSION);
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&30u32.to_be_bytes());
        out.extend_from_slice(COMPILER);
        out.extend_from_slice(SECTION_END_ASCII);
        out.extend_from_slice(&8u32.to_be_bytes());
        assert_eq!(load(&out), Err(LoadError::MissingIrep));
    }
}
