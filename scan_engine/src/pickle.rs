//! Non-executing pickle bytecode disassembler.
//!
//! Walks a pickle byte stream and yields one [`PickleOp`] per opcode —
//! `(opcode, decoded argument or none, byte offset)` — without resolving
//! any symbol, invoking any reducer, or building any value. This is the
//! read-only substrate for the safety scanner and the migration linter.
//!
//! Malformed input never raises: a truncated argument, an unknown opcode,
//! or a hostile length field simply ends iteration, and everything decoded
//! up to that point stands.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use memchr::memchr;

/// A pickle opcode. Covers protocols 0 through 5.
///
/// Argument layouts follow the pickle format definition; opcodes the
/// policy layers care about (string pushes, `GLOBAL`, `STACK_GLOBAL`,
/// `REDUCE`, stack discipline) get decoded arguments, the rest are
/// skipped over structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Proto,
    Frame,
    Stop,
    Mark,
    Pop,
    PopMark,
    Dup,
    Memoize,
    Reduce,
    Build,
    Append,
    Appends,
    Dict,
    EmptyDict,
    List,
    EmptyList,
    Tuple,
    Tuple1,
    Tuple2,
    Tuple3,
    EmptyTuple,
    SetItem,
    SetItems,
    NoneOp,
    NewTrue,
    NewFalse,
    EmptySet,
    AddItems,
    FrozenSet,
    NewObj,
    NewObjEx,
    Obj,
    Inst,
    Global,
    StackGlobal,
    PersId,
    BinPersId,
    Int,
    Long,
    Long1,
    Long4,
    Float,
    BinFloat,
    BinInt,
    BinInt1,
    BinInt2,
    String,
    BinString,
    ShortBinString,
    Unicode,
    BinUnicode,
    ShortBinUnicode,
    BinUnicode8,
    BinBytes,
    ShortBinBytes,
    BinBytes8,
    ByteArray8,
    Get,
    BinGet,
    LongBinGet,
    Put,
    BinPut,
    LongBinPut,
    Ext1,
    Ext2,
    Ext4,
    NextBuffer,
    ReadonlyBuffer,
}

impl Opcode {
    /// The canonical opcode name, as `pickletools` spells it.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Proto => "PROTO",
            Self::Frame => "FRAME",
            Self::Stop => "STOP",
            Self::Mark => "MARK",
            Self::Pop => "POP",
            Self::PopMark => "POP_MARK",
            Self::Dup => "DUP",
            Self::Memoize => "MEMOIZE",
            Self::Reduce => "REDUCE",
            Self::Build => "BUILD",
            Self::Append => "APPEND",
            Self::Appends => "APPENDS",
            Self::Dict => "DICT",
            Self::EmptyDict => "EMPTY_DICT",
            Self::List => "LIST",
            Self::EmptyList => "EMPTY_LIST",
            Self::Tuple => "TUPLE",
            Self::Tuple1 => "TUPLE1",
            Self::Tuple2 => "TUPLE2",
            Self::Tuple3 => "TUPLE3",
            Self::EmptyTuple => "EMPTY_TUPLE",
            Self::SetItem => "SETITEM",
            Self::SetItems => "SETITEMS",
            Self::NoneOp => "NONE",
            Self::NewTrue => "NEWTRUE",
            Self::NewFalse => "NEWFALSE",
            Self::EmptySet => "EMPTY_SET",
            Self::AddItems => "ADDITEMS",
            Self::FrozenSet => "FROZENSET",
            Self::NewObj => "NEWOBJ",
            Self::NewObjEx => "NEWOBJ_EX",
            Self::Obj => "OBJ",
            Self::Inst => "INST",
            Self::Global => "GLOBAL",
            Self::StackGlobal => "STACK_GLOBAL",
            Self::PersId => "PERSID",
            Self::BinPersId => "BINPERSID",
            Self::Int => "INT",
            Self::Long => "LONG",
            Self::Long1 => "LONG1",
            Self::Long4 => "LONG4",
            Self::Float => "FLOAT",
            Self::BinFloat => "BINFLOAT",
            Self::BinInt => "BININT",
            Self::BinInt1 => "BININT1",
            Self::BinInt2 => "BININT2",
            Self::String => "STRING",
            Self::BinString => "BINSTRING",
            Self::ShortBinString => "SHORT_BINSTRING",
            Self::Unicode => "UNICODE",
            Self::BinUnicode => "BINUNICODE",
            Self::ShortBinUnicode => "SHORT_BINUNICODE",
            Self::BinUnicode8 => "BINUNICODE8",
            Self::BinBytes => "BINBYTES",
            Self::ShortBinBytes => "SHORT_BINBYTES",
            Self::BinBytes8 => "BINBYTES8",
            Self::ByteArray8 => "BYTEARRAY8",
            Self::Get => "GET",
            Self::BinGet => "BINGET",
            Self::LongBinGet => "LONG_BINGET",
            Self::Put => "PUT",
            Self::BinPut => "BINPUT",
            Self::LongBinPut => "LONG_BINPUT",
            Self::Ext1 => "EXT1",
            Self::Ext2 => "EXT2",
            Self::Ext4 => "EXT4",
            Self::NextBuffer => "NEXT_BUFFER",
            Self::ReadonlyBuffer => "READONLY_BUFFER",
        }
    }

    /// Map an opcode byte to its kind. Unknown bytes are `None`.
    #[must_use]
    fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x80 => Self::Proto,
            0x95 => Self::Frame,
            b'.' => Self::Stop,
            b'(' => Self::Mark,
            b'0' => Self::Pop,
            b'1' => Self::PopMark,
            b'2' => Self::Dup,
            0x94 => Self::Memoize,
            b'R' => Self::Reduce,
            b'b' => Self::Build,
            b'a' => Self::Append,
            b'e' => Self::Appends,
            b'd' => Self::Dict,
            b'}' => Self::EmptyDict,
            b'l' => Self::List,
            b']' => Self::EmptyList,
            b't' => Self::Tuple,
            0x85 => Self::Tuple1,
            0x86 => Self::Tuple2,
            0x87 => Self::Tuple3,
            b')' => Self::EmptyTuple,
            b's' => Self::SetItem,
            b'u' => Self::SetItems,
            b'N' => Self::NoneOp,
            0x88 => Self::NewTrue,
            0x89 => Self::NewFalse,
            0x8f => Self::EmptySet,
            0x90 => Self::AddItems,
            0x91 => Self::FrozenSet,
            0x81 => Self::NewObj,
            0x92 => Self::NewObjEx,
            b'o' => Self::Obj,
            b'i' => Self::Inst,
            b'c' => Self::Global,
            0x93 => Self::StackGlobal,
            b'P' => Self::PersId,
            b'Q' => Self::BinPersId,
            b'I' => Self::Int,
            b'L' => Self::Long,
            0x8a => Self::Long1,
            0x8b => Self::Long4,
            b'F' => Self::Float,
            b'G' => Self::BinFloat,
            b'J' => Self::BinInt,
            b'K' => Self::BinInt1,
            b'M' => Self::BinInt2,
            b'S' => Self::String,
            b'T' => Self::BinString,
            b'U' => Self::ShortBinString,
            b'V' => Self::Unicode,
            b'X' => Self::BinUnicode,
            0x8c => Self::ShortBinUnicode,
            0x8d => Self::BinUnicode8,
            b'B' => Self::BinBytes,
            b'C' => Self::ShortBinBytes,
            0x8e => Self::BinBytes8,
            0x96 => Self::ByteArray8,
            b'g' => Self::Get,
            b'h' => Self::BinGet,
            b'j' => Self::LongBinGet,
            b'p' => Self::Put,
            b'q' => Self::BinPut,
            b'r' => Self::LongBinPut,
            0x82 => Self::Ext1,
            0x83 => Self::Ext2,
            0x84 => Self::Ext4,
            0x97 => Self::NextBuffer,
            0x98 => Self::ReadonlyBuffer,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded opcode argument.
#[derive(Debug, Clone, PartialEq)]
pub enum OpArg {
    /// Textual argument (string pushes, `GLOBAL` pairs, decimal literals).
    Text(String),
    /// Raw byte payload (bytes pushes, long encodings).
    Bytes(Vec<u8>),
    /// Signed integer argument.
    Int(i64),
    /// Unsigned integer argument (protocol markers, memo indices, lengths).
    Uint(u64),
    /// Floating-point argument.
    Float(f64),
}

/// One disassembled opcode with its argument and stream offset.
#[derive(Debug, Clone, PartialEq)]
pub struct PickleOp {
    /// The opcode.
    pub opcode: Opcode,
    /// Decoded argument, if the opcode carries one we decode.
    pub arg: Option<OpArg>,
    /// Byte offset of the opcode in the stream.
    pub offset: usize,
}

impl PickleOp {
    /// The textual value this op pushes on the stack, if it is a string
    /// or bytes push with UTF-8 content.
    ///
    /// This is what the policy layers' shadow stacks track.
    #[must_use]
    pub fn pushed_text(&self) -> Option<String> {
        match self.opcode {
            Opcode::String
            | Opcode::BinString
            | Opcode::ShortBinString
            | Opcode::Unicode
            | Opcode::BinUnicode
            | Opcode::ShortBinUnicode
            | Opcode::BinUnicode8
            | Opcode::BinBytes
            | Opcode::ShortBinBytes
            | Opcode::BinBytes8 => match &self.arg {
                Some(OpArg::Text(text)) => Some(text.clone()),
                Some(OpArg::Bytes(bytes)) => std::str::from_utf8(bytes).ok().map(str::to_owned),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Streaming disassembler over a pickle byte slice.
///
/// Iteration ends at `STOP`, at the first malformed opcode, or at end of
/// input — whichever comes first. It never panics and never allocates
/// beyond the argument being decoded.
pub struct Disassembler<'a> {
    data: &'a [u8],
    pos: usize,
    halted: bool,
}

impl<'a> Disassembler<'a> {
    /// Disassemble `data` from offset zero.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            halted: false,
        }
    }

    /// Consume `n` bytes, or `None` if the stream is too short.
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        if end > self.data.len() {
            return None;
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Some(slice)
    }

    /// Consume a length field and convert it to a checked `usize`.
    fn take_len(&mut self, width: LenWidth) -> Option<usize> {
        let raw: u64 = match width {
            LenWidth::U8 => u64::from(self.take(1)?[0]),
            LenWidth::U32 => u64::from(LittleEndian::read_u32(self.take(4)?)),
            LenWidth::I32 => {
                let v = LittleEndian::read_i32(self.take(4)?);
                if v < 0 {
                    return None;
                }
                v as u64
            }
            LenWidth::U64 => LittleEndian::read_u64(self.take(8)?),
        };
        usize::try_from(raw).ok()
    }

    /// Consume up to and including the next newline; returns the line
    /// without its terminator.
    fn take_line(&mut self) -> Option<&'a [u8]> {
        let rest = &self.data[self.pos..];
        let nl = memchr(b'\n', rest)?;
        let line = &rest[..nl];
        self.pos += nl + 1;
        Some(line)
    }

    /// Consume a counted payload after a length field.
    fn take_counted(&mut self, width: LenWidth) -> Option<&'a [u8]> {
        let len = self.take_len(width)?;
        self.take(len)
    }

    /// Decode the argument for `opcode`. `None` means malformed input.
    #[allow(clippy::too_many_lines)]
    fn decode_arg(&mut self, opcode: Opcode) -> Option<Option<OpArg>> {
        let arg = match opcode {
            // No argument.
            Opcode::Stop
            | Opcode::Mark
            | Opcode::Pop
            | Opcode::PopMark
            | Opcode::Dup
            | Opcode::Memoize
            | Opcode::Reduce
            | Opcode::Build
            | Opcode::Append
            | Opcode::Appends
            | Opcode::Dict
            | Opcode::EmptyDict
            | Opcode::List
            | Opcode::EmptyList
            | Opcode::Tuple
            | Opcode::Tuple1
            | Opcode::Tuple2
            | Opcode::Tuple3
            | Opcode::EmptyTuple
            | Opcode::SetItem
            | Opcode::SetItems
            | Opcode::NoneOp
            | Opcode::NewTrue
            | Opcode::NewFalse
            | Opcode::EmptySet
            | Opcode::AddItems
            | Opcode::FrozenSet
            | Opcode::NewObj
            | Opcode::NewObjEx
            | Opcode::Obj
            | Opcode::StackGlobal
            | Opcode::BinPersId
            | Opcode::NextBuffer
            | Opcode::ReadonlyBuffer => None,

            // Single-byte numeric arguments.
            Opcode::Proto | Opcode::BinInt1 | Opcode::BinGet | Opcode::BinPut | Opcode::Ext1 => {
                Some(OpArg::Uint(u64::from(self.take(1)?[0])))
            }

            // Fixed-width numeric arguments.
            Opcode::Frame => Some(OpArg::Uint(LittleEndian::read_u64(self.take(8)?))),
            Opcode::BinInt => Some(OpArg::Int(i64::from(LittleEndian::read_i32(
                self.take(4)?,
            )))),
            Opcode::BinInt2 | Opcode::Ext2 => Some(OpArg::Uint(u64::from(
                LittleEndian::read_u16(self.take(2)?),
            ))),
            Opcode::LongBinGet | Opcode::LongBinPut => Some(OpArg::Uint(u64::from(
                LittleEndian::read_u32(self.take(4)?),
            ))),
            Opcode::Ext4 => Some(OpArg::Int(i64::from(LittleEndian::read_i32(
                self.take(4)?,
            )))),
            // BINFLOAT is the one big-endian field in the format.
            Opcode::BinFloat => Some(OpArg::Float(BigEndian::read_f64(self.take(8)?))),

            // Newline-terminated text arguments.
            Opcode::Int | Opcode::Long | Opcode::Float | Opcode::Get | Opcode::Put => Some(
                OpArg::Text(String::from_utf8_lossy(self.take_line()?).into_owned()),
            ),
            Opcode::PersId | Opcode::Unicode => Some(OpArg::Text(
                String::from_utf8_lossy(self.take_line()?).into_owned(),
            )),
            Opcode::String => {
                let line = self.take_line()?;
                Some(OpArg::Text(strip_string_quotes(line)))
            }

            // Two-line module/name pairs.
            Opcode::Global | Opcode::Inst => {
                let module = String::from_utf8_lossy(self.take_line()?).into_owned();
                let name = String::from_utf8_lossy(self.take_line()?).into_owned();
                Some(OpArg::Text(format!("{module}\n{name}")))
            }

            // Counted text payloads.
            Opcode::BinString => Some(OpArg::Text(
                String::from_utf8_lossy(self.take_counted(LenWidth::I32)?).into_owned(),
            )),
            Opcode::ShortBinString => Some(OpArg::Text(
                String::from_utf8_lossy(self.take_counted(LenWidth::U8)?).into_owned(),
            )),
            Opcode::BinUnicode => Some(OpArg::Text(
                String::from_utf8_lossy(self.take_counted(LenWidth::U32)?).into_owned(),
            )),
            Opcode::ShortBinUnicode => Some(OpArg::Text(
                String::from_utf8_lossy(self.take_counted(LenWidth::U8)?).into_owned(),
            )),
            Opcode::BinUnicode8 => Some(OpArg::Text(
                String::from_utf8_lossy(self.take_counted(LenWidth::U64)?).into_owned(),
            )),

            // Counted byte payloads.
            Opcode::BinBytes => Some(OpArg::Bytes(self.take_counted(LenWidth::U32)?.to_vec())),
            Opcode::ShortBinBytes => Some(OpArg::Bytes(self.take_counted(LenWidth::U8)?.to_vec())),
            Opcode::BinBytes8 | Opcode::ByteArray8 => {
                Some(OpArg::Bytes(self.take_counted(LenWidth::U64)?.to_vec()))
            }
            Opcode::Long1 => Some(OpArg::Bytes(self.take_counted(LenWidth::U8)?.to_vec())),
            Opcode::Long4 => Some(OpArg::Bytes(self.take_counted(LenWidth::I32)?.to_vec())),
        };
        Some(arg)
    }
}

/// Width of a counted-payload length field.
#[derive(Clone, Copy)]
enum LenWidth {
    U8,
    U32,
    I32,
    U64,
}

/// Strip the repr quotes from a protocol-0 `STRING` argument.
///
/// Escape sequences are left as-is; the policy layers only compare
/// module and symbol names, which never contain them.
fn strip_string_quotes(line: &[u8]) -> String {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim_end_matches('\r');
    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'\'' || first == b'"') && first == last {
            return trimmed[1..trimmed.len() - 1].to_owned();
        }
    }
    trimmed.to_owned()
}

impl Iterator for Disassembler<'_> {
    type Item = PickleOp;

    fn next(&mut self) -> Option<PickleOp> {
        if self.halted || self.pos >= self.data.len() {
            return None;
        }

        let offset = self.pos;
        let byte = self.data[self.pos];
        self.pos += 1;

        let Some(opcode) = Opcode::from_byte(byte) else {
            self.halted = true;
            return None;
        };

        let Some(arg) = self.decode_arg(opcode) else {
            // Truncated or hostile argument — keep the partial output.
            self.halted = true;
            return None;
        };

        if opcode == Opcode::Stop {
            // One stream, one STOP. Trailing bytes are not ours to parse.
            self.halted = true;
        }

        Some(PickleOp {
            opcode,
            arg,
            offset,
        })
    }
}

/// Disassemble an entire stream into a vector.
///
/// Convenience for callers that want the ops rather than the iterator;
/// totality and partial-output behavior are the iterator's.
#[must_use]
pub fn disassemble(data: &[u8]) -> Vec<PickleOp> {
    Disassembler::new(data).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `pickle.dumps(os.system)`-shaped protocol 4 stream.
    const STACK_GLOBAL_SYSTEM: &[u8] = b"\x80\x04\x8c\x02os\x8c\x06system\x93.";

    #[test]
    fn test_disassemble_stack_global_stream() {
        let ops = disassemble(STACK_GLOBAL_SYSTEM);
        let names: Vec<&str> = ops.iter().map(|op| op.opcode.name()).collect();
        assert_eq!(
            names,
            vec![
                "PROTO",
                "SHORT_BINUNICODE",
                "SHORT_BINUNICODE",
                "STACK_GLOBAL",
                "STOP"
            ]
        );
        assert_eq!(ops[1].arg, Some(OpArg::Text("os".to_owned())));
        assert_eq!(ops[2].arg, Some(OpArg::Text("system".to_owned())));
    }

    #[test]
    fn test_offsets_track_the_stream() {
        let ops = disassemble(STACK_GLOBAL_SYSTEM);
        let offsets: Vec<usize> = ops.iter().map(|op| op.offset).collect();
        assert_eq!(offsets, vec![0, 2, 6, 14, 15]);
    }

    #[test]
    fn test_global_two_line_argument() {
        let ops = disassemble(b"cos\nsystem\n.");
        assert_eq!(ops[0].opcode, Opcode::Global);
        assert_eq!(ops[0].arg, Some(OpArg::Text("os\nsystem".to_owned())));
        assert_eq!(ops[1].opcode, Opcode::Stop);
    }

    #[test]
    fn test_protocol0_string_strips_quotes() {
        let ops = disassemble(b"S'test'\n.");
        assert_eq!(ops[0].opcode, Opcode::String);
        assert_eq!(ops[0].arg, Some(OpArg::Text("test".to_owned())));
        assert_eq!(ops[0].pushed_text(), Some("test".to_owned()));
    }

    #[test]
    fn test_binunicode_counted_payload() {
        let ops = disassemble(b"X\x02\x00\x00\x00hi.");
        assert_eq!(ops[0].opcode, Opcode::BinUnicode);
        assert_eq!(ops[0].pushed_text(), Some("hi".to_owned()));
    }

    #[test]
    fn test_short_binbytes_utf8_is_text_push() {
        let ops = disassemble(b"C\x02os.");
        assert_eq!(ops[0].opcode, Opcode::ShortBinBytes);
        assert_eq!(ops[0].pushed_text(), Some("os".to_owned()));
    }

    #[test]
    fn test_non_utf8_bytes_push_is_not_text() {
        let ops = disassemble(b"C\x02\xff\xfe.");
        assert_eq!(ops[0].pushed_text(), None);
    }

    #[test]
    fn test_binfloat_is_big_endian() {
        let mut stream = vec![b'G'];
        stream.extend_from_slice(&1.0f64.to_be_bytes());
        stream.push(b'.');
        let ops = disassemble(&stream);
        assert_eq!(ops[0].arg, Some(OpArg::Float(1.0)));
    }

    #[test]
    fn test_truncated_argument_halts_with_partial_output() {
        // PROTO decodes, then SHORT_BINUNICODE declares 16 bytes with 2 present.
        let ops = disassemble(b"\x80\x04\x8c\x10ab");
        let names: Vec<&str> = ops.iter().map(|op| op.opcode.name()).collect();
        assert_eq!(names, vec!["PROTO"]);
    }

    #[test]
    fn test_unknown_opcode_halts_cleanly() {
        let ops = disassemble(b"\xff\xff\xff");
        assert!(ops.is_empty());
    }

    #[test]
    fn test_stop_ends_iteration_before_trailing_garbage() {
        let ops = disassemble(b"N.\xff\xff");
        let names: Vec<&str> = ops.iter().map(|op| op.opcode.name()).collect();
        assert_eq!(names, vec!["NONE", "STOP"]);
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(disassemble(b"").is_empty());
    }

    #[test]
    fn test_hostile_length_field_does_not_allocate() {
        // BINUNICODE8 with a u64::MAX length. Must halt, not OOM.
        let mut stream = vec![0x8d];
        stream.extend_from_slice(&u64::MAX.to_le_bytes());
        let ops = disassemble(&stream);
        assert!(ops.is_empty());
    }

    #[test]
    fn test_memo_ops_decode_indices() {
        let ops = disassemble(b"}q\x00.");
        assert_eq!(ops[0].opcode, Opcode::EmptyDict);
        assert_eq!(ops[1].opcode, Opcode::BinPut);
        assert_eq!(ops[1].arg, Some(OpArg::Uint(0)));
    }
}
