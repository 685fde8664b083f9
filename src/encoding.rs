//! Translation between ASCII source text and Malbolge opcodes.
//!
//! Malbolge source is enciphered position by position: the character `s`
//! stored at load position `k` denotes the opcode
//! `DECRYPT_TABLE[(s - 33 + k) mod 94]`, and after a cell executes it is
//! replaced by `ENCRYPT_TABLE[cell - 33]`. Both tables are published
//! constants and must be preserved byte for byte; generated program files
//! are only portable across toolkits that agree on them.
//!
//! This toolkit standardizes `<` as the output operation and rejects the
//! input operation `/` at load time (generated programs never read input).

use crate::machine::errors::MachineError;
use crate::machine::isa::Opcode;
use crate::ternary::MAX_ADDRESS_SPACE;

/// Number of entries in each cipher table: the printable ASCII range [33, 127).
pub const TABLE_LEN: usize = 94;

/// Lowest cell value that can be executed or re-encrypted.
pub const PRINTABLE_MIN: u32 = 33;

/// One past the highest executable cell value.
pub const PRINTABLE_END: u32 = 127;

/// Initial decryption table (`T0`): source character to opcode symbol,
/// indexed by `(char - 33 + position) mod 94`.
pub const DECRYPT_TABLE: &[u8; TABLE_LEN] =
    b"+b(29e*j1VMEKLyC})8&m#~W>qxdRp0wkrUo[D7,XTcA\"lI.v%{gJh4G\\-=O@5`_3i<?Z';FNQuY]szf$!BS/|t:Pn6^Ha";

/// Re-encryption table (`T1`): applied to the executed cell after every
/// step, indexed by `cell - 33`.
pub const ENCRYPT_TABLE: &[u8; TABLE_LEN] =
    b"5z]&gqtyfr$(we4{WP)H-Zn,[%\\3dL+Q;>U!pJS72FhOA1CB6v^=I_0/8|jsb9m<.TVac`uY*MK'X~xDl}REokN:#?G\"i@";

/// First position of each opcode symbol in [`DECRYPT_TABLE`], indexed by
/// opcode discriminant. Used to render opcodes back into source characters.
const DECRYPT_INDEX: [usize; Opcode::COUNT] = build_decrypt_index();

const fn build_decrypt_index() -> [usize; Opcode::COUNT] {
    let mut index = [0usize; Opcode::COUNT];
    let mut op = 0;
    while op < Opcode::COUNT {
        let symbol = Opcode::ALL[op].symbol();
        let mut i = 0;
        while i < TABLE_LEN {
            if DECRYPT_TABLE[i] == symbol {
                index[op] = i;
                break;
            }
            i += 1;
        }
        op += 1;
    }
    index
}

/// Decodes the opcode denoted by a tape cell at the given position.
///
/// Returns `None` when the cell is outside the executable range or the
/// deciphered character is not an operation symbol.
#[inline]
pub fn decode_cell(cell: u32, position: u32) -> Option<Opcode> {
    if !(PRINTABLE_MIN..PRINTABLE_END).contains(&cell) {
        return None;
    }
    let symbol = DECRYPT_TABLE[((cell - PRINTABLE_MIN + position) % TABLE_LEN as u32) as usize];
    Opcode::from_symbol(symbol)
}

/// Parses a raw opcode string (symbols over `i<*jpov`) into opcodes.
///
/// The input symbol `/` is rejected: this toolkit does not support
/// input-consuming programs.
pub fn parse_symbols(symbols: &str) -> Result<Vec<Opcode>, MachineError> {
    let mut opcodes = Vec::with_capacity(symbols.len());
    for (index, ch) in symbols.chars().enumerate() {
        let op = u8::try_from(ch as u32)
            .ok()
            .and_then(Opcode::from_symbol)
            .ok_or(MachineError::InvalidOpcodeSymbol { symbol: ch, index })?;
        if op == Opcode::In {
            return Err(MachineError::InputNotSupported { index });
        }
        opcodes.push(op);
    }
    Ok(opcodes)
}

/// Decodes ASCII Malbolge source into opcodes (strict load).
///
/// Whitespace is skipped and does not occupy a cell. Every other character
/// must decode to an operation symbol at its load position; the input
/// operation is rejected.
pub fn decode_source(source: &str) -> Result<Vec<Opcode>, MachineError> {
    let mut opcodes = Vec::new();
    for ch in source.chars() {
        if ch.is_whitespace() {
            continue;
        }
        let index = opcodes.len();
        if index >= MAX_ADDRESS_SPACE as usize {
            return Err(MachineError::ProgramTooLong {
                length: index + 1,
                limit: MAX_ADDRESS_SPACE as usize,
            });
        }
        let value = ch as u32;
        if !(PRINTABLE_MIN..PRINTABLE_END).contains(&value) {
            return Err(MachineError::InvalidSourceChar { ch, index });
        }
        match decode_cell(value, index as u32) {
            Some(Opcode::In) => return Err(MachineError::InputNotSupported { index }),
            Some(op) => opcodes.push(op),
            None => return Err(MachineError::InvalidSourceChar { ch, index }),
        }
    }
    Ok(opcodes)
}

/// Renders opcodes into ASCII source characters, starting at the given load
/// position. The inverse of [`decode_source`] for any start index.
pub fn encode_opcodes(opcodes: &[Opcode], start_index: usize) -> Result<String, MachineError> {
    let total = start_index + opcodes.len();
    if total > MAX_ADDRESS_SPACE as usize {
        return Err(MachineError::ProgramTooLong {
            length: total,
            limit: MAX_ADDRESS_SPACE as usize,
        });
    }
    let mut source = String::with_capacity(opcodes.len());
    for (offset, op) in opcodes.iter().enumerate() {
        let position = (start_index + offset) % TABLE_LEN;
        let value = (DECRYPT_INDEX[*op as usize] + TABLE_LEN - position) % TABLE_LEN;
        source.push((value as u8 + PRINTABLE_MIN as u8) as char);
    }
    Ok(source)
}

/// Renders opcodes as their symbol string (e.g. `"iooov"`).
pub fn render_symbols(opcodes: &[Opcode]) -> String {
    opcodes.iter().map(|op| op.symbol() as char).collect()
}
