// Error types for the two halves of FRAME: assembling source text, and
// running the resulting image. The VM is total by design;
// InvalidOpcode is the one runtime failure it is allowed to surface.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct SourcePos {
    pub line: usize,
    pub column: usize,
}

impl SourcePos {
    pub fn new(line: usize, column: usize) -> Self {
        SourcePos { line, column }
    }
}

impl std::fmt::Display for SourcePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AsmError {
    #[error("{pos}: lex error: {message}")]
    Lex { pos: SourcePos, message: String },
    #[error("{pos}: parse error: {message}")]
    Parse { pos: SourcePos, message: String },
    #[error("{pos}: {message}")]
    Semantic { pos: SourcePos, message: String },
}

impl AsmError {
    pub fn lex(pos: SourcePos, message: impl Into<String>) -> Self {
        AsmError::Lex { pos, message: message.into() }
    }
    pub fn parse(pos: SourcePos, message: impl Into<String>) -> Self {
        AsmError::Parse { pos, message: message.into() }
    }
    pub fn semantic(pos: SourcePos, message: impl Into<String>) -> Self {
        AsmError::Semantic { pos, message: message.into() }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum VmError {
    #[error("invalid opcode {byte:#04x} at pc {pc:#06x}")]
    InvalidOpcode { pc: u16, byte: u8 },
}
