// The assembler driver: orchestrates the lexer, the mode resolver,
// and the encoder, one token at a time, single-pass over the token stream.
// Forward-referenced labels are resolved by back-patching: when a label is
// undefined at the point a reference is emitted, only the *instruction's*
// opcode offset is remembered. Patching later re-reads that opcode byte to
// recover the mode (via `Opcode::from_byte(..).mode()`) and, from the
// mode's fixed byte layout, exactly where the address or label-byte lands.
// A precomputed opcode-to-mode table makes that recovery O(1), so there is
// no per-reference bookkeeping beyond one u16 offset.

use crate::asm::mode::ModeTrie;
use crate::asm::token::{ImmediateValue, Lexer, Token, TokenKind};
use crate::error::{AsmError, SourcePos};
use crate::isa::{ArgKind, Mnemonic, Mode, Opcode, ResolvedArg};
use std::collections::{BTreeMap, HashMap};

/// An instruction argument as parsed, before label references are resolved.
#[derive(Debug, Clone, PartialEq)]
enum ParsedArg {
    Reg(u8),
    Imm(u8),
    Addr(u16),
    Ind(u8),
    PendingAddr(String),
    PendingLow(String),
    PendingHigh(String),
}

impl ParsedArg {
    fn kind(&self) -> ArgKind {
        match self {
            ParsedArg::Reg(_) => ArgKind::Reg,
            ParsedArg::Imm(_) | ParsedArg::PendingLow(_) | ParsedArg::PendingHigh(_) => ArgKind::Imm,
            ParsedArg::Addr(_) | ParsedArg::PendingAddr(_) => ArgKind::Addr,
            ParsedArg::Ind(_) => ArgKind::Ind,
        }
    }

    fn placeholder_resolved(&self) -> ResolvedArg {
        match self {
            ParsedArg::Reg(r) => ResolvedArg::Reg(*r),
            ParsedArg::Imm(k) => ResolvedArg::Imm(*k),
            ParsedArg::Addr(p) => ResolvedArg::Addr(*p),
            ParsedArg::Ind(i) => ResolvedArg::Ind(*i),
            ParsedArg::PendingAddr(_) => ResolvedArg::Addr(0),
            ParsedArg::PendingLow(_) | ParsedArg::PendingHigh(_) => ResolvedArg::Imm(0),
        }
    }

    fn printable(&self) -> String {
        match self {
            ParsedArg::Reg(r) if *r == 16 => "$s".to_string(),
            ParsedArg::Reg(r) => format!("${:x}", r),
            ParsedArg::Imm(k) => format!("{:#x}", k),
            ParsedArg::Addr(p) => format!("%{:04x}", p),
            ParsedArg::Ind(i) => format!("({:02x})", i),
            ParsedArg::PendingAddr(name) => format!("@{}", name),
            ParsedArg::PendingLow(name) => format!("@<{}", name),
            ParsedArg::PendingHigh(name) => format!("@>{}", name),
        }
    }
}

/// The finished product of assembly: a loadable memory image plus the
/// metadata the VM and kernel loader need.
pub struct AssembledImage {
    pub image: Vec<u8>,
    pub start: u16,
    pub debug_map: BTreeMap<u16, String>,
    pub labels: HashMap<String, u16>,
    pub defines: HashMap<String, Token>,
}

pub struct Assembler {
    lexer: Lexer,
    lookahead: Option<Token>,
    image: Vec<u8>,
    cursor: u16,
    labels: HashMap<String, u16>,
    fwd_whole: HashMap<String, Vec<u16>>,
    fwd_lsb: HashMap<String, Vec<u16>>,
    fwd_msb: HashMap<String, Vec<u16>>,
    defines: HashMap<String, Token>,
    debug_map: BTreeMap<u16, String>,
    mode_trie: ModeTrie,
}

impl Assembler {
    pub fn new(source: &str) -> Self {
        Assembler {
            lexer: Lexer::new(source),
            lookahead: None,
            image: vec![0u8; 65536],
            cursor: 0,
            labels: HashMap::new(),
            fwd_whole: HashMap::new(),
            fwd_lsb: HashMap::new(),
            fwd_msb: HashMap::new(),
            defines: HashMap::new(),
            debug_map: BTreeMap::new(),
            mode_trie: ModeTrie::new(),
        }
    }

    /// Seeds the label and define tables from an already-assembled image
    /// (the kernel) so user programs can reference its labels.
    pub fn with_external_info(mut self, labels: HashMap<String, u16>, defines: HashMap<String, Token>) -> Self {
        self.labels = labels;
        self.defines = defines;
        self
    }

    fn next_token(&mut self) -> Token {
        self.lookahead.take().unwrap_or_else(|| self.lexer.next_token())
    }

    fn push_back(&mut self, tok: Token) {
        self.lookahead = Some(tok);
    }

    pub fn assemble(mut self) -> Result<AssembledImage, AsmError> {
        loop {
            let tok = self.next_token();
            match tok.kind {
                TokenKind::Eof => break,
                TokenKind::Label(name) => self.define_label(name, tok.pos)?,
                TokenKind::Instruction(mnemonic) => self.assemble_instruction(mnemonic, tok.pos)?,
                TokenKind::Directive(word) => self.assemble_directive(&word, tok.pos)?,
                TokenKind::Error(err) => return Err(err),
                other => return Err(AsmError::parse(tok.pos, format!("unexpected {:?} at top level", other))),
            }
        }
        self.check_unresolved()?;
        let start = self.labels.get("main").copied().unwrap_or(0);
        Ok(AssembledImage {
            image: self.image,
            start,
            debug_map: self.debug_map,
            labels: self.labels,
            defines: self.defines,
        })
    }

    fn check_unresolved(&self) -> Result<(), AsmError> {
        for name in self.fwd_whole.keys().chain(self.fwd_lsb.keys()).chain(self.fwd_msb.keys()) {
            if !self.labels.contains_key(name) {
                return Err(AsmError::semantic(SourcePos::new(0, 0), format!("unresolved label '{}' at end of input", name)));
            }
        }
        Ok(())
    }

    fn define_label(&mut self, name: String, pos: SourcePos) -> Result<(), AsmError> {
        if !name.starts_with('_') && self.labels.contains_key(&name) {
            return Err(AsmError::semantic(pos, format!("label '{}' redefined (prefix with '_' to allow redefinition)", name)));
        }
        self.labels.insert(name.clone(), self.cursor);
        self.resolve_pending(&name);
        Ok(())
    }

    fn resolve_pending(&mut self, name: &str) {
        let addr = self.labels[name];
        if let Some(offsets) = self.fwd_whole.remove(name) {
            for opcode_offset in offsets {
                self.patch_whole(opcode_offset, addr);
            }
        }
        if let Some(offsets) = self.fwd_lsb.remove(name) {
            for opcode_offset in offsets {
                self.patch_imm(opcode_offset, (addr & 0xff) as u8);
            }
        }
        if let Some(offsets) = self.fwd_msb.remove(name) {
            for opcode_offset in offsets {
                self.patch_imm(opcode_offset, (addr >> 8) as u8);
            }
        }
    }

    fn patch_whole(&mut self, opcode_offset: u16, addr: u16) {
        let mode = Opcode::from_byte(self.image[opcode_offset as usize]).expect("opcode byte written by this assembler is always valid").mode();
        let at = opcode_offset as usize + 1 + mode.addr_offset().expect("recorded whole-address offset implies mode carries one");
        self.image[at] = (addr & 0xff) as u8;
        self.image[at + 1] = (addr >> 8) as u8;
    }

    fn patch_imm(&mut self, opcode_offset: u16, byte: u8) {
        let mode = Opcode::from_byte(self.image[opcode_offset as usize]).expect("opcode byte written by this assembler is always valid").mode();
        let at = opcode_offset as usize + 1 + mode.imm_offset().expect("recorded label-byte offset implies mode carries an immediate");
        self.image[at] = byte;
    }

    fn emit_byte(&mut self, byte: u8) {
        self.image[self.cursor as usize] = byte;
        self.cursor = self.cursor.wrapping_add(1);
    }

    /// Resolves a raw token (after `.def` substitution) to a parsed
    /// argument, or `None` if the token does not start an argument — in
    /// which case it must be pushed back for the caller.
    fn token_to_arg(&mut self, tok: Token) -> Result<Option<ParsedArg>, AsmError> {
        match tok.kind {
            TokenKind::Register(r) => Ok(Some(ParsedArg::Reg(r))),
            TokenKind::Address(a) => Ok(Some(ParsedArg::Addr(a))),
            TokenKind::Indirect(i) => Ok(Some(ParsedArg::Ind(i))),
            TokenKind::Immediate(ImmediateValue::Literal(v)) => {
                if v > 0xff {
                    return Err(AsmError::semantic(tok.pos, format!("immediate {:#x} does not fit in 8 bits", v)));
                }
                Ok(Some(ParsedArg::Imm(v as u8)))
            }
            TokenKind::Immediate(ImmediateValue::LowByte(name)) => Ok(Some(match self.labels.get(&name) {
                Some(addr) => ParsedArg::Imm((addr & 0xff) as u8),
                None => ParsedArg::PendingLow(name),
            })),
            TokenKind::Immediate(ImmediateValue::HighByte(name)) => Ok(Some(match self.labels.get(&name) {
                Some(addr) => ParsedArg::Imm((addr >> 8) as u8),
                None => ParsedArg::PendingHigh(name),
            })),
            TokenKind::Label(name) => Ok(Some(match self.labels.get(&name) {
                Some(addr) => ParsedArg::Addr(*addr),
                None => ParsedArg::PendingAddr(name),
            })),
            TokenKind::Identifier(name) => match self.defines.get(&name).cloned() {
                Some(defined) => self.token_to_arg(defined),
                None => Err(AsmError::parse(tok.pos, format!("'{}' is not a register, immediate, address, or defined name", name))),
            },
            other => {
                self.push_back(Token { kind: other, pos: tok.pos });
                Ok(None)
            }
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<ParsedArg>, AsmError> {
        let mut args = Vec::new();
        loop {
            let tok = self.next_token();
            match self.token_to_arg(tok)? {
                Some(arg) => args.push(arg),
                None => break,
            }
            let sep = self.next_token();
            match sep.kind {
                TokenKind::Comma => continue,
                other => {
                    self.push_back(Token { kind: other, pos: sep.pos });
                    break;
                }
            }
        }
        Ok(args)
    }

    fn assemble_instruction(&mut self, mnemonic: Mnemonic, pos: SourcePos) -> Result<(), AsmError> {
        let args = self.parse_arguments()?;
        let kinds: Vec<ArgKind> = args.iter().map(ParsedArg::kind).collect();
        let mode = self.mode_trie.resolve(&kinds).ok_or_else(|| {
            AsmError::parse(pos.clone(), format!("'{}' has no addressing mode matching these {} argument(s)", mnemonic, args.len()))
        })?;
        let opcode = crate::isa::opcode_for(mnemonic, mode).ok_or_else(|| {
            let modes: Vec<String> = crate::isa::supported_modes(mnemonic).iter().map(|m| format!("{:?}", m)).collect();
            AsmError::parse(pos.clone(), format!("'{}' does not support this argument shape; supported modes: {}", mnemonic, modes.join(", ")))
        })?;

        let resolved: Vec<ResolvedArg> = args.iter().map(ParsedArg::placeholder_resolved).collect();
        let encoded = mode.encode(&resolved);

        let opcode_offset = self.cursor;
        let printable = format!("{} {}", mnemonic, args.iter().map(ParsedArg::printable).collect::<Vec<_>>().join(", "));
        self.debug_map.insert(opcode_offset, printable);

        self.emit_byte(opcode.to_byte());
        for byte in &encoded.bytes {
            self.emit_byte(*byte);
        }

        for arg in &args {
            match arg {
                ParsedArg::PendingAddr(name) => match self.labels.get(name) {
                    Some(addr) => self.patch_whole(opcode_offset, *addr),
                    None => self.fwd_whole.entry(name.clone()).or_default().push(opcode_offset),
                },
                ParsedArg::PendingLow(name) => self.fwd_lsb.entry(name.clone()).or_default().push(opcode_offset),
                ParsedArg::PendingHigh(name) => self.fwd_msb.entry(name.clone()).or_default().push(opcode_offset),
                _ => {}
            }
        }
        Ok(())
    }

    fn assemble_directive(&mut self, word: &str, pos: SourcePos) -> Result<(), AsmError> {
        match word {
            "addr" => {
                let addr = self.expect_number(0xffff)?;
                self.cursor = addr as u16;
                Ok(())
            }
            "byte" => {
                let values = self.directive_number_list(0xff)?;
                for v in values {
                    self.emit_byte(v as u8);
                }
                Ok(())
            }
            "word" => {
                let values = self.directive_number_list(0xffff)?;
                for v in values {
                    self.emit_byte((v & 0xff) as u8);
                    self.emit_byte((v >> 8) as u8);
                }
                Ok(())
            }
            "def" => {
                let name_tok = self.next_token();
                let name = match name_tok.kind {
                    TokenKind::Identifier(name) => name,
                    other => return Err(AsmError::parse(name_tok.pos, format!("expected a name after '.def', got {:?}", other))),
                };
                let bound = self.next_token();
                self.defines.insert(name, bound);
                Ok(())
            }
            other => Err(AsmError::parse(pos, format!("unknown directive '.{}'", other))),
        }
    }

    fn expect_number(&mut self, max: u32) -> Result<u32, AsmError> {
        let tok = self.next_token();
        match tok.kind {
            TokenKind::Immediate(ImmediateValue::Literal(v)) if v <= max => Ok(v),
            TokenKind::Immediate(ImmediateValue::Literal(v)) => {
                Err(AsmError::semantic(tok.pos, format!("value {:#x} exceeds this directive's range", v)))
            }
            TokenKind::Address(a) if u32::from(a) <= max => Ok(u32::from(a)),
            other => Err(AsmError::parse(tok.pos, format!("expected a number, got {:?}", other))),
        }
    }

    fn directive_number_list(&mut self, max: u32) -> Result<Vec<u32>, AsmError> {
        let mut values = vec![self.expect_number(max)?];
        loop {
            let tok = self.next_token();
            match tok.kind {
                TokenKind::Comma => values.push(self.expect_number(max)?),
                other => {
                    self.push_back(Token { kind: other, pos: tok.pos });
                    break;
                }
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_register_scenario() {
        let asm = Assembler::new(".addr 0x200\n@main\nmov $1, 0x2A\nhlt");
        let out = asm.assemble().expect("assembles");
        assert_eq!(out.start, 0x200);
        let op_mov = crate::isa::opcode_for(Mnemonic::Mov, Mode::AK).unwrap().to_byte();
        assert_eq!(out.image[0x200], op_mov);
        assert_eq!(out.image[0x201], 1);
        assert_eq!(out.image[0x202], 0x2a);
        let op_hlt = crate::isa::opcode_for(Mnemonic::Hlt, Mode::O).unwrap().to_byte();
        assert_eq!(out.image[0x203], op_hlt);
    }

    #[test]
    fn forward_label_patches_whole_address() {
        let asm = Assembler::new(".addr 0x200\n@main\njmp @end\n.byte 0xFF\n@end\nhlt");
        let out = asm.assemble().expect("assembles");
        let end = out.labels["end"];
        assert_eq!(out.image[0x201], (end & 0xff) as u8);
        assert_eq!(out.image[0x202], (end >> 8) as u8);
    }

    #[test]
    fn label_byte_references_resolve_forward_and_backward() {
        let asm = Assembler::new(".addr 0x200\npush @<end\npush @>end\n@end\nhlt");
        let out = asm.assemble().expect("assembles");
        let end = out.labels["end"];
        // push K is opcode(1) + imm(1); two pushes then hlt.
        assert_eq!(out.image[0x201], (end & 0xff) as u8);
        assert_eq!(out.image[0x203], (end >> 8) as u8);
    }

    #[test]
    fn underscore_labels_may_be_redefined() {
        let asm = Assembler::new("@_loop\nmov $0, $0\n@_loop\nhlt");
        let out = asm.assemble().expect("redefinition of _loop is allowed");
        assert_eq!(out.labels["_loop"], 2);
    }

    #[test]
    fn non_underscore_redefinition_is_a_semantic_error() {
        let asm = Assembler::new("@main\nhlt\n@main\nhlt");
        let err = asm.assemble().unwrap_err();
        assert!(matches!(err, AsmError::Semantic { .. }));
    }

    #[test]
    fn unresolved_label_at_end_of_input_is_an_error() {
        let asm = Assembler::new("jmp @nowhere");
        let err = asm.assemble().unwrap_err();
        assert!(matches!(err, AsmError::Semantic { .. }));
    }

    #[test]
    fn def_directive_substitutes_bound_token() {
        let asm = Assembler::new(".def ANSWER 0x2A\nmov $1, ANSWER");
        let out = asm.assemble().expect("assembles");
        assert_eq!(out.image[2], 0x2a);
    }

    #[test]
    fn unsupported_mode_reports_supported_modes() {
        let asm = Assembler::new("ret $1");
        let err = asm.assemble().unwrap_err();
        match err {
            AsmError::Parse { message, .. } => assert!(message.contains("supported modes")),
            other => panic!("expected a parse error, got {:?}", other),
        }
    }
}
