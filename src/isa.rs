// The instruction set shared between the assembler's encoder and the VM's
// decoder. Keeping both sides against one table is what keeps them honest
// with each other: the VM's byte encoding *is* the assembler's output
// format, so there is exactly one place that says what an opcode
// byte means.

use std::fmt;

/// The four argument kinds the lexer can produce in an operand position.
/// The ordered sequence of these for an instruction's argument list is what
/// the mode resolver keys on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Reg,
    Imm,
    Addr,
    Ind,
}

/// One resolved operand, after the parser has turned a token into a value
/// ready for encoding (labels already looked up or queued for patching).
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ResolvedArg {
    Reg(u8),
    Imm(u8),
    Addr(u16),
    Ind(u8),
}

/// An addressing mode: the shape of an instruction's operand list.
/// Variant names spell out the argument-kind sequence they cover.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Mode {
    O,
    A,
    K,
    P,
    AB,
    AK,
    AP,
    KA,
    KK,
    PA,
    PK,
    ABC,
    ABK,
    APB,
    APK,
    AIB,
    AIK,
    PAB,
    PAK,
}

/// All modes recognised by the resolver, in no particular order. Missing
/// sequences are "no such mode".
pub const ALL_MODES: &[Mode] = &[
    Mode::O,
    Mode::A,
    Mode::K,
    Mode::P,
    Mode::AB,
    Mode::AK,
    Mode::AP,
    Mode::KA,
    Mode::KK,
    Mode::PA,
    Mode::PK,
    Mode::ABC,
    Mode::ABK,
    Mode::APB,
    Mode::APK,
    Mode::AIB,
    Mode::AIK,
    Mode::PAB,
    Mode::PAK,
];

impl Mode {
    pub fn arg_kinds(&self) -> &'static [ArgKind] {
        use ArgKind::*;
        match self {
            Mode::O => &[],
            Mode::A => &[Reg],
            Mode::K => &[Imm],
            Mode::P => &[Addr],
            Mode::AB => &[Reg, Reg],
            Mode::AK => &[Reg, Imm],
            Mode::AP => &[Reg, Addr],
            Mode::KA => &[Imm, Reg],
            Mode::KK => &[Imm, Imm],
            Mode::PA => &[Addr, Reg],
            Mode::PK => &[Addr, Imm],
            Mode::ABC => &[Reg, Reg, Reg],
            Mode::ABK => &[Reg, Reg, Imm],
            Mode::APB => &[Reg, Addr, Reg],
            Mode::APK => &[Reg, Addr, Imm],
            Mode::AIB => &[Reg, Ind, Reg],
            Mode::AIK => &[Reg, Ind, Imm],
            Mode::PAB => &[Addr, Reg, Reg],
            Mode::PAK => &[Addr, Reg, Imm],
        }
    }

    /// Number of operand bytes following the opcode byte.
    pub fn operand_len(&self) -> usize {
        match self {
            Mode::O => 0,
            Mode::A | Mode::K => 1,
            Mode::P => 2,
            Mode::AB | Mode::AK | Mode::KA | Mode::KK => 2,
            Mode::AP | Mode::PA | Mode::PK => 3,
            Mode::ABC | Mode::ABK => 2,
            Mode::APB | Mode::PAB => 3,
            Mode::APK | Mode::PAK => 4,
            Mode::AIB => 2,
            Mode::AIK => 3,
        }
    }

    /// Where the two little-endian address bytes land, relative to the
    /// first operand byte — fixed per mode, independent of operand values.
    /// This is what lets back-patching recover byte position from nothing
    /// but the opcode byte already sitting in the image.
    pub fn addr_offset(&self) -> Option<usize> {
        match self {
            Mode::P | Mode::PA | Mode::PK | Mode::APB | Mode::PAB | Mode::APK | Mode::PAK => Some(0),
            Mode::AP => Some(1),
            _ => None,
        }
    }

    /// Where the single deferred-label-byte immediate lands, relative to the
    /// first operand byte. `KK`'s two immediates are never both label-byte
    /// references in this instruction set, so a single offset suffices.
    pub fn imm_offset(&self) -> Option<usize> {
        match self {
            Mode::K => Some(0),
            Mode::AK => Some(1),
            Mode::KA => Some(0),
            Mode::PK => Some(2),
            Mode::ABK => Some(1),
            Mode::APK | Mode::PAK => Some(3),
            Mode::AIK => Some(2),
            _ => None,
        }
    }

    /// Encodes operands (already in this mode's textual argument order) into
    /// the operand bytes that follow the opcode, per this mode's fixed byte
    /// layout. Also reports where the patchable bytes live, relative to the start of the
    /// operand bytes, for the assembler's forward-reference back-patching.
    pub fn encode(&self, args: &[ResolvedArg]) -> EncodedOperands {
        let reg = |a: ResolvedArg| match a {
            ResolvedArg::Reg(r) => r & 0xf,
            _ => panic!("encode: expected register operand"),
        };
        let imm = |a: ResolvedArg| match a {
            ResolvedArg::Imm(k) => k,
            _ => panic!("encode: expected immediate operand"),
        };
        let addr = |a: ResolvedArg| match a {
            ResolvedArg::Addr(p) => p,
            _ => panic!("encode: expected address operand"),
        };
        let ind = |a: ResolvedArg| match a {
            ResolvedArg::Ind(i) => i,
            _ => panic!("encode: expected indirect operand"),
        };
        let addr_bytes = |p: u16| [(p & 0xff) as u8, (p >> 8) as u8];
        let nibble_pair = |a: u8, b: u8| (a & 0xf) | ((b & 0xf) << 4);

        match self {
            Mode::O => EncodedOperands::new(vec![]),
            Mode::A => EncodedOperands::new(vec![reg(args[0])]),
            Mode::K => EncodedOperands::new(vec![imm(args[0])]),
            Mode::P => {
                let [lo, hi] = addr_bytes(addr(args[0]));
                EncodedOperands::new(vec![lo, hi]).with_addr(0)
            }
            Mode::AB => EncodedOperands::new(vec![nibble_pair(reg(args[0]), reg(args[1]))]),
            Mode::AK => EncodedOperands::new(vec![reg(args[0]), imm(args[1])]).with_imm(1),
            Mode::KA => EncodedOperands::new(vec![imm(args[0]), reg(args[1])]).with_imm(0),
            Mode::KK => EncodedOperands::new(vec![imm(args[0]), imm(args[1])]).with_imms(vec![0, 1]),
            Mode::AP => {
                let [lo, hi] = addr_bytes(addr(args[1]));
                EncodedOperands::new(vec![reg(args[0]), lo, hi]).with_addr(1)
            }
            Mode::PA => {
                let [lo, hi] = addr_bytes(addr(args[0]));
                EncodedOperands::new(vec![lo, hi, reg(args[1])]).with_addr(0)
            }
            Mode::PK => {
                let [lo, hi] = addr_bytes(addr(args[0]));
                EncodedOperands::new(vec![lo, hi, imm(args[1])]).with_addr(0).with_imm(2)
            }
            Mode::ABC => EncodedOperands::new(vec![nibble_pair(reg(args[0]), reg(args[1])), reg(args[2])]),
            Mode::ABK => EncodedOperands::new(vec![nibble_pair(reg(args[0]), reg(args[1])), imm(args[2])]).with_imm(1),
            // APB reorders at emission: address first, then the AB nibble byte.
            Mode::APB => {
                let [lo, hi] = addr_bytes(addr(args[1]));
                EncodedOperands::new(vec![lo, hi, nibble_pair(reg(args[0]), reg(args[2]))]).with_addr(0)
            }
            Mode::PAB => {
                let [lo, hi] = addr_bytes(addr(args[0]));
                EncodedOperands::new(vec![lo, hi, nibble_pair(reg(args[1]), reg(args[2]))]).with_addr(0)
            }
            Mode::APK => {
                let [lo, hi] = addr_bytes(addr(args[1]));
                EncodedOperands::new(vec![lo, hi, reg(args[0]), imm(args[2])]).with_addr(0).with_imm(3)
            }
            Mode::PAK => {
                let [lo, hi] = addr_bytes(addr(args[0]));
                EncodedOperands::new(vec![lo, hi, reg(args[1]), imm(args[2])]).with_addr(0).with_imm(3)
            }
            // AIB is an ABK byte layout with the indirect byte in the K slot.
            Mode::AIB => EncodedOperands::new(vec![nibble_pair(reg(args[0]), reg(args[2])), ind(args[1])]),
            Mode::AIK => EncodedOperands::new(vec![reg(args[0]), ind(args[1]), imm(args[2])]).with_imm(2),
        }
    }
}

/// Operand bytes for one instruction, plus the offsets (relative to the
/// first operand byte) where label back-patching must land, if any.
#[derive(Debug, Clone)]
pub struct EncodedOperands {
    pub bytes: Vec<u8>,
    pub addr_offset: Option<usize>,
    pub imm_offsets: Vec<usize>,
}

impl EncodedOperands {
    fn new(bytes: Vec<u8>) -> Self {
        EncodedOperands { bytes, addr_offset: None, imm_offsets: Vec::new() }
    }
    fn with_addr(mut self, offset: usize) -> Self {
        self.addr_offset = Some(offset);
        self
    }
    fn with_imm(mut self, offset: usize) -> Self {
        self.imm_offsets.push(offset);
        self
    }
    fn with_imms(mut self, offsets: Vec<usize>) -> Self {
        self.imm_offsets = offsets;
        self
    }
}

/// The twenty-four mnemonics FRAME assembly understands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Hlt,
    Mov,
    Jmp,
    Brt,
    Brf,
    Equ,
    Lss,
    And,
    Or,
    Xor,
    Not,
    Lsh,
    Rsh,
    Rol,
    Ror,
    Add,
    Inc,
    Dec,
    Call,
    Ret,
    Push,
    Pop,
    Sei,
    Chy,
}

impl Mnemonic {
    pub fn from_str(s: &str) -> Option<Mnemonic> {
        use Mnemonic::*;
        Some(match s {
            "hlt" => Hlt,
            "mov" => Mov,
            "jmp" => Jmp,
            "brt" => Brt,
            "brf" => Brf,
            "equ" => Equ,
            "lss" => Lss,
            "and" => And,
            "or" => Or,
            "xor" => Xor,
            "not" => Not,
            "lsh" => Lsh,
            "rsh" => Rsh,
            "rol" => Rol,
            "ror" => Ror,
            "add" => Add,
            "inc" => Inc,
            "dec" => Dec,
            "call" => Call,
            "ret" => Ret,
            "push" => Push,
            "pop" => Pop,
            "sei" => Sei,
            "chy" => Chy,
            _ => return None,
        })
    }
    pub fn as_str(&self) -> &'static str {
        use Mnemonic::*;
        match self {
            Hlt => "hlt",
            Mov => "mov",
            Jmp => "jmp",
            Brt => "brt",
            Brf => "brf",
            Equ => "equ",
            Lss => "lss",
            And => "and",
            Or => "or",
            Xor => "xor",
            Not => "not",
            Lsh => "lsh",
            Rsh => "rsh",
            Rol => "rol",
            Ror => "ror",
            Add => "add",
            Inc => "inc",
            Dec => "dec",
            Call => "call",
            Ret => "ret",
            Push => "push",
            Pop => "pop",
            Sei => "sei",
            Chy => "chy",
        }
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A dense, internally-consistent enumeration of (mnemonic, mode) pairs.
/// Exact numeric values carry no meaning outside this crate; what
/// matters is that the encoder and decoder agree, which `OPCODE_TABLE`
/// guarantees by construction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    HltO,
    HltA,
    HltK,
    MovAK,
    MovAP,
    MovPA,
    MovPK,
    MovAB,
    MovAPB,
    MovPAB,
    MovAPK,
    MovPAK,
    MovAIB,
    MovAIK,
    JmpP,
    JmpPA,
    JmpPK,
    BrtP,
    BrtPA,
    BrtPK,
    BrfP,
    BrfPA,
    BrfPK,
    EquAB,
    EquAK,
    LssAB,
    LssAK,
    AndAB,
    AndAK,
    OrAB,
    OrAK,
    XorAB,
    XorAK,
    NotO,
    NotA,
    LshA,
    RshA,
    RolA,
    RorA,
    AddAB,
    AddAK,
    IncA,
    DecA,
    CallP,
    RetO,
    PushA,
    PushK,
    PopA,
    PopO,
    SeiO,
    SeiA,
    SeiK,
    ChyO,
}

pub const OPCODE_COUNT: usize = 53;

impl Opcode {
    pub fn to_byte(self) -> u8 {
        self as u8
    }
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        OPCODE_TABLE.iter().find(|e| e.opcode.to_byte() == byte).map(|e| e.opcode)
    }
    pub fn mnemonic(self) -> Mnemonic {
        OPCODE_TABLE.iter().find(|e| e.opcode == self).unwrap().mnemonic
    }
    pub fn mode(self) -> Mode {
        OPCODE_TABLE.iter().find(|e| e.opcode == self).unwrap().mode
    }
}

pub struct OpcodeEntry {
    pub mnemonic: Mnemonic,
    pub mode: Mode,
    pub opcode: Opcode,
}

macro_rules! opcode_table {
    ($(($mnemonic:ident, $mode:ident, $opcode:ident)),* $(,)?) => {
        &[$(OpcodeEntry { mnemonic: Mnemonic::$mnemonic, mode: Mode::$mode, opcode: Opcode::$opcode }),*]
    };
}

/// The single source of truth mapping (mnemonic, mode) to opcode byte, and
/// back. The assembler's encoder walks it forwards; back-patching and the
/// VM's decoder walk it backwards from the opcode byte.
pub static OPCODE_TABLE: &[OpcodeEntry] = opcode_table![
    (Hlt, O, HltO),
    (Hlt, A, HltA),
    (Hlt, K, HltK),
    (Mov, AK, MovAK),
    (Mov, AP, MovAP),
    (Mov, PA, MovPA),
    (Mov, PK, MovPK),
    (Mov, AB, MovAB),
    (Mov, APB, MovAPB),
    (Mov, PAB, MovPAB),
    (Mov, APK, MovAPK),
    (Mov, PAK, MovPAK),
    (Mov, AIB, MovAIB),
    (Mov, AIK, MovAIK),
    (Jmp, P, JmpP),
    (Jmp, PA, JmpPA),
    (Jmp, PK, JmpPK),
    (Brt, P, BrtP),
    (Brt, PA, BrtPA),
    (Brt, PK, BrtPK),
    (Brf, P, BrfP),
    (Brf, PA, BrfPA),
    (Brf, PK, BrfPK),
    (Equ, AB, EquAB),
    (Equ, AK, EquAK),
    (Lss, AB, LssAB),
    (Lss, AK, LssAK),
    (And, AB, AndAB),
    (And, AK, AndAK),
    (Or, AB, OrAB),
    (Or, AK, OrAK),
    (Xor, AB, XorAB),
    (Xor, AK, XorAK),
    (Not, O, NotO),
    (Not, A, NotA),
    (Lsh, A, LshA),
    (Rsh, A, RshA),
    (Rol, A, RolA),
    (Ror, A, RorA),
    (Add, AB, AddAB),
    (Add, AK, AddAK),
    (Inc, A, IncA),
    (Dec, A, DecA),
    (Call, P, CallP),
    (Ret, O, RetO),
    (Push, A, PushA),
    (Push, K, PushK),
    (Pop, A, PopA),
    (Pop, O, PopO),
    (Sei, O, SeiO),
    (Sei, A, SeiA),
    (Sei, K, SeiK),
    (Chy, O, ChyO),
];

/// Every mode a mnemonic supports, in table order — used to build the "did
/// you mean one of these" message when a mnemonic is used with an
/// unsupported mode.
pub fn supported_modes(mnemonic: Mnemonic) -> Vec<Mode> {
    OPCODE_TABLE.iter().filter(|e| e.mnemonic == mnemonic).map(|e| e.mode).collect()
}

pub fn opcode_for(mnemonic: Mnemonic, mode: Mode) -> Option<Opcode> {
    OPCODE_TABLE.iter().find(|e| e.mnemonic == mnemonic && e.mode == mode).map(|e| e.opcode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_bytes_are_dense_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for entry in OPCODE_TABLE {
            assert!(seen.insert(entry.opcode.to_byte()), "duplicate opcode byte");
        }
        assert_eq!(OPCODE_TABLE.len(), OPCODE_COUNT);
    }

    #[test]
    fn mode_round_trips_through_opcode_byte() {
        for entry in OPCODE_TABLE {
            let byte = entry.opcode.to_byte();
            let opcode = Opcode::from_byte(byte).expect("byte decodes");
            assert_eq!(opcode.mode(), entry.mode);
            assert_eq!(opcode.mnemonic(), entry.mnemonic);
        }
    }

    #[test]
    fn ab_mode_packs_registers_into_nibbles() {
        let enc = Mode::AB.encode(&[ResolvedArg::Reg(1), ResolvedArg::Reg(2)]);
        assert_eq!(enc.bytes, vec![0x21]);
    }

    #[test]
    fn apb_reorders_to_address_then_nibble_pair() {
        let enc = Mode::APB.encode(&[ResolvedArg::Reg(3), ResolvedArg::Addr(0x1234), ResolvedArg::Reg(5)]);
        assert_eq!(enc.bytes, vec![0x34, 0x12, 0x53]);
        assert_eq!(enc.addr_offset, Some(0));
    }

    #[test]
    fn aik_lays_out_register_indirect_then_immediate() {
        let enc = Mode::AIK.encode(&[ResolvedArg::Reg(2), ResolvedArg::Ind(0x10), ResolvedArg::Imm(5)]);
        assert_eq!(enc.bytes, vec![0x02, 0x10, 0x05]);
        assert_eq!(enc.imm_offsets, vec![2]);
    }
}
