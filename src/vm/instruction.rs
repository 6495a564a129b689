// Decoded instructions. One variant per (mnemonic, mode) pair in
// `crate::isa::Opcode`, each carrying its operands already read out of
// memory — the dense tagged enumeration the design notes ask for,
// replacing the source's closure-table dispatch.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    HltO,
    HltA { a: u8 },
    HltK { k: u8 },
    MovAK { a: u8, k: u8 },
    MovAP { a: u8, p: u16 },
    MovPA { p: u16, a: u8 },
    MovPK { p: u16, k: u8 },
    MovAB { a: u8, b: u8 },
    MovAPB { a: u8, p: u16, b: u8 },
    MovPAB { p: u16, a: u8, b: u8 },
    MovAPK { a: u8, p: u16, k: u8 },
    MovPAK { p: u16, a: u8, k: u8 },
    MovAIB { a: u8, i: u8, b: u8 },
    MovAIK { a: u8, i: u8, k: u8 },
    JmpP { p: u16 },
    JmpPA { p: u16, a: u8 },
    JmpPK { p: u16, k: u8 },
    BrtP { p: u16 },
    BrtPA { p: u16, a: u8 },
    BrtPK { p: u16, k: u8 },
    BrfP { p: u16 },
    BrfPA { p: u16, a: u8 },
    BrfPK { p: u16, k: u8 },
    EquAB { a: u8, b: u8 },
    EquAK { a: u8, k: u8 },
    LssAB { a: u8, b: u8 },
    LssAK { a: u8, k: u8 },
    AndAB { a: u8, b: u8 },
    AndAK { a: u8, k: u8 },
    OrAB { a: u8, b: u8 },
    OrAK { a: u8, k: u8 },
    XorAB { a: u8, b: u8 },
    XorAK { a: u8, k: u8 },
    NotO,
    NotA { a: u8 },
    LshA { a: u8 },
    RshA { a: u8 },
    RolA { a: u8 },
    RorA { a: u8 },
    AddAB { a: u8, b: u8 },
    AddAK { a: u8, k: u8 },
    IncA { a: u8 },
    DecA { a: u8 },
    CallP { p: u16 },
    RetO,
    PushA { a: u8 },
    PushK { k: u8 },
    PopA { a: u8 },
    PopO,
    SeiO,
    SeiA { a: u8 },
    SeiK { k: u8 },
    ChyO,
}
