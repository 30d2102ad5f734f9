use super::addressing::Addressing;
use super::mnemonic::Mnemonic;

/// Base cycle cost of an opcode, and how page-crossing / branch-taken
/// penalties apply to it. Mirrors the published 6502 cycle table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Cycle {
    /// Fixed cost regardless of addressing outcome.
    Fixed(u8),
    /// Read-style indexed addressing: +1 if the effective address crosses a
    /// page boundary.
    PageCross(u8),
    /// Branch instructions: +1 if taken, +1 more if the branch also crosses
    /// a page.
    Branch(u8),
}

impl Cycle {
    pub(crate) const fn base(self) -> u8 {
        match self {
            Cycle::Fixed(c) | Cycle::PageCross(c) | Cycle::Branch(c) => c,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Instruction {
    pub(crate) mnemonic: Mnemonic,
    pub(crate) addressing: Addressing,
    pub(crate) cycle: Cycle,
}

const fn f(cycle: u8) -> Cycle {
    Cycle::Fixed(cycle)
}
const fn p(cycle: u8) -> Cycle {
    Cycle::PageCross(cycle)
}
const fn b(cycle: u8) -> Cycle {
    Cycle::Branch(cycle)
}

macro_rules! op {
    ($mnemonic:ident, $addr:ident, $cycle:expr) => {
        Instruction {
            mnemonic: Mnemonic::$mnemonic,
            addressing: Addressing::$addr,
            cycle: $cycle,
        }
    };
}

use Addressing::Absolute as ABS;
use Addressing::AbsoluteX as ABX;
use Addressing::AbsoluteY as ABY;
use Addressing::Accumulator as ACC;
use Addressing::Immediate as IMM;
use Addressing::Implied as IMP;
use Addressing::IndexedIndirect as INX;
use Addressing::Indirect as IND;
use Addressing::IndirectIndexed as INY;
use Addressing::Relative as REL;
use Addressing::ZeroPage as ZP;
use Addressing::ZeroPageX as ZPX;
use Addressing::ZeroPageY as ZPY;

/// 256-entry decode table indexed by opcode byte: a `(Mnemonic, Addressing,
/// Cycle)` triple per slot, in place of a raw-byte switch over the opcode.
#[rustfmt::skip]
pub(crate) static LOOKUP_TABLE: [Instruction; 256] = [
    op!(Brk, IMP, f(7)), op!(Ora, INX, f(6)), op!(Jam, IMP, f(0)), op!(Slo, INX, f(8)), op!(Nop, ZP,  f(3)), op!(Ora, ZP,  f(3)), op!(Asl, ZP,  f(5)), op!(Slo, ZP,  f(5)), op!(Php, IMP, f(3)), op!(Ora, IMM, f(2)), op!(Asl, ACC, f(2)), op!(Anc, IMM, f(2)), op!(Nop, ABS, f(4)), op!(Ora, ABS, f(4)), op!(Asl, ABS, f(6)), op!(Slo, ABS, f(6)),
    op!(Bpl, REL, b(2)), op!(Ora, INY, p(5)), op!(Jam, IMP, f(0)), op!(Slo, INY, f(8)), op!(Nop, ZPX, f(4)), op!(Ora, ZPX, f(4)), op!(Asl, ZPX, f(6)), op!(Slo, ZPX, f(6)), op!(Clc, IMP, f(2)), op!(Ora, ABY, p(4)), op!(Nop, IMP, f(2)), op!(Slo, ABY, f(7)), op!(Nop, ABX, p(4)), op!(Ora, ABX, p(4)), op!(Asl, ABX, f(7)), op!(Slo, ABX, f(7)),
    op!(Jsr, ABS, f(6)), op!(And, INX, f(6)), op!(Jam, IMP, f(0)), op!(Rla, INX, f(8)), op!(Bit, ZP,  f(3)), op!(And, ZP,  f(3)), op!(Rol, ZP,  f(5)), op!(Rla, ZP,  f(5)), op!(Plp, IMP, f(4)), op!(And, IMM, f(2)), op!(Rol, ACC, f(2)), op!(Anc, IMM, f(2)), op!(Bit, ABS, f(4)), op!(And, ABS, f(4)), op!(Rol, ABS, f(6)), op!(Rla, ABS, f(6)),
    op!(Bmi, REL, b(2)), op!(And, INY, p(5)), op!(Jam, IMP, f(0)), op!(Rla, INY, f(8)), op!(Nop, ZPX, f(4)), op!(And, ZPX, f(4)), op!(Rol, ZPX, f(6)), op!(Rla, ZPX, f(6)), op!(Sec, IMP, f(2)), op!(And, ABY, p(4)), op!(Nop, IMP, f(2)), op!(Rla, ABY, f(7)), op!(Nop, ABX, p(4)), op!(And, ABX, p(4)), op!(Rol, ABX, f(7)), op!(Rla, ABX, f(7)),
    op!(Rti, IMP, f(6)), op!(Eor, INX, f(6)), op!(Jam, IMP, f(0)), op!(Sre, INX, f(8)), op!(Nop, ZP,  f(3)), op!(Eor, ZP,  f(3)), op!(Lsr, ZP,  f(5)), op!(Sre, ZP,  f(5)), op!(Pha, IMP, f(3)), op!(Eor, IMM, f(2)), op!(Lsr, ACC, f(2)), op!(Alr, IMM, f(2)), op!(Jmp, ABS, f(3)), op!(Eor, ABS, f(4)), op!(Lsr, ABS, f(6)), op!(Sre, ABS, f(6)),
    op!(Bvc, REL, b(2)), op!(Eor, INY, p(5)), op!(Jam, IMP, f(0)), op!(Sre, INY, f(8)), op!(Nop, ZPX, f(4)), op!(Eor, ZPX, f(4)), op!(Lsr, ZPX, f(6)), op!(Sre, ZPX, f(6)), op!(Cli, IMP, f(2)), op!(Eor, ABY, p(4)), op!(Nop, IMP, f(2)), op!(Sre, ABY, f(7)), op!(Nop, ABX, p(4)), op!(Eor, ABX, p(4)), op!(Lsr, ABX, f(7)), op!(Sre, ABX, f(7)),
    op!(Rts, IMP, f(6)), op!(Adc, INX, f(6)), op!(Jam, IMP, f(0)), op!(Rra, INX, f(8)), op!(Nop, ZP,  f(3)), op!(Adc, ZP,  f(3)), op!(Ror, ZP,  f(5)), op!(Rra, ZP,  f(5)), op!(Pla, IMP, f(4)), op!(Adc, IMM, f(2)), op!(Ror, ACC, f(2)), op!(Arr, IMM, f(2)), op!(Jmp, IND, f(5)), op!(Adc, ABS, f(4)), op!(Ror, ABS, f(6)), op!(Rra, ABS, f(6)),
    op!(Bvs, REL, b(2)), op!(Adc, INY, p(5)), op!(Jam, IMP, f(0)), op!(Rra, INY, f(8)), op!(Nop, ZPX, f(4)), op!(Adc, ZPX, f(4)), op!(Ror, ZPX, f(6)), op!(Rra, ZPX, f(6)), op!(Sei, IMP, f(2)), op!(Adc, ABY, p(4)), op!(Nop, IMP, f(2)), op!(Rra, ABY, f(7)), op!(Nop, ABX, p(4)), op!(Adc, ABX, p(4)), op!(Ror, ABX, f(7)), op!(Rra, ABX, f(7)),
    op!(Nop, IMM, f(2)), op!(Sta, INX, f(6)), op!(Nop, IMM, f(2)), op!(Sax, INX, f(6)), op!(Sty, ZP,  f(3)), op!(Sta, ZP,  f(3)), op!(Stx, ZP,  f(3)), op!(Sax, ZP,  f(3)), op!(Dey, IMP, f(2)), op!(Nop, IMM, f(2)), op!(Txa, IMP, f(2)), op!(Xaa, IMM, f(2)), op!(Sty, ABS, f(4)), op!(Sta, ABS, f(4)), op!(Stx, ABS, f(4)), op!(Sax, ABS, f(4)),
    op!(Bcc, REL, b(2)), op!(Sta, INY, f(6)), op!(Jam, IMP, f(0)), op!(Sha, INY, f(6)), op!(Sty, ZPX, f(4)), op!(Sta, ZPX, f(4)), op!(Stx, ZPY, f(4)), op!(Sax, ZPY, f(4)), op!(Tya, IMP, f(2)), op!(Sta, ABY, f(5)), op!(Txs, IMP, f(2)), op!(Tas, ABY, f(5)), op!(Shy, ABX, f(5)), op!(Sta, ABX, f(5)), op!(Shx, ABY, f(5)), op!(Sha, ABY, f(5)),
    op!(Ldy, IMM, f(2)), op!(Lda, INX, f(6)), op!(Ldx, IMM, f(2)), op!(Lax, INX, f(6)), op!(Ldy, ZP,  f(3)), op!(Lda, ZP,  f(3)), op!(Ldx, ZP,  f(3)), op!(Lax, ZP,  f(3)), op!(Tay, IMP, f(2)), op!(Lda, IMM, f(2)), op!(Tax, IMP, f(2)), op!(Lax, IMM, f(2)), op!(Ldy, ABS, f(4)), op!(Lda, ABS, f(4)), op!(Ldx, ABS, f(4)), op!(Lax, ABS, f(4)),
    op!(Bcs, REL, b(2)), op!(Lda, INY, p(5)), op!(Jam, IMP, f(0)), op!(Lax, INY, p(5)), op!(Ldy, ZPX, f(4)), op!(Lda, ZPX, f(4)), op!(Ldx, ZPY, f(4)), op!(Lax, ZPY, f(4)), op!(Clv, IMP, f(2)), op!(Lda, ABY, p(4)), op!(Tsx, IMP, f(2)), op!(Las, ABY, p(4)), op!(Ldy, ABX, p(4)), op!(Lda, ABX, p(4)), op!(Ldx, ABY, p(4)), op!(Lax, ABY, p(4)),
    op!(Cpy, IMM, f(2)), op!(Cmp, INX, f(6)), op!(Nop, IMM, f(2)), op!(Dcp, INX, f(8)), op!(Cpy, ZP,  f(3)), op!(Cmp, ZP,  f(3)), op!(Dec, ZP,  f(5)), op!(Dcp, ZP,  f(5)), op!(Iny, IMP, f(2)), op!(Cmp, IMM, f(2)), op!(Dex, IMP, f(2)), op!(Axs, IMM, f(2)), op!(Cpy, ABS, f(4)), op!(Cmp, ABS, f(4)), op!(Dec, ABS, f(6)), op!(Dcp, ABS, f(6)),
    op!(Bne, REL, b(2)), op!(Cmp, INY, p(5)), op!(Jam, IMP, f(0)), op!(Dcp, INY, f(8)), op!(Nop, ZPX, f(4)), op!(Cmp, ZPX, f(4)), op!(Dec, ZPX, f(6)), op!(Dcp, ZPX, f(6)), op!(Cld, IMP, f(2)), op!(Cmp, ABY, p(4)), op!(Nop, IMP, f(2)), op!(Dcp, ABY, f(7)), op!(Nop, ABX, p(4)), op!(Cmp, ABX, p(4)), op!(Dec, ABX, f(7)), op!(Dcp, ABX, f(7)),
    op!(Cpx, IMM, f(2)), op!(Sbc, INX, f(6)), op!(Nop, IMM, f(2)), op!(Isc, INX, f(8)), op!(Cpx, ZP,  f(3)), op!(Sbc, ZP,  f(3)), op!(Inc, ZP,  f(5)), op!(Isc, ZP,  f(5)), op!(Inx, IMP, f(2)), op!(Sbc, IMM, f(2)), op!(Nop, IMP, f(2)), op!(Sbc, IMM, f(2)), op!(Cpx, ABS, f(4)), op!(Sbc, ABS, f(4)), op!(Inc, ABS, f(6)), op!(Isc, ABS, f(6)),
    op!(Beq, REL, b(2)), op!(Sbc, INY, p(5)), op!(Jam, IMP, f(0)), op!(Isc, INY, f(8)), op!(Nop, ZPX, f(4)), op!(Sbc, ZPX, f(4)), op!(Inc, ZPX, f(6)), op!(Isc, ZPX, f(6)), op!(Sed, IMP, f(2)), op!(Sbc, ABY, p(4)), op!(Nop, IMP, f(2)), op!(Isc, ABY, f(7)), op!(Nop, ABX, p(4)), op!(Sbc, ABX, p(4)), op!(Inc, ABX, f(7)), op!(Isc, ABX, f(7)),
];
