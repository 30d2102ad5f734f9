/// Every opcode mnemonic the lookup table can dispatch to, official and
/// unofficial alike. Unofficial opcodes are included because several test
/// ROMs (including nestest) exercise them; `Jam` is the only entry that
/// halts the CPU rather than executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub(crate) enum Mnemonic {
    // Load/store
    Lda,
    Ldx,
    Ldy,
    Sta,
    Stx,
    Sty,
    // Transfer
    Tax,
    Tay,
    Txa,
    Tya,
    Tsx,
    Txs,
    // Stack
    Pha,
    Php,
    Pla,
    Plp,
    // Logic
    And,
    Ora,
    Eor,
    Bit,
    // Arithmetic
    Adc,
    Sbc,
    Cmp,
    Cpx,
    Cpy,
    // Increment/decrement
    Inc,
    Inx,
    Iny,
    Dec,
    Dex,
    Dey,
    // Shifts/rotates
    Asl,
    Lsr,
    Rol,
    Ror,
    // Control flow
    Jmp,
    Jsr,
    Rts,
    Rti,
    Brk,
    // Branches
    Bcc,
    Bcs,
    Beq,
    Bmi,
    Bne,
    Bpl,
    Bvc,
    Bvs,
    // Flags
    Clc,
    Cld,
    Cli,
    Clv,
    Sec,
    Sed,
    Sei,
    Nop,
    // Unofficial
    Lax,
    Sax,
    Dcp,
    Isc,
    Slo,
    Rla,
    Sre,
    Rra,
    Anc,
    Alr,
    Arr,
    Xaa,
    Axs,
    Shx,
    Shy,
    Sha,
    Tas,
    Las,
    /// Halts the CPU; not executed by any test ROM this core targets.
    Jam,
}
