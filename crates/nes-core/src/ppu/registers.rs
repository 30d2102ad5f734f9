//! CPU-visible PPU register state and internal VRAM address latches.

mod control;
mod mask;
mod status;
mod vram_addr;

pub(crate) use control::Control;
pub(crate) use mask::Mask;
pub(crate) use status::Status;
pub(crate) use vram_addr::VramAddr;

use crate::mem_block::ppu::OamRam;

/// The PPU's internal scroll/address latches: `v` (current VRAM address),
/// `t` (temporary VRAM address), `x` (fine-X scroll), and `w` (the
/// write-toggle shared by `$2005`/`$2006`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct Scroll {
    pub(crate) v: VramAddr,
    pub(crate) t: VramAddr,
    pub(crate) x: u8,
    pub(crate) w: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Registers {
    /// Mirror of the control register (`$2000`).
    pub(crate) control: Control,
    /// Mirror of the mask register (`$2001`).
    pub(crate) mask: Mask,
    /// Status register (`$2002`).
    pub(crate) status: Status,
    /// Current OAM pointer driven by `$2003`/`$2004`.
    pub(crate) oam_addr: u8,
    /// Primary sprite memory accessible through `$2004`.
    pub(crate) oam: OamRam,
    /// Internal VRAM latches (`v`/`t`/`x`/`w`).
    pub(crate) scroll: Scroll,
    /// Internal buffer implementing the delayed `$2007` read behavior.
    pub(crate) read_buffer: u8,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    /// Creates a new register block with the power-on reset state.
    pub(crate) fn new() -> Self {
        Self {
            control: Control::default(),
            mask: Mask::default(),
            status: Status::default(),
            oam_addr: 0,
            oam: OamRam::new(),
            scroll: Scroll::default(),
            read_buffer: 0,
        }
    }

    /// Restores all register values to their reset defaults, preserving OAM
    /// (power-on leaves sprite memory in an indeterminate but not
    /// necessarily zeroed state; a soft reset does not clear it).
    pub(crate) fn reset(&mut self) {
        let oam = self.oam;
        *self = Registers::new();
        self.oam = oam;
    }

    /// Updates control, also syncing the nametable bits into `t` per NES spec.
    pub(crate) fn write_control(&mut self, value: u8) {
        self.control = Control::from_bits_retain(value);
        self.scroll.t.set_nametable(self.control.nametable_index());
    }
}
