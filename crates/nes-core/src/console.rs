//! Top-level driver tying the CPU and bus (and, through it, the PPU)
//! together into a single steppable unit.

use crate::backend::PpuBackend;
use crate::bus::{Bus, NesBus};
use crate::cartridge::Cartridge;
use crate::controller::ControllerBackend;
use crate::cpu::Cpu;
use crate::Error;

/// Owns a CPU and its bus, and drives both forward one CPU instruction at a
/// time. NMI delivery is edge-detected here rather than inside the bus: the
/// PPU's NMI line is sampled once per [`Console::step`], before the next
/// instruction fetch, so a register write that raises the line mid-instruction
/// is only observed on the following step.
pub struct Console {
    cpu: Cpu,
    bus: NesBus,
    prev_nmi_line: bool,
}

impl Console {
    /// Builds a console around `cartridge`, resetting the CPU from its
    /// reset vector.
    pub fn new(cartridge: Box<dyn Cartridge>) -> Self {
        let mut bus = NesBus::new(cartridge);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        Self {
            cpu,
            bus,
            prev_nmi_line: false,
        }
    }

    /// Swaps in a new cartridge and resets the CPU, as if the console had
    /// just been power-cycled with a different cartridge inserted.
    pub fn insert_cartridge(&mut self, cartridge: Box<dyn Cartridge>) {
        self.bus.replace_cartridge(cartridge);
        self.cpu.reset(&mut self.bus);
        self.prev_nmi_line = false;
    }

    pub fn add_ppu_backend(&mut self, backend: Box<dyn PpuBackend>) {
        self.bus.add_ppu_backend(backend);
    }

    pub fn add_controller_backend(&mut self, backend: Box<dyn ControllerBackend>) {
        self.bus.add_controller_backend(backend);
    }

    pub fn cartridge(&self) -> &dyn Cartridge {
        self.bus.cartridge()
    }

    /// Overrides `PC` directly, bypassing the reset vector (nestest-style
    /// test harnesses force execution to start at `$C000`).
    pub fn reset_cpu_to(&mut self, pc: u16) {
        self.cpu.reset_to(pc);
        self.prev_nmi_line = false;
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Reads a byte off the CPU bus without otherwise affecting emulation
    /// state, for test harnesses and debuggers. Like a real CPU read, this
    /// still triggers any side effect the target address carries (PPU
    /// register reads clear flags, `$4016` shifts the controller register);
    /// callers peeking at RAM or ROM are unaffected.
    pub fn peek(&mut self, addr: u16) -> u8 {
        self.bus.read(addr)
    }

    /// Runs exactly one CPU instruction (or interrupt service routine) and
    /// ticks the PPU the matching number of dots.
    pub fn step(&mut self) -> Result<(), Error> {
        let nmi_line = self.bus.nmi_line();
        if nmi_line && !self.prev_nmi_line {
            self.cpu.request_nmi();
        }
        self.prev_nmi_line = nmi_line;

        let cycles = self.cpu.step(&mut self.bus)?;
        self.bus.tick_ppu(cycles);
        Ok(())
    }
}

impl core::fmt::Debug for Console {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Console")
            .field("cpu", &self.cpu)
            .field("bus", &self.bus)
            .field("prev_nmi_line", &self.prev_nmi_line)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{Mirroring, NromCartridge};

    fn cart_with_program(program: &[u8]) -> Box<dyn Cartridge> {
        let mut prg = vec![0u8; 16 * 1024];
        prg[..program.len()].copy_from_slice(program);
        // Reset vector points at $8000.
        prg[0x3FFC] = 0x00;
        prg[0x3FFD] = 0x80;
        Box::new(NromCartridge::new(prg, Vec::new(), Mirroring::Horizontal))
    }

    #[test]
    fn new_console_resets_pc_from_cartridge_vector() {
        let console = Console::new(cart_with_program(&[0xEA]));
        assert_eq!(console.cpu().pc, 0x8000);
    }

    #[test]
    fn step_executes_one_instruction_and_advances_pc() {
        let mut console = Console::new(cart_with_program(&[0xEA, 0xEA])); // NOP; NOP
        console.step().unwrap();
        assert_eq!(console.cpu().pc, 0x8001);
    }

    #[test]
    fn step_propagates_unimplemented_opcode_error() {
        let mut console = Console::new(cart_with_program(&[0x02])); // JAM
        let err = console.step().unwrap_err();
        assert_eq!(err, Error::UnimplementedOpcode(0x02));
    }

    #[test]
    fn nmi_fires_one_step_after_the_vblank_line_first_asserts() {
        // An infinite loop (JMP $8000) so PC only ever moves on an NMI.
        let mut prg = vec![0u8; 16 * 1024];
        prg[0] = 0x4C;
        prg[1] = 0x00;
        prg[2] = 0x80;
        prg[0x3FFA] = 0x00; // NMI vector -> $9000
        prg[0x3FFB] = 0x90;
        prg[0x3FFC] = 0x00; // reset vector -> $8000
        prg[0x3FFD] = 0x80;
        let cart = Box::new(NromCartridge::new(prg, Vec::new(), Mirroring::Horizontal));
        let mut console = Console::new(cart);
        console.bus.write(0x2000, 0x80); // enable NMI generation

        let mut entered_nmi = false;
        for _ in 0..100_000 {
            console.step().unwrap();
            if console.cpu().pc == 0x9000 {
                entered_nmi = true;
                break;
            }
        }
        assert!(entered_nmi, "NMI never drove PC to its vector within the step budget");
    }
}
