//! The CPU-side address bus: a pure dispatcher over RAM, the PPU register
//! window, the controller port, OAM-DMA, and the cartridge.
//!
//! The bus owns no memory of its own beyond CPU RAM; everything else is
//! delegated to the device that actually backs a given address range.

use crate::backend::{PpuBackend, PpuBackends};
use crate::cartridge::Cartridge;
use crate::controller::{Controller, ControllerBackend, ControllerPort};
use crate::mem_block::cpu as cpu_mem_block;
use crate::memory::{cpu as cpu_mem, ppu as ppu_mem};
use crate::ppu::Ppu;

/// Minimal CPU-facing bus contract the 6502 interpreter reads and writes
/// through. A single concrete implementation, [`NesBus`], backs it in this
/// core; the trait exists so the CPU stays testable against smaller mock
/// buses (see `cpu`'s unit tests).
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);

    /// Convenience helper for reading a little-endian 16-bit value.
    fn read_u16(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Returns and clears any CPU cycle stall the bus has accumulated since
    /// the last call, e.g. the ~513/514-cycle freeze an OAM-DMA transfer
    /// charges the CPU for. [`crate::cpu::Cpu::step`] folds this into the
    /// cycle count it hands back so `Console::step` ticks the PPU (and, on
    /// real hardware, the APU) for the full duration of the stall rather
    /// than just the triggering instruction's own base cycles.
    fn take_pending_stall(&mut self) -> u16 {
        0
    }
}

/// The real NES address space: CPU RAM, PPU register window, controller
/// port, OAM-DMA, and the cartridge.
pub struct NesBus {
    ram: cpu_mem_block::Ram,
    cartridge: Box<dyn Cartridge>,
    ppu: Ppu,
    controller: ControllerPort,
    pending_stall: u16,
}

impl NesBus {
    pub fn new(cartridge: Box<dyn Cartridge>) -> Self {
        Self {
            ram: cpu_mem_block::Ram::new(),
            cartridge,
            ppu: Ppu::new(),
            controller: ControllerPort::new(),
            pending_stall: 0,
        }
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn ppu_mut(&mut self) -> &mut Ppu {
        &mut self.ppu
    }

    pub fn cartridge(&self) -> &dyn Cartridge {
        &*self.cartridge
    }

    pub fn replace_cartridge(&mut self, cartridge: Box<dyn Cartridge>) {
        self.cartridge = cartridge;
    }

    pub fn add_ppu_backend(&mut self, backend: Box<dyn PpuBackend>) {
        self.ppu.add_backend(backend);
    }

    pub fn add_controller_backend(&mut self, backend: Box<dyn ControllerBackend>) {
        self.controller.add_backend(backend);
    }

    /// True while the NMI line into the CPU is asserted (`nmi_output &&
    /// nmi_occurred`). [`crate::console::Console`] edge-detects this once
    /// per `step` call, immediately before fetching the next instruction.
    pub fn nmi_line(&self) -> bool {
        self.ppu.nmi_line()
    }

    /// Advances the PPU by `cpu_cycles * 3` dots, sharing the cartridge for
    /// CHR/mirroring lookups.
    pub fn tick_ppu(&mut self, cpu_cycles: u16) {
        self.ppu.step(cpu_cycles, &mut *self.cartridge);
    }

    /// Reads the reset vector, honoring `$FFFC`/`$FFFD`.
    pub fn reset_vector(&mut self) -> u16 {
        self.read_u16(cpu_mem::RESET_VECTOR_LO)
    }

    fn oam_dma(&mut self, page: u8) -> u16 {
        let base = (page as u16) << 8;
        for offset in 0..=0xFFu16 {
            let byte = self.read(base + offset);
            self.ppu.write_oam_dma_byte(byte);
        }
        tracing::debug!(page, "OAM DMA transfer");
        // 513 cycles on an even CPU cycle, 514 on an odd one; we always
        // charge the larger, acceptable constant and let the CPU fold it
        // into the instruction cycle count it returns.
        514
    }
}

impl Bus for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            cpu_mem::INTERNAL_RAM_START..=cpu_mem::INTERNAL_RAM_MIRROR_END => {
                self.ram[(addr & cpu_mem::INTERNAL_RAM_MASK) as usize]
            }
            ppu_mem::REGISTER_BASE..=cpu_mem::PPU_REGISTER_END => {
                let index = (addr & ppu_mem::REGISTER_SELECT_MASK) as u8;
                self.ppu.read_register(index, &mut *self.cartridge)
            }
            cpu_mem::CONTROLLER_PORT_1 => self.controller.read(),
            cpu_mem::APU_REGISTER_BASE..=cpu_mem::CONTROLLER_PORT_2 => 0,
            _ => self.cartridge.prg_read(addr),
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        match addr {
            cpu_mem::INTERNAL_RAM_START..=cpu_mem::INTERNAL_RAM_MIRROR_END => {
                self.ram[(addr & cpu_mem::INTERNAL_RAM_MASK) as usize] = value;
            }
            ppu_mem::REGISTER_BASE..=cpu_mem::PPU_REGISTER_END => {
                let index = (addr & ppu_mem::REGISTER_SELECT_MASK) as u8;
                self.ppu.write_register(index, value, &mut *self.cartridge);
            }
            ppu_mem::OAM_DMA => {
                let cycles = self.oam_dma(value);
                self.pending_stall = self.pending_stall.saturating_add(cycles);
            }
            cpu_mem::CONTROLLER_PORT_1 => self.controller.write_strobe(value),
            cpu_mem::APU_REGISTER_BASE..=cpu_mem::CONTROLLER_PORT_2 => {}
            _ => self.cartridge.prg_write(addr, value),
        }
    }

    fn take_pending_stall(&mut self) -> u16 {
        core::mem::take(&mut self.pending_stall)
    }
}

impl core::fmt::Debug for NesBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NesBus")
            .field("ppu", &self.ppu)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

/// Stand-alone controller abstraction re-exported for callers that want to
/// drive button state directly rather than through a [`ControllerBackend`].
pub type DirectController = Controller;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{Mirroring, NromCartridge};

    fn test_bus() -> NesBus {
        let cart = NromCartridge::new(vec![0u8; 16 * 1024], Vec::new(), Mirroring::Horizontal);
        NesBus::new(Box::new(cart))
    }

    #[test]
    fn ram_is_mirrored_four_times() {
        let mut bus = test_bus();
        bus.write(0x0000, 0x42);
        assert_eq!(bus.read(0x0800), 0x42);
        assert_eq!(bus.read(0x1000), 0x42);
        assert_eq!(bus.read(0x1800), 0x42);
    }

    #[test]
    fn ppu_register_window_is_mirrored_every_eight_bytes() {
        let mut bus = test_bus();
        bus.write(0x2000, 0x80);
        // $2008 mirrors $2000; reading $2002 (status) should see the NMI
        // enable bit reflected indirectly by reading back via $2000's mirror.
        bus.write(0x2008, 0x00);
        // No panic / address-decode crash is the behavior under test here;
        // detailed PPU register semantics are covered in `ppu`'s own tests.
        let _ = bus.read(0x2002);
    }

    #[test]
    fn cartridge_space_reads_prg_rom() {
        let mut cart_bytes = vec![0u8; 16 * 1024];
        cart_bytes[0] = 0xEA;
        let cart = NromCartridge::new(cart_bytes, Vec::new(), Mirroring::Horizontal);
        let mut bus = NesBus::new(Box::new(cart));
        assert_eq!(bus.read(0x8000), 0xEA);
        assert_eq!(bus.read(0xC000), 0xEA);
    }

    #[test]
    fn controller_strobe_and_read_round_trip() {
        let mut bus = test_bus();
        bus.write(0x4016, 1);
        bus.write(0x4016, 0);
        let first = bus.read(0x4016);
        assert_eq!(first & 0x01, 0);
    }

    #[test]
    fn oam_dma_queues_a_514_cycle_stall_for_the_cpu_to_collect() {
        let mut bus = test_bus();
        assert_eq!(bus.take_pending_stall(), 0);
        bus.write(0x4014, 0x02);
        assert_eq!(bus.take_pending_stall(), 514);
        // Draining the stall clears it until the next DMA.
        assert_eq!(bus.take_pending_stall(), 0);
    }

    #[test]
    fn low_cartridge_space_reads_as_open_bus() {
        let mut bus = test_bus();
        assert_eq!(bus.read(0x4020), 0);
        assert_eq!(bus.read(0x6000), 0);
    }
}
