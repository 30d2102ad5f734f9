//! The picture processing unit: register window, scanline/dot schedule,
//! background and sprite composition, and presentation fan-out.
//!
//! Background pixels are computed per-scanline from the control register's
//! base nametable address rather than through a per-dot shift-register
//! pipeline; every dot-driven observable the bus contract relies on (the
//! `$2002` vblank flag, the pre-render flag clear, NMI timing) still walks
//! dot-by-dot inside [`Ppu::step`], so nothing external can tell the
//! difference from the CPU side.

pub(crate) mod registers;
pub(crate) mod sprite;

use registers::{Registers, Scroll};
use sprite::{SpriteAttributes, SpriteView};

use crate::backend::{PpuBackend, PpuBackends};
use crate::cartridge::{Cartridge, Mirroring};
use crate::mem_block::ppu as ppu_mem_block;
use crate::memory::ppu as ppu_mem;

const DOTS_PER_SCANLINE: u16 = 341;
const SCANLINES_PER_FRAME: u16 = 262;
const VISIBLE_SCANLINES: u16 = 240;
const VBLANK_START_SCANLINE: u16 = 241;
const PRE_RENDER_SCANLINE: u16 = 261;
const SCREEN_WIDTH: u16 = 256;

const MAX_SPRITES_PER_SCANLINE: usize = 8;

#[derive(Debug, Clone, Copy)]
struct ScanlineSprite {
    oam_index: u8,
    y: u8,
    tile: u8,
    attrs: SpriteAttributes,
    x: u8,
}

/// Picture processing unit state: CPU-visible registers, internal VRAM
/// (nametables and palette), and the scanline/dot counters that drive
/// rendering and NMI timing.
pub struct Ppu {
    regs: Registers,
    backends: PpuBackends,
    ciram: ppu_mem_block::Ciram,
    palette: ppu_mem_block::PaletteRam,
    scan_line: u16,
    cycle: u16,
    frame_odd: bool,
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            backends: PpuBackends::new(),
            ciram: ppu_mem_block::Ciram::new(),
            palette: ppu_mem_block::PaletteRam::new(),
            scan_line: VBLANK_START_SCANLINE,
            cycle: 0,
            frame_odd: false,
        }
    }

    pub fn add_backend(&mut self, backend: Box<dyn PpuBackend>) {
        self.backends.add(backend);
    }

    /// True while the CPU-facing NMI line is asserted. Sampled once per
    /// [`crate::console::Console::step`], not per dot: any `$2000` write
    /// that toggles `GENERATE_NMI` mid-instruction isn't observed until the
    /// next step, giving the one-instruction NMI delay for free.
    pub fn nmi_line(&self) -> bool {
        self.regs.control.nmi_enabled() && self.regs.status.contains(registers::Status::VERTICAL_BLANK)
    }

    /// Advances the PPU by `cpu_cycles * 3` dots.
    pub fn step(&mut self, cpu_cycles: u16, cart: &mut dyn Cartridge) {
        let dots = cpu_cycles as u32 * 3;
        for _ in 0..dots {
            self.tick_dot(cart);
        }
    }

    fn tick_dot(&mut self, cart: &mut dyn Cartridge) {
        if self.scan_line == VBLANK_START_SCANLINE && self.cycle == 1 {
            self.regs.status.insert(registers::Status::VERTICAL_BLANK);
            tracing::debug!(nmi_line = self.nmi_line(), "vblank start");
            self.backends.vertical_blank();
        }
        if self.scan_line == PRE_RENDER_SCANLINE && self.cycle == 1 {
            self.regs.status.remove(
                registers::Status::VERTICAL_BLANK
                    | registers::Status::SPRITE_ZERO_HIT
                    | registers::Status::SPRITE_OVERFLOW,
            );
        }
        if self.scan_line < VISIBLE_SCANLINES && self.cycle == 0 {
            self.render_scanline(self.scan_line as u8, cart);
        }

        if self.cycle == 340
            && self.scan_line == PRE_RENDER_SCANLINE
            && self.frame_odd
            && self.regs.mask.rendering_enabled()
        {
            self.cycle = 0;
            self.scan_line = 0;
            self.frame_odd = false;
            return;
        }

        self.cycle += 1;
        if self.cycle >= DOTS_PER_SCANLINE {
            self.cycle = 0;
            self.scan_line += 1;
            if self.scan_line >= SCANLINES_PER_FRAME {
                self.scan_line = 0;
                self.frame_odd = !self.frame_odd;
            }
        }
    }

    /// Computes and emits one full visible scanline of pixels, and updates
    /// sprite-0-hit / sprite-overflow for it.
    fn render_scanline(&mut self, y: u8, cart: &mut dyn Cartridge) {
        let (sprites, overflow) = self.evaluate_sprites(y);
        if overflow {
            self.regs.status.insert(registers::Status::SPRITE_OVERFLOW);
            tracing::trace!(scan_line = y, "sprite overflow");
        }

        let sprite_zero = sprites.iter().flatten().find(|s| s.oam_index == 0).copied();
        let bg_enabled = self.regs.mask.contains(registers::Mask::SHOW_BACKGROUND);
        let sprites_enabled = self.regs.mask.contains(registers::Mask::SHOW_SPRITES);

        for x in 0..SCREEN_WIDTH as u8 {
            let bg_pixel = if bg_enabled {
                self.background_pixel(x, y, cart)
            } else {
                0
            };
            let bg_opaque = bg_pixel != 0;

            if let Some(zero) = sprite_zero {
                if sprites_enabled && bg_enabled && x != 255 {
                    if let Some(val) = self.sprite_pixel_value(&zero, x, cart) {
                        if val != 0 && bg_opaque {
                            if !self.regs.status.contains(registers::Status::SPRITE_ZERO_HIT) {
                                tracing::trace!(x, y = y, "sprite zero hit");
                            }
                            self.regs.status.insert(registers::Status::SPRITE_ZERO_HIT);
                        }
                    }
                }
            }

            let color = if sprites_enabled {
                self.composite_pixel(x, bg_pixel, &sprites, cart)
            } else {
                self.background_color(bg_pixel)
            };
            self.backends.render_pixel(x, y, color);
        }
    }

    fn background_pixel(&self, x: u8, y: u8, cart: &mut dyn Cartridge) -> u8 {
        let tile_col = (x / 8) as u16;
        let tile_row = (y / 8) as u16;
        let base = self.regs.control.base_nametable_addr();
        let tile_addr = base + tile_row * 32 + tile_col;
        let tile_index = self.vram_read(cart, tile_addr);

        let attr_addr = base + 0x3C0 + (tile_row / 4) * 8 + (tile_col / 4);
        let attr_byte = self.vram_read(cart, attr_addr);
        let quadrant_shift = match (tile_col % 4 / 2, tile_row % 4 / 2) {
            (0, 0) => 0,
            (1, 0) => 2,
            (0, 1) => 4,
            _ => 6,
        };
        let palette_group = (attr_byte >> quadrant_shift) & 0x03;

        let pattern_table = self.regs.control.background_pattern_table();
        let fine_x = x % 8;
        let fine_y = y % 8;
        let tile_base = pattern_table + tile_index as u16 * 16;
        let plane0 = cart.chr_read(tile_base + fine_y as u16);
        let plane1 = cart.chr_read(tile_base + fine_y as u16 + 8);
        let bit = 7 - fine_x;
        let value = ((plane1 >> bit) & 1) << 1 | ((plane0 >> bit) & 1);
        if value == 0 {
            0
        } else {
            (palette_group << 2) | value
        }
    }

    fn background_color(&self, palette_pixel: u8) -> u8 {
        if palette_pixel == 0 {
            self.palette[palette_index(ppu_mem::PALETTE_BASE)] & 0x3F
        } else {
            let addr = ppu_mem::PALETTE_BASE + palette_pixel as u16;
            self.palette[palette_index(addr)] & 0x3F
        }
    }

    fn sprite_pixel_value(&self, sprite: &ScanlineSprite, x: u8, cart: &mut dyn Cartridge) -> Option<u8> {
        if x < sprite.x || (x as u16) >= sprite.x as u16 + 8 {
            return None;
        }
        let height = if self.regs.control.use_8x16_sprites() { 16 } else { 8 };
        let row_in_sprite = self.current_sprite_row(sprite, height)?;
        let col = x - sprite.x;
        let fine_x = if sprite.attrs.contains(SpriteAttributes::FLIP_HORIZONTAL) {
            7 - col
        } else {
            col
        };

        let (pattern_table, tile_num, fine_y) = if height == 16 {
            let pattern_table = if sprite.tile & 0x01 != 0 { 0x1000 } else { 0x0000 };
            let base_tile = sprite.tile & 0xFE;
            (pattern_table, base_tile + (row_in_sprite / 8), row_in_sprite % 8)
        } else {
            (self.regs.control.sprite_pattern_table(), sprite.tile, row_in_sprite)
        };

        let tile_base = pattern_table + tile_num as u16 * 16;
        let plane0 = cart.chr_read(tile_base + fine_y as u16);
        let plane1 = cart.chr_read(tile_base + fine_y as u16 + 8);
        let bit = 7 - fine_x;
        let value = ((plane1 >> bit) & 1) << 1 | ((plane0 >> bit) & 1);
        Some(value)
    }

    /// Row within the sprite (0..height) for the scanline currently being
    /// rendered, honoring vertical flip. `None` if the row fell outside the
    /// sprite (should not happen for sprites [`Ppu::evaluate_sprites`]
    /// already filtered, but kept defensive).
    fn current_sprite_row(&self, sprite: &ScanlineSprite, height: u8) -> Option<u8> {
        let top = sprite.y as i16 + 1;
        let row = self.scan_line as i16 - top;
        if row < 0 || row >= height as i16 {
            return None;
        }
        let row = row as u8;
        Some(if sprite.attrs.contains(SpriteAttributes::FLIP_VERTICAL) {
            height - 1 - row
        } else {
            row
        })
    }

    fn composite_pixel(
        &self,
        x: u8,
        bg_pixel: u8,
        sprites: &[Option<ScanlineSprite>; MAX_SPRITES_PER_SCANLINE],
        cart: &mut dyn Cartridge,
    ) -> u8 {
        for slot in sprites.iter().flatten() {
            let Some(value) = self.sprite_pixel_value(slot, x, cart) else {
                continue;
            };
            if value == 0 {
                continue;
            }
            if slot.attrs.contains(SpriteAttributes::PRIORITY_BEHIND_BACKGROUND) && bg_pixel != 0 {
                continue;
            }
            let group = (slot.attrs.bits() & 0x03) as u16;
            let addr = ppu_mem::PALETTE_BASE + 0x10 + group * 4 + value as u16;
            return self.palette[palette_index(addr)] & 0x3F;
        }
        self.background_color(bg_pixel)
    }

    /// Scans primary OAM for up to [`MAX_SPRITES_PER_SCANLINE`] sprites that
    /// intersect scanline `y`, in OAM order, and reports whether more than
    /// that many were found (sprite overflow). This does not reproduce the
    /// real hardware's diagonal-read overflow bug.
    fn evaluate_sprites(&self, y: u8) -> ([Option<ScanlineSprite>; MAX_SPRITES_PER_SCANLINE], bool) {
        let height: i16 = if self.regs.control.use_8x16_sprites() { 16 } else { 8 };
        let mut found: [Option<ScanlineSprite>; MAX_SPRITES_PER_SCANLINE] = [None; MAX_SPRITES_PER_SCANLINE];
        let mut count = 0usize;
        let mut overflow = false;

        let mut oam = self.regs.oam;
        for (index, view) in SpriteView::iter(oam.as_mut_slice()).enumerate() {
            let sprite_y = view.y();
            let top = sprite_y as i16 + 1;
            let in_range = (y as i16) >= top && (y as i16) < top + height;
            if !in_range {
                continue;
            }
            if count < MAX_SPRITES_PER_SCANLINE {
                found[count] = Some(ScanlineSprite {
                    oam_index: index as u8,
                    y: sprite_y,
                    tile: view.tile(),
                    attrs: view.attributes(),
                    x: view.x(),
                });
                count += 1;
            } else {
                overflow = true;
            }
        }
        (found, overflow)
    }

    /// Reads a CPU-visible PPU register (`$2000-$2007`, already reduced mod
    /// 8 by the bus). Write-only registers return `0` rather than modeling
    /// the open-bus decay register precisely.
    pub fn read_register(&mut self, index: u8, cart: &mut dyn Cartridge) -> u8 {
        match index {
            2 => {
                let value = self.regs.status.bits();
                self.regs.status.remove(registers::Status::VERTICAL_BLANK);
                self.regs.scroll.w = false;
                value
            }
            4 => self.regs.oam[self.regs.oam_addr as usize],
            7 => self.read_data(cart),
            _ => 0,
        }
    }

    /// Writes a CPU-visible PPU register.
    pub fn write_register(&mut self, index: u8, value: u8, cart: &mut dyn Cartridge) {
        match index {
            0 => self.regs.write_control(value),
            1 => self.regs.mask = registers::Mask::from_bits_retain(value),
            3 => self.regs.oam_addr = value,
            4 => {
                self.regs.oam[self.regs.oam_addr as usize] = value;
                self.regs.oam_addr = self.regs.oam_addr.wrapping_add(1);
            }
            5 => self.write_scroll(value),
            6 => self.write_addr(value),
            7 => self.write_data(cart, value),
            _ => {}
        }
    }

    fn write_scroll(&mut self, value: u8) {
        let Scroll { t, x, w, .. } = &mut self.regs.scroll;
        if !*w {
            t.set_coarse_x(value >> 3);
            *x = value & 0x07;
        } else {
            t.set_coarse_y(value >> 3);
            t.set_fine_y(value & 0x07);
        }
        self.regs.scroll.w = !self.regs.scroll.w;
    }

    fn write_addr(&mut self, value: u8) {
        let w = self.regs.scroll.w;
        if !w {
            let t = self.regs.scroll.t.raw();
            self.regs.scroll.t.set_raw((t & 0x00FF) | ((value as u16 & 0x3F) << 8));
        } else {
            let t = self.regs.scroll.t.raw();
            self.regs.scroll.t.set_raw((t & 0x7F00) | value as u16);
            self.regs.scroll.v = self.regs.scroll.t;
        }
        self.regs.scroll.w = !self.regs.scroll.w;
    }

    fn read_data(&mut self, cart: &mut dyn Cartridge) -> u8 {
        let addr = self.regs.scroll.v.raw() & ppu_mem::VRAM_MIRROR_MASK;
        let result = if addr >= ppu_mem::PALETTE_BASE {
            self.palette[palette_index(addr)] & 0x3F
        } else {
            let buffered = self.regs.read_buffer;
            self.regs.read_buffer = self.vram_read(cart, addr);
            buffered
        };
        self.regs.scroll.v.increment(self.regs.control.vram_increment());
        result
    }

    fn write_data(&mut self, cart: &mut dyn Cartridge, value: u8) {
        let addr = self.regs.scroll.v.raw() & ppu_mem::VRAM_MIRROR_MASK;
        self.vram_write(cart, addr, value);
        self.regs.scroll.v.increment(self.regs.control.vram_increment());
    }

    fn vram_read(&self, cart: &mut dyn Cartridge, addr: u16) -> u8 {
        let addr = addr & ppu_mem::VRAM_MIRROR_MASK;
        match addr {
            0x0000..=0x1FFF => cart.chr_read(addr),
            0x2000..=0x3EFF => self.ciram[self.nametable_offset(cart, addr)],
            _ => self.palette[palette_index(addr)],
        }
    }

    fn vram_write(&mut self, cart: &mut dyn Cartridge, addr: u16, value: u8) {
        let addr = addr & ppu_mem::VRAM_MIRROR_MASK;
        match addr {
            0x0000..=0x1FFF => cart.chr_write(addr, value),
            0x2000..=0x3EFF => {
                let offset = self.nametable_offset(cart, addr);
                self.ciram[offset] = value;
            }
            _ => self.palette[palette_index(addr)] = value,
        }
    }

    fn nametable_offset(&self, cart: &dyn Cartridge, addr: u16) -> usize {
        let addr = addr & 0x2FFF;
        let nt_index = ((addr - ppu_mem::NAMETABLE_BASE) / ppu_mem::NAMETABLE_SIZE) as u8;
        let offset = (addr - ppu_mem::NAMETABLE_BASE) % ppu_mem::NAMETABLE_SIZE;
        let physical_table = match cart.mirroring() {
            Mirroring::Horizontal => nt_index / 2,
            Mirroring::Vertical => nt_index % 2,
            Mirroring::FourScreen => {
                tracing::trace!(
                    "four-screen mirroring has no extra CIRAM backing here; approximating as horizontal"
                );
                nt_index / 2
            }
        };
        physical_table as usize * ppu_mem::NAMETABLE_SIZE as usize + offset as usize
    }

    /// Writes one byte during an OAM-DMA transfer, honoring the running
    /// `OAMADDR` pointer exactly as a direct `$2004` write would.
    pub fn write_oam_dma_byte(&mut self, byte: u8) {
        self.regs.oam[self.regs.oam_addr as usize] = byte;
        self.regs.oam_addr = self.regs.oam_addr.wrapping_add(1);
    }
}

impl core::fmt::Debug for Ppu {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ppu")
            .field("regs", &self.regs)
            .field("scan_line", &self.scan_line)
            .field("cycle", &self.cycle)
            .field("frame_odd", &self.frame_odd)
            .finish_non_exhaustive()
    }
}

fn palette_index(addr: u16) -> usize {
    let mut idx = (addr & 0x1F) as usize;
    if idx >= 0x10 && idx % 4 == 0 {
        idx -= 0x10;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::NromCartridge;

    fn test_cart() -> NromCartridge {
        NromCartridge::new(vec![0u8; 16 * 1024], vec![0u8; 8 * 1024], Mirroring::Horizontal)
    }

    #[test]
    fn new_ppu_starts_at_vblank_scanline() {
        let ppu = Ppu::new();
        assert_eq!(ppu.scan_line, VBLANK_START_SCANLINE);
        assert_eq!(ppu.cycle, 0);
    }

    #[test]
    fn vblank_flag_sets_at_scanline_241_dot_1_and_clears_on_read() {
        let mut ppu = Ppu::new();
        let mut cart = test_cart();
        ppu.write_register(0, 0x80, &mut cart); // enable NMI

        // Drive a full lap of the frame so the scheduler wraps back around to
        // scanline 241 dot 1 regardless of where it started.
        let dots_to_travel = SCANLINES_PER_FRAME as u32 * DOTS_PER_SCANLINE as u32 + 1;
        for _ in 0..dots_to_travel {
            ppu.tick_dot(&mut cart);
        }
        assert_eq!(ppu.scan_line, VBLANK_START_SCANLINE);
        assert_eq!(ppu.cycle, 1);
        assert!(ppu.regs.status.contains(registers::Status::VERTICAL_BLANK));
        assert!(ppu.nmi_line());

        let status = ppu.read_register(2, &mut cart);
        assert_ne!(status & 0x80, 0);
        assert!(!ppu.regs.status.contains(registers::Status::VERTICAL_BLANK));
        assert!(!ppu.nmi_line());
    }

    #[test]
    fn oam_dma_byte_writes_advance_oam_addr() {
        let mut ppu = Ppu::new();
        let mut cart = test_cart();
        ppu.write_register(3, 0x00, &mut cart); // OAMADDR = 0
        ppu.write_oam_dma_byte(0xAA);
        ppu.write_oam_dma_byte(0xBB);
        assert_eq!(ppu.regs.oam[0], 0xAA);
        assert_eq!(ppu.regs.oam[1], 0xBB);
        assert_eq!(ppu.regs.oam_addr, 2);
    }

    #[test]
    fn oamdata_read_does_not_advance_oam_addr() {
        let mut ppu = Ppu::new();
        let mut cart = test_cart();
        ppu.write_register(3, 0x05, &mut cart);
        let _ = ppu.read_register(4, &mut cart);
        assert_eq!(ppu.regs.oam_addr, 5);
    }

    #[test]
    fn ppuaddr_write_sequence_sets_v_and_resets_w_on_second_write() {
        let mut ppu = Ppu::new();
        let mut cart = test_cart();
        ppu.write_register(6, 0x21, &mut cart);
        ppu.write_register(6, 0x08, &mut cart);
        assert_eq!(ppu.regs.scroll.v.raw(), 0x2108);
        assert!(!ppu.regs.scroll.w);
    }

    #[test]
    fn ppudata_write_increments_by_control_step() {
        let mut ppu = Ppu::new();
        let mut cart = test_cart();
        ppu.write_register(0, 0x04, &mut cart); // INCREMENT_32
        ppu.write_register(6, 0x20, &mut cart);
        ppu.write_register(6, 0x00, &mut cart);
        ppu.write_register(7, 0x11, &mut cart);
        assert_eq!(ppu.regs.scroll.v.raw(), 0x2020);
    }

    #[test]
    fn palette_mirror_10_14_18_1c_alias_background_entries() {
        assert_eq!(palette_index(0x3F10), palette_index(0x3F00));
        assert_eq!(palette_index(0x3F14), palette_index(0x3F04));
        assert_eq!(palette_index(0x3F18), palette_index(0x3F08));
        assert_eq!(palette_index(0x3F1C), palette_index(0x3F0C));
    }

    #[test]
    fn horizontal_mirroring_aliases_top_and_bottom_nametable_pairs() {
        let ppu = Ppu::new();
        let cart = test_cart();
        let top_left = ppu.nametable_offset(&cart, 0x2000);
        let top_right = ppu.nametable_offset(&cart, 0x2400);
        let bottom_left = ppu.nametable_offset(&cart, 0x2800);
        assert_eq!(top_left, top_right);
        assert_ne!(top_left, bottom_left);
    }

    #[test]
    fn sprite_overflow_sets_status_bit_beyond_eight_sprites() {
        let mut ppu = Ppu::new();
        for i in 0..9usize {
            let base = i * 4;
            ppu.regs.oam[base] = 10; // y, all overlap scanline 11
            ppu.regs.oam[base + 1] = 0;
            ppu.regs.oam[base + 2] = 0;
            ppu.regs.oam[base + 3] = 0;
        }
        let (_, overflow) = ppu.evaluate_sprites(11);
        assert!(overflow);
    }
}
