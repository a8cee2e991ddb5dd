//! Game Genie and Action Replay cheat code decoding, plus an owned cheat
//! list that patches 68K ROM and work RAM.

use bincode::{Decode, Encode};

/// 68K addresses at or above this point target work RAM
const WORK_RAM_START_ADDRESS: u32 = 0xE0_0000;

// Cheat addresses only carry the low 24 bits of the 68K bus
const ADDRESS_MASK: u32 = 0xFF_FFFF;

pub const MAX_CHEATS: usize = 0x100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct DecodedCheat {
    pub address: u32,
    pub value: u16,
}

impl DecodedCheat {
    /// Decode a Game Genie or Action Replay code string.
    ///
    /// Game Genie codes are 8 characters of the restricted alphabet
    /// `ABCDEFGHJKLMNPRSTVWXYZ0-9`, optionally split `XXXX-XXXX`. Action
    /// Replay codes are `AAAAAA:VVVV`, `AAAAAA VVVV`, or the real-hardware
    /// `AAAAA VVVVV` form.
    #[must_use]
    pub fn decode(code: &str) -> Option<Self> {
        let decoded = decode_game_genie(code).or_else(|| decode_action_replay(code));
        if decoded.is_none() {
            log::warn!("Cheat code '{code}' is in an unrecognised format");
        }

        decoded
    }

    fn is_rom_cheat(self, rom_len_words: usize) -> bool {
        ((self.address & ADDRESS_MASK) as usize) < rom_len_words * 2
    }

    fn is_ram_cheat(self) -> bool {
        (self.address & ADDRESS_MASK) >= WORK_RAM_START_ADDRESS
    }
}

fn decode_game_genie_character(c: u8) -> Option<u32> {
    // The alphabet skips I, O, Q, and U; digits follow the letters
    let c = c.to_ascii_uppercase();
    let value = match c {
        b'A'..=b'H' => c - b'A',
        b'J'..=b'N' => c - b'J' + 0x08,
        b'P' => 0x0D,
        b'R'..=b'T' => c - b'R' + 0x0E,
        b'V'..=b'Z' => c - b'V' + 0x11,
        b'0'..=b'9' => c - b'0' + 0x16,
        _ => return None,
    };

    Some(u32::from(value))
}

fn decode_game_genie(code: &str) -> Option<DecodedCheat> {
    let code = code.trim().as_bytes();

    let mut characters = [0_u8; 8];
    match code.len() {
        8 => characters.copy_from_slice(code),
        9 if code[4] == b'-' => {
            characters[..4].copy_from_slice(&code[..4]);
            characters[4..].copy_from_slice(&code[5..]);
        }
        _ => return None,
    }

    // Decode characters to 5-bit integers and combine them into 8-bit
    // integers
    let mut decoded_bytes = [0_u32; 5];
    let mut current_byte = 0;
    let mut combiner: u32 = 0;
    let mut combined_bits = 0;
    for &character in &characters {
        combiner = (combiner << 5) | decode_game_genie_character(character)?;
        combined_bits += 5;

        if combined_bits >= 8 {
            combined_bits -= 8;
            decoded_bytes[current_byte] = (combiner >> combined_bits) & 0xFF;
            current_byte += 1;
        }
    }

    // Unscramble into a 24-bit address and 16-bit value
    let address = (decoded_bytes[2] << 16) | (decoded_bytes[1] << 8) | decoded_bytes[4];
    let value = ((decoded_bytes[3] & 0x07) << 13)
        | ((decoded_bytes[3] & 0xF8) << 5)
        | decoded_bytes[0];

    Some(DecodedCheat { address, value: value as u16 })
}

fn decode_action_replay(code: &str) -> Option<DecodedCheat> {
    let code = code.trim();

    let (first, second) = code.split_once([':', ' ', '\t'])?;
    let (first, second) = (first.trim(), second.trim());
    if ![first, second].iter().all(|part| part.bytes().all(|c| c.is_ascii_hexdigit())) {
        return None;
    }

    match (first.len(), second.len()) {
        // Typical emulator format: 6-digit address, 4-digit value
        (6, 4) => {
            let address = u32::from_str_radix(first, 16).ok()?;
            let value = u16::from_str_radix(second, 16).ok()?;
            Some(DecodedCheat { address, value })
        }
        // Format used by the real Action Replay: two 5-digit halves
        (5, 5) => {
            let first = u32::from_str_radix(first, 16).ok()?;
            let second = u32::from_str_radix(second, 16).ok()?;
            Some(DecodedCheat {
                address: (first << 4) | (second >> 16),
                value: (second & 0xFFFF) as u16,
            })
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
struct CheatSlot {
    cheat: DecodedCheat,
    old_rom_value: u16,
    enabled: bool,
}

/// An owned list of up to [`MAX_CHEATS`] cheat slots.
///
/// ROM patches remember the word they replaced so they can be undone;
/// callers re-apply RAM patches every frame since the game overwrites work
/// RAM continuously.
#[derive(Debug, Clone, Encode, Decode)]
pub struct CheatList {
    slots: Vec<Option<CheatSlot>>,
}

impl CheatList {
    #[must_use]
    pub fn new() -> Self {
        Self { slots: vec![None; MAX_CHEATS] }
    }

    /// Decode `code` and store it at `index`, re-patching the ROM. Fails on
    /// an unrecognised code, an out-of-range index, or an odd target address.
    pub fn add(&mut self, rom: &mut [u16], index: usize, enabled: bool, code: &str) -> bool {
        let Some(cheat) = DecodedCheat::decode(code) else { return false };

        log::info!("Cheat code {index} ({code}) decoded to {:06X}:{:04X}", cheat.address, cheat.value);

        self.add_decoded(rom, index, enabled, cheat)
    }

    pub fn add_decoded(
        &mut self,
        rom: &mut [u16],
        index: usize,
        enabled: bool,
        cheat: DecodedCheat,
    ) -> bool {
        if index >= self.slots.len() {
            log::warn!("Cheat index {index} exceeds the cheat list capacity ({MAX_CHEATS})");
            return false;
        }

        if cheat.address % 2 != 0 {
            log::warn!("Cheat decodes to an odd address ({:06X}), which is invalid", cheat.address);
            return false;
        }

        self.undo_rom_patches(rom);
        self.slots[index] = Some(CheatSlot { cheat, old_rom_value: 0, enabled });
        self.apply_rom_patches(rom);

        true
    }

    /// Remove every cheat, restoring any patched ROM words first.
    pub fn reset(&mut self, rom: &mut [u16]) {
        self.undo_rom_patches(rom);
        self.slots.fill(None);
    }

    pub fn apply_rom_patches(&mut self, rom: &mut [u16]) {
        for slot in self.slots.iter_mut().flatten() {
            if slot.enabled && slot.cheat.is_rom_cheat(rom.len()) {
                let index = ((slot.cheat.address & ADDRESS_MASK) / 2) as usize;
                slot.old_rom_value = rom[index];
                rom[index] = slot.cheat.value;
            }
        }
    }

    /// Undo in reverse order so overlapping patches unwind correctly
    pub fn undo_rom_patches(&self, rom: &mut [u16]) {
        for slot in self.slots.iter().rev().flatten() {
            if slot.enabled && slot.cheat.is_rom_cheat(rom.len()) {
                let index = ((slot.cheat.address & ADDRESS_MASK) / 2) as usize;
                rom[index] = slot.old_rom_value;
            }
        }
    }

    pub fn apply_ram_patches(&self, ram: &mut [u16]) {
        if ram.is_empty() {
            return;
        }

        for slot in self.slots.iter().flatten() {
            if slot.enabled && slot.cheat.is_ram_cheat() {
                let index = ((slot.cheat.address & ADDRESS_MASK) / 2) as usize % ram.len();
                ram[index] = slot.cheat.value;
            }
        }
    }
}

impl Default for CheatList {
    fn default() -> Self {
        Self::new()
    }
}
