//! Display tokens that tie interleaved output lines to their unit.

use std::cell::Cell;

/// Glyphs prefixed to each output line of a unit.
pub const SYMBOLS: [&str; 4] = ["●", "■", "▲", "◆"];

/// Palette cycled through before the symbol advances.
pub const COLOURS: [Colour; 5] = [
    Colour::Green,
    Colour::Blue,
    Colour::Magenta,
    Colour::Cyan,
    Colour::Yellow,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Colour {
    Green,
    Blue,
    Magenta,
    Cyan,
    Yellow,
}

impl Colour {
    /// Lowercase colour name, as understood by terminal colouring crates.
    pub fn as_str(self) -> &'static str {
        match self {
            Colour::Green => "green",
            Colour::Blue => "blue",
            Colour::Magenta => "magenta",
            Colour::Cyan => "cyan",
            Colour::Yellow => "yellow",
        }
    }
}

/// Symbol + colour pair for one concurrent unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayToken {
    pub symbol: &'static str,
    pub colour: Colour,
}

impl DisplayToken {
    /// Token at position `index` of the `SYMBOLS x COLOURS` product, wrapping.
    pub fn at(index: usize) -> Self {
        let index = index % (SYMBOLS.len() * COLOURS.len());
        Self {
            symbol: SYMBOLS[index / COLOURS.len()],
            colour: COLOURS[index % COLOURS.len()],
        }
    }
}

/// Deterministic rotation over [`DisplayToken`]s.
///
/// Owned by the scheduler and reset at the start of every run so repeated runs
/// hand out identical tokens. Interior mutability is enough: all units run on
/// one thread.
#[derive(Debug, Default)]
pub struct TokenRotation {
    next: Cell<usize>,
}

impl TokenRotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_token(&self) -> DisplayToken {
        let index = self.next.get();
        self.next.set(index.wrapping_add(1));
        DisplayToken::at(index)
    }

    pub fn reset(&self) {
        self.next.set(0);
    }
}
