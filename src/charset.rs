//! Compiling character-alternative specifications (`A-Za-z0-9`, `!-~`, ...) into byte sets.

use std::fmt;

/// A set of byte codes, stored as a 256-bit bitmap.
///
/// The code of every member is also the code point of the character it stands for, so only
/// characters up to U+00FF can be members.
#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub struct CharSet {
    bits: [u64; 4],
}

impl CharSet {
    pub fn new() -> CharSet {
        CharSet::default()
    }

    /// Compile a character-alternative specification.
    ///
    /// The notation is read left to right:
    ///
    /// * every character stands for itself, including `]` and `^` in any position;
    /// * `x-y` stands for every code from `x` through `y`, inclusive;
    /// * a `-` that is the first or last character, or that directly follows a completed range,
    ///   stands for itself.
    ///
    /// The empty string compiles to the empty set.
    pub fn compile(spec: &str) -> Result<CharSet, SpecError> {
        let chars = spec.chars().collect::<Vec<_>>();
        let mut set = CharSet::new();
        // The previous literal, if it may still open a range.
        let mut range_start: Option<u8> = None;
        let mut idx = 0;
        while idx < chars.len() {
            let ch = chars[idx];
            let is_last = idx + 1 == chars.len();
            match (ch, range_start) {
                ('-', Some(lo)) if !is_last => {
                    let hi_ch = chars[idx + 1];
                    let hi = to_code(hi_ch, idx + 1)?;
                    if hi < lo {
                        return Err(SpecError::DescendingRange {
                            low: char::from(lo),
                            high: hi_ch,
                            position: idx - 1,
                        });
                    }
                    set.insert_range(lo, hi);
                    range_start = None;
                    idx += 2;
                }
                _ => {
                    let code = to_code(ch, idx)?;
                    set.insert(code);
                    range_start = Some(code);
                    idx += 1;
                }
            }
        }
        Ok(set)
    }

    /// Compile an exclusion specification.
    ///
    /// Identical to [`CharSet::compile`]. A lone `^` excludes the `^` character and nothing
    /// else; it never means "exclude everything".
    pub fn compile_exclude(spec: &str) -> Result<CharSet, SpecError> {
        if spec == "^" {
            let mut set = CharSet::new();
            set.insert(b'^');
            return Ok(set);
        }
        CharSet::compile(spec)
    }

    pub fn insert(&mut self, code: u8) {
        self.bits[usize::from(code >> 6)] |= 1 << (code & 63);
    }

    /// Insert every code in `lo..=hi`.
    pub fn insert_range(&mut self, lo: u8, hi: u8) {
        for code in lo..=hi {
            self.insert(code);
        }
    }

    pub fn contains(&self, code: u8) -> bool {
        self.bits[usize::from(code >> 6)] & (1 << (code & 63)) != 0
    }

    /// The members of `self` which are not members of `other`.
    pub fn difference(&self, other: &CharSet) -> CharSet {
        let mut bits = self.bits;
        for (word, other_word) in bits.iter_mut().zip(other.bits.iter()) {
            *word &= !other_word;
        }
        CharSet { bits }
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    /// Iterate over the member codes in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(move |code| self.contains(*code))
    }

    /// Bits of entropy contributed by one character drawn uniformly from this set.
    pub fn bits_per_char(&self) -> f64 {
        match self.len() {
            0 => 0.0,
            n => (n as f64).log2(),
        }
    }

    /// Maximal runs of consecutive member codes, as inclusive `(lo, hi)` pairs.
    fn runs(&self) -> Vec<(u8, u8)> {
        let mut runs: Vec<(u8, u8)> = Vec::new();
        for code in self.iter() {
            match runs.last_mut() {
                Some((_, hi)) if u16::from(*hi) + 1 == u16::from(code) => *hi = code,
                _ => runs.push((code, code)),
            }
        }
        runs
    }
}

fn to_code(ch: char, position: usize) -> Result<u8, SpecError> {
    u8::try_from(u32::from(ch)).map_err(|_| SpecError::OutOfDomain { ch, position })
}

/// Renders the set in range notation, e.g. `0-9A-Za-z`.
///
/// Non-printable members are written as `\xNN` escapes, so the result is meant for people to
/// read and is not guaranteed to compile back to the same set.
impl fmt::Display for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (lo, hi) in self.runs() {
            write_code(f, lo)?;
            match hi - lo {
                0 => (),
                1 => write_code(f, hi)?,
                _ => {
                    write!(f, "-")?;
                    write_code(f, hi)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CharSet({:?})", self.to_string())
    }
}

fn write_code(f: &mut fmt::Formatter<'_>, code: u8) -> fmt::Result {
    let ch = char::from(code);
    if ch.is_ascii_graphic() || (code > 0xa0) {
        write!(f, "{}", ch)
    } else {
        write!(f, "\\x{:02x}", code)
    }
}

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum SpecError {
    #[error("range {low:?}-{high:?} at position {position} runs backwards")]
    DescendingRange {
        low: char,
        high: char,
        position: usize,
    },
    #[error("character {ch:?} at position {position} is outside the supported range U+0000-U+00FF")]
    OutOfDomain { ch: char, position: usize },
}
