use std::fmt::{self, Debug, Display};
use std::slice::SliceIndex;
use std::str::FromStr;

use yap::{IntoTokens, TokenLocation, Tokens};

/// A single bit of drive on a net.
///
/// Five drivable states plus [`DriveLevel::Error`], which is never driven
/// directly and only appears as the result of merging two conflicting
/// drivers on the same bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DriveLevel {
    HighZ,
    WeakLow,
    WeakHigh,
    StrongLow,
    StrongHigh,
    Error,
}

impl DriveLevel {
    /// All drivable levels, i.e. everything except [`DriveLevel::Error`].
    pub const DRIVABLE: [DriveLevel; 5] =
        [DriveLevel::HighZ, DriveLevel::WeakLow, DriveLevel::WeakHigh, DriveLevel::StrongLow, DriveLevel::StrongHigh];

    /// All six levels.
    pub const ALL: [DriveLevel; 6] = [
        DriveLevel::HighZ,
        DriveLevel::WeakLow,
        DriveLevel::WeakHigh,
        DriveLevel::StrongLow,
        DriveLevel::StrongHigh,
        DriveLevel::Error,
    ];

    /// Resolves two drivers sharing one bit of a net.
    ///
    /// Commutative and associative. High-Z is the identity element, strong
    /// drive beats weak drive, and equal-strength opposite polarities
    /// conflict. `Error` is absorbing.
    pub fn combine(self, other: DriveLevel) -> DriveLevel {
        use DriveLevel::*;
        match (self, other) {
            (Error, _) | (_, Error) => Error,
            (HighZ, other) => other,
            (level, HighZ) => level,
            (StrongHigh, StrongLow) | (StrongLow, StrongHigh) => Error,
            (StrongHigh, _) | (_, StrongHigh) => StrongHigh,
            (StrongLow, _) | (_, StrongLow) => StrongLow,
            (WeakHigh, WeakLow) | (WeakLow, WeakHigh) => Error,
            (WeakHigh, WeakHigh) => WeakHigh,
            (WeakLow, WeakLow) => WeakLow,
        }
    }

    /// Builds a level from the `(value, high_z, strong)` bit triple of a
    /// signal. A floating bit is high-Z regardless of the other two masks.
    pub fn from_bits(value: bool, high_z: bool, strong: bool) -> DriveLevel {
        match (high_z, strong, value) {
            (true, _, _) => DriveLevel::HighZ,
            (false, true, true) => DriveLevel::StrongHigh,
            (false, true, false) => DriveLevel::StrongLow,
            (false, false, true) => DriveLevel::WeakHigh,
            (false, false, false) => DriveLevel::WeakLow,
        }
    }

    /// Decomposes into the `(value, high_z, strong)` bit triple, or `None`
    /// for `Error`, which has no signal representation.
    pub fn bits(self) -> Option<(bool, bool, bool)> {
        match self {
            DriveLevel::HighZ => Some((false, true, false)),
            DriveLevel::WeakLow => Some((false, false, false)),
            DriveLevel::WeakHigh => Some((true, false, false)),
            DriveLevel::StrongLow => Some((false, false, true)),
            DriveLevel::StrongHigh => Some((true, false, true)),
            DriveLevel::Error => None,
        }
    }

    pub fn is_error(self) -> bool {
        self == DriveLevel::Error
    }

    pub fn to_char(self) -> char {
        match self {
            DriveLevel::HighZ => 'Z',
            DriveLevel::WeakLow => 'L',
            DriveLevel::WeakHigh => 'H',
            DriveLevel::StrongLow => '0',
            DriveLevel::StrongHigh => '1',
            DriveLevel::Error => 'X',
        }
    }

    pub fn from_char(c: char) -> Option<DriveLevel> {
        match c {
            'Z' | 'z' => Some(DriveLevel::HighZ),
            'L' | 'l' => Some(DriveLevel::WeakLow),
            'H' | 'h' => Some(DriveLevel::WeakHigh),
            '0' => Some(DriveLevel::StrongLow),
            '1' => Some(DriveLevel::StrongHigh),
            'X' | 'x' => Some(DriveLevel::Error),
            _ => None,
        }
    }

    pub fn repeat(self, count: usize) -> Levels {
        Levels::from_iter(std::iter::repeat_n(self, count))
    }
}

impl Display for DriveLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// A sequence of [`DriveLevel`]s, one per bit, stored LSB first.
///
/// This is the unpacked, diagnostic-friendly view of a signal's three
/// bitmasks; the merge engine itself works on the packed masks.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Levels(Vec<DriveLevel>);

impl Levels {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Levels(Vec::new())
    }

    /// Creates an all-high-Z sequence of given width.
    pub fn high_z(width: usize) -> Self {
        DriveLevel::HighZ.repeat(width)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = DriveLevel> + ExactSizeIterator + '_ {
        self.0.iter().copied()
    }

    pub fn push(&mut self, level: DriveLevel) {
        self.0.push(level);
    }

    pub fn has_error(&self) -> bool {
        self.iter().any(DriveLevel::is_error)
    }

    /// Bitmask with a 1 for every `Error` position.
    pub fn error_mask(&self) -> u64 {
        let mut mask = 0;
        for (index, level) in self.iter().enumerate() {
            if level.is_error() {
                mask |= 1 << index;
            }
        }
        mask
    }

    /// Packs into `(value, high_z, strong)` masks, or `None` if any bit is
    /// `Error`.
    pub fn to_masks(&self) -> Option<(u64, u64, u64)> {
        let (mut value, mut high_z, mut strong) = (0u64, 0u64, 0u64);
        for (index, level) in self.iter().enumerate() {
            let (v, z, s) = level.bits()?;
            value |= (v as u64) << index;
            high_z |= (z as u64) << index;
            strong |= (s as u64) << index;
        }
        Some((value, high_z, strong))
    }

    /// Unpacks signal masks into per-bit levels.
    pub fn from_masks(width: u32, value: u64, high_z: u64, strong: u64) -> Levels {
        Levels::from_masks_with_error(width, value, high_z, strong, 0)
    }

    /// Unpacks signal masks plus a merge error mask into per-bit levels.
    pub fn from_masks_with_error(width: u32, value: u64, high_z: u64, strong: u64, error: u64) -> Levels {
        Levels::from_iter((0..width as usize).map(|index| {
            if error >> index & 1 != 0 {
                DriveLevel::Error
            } else {
                DriveLevel::from_bits(value >> index & 1 != 0, high_z >> index & 1 != 0, strong >> index & 1 != 0)
            }
        }))
    }

    /// Elementwise [`DriveLevel::combine`]. Both sides must have the same
    /// width.
    pub fn combine(&self, other: &Levels) -> Levels {
        assert_eq!(self.len(), other.len(), "levels of different width cannot be combined");
        Levels::from_iter(self.iter().zip(other.iter()).map(|(a, b)| a.combine(b)))
    }
}

impl Debug for Levels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Levels(\"{self}\")")
    }
}

impl Display for Levels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // MSB first, like the text notation it parses from
        for level in self.iter().rev() {
            write!(f, "{level}")?;
        }
        Ok(())
    }
}

impl<I: SliceIndex<[DriveLevel]>> std::ops::Index<I> for Levels {
    type Output = I::Output;

    fn index(&self, index: I) -> &Self::Output {
        &self.0[index]
    }
}

impl From<DriveLevel> for Levels {
    fn from(level: DriveLevel) -> Self {
        Levels(vec![level])
    }
}

impl From<&[DriveLevel]> for Levels {
    fn from(levels: &[DriveLevel]) -> Self {
        Levels(levels.to_vec())
    }
}

impl<const N: usize> From<[DriveLevel; N]> for Levels {
    fn from(levels: [DriveLevel; N]) -> Self {
        Levels(levels.to_vec())
    }
}

impl FromIterator<DriveLevel> for Levels {
    fn from_iter<T: IntoIterator<Item = DriveLevel>>(iter: T) -> Self {
        Levels(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Levels {
    type Item = DriveLevel;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, DriveLevel>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}

/// Error parsing the textual drive-level notation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelsError {
    pub offset: usize,
    pub found: char,
}

impl Display for ParseLevelsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unexpected character {:?} at offset {} in drive levels", self.found, self.offset)
    }
}

impl std::error::Error for ParseLevelsError {}

impl FromStr for Levels {
    type Err = ParseLevelsError;

    /// Parses MSB-first level characters (`Z L H 0 1 X`, case insensitive).
    /// Whitespace and `_` separators are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.into_tokens();
        let mut levels = Vec::new();
        loop {
            let location = tokens.location();
            let Some(c) = tokens.next() else { break };
            if c.is_whitespace() || c == '_' {
                continue;
            }
            match DriveLevel::from_char(c) {
                Some(level) => levels.push(level),
                None => return Err(ParseLevelsError { offset: location.offset(), found: c }),
            }
        }
        levels.reverse();
        Ok(Levels(levels))
    }
}
