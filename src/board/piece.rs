/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use anyhow::{anyhow, Result};

/// The color of a player or piece.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Color {
    #[default]
    White = 0,
    Black = 1,
}

impl Color {
    /// Number of colors.
    pub const COUNT: usize = 2;

    /// Both colors, in order.
    #[inline(always)]
    pub const fn all() -> [Self; Self::COUNT] {
        [Self::White, Self::Black]
    }

    /// Index of this [`Color`], for array accesses.
    #[inline(always)]
    pub const fn index(&self) -> usize {
        *self as usize
    }

    /// Fetch the opposite [`Color`].
    ///
    /// # Example
    /// ```
    /// # use skink::Color;
    /// assert_eq!(Color::White.opponent(), Color::Black);
    /// assert_eq!(Color::Black.opponent(), Color::White);
    /// ```
    #[inline(always)]
    pub const fn opponent(&self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Returns `true` if this color is White.
    #[inline(always)]
    pub const fn is_white(&self) -> bool {
        matches!(self, Self::White)
    }

    /// Returns `true` if this color is Black.
    #[inline(always)]
    pub const fn is_black(&self) -> bool {
        matches!(self, Self::Black)
    }

    /// `1` for White, `-1` for Black. Used to orient White-relative scores.
    #[inline(always)]
    pub const fn sign(&self) -> i32 {
        match self {
            Self::White => 1,
            Self::Black => -1,
        }
    }

    /// Human-readable name of this color.
    #[inline(always)]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::White => "White",
            Self::Black => "Black",
        }
    }
}

impl fmt::Display for Color {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => write!(f, "w"),
            Self::Black => write!(f, "b"),
        }
    }
}

/// The kind of a chess piece, independent of its color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PieceKind {
    Pawn = 0,
    Knight = 1,
    Bishop = 2,
    Rook = 3,
    Queen = 4,
    King = 5,
}

impl PieceKind {
    /// Number of piece kinds.
    pub const COUNT: usize = 6;

    /// All piece kinds, in order of increasing value.
    #[inline(always)]
    pub const fn all() -> [Self; Self::COUNT] {
        [
            Self::Pawn,
            Self::Knight,
            Self::Bishop,
            Self::Rook,
            Self::Queen,
            Self::King,
        ]
    }

    /// Index of this [`PieceKind`], for array accesses.
    #[inline(always)]
    pub const fn index(&self) -> usize {
        *self as usize
    }

    /// Construct a [`PieceKind`] from an index in `0..6`, without bounds checking.
    #[inline(always)]
    pub const fn from_index_unchecked(index: usize) -> Self {
        match index {
            0 => Self::Pawn,
            1 => Self::Knight,
            2 => Self::Bishop,
            3 => Self::Rook,
            4 => Self::Queen,
            _ => Self::King,
        }
    }

    /// Lowercase character for this kind, as used in UCI promotion suffixes.
    #[inline(always)]
    pub const fn char(&self) -> char {
        match self {
            Self::Pawn => 'p',
            Self::Knight => 'n',
            Self::Bishop => 'b',
            Self::Rook => 'r',
            Self::Queen => 'q',
            Self::King => 'k',
        }
    }

    /// Construct a [`PieceKind`] from a (case-insensitive) character.
    #[inline(always)]
    pub fn from_char(c: char) -> Result<Self> {
        match c.to_ascii_lowercase() {
            'p' => Ok(Self::Pawn),
            'n' => Ok(Self::Knight),
            'b' => Ok(Self::Bishop),
            'r' => Ok(Self::Rook),
            'q' => Ok(Self::Queen),
            'k' => Ok(Self::King),
            _ => Err(anyhow!("invalid piece character {c:?}")),
        }
    }

    /// Human-readable name of this kind.
    #[inline(always)]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Pawn => "Pawn",
            Self::Knight => "Knight",
            Self::Bishop => "Bishop",
            Self::Rook => "Rook",
            Self::Queen => "Queen",
            Self::King => "King",
        }
    }
}

impl fmt::Display for PieceKind {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.char())
    }
}

/// A colored chess piece.
///
/// Internally a single byte: `color * 6 + kind`, so White pieces occupy
/// indices `0..6` and Black pieces `6..12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Piece(u8);

impl Piece {
    /// Number of distinct pieces (6 kinds × 2 colors).
    pub const COUNT: usize = 12;

    pub const WHITE_PAWN: Self = Self::new(Color::White, PieceKind::Pawn);
    pub const WHITE_KNIGHT: Self = Self::new(Color::White, PieceKind::Knight);
    pub const WHITE_BISHOP: Self = Self::new(Color::White, PieceKind::Bishop);
    pub const WHITE_ROOK: Self = Self::new(Color::White, PieceKind::Rook);
    pub const WHITE_QUEEN: Self = Self::new(Color::White, PieceKind::Queen);
    pub const WHITE_KING: Self = Self::new(Color::White, PieceKind::King);
    pub const BLACK_PAWN: Self = Self::new(Color::Black, PieceKind::Pawn);
    pub const BLACK_KNIGHT: Self = Self::new(Color::Black, PieceKind::Knight);
    pub const BLACK_BISHOP: Self = Self::new(Color::Black, PieceKind::Bishop);
    pub const BLACK_ROOK: Self = Self::new(Color::Black, PieceKind::Rook);
    pub const BLACK_QUEEN: Self = Self::new(Color::Black, PieceKind::Queen);
    pub const BLACK_KING: Self = Self::new(Color::Black, PieceKind::King);

    /// Construct a new [`Piece`] from a [`Color`] and a [`PieceKind`].
    ///
    /// # Example
    /// ```
    /// # use skink::{Color, Piece, PieceKind};
    /// let piece = Piece::new(Color::Black, PieceKind::Knight);
    /// assert_eq!(piece.color(), Color::Black);
    /// assert_eq!(piece.kind(), PieceKind::Knight);
    /// ```
    #[inline(always)]
    pub const fn new(color: Color, kind: PieceKind) -> Self {
        Self(color as u8 * PieceKind::COUNT as u8 + kind as u8)
    }

    /// All pieces, White first.
    #[inline(always)]
    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT as u8).map(Self)
    }

    /// Index of this [`Piece`], for array accesses.
    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Construct a [`Piece`] from an index in `0..12`, without bounds checking.
    #[inline(always)]
    pub const fn from_index_unchecked(index: usize) -> Self {
        Self(index as u8)
    }

    /// Fetch the [`Color`] of this piece.
    #[inline(always)]
    pub const fn color(&self) -> Color {
        if self.0 < PieceKind::COUNT as u8 {
            Color::White
        } else {
            Color::Black
        }
    }

    /// Fetch the [`PieceKind`] of this piece.
    #[inline(always)]
    pub const fn kind(&self) -> PieceKind {
        PieceKind::from_index_unchecked((self.0 % PieceKind::COUNT as u8) as usize)
    }

    /// Returns `true` if this piece is White.
    #[inline(always)]
    pub const fn is_white(&self) -> bool {
        self.color().is_white()
    }

    /// This piece after promotion to `kind` (same color).
    #[inline(always)]
    pub const fn promoted(&self, kind: PieceKind) -> Self {
        Self::new(self.color(), kind)
    }

    /// FEN character for this piece: uppercase for White, lowercase for Black.
    ///
    /// # Example
    /// ```
    /// # use skink::Piece;
    /// assert_eq!(Piece::WHITE_KNIGHT.char(), 'N');
    /// assert_eq!(Piece::BLACK_QUEEN.char(), 'q');
    /// ```
    #[inline(always)]
    pub const fn char(&self) -> char {
        let c = self.kind().char();
        if self.is_white() {
            c.to_ascii_uppercase()
        } else {
            c
        }
    }

    /// Construct a [`Piece`] from a FEN character.
    #[inline(always)]
    pub fn from_char(c: char) -> Result<Self> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Ok(Self::new(color, PieceKind::from_char(c)?))
    }

    /// Human-readable name, like `White Knight`.
    #[inline(always)]
    pub fn name(&self) -> String {
        format!("{} {}", self.color().name(), self.kind().name())
    }
}

impl fmt::Display for Piece {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.char())
    }
}
