/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, str::FromStr};

use anyhow::{anyhow, bail, Result};

use super::{
    bishop_attacks, bishop_rays, king_attacks, knight_attacks, pawn_attacks, ray_between,
    rook_attacks, rook_rays, Bitboard, Color, File, Move, Piece, PieceKind, Rank, Square,
    ZobristKey,
};

/// FEN string of the starting position of standard chess.
pub const FEN_STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// FEN string of the "kiwipete" position, a dense tactical test position.
pub const FEN_KIWIPETE: &str =
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

/// The four castling permissions, packed into a 4-bit mask.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const WHITE_KINGSIDE: u8 = 1;
    pub const WHITE_QUEENSIDE: u8 = 2;
    pub const BLACK_KINGSIDE: u8 = 4;
    pub const BLACK_QUEENSIDE: u8 = 8;

    /// No castling possible for either side.
    pub const NONE: Self = Self(0);

    /// All four castling rights.
    pub const ALL: Self = Self(0b1111);

    /// Returns `true` if `color` may still castle kingside.
    #[inline(always)]
    pub const fn kingside(&self, color: Color) -> bool {
        self.0 & (Self::WHITE_KINGSIDE << (color as u8 * 2)) != 0
    }

    /// Returns `true` if `color` may still castle queenside.
    #[inline(always)]
    pub const fn queenside(&self, color: Color) -> bool {
        self.0 & (Self::WHITE_QUEENSIDE << (color as u8 * 2)) != 0
    }

    /// Index of this mask, for Zobrist key lookups.
    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Remove any rights lost by a move between `from` and `to`.
    ///
    /// A king leaving its home square loses both rights; a rook leaving (or
    /// being captured on) a corner square loses that corner's right.
    #[inline(always)]
    pub fn update(&mut self, from: Square, to: Square) {
        self.0 &= RIGHTS_KEPT[from.index()] & RIGHTS_KEPT[to.index()];
    }

    /// Parse the castling field of a FEN string.
    pub fn from_uci(s: &str) -> Result<Self> {
        if s == "-" {
            return Ok(Self::NONE);
        }

        let mut rights = 0;
        for c in s.chars() {
            rights |= match c {
                'K' => Self::WHITE_KINGSIDE,
                'Q' => Self::WHITE_QUEENSIDE,
                'k' => Self::BLACK_KINGSIDE,
                'q' => Self::BLACK_QUEENSIDE,
                _ => bail!("invalid castling character {c:?}"),
            };
        }
        Ok(Self(rights))
    }
}

impl fmt::Display for CastlingRights {
    /// Formats in canonical FEN order (`KQkq`), or `-` if empty.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "-");
        }

        for (bit, c) in [
            (Self::WHITE_KINGSIDE, 'K'),
            (Self::WHITE_QUEENSIDE, 'Q'),
            (Self::BLACK_KINGSIDE, 'k'),
            (Self::BLACK_QUEENSIDE, 'q'),
        ] {
            if self.0 & bit != 0 {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

/// For each square, the castling rights that *survive* a piece moving from
/// or to that square.
const RIGHTS_KEPT: [u8; Square::COUNT] = {
    let mut kept = [0b1111u8; Square::COUNT];
    kept[Square::A1.index()] = 0b1111 & !CastlingRights::WHITE_QUEENSIDE;
    kept[Square::H1.index()] = 0b1111 & !CastlingRights::WHITE_KINGSIDE;
    kept[Square::E1.index()] =
        0b1111 & !(CastlingRights::WHITE_KINGSIDE | CastlingRights::WHITE_QUEENSIDE);
    kept[Square::A8.index()] = 0b1111 & !CastlingRights::BLACK_QUEENSIDE;
    kept[Square::H8.index()] = 0b1111 & !CastlingRights::BLACK_KINGSIDE;
    kept[Square::E8.index()] =
        0b1111 & !(CastlingRights::BLACK_KINGSIDE | CastlingRights::BLACK_QUEENSIDE);
    kept
};

/// Everything required to exactly invert one [`Position::make_move`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UndoRecord {
    /// Zobrist key of the position before the move.
    pub(crate) key: ZobristKey,
    /// The captured piece, if the move was a capture.
    captured: Option<Piece>,
    /// Castling rights before the move.
    castling_rights: CastlingRights,
    /// En passant square before the move.
    ep_square: Option<Square>,
    /// Halfmove clock before the move.
    halfmove: u16,
    /// Check and pin caches of the previous side to move.
    checkers: Bitboard,
    checkmask: Bitboard,
    pinned: Bitboard,
    double_check: bool,
}

/// A chess position.
///
/// Holds piece bitboards, a mailbox for O(1) square lookups, cached
/// occupancies and king squares, the Zobrist key (maintained incrementally),
/// and the check/pin caches for the side to move. Mutation happens only
/// through [`Position::make_move`] / [`Position::unmake_move`] (and their
/// null-move counterparts), which push and pop [`UndoRecord`]s in LIFO order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// One bitboard per colored piece kind.
    pieces: [Bitboard; Piece::COUNT],

    /// Cached per-color occupancy; always the union of that color's boards.
    occupancy: [Bitboard; Color::COUNT],

    /// Cached total occupancy.
    occupied: Bitboard,

    /// Which piece (if any) sits on each square.
    mailbox: [Option<Piece>; Square::COUNT],

    /// The player whose turn it is.
    side_to_move: Color,

    /// The 4-bit castling mask.
    castling_rights: CastlingRights,

    /// The square a pawn would land on when capturing en passant, if the
    /// previous move was a double push.
    ep_square: Option<Square>,

    /// Plies since the last pawn move or capture, for the 50-move rule.
    halfmove: u16,

    /// Full moves played; increments after Black's move.
    fullmove: u16,

    /// Cached king squares, one per color.
    king_square: [Square; Color::COUNT],

    /// Incrementally-maintained Zobrist key.
    key: ZobristKey,

    /// Enemy pieces currently giving check to the side to move.
    checkers: Bitboard,

    /// Legal destination mask for non-king moves: every non-friendly square
    /// when not in check, otherwise the squares that block or capture the
    /// single checker.
    checkmask: Bitboard,

    /// Friendly pieces that are pinned to the king.
    pinned: Bitboard,

    /// `true` iff two pieces are giving check simultaneously.
    double_check: bool,

    /// LIFO stack of undo records, one per made move.
    undo_stack: Vec<UndoRecord>,
}

impl Position {
    /// Construct the standard starting position.
    #[inline(always)]
    pub fn new() -> Self {
        // Safe unwrap: the starting FEN is well-formed.
        Self::from_fen(FEN_STARTPOS).unwrap()
    }

    /// Parse a [`Position`] from a FEN string.
    ///
    /// The halfmove clock and fullmove number may be omitted, defaulting to
    /// `0` and `1`. Malformed input is rejected.
    ///
    /// # Example
    /// ```
    /// # use skink::Position;
    /// skink::init();
    /// assert!(Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").is_ok());
    /// assert!(Position::from_fen("not a fen").is_err());
    /// ```
    pub fn from_fen(fen: &str) -> Result<Self> {
        let mut fields = fen.split_ascii_whitespace();

        let placement = fields
            .next()
            .ok_or_else(|| anyhow!("FEN is missing the piece placement field"))?;

        let mut pieces = [Bitboard::EMPTY; Piece::COUNT];
        let mut mailbox = [None; Square::COUNT];

        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            bail!("FEN placement must have 8 ranks, got {}", ranks.len());
        }

        for (i, rank_str) in ranks.iter().enumerate() {
            // FEN lists rank 8 first.
            let rank = Rank::new_unchecked(7 - i as u8);
            let mut file = 0u8;

            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as u8;
                } else {
                    let piece = Piece::from_char(c)?;
                    if file >= 8 {
                        bail!("rank {rank} of FEN {placement:?} overflows the board");
                    }
                    let square = Square::new(File::new_unchecked(file), rank);
                    pieces[piece.index()] |= square;
                    mailbox[square.index()] = Some(piece);
                    file += 1;
                }
            }

            if file != 8 {
                bail!("rank {rank} of FEN {placement:?} does not span 8 files");
            }
        }

        let side_to_move = match fields.next() {
            Some("w") => Color::White,
            Some("b") => Color::Black,
            other => bail!("invalid active color field {other:?}"),
        };

        let castling_rights = CastlingRights::from_uci(
            fields
                .next()
                .ok_or_else(|| anyhow!("FEN is missing the castling field"))?,
        )?;

        let ep_square = match fields.next() {
            Some("-") => None,
            Some(s) => Some(Square::from_uci(s)?),
            None => bail!("FEN is missing the en passant field"),
        };

        let halfmove = match fields.next() {
            Some(s) => s.parse().map_err(|_| anyhow!("invalid halfmove clock {s:?}"))?,
            None => 0,
        };

        let fullmove = match fields.next() {
            Some(s) => s.parse().map_err(|_| anyhow!("invalid fullmove number {s:?}"))?,
            None => 1,
        };

        // Each side must have exactly one king, or the check/pin caches are meaningless.
        let mut king_square = [Square::default(); Color::COUNT];
        for color in Color::all() {
            let kings = pieces[Piece::new(color, PieceKind::King).index()];
            if kings.population() != 1 {
                bail!("{} must have exactly one king", color.name());
            }
            king_square[color.index()] = kings.lsb_unchecked();
        }

        let mut occupancy = [Bitboard::EMPTY; Color::COUNT];
        for piece in Piece::all() {
            occupancy[piece.color().index()] |= pieces[piece.index()];
        }

        let mut position = Self {
            pieces,
            occupancy,
            occupied: occupancy[0] | occupancy[1],
            mailbox,
            side_to_move,
            castling_rights,
            ep_square,
            halfmove,
            fullmove,
            king_square,
            key: ZobristKey::default(),
            checkers: Bitboard::EMPTY,
            checkmask: Bitboard::EMPTY,
            pinned: Bitboard::EMPTY,
            double_check: false,
            undo_stack: Vec::with_capacity(128),
        };

        position.key = ZobristKey::new(&position);
        position.recompute_check_info();

        Ok(position)
    }

    /// Serialize this position as a FEN string.
    ///
    /// Castling rights appear in canonical `KQkq` order and runs of empty
    /// squares are collapsed, so `to_fen` round-trips with [`Position::from_fen`].
    pub fn to_fen(&self) -> String {
        let mut fen = String::with_capacity(90);

        for rank in Rank::iter().rev() {
            let mut empty = 0;
            for file in File::iter() {
                match self.piece_at(Square::new(file, rank)) {
                    Some(piece) => {
                        if empty > 0 {
                            fen.push((b'0' + empty) as char);
                            empty = 0;
                        }
                        fen.push(piece.char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push((b'0' + empty) as char);
            }
            if rank != Rank::ONE {
                fen.push('/');
            }
        }

        let ep = self
            .ep_square
            .map(|sq| sq.to_string())
            .unwrap_or_else(|| String::from("-"));

        fen.push_str(&format!(
            " {} {} {ep} {} {}",
            self.side_to_move, self.castling_rights, self.halfmove, self.fullmove
        ));

        fen
    }

    /// The piece on `square`, if any.
    #[inline(always)]
    pub const fn piece_at(&self, square: Square) -> Option<Piece> {
        self.mailbox[square.index()]
    }

    /// The player whose turn it is.
    #[inline(always)]
    pub const fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    /// The current castling rights mask.
    #[inline(always)]
    pub const fn castling_rights(&self) -> CastlingRights {
        self.castling_rights
    }

    /// The en passant target square, if the last move was a double push.
    #[inline(always)]
    pub const fn ep_square(&self) -> Option<Square> {
        self.ep_square
    }

    /// Plies since the last pawn move or capture.
    #[inline(always)]
    pub const fn halfmove(&self) -> u16 {
        self.halfmove
    }

    /// Full moves played.
    #[inline(always)]
    pub const fn fullmove(&self) -> u16 {
        self.fullmove
    }

    /// The Zobrist key of this position.
    #[inline(always)]
    pub const fn key(&self) -> ZobristKey {
        self.key
    }

    /// Bitboard of all pieces of the given colored kind.
    #[inline(always)]
    pub const fn pieces(&self, piece: Piece) -> Bitboard {
        self.pieces[piece.index()]
    }

    /// Bitboard of all pieces of `color`.
    #[inline(always)]
    pub const fn color(&self, color: Color) -> Bitboard {
        self.occupancy[color.index()]
    }

    /// Bitboard of every occupied square.
    #[inline(always)]
    pub const fn occupied(&self) -> Bitboard {
        self.occupied
    }

    /// Bitboard of both colors of `kind`.
    #[inline(always)]
    pub const fn kind(&self, kind: PieceKind) -> Bitboard {
        self.pieces(Piece::new(Color::White, kind))
            .or(self.pieces(Piece::new(Color::Black, kind)))
    }

    /// Bitboard of `color`'s pawns.
    #[inline(always)]
    pub const fn pawns(&self, color: Color) -> Bitboard {
        self.pieces(Piece::new(color, PieceKind::Pawn))
    }

    /// Bitboard of `color`'s knights.
    #[inline(always)]
    pub const fn knights(&self, color: Color) -> Bitboard {
        self.pieces(Piece::new(color, PieceKind::Knight))
    }

    /// Bitboard of `color`'s bishops and queens.
    #[inline(always)]
    pub const fn diagonal_sliders(&self, color: Color) -> Bitboard {
        self.pieces(Piece::new(color, PieceKind::Bishop))
            .or(self.pieces(Piece::new(color, PieceKind::Queen)))
    }

    /// Bitboard of `color`'s rooks and queens.
    #[inline(always)]
    pub const fn orthogonal_sliders(&self, color: Color) -> Bitboard {
        self.pieces(Piece::new(color, PieceKind::Rook))
            .or(self.pieces(Piece::new(color, PieceKind::Queen)))
    }

    /// Bitboard of `color`'s bishops, rooks, and queens.
    #[inline(always)]
    pub const fn sliders(&self, color: Color) -> Bitboard {
        self.diagonal_sliders(color).or(self.orthogonal_sliders(color))
    }

    /// The square of `color`'s king.
    #[inline(always)]
    pub const fn king_square(&self, color: Color) -> Square {
        self.king_square[color.index()]
    }

    /// Enemy pieces currently giving check.
    #[inline(always)]
    pub const fn checkers(&self) -> Bitboard {
        self.checkers
    }

    /// Legal destination mask for non-king moves.
    #[inline(always)]
    pub const fn checkmask(&self) -> Bitboard {
        self.checkmask
    }

    /// Friendly pieces pinned to the king.
    #[inline(always)]
    pub const fn pinned(&self) -> Bitboard {
        self.pinned
    }

    /// Returns `true` if the side to move is in check.
    #[inline(always)]
    pub const fn in_check(&self) -> bool {
        self.checkers.is_nonempty()
    }

    /// Returns `true` if the side to move is checked by two pieces at once.
    #[inline(always)]
    pub const fn in_double_check(&self) -> bool {
        self.double_check
    }

    /// Returns `true` if `color` has any pieces besides pawns and the king.
    ///
    /// Null-move pruning is unsound without such material (zugzwang).
    #[inline(always)]
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        (self.color(color) ^ self.pawns(color) ^ self.king_square(color).bitboard()).is_nonempty()
    }

    /// Returns `true` if the current position occurred before, within the
    /// reversible tail of the game (the last `halfmove` plies).
    #[inline(always)]
    pub fn is_repetition(&self) -> bool {
        self.undo_stack
            .iter()
            .rev()
            .take(self.halfmove as usize)
            .any(|undo| undo.key == self.key)
    }

    /// Apply `mv` to this position.
    ///
    /// The move must be legal; feeding anything else corrupts the position.
    /// Pushes an [`UndoRecord`] so the move can be reverted with
    /// [`Position::unmake_move`].
    pub fn make_move(&mut self, mv: Move) {
        let from = mv.from();
        let to = mv.to();
        let Some(piece) = self.piece_at(from) else {
            return;
        };
        let color = piece.color();

        // En passant captures a pawn that is not on the destination square.
        let victim_square = if mv.is_en_passant() {
            // EP destinations are on ranks 3 and 6; there is always a square behind.
            to.backward(color).unwrap_or(to)
        } else {
            to
        };
        let captured = if mv.is_capture() {
            self.piece_at(victim_square)
        } else {
            None
        };

        self.undo_stack.push(UndoRecord {
            key: self.key,
            captured,
            castling_rights: self.castling_rights,
            ep_square: self.ep_square,
            halfmove: self.halfmove,
            checkers: self.checkers,
            checkmask: self.checkmask,
            pinned: self.pinned,
            double_check: self.double_check,
        });

        // Un-hash every attribute that is about to change.
        self.key.hash_side_to_move(self.side_to_move);
        self.key.hash_castling_rights(self.castling_rights);
        if let Some(ep) = self.ep_square.take() {
            self.key.hash_ep_file(ep.file());
        }

        self.halfmove += 1;
        if color.is_black() {
            self.fullmove += 1;
        }

        // Lift the moving piece.
        self.remove_piece(piece, from);
        self.key.hash_piece(from, piece);

        if let Some(victim) = captured {
            self.remove_piece(victim, victim_square);
            self.key.hash_piece(victim_square, victim);
            self.halfmove = 0;
        }

        if piece.kind() == PieceKind::Pawn {
            self.halfmove = 0;
        }

        // Castling moves the rook as well.
        if let Some((rook_from_file, rook_to_file)) = castled_rook_files(mv) {
            let rank = Rank::first(color);
            let rook = Piece::new(color, PieceKind::Rook);
            let rook_from = Square::new(rook_from_file, rank);
            let rook_to = Square::new(rook_to_file, rank);

            self.remove_piece(rook, rook_from);
            self.key.hash_piece(rook_from, rook);
            self.add_piece(rook, rook_to);
            self.key.hash_piece(rook_to, rook);
        }

        // Drop the piece (possibly promoted) on its destination.
        let placed = match mv.promotion() {
            Some(kind) => piece.promoted(kind),
            None => piece,
        };
        self.add_piece(placed, to);
        self.key.hash_piece(to, placed);

        // A double push opens an en passant opportunity on the skipped square.
        if mv.is_pawn_double_push() {
            if let Some(ep) = from.forward(color) {
                self.ep_square = Some(ep);
                self.key.hash_ep_file(ep.file());
            }
        }

        self.castling_rights.update(from, to);
        self.key.hash_castling_rights(self.castling_rights);

        self.side_to_move = color.opponent();
        self.key.hash_side_to_move(self.side_to_move);

        self.recompute_check_info();
    }

    /// Revert the most recent [`Position::make_move`], which must have
    /// applied `mv`.
    ///
    /// Restores every observable attribute, including the Zobrist key and
    /// the check/pin caches, byte for byte.
    pub fn unmake_move(&mut self, mv: Move) {
        let Some(undo) = self.undo_stack.pop() else {
            return;
        };

        // The mover becomes the side to move again.
        let color = self.side_to_move.opponent();
        self.side_to_move = color;
        if color.is_black() {
            self.fullmove -= 1;
        }

        let from = mv.from();
        let to = mv.to();

        // Lift the landed piece; a promotion reverts to the original pawn.
        if let Some(placed) = self.piece_at(to) {
            self.remove_piece(placed, to);
            let piece = if mv.is_promotion() {
                Piece::new(color, PieceKind::Pawn)
            } else {
                placed
            };
            self.add_piece(piece, from);
        }

        // Walk the castled rook back.
        if let Some((rook_from_file, rook_to_file)) = castled_rook_files(mv) {
            let rank = Rank::first(color);
            let rook = Piece::new(color, PieceKind::Rook);
            self.remove_piece(rook, Square::new(rook_to_file, rank));
            self.add_piece(rook, Square::new(rook_from_file, rank));
        }

        // Resurrect the captured piece.
        if let Some(victim) = undo.captured {
            let victim_square = if mv.is_en_passant() {
                to.backward(color).unwrap_or(to)
            } else {
                to
            };
            self.add_piece(victim, victim_square);
        }

        self.castling_rights = undo.castling_rights;
        self.ep_square = undo.ep_square;
        self.halfmove = undo.halfmove;
        self.key = undo.key;
        self.checkers = undo.checkers;
        self.checkmask = undo.checkmask;
        self.pinned = undo.pinned;
        self.double_check = undo.double_check;
    }

    /// Pass the turn without moving.
    ///
    /// Clears the en passant square, increments the halfmove clock, and
    /// flips the side to move. Must not be called while in check.
    pub fn make_null_move(&mut self) {
        self.undo_stack.push(UndoRecord {
            key: self.key,
            captured: None,
            castling_rights: self.castling_rights,
            ep_square: self.ep_square,
            halfmove: self.halfmove,
            checkers: self.checkers,
            checkmask: self.checkmask,
            pinned: self.pinned,
            double_check: self.double_check,
        });

        self.key.hash_side_to_move(self.side_to_move);
        if let Some(ep) = self.ep_square.take() {
            self.key.hash_ep_file(ep.file());
        }

        self.halfmove += 1;
        self.side_to_move = self.side_to_move.opponent();
        self.key.hash_side_to_move(self.side_to_move);

        self.recompute_check_info();
    }

    /// Revert the most recent [`Position::make_null_move`].
    pub fn unmake_null_move(&mut self) {
        let Some(undo) = self.undo_stack.pop() else {
            return;
        };

        self.side_to_move = self.side_to_move.opponent();
        self.ep_square = undo.ep_square;
        self.halfmove = undo.halfmove;
        self.key = undo.key;
        self.checkers = undo.checkers;
        self.checkmask = undo.checkmask;
        self.pinned = undo.pinned;
        self.double_check = undo.double_check;
    }

    /// Bitboard of every square attacked by `color`, computed against the
    /// provided occupancy (which may differ from the board's, e.g. with the
    /// defending king removed so sliders see through it).
    pub(crate) fn attacks_by(&self, color: Color, occupied: Bitboard) -> Bitboard {
        let pawns = self.pawns(color).forward_by(color, 1);
        let mut attacks = pawns.east() | pawns.west();

        for square in self.knights(color) {
            attacks |= knight_attacks(square);
        }
        for square in self.diagonal_sliders(color) {
            attacks |= bishop_attacks(square, occupied);
        }
        for square in self.orthogonal_sliders(color) {
            attacks |= rook_attacks(square, occupied);
        }
        attacks |= king_attacks(self.king_square(color));

        attacks
    }

    /// Bitboard of every piece (either color) attacking `square`, computed
    /// against the provided occupancy. Used by the exchange evaluator.
    pub(crate) fn attackers_to(&self, square: Square, occupied: Bitboard) -> Bitboard {
        pawn_attacks(square, Color::White) & self.pawns(Color::Black)
            | pawn_attacks(square, Color::Black) & self.pawns(Color::White)
            | knight_attacks(square) & self.kind(PieceKind::Knight)
            | king_attacks(square) & self.kind(PieceKind::King)
            | bishop_attacks(square, occupied)
                & (self.diagonal_sliders(Color::White) | self.diagonal_sliders(Color::Black))
            | rook_attacks(square, occupied)
                & (self.orthogonal_sliders(Color::White) | self.orthogonal_sliders(Color::Black))
    }

    /// Recompute `checkers`, `checkmask`, `pinned`, and `double_check` for
    /// the side to move. Called after every make/unmake.
    fn recompute_check_info(&mut self) {
        let color = self.side_to_move;
        let opponent = color.opponent();
        let king = self.king_square(color);
        let occupied = self.occupied;

        self.pinned = Bitboard::EMPTY;

        // Knights and pawns check from the overlap of their attacks with the king.
        self.checkers = knight_attacks(king) & self.knights(opponent)
            | pawn_attacks(king, color) & self.pawns(opponent);

        // A slider aligned with the king is a checker if nothing stands
        // between them, and pins a lone friendly piece in between.
        let aligned = rook_rays(king) & self.orthogonal_sliders(opponent)
            | bishop_rays(king) & self.diagonal_sliders(opponent);

        for attacker in aligned {
            let between = ray_between(king, attacker);
            match (between & occupied).population() {
                0 => self.checkers |= attacker,
                1 => self.pinned |= between & self.color(color),
                _ => {}
            }
        }

        self.double_check = self.checkers.population() > 1;

        self.checkmask = if self.checkers.is_empty() {
            // Unrestricted: any square not occupied by a friendly piece.
            !self.color(color)
        } else {
            let mut mask = self.checkers;
            for checker in self.checkers {
                mask |= ray_between(king, checker);
            }
            mask
        };
    }

    /// Put `piece` on `square`, maintaining bitboards, mailbox, occupancy,
    /// and the king cache. Does not touch the Zobrist key.
    #[inline(always)]
    fn add_piece(&mut self, piece: Piece, square: Square) {
        self.pieces[piece.index()] |= square;
        self.occupancy[piece.color().index()] |= square;
        self.occupied |= square;
        self.mailbox[square.index()] = Some(piece);

        if piece.kind() == PieceKind::King {
            self.king_square[piece.color().index()] = square;
        }
    }

    /// Remove `piece` from `square`. Does not touch the Zobrist key.
    #[inline(always)]
    fn remove_piece(&mut self, piece: Piece, square: Square) {
        self.pieces[piece.index()] ^= square;
        self.occupancy[piece.color().index()] ^= square;
        self.occupied ^= square;
        self.mailbox[square.index()] = None;
    }
}

/// The rook's from/to files for a castling move, if `mv` is one.
#[inline(always)]
const fn castled_rook_files(mv: Move) -> Option<(File, File)> {
    if mv.is_short_castle() {
        Some((File::H, File::F))
    } else if mv.is_long_castle() {
        Some((File::A, File::D))
    } else {
        None
    }
}

impl Default for Position {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for Position {
    type Err = anyhow::Error;
    #[inline(always)]
    fn from_str(s: &str) -> Result<Self> {
        Self::from_fen(s)
    }
}

impl fmt::Display for Position {
    /// Renders the board with rank 8 at the top, plus the non-board state.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in Rank::iter().rev() {
            write!(f, "{rank}| ")?;
            for file in File::iter() {
                let c = self
                    .piece_at(Square::new(file, rank))
                    .map(|p| p.char())
                    .unwrap_or('.');
                write!(f, "{c} ")?;
            }
            writeln!(f)?;
        }
        writeln!(f, " +----------------\n   a b c d e f g h")?;
        writeln!(f)?;
        writeln!(f, "       Side: {}", self.side_to_move.name())?;
        writeln!(f, "   Castling: {}", self.castling_rights)?;
        let ep = self
            .ep_square
            .map(|sq| sq.to_string())
            .unwrap_or_else(|| String::from("-"));
        writeln!(f, " En passant: {ep}")?;
        writeln!(f, "     Clocks: {} half, {} full", self.halfmove, self.fullmove)?;
        write!(f, "        Key: {}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MoveKind;

    #[test]
    fn test_fen_round_trip() {
        crate::init();
        for fen in [
            FEN_STARTPOS,
            FEN_KIWIPETE,
            "8/8/8/8/8/8/4k3/R3K3 w Q - 3 40",
            "4k3/8/8/2pP4/8/8/8/4K3 w - c6 0 2",
        ] {
            let position = Position::from_fen(fen).unwrap();
            assert_eq!(position.to_fen(), fen, "FEN round-trip failed");
        }
    }

    #[test]
    fn test_fen_normalizes_clocks_and_castling_order() {
        crate::init();
        // Missing clocks default to "0 1".
        let position = Position::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - -").unwrap();
        assert_eq!(
            position.to_fen(),
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1"
        );
    }

    #[test]
    fn test_fen_rejects_malformed_input() {
        crate::init();
        // Too few ranks
        assert!(Position::from_fen("8/8/8 w - - 0 1").is_err());
        // Bad piece char
        assert!(Position::from_fen("8/8/8/8/3x4/8/8/8 w - - 0 1").is_err());
        // Overfull rank
        assert!(Position::from_fen("9/8/8/8/8/8/8/8 w - - 0 1").is_err());
        // No kings
        assert!(Position::from_fen("8/8/8/8/8/8/8/8 w - - 0 1").is_err());
        // Bad side
        assert!(Position::from_fen(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1"
        )
        .is_err());
    }

    #[test]
    fn test_occupancy_invariants() {
        crate::init();
        let position = Position::from_fen(FEN_KIWIPETE).unwrap();

        let mut white = Bitboard::EMPTY;
        let mut black = Bitboard::EMPTY;
        for piece in Piece::all() {
            if piece.is_white() {
                white |= position.pieces(piece);
            } else {
                black |= position.pieces(piece);
            }
        }

        assert_eq!(position.color(Color::White), white);
        assert_eq!(position.color(Color::Black), black);
        assert_eq!(position.occupied(), white | black);
        assert!((white & black).is_empty());

        // Mailbox agrees with the bitboards on every square.
        for square in Square::iter() {
            match position.piece_at(square) {
                Some(piece) => assert!(position.pieces(piece).contains(square)),
                None => assert!(!position.occupied().contains(square)),
            }
        }
    }

    #[test]
    fn test_make_unmake_restores_position() {
        crate::init();
        let mut position = Position::from_fen(FEN_KIWIPETE).unwrap();
        let before = position.clone();

        for mv in position.legal_moves() {
            position.make_move(mv);
            assert_ne!(position.key(), before.key(), "key unchanged by {mv}");
            assert_eq!(
                position.key(),
                ZobristKey::new(&position),
                "incremental key diverged after {mv}"
            );
            position.unmake_move(mv);
            assert_eq!(position, before, "unmake failed to restore after {mv}");
        }
    }

    #[test]
    fn test_null_move_symmetry() {
        crate::init();
        let mut position = Position::from_fen(FEN_KIWIPETE).unwrap();
        let before = position.clone();

        position.make_null_move();
        assert_ne!(position.key(), before.key());
        assert_eq!(position.side_to_move(), Color::Black);
        assert_eq!(position.key(), ZobristKey::new(&position));

        position.unmake_null_move();
        assert_eq!(position, before);
    }

    #[test]
    fn test_ep_square_set_only_after_double_push() {
        crate::init();
        let mut position = Position::new();

        position.make_move(Move::new(Square::E2, Square::E4, MoveKind::DoublePush));
        assert_eq!(position.ep_square(), Some(Square::E3));

        position.make_move(Move::new(Square::G8, Square::F6, MoveKind::Quiet));
        assert_eq!(position.ep_square(), None);
    }

    #[test]
    fn test_castling_updates_rook_and_rights() {
        crate::init();
        let mut position =
            Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();

        position.make_move(Move::new(Square::E1, Square::G1, MoveKind::ShortCastle));
        assert_eq!(position.piece_at(Square::G1), Some(Piece::WHITE_KING));
        assert_eq!(position.piece_at(Square::F1), Some(Piece::WHITE_ROOK));
        assert_eq!(position.piece_at(Square::H1), None);
        assert!(!position.castling_rights().kingside(Color::White));
        assert!(!position.castling_rights().queenside(Color::White));
        assert!(position.castling_rights().kingside(Color::Black));

        position.make_move(Move::new(Square::E8, Square::C8, MoveKind::LongCastle));
        assert_eq!(position.piece_at(Square::C8), Some(Piece::BLACK_KING));
        assert_eq!(position.piece_at(Square::D8), Some(Piece::BLACK_ROOK));
        assert_eq!(position.castling_rights(), CastlingRights::NONE);
    }

    #[test]
    fn test_fifty_move_clock() {
        crate::init();
        let mut position = Position::new();

        // A quiet knight move increments the clock...
        position.make_move(Move::new(Square::G1, Square::F3, MoveKind::Quiet));
        assert_eq!(position.halfmove(), 1);

        // ...and a pawn push resets it.
        position.make_move(Move::new(Square::E7, Square::E5, MoveKind::DoublePush));
        assert_eq!(position.halfmove(), 0);
    }

    #[test]
    fn test_repetition_detection() {
        crate::init();
        let mut position = Position::new();

        // Shuffle the knights out and back.
        for mv in [
            Move::new(Square::G1, Square::F3, MoveKind::Quiet),
            Move::new(Square::G8, Square::F6, MoveKind::Quiet),
            Move::new(Square::F3, Square::G1, MoveKind::Quiet),
        ] {
            position.make_move(mv);
            assert!(!position.is_repetition());
        }

        // Knight returns home: the starting position has now occurred twice.
        position.make_move(Move::new(Square::F6, Square::G8, MoveKind::Quiet));
        assert!(position.is_repetition());
    }
}
