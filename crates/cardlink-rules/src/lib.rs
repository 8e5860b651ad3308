//! Advisory rules checks for the Cardlink client.
//!
//! The server is authoritative: these functions only decide which moves the
//! UI should even offer. They are pure. No shared state, no allocation
//! beyond the returned values, and the same inputs always give the same
//! answer.
//!
//! Two operations matter to callers:
//!
//! - [`is_legal_play`]: may `candidate` go on top of `top`?
//! - [`next_legal_index`]: directional search through a hand for the next
//!   playable card, used for keyboard navigation and default selection.

use cardlink_protocol::{Card, Color, GameSnapshot, Rank};

/// Color assumed for a wild card on top of the pile when no color has been
/// chosen yet.
///
/// This is an arbitrary tie-break, not a confirmed game rule: it keeps the
/// check total so the UI always has an answer.
pub const DEFAULT_WILD_COLOR: Color = Color::Red;

/// The color a card counts as for matching purposes.
///
/// Colored cards are their printed color. A wild card takes
/// `active_wild_color`, or [`DEFAULT_WILD_COLOR`] when none is set.
pub fn effective_color(card: &Card, active_wild_color: Option<Color>) -> Color {
    match card.color() {
        Some(color) => color,
        None => active_wild_color.unwrap_or(DEFAULT_WILD_COLOR),
    }
}

/// The numeric rank of a plain number card.
///
/// Skip, reverse, draw-two and both wilds have no numeric rank and so never
/// match anything by number.
pub fn number_rank(card: &Card) -> Option<u8> {
    match card.rank() {
        Some(Rank::Number(n)) => Some(n),
        _ => None,
    }
}

fn special_rank(card: &Card) -> Option<Rank> {
    card.rank().filter(|rank| matches!(rank, Rank::Skip | Rank::Reverse | Rank::DrawTwo))
}

/// Whether `candidate` may be played on `top`.
///
/// In order:
/// 1. any wild card is legal;
/// 2. same special rank (skip, reverse, +2) is legal;
/// 3. same color as the top card's [`effective_color`] is legal;
/// 4. same number is legal.
///
/// Everything else is not.
pub fn is_legal_play(top: &Card, active_wild_color: Option<Color>, candidate: &Card) -> bool {
    if candidate.is_wild() {
        return true;
    }

    if matches!((special_rank(top), special_rank(candidate)), (Some(a), Some(b)) if a == b) {
        return true;
    }

    if candidate.color() == Some(effective_color(top, active_wild_color)) {
        return true;
    }

    matches!((number_rank(top), number_rank(candidate)), (Some(a), Some(b)) if a == b)
}

/// Which way [`next_legal_index`] walks through the hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    /// Toward higher indices (`+1`).
    Forward,
    /// Toward lower indices, and finally the draw pile (`-1`).
    Backward,
}

impl ScanDirection {
    fn step(self) -> isize {
        match self {
            Self::Forward => 1,
            Self::Backward => -1,
        }
    }
}

/// Result of a directional search through a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextLegal {
    /// The first legal card in the scan direction.
    Card(usize),
    /// A backward scan ran off the front of the hand: select the draw pile.
    Deck,
    /// A forward scan ran off the end of the hand: leave the cursor where
    /// it is. There is no wraparound.
    NotFound,
}

/// Scans `hand` from the slot after `from` in `direction` for the first
/// card that [`is_legal_play`] accepts.
///
/// `from` is the cursor position; `None` is the draw-pile slot just before
/// index 0, so a forward scan from `None` starts at the first card.
///
/// The two exhaustion results are deliberately asymmetric. A backward scan
/// that finds nothing lands on [`NextLegal::Deck`] (drawing is always an
/// option), while a forward scan reports [`NextLegal::NotFound`] so keyboard
/// navigation never loops around.
pub fn next_legal_index(
    top: &Card,
    active_wild_color: Option<Color>,
    hand: &[Card],
    from: Option<usize>,
    direction: ScanDirection,
) -> NextLegal {
    let step = direction.step();
    let mut i = match from {
        Some(index) => index as isize + step,
        None => -1 + step,
    };

    while i >= 0 && (i as usize) < hand.len() {
        if is_legal_play(top, active_wild_color, &hand[i as usize]) {
            return NextLegal::Card(i as usize);
        }
        i += step;
    }

    match direction {
        ScanDirection::Backward => NextLegal::Deck,
        ScanDirection::Forward => NextLegal::NotFound,
    }
}

/// `true` if any card in `hand` can be played on `top`.
pub fn has_legal_play(top: &Card, active_wild_color: Option<Color>, hand: &[Card]) -> bool {
    hand.iter().any(|card| is_legal_play(top, active_wild_color, card))
}

/// Indices of every playable card in `hand`, in hand order.
pub fn playable_indices(top: &Card, active_wild_color: Option<Color>, hand: &[Card]) -> Vec<usize> {
    hand.iter()
        .enumerate()
        .filter(|(_, card)| is_legal_play(top, active_wild_color, card))
        .map(|(i, _)| i)
        .collect()
}

/// Where the selection cursor should start when a new snapshot arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Card(usize),
    Deck,
}

/// Default cursor for a hand: the first legal card scanning forward from
/// the draw-pile slot, or the draw pile itself when nothing is playable or
/// the player owes draws.
pub fn initial_selection(
    top: &Card,
    active_wild_color: Option<Color>,
    hand: &[Card],
    must_draw: u32,
) -> Selection {
    if must_draw > 0 {
        return Selection::Deck;
    }
    match next_legal_index(top, active_wild_color, hand, None, ScanDirection::Forward) {
        NextLegal::Card(i) => Selection::Card(i),
        NextLegal::Deck | NextLegal::NotFound => Selection::Deck,
    }
}

/// [`initial_selection`] for a whole snapshot. A snapshot with no discard
/// top (the lobby) selects the draw pile.
pub fn initial_selection_for(snapshot: &GameSnapshot) -> Selection {
    match &snapshot.discard_top {
        Some(top) => initial_selection(
            top,
            snapshot.wild_color,
            &snapshot.you.cards,
            snapshot.must_draw,
        ),
        None => Selection::Deck,
    }
}
