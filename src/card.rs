//! Single-cell card state and its transition rules.

/// Returns true if `value` is a legal card face: non-empty, no whitespace.
pub fn is_valid_value(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(char::is_whitespace)
}

/// One cell of the game grid.
///
/// A card carries a text value, can be on or off the board, face up or down,
/// and is held by at most one controlling player. The mutators preserve three
/// invariants:
///
/// - a removed card is face down and uncontrolled
/// - a face-down card is uncontrolled
/// - a controlled card is face up and on the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    value: String,
    on_board: bool,
    face_up: bool,
    controller: Option<String>,
}

impl Card {
    /// Creates a fresh card: on the board, face down, uncontrolled.
    ///
    /// Callers are expected to have validated `value` with
    /// [`is_valid_value`]; the parser and `map` commit path both do.
    pub(crate) fn new(value: String) -> Card {
        debug_assert!(is_valid_value(&value));
        Card {
            value,
            on_board: true,
            face_up: false,
            controller: None,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn on_board(&self) -> bool {
        self.on_board
    }

    pub fn face_up(&self) -> bool {
        self.face_up
    }

    pub fn controller(&self) -> Option<&str> {
        self.controller.as_deref()
    }

    /// Takes this card off the board (as half of a matched pair).
    pub(crate) fn remove(&mut self) {
        self.on_board = false;
        self.face_up = false;
        self.controller = None;
        self.check_rep();
    }

    /// Turns this card face up. Requires the card to be on the board.
    pub(crate) fn flip_up(&mut self) {
        debug_assert!(self.on_board);
        self.face_up = true;
        self.check_rep();
    }

    /// Turns this card face down, dropping any controller with it.
    pub(crate) fn flip_down(&mut self) {
        debug_assert!(self.on_board);
        self.face_up = false;
        self.controller = None;
        self.check_rep();
    }

    /// Grants control of this card to `player`. Requires a face-up card on
    /// the board.
    pub(crate) fn grab(&mut self, player: &str) {
        debug_assert!(self.on_board && self.face_up);
        self.controller = Some(player.to_string());
        self.check_rep();
    }

    /// Releases control; the card stays face up.
    pub(crate) fn release(&mut self) {
        self.controller = None;
        self.check_rep();
    }

    /// Rewrites the face value (bulk `map` commit). Face and control are
    /// untouched.
    pub(crate) fn rewrite(&mut self, value: String) {
        debug_assert!(is_valid_value(&value));
        self.value = value;
        self.check_rep();
    }

    #[cfg(debug_assertions)]
    fn check_rep(&self) {
        debug_assert!(is_valid_value(&self.value));
        if !self.on_board {
            debug_assert!(!self.face_up && self.controller.is_none());
        }
        if !self.face_up {
            debug_assert!(self.controller.is_none());
        }
    }

    #[cfg(not(debug_assertions))]
    fn check_rep(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(value: &str) -> Card {
        Card::new(value.to_string())
    }

    #[test]
    fn new_card_is_face_down_and_uncontrolled() {
        let c = card("A");
        assert!(c.on_board());
        assert!(!c.face_up());
        assert_eq!(c.controller(), None);
        assert_eq!(c.value(), "A");
    }

    #[test]
    fn flip_up_then_grab() {
        let mut c = card("🦄");
        c.flip_up();
        c.grab("alice");
        assert!(c.face_up());
        assert_eq!(c.controller(), Some("alice"));
    }

    #[test]
    fn flip_down_drops_controller() {
        let mut c = card("A");
        c.flip_up();
        c.grab("alice");
        c.flip_down();
        assert!(!c.face_up());
        assert_eq!(c.controller(), None);
    }

    #[test]
    fn remove_clears_face_and_controller() {
        let mut c = card("A");
        c.flip_up();
        c.grab("bob");
        c.remove();
        assert!(!c.on_board());
        assert!(!c.face_up());
        assert_eq!(c.controller(), None);
    }

    #[test]
    fn release_keeps_card_face_up() {
        let mut c = card("A");
        c.flip_up();
        c.grab("bob");
        c.release();
        assert!(c.face_up());
        assert_eq!(c.controller(), None);
    }

    #[test]
    fn rewrite_preserves_face_and_control() {
        let mut c = card("A");
        c.flip_up();
        c.grab("bob");
        c.rewrite("Z".to_string());
        assert_eq!(c.value(), "Z");
        assert!(c.face_up());
        assert_eq!(c.controller(), Some("bob"));
    }

    #[test]
    fn value_validity() {
        assert!(is_valid_value("A"));
        assert!(is_valid_value("🦄"));
        assert!(is_valid_value("ten-of-hearts"));
        assert!(!is_valid_value(""));
        assert!(!is_valid_value("a b"));
        assert!(!is_valid_value("tab\there"));
        assert!(!is_valid_value(" leading"));
    }
}
