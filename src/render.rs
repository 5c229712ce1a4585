//! Textual board snapshots.
//!
//! Pure rendering of a consistent grid state from one player's perspective.
//! The board calls this while holding its mutex so a snapshot is never torn
//! across cells.

use crate::card::Card;

/// Renders the grid as seen by `viewer`.
///
/// The output is a header line `<rows>x<cols>` followed by one line per cell
/// in row-major order:
///
/// - `none` for a removed card
/// - `down` for a face-down card
/// - `my VALUE` for a face-up card controlled by `viewer`
/// - `up VALUE` for any other face-up card
///
/// Lines are separated by single newlines with no trailing newline.
pub fn render(rows: usize, cols: usize, cells: &[Card], viewer: &str) -> String {
    debug_assert_eq!(cells.len(), rows * cols);
    let mut out = String::with_capacity(8 + cells.len() * 8);
    out.push_str(&rows.to_string());
    out.push('x');
    out.push_str(&cols.to_string());
    for card in cells {
        out.push('\n');
        if !card.on_board() {
            out.push_str("none");
        } else if !card.face_up() {
            out.push_str("down");
        } else if card.controller() == Some(viewer) {
            out.push_str("my ");
            out.push_str(card.value());
        } else {
            out.push_str("up ");
            out.push_str(card.value());
        }
    }
    out
}
