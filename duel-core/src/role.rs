//! Role negotiation.
//!
//! Each peer draws a [`Tiebreak`] once per session and announces it. Both
//! peers then run [`resolve_side`] on the same pair of values and reach
//! opposite conclusions without further messages.

use duel_types::{Side, Tiebreak};

use crate::error::SessionError;

/// The outcome of role negotiation, from the local point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleAssignment {
    /// Our side
    pub local: Side,
    /// The peer's side
    pub remote: Side,
}

/// Assign sides from the two tiebreak values.
///
/// The strictly greater value plays White. Equal values are a
/// [`SessionError::TiebreakCollision`]; the caller must redraw rather than
/// pick a side.
pub fn resolve_side(local: Tiebreak, remote: Tiebreak) -> Result<RoleAssignment, SessionError> {
    let local_side = match local.cmp(&remote) {
        std::cmp::Ordering::Greater => Side::White,
        std::cmp::Ordering::Less => Side::Black,
        std::cmp::Ordering::Equal => return Err(SessionError::TiebreakCollision(local)),
    };
    Ok(RoleAssignment {
        local: local_side,
        remote: local_side.opposite(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greater_value_is_white() {
        let a = resolve_side(Tiebreak::new(900_000), Tiebreak::new(100_000)).unwrap();
        assert_eq!(a.local, Side::White);
        assert_eq!(a.remote, Side::Black);

        let b = resolve_side(Tiebreak::new(100_000), Tiebreak::new(900_000)).unwrap();
        assert_eq!(b.local, Side::Black);
        assert_eq!(b.remote, Side::White);
    }

    #[test]
    fn resolution_is_symmetric() {
        for (x, y) in [(1, 2), (u64::MAX, 0), (42, 41), (7, 1_000_000)] {
            let ours = resolve_side(Tiebreak::new(x), Tiebreak::new(y)).unwrap();
            let theirs = resolve_side(Tiebreak::new(y), Tiebreak::new(x)).unwrap();
            assert_eq!(ours.local, theirs.remote);
            assert_eq!(ours.remote, theirs.local);
            assert_ne!(ours.local, theirs.local);
        }
    }

    #[test]
    fn equal_values_collide() {
        let result = resolve_side(Tiebreak::new(5), Tiebreak::new(5));
        assert!(matches!(result, Err(SessionError::TiebreakCollision(t)) if t.value() == 5));
    }
}
