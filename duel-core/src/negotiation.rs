//! Draw negotiation state machine.
//!
//! Pure: takes an event, returns the new state plus actions for the
//! caller. The first offer blocks, so an offer while one is outstanding is
//! a no-op. Offers that cross on the wire count as agreement.

use duel_types::DrawKind;

/// Where a draw negotiation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawState {
    /// No offer outstanding.
    #[default]
    Idle,
    /// We offered and are waiting for an answer.
    Offered,
    /// The peer offered and is waiting for our answer.
    OfferReceived,
}

/// Inputs to the draw machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawEvent {
    /// The local player offers a draw.
    LocalOffer,
    /// The local player answers an outstanding offer.
    LocalAnswer {
        /// Whether the offer is accepted.
        accept: bool,
    },
    /// A `draw` message arrived from the peer.
    Remote(DrawKind),
}

/// Instructions produced by the draw machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawAction {
    /// Send a `draw` message of this kind.
    Send(DrawKind),
    /// Tell the player the peer offers a draw.
    OfferReceived,
    /// Tell the player the peer declined our offer.
    Declined,
    /// Both sides agreed; the session ends drawn.
    Agreed,
}

impl DrawState {
    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: DrawEvent) -> (Self, Vec<DrawAction>) {
        match (self, event) {
            (Self::Idle, DrawEvent::LocalOffer) => {
                (Self::Offered, vec![DrawAction::Send(DrawKind::Extend)])
            }

            (Self::OfferReceived, DrawEvent::LocalAnswer { accept: true }) => (
                Self::Idle,
                vec![DrawAction::Send(DrawKind::Accept), DrawAction::Agreed],
            ),
            (Self::OfferReceived, DrawEvent::LocalAnswer { accept: false }) => {
                (Self::Idle, vec![DrawAction::Send(DrawKind::Reject)])
            }

            (Self::Idle, DrawEvent::Remote(DrawKind::Extend)) => {
                (Self::OfferReceived, vec![DrawAction::OfferReceived])
            }
            // Crossed offers
            (Self::Offered, DrawEvent::Remote(DrawKind::Extend)) => (
                Self::Idle,
                vec![DrawAction::Send(DrawKind::Accept), DrawAction::Agreed],
            ),
            (Self::Offered, DrawEvent::Remote(DrawKind::Accept)) => {
                (Self::Idle, vec![DrawAction::Agreed])
            }
            (Self::Offered, DrawEvent::Remote(DrawKind::Reject)) => {
                (Self::Idle, vec![DrawAction::Declined])
            }

            // Repeated offers, stale answers, answers with nothing to answer
            (state, _) => (state, vec![]),
        }
    }

    /// Whether a local answer would be meaningful.
    pub fn awaiting_local_answer(&self) -> bool {
        matches!(self, Self::OfferReceived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_then_accept() {
        let (state, actions) = DrawState::Idle.on_event(DrawEvent::LocalOffer);
        assert_eq!(state, DrawState::Offered);
        assert_eq!(actions, vec![DrawAction::Send(DrawKind::Extend)]);

        let (state, actions) = state.on_event(DrawEvent::Remote(DrawKind::Accept));
        assert_eq!(state, DrawState::Idle);
        assert_eq!(actions, vec![DrawAction::Agreed]);
    }

    #[test]
    fn offer_then_reject() {
        let (state, _) = DrawState::Idle.on_event(DrawEvent::LocalOffer);
        let (state, actions) = state.on_event(DrawEvent::Remote(DrawKind::Reject));
        assert_eq!(state, DrawState::Idle);
        assert_eq!(actions, vec![DrawAction::Declined]);
    }

    #[test]
    fn second_local_offer_is_noop() {
        let (state, _) = DrawState::Idle.on_event(DrawEvent::LocalOffer);
        let (state, actions) = state.on_event(DrawEvent::LocalOffer);
        assert_eq!(state, DrawState::Offered);
        assert!(actions.is_empty());
    }

    #[test]
    fn received_offer_then_answers() {
        let (state, actions) = DrawState::Idle.on_event(DrawEvent::Remote(DrawKind::Extend));
        assert_eq!(state, DrawState::OfferReceived);
        assert_eq!(actions, vec![DrawAction::OfferReceived]);
        assert!(state.awaiting_local_answer());

        let (accepted, actions) = state.on_event(DrawEvent::LocalAnswer { accept: true });
        assert_eq!(accepted, DrawState::Idle);
        assert_eq!(
            actions,
            vec![DrawAction::Send(DrawKind::Accept), DrawAction::Agreed]
        );

        let (rejected, actions) = state.on_event(DrawEvent::LocalAnswer { accept: false });
        assert_eq!(rejected, DrawState::Idle);
        assert_eq!(actions, vec![DrawAction::Send(DrawKind::Reject)]);
    }

    #[test]
    fn redelivered_extend_is_noop() {
        let (state, _) = DrawState::Idle.on_event(DrawEvent::Remote(DrawKind::Extend));
        let (state, actions) = state.on_event(DrawEvent::Remote(DrawKind::Extend));
        assert_eq!(state, DrawState::OfferReceived);
        assert!(actions.is_empty());
    }

    #[test]
    fn local_offer_while_offer_received_is_noop() {
        let (state, actions) = DrawState::OfferReceived.on_event(DrawEvent::LocalOffer);
        assert_eq!(state, DrawState::OfferReceived);
        assert!(actions.is_empty());
    }

    #[test]
    fn crossed_offers_agree() {
        let (state, actions) = DrawState::Offered.on_event(DrawEvent::Remote(DrawKind::Extend));
        assert_eq!(state, DrawState::Idle);
        assert_eq!(
            actions,
            vec![DrawAction::Send(DrawKind::Accept), DrawAction::Agreed]
        );
    }

    #[test]
    fn stale_answers_in_idle_are_ignored() {
        for kind in [DrawKind::Accept, DrawKind::Reject] {
            let (state, actions) = DrawState::Idle.on_event(DrawEvent::Remote(kind));
            assert_eq!(state, DrawState::Idle);
            assert!(actions.is_empty());
        }
    }

    #[test]
    fn answer_without_offer_is_noop() {
        let (state, actions) = DrawState::Idle.on_event(DrawEvent::LocalAnswer { accept: true });
        assert_eq!(state, DrawState::Idle);
        assert!(actions.is_empty());
    }
}
