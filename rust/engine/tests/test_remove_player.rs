use std::collections::HashSet;

use farao_engine::cards::{CardId, Effect, DECK_SIZE};
use farao_engine::engine::{CommittedTurn, RoundEngine};
use farao_engine::errors::GameError;
use farao_engine::registry::PlayerRoundState;

fn running_engine(n: usize, seed: u64) -> RoundEngine {
    let names = [("ada", "Ada"), ("bob", "Bob"), ("cyd", "Cyd"), ("dan", "Dan")];
    let mut engine = RoundEngine::new(Some(seed));
    for (id, name) in names.iter().take(n) {
        engine.add_player(PlayerRoundState::new(*id, *name)).unwrap();
    }
    engine.start().unwrap();
    engine.start_round().unwrap().unwrap();
    engine
}

fn assert_conserved(engine: &RoundEngine) {
    let mut seen: HashSet<CardId> = HashSet::new();
    let mut total = 0;
    let hands = engine.registry().iter().flat_map(|p| p.cards.iter());
    for &id in engine
        .draw_pile()
        .iter()
        .chain(engine.discard_pile())
        .chain(hands)
    {
        total += 1;
        assert!(seen.insert(id), "card {} in two places", id);
    }
    assert_eq!(total, DECK_SIZE);
}

#[test]
fn unknown_id_is_a_lenient_no_op() {
    let mut engine = running_engine(3, 51);
    assert!(engine.remove_player("nobody").is_none());
    assert_eq!(engine.registry().len(), 3);
}

#[test]
fn pre_start_removal_only_touches_the_roster() {
    let mut engine = RoundEngine::new(Some(52));
    engine.add_player(PlayerRoundState::new("ada", "Ada")).unwrap();
    engine.add_player(PlayerRoundState::new("bob", "Bob")).unwrap();

    let diff = engine.remove_player("ada").unwrap();
    assert_eq!(diff.id, "ada");
    assert!(diff.stack_added.is_none());
    assert!(diff.current_player.is_none());
    assert_eq!(engine.registry().len(), 1);
}

#[test]
fn departing_hand_returns_to_the_draw_pile() {
    let mut engine = running_engine(3, 53);
    let order = engine.turn_order().to_vec();
    let leaving = order[1].clone();
    let hand = engine.registry().get(&leaving).unwrap().cards.clone();
    let stack_before = engine.draw_pile().len();

    let diff = engine.remove_player(&leaving).unwrap();

    assert_eq!(diff.stack_added.as_deref(), Some(hand.as_slice()));
    assert_eq!(engine.draw_pile().len(), stack_before + hand.len());
    for id in &hand {
        assert!(engine.draw_pile().contains(id));
    }
    assert!(engine.registry().get(&leaving).is_none());
    assert_conserved(&engine);
}

#[test]
fn removing_a_non_current_player_keeps_the_turn() {
    let mut engine = running_engine(3, 54);
    let order = engine.turn_order().to_vec();
    let current = engine.current_player_id().unwrap().clone();
    assert_eq!(current, order[0]);

    let diff = engine.remove_player(&order[2]).unwrap();
    assert_eq!(diff.current_player.as_ref(), Some(&current));
    assert_eq!(engine.current_player_id(), Some(&current));
}

#[test]
fn removing_the_current_player_advances_to_an_active_one() {
    let mut engine = running_engine(3, 55);
    let order = engine.turn_order().to_vec();

    let diff = engine.remove_player(&order[0]).unwrap();
    let new_current = diff.current_player.unwrap();
    assert_ne!(new_current, order[0]);
    assert!(engine.registry().is_active_in_round(&new_current));
    assert_eq!(engine.current_player_id(), Some(&new_current));
    assert_conserved(&engine);
}

#[test]
fn removal_wraps_an_out_of_bounds_turn_pointer() {
    let mut engine = running_engine(3, 56);
    let order = engine.turn_order().to_vec();

    // walk the turn to the last position in order
    for _ in 0..2 {
        let id = engine.current_player_id().unwrap().clone();
        let first = engine.registry().get(&id).unwrap().cards[0];
        engine
            .commit_turn(CommittedTurn {
                cards_given: vec![first],
                ..Default::default()
            })
            .unwrap()
            .unwrap();
    }
    assert_eq!(engine.current_player_id(), Some(&order[2]));

    let diff = engine.remove_player(&order[2]).unwrap();
    let new_current = diff.current_player.unwrap();
    assert!(engine.registry().is_active_in_round(&new_current));
    assert_eq!(new_current, order[0], "pointer wraps to the front");
}

#[test]
fn removal_strips_the_id_from_every_ledger_entry() {
    let mut engine = running_engine(3, 57);
    // finish one full round so the ledger has content
    loop {
        let id = engine.current_player_id().unwrap().clone();
        let hand = engine.registry().get(&id).unwrap().cards.clone();
        let outcome = engine
            .commit_turn(CommittedTurn {
                cards_given: hand,
                ..Default::default()
            })
            .unwrap();
        if outcome.is_none() {
            break;
        }
    }
    let recorded = engine.score_ledger()[0][0].clone();
    engine.start_round().unwrap().unwrap();

    engine.remove_player(&recorded).unwrap();
    for entry in engine.score_ledger() {
        assert!(!entry.contains(&recorded));
    }
}

#[test]
fn departure_recaps_a_pending_ace_chain() {
    let mut engine = running_engine(3, 61);
    let order = engine.turn_order().to_vec();

    // two stacked aces are legal with three holders
    let current = engine.current_player_id().unwrap().clone();
    let first = engine.registry().get(&current).unwrap().cards[0];
    engine
        .commit_turn(CommittedTurn {
            cards_given: vec![first],
            new_effects: vec![Effect::Ace, Effect::Ace],
            ..Default::default()
        })
        .unwrap()
        .unwrap();
    assert_eq!(engine.effects(), &[Effect::Ace, Effect::Ace]);

    // a non-current holder leaves: two holders cannot carry two skips
    let leaving = order.iter().find(|id| **id != *engine.current_player_id().unwrap());
    engine.remove_player(leaving.unwrap()).unwrap();

    assert_eq!(engine.registry().active_in_round().len(), 2);
    assert_eq!(engine.effects(), &[Effect::Ace]);
    assert!(engine.effects().len() < engine.registry().active_in_round().len());
    assert_conserved(&engine);
}

#[test]
fn committing_after_everyone_departed_errors_cleanly() {
    let mut engine = running_engine(2, 62);
    let order = engine.turn_order().to_vec();
    engine.remove_player(&order[0]).unwrap();
    engine.remove_player(&order[1]).unwrap();
    assert!(engine.turn_order().is_empty());

    assert_eq!(
        engine.commit_turn(CommittedTurn::default()).unwrap_err(),
        GameError::TurnOrderCorrupted
    );
}

#[test]
fn orphaned_round_is_settled_by_the_caller() {
    let mut engine = running_engine(2, 58);
    let order = engine.turn_order().to_vec();

    assert!(!engine.round_should_finish());
    engine.remove_player(&order[0]).unwrap();
    assert!(engine.round_should_finish());

    engine.finish_round().unwrap();
    let ledger = engine.score_ledger().last().unwrap();
    assert_eq!(ledger.as_slice(), &[order[1].clone()]);
    assert_eq!(engine.registry().get(&order[1]).unwrap().start_card_count, 4);
    assert!(engine.game_should_finish(), "one player left in the game");
}
