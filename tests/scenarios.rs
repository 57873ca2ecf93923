// End-to-end rule scenarios, driven through the public API only.

use pretty_assertions::assert_eq;
use smallvec::smallvec;
use ticket_to_ride_mcts::action::Action;
use ticket_to_ride_mcts::card::TrainColor::{self, *};
use ticket_to_ride_mcts::city::City;
use ticket_to_ride_mcts::game_phase::{GamePhase, PendingSubAction};
use ticket_to_ride_mcts::game_state::{GameConfig, GameState};
use ticket_to_ride_mcts::loader::MapData;

const ROUTES: &str = "\
Omaha 3 BLUE Chicago
Chicago 2 GRAY Duluth
Duluth 6 RED Helena
Omaha 3 PINK Chicago
Helena 5 GRAY Omaha
";

const DESTINATIONS: &str = "\
Omaha 5 Duluth
Chicago 9 Helena
Omaha 3 Chicago
Duluth 4 Helena
Omaha 12 Helena
Chicago 6 Omaha
Helena 7 Chicago
Duluth 8 Omaha
Chicago 2 Duluth
";

// A line: Xenia - Zion - York.
const LINE_ROUTES: &str = "\
Xenia 2 RED Zion
Zion 2 BLUE York
";

const LINE_DESTINATIONS: &str = "\
Xenia 5 York
Xenia 2 Zion
Zion 2 York
York 5 Xenia
Zion 2 Xenia
York 2 Zion
";

fn small_map_data() -> MapData {
    MapData::parse(ROUTES, DESTINATIONS).expect("valid map")
}

fn skip_setup(mut state: GameState) -> GameState {
    while state.phase() == GamePhase::Setup {
        state = state
            .apply(&Action::SelectDestinations {
                keep: smallvec![0],
            })
            .expect("keeping one card is always legal during setup");
    }
    state
}

fn set_hand(state: &mut GameState, player_id: usize, cards: &[TrainColor]) {
    *state
        .get_mut_player(player_id)
        .expect("player exists")
        .get_mut_hand() = cards.iter().copied().collect();
}

/// Plays a whole turn of two blind draws.
fn draw_two_blind(state: GameState) -> GameState {
    let state = state.apply(&Action::DrawBlind).expect("close deck is not empty");
    if matches!(state.pending(), PendingSubAction::AwaitingSecondDraw { .. }) {
        state.apply(&Action::DrawBlind).expect("close deck is not empty")
    } else {
        state
    }
}

#[test]
fn fresh_game_blind_pile_size() {
    let usa = MapData::usa().expect("bundled map");

    // 110 cards, minus 4 in every hand, minus 5 face up.
    let state = GameState::from_seed(usa, 2, GameConfig::default(), 1).expect("valid game");
    assert_eq!(state.card_dealer().close_train_card_deck_len(), 97);

    let state = GameState::from_seed(usa, 3, GameConfig::default(), 1).expect("valid game");
    assert_eq!(state.card_dealer().close_train_card_deck_len(), 93);
}

#[test]
fn wild_card_payments_are_separate_actions() {
    let mut state = skip_setup(
        GameState::from_seed(&small_map_data(), 2, GameConfig::default(), 2).expect("valid game"),
    );
    set_hand(&mut state, 0, &[Blue, Blue, Blue, Wild]);

    let legal_actions = state.legal_actions();
    let all_blue = Action::PlaceRoute {
        route: 0,
        cards: smallvec![Blue, Blue, Blue],
    };
    let with_wild = Action::PlaceRoute {
        route: 0,
        cards: smallvec![Blue, Blue, Wild],
    };

    assert!(legal_actions.contains(&all_blue));
    assert!(legal_actions.contains(&with_wild));
    // A single wild card is held.
    assert!(!legal_actions.contains(&Action::PlaceRoute {
        route: 0,
        cards: smallvec![Blue, Wild, Wild],
    }));
}

#[test]
fn wild_cards_may_outnumber_the_route_color() {
    let mut state = skip_setup(
        GameState::from_seed(&small_map_data(), 2, GameConfig::default(), 2).expect("valid game"),
    );
    set_hand(&mut state, 0, &[Blue, Wild, Wild]);

    let mostly_wild = Action::PlaceRoute {
        route: 0,
        cards: smallvec![Blue, Wild, Wild],
    };
    assert!(state.legal_actions().contains(&mostly_wild));

    let state = state.apply(&mostly_wild).expect("route is claimable");
    assert_eq!(state.map().route(0).and_then(|route| route.owner()), Some(0));
    assert_eq!(state.player(0).map(|player| player.hand().is_empty()), Some(true));
}

#[test]
fn last_round_gives_every_other_player_one_turn() {
    let mut state = skip_setup(
        GameState::from_seed(&small_map_data(), 3, GameConfig::default(), 3).expect("valid game"),
    );
    set_hand(&mut state, 0, &[Blue, Blue, Blue]);
    *state
        .get_mut_player(0)
        .expect("player exists")
        .get_mut_trains_left() = 4;

    let state = state
        .apply(&Action::PlaceRoute {
            route: 0,
            cards: smallvec![Blue, Blue, Blue],
        })
        .expect("route is claimable");
    assert_eq!(state.player(0).map(|player| player.trains_left()), Some(1));
    assert_eq!(state.last_round_triggered_by(), Some(0));
    assert_eq!(state.phase(), GamePhase::LastRound);
    assert_eq!(state.active_player(), 1);

    let state = draw_two_blind(state);
    assert!(!state.is_over());
    assert_eq!(state.active_player(), 2);

    let state = draw_two_blind(state);
    assert!(state.is_over());
    assert_eq!(state.phase(), GamePhase::Done);
    assert!(state.legal_actions().is_empty());
    assert_eq!(state.last_round_triggered_by(), Some(0));
}

#[test]
fn destination_fulfilled_only_through_owned_path() {
    let map_data = MapData::parse(LINE_ROUTES, LINE_DESTINATIONS).expect("valid map");
    let state = skip_setup(
        GameState::from_seed(&map_data, 2, GameConfig::default(), 4).expect("valid game"),
    );
    let (xenia, zion, york) = (City(0), City(1), City(2));

    let mut complete = state.clone();
    let map = complete.get_mut_map();
    *map.get_mut_route_owner(0).expect("route exists") = Some(0);
    *map.get_mut_route_owner(1).expect("route exists") = Some(0);
    assert!(complete
        .map()
        .has_player_fulfilled_destination((xenia, york), 0));
    assert!(!complete
        .map()
        .has_player_fulfilled_destination((xenia, york), 1));

    let mut incomplete = state;
    *incomplete
        .get_mut_map()
        .get_mut_route_owner(1)
        .expect("route exists") = Some(0);
    assert!(incomplete
        .map()
        .has_player_fulfilled_destination((zion, york), 0));
    assert!(!incomplete
        .map()
        .has_player_fulfilled_destination((xenia, york), 0));
}

#[test]
fn face_up_wild_ends_the_turn() {
    let mut state = skip_setup(
        GameState::from_seed(&small_map_data(), 2, GameConfig::default(), 5).expect("valid game"),
    );
    let card_dealer = state.get_mut_card_dealer();
    *card_dealer.get_mut_open_train_card_deck() = smallvec![Wild, Red, Red, Blue, Green];

    let state = state
        .apply(&Action::DrawFaceUp { color: Wild })
        .expect("a wild card is face up");

    assert_eq!(state.pending(), &PendingSubAction::None);
    assert_eq!(state.active_player(), 1);
    assert_eq!(state.player(0).map(|player| player.hand().count(Wild) > 0), Some(true));
}

#[test]
fn face_up_non_wild_allows_a_second_draw() {
    let mut state = skip_setup(
        GameState::from_seed(&small_map_data(), 2, GameConfig::default(), 6).expect("valid game"),
    );
    let card_dealer = state.get_mut_card_dealer();
    *card_dealer.get_mut_open_train_card_deck() = smallvec![Wild, Red, Red, Blue, Green];

    let state = state
        .apply(&Action::DrawFaceUp { color: Red })
        .expect("a red card is face up");

    assert_eq!(
        state.pending(),
        &PendingSubAction::AwaitingSecondDraw { picked_wild: false }
    );
    assert_eq!(state.active_player(), 0);
    // The face-up wild card cannot be the second card.
    assert!(!state.is_legal(&Action::DrawFaceUp { color: Wild }));
    assert!(state
        .legal_actions()
        .iter()
        .all(|action| action.is_train_card_draw()));
}

#[test]
fn final_scoring_refunds_completed_destinations() {
    let map_data = MapData::parse(LINE_ROUTES, LINE_DESTINATIONS).expect("valid map");
    let mut state = skip_setup(
        GameState::from_seed(&map_data, 2, GameConfig::default(), 7).expect("valid game"),
    );

    let score_before = state.player(0).map(|player| player.score()).unwrap_or_default();
    set_hand(&mut state, 0, &[Red, Red]);
    *state
        .get_mut_player(0)
        .expect("player exists")
        .get_mut_trains_left() = 3;
    *state
        .get_mut_map()
        .get_mut_route_owner(1)
        .expect("route exists") = Some(0);

    let destinations = state
        .player(0)
        .map(|player| player.destination_hand().to_vec())
        .unwrap_or_default();

    // Claiming Xenia - Zion leaves player 0 with a single car: the last round starts.
    let state = state
        .apply(&Action::PlaceRoute {
            route: 0,
            cards: smallvec![Red, Red],
        })
        .expect("route is claimable");
    let state = draw_two_blind(state);
    assert!(state.is_over());

    // Every destination of this map is now connected for player 0.
    let refund: i32 = destinations.iter().map(|card| i32::from(card.points)).sum();
    assert_eq!(
        state.player(0).map(|player| player.score()),
        Some(score_before + 2 + refund)
    );
}
