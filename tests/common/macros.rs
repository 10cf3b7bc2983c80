/// Asserts a builder player's token balance.
#[macro_export]
macro_rules! assert_tokens {
    ($game:expr, $player:expr, $expected:expr) => {
        assert_eq!(
            $game.tokens($player),
            $expected,
            "Player {} token balance mismatch",
            $player
        );
    };
}

/// Asserts the stored state of a plant.
#[macro_export]
macro_rules! assert_plant_state {
    ($game:expr, $plant_id:expr, $state:expr) => {
        let plant = $game
            .app
            .ctx
            .store
            .plant($plant_id)
            .unwrap()
            .expect("Plant not found in store");
        assert_eq!(plant.state, $state, "Plant {} state mismatch", $plant_id);
    };
}

/// Asserts that a call failed with the given error kind.
#[macro_export]
macro_rules! assert_game_error {
    ($result:expr, $kind:expr) => {
        match $result {
            Ok(_) => panic!("Expected {} error, got success", $kind),
            Err(err) => assert_eq!(err.kind(), $kind, "Unexpected error: {}", err),
        }
    };
}
