mod common;
use common::{GameBuilder, TestGame, VariantBuilder};
use growlab_core::lifecycle::CareAction;
use growlab_core::modifiers::compose;
use growlab_core::store::GameStore;
use growlab_core::weather::EventRequest;
use growlab_data::{PlantState, Severity, TransactionKind, WeatherType};
use uuid::Uuid;

const BED: Uuid = Uuid::from_u128(0xB0);

fn grower() -> TestGame {
    GameBuilder::new()
        .with_player("grower", 200)
        .with_player("neighbour", 200)
        .with_variant(VariantBuilder::new(1, "Steady").base_yield(120.0).build())
        .build()
}

#[test]
fn test_plant_charges_seed_cost() {
    let game = grower();
    let plant = game
        .app
        .lifecycle
        .plant(game.players[0], game.variants[0], BED)
        .unwrap();
    assert_eq!(plant.state, PlantState::Seedling);
    assert_eq!(plant.growth_progress, 0.0);
    assert_tokens!(game, 0, 190);
    assert_eq!(game.app.lifecycle.time_remaining(&plant), Some(350.0));
}

#[test]
fn test_full_cycle_and_double_harvest() {
    let game = grower();
    let plant = game
        .app
        .lifecycle
        .plant(game.players[0], game.variants[0], BED)
        .unwrap();

    game.advance_hours(60);
    let view = game.app.lifecycle.plant_view(plant.id, game.players[0]).unwrap();
    assert_eq!(view.state, PlantState::Growing);
    assert_game_error!(
        game.app.lifecycle.harvest(plant.id, game.players[0]),
        "not_ready"
    );

    game.advance_hours(300);
    let outcome = game.app.lifecycle.harvest(plant.id, game.players[0]).unwrap();
    assert!((outcome.yield_grams - 120.0).abs() < 1e-9);
    assert_eq!(outcome.experience, 20);
    assert_plant_state!(game, plant.id, PlantState::Harvested);
    assert_eq!(game.player(0).experience, 20);

    assert_game_error!(
        game.app.lifecycle.harvest(plant.id, game.players[0]),
        "not_ready"
    );
}

#[test]
fn test_harvest_yield_follows_weather() {
    let game = grower();
    let plant = game
        .app
        .lifecycle
        .plant(game.players[0], game.variants[0], BED)
        .unwrap();
    game.advance_hours(360);
    game.app
        .weather
        .create_event(EventRequest::new(WeatherType::Sunny, Severity::Moderate, 2))
        .unwrap();

    let outcome = game.app.lifecycle.harvest(plant.id, game.players[0]).unwrap();
    assert!((outcome.yield_modifier - 1.10).abs() < 1e-9);
    assert!((outcome.yield_grams - 132.0).abs() < 1e-9);
}

#[test]
fn test_weather_impact_matches_active_effects() {
    let game = grower();
    let plant = game
        .app
        .lifecycle
        .plant(game.players[0], game.variants[0], BED)
        .unwrap();
    game.app
        .weather
        .create_event(EventRequest::new(WeatherType::Sunny, Severity::Moderate, 6))
        .unwrap();
    game.app
        .weather
        .create_event(EventRequest::new(WeatherType::RainStorm, Severity::Mild, 6))
        .unwrap();
    game.advance_hours(1);

    let now = game.app.now();
    let impact = game
        .app
        .lifecycle
        .weather_impact(plant.id, game.players[0])
        .unwrap();
    let active = game.app.weather.active_effects(now).unwrap();
    assert_eq!(impact.effects, active);
    assert_eq!(impact.net, compose(active.iter().map(|e| &e.modifiers)));
    assert_eq!(impact.state, PlantState::Seedling);
    // 1.15 * 1.05 growth, 1.10 yield on a 120 g strain
    assert!((impact.net.growth - 1.2075).abs() < 1e-9);
    assert!((impact.projected_yield - 132.0).abs() < 1e-9);
    assert_game_error!(
        game.app.lifecycle.weather_impact(plant.id, game.players[1]),
        "forbidden"
    );
}

#[test]
fn test_only_owner_may_touch_plant() {
    let game = grower();
    let plant = game
        .app
        .lifecycle
        .plant(game.players[0], game.variants[0], BED)
        .unwrap();
    game.advance_hours(360);

    assert_game_error!(
        game.app.lifecycle.harvest(plant.id, game.players[1]),
        "forbidden"
    );
    assert_game_error!(
        game.app.lifecycle.plant_view(plant.id, game.players[1]),
        "forbidden"
    );
    assert_game_error!(
        game.app.lifecycle.harvest(Uuid::from_u128(7), game.players[0]),
        "not_found"
    );
}

#[test]
fn test_funds_checked_before_level() {
    let game = GameBuilder::new()
        .with_player("poor", 10)
        .with_player("rich", 5000)
        .with_variant(
            VariantBuilder::new(1, "Exotic")
                .seed_cost(500)
                .required_level(5)
                .build(),
        )
        .build();

    assert_game_error!(
        game.app.lifecycle.plant(game.players[0], game.variants[0], BED),
        "insufficient_funds"
    );
    assert_game_error!(
        game.app.lifecycle.plant(game.players[1], game.variants[0], BED),
        "level_too_low"
    );
    assert_tokens!(game, 1, 5000);
}

#[test]
fn test_harsh_weather_kills() {
    let game = grower();
    let plant = game
        .app
        .lifecycle
        .plant(game.players[0], game.variants[0], BED)
        .unwrap();
    for kind in [WeatherType::Drought, WeatherType::RainStorm, WeatherType::HeatWave] {
        game.app
            .weather
            .create_event(EventRequest::new(kind, Severity::Extreme, 168))
            .unwrap();
    }

    game.advance_hours(72);
    assert_game_error!(
        game.app.lifecycle.harvest(plant.id, game.players[0]),
        "not_ready"
    );
    assert_plant_state!(game, plant.id, PlantState::Dead);
    assert_game_error!(
        game.app
            .lifecycle
            .tend(plant.id, game.players[0], CareAction::Water),
        "not_ready"
    );
}

#[test]
fn test_treatment_reduces_exposure() {
    let game = grower();
    let plant = game
        .app
        .lifecycle
        .plant(game.players[0], game.variants[0], BED)
        .unwrap();
    game.app
        .weather
        .create_event(EventRequest::new(WeatherType::Drought, Severity::Moderate, 10))
        .unwrap();
    game.advance_hours(10);

    let before = game.app.lifecycle.plant_view(plant.id, game.players[0]).unwrap();
    assert!((before.disease_exposure - 4.0).abs() < 1e-9);
    let treated = game
        .app
        .lifecycle
        .tend(plant.id, game.players[0], CareAction::Treat)
        .unwrap();
    assert!((treated.disease_exposure - 2.0).abs() < 1e-9);
    assert_tokens!(game, 0, 175);

    let kinds: Vec<_> = game
        .app
        .ctx
        .store
        .transactions(game.players[0])
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![TransactionKind::SeedPurchase, TransactionKind::Treatment]
    );
}

#[test]
fn test_list_plants_unknown_player() {
    let game = grower();
    assert_game_error!(
        game.app.lifecycle.list_plants(Uuid::from_u128(404)),
        "not_found"
    );
}
