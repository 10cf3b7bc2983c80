mod common;
use common::{GameBuilder, VariantBuilder};
use growlab_core::store::GameStore;
use growlab_core::weather::EventRequest;
use growlab_data::{Severity, WeatherType};
use std::collections::HashSet;
use std::thread;
use uuid::Uuid;

#[test]
fn test_parallel_event_creation_keeps_every_event() {
    let game = GameBuilder::new().build();
    let weather = game.app.weather.clone();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let weather = weather.clone();
            thread::spawn(move || {
                (0..25)
                    .map(|_| {
                        weather
                            .create_event(EventRequest::new(
                                WeatherType::Windy,
                                Severity::Mild,
                                1,
                            ))
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        ids.extend(handle.join().unwrap());
    }
    assert_eq!(ids.len(), 200);
    assert_eq!(game.app.ctx.store.weather_events().unwrap().len(), 200);
}

#[test]
fn test_parallel_ending_and_cycling() {
    let game = GameBuilder::new().build();
    let weather = game.app.weather.clone();
    let ids: Vec<Uuid> = (0..20)
        .map(|_| {
            weather
                .create_event(EventRequest::new(WeatherType::Sunny, Severity::Mild, 2))
                .unwrap()
        })
        .collect();
    let now = game.advance_hours(1);

    thread::scope(|s| {
        for chunk in ids.chunks(5) {
            let weather = &weather;
            s.spawn(move || {
                for &id in chunk {
                    weather.end_event(id).unwrap();
                    weather.end_event(id).unwrap();
                }
            });
        }
        s.spawn(|| {
            for _ in 0..10 {
                weather.auto_cycle(now).unwrap();
            }
        });
    });

    let events = game.app.ctx.store.weather_events().unwrap();
    assert!(ids
        .iter()
        .all(|id| events.iter().any(|e| e.id == *id && e.is_ended())));
}

#[test]
fn test_spending_never_overdraws() {
    let game = GameBuilder::new()
        .with_player("spender", 100)
        .with_variant(VariantBuilder::new(1, "Cheap").seed_cost(10).build())
        .build();
    let lifecycle = &game.app.lifecycle;
    let player = game.players[0];
    let variant = game.variants[0];

    let planted: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                s.spawn(move || {
                    (0..10)
                        .filter(|j| {
                            lifecycle
                                .plant(player, variant, Uuid::from_u128(i * 100 + j))
                                .is_ok()
                        })
                        .count()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(planted, 10);
    assert_tokens!(game, 0, 0);
    assert_eq!(game.app.ctx.store.plants_for(player).unwrap().len(), 10);
}

#[test]
fn test_concurrent_views_converge() {
    let game = GameBuilder::new()
        .with_player("grower", 100)
        .with_variant(VariantBuilder::new(1, "Steady").build())
        .build();
    let plant = game
        .app
        .lifecycle
        .plant(game.players[0], game.variants[0], Uuid::nil())
        .unwrap();
    game.advance_hours(120);

    let lifecycle = &game.app.lifecycle;
    let player = game.players[0];
    let views: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..6)
            .map(|_| s.spawn(move || lifecycle.plant_view(plant.id, player)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let progress: Vec<f64> = views
        .into_iter()
        .filter_map(Result::ok)
        .map(|p| p.growth_progress)
        .collect();
    assert!(!progress.is_empty());
    assert!(progress.iter().all(|p| (p - progress[0]).abs() < 1e-9));
}
