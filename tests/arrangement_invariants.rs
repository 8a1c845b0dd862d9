use truck_loadout::container::{Container, PlacementViolation};
use truck_loadout::geometry::{Position, footprints_overlap, intersects};
use truck_loadout::model::{BoxType, CargoBox, ContainerSpec, expand_box_types};
use truck_loadout::optimizer::{EpsilonSchedule, PackingConfig, PackingResult, optimize};
use truck_loadout::types::{Axis, EPSILON_GENERAL, Vec3};

fn box_type(name: &str, dims: (f64, f64, f64), quantity: u32, fragile: bool) -> BoxType {
    BoxType {
        name: name.to_string(),
        length: dims.0,
        width: dims.1,
        height: dims.2,
        weight: 5.0,
        quantity,
        fragile,
    }
}

fn mixed_load() -> Vec<CargoBox> {
    expand_box_types(&[
        box_type("M", (8.0, 6.0, 3.0), 3, false),
        box_type("XS", (4.0, 3.0, 2.0), 4, true),
        box_type("S", (6.0, 5.0, 2.0), 4, false),
    ])
    .unwrap()
}

fn assert_invariants(result: &PackingResult, config: PackingConfig) {
    let placements = &result.placements;
    let dims = result.spec.dims;

    for (i, a) in placements.iter().enumerate() {
        for axis in Axis::ALL {
            assert!(a.position.min_on(axis) >= -EPSILON_GENERAL, "{} below 0", a.cargo.id);
            assert!(
                a.position.max_on(axis) <= dims.get(axis) + EPSILON_GENERAL,
                "{} leaves the container",
                a.cargo.id
            );
        }

        for b in &placements[i + 1..] {
            assert!(
                !intersects(&a.position, &b.position),
                "{} overlaps {}",
                a.cargo.id,
                b.cargo.id
            );
        }

        if a.cargo.fragile {
            for b in placements.iter().filter(|b| b.cargo.id != a.cargo.id) {
                if footprints_overlap(&a.position, &b.position) {
                    assert!(
                        b.position.z() <= a.position.z() + EPSILON_GENERAL,
                        "{} rests above fragile {}",
                        b.cargo.id,
                        a.cargo.id
                    );
                }
            }
        }
    }

    // replaying the commits must pass every feasibility rule, support included
    let mut replay = Container::new(result.spec, config).unwrap();
    for placement in placements {
        assert_eq!(
            replay.can_place(&placement.cargo, &placement.position),
            Ok(()),
            "{} was not feasible when committed",
            placement.cargo.id
        );
        replay.place(placement.cargo.clone(), placement.position);
    }
}

#[test]
fn optimized_arrangements_satisfy_all_placement_rules() {
    let spec = ContainerSpec::new((24.0, 12.0, 12.0), 1_000.0).unwrap();
    let boxes = mixed_load();

    for (seed, schedule) in [
        (1, EpsilonSchedule::Fixed),
        (2, EpsilonSchedule::Annealing),
        (3, EpsilonSchedule::Fixed),
    ] {
        let config = PackingConfig::builder()
            .restarts(3)
            .seed(Some(seed))
            .epsilon_schedule(schedule)
            .build();
        let result = optimize(&boxes, spec, config).unwrap();

        assert_eq!(result.placed_count() + result.unplaced_count(), boxes.len());
        assert!(result.placed_count() > 0);
        assert_invariants(&result, config);
    }
}

#[test]
fn fixed_seed_is_reproducible_across_modes() {
    let spec = ContainerSpec::new((24.0, 12.0, 12.0), 1_000.0).unwrap();
    let boxes = mixed_load();
    let config = PackingConfig::builder().restarts(4).seed(Some(99)).build();

    let sequential = optimize(&boxes, spec, config).unwrap();
    let parallel = optimize(
        &boxes,
        spec,
        PackingConfig {
            parallel_restarts: true,
            ..config
        },
    )
    .unwrap();

    let ids = |r: &PackingResult| -> Vec<(String, Vec3)> {
        r.placements
            .iter()
            .map(|p| (p.cargo.id.clone(), p.position.origin))
            .collect()
    };
    assert_eq!(ids(&sequential), ids(&parallel));
    assert_eq!(sequential.best_score, parallel.best_score);
}

#[test]
fn unsatisfiable_load_terminates_with_unplaced_boxes() {
    let spec = ContainerSpec::new((4.0, 4.0, 4.0), 100.0).unwrap();
    let boxes = expand_box_types(&[box_type("big", (3.0, 3.0, 3.0), 3, false)]).unwrap();
    let config = PackingConfig::builder().restarts(2).seed(Some(4)).build();

    let result = optimize(&boxes, spec, config).unwrap();
    assert_eq!(result.placed_count(), 1);
    assert_eq!(result.unplaced_count(), 2);
    assert!(
        result
            .unplaced
            .iter()
            .all(|u| u.reason.code() == "no_feasible_position")
    );
    assert_invariants(&result, config);
}

#[test]
fn placement_rules_reject_the_documented_cases() {
    let config = PackingConfig::default();
    let spec = ContainerSpec::new((4.0, 4.0, 4.0), 100.0).unwrap();
    let cube = |x: f64, y: f64, z: f64| Position::new(Vec3::new(x, y, z), Vec3::new(2.0, 2.0, 2.0));

    let mut container = Container::new(spec, config).unwrap();
    let glass = CargoBox::new("glass", (2.0, 2.0, 2.0), 1.0, true, 1, 1).unwrap();
    let crate_box = CargoBox::new("crate", (2.0, 2.0, 2.0), 9.0, false, 2, 2).unwrap();

    container.place(glass, cube(0.0, 0.0, 0.0));
    assert_eq!(
        container.can_place(&crate_box, &cube(0.0, 0.0, 2.0)),
        Err(PlacementViolation::Fragility {
            other: "glass".to_string()
        })
    );

    let empty = Container::new(spec, config).unwrap();
    assert!(matches!(
        empty.can_place(&crate_box, &cube(0.0, 0.0, 1.0)),
        Err(PlacementViolation::Overhang { .. })
    ));
    assert_eq!(empty.can_place(&crate_box, &cube(0.0, 0.0, 0.0)), Ok(()));
}
