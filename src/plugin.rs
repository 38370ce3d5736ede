//! Bevy integration: forwards the changes committed to every [GridSpace] component as events

use crate::{GridChange, GridSpace};

use bevy::prelude::*;

/// A change committed to the grid on entity `grid`
#[derive(Event, Clone, Debug, PartialEq, Eq)]
pub struct GridEvent {
    /// The entity holding the [GridSpace]
    pub grid: Entity,
    /// What happened
    pub change: GridChange,
}

/// Registers [GridEvent] and drains the changes of every [GridSpace] component once per frame
pub struct StackGridPlugin;

impl Plugin for StackGridPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<GridEvent>()
            .add_systems(PostUpdate, forward_grid_changes);
    }
}

/// Send a [GridEvent] for every change waiting in a grid
pub fn forward_grid_changes(
    mut grids: Query<(Entity, &mut GridSpace)>,
    mut events: EventWriter<GridEvent>,
) {
    for (grid, mut space) in grids.iter_mut() {
        if !space.has_pending_changes() {
            continue;
        }
        for change in space.drain_changes() {
            events.send(GridEvent { grid, change });
        }
    }
}

#[test]
fn test_changes_become_events() {
    use crate::{move_shapes, ShapeDescriptor};
    use bevy::ecs::event::ManualEventReader;

    let mut app = App::new();
    app.add_plugins(StackGridPlugin);

    let shape = app.world.spawn_empty().id();
    let mut shelf = GridSpace::rectangle(2, 2, 2);
    shelf
        .place_shape(shape, &ShapeDescriptor::custom([IVec3::ZERO]), IVec3::ZERO, false)
        .unwrap();
    let shelf = app.world.spawn(shelf).id();
    let floor = app.world.spawn(GridSpace::rectangle(4, 4, 1)).id();

    app.update();
    let mut reader = ManualEventReader::<GridEvent>::default();
    let events: Vec<GridEvent> = reader
        .read(app.world.resource::<Events<GridEvent>>())
        .cloned()
        .collect();
    assert_eq!(
        vec![GridEvent {
            grid: shelf,
            change: GridChange::Placed(vec![shape])
        }],
        events
    );

    let mut from = app.world.entity_mut(shelf).take::<GridSpace>().unwrap();
    let mut to = app.world.entity_mut(floor).take::<GridSpace>().unwrap();
    move_shapes(&mut from, &mut to, &[shape], IVec3::new(3, 0, 3), false).unwrap();
    app.world.entity_mut(shelf).insert(from);
    app.world.entity_mut(floor).insert(to);

    app.update();
    let mut events: Vec<GridEvent> = reader
        .read(app.world.resource::<Events<GridEvent>>())
        .cloned()
        .collect();
    events.sort_by_key(|event| event.grid);
    let mut expected = vec![
        GridEvent {
            grid: shelf,
            change: GridChange::Removed(vec![shape]),
        },
        GridEvent {
            grid: floor,
            change: GridChange::Placed(vec![shape]),
        },
    ];
    expected.sort_by_key(|event| event.grid);
    assert_eq!(expected, events);
}
