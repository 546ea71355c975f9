use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::engine::{Direction, Dot, Location};

mod apple;
mod corpse;
mod mouse;
mod snake;
mod wall;
mod watermelon;

pub use apple::Apple;
pub use corpse::Corpse;
pub use mouse::Mouse;
pub use snake::{ErrSnake, Snake};
pub use wall::Wall;
pub use watermelon::Watermelon;

pub type ObjectId = u32;

static NEXT_OBJECT_ID: AtomicU32 = AtomicU32::new(1);

pub(crate) fn next_object_id() -> ObjectId {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Capability interface of everything that can live on the playground.
/// Identity is the numeric id, never the geometry: two objects with the same
/// cells are still distinct entities.
pub trait GameObject: Send + Sync {
    fn id(&self) -> ObjectId;

    /// Snapshot of the object for JSON emission.
    fn view(&self) -> ObjectView;

    /// Edible objects answer with their food capability.
    fn as_food(&self) -> Option<&dyn Food> {
        None
    }
}

/// Objects a snake may eat instead of dying on.
pub trait Food: GameObject {
    /// Consumes the cell `dot` out of the object and reports how much the
    /// eater grows. Zero means the dot is not part of this object anymore.
    fn nutritional_value(&self, dot: Dot) -> u16;
}

/// Serializable view of a playground object, tagged with the object kind.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjectView {
    Apple {
        id: ObjectId,
        dot: Dot,
    },
    Corpse {
        id: ObjectId,
        dots: Location,
    },
    Mouse {
        id: ObjectId,
        dot: Dot,
        dir: Direction,
    },
    Snake {
        id: ObjectId,
        dots: Location,
    },
    Wall {
        id: ObjectId,
        dots: Location,
    },
    Watermelon {
        id: ObjectId,
        dots: Location,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_are_unique_and_increasing() {
        let first = next_object_id();
        let second = next_object_id();
        assert!(second > first);
    }

    #[test]
    fn views_carry_a_type_tag() {
        let view = ObjectView::Apple {
            id: 7,
            dot: Dot::new(1, 2),
        };
        assert_eq!(
            serde_json::to_string(&view).unwrap(),
            r#"{"type":"apple","id":7,"dot":[1,2]}"#
        );

        let view = ObjectView::Mouse {
            id: 8,
            dot: Dot::new(3, 4),
            dir: Direction::North,
        };
        assert_eq!(
            serde_json::to_string(&view).unwrap(),
            r#"{"type":"mouse","id":8,"dot":[3,4],"dir":"n"}"#
        );
    }
}
