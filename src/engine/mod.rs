mod direction;
mod dot;
mod location;

pub use direction::{calculate_direction, Direction, ErrDirection};
pub use dot::Dot;
pub use location::Location;

/// Moves a dot `distance` cells towards `direction` on a toroidal grid of
/// `width` × `height` cells.
pub fn navigate(dot: Dot, direction: Direction, distance: u8, width: u8, height: u8) -> Dot {
    let (dx, dy) = direction.delta();
    let x = (i32::from(dot.x) + dx * i32::from(distance)).rem_euclid(i32::from(width));
    let y = (i32::from(dot.y) + dy * i32::from(distance)).rem_euclid(i32::from(height));
    Dot {
        x: x as u8,
        y: y as u8,
    }
}
