//! The deterministic movement step.
//!
//! Client prediction replays inputs through this function and the server
//! applies it to authoritative state, so both must produce bit-identical
//! results for the same input, position and step length.

use crate::components::{Input, Position};
use crate::PLAYER_SPEED;

/// Advances `position` by one step of `dt` seconds under `input`.
///
/// Opposing directions cancel out and diagonal movement is normalized so it
/// is not faster than straight movement.
pub fn move_character(input: &Input, position: Position, dt: f32) -> Position {
    let mut dx = 0.0f32;
    let mut dy = 0.0f32;

    if input.left {
        dx -= 1.0;
    }
    if input.right {
        dx += 1.0;
    }
    if input.up {
        dy -= 1.0;
    }
    if input.down {
        dy += 1.0;
    }

    if dx != 0.0 && dy != 0.0 {
        dx *= std::f32::consts::FRAC_1_SQRT_2;
        dy *= std::f32::consts::FRAC_1_SQRT_2;
    }

    Position {
        x: position.x + dx * PLAYER_SPEED * dt,
        y: position.y + dy * PLAYER_SPEED * dt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_idle_input_does_not_move() {
        let start = Position::new(10.0, 20.0);
        assert_eq!(move_character(&Input::default(), start, 1.0), start);
    }

    #[test]
    fn test_straight_movement() {
        let input = Input { right: true, ..Default::default() };
        let moved = move_character(&input, Position::new(0.0, 0.0), 0.5);
        assert_approx_eq!(moved.x, PLAYER_SPEED * 0.5);
        assert_approx_eq!(moved.y, 0.0);
    }

    #[test]
    fn test_up_is_negative_y() {
        let input = Input { up: true, ..Default::default() };
        let moved = move_character(&input, Position::new(0.0, 0.0), 1.0);
        assert_approx_eq!(moved.y, -PLAYER_SPEED);
    }

    #[test]
    fn test_opposing_directions_cancel() {
        let input = Input { left: true, right: true, ..Default::default() };
        let start = Position::new(3.0, 4.0);
        assert_eq!(move_character(&input, start, 1.0), start);
    }

    #[test]
    fn test_diagonal_is_normalized() {
        let input = Input { down: true, right: true, ..Default::default() };
        let start = Position::new(0.0, 0.0);
        let moved = move_character(&input, start, 1.0);
        assert_approx_eq!(start.distance(moved), PLAYER_SPEED, 1e-3);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let inputs = [
            Input { up: true, ..Default::default() },
            Input { left: true, up: true, ..Default::default() },
            Input::default(),
        ];
        let run = || {
            inputs
                .iter()
                .fold(Position::new(100.0, 100.0), |p, i| move_character(i, p, 1.0 / 60.0))
        };
        assert_eq!(run(), run());
    }
}
