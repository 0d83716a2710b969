//! The closed catalog of replicated components.
//!
//! New component types may only be appended to [`ComponentKind::ALL`]; the
//! position of a kind in that list is its wire tag.

use serde::{Deserialize, Serialize};

/// World-space position of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Linear blend between `self` and `other`, `factor` in [0, 1].
    pub fn lerp(self, other: Position, factor: f32) -> Position {
        Position {
            x: self.x + (other.x - self.x) * factor,
            y: self.y + (other.y - self.y) * factor,
        }
    }

    pub fn distance(self, other: Position) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Directional input sampled by a client for one simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Input {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl Input {
    pub fn is_idle(&self) -> bool {
        !(self.up || self.down || self.left || self.right)
    }
}

/// Appearance of an entity, packed RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Body {
    pub rgba: u32,
}

/// Chat text an entity is currently saying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Speech {
    pub text: String,
}

/// Circular collision footprint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Collider {
    pub radius: f32,
}

/// Discriminant of a [`Component`], used as registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    Position,
    Input,
    Body,
    Speech,
    Collider,
}

impl ComponentKind {
    /// Registration order of the component catalog.
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::Position,
        ComponentKind::Input,
        ComponentKind::Body,
        ComponentKind::Speech,
        ComponentKind::Collider,
    ];
}

/// A component value tagged with its type.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Position(Position),
    Input(Input),
    Body(Body),
    Speech(Speech),
    Collider(Collider),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Position(_) => ComponentKind::Position,
            Component::Input(_) => ComponentKind::Input,
            Component::Body(_) => ComponentKind::Body,
            Component::Speech(_) => ComponentKind::Speech,
            Component::Collider(_) => ComponentKind::Collider,
        }
    }

    /// Whether a client is allowed to push this component to the server.
    pub fn is_client_trusted(&self) -> bool {
        matches!(self, Component::Input(_) | Component::Speech(_))
    }
}

/// Typed access to one variant of [`Component`].
pub trait ComponentType: Sized {
    const KIND: ComponentKind;

    fn from_component(component: &Component) -> Option<&Self>;
    fn into_component(self) -> Component;
}

macro_rules! component_type {
    ($ty:ident) => {
        impl ComponentType for $ty {
            const KIND: ComponentKind = ComponentKind::$ty;

            fn from_component(component: &Component) -> Option<&Self> {
                match component {
                    Component::$ty(value) => Some(value),
                    _ => None,
                }
            }

            fn into_component(self) -> Component {
                Component::$ty(self)
            }
        }

        impl From<$ty> for Component {
            fn from(value: $ty) -> Self {
                Component::$ty(value)
            }
        }
    };
}

component_type!(Position);
component_type!(Input);
component_type!(Body);
component_type!(Speech);
component_type!(Collider);
