pub mod entity;

pub use entity::EntityRow;
