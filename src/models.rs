pub mod container;
pub mod item;
pub mod player;
pub mod types;
