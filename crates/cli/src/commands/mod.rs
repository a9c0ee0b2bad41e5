pub mod entry;
pub mod lookup;
pub mod player;
pub mod populate;
