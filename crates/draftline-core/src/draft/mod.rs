pub mod pick;
pub mod roster;
pub mod state;
