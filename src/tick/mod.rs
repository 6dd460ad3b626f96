pub mod sight_tick;

pub use self::sight_tick::*;
