pub mod clock;
pub mod dir;
pub mod fixed;
pub mod frequency;
pub mod logging;
pub mod time;
