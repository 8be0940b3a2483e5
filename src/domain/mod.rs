pub mod booking;
pub mod event;
pub mod reservation;
pub mod venue;

pub use booking::*;
pub use event::*;
pub use reservation::*;
pub use venue::*;
