pub mod learner;
pub mod scholarship;
pub mod status;

pub use learner::*;
pub use scholarship::*;
pub use status::*;
