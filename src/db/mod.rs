mod applications;
mod dashboard;
mod learners;
mod registration;
mod scholarships;
mod sessions;
mod users;

pub use applications::*;
pub use dashboard::*;
pub use learners::*;
pub use registration::*;
pub use scholarships::*;
pub use sessions::*;
pub use users::*;
