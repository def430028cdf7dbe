pub mod navigation_fan_in;
pub mod shared_session;

pub use navigation_fan_in::{FanInStats, NavigationFanIn, TabHandle};
pub use shared_session::SessionHandle;
