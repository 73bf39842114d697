pub mod model;
pub mod tally;
pub mod thread;
pub mod util;
