mod dispatcher;
pub use dispatcher::*;
mod merge;
pub use merge::*;
