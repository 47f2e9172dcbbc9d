pub mod audit;
pub mod comment;
pub mod project;
pub mod status;
pub mod tag;
pub mod task;
pub mod user;

pub use status::TaskStatus;
