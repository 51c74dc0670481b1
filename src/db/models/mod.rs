pub mod relationship;
pub mod user;
