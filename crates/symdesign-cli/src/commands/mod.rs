pub mod explore;
pub mod mission;
