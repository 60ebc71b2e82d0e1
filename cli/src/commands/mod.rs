pub mod backup;
pub mod clean;
pub mod list;
