// Storage collaborators: Postgres pool + catalog queries, filesystem uploads.

pub mod catalog;
pub mod db;
pub mod uploads;
