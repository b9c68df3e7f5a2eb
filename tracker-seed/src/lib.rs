// Library exports for tracker-seed
// Shared by the seed binary, check-db and the integration tests

pub mod config;
pub mod db;
pub mod logging;
pub mod seed;
