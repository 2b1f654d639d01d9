pub mod config_management;
pub mod links;
pub mod maintenance;
pub mod programs;
