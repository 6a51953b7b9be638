//! Port traits for the external collaborators: data provider, stock rubric
//! and configuration.

pub mod config_port;
pub mod data_port;
pub mod stock_check_port;
