// Plain data types and the ports the core layer schedules against.

pub mod model;
pub mod ports;
