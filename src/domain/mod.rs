// Domain layer: value types and ports. No network or storage code here.

pub mod model;
pub mod ports;
