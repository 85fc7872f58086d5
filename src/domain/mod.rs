pub mod behavior;
pub mod errors;
pub mod function;
pub mod matcher;
pub mod object;
pub mod patch;
pub mod ports;
pub mod recorder;
pub mod registry;
pub mod strict;
pub mod typing;
pub mod value;
