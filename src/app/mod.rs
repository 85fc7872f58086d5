pub mod async_loop;
pub mod demo;
pub mod dsl;
pub mod dto;
pub mod runner;
pub mod session;
