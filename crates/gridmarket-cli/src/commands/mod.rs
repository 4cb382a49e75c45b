pub mod clear;
pub mod prices;
pub mod report;
pub mod simulate;
pub mod validate;
