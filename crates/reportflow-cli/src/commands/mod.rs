pub mod probe;
pub mod profile;
pub mod run;
