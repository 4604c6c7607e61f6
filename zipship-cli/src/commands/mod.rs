pub mod build;
pub mod compile;
pub mod deploy;
pub mod inspect;
