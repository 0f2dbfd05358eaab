pub mod logind;

pub use logind::LogindIdleSource;
