pub mod promise;

pub use promise::Promise;
