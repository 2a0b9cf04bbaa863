pub mod proxy;
pub mod source;
