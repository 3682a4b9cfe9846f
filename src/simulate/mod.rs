pub mod reads;

pub use reads::ReadSimulator;
