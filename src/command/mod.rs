pub mod inspect;
pub mod simulate;

pub use inspect::Inspect;
pub use inspect::InspectParams;

pub use simulate::Simulate;
pub use simulate::SimulateParams;
