pub mod inspect_cmd;
pub mod simulate_cmd;


pub use inspect_cmd::InspectCmd;
pub use simulate_cmd::SimulateCmd;
