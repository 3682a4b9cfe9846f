pub mod cmd;
pub mod command;
pub mod fileformat;
pub mod simulate;

pub use fileformat::Read;
pub use fileformat::ReadSignal;
pub use fileformat::Writer;
pub use fileformat::FileWriterOptions;
