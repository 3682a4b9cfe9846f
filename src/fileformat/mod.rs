pub mod container;
pub mod dictionary;
pub mod file_writer;
pub mod frame;
pub mod read;
pub mod read_table;
pub mod signal_compression;
pub mod signal_table;
pub mod table;
pub mod writer;

pub use read::Read;
pub use read::ReadId;
pub use read::ReadSignal;
pub use read::PoreData;
pub use read::CalibrationData;
pub use read::EndReason;
pub use read::EndReasonData;
pub use read::RunInfoData;

pub use writer::Writer;

pub use file_writer::create_combined_file_writer;
pub use file_writer::create_split_file_writer;
pub use file_writer::FileWriter;
pub use file_writer::FileWriterOptions;

pub use signal_compression::SignalCompression;

pub use container::parse_footer;
pub use container::FileFooter;
pub use container::FORMAT_VERSION;
