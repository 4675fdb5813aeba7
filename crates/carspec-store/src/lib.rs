pub mod columns;
pub mod csv_export;
pub mod json_export;
pub mod layout;
pub mod merge;
pub mod raw;
pub mod review_export;
pub mod sink;
pub mod warnings;

pub use csv_export::AppendOnlyCsv;
pub use layout::OutputLayout;
pub use merge::FileMerger;
pub use sink::FileStore;
pub use warnings::LabelWarnings;
