pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{error, header, info, section, severity_breakdown, status, success, warn};
pub use progress::Spinner;
pub use table::{findings_table, stats_table, FindingRow, TableBuilder};
pub use theme::{theme, Theme};
