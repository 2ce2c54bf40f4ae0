pub mod installed;
pub mod layout;

pub use installed::{download_status, scan_installed, DownloadStatus, InstalledVersion};
pub use layout::GameLayout;
