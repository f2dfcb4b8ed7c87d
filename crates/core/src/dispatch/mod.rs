//! Download dispatch: send a chosen release to a download client.

mod dispatcher;
mod qbittorrent;
mod sabnzbd;
mod types;

pub use dispatcher::Dispatcher;
pub use qbittorrent::QBittorrentClient;
pub use sabnzbd::SabnzbdClient;
pub use types::*;
