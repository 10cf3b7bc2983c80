pub mod daemon;
pub mod headless;
pub mod shutdown;
pub mod state;

pub use daemon::{run_daemon, DaemonOptions};
pub use headless::{run_headless, HeadlessOptions, HeadlessReport};
pub use shutdown::ShutdownManager;
pub use state::App;
