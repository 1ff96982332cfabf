pub mod cancel;
pub mod enter;
pub mod exit;
pub mod refresh;
pub mod snapshot;
pub mod trades;
pub mod update;
