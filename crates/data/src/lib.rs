pub mod csv_loader;
pub mod store;

pub use store::BarManager;
