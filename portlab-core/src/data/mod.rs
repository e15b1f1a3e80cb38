//! Price data model: the immutable dataset and its causally-bounded windows.

pub mod align;
pub mod dataset;
pub mod window;

pub use align::{align_series, missing_rates};
pub use dataset::{DatasetError, PriceDataset, CLOSE, MARKET_CAP};
pub use window::PriceWindow;
