//! # Growth Analytics
//!
//! Facade over the workspace libraries:
//!
//! - [`growth_math`]: scalers, moving averages and error metrics
//! - [`growth_forecast`]: event-log sources, LSTM training, the model
//!   registry and the forecast predictor
//!
//! ## Example
//!
//! ```
//! use growth_analytics_workspace::forecast::{Domain, Horizon};
//!
//! let horizon: Horizon = "seven_days".parse().unwrap();
//! assert_eq!(horizon.steps(), 7);
//! assert_eq!(Domain::ALL.len(), 4);
//! ```

pub use growth_forecast as forecast;
pub use growth_math as math;

/// Current version of the workspace
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
