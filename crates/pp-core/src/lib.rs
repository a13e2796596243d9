//! Automatic Mode core: the store proxy every write goes through, the
//! requirement-gated mode machine, and the per-context controller that settles
//! each change to a fixed point before the UI is refreshed.

pub mod config;
pub mod controller;
pub mod error;
pub mod machine;
pub mod proxy;
pub mod settings;
pub mod surface;

pub use config::ControllerConfig;
pub use controller::Controller;
pub use error::{ModeError, SurfaceError};
pub use machine::{AutoMode, AutoModeMachine, DisableCause, ExerciseMode, Transition};
pub use proxy::{StoreProxy, SubscriptionId};
pub use settings::SettingField;
pub use surface::Surface;
