//! Configuration management for Skive.

mod settings;

pub use settings::{
    DispatchSettings, GeneralSettings, PlannerSettings, RetrySettings, ServiceSettings, Settings,
};
