//! Long-lived instance table built from tracking results, and its JSON export.

mod export;
mod manager;
mod shared;
mod state;

pub use export::{
    ExportedInstance, InstancesReport, Location, convert_instance_states_to_json, micros_to_millis,
};
pub use manager::{InstanceManager, InstanceManagerConfig};
pub use shared::SharedInstanceManager;
pub use state::InstanceState;
