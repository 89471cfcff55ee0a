// Sample handlers served by `jsd serve`

pub mod lighting;

pub use lighting::{register_lighting_handlers, LightState, LightStatus, LIGHT_SIMPLE_ENDPOINT};
