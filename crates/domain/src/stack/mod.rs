//! Deployment stack synthesis

pub mod synth;
pub mod template;

pub use synth::{
    AcceptAllCatalog, ParameterCatalog, StackSynthesizer, StaticCatalog, SynthError,
    inference_profile_base, parameter_arn, schedule_rule_id,
};
pub use template::{Output, Resource, Template};
