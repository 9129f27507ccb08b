//! Environment that draws one of several table environments per episode.

use std::path::Path;

use crate::config::VariantTableEnvConfig;
use crate::env::{Env, Observation, ResetOptions, TableEnv, TableStep};
use crate::error::{ConfigError, Result};
use crate::physics::StateId;
use crate::primitives::Primitive;

/// Picks a variant uniformly at every reset and delegates everything else
/// to it. State handles belong to the variant that issued them.
pub struct VariantTableEnv {
    name: String,
    variants: Vec<TableEnv>,
    idx: usize,
    rng: fastrand::Rng,
}

impl VariantTableEnv {
    pub fn new(name: impl Into<String>, variants: Vec<TableEnv>) -> Result<Self> {
        if variants.is_empty() {
            return Err(ConfigError::InvalidParameter {
                param: "variants".to_string(),
                message: "at least one variant is required".to_string(),
            }
            .into());
        }
        Ok(Self {
            name: name.into(),
            variants,
            idx: 0,
            rng: fastrand::Rng::new(),
        })
    }

    pub fn from_config(config: VariantTableEnvConfig) -> Result<Self> {
        config.validate()?;
        let variants = config
            .variants
            .iter()
            .map(|source| TableEnv::new(source.load()?))
            .collect::<Result<Vec<_>>>()?;
        Self::new(config.name, variants)
    }

    pub fn variants(&self) -> &[TableEnv] {
        &self.variants
    }

    /// Index of the active variant.
    pub fn idx(&self) -> usize {
        self.idx
    }

    pub fn variant(&self) -> &TableEnv {
        &self.variants[self.idx]
    }

    pub fn variant_mut(&mut self) -> &mut TableEnv {
        &mut self.variants[self.idx]
    }
}

impl Env for VariantTableEnv {
    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&mut self, seed: Option<u64>, options: Option<ResetOptions>) -> Result<Observation> {
        if let Some(seed) = seed {
            self.rng.seed(seed);
        }
        self.idx = self.rng.usize(..self.variants.len());
        self.variant_mut().reset(seed, options)
    }

    fn step(&mut self, action: &[f32]) -> Result<TableStep> {
        self.variant_mut().step(action)
    }

    fn get_observation(&self) -> Observation {
        self.variant().get_observation()
    }

    fn set_observation(&mut self, observation: &Observation) {
        self.variant_mut().set_observation(observation)
    }

    fn get_state(&mut self) -> StateId {
        self.variant_mut().get_state()
    }

    fn set_state(&mut self, id: StateId) -> bool {
        self.variant_mut().set_state(id)
    }

    fn get_primitive(&self) -> &Primitive {
        self.variant().get_primitive()
    }

    fn set_primitive(&mut self, primitive: Primitive) {
        self.variant_mut().set_primitive(primitive)
    }

    fn record_start(&mut self, prepend_id: Option<&str>, frequency: Option<usize>, mode: &str) -> bool {
        self.variant_mut().record_start(prepend_id, frequency, mode)
    }

    fn record_stop(&mut self, save_id: Option<&str>, mode: &str) -> bool {
        self.variant_mut().record_stop(save_id, mode)
    }

    fn record_save(&mut self, path: &Path, reset: bool, mode: Option<&str>) -> Result<bool> {
        self.variant_mut().record_save(path, reset, mode)
    }
}
