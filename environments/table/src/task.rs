//! Tasks: an action skeleton plus the initial-state predicates that reset
//! must satisfy before the skeleton can be attempted.

use crate::config::TaskConfig;
use crate::error::ConfigError;
use crate::objects::ObjectRegistry;
use crate::predicates::Predicate;
use crate::primitives::Primitive;

/// Split `name(arg1, arg2)` into its name and trimmed arguments.
pub fn parse_call(call: &str) -> Result<(String, Vec<String>), ConfigError> {
    let malformed = || ConfigError::MalformedCall {
        call: call.to_string(),
    };
    let trimmed = call.trim();
    let open = trimmed.find('(').ok_or_else(malformed)?;
    let inner = trimmed[open + 1..].strip_suffix(')').ok_or_else(malformed)?;

    let name = trimmed[..open].trim();
    let valid_name = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_name || inner.contains(|c: char| c == '(' || c == ')') {
        return Err(malformed());
    }

    let args: Vec<String> = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(|a| a.trim().to_string()).collect()
    };
    if args.iter().any(String::is_empty) {
        return Err(malformed());
    }
    Ok((name.to_string(), args))
}

#[derive(Clone, Debug)]
pub struct Task {
    action_skeleton: Vec<Primitive>,
    initial_state: Vec<Predicate>,
}

impl Task {
    /// Resolve a task config against the registry and the env's primitives.
    pub fn create(
        primitive_names: &[String],
        objects: &ObjectRegistry,
        config: &TaskConfig,
    ) -> Result<Self, ConfigError> {
        let action_skeleton = config
            .action_skeleton
            .iter()
            .map(|call| Primitive::from_action_call(call, primitive_names, objects))
            .collect::<Result<Vec<_>, _>>()?;
        let initial_state = config
            .initial_state
            .iter()
            .map(|prop| Predicate::from_string(prop, objects))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            action_skeleton,
            initial_state,
        })
    }

    pub fn action_skeleton(&self) -> &[Primitive] {
        &self.action_skeleton
    }

    pub fn initial_state(&self) -> &[Predicate] {
        &self.initial_state
    }
}
