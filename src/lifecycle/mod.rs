//! Lifecycle management for long-running trajectory components

use crate::config::ConfigError;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{node}: cannot {transition} while {state}")]
    InvalidTransition {
        node: String,
        transition: &'static str,
        state: State,
    },
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),
    #[error("no tokio runtime available to spawn {0}")]
    NoRuntime(String),
}

/// Trait for components that follow a lifecycle pattern
pub trait LifecycleNode: Send + Sync {
    fn name(&self) -> &str;

    /// Configure the node
    fn on_configure(&mut self) -> Result<(), LifecycleError>;

    /// Activate the node
    fn on_activate(&mut self) -> Result<(), LifecycleError>;

    /// Deactivate the node
    fn on_deactivate(&mut self) -> Result<(), LifecycleError>;

    /// Clean up the node
    fn on_cleanup(&mut self) -> Result<(), LifecycleError>;
}

/// Base implementation for lifecycle nodes
#[derive(Debug)]
pub struct LifecycleNodeBase {
    pub name: String,
    state: State,
}

/// State of a lifecycle node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unconfigured,
    Inactive,
    Active,
    Finalized,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Unconfigured => "unconfigured",
            State::Inactive => "inactive",
            State::Active => "active",
            State::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

impl LifecycleNodeBase {
    /// Create a new lifecycle node base
    pub fn new(name: &str) -> Self {
        LifecycleNodeBase {
            name: name.to_string(),
            state: State::Unconfigured,
        }
    }

    /// Get the current state
    pub fn get_state(&self) -> State {
        self.state
    }

    /// Set the state
    pub fn set_state(&mut self, state: State) {
        tracing::info!("{}: {} -> {}", self.name, self.state, state);
        self.state = state;
    }

    /// Fail unless the node is currently in `expected`
    pub fn require(&self, expected: State, transition: &'static str) -> Result<(), LifecycleError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition {
                node: self.name.clone(),
                transition,
                state: self.state,
            })
        }
    }
}

/// Ordered set of lifecycle components brought up and down together
#[derive(Default)]
pub struct NodeRegistry {
    components: Vec<Box<dyn LifecycleNode>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        NodeRegistry {
            components: Vec::new(),
        }
    }

    /// Register a component
    pub fn register<T: LifecycleNode + 'static>(&mut self, component: T) {
        self.components.push(Box::new(component));
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Configure and activate every component in registration order
    pub fn init(&mut self) -> Result<(), LifecycleError> {
        for component in &mut self.components {
            component.on_configure()?;
            component.on_activate()?;
        }
        Ok(())
    }

    /// Deactivate and clean up every component in reverse order
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        for component in self.components.iter_mut().rev() {
            component.on_deactivate()?;
            component.on_cleanup()?;
        }
        Ok(())
    }
}
