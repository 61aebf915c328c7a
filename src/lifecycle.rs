//! Model lifecycle observers
//!
//! After every model is attached, the registry notifies each model of
//! [`Phase::Attached`] and then [`Phase::Boot`]. Subscribers are kept in an
//! explicit list keyed by `(model name, phase)` and run in subscription order.

use crate::orm::ModelRef;
use crate::registry::Registry;
use std::fmt;

/// Lifecycle phases, in notification order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Attached,
    Boot,
}

impl Phase {
    pub const ORDER: [Phase; 2] = [Phase::Attached, Phase::Boot];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Attached => "attached",
            Phase::Boot => "boot",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handler invoked with the model class and the registry as context.
pub type LifecycleHandler = Box<dyn Fn(&ModelRef, &Registry) + Send + Sync>;

struct Subscriber {
    model: String,
    phase: Phase,
    handler: LifecycleHandler,
}

#[derive(Default)]
pub struct Lifecycle {
    subscribers: Vec<Subscriber>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, model: impl Into<String>, phase: Phase, handler: LifecycleHandler) {
        self.subscribers.push(Subscriber { model: model.into(), phase, handler });
    }

    pub fn handlers<'a>(
        &'a self,
        model: &'a str,
        phase: Phase,
    ) -> impl Iterator<Item = &'a LifecycleHandler> + 'a {
        self.subscribers
            .iter()
            .filter(move |s| s.phase == phase && s.model == model)
            .map(|s| &s.handler)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.subscribers.iter().map(|s| (s.model.as_str(), s.phase)))
            .finish()
    }
}

/// Subscription handle given to a model's augmentation script.
pub struct ModelHooks<'a> {
    model: &'a str,
    lifecycle: &'a mut Lifecycle,
}

impl<'a> ModelHooks<'a> {
    pub fn new(model: &'a str, lifecycle: &'a mut Lifecycle) -> Self {
        Self { model, lifecycle }
    }

    pub fn model_name(&self) -> &str {
        self.model
    }

    /// Run `handler` when this model reaches `phase`.
    pub fn on<F>(&mut self, phase: Phase, handler: F)
    where
        F: Fn(&ModelRef, &Registry) + Send + Sync + 'static,
    {
        self.lifecycle.subscribe(self.model, phase, Box::new(handler));
    }
}
