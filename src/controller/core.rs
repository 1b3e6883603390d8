use std::sync::Arc;

use tracing::info;

use crate::core::Engine;

/// Lifecycle operations a [`Controller`] delegates to.
pub trait Control: Send + Sync {
    fn start(&self);
    fn stop(&self);
}

impl Control for Engine {
    fn start(&self) {
        Engine::start(self);
    }

    fn stop(&self) {
        Engine::stop(self);
    }
}

/// Handle delegating `start`/`stop` 1:1 to its target.
#[derive(Clone)]
pub struct Controller {
    target: Arc<dyn Control>,
}

impl Controller {
    pub fn new(target: Arc<dyn Control>) -> Self {
        Self { target }
    }

    pub fn start(&self) {
        info!("start requested through controller");
        self.target.start();
    }

    pub fn stop(&self) {
        info!("stop requested through controller");
        self.target.stop();
    }
}

impl From<Arc<Engine>> for Controller {
    fn from(engine: Arc<Engine>) -> Self {
        Self::new(engine)
    }
}
