use std::rc::Rc;

use strand_core::{Clock, ProviderContainer, Ticker};

use crate::commands::*;
use crate::config::AppConfig;
use crate::providers::{AppProviders, Repositories};

/// One signed-in application scope: a container, its providers and the
/// commands that mutate them.
pub struct App {
    pub container: ProviderContainer,
    pub providers: AppProviders,
    pub macros: MacroManager,
    pub steps: ProductionStepManager,
    pub timers: TimerManager,
    pub settings: SettingsManager,
    pub session: SessionManager,
}

impl App {
    pub fn new(
        container: ProviderContainer,
        repos: &Repositories,
        config: &AppConfig,
        clock: Rc<dyn Clock>,
        ticker: Rc<dyn Ticker>,
    ) -> Self {
        let providers = AppProviders::new(repos, config, clock.clone(), ticker);
        let c = &container;
        Self {
            macros: MacroManager::new(c.clone(), repos.macros.clone(), providers.macros.clone()),
            steps: ProductionStepManager::new(
                c.clone(),
                repos.production.clone(),
                providers.production.clone(),
                providers.timers.clone(),
            ),
            timers: TimerManager::new(
                c.clone(),
                repos.timers.clone(),
                providers.timers.clone(),
                clock,
            ),
            settings: SettingsManager::new(
                c.clone(),
                repos.settings.clone(),
                providers.settings.clone(),
            ),
            session: SessionManager::new(
                c.clone(),
                repos.session.clone(),
                providers.session.clone(),
            ),
            providers,
            container,
        }
    }

    /// Ends the scope: cleanups run and periodic checks stop.
    pub fn shutdown(&self) {
        log::info!("shutting down app scope");
        self.container.dispose_all();
    }
}
