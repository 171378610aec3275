//! Domain providers, built once per container.
//!
//! Nothing here is global: [`AppProviders::new`] creates the provider handles
//! and the container they are read from decides where the values live.

use std::rc::Rc;

use strand_core::{Clock, Ticker};

use crate::config::AppConfig;
use crate::repository::*;

mod albums;
mod devices;
mod macros;
mod production;
mod session;
mod settings;
mod timers;

pub use albums::AlbumProviders;
pub use devices::DeviceProviders;
pub use macros::MacroProviders;
pub use production::ProductionProviders;
pub use session::SessionProviders;
pub use settings::SettingsProviders;
pub use timers::TimerProviders;

/// Repository handles shared by providers and commands.
#[derive(Clone)]
pub struct Repositories {
    pub albums: Rc<dyn AlbumRepository>,
    pub devices: Rc<dyn DeviceRepository>,
    pub macros: Rc<dyn MacroRepository>,
    pub production: Rc<dyn ProductionRepository>,
    pub timers: Rc<dyn TimerRepository>,
    pub settings: Rc<dyn SettingsRepository>,
    pub session: Rc<dyn SessionRepository>,
}

impl Repositories {
    /// Uses one backend for every domain.
    pub fn from_backend<B>(backend: Rc<B>) -> Self
    where
        B: AlbumRepository
            + DeviceRepository
            + MacroRepository
            + ProductionRepository
            + TimerRepository
            + SettingsRepository
            + SessionRepository
            + 'static,
    {
        Self {
            albums: backend.clone(),
            devices: backend.clone(),
            macros: backend.clone(),
            production: backend.clone(),
            timers: backend.clone(),
            settings: backend.clone(),
            session: backend,
        }
    }
}

#[derive(Clone)]
pub struct AppProviders {
    pub albums: AlbumProviders,
    pub devices: DeviceProviders,
    pub macros: MacroProviders,
    pub production: ProductionProviders,
    pub timers: TimerProviders,
    pub settings: SettingsProviders,
    pub session: SessionProviders,
}

impl AppProviders {
    pub fn new(
        repos: &Repositories,
        config: &AppConfig,
        clock: Rc<dyn Clock>,
        ticker: Rc<dyn Ticker>,
    ) -> Self {
        let production = ProductionProviders::new(repos.production.clone());
        Self {
            albums: AlbumProviders::new(repos.albums.clone(), config.default_album_sort),
            devices: DeviceProviders::new(repos.devices.clone()),
            macros: MacroProviders::new(repos.macros.clone()),
            timers: TimerProviders::new(repos.timers.clone(), &production, clock.clone()),
            production,
            settings: SettingsProviders::new(repos.settings.clone()),
            session: SessionProviders::new(
                repos.session.clone(),
                clock,
                ticker,
                config.session_check_interval(),
            ),
        }
    }
}
