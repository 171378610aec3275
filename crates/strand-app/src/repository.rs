//! Backend access, one trait per domain.
//!
//! Futures are `LocalBoxFuture` so the traits stay object-safe and can be
//! driven on the single-threaded provider executor. Implementations must
//! tolerate interleaved calls: several providers may await the same
//! repository at once.

use futures::future::LocalBoxFuture;

use crate::error::RepositoryError;
use crate::model::*;

pub type RepoFuture<'a, T> = LocalBoxFuture<'a, Result<T, RepositoryError>>;

pub trait AlbumRepository {
    fn albums(&self) -> RepoFuture<'_, Vec<Album>>;
    fn album(&self, id: AlbumId) -> RepoFuture<'_, Option<Album>>;
}

pub trait DeviceRepository {
    fn devices(&self) -> RepoFuture<'_, Vec<Device>>;
    fn device(&self, id: DeviceId) -> RepoFuture<'_, Option<Device>>;
}

pub trait MacroRepository {
    /// Macros ordered by position; all machine types when `machine` is `None`.
    fn macros(&self, machine: Option<MachineType>) -> RepoFuture<'_, Vec<Macro>>;
    fn create_macro(&self, new: NewMacro) -> RepoFuture<'_, Macro>;
    fn update_macro(&self, updated: Macro) -> RepoFuture<'_, Macro>;
    fn delete_macro(&self, id: MacroId) -> RepoFuture<'_, ()>;
    /// `ids` is the complete new order for `machine`.
    fn reorder_macros(&self, machine: MachineType, ids: Vec<MacroId>) -> RepoFuture<'_, ()>;
}

pub trait ProductionRepository {
    fn steps(&self, product: ProductId) -> RepoFuture<'_, Vec<ProductionStep>>;
    fn step(&self, id: StepId) -> RepoFuture<'_, Option<ProductionStep>>;
    fn create_step(&self, new: NewProductionStep) -> RepoFuture<'_, ProductionStep>;
    fn update_step(&self, updated: ProductionStep) -> RepoFuture<'_, ProductionStep>;
    fn delete_step(&self, id: StepId) -> RepoFuture<'_, ()>;
    fn reorder_steps(&self, product: ProductId, ids: Vec<StepId>) -> RepoFuture<'_, ()>;
}

pub trait TimerRepository {
    fn unit_timers(&self, unit: UnitId) -> RepoFuture<'_, Vec<UnitTimer>>;
    /// Running timers across every unit.
    fn active_timers(&self) -> RepoFuture<'_, Vec<UnitTimer>>;
    fn start_timer(&self, unit: UnitId, step: StepId, at: u64) -> RepoFuture<'_, UnitTimer>;
    fn stop_timer(&self, id: TimerId, at: u64) -> RepoFuture<'_, UnitTimer>;
}

pub trait SettingsRepository {
    fn load_settings(&self) -> RepoFuture<'_, Settings>;
    fn save_settings(&self, settings: Settings) -> RepoFuture<'_, ()>;
}

pub trait SessionRepository {
    fn current_session(&self) -> RepoFuture<'_, Option<Session>>;
    fn sign_out(&self) -> RepoFuture<'_, ()>;
}
