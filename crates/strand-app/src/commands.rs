//! Mutation commands.
//!
//! Each command calls its repository and, only when that succeeds,
//! invalidates a fixed list of providers in one batch. The lists are written
//! out by hand and must name every cached view the mutation can make stale.
//! A failed call invalidates nothing and leaves the command usable.

use std::collections::HashSet;
use std::rc::Rc;

use strand_core::{Clock, InvalidationTarget, ProviderContainer};

use crate::error::{Result, ValidationError};
use crate::model::*;
use crate::providers::*;
use crate::repository::*;

fn commit(container: &ProviderContainer, what: &str, targets: Vec<InvalidationTarget>) {
    let listed = targets.len();
    let touched = container.invalidate_many(targets);
    log::debug!("{what}: {listed} targets, {touched} providers invalidated");
}

fn check_reorder(ids: &[u64]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    if ids.is_empty() || !ids.iter().all(|id| seen.insert(*id)) {
        return Err(ValidationError::ReorderMismatch);
    }
    Ok(())
}

pub struct MacroManager {
    container: ProviderContainer,
    repo: Rc<dyn MacroRepository>,
    macros: MacroProviders,
}

impl MacroManager {
    pub fn new(
        container: ProviderContainer,
        repo: Rc<dyn MacroRepository>,
        macros: MacroProviders,
    ) -> Self {
        Self {
            container,
            repo,
            macros,
        }
    }

    /// Providers made stale by a change to `machine`'s macros, or to any
    /// machine type when it is unknown.
    pub fn targets(&self, machine: Option<MachineType>) -> Vec<InvalidationTarget> {
        let p = &self.macros;
        let mut targets = vec![InvalidationTarget::from(&p.all_macros)];
        match machine {
            Some(machine) => {
                targets.push((&p.macros_by_machine_type.of(machine)).into());
                match machine {
                    MachineType::Cnc => targets.push((&p.cnc_macros).into()),
                    MachineType::Laser => targets.push((&p.laser_macros).into()),
                    MachineType::Printer => {}
                }
            }
            None => {
                targets.push((&p.cnc_macros).into());
                targets.push((&p.laser_macros).into());
                targets.push((&p.macros_by_machine_type).into());
            }
        }
        targets
    }

    pub async fn create(&self, new: NewMacro) -> Result<Macro> {
        new.validate()?;
        let created = self.repo.create_macro(new).await?;
        commit(
            &self.container,
            "create macro",
            self.targets(Some(created.machine_type)),
        );
        Ok(created)
    }

    /// The machine type may change, so every list is invalidated.
    pub async fn update(&self, updated: Macro) -> Result<Macro> {
        updated.validate()?;
        let saved = self.repo.update_macro(updated).await?;
        commit(&self.container, "update macro", self.targets(None));
        Ok(saved)
    }

    pub async fn delete(&self, id: MacroId) -> Result<()> {
        self.repo.delete_macro(id).await?;
        commit(&self.container, "delete macro", self.targets(None));
        Ok(())
    }

    pub async fn reorder(&self, machine: MachineType, ids: Vec<MacroId>) -> Result<()> {
        check_reorder(&ids)?;
        self.repo.reorder_macros(machine, ids).await?;
        commit(&self.container, "reorder macros", self.targets(Some(machine)));
        Ok(())
    }
}

pub struct ProductionStepManager {
    container: ProviderContainer,
    repo: Rc<dyn ProductionRepository>,
    production: ProductionProviders,
    timers: TimerProviders,
}

impl ProductionStepManager {
    pub fn new(
        container: ProviderContainer,
        repo: Rc<dyn ProductionRepository>,
        production: ProductionProviders,
        timers: TimerProviders,
    ) -> Self {
        Self {
            container,
            repo,
            production,
            timers,
        }
    }

    pub async fn create(&self, new: NewProductionStep) -> Result<ProductionStep> {
        new.validate()?;
        let created = self.repo.create_step(new).await?;
        let targets = vec![
            InvalidationTarget::from(&self.production.steps_for_product.of(created.product_id)),
            // a lookup made before the step existed cached `None`
            (&self.production.step_by_id.of(created.id)).into(),
        ];
        commit(&self.container, "create step", targets);
        Ok(created)
    }

    /// Step names and estimates show up in timer details, which are
    /// invalidated along with the step lists.
    pub async fn update(&self, updated: ProductionStep) -> Result<ProductionStep> {
        updated.validate()?;
        let saved = self.repo.update_step(updated).await?;
        let targets = vec![
            // the step may have moved to another product
            InvalidationTarget::from(&self.production.steps_for_product),
            (&self.production.step_by_id.of(saved.id)).into(),
            (&self.timers.active_unit_timers_with_details).into(),
        ];
        commit(&self.container, "update step", targets);
        Ok(saved)
    }

    pub async fn delete(&self, id: StepId) -> Result<()> {
        self.repo.delete_step(id).await?;
        let targets = vec![
            InvalidationTarget::from(&self.production.steps_for_product),
            (&self.production.step_by_id.of(id)).into(),
            (&self.timers.active_unit_timers_with_details).into(),
        ];
        commit(&self.container, "delete step", targets);
        Ok(())
    }

    pub async fn reorder(&self, product: ProductId, ids: Vec<StepId>) -> Result<()> {
        check_reorder(&ids)?;
        let reordered = ids.clone();
        self.repo.reorder_steps(product, ids).await?;
        let mut targets = vec![InvalidationTarget::from(
            &self.production.steps_for_product.of(product),
        )];
        // positions are part of each step
        targets.extend(
            reordered
                .into_iter()
                .map(|id| InvalidationTarget::from(&self.production.step_by_id.of(id))),
        );
        commit(&self.container, "reorder steps", targets);
        Ok(())
    }
}

pub struct TimerManager {
    container: ProviderContainer,
    repo: Rc<dyn TimerRepository>,
    timers: TimerProviders,
    clock: Rc<dyn Clock>,
}

impl TimerManager {
    pub fn new(
        container: ProviderContainer,
        repo: Rc<dyn TimerRepository>,
        timers: TimerProviders,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            container,
            repo,
            timers,
            clock,
        }
    }

    /// Timer views of `unit`, plus the global running list.
    pub fn targets(&self, unit: &UnitId) -> Vec<InvalidationTarget> {
        let p = &self.timers;
        vec![
            (&p.unit_timers.of(unit.clone())).into(),
            (&p.active_unit_timers.of(unit.clone())).into(),
            (&p.active_unit_timers_with_details.of(unit.clone())).into(),
            (&p.active_timers).into(),
        ]
    }

    pub async fn start(&self, unit: UnitId, step: StepId) -> Result<UnitTimer> {
        let at = self.clock.unix_secs();
        let timer = self.repo.start_timer(unit, step, at).await?;
        commit(&self.container, "start timer", self.targets(&timer.unit_id));
        Ok(timer)
    }

    pub async fn stop(&self, id: TimerId) -> Result<UnitTimer> {
        let at = self.clock.unix_secs();
        let timer = self.repo.stop_timer(id, at).await?;
        commit(&self.container, "stop timer", self.targets(&timer.unit_id));
        Ok(timer)
    }
}

pub struct SettingsManager {
    container: ProviderContainer,
    repo: Rc<dyn SettingsRepository>,
    settings: SettingsProviders,
}

impl SettingsManager {
    pub fn new(
        container: ProviderContainer,
        repo: Rc<dyn SettingsRepository>,
        settings: SettingsProviders,
    ) -> Self {
        Self {
            container,
            repo,
            settings,
        }
    }

    /// Validates, then persists. Invalid settings never reach the repository.
    pub async fn update(&self, settings: Settings) -> Result<()> {
        settings.validate()?;
        self.repo.save_settings(settings).await?;
        commit(
            &self.container,
            "update settings",
            vec![(&self.settings.settings).into()],
        );
        Ok(())
    }
}

pub struct SessionManager {
    container: ProviderContainer,
    repo: Rc<dyn SessionRepository>,
    session: SessionProviders,
}

impl SessionManager {
    pub fn new(
        container: ProviderContainer,
        repo: Rc<dyn SessionRepository>,
        session: SessionProviders,
    ) -> Self {
        Self {
            container,
            repo,
            session,
        }
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.repo.sign_out().await?;
        commit(
            &self.container,
            "sign out",
            vec![
                (&self.session.current_session).into(),
                (&self.session.is_signed_in).into(),
            ],
        );
        Ok(())
    }
}
