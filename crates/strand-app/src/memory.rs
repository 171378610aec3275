//! In-memory backend for tests and demos.
//!
//! Counts calls per operation and can fail the next call to an operation
//! without touching stored data.

use std::collections::HashMap;

use futures::future::{self, FutureExt};
use parking_lot::Mutex;

use crate::error::RepositoryError;
use crate::model::*;
use crate::repository::*;

#[derive(Default)]
struct Store {
    albums: Vec<Album>,
    devices: Vec<Device>,
    macros: Vec<Macro>,
    steps: Vec<ProductionStep>,
    timers: Vec<UnitTimer>,
    settings: Settings,
    session: Option<Session>,
    next_id: u64,
    calls: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, RepositoryError>,
}

impl Store {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    store: Mutex<Store>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        backend.store.lock().next_id = 1000;
        backend
    }

    pub fn with_albums(mut self, albums: Vec<Album>) -> Self {
        self.store.get_mut().albums = albums;
        self
    }

    pub fn with_devices(mut self, devices: Vec<Device>) -> Self {
        self.store.get_mut().devices = devices;
        self
    }

    pub fn with_macros(mut self, macros: Vec<Macro>) -> Self {
        self.store.get_mut().macros = macros;
        self
    }

    pub fn with_steps(mut self, steps: Vec<ProductionStep>) -> Self {
        self.store.get_mut().steps = steps;
        self
    }

    pub fn with_timers(mut self, timers: Vec<UnitTimer>) -> Self {
        self.store.get_mut().timers = timers;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.store.get_mut().settings = settings;
        self
    }

    pub fn with_session(mut self, session: Option<Session>) -> Self {
        self.store.get_mut().session = session;
        self
    }

    /// Small library and workshop, used by the showcase.
    pub fn seeded() -> Self {
        let album = |id, title: &str, artist: &str, genre: &str, year| Album {
            id,
            title: title.into(),
            artist: artist.into(),
            genre: genre.into(),
            year,
        };
        let mac = |id, name: &str, machine_type, position| Macro {
            id,
            name: name.into(),
            machine_type,
            gcode: format!("; {name}\nG28"),
            position,
        };
        let step = |id, name: &str, position, estimated_minutes| ProductionStep {
            id,
            product_id: 1,
            name: name.into(),
            position,
            estimated_minutes,
        };
        Self::new()
            .with_albums(vec![
                album(1, "Kind of Blue", "Miles Davis", "Jazz", 1959),
                album(2, "Blue Train", "John Coltrane", "Jazz", 1957),
                album(3, "Remain in Light", "Talking Heads", "Rock", 1980),
                album(4, "Discovery", "Daft Punk", "Electronic", 2001),
            ])
            .with_devices(vec![
                Device {
                    id: 1,
                    name: "Shapeoko".into(),
                    kind: MachineType::Cnc,
                    connected: true,
                },
                Device {
                    id: 2,
                    name: "xTool".into(),
                    kind: MachineType::Laser,
                    connected: false,
                },
            ])
            .with_macros(vec![
                mac(1, "Home", MachineType::Cnc, 0),
                mac(2, "Probe Z", MachineType::Cnc, 1),
                mac(3, "Frame", MachineType::Laser, 0),
            ])
            .with_steps(vec![
                step(1, "Cut", 0, 20),
                step(2, "Sand", 1, 15),
                step(3, "Finish", 2, 30),
            ])
            .with_session(Some(Session {
                user_id: "u-1".into(),
                display_name: "Workshop".into(),
                expires_at: u64::MAX,
            }))
    }

    /// Number of calls made to `op` (the repository method name).
    pub fn calls(&self, op: &str) -> usize {
        self.store.lock().calls.get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.store.lock().calls.values().sum()
    }

    /// Makes the next call to `op` fail with `err`. Stored data is left as is.
    pub fn fail_next(&self, op: &'static str, err: RepositoryError) {
        self.store.lock().failures.insert(op, err);
    }

    fn run<T: 'static>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Store) -> Result<T, RepositoryError>,
    ) -> RepoFuture<'_, T> {
        let mut store = self.store.lock();
        *store.calls.entry(op).or_default() += 1;
        let res = match store.failures.remove(op) {
            Some(err) => {
                log::debug!("memory backend: injected failure for `{op}`");
                Err(err)
            }
            None => f(&mut *store),
        };
        future::ready(res).boxed_local()
    }
}

fn missing(entity: &'static str, id: impl ToString) -> RepositoryError {
    RepositoryError::Missing {
        entity,
        id: id.to_string(),
    }
}

fn same_ids(mut have: Vec<u64>, mut want: Vec<u64>) -> bool {
    have.sort_unstable();
    want.sort_unstable();
    have == want
}

impl AlbumRepository for MemoryBackend {
    fn albums(&self) -> RepoFuture<'_, Vec<Album>> {
        self.run("albums", |s| Ok(s.albums.clone()))
    }

    fn album(&self, id: AlbumId) -> RepoFuture<'_, Option<Album>> {
        self.run("album", |s| Ok(s.albums.iter().find(|a| a.id == id).cloned()))
    }
}

impl DeviceRepository for MemoryBackend {
    fn devices(&self) -> RepoFuture<'_, Vec<Device>> {
        self.run("devices", |s| Ok(s.devices.clone()))
    }

    fn device(&self, id: DeviceId) -> RepoFuture<'_, Option<Device>> {
        self.run("device", |s| Ok(s.devices.iter().find(|d| d.id == id).cloned()))
    }
}

impl MacroRepository for MemoryBackend {
    fn macros(&self, machine: Option<MachineType>) -> RepoFuture<'_, Vec<Macro>> {
        self.run("macros", |s| {
            let mut out: Vec<Macro> = s
                .macros
                .iter()
                .filter(|m| machine.is_none_or(|t| m.machine_type == t))
                .cloned()
                .collect();
            out.sort_by_key(|m| (m.machine_type, m.position));
            Ok(out)
        })
    }

    fn create_macro(&self, new: NewMacro) -> RepoFuture<'_, Macro> {
        self.run("create_macro", |s| {
            let position = s
                .macros
                .iter()
                .filter(|m| m.machine_type == new.machine_type)
                .map(|m| m.position + 1)
                .max()
                .unwrap_or(0);
            let created = Macro {
                id: s.next_id(),
                name: new.name,
                machine_type: new.machine_type,
                gcode: new.gcode,
                position,
            };
            s.macros.push(created.clone());
            Ok(created)
        })
    }

    fn update_macro(&self, updated: Macro) -> RepoFuture<'_, Macro> {
        self.run("update_macro", |s| {
            let slot = s
                .macros
                .iter_mut()
                .find(|m| m.id == updated.id)
                .ok_or_else(|| missing("macro", updated.id))?;
            *slot = updated.clone();
            Ok(updated)
        })
    }

    fn delete_macro(&self, id: MacroId) -> RepoFuture<'_, ()> {
        self.run("delete_macro", |s| {
            let before = s.macros.len();
            s.macros.retain(|m| m.id != id);
            if s.macros.len() == before {
                return Err(missing("macro", id));
            }
            Ok(())
        })
    }

    fn reorder_macros(&self, machine: MachineType, ids: Vec<MacroId>) -> RepoFuture<'_, ()> {
        self.run("reorder_macros", |s| {
            let existing = s
                .macros
                .iter()
                .filter(|m| m.machine_type == machine)
                .map(|m| m.id)
                .collect();
            if !same_ids(existing, ids.clone()) {
                return Err(RepositoryError::Rejected(format!(
                    "reorder does not match the {machine} macros"
                )));
            }
            for m in s.macros.iter_mut().filter(|m| m.machine_type == machine) {
                if let Some(pos) = ids.iter().position(|id| *id == m.id) {
                    m.position = pos as u32;
                }
            }
            Ok(())
        })
    }
}

impl ProductionRepository for MemoryBackend {
    fn steps(&self, product: ProductId) -> RepoFuture<'_, Vec<ProductionStep>> {
        self.run("steps", |s| {
            let mut out: Vec<ProductionStep> = s
                .steps
                .iter()
                .filter(|st| st.product_id == product)
                .cloned()
                .collect();
            out.sort_by_key(|st| st.position);
            Ok(out)
        })
    }

    fn step(&self, id: StepId) -> RepoFuture<'_, Option<ProductionStep>> {
        self.run("step", |s| Ok(s.steps.iter().find(|st| st.id == id).cloned()))
    }

    fn create_step(&self, new: NewProductionStep) -> RepoFuture<'_, ProductionStep> {
        self.run("create_step", |s| {
            let position = s
                .steps
                .iter()
                .filter(|st| st.product_id == new.product_id)
                .map(|st| st.position + 1)
                .max()
                .unwrap_or(0);
            let created = ProductionStep {
                id: s.next_id(),
                product_id: new.product_id,
                name: new.name,
                position,
                estimated_minutes: new.estimated_minutes,
            };
            s.steps.push(created.clone());
            Ok(created)
        })
    }

    fn update_step(&self, updated: ProductionStep) -> RepoFuture<'_, ProductionStep> {
        self.run("update_step", |s| {
            let slot = s
                .steps
                .iter_mut()
                .find(|st| st.id == updated.id)
                .ok_or_else(|| missing("step", updated.id))?;
            *slot = updated.clone();
            Ok(updated)
        })
    }

    fn delete_step(&self, id: StepId) -> RepoFuture<'_, ()> {
        self.run("delete_step", |s| {
            let before = s.steps.len();
            s.steps.retain(|st| st.id != id);
            if s.steps.len() == before {
                return Err(missing("step", id));
            }
            Ok(())
        })
    }

    fn reorder_steps(&self, product: ProductId, ids: Vec<StepId>) -> RepoFuture<'_, ()> {
        self.run("reorder_steps", |s| {
            let existing = s
                .steps
                .iter()
                .filter(|st| st.product_id == product)
                .map(|st| st.id)
                .collect();
            if !same_ids(existing, ids.clone()) {
                return Err(RepositoryError::Rejected(format!(
                    "reorder does not match the steps of product {product}"
                )));
            }
            for st in s.steps.iter_mut().filter(|st| st.product_id == product) {
                if let Some(pos) = ids.iter().position(|id| *id == st.id) {
                    st.position = pos as u32;
                }
            }
            Ok(())
        })
    }
}

impl TimerRepository for MemoryBackend {
    fn unit_timers(&self, unit: UnitId) -> RepoFuture<'_, Vec<UnitTimer>> {
        self.run("unit_timers", |s| {
            Ok(s.timers.iter().filter(|t| t.unit_id == unit).cloned().collect())
        })
    }

    fn active_timers(&self) -> RepoFuture<'_, Vec<UnitTimer>> {
        self.run("active_timers", |s| {
            Ok(s.timers.iter().filter(|t| t.is_active()).cloned().collect())
        })
    }

    fn start_timer(&self, unit: UnitId, step: StepId, at: u64) -> RepoFuture<'_, UnitTimer> {
        self.run("start_timer", |s| {
            if s
                .timers
                .iter()
                .any(|t| t.is_active() && t.unit_id == unit && t.step_id == step)
            {
                return Err(RepositoryError::Rejected(format!(
                    "a timer for step {step} is already running on {unit}"
                )));
            }
            let timer = UnitTimer {
                id: s.next_id(),
                unit_id: unit,
                step_id: step,
                started_at: at,
                stopped_at: None,
            };
            s.timers.push(timer.clone());
            Ok(timer)
        })
    }

    fn stop_timer(&self, id: TimerId, at: u64) -> RepoFuture<'_, UnitTimer> {
        self.run("stop_timer", |s| {
            let timer = s
                .timers
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| missing("timer", id))?;
            if !timer.is_active() {
                return Err(RepositoryError::Rejected(format!("timer {id} is not running")));
            }
            timer.stopped_at = Some(at.max(timer.started_at));
            Ok(timer.clone())
        })
    }
}

impl SettingsRepository for MemoryBackend {
    fn load_settings(&self) -> RepoFuture<'_, Settings> {
        self.run("load_settings", |s| Ok(s.settings.clone()))
    }

    fn save_settings(&self, settings: Settings) -> RepoFuture<'_, ()> {
        self.run("save_settings", |s| {
            s.settings = settings;
            Ok(())
        })
    }
}

impl SessionRepository for MemoryBackend {
    fn current_session(&self) -> RepoFuture<'_, Option<Session>> {
        self.run("current_session", |s| Ok(s.session.clone()))
    }

    fn sign_out(&self) -> RepoFuture<'_, ()> {
        self.run("sign_out", |s| {
            s.session = None;
            Ok(())
        })
    }
}
