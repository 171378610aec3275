use std::rc::Rc;

use anyhow::Context;
use strand_core::*;

use crate::model::{UnitId, UnitTimer, UnitTimerDetails};
use crate::providers::ProductionProviders;
use crate::repository::TimerRepository;

#[derive(Clone)]
pub struct TimerProviders {
    /// Every timer recorded for a unit, running or stopped.
    pub unit_timers: FutureProviderFamily<UnitId, Vec<UnitTimer>>,
    pub active_unit_timers: FutureProviderFamily<UnitId, Vec<UnitTimer>>,
    /// Running timers of a unit joined with their step and elapsed time.
    pub active_unit_timers_with_details: FutureProviderFamily<UnitId, Vec<UnitTimerDetails>>,
    /// Running timers across all units.
    pub active_timers: FutureProvider<Vec<UnitTimer>>,
}

impl TimerProviders {
    pub fn new(
        repo: Rc<dyn TimerRepository>,
        production: &ProductionProviders,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let unit_timers = FutureProviderFamily::new("unit_timers", {
            let repo = repo.clone();
            move |_, unit: UnitId| {
                let repo = repo.clone();
                async move {
                    let context = format!("loading timers of {unit}");
                    repo.unit_timers(unit).await.context(context)
                }
            }
        });

        let active_unit_timers = FutureProviderFamily::new("active_unit_timers", {
            let unit_timers = unit_timers.clone();
            move |r: Ref, unit: UnitId| {
                let timers = r.watch_future(&unit_timers.of(unit));
                async move {
                    let mut timers = timers.await?;
                    timers.retain(|t| t.is_active());
                    anyhow::Ok(timers)
                }
            }
        });

        let active_unit_timers_with_details =
            FutureProviderFamily::new("active_unit_timers_with_details", {
                let active = active_unit_timers.clone();
                let step_by_id = production.step_by_id.clone();
                move |r: Ref, unit: UnitId| {
                    let timers = r.watch_future(&active.of(unit));
                    let (step_by_id, clock) = (step_by_id.clone(), clock.clone());
                    async move {
                        let timers = timers.await?;
                        let now = clock.unix_secs();
                        let mut details = Vec::with_capacity(timers.len());
                        for timer in timers {
                            let step = r.watch_future(&step_by_id.of(timer.step_id)).await?;
                            details.push(UnitTimerDetails {
                                elapsed_secs: timer.elapsed_secs(now),
                                step_name: step.as_ref().map(|s| s.name.clone()),
                                estimated_minutes: step.map(|s| s.estimated_minutes),
                                timer,
                            });
                        }
                        anyhow::Ok(details)
                    }
                }
            });

        let active_timers = FutureProvider::new("active_timers", move |_| {
            let repo = repo.clone();
            async move { repo.active_timers().await.context("loading active timers") }
        });

        Self {
            unit_timers,
            active_unit_timers,
            active_unit_timers_with_details,
            active_timers,
        }
    }
}
