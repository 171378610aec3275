use std::rc::Rc;

use anyhow::Context;
use strand_core::*;

use crate::model::{MachineType, Macro};
use crate::repository::MacroRepository;

#[derive(Clone)]
pub struct MacroProviders {
    pub all_macros: FutureProvider<Vec<Macro>>,
    pub cnc_macros: FutureProvider<Vec<Macro>>,
    pub laser_macros: FutureProvider<Vec<Macro>>,
    pub macros_by_machine_type: FutureProviderFamily<MachineType, Vec<Macro>>,
}

fn macro_list(
    name: &'static str,
    repo: &Rc<dyn MacroRepository>,
    machine: Option<MachineType>,
) -> FutureProvider<Vec<Macro>> {
    let repo = repo.clone();
    FutureProvider::new(name, move |_| {
        let repo = repo.clone();
        async move { repo.macros(machine).await.context("loading macros") }
    })
}

impl MacroProviders {
    pub fn new(repo: Rc<dyn MacroRepository>) -> Self {
        let macros_by_machine_type = FutureProviderFamily::new("macros_by_machine_type", {
            let repo = repo.clone();
            move |_, machine: MachineType| {
                let repo = repo.clone();
                async move {
                    repo.macros(Some(machine))
                        .await
                        .with_context(|| format!("loading {machine} macros"))
                }
            }
        });

        Self {
            all_macros: macro_list("all_macros", &repo, None),
            cnc_macros: macro_list("cnc_macros", &repo, Some(MachineType::Cnc)),
            laser_macros: macro_list("laser_macros", &repo, Some(MachineType::Laser)),
            macros_by_machine_type,
        }
    }
}
