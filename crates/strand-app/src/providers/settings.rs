use std::rc::Rc;

use anyhow::Context;
use strand_core::*;

use crate::model::Settings;
use crate::repository::SettingsRepository;

#[derive(Clone)]
pub struct SettingsProviders {
    pub settings: FutureProvider<Settings>,
}

impl SettingsProviders {
    pub fn new(repo: Rc<dyn SettingsRepository>) -> Self {
        let settings = FutureProvider::new("settings", move |_| {
            let repo = repo.clone();
            async move { repo.load_settings().await.context("loading settings") }
        });
        Self { settings }
    }
}
