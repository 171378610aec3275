use std::rc::Rc;
use std::time::Duration;

use anyhow::Context;
use strand_core::*;

use crate::model::Session;
use crate::repository::SessionRepository;

#[derive(Clone)]
pub struct SessionProviders {
    pub current_session: FutureProvider<Option<Session>>,
    /// Re-fetches `current_session` every check interval for as long as the
    /// node lives. Watched by `is_signed_in`.
    pub session_check: Provider<()>,
    pub is_signed_in: Provider<bool>,
}

impl SessionProviders {
    pub fn new(
        repo: Rc<dyn SessionRepository>,
        clock: Rc<dyn Clock>,
        ticker: Rc<dyn Ticker>,
        interval: Duration,
    ) -> Self {
        let current_session = FutureProvider::new("current_session", move |_| {
            let repo = repo.clone();
            async move { repo.current_session().await.context("loading session") }
        });

        let session_check = Provider::new("session_check", {
            let current = current_session.clone();
            move |r| {
                let (weak, current) = (r.clone(), current.clone());
                let handle = ticker.every(
                    interval,
                    Rc::new(move || {
                        if let Ok(c) = weak.container() {
                            log::debug!("session check due");
                            c.invalidate(&current);
                        }
                    }),
                );
                r.on_dispose(move || handle.cancel());
            }
        });

        let is_signed_in = Provider::new("is_signed_in", {
            let (check, current) = (session_check.clone(), current_session.clone());
            move |r| {
                r.watch(&check);
                r.watch_async(&current)
                    .data_or_default()
                    .is_some_and(|s| s.is_valid_at(clock.unix_secs()))
            }
        });

        Self {
            current_session,
            session_check,
            is_signed_in,
        }
    }
}
