#[cfg(test)]
mod tests {
    use std::fmt::Debug;
    use std::rc::Rc;
    use std::time::Duration;

    use futures::executor::LocalPool;
    use strand_core::*;

    use crate::model::*;
    use crate::*;

    struct Harness {
        pool: LocalPool,
        app: App,
        backend: Rc<MemoryBackend>,
        clock: ManualClock,
        ticker: ManualTicker,
    }

    fn harness_with(backend: MemoryBackend, config: AppConfig) -> Harness {
        let pool = LocalPool::new();
        let backend = Rc::new(backend);
        let clock = ManualClock::at_unix_secs(1_000);
        let ticker = ManualTicker::new();
        let app = App::new(
            ProviderContainer::new(pool.spawner()),
            &Repositories::from_backend(backend.clone()),
            &config,
            Rc::new(clock.clone()),
            Rc::new(ticker.clone()),
        );
        Harness {
            pool,
            app,
            backend,
            clock,
            ticker,
        }
    }

    fn harness(backend: MemoryBackend) -> Harness {
        harness_with(backend, AppConfig::default())
    }

    fn load<T: Clone + 'static>(
        pool: &mut LocalPool,
        c: &ProviderContainer,
        p: &FutureProvider<T>,
    ) -> T {
        pool.run_until(c.future(p))
            .unwrap_or_else(|e| panic!("loading `{}` failed: {e}", p.key()))
    }

    fn album(id: AlbumId, year: u16) -> Album {
        Album {
            id,
            title: format!("Album {id}"),
            artist: "Artist".into(),
            genre: if year < 2000 { "Jazz" } else { "Rock" }.into(),
            year,
        }
    }

    fn offline() -> RepositoryError {
        RepositoryError::Unavailable("offline".into())
    }

    #[test]
    fn test_sort_change_reorders_from_cache() {
        let Harness {
            mut pool,
            app,
            backend,
            ..
        } = harness(MemoryBackend::new().with_albums(vec![album(1, 2001), album(2, 1995)]));
        let (c, p) = (&app.container, &app.providers.albums);
        let ids = |albums: Vec<Album>| albums.iter().map(|a| a.id).collect::<Vec<_>>();

        c.set_state(&p.album_sort, AlbumSort::YearAsc);
        load(&mut pool, c, &p.all_albums);
        assert_eq!(ids(c.read(&p.visible_albums)), vec![2, 1]);

        c.set_state(&p.album_sort, AlbumSort::YearDesc);
        assert_eq!(ids(c.read(&p.visible_albums)), vec![1, 2]);
        assert_eq!(backend.calls("albums"), 1);
        assert_eq!(c.recompute_count(&p.all_albums), 1);
        assert_eq!(c.recompute_count(&p.visible_albums), 2);
    }

    #[test]
    fn test_filter_then_sort() {
        let Harness { mut pool, app, .. } = harness(MemoryBackend::new().with_albums(vec![
            album(1, 2001),
            album(2, 1995),
            album(3, 1990),
        ]));
        let (c, p) = (&app.container, &app.providers.albums);
        load(&mut pool, c, &p.all_albums);

        c.set_state(&p.album_sort, AlbumSort::YearAsc);
        c.set_state(
            &p.album_filter,
            AlbumFilter {
                genre: Some("jazz".into()),
                query: String::new(),
            },
        );
        let visible: Vec<AlbumId> = c.read(&p.visible_albums).iter().map(|a| a.id).collect();
        assert_eq!(visible, vec![3, 2]);
        assert_eq!(c.read(&p.genres), vec!["Jazz".to_string(), "Rock".to_string()]);
    }

    #[test]
    fn test_derived_views_are_empty_while_loading_or_failed() {
        let Harness {
            mut pool,
            app,
            backend,
            ..
        } = harness(MemoryBackend::seeded());
        let (c, p) = (&app.container, &app.providers.albums);
        backend.fail_next("albums", offline());

        assert!(c.read(&p.visible_albums).is_empty());
        pool.run_until_stalled();
        assert_eq!(c.status(&p.all_albums), Some(NodeStatus::Error));
        assert!(c.read(&p.visible_albums).is_empty());
        assert!(c.read(&p.genres).is_empty());

        let state = c.read_async(&p.all_albums);
        let err = state.error().unwrap();
        assert_eq!(err.downcast_ref::<RepositoryError>(), Some(&offline()));
        assert_eq!(err.to_string(), "loading albums: backend unavailable: offline");

        c.invalidate(&p.all_albums);
        load(&mut pool, c, &p.all_albums);
        assert_eq!(c.read(&p.visible_albums).len(), 4);
    }

    #[test]
    fn test_album_family_members_are_independent() {
        let Harness { mut pool, app, .. } = harness(MemoryBackend::seeded());
        let (c, p) = (&app.container, &app.providers.albums);

        assert_eq!(load(&mut pool, c, &p.album_by_id.of(1)).map(|a| a.year), Some(1959));
        assert_eq!(load(&mut pool, c, &p.album_by_id.of(2)).map(|a| a.year), Some(1957));
        assert_eq!(load(&mut pool, c, &p.album_by_id.of(99)), None);

        c.invalidate(&p.album_by_id.of(1));
        assert_eq!(c.status(&p.album_by_id.of(1)), Some(NodeStatus::Uninitialized));
        assert_eq!(c.status(&p.album_by_id.of(2)), Some(NodeStatus::Data));
        assert_eq!(c.recompute_count(&p.album_by_id.of(2)), 1);
    }

    #[test]
    fn test_device_views() {
        let Harness { mut pool, app, .. } = harness(MemoryBackend::seeded());
        let (c, p) = (&app.container, &app.providers.devices);
        load(&mut pool, c, &p.all_devices);

        let connected: Vec<String> = c.read(&p.connected_devices).into_iter().map(|d| d.name).collect();
        assert_eq!(connected, vec!["Shapeoko".to_string()]);
        assert_eq!(c.read(&p.devices_by_kind.of(MachineType::Laser)).len(), 1);
        assert!(c.read(&p.devices_by_kind.of(MachineType::Printer)).is_empty());
        assert_eq!(
            load(&mut pool, c, &p.device_by_id.of(2)).map(|d| d.kind),
            Some(MachineType::Laser)
        );
    }

    #[test]
    fn test_create_macro_invalidates_its_lists() {
        let Harness {
            mut pool,
            app,
            backend,
            ..
        } = harness(MemoryBackend::seeded());
        let (c, p) = (&app.container, &app.providers.macros);
        let cnc = p.macros_by_machine_type.of(MachineType::Cnc);
        let laser = p.macros_by_machine_type.of(MachineType::Laser);
        for list in [&p.all_macros, &p.cnc_macros, &p.laser_macros, &cnc, &laser] {
            load(&mut pool, c, list);
        }
        assert_eq!(backend.calls("macros"), 5);

        let created = pool
            .run_until(app.macros.create(NewMacro {
                name: "Spindle warmup".into(),
                machine_type: MachineType::Cnc,
                gcode: "M3 S8000".into(),
            }))
            .unwrap();

        for list in [&p.all_macros, &p.cnc_macros, &cnc] {
            assert_eq!(c.status(list), Some(NodeStatus::Uninitialized));
        }
        assert_eq!(c.status(&p.laser_macros), Some(NodeStatus::Data));
        assert_eq!(c.status(&laser), Some(NodeStatus::Data));

        for list in [&p.all_macros, &p.cnc_macros, &cnc] {
            assert!(load(&mut pool, c, list).contains(&created));
            assert_eq!(c.recompute_count(list), 2);
        }
        assert_eq!(backend.calls("macros"), 8);
        for list in [&p.all_macros, &p.cnc_macros, &p.laser_macros, &cnc, &laser] {
            load(&mut pool, c, list);
        }
        assert_eq!(backend.calls("macros"), 8);
    }

    #[test]
    fn test_failed_command_changes_nothing_and_can_be_retried() {
        let Harness {
            mut pool,
            app,
            backend,
            ..
        } = harness(MemoryBackend::seeded());
        let (c, p) = (&app.container, &app.providers.macros);
        let before = load(&mut pool, c, &p.all_macros);
        load(&mut pool, c, &p.cnc_macros);

        backend.fail_next("create_macro", offline());
        let new = NewMacro {
            name: "Home XY".into(),
            machine_type: MachineType::Cnc,
            gcode: "G28 X Y".into(),
        };
        let err = pool.run_until(app.macros.create(new.clone())).unwrap_err();
        assert_eq!(err, AppError::Repository(offline()));
        for list in [&p.all_macros, &p.cnc_macros] {
            assert_eq!(c.status(list), Some(NodeStatus::Data));
            assert!(!c.is_dirty(list));
            assert_eq!(c.recompute_count(list), 1);
        }
        assert_eq!(c.read_async(&p.all_macros).into_data(), Some(before.clone()));

        pool.run_until(app.macros.create(new)).unwrap();
        assert_eq!(load(&mut pool, c, &p.all_macros).len(), before.len() + 1);
    }

    #[test]
    fn test_validation_happens_before_the_repository() {
        let Harness {
            mut pool,
            app,
            backend,
            ..
        } = harness(MemoryBackend::seeded());
        let (c, p) = (&app.container, &app.providers.settings);
        load(&mut pool, c, &p.settings);

        let bad = Settings {
            timer_warning_minutes: 0,
            ..Settings::default()
        };
        let err = pool.run_until(app.settings.update(bad)).unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::OutOfRange { .. })));
        assert_eq!(backend.calls("save_settings"), 0);
        assert_eq!(c.status(&p.settings), Some(NodeStatus::Data));

        let err = pool
            .run_until(app.macros.create(NewMacro {
                name: "  ".into(),
                machine_type: MachineType::Laser,
                gcode: "G0".into(),
            }))
            .unwrap_err();
        assert_eq!(err, AppError::Validation(ValidationError::Empty { field: "name" }));
        assert_eq!(backend.calls("create_macro"), 0);

        let err = pool.run_until(app.steps.reorder(1, vec![1, 1, 2])).unwrap_err();
        assert_eq!(err, AppError::Validation(ValidationError::ReorderMismatch));
        assert_eq!(backend.calls("reorder_steps"), 0);

        let good = Settings {
            theme: Theme::Dark,
            ..Settings::default()
        };
        pool.run_until(app.settings.update(good)).unwrap();
        assert_eq!(load(&mut pool, c, &p.settings).theme, Theme::Dark);
    }

    #[test]
    fn test_starting_a_timer_leaves_other_units_alone() {
        let Harness {
            mut pool,
            app,
            backend,
            clock,
            ..
        } = harness(MemoryBackend::seeded());
        let (c, p) = (&app.container, &app.providers.timers);
        let (u1, u2) = (UnitId::new("U1"), UnitId::new("U2"));
        for unit in [&u1, &u2] {
            load(&mut pool, c, &p.unit_timers.of(unit.clone()));
            load(&mut pool, c, &p.active_unit_timers.of(unit.clone()));
            assert!(load(&mut pool, c, &p.active_unit_timers_with_details.of(unit.clone())).is_empty());
        }
        load(&mut pool, c, &p.active_timers);
        assert_eq!(backend.calls("unit_timers"), 2);

        let timer = pool.run_until(app.timers.start(u1.clone(), 2)).unwrap();
        assert_eq!(timer.started_at, 1_000);

        let u1_views = [
            p.unit_timers.of(u1.clone()),
            p.active_unit_timers.of(u1.clone()),
        ];
        for view in &u1_views {
            assert_eq!(c.status(view), Some(NodeStatus::Uninitialized));
        }
        assert_eq!(
            c.status(&p.active_unit_timers_with_details.of(u1.clone())),
            Some(NodeStatus::Uninitialized)
        );
        assert_eq!(c.status(&p.active_timers), Some(NodeStatus::Uninitialized));
        for view in [p.unit_timers.of(u2.clone()), p.active_unit_timers.of(u2.clone())] {
            assert_eq!(c.status(&view), Some(NodeStatus::Data));
            assert!(!c.is_dirty(&view));
        }
        assert!(!c.is_dirty(&p.active_unit_timers_with_details.of(u2.clone())));

        clock.advance(Duration::from_secs(90));
        let details = load(&mut pool, c, &p.active_unit_timers_with_details.of(u1.clone()));
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].step_name.as_deref(), Some("Sand"));
        assert_eq!(details[0].elapsed_secs, 90);
        assert_eq!(load(&mut pool, c, &p.active_timers), vec![timer.clone()]);
        assert_eq!(backend.calls("unit_timers"), 3);
        for view in &u1_views {
            assert_eq!(c.recompute_count(view), 2);
        }

        pool.run_until(app.timers.stop(timer.id)).unwrap();
        assert!(load(&mut pool, c, &p.active_unit_timers.of(u1.clone())).is_empty());
        assert!(load(&mut pool, c, &p.active_timers).is_empty());
        assert_eq!(load(&mut pool, c, &p.unit_timers.of(u1)).len(), 1);
    }

    fn show<T: Clone + Debug + 'static>(
        pool: &mut LocalPool,
        c: &ProviderContainer,
        p: &FutureProvider<T>,
    ) -> String {
        format!("{}: {:?}", p.key(), load(pool, c, p))
    }

    /// Every repository-backed view of the workshop, rendered for comparison.
    fn workshop_views(pool: &mut LocalPool, app: &App) -> Vec<String> {
        let (c, p) = (&app.container, &app.providers);
        let unit = UnitId::new("U1");
        let mut views = vec![
            show(pool, c, &p.macros.all_macros),
            show(pool, c, &p.macros.cnc_macros),
            show(pool, c, &p.macros.laser_macros),
            show(pool, c, &p.production.steps_for_product.of(1)),
            show(pool, c, &p.timers.unit_timers.of(unit.clone())),
            show(pool, c, &p.timers.active_unit_timers.of(unit.clone())),
            show(pool, c, &p.timers.active_unit_timers_with_details.of(unit)),
            show(pool, c, &p.timers.active_timers),
        ];
        for machine in [MachineType::Cnc, MachineType::Laser, MachineType::Printer] {
            views.push(show(pool, c, &p.macros.macros_by_machine_type.of(machine)));
        }
        // seeded steps, then ids that later creations are handed out
        for step in (1..=3).chain(1001..=1003) {
            views.push(show(pool, c, &p.production.step_by_id.of(step)));
        }
        views
    }

    /// Views cached before a mutation must match a container that never
    /// cached anything.
    fn assert_no_stale_views(h: &mut Harness) {
        let cached = workshop_views(&mut h.pool, &h.app);
        let fresh_app = App::new(
            ProviderContainer::new(h.pool.spawner()),
            &Repositories::from_backend(h.backend.clone()),
            &AppConfig::default(),
            Rc::new(h.clock.clone()),
            Rc::new(h.ticker.clone()),
        );
        let fresh = workshop_views(&mut h.pool, &fresh_app);
        assert_eq!(cached, fresh);
    }

    #[test]
    fn test_invalidation_lists_have_no_omissions() {
        let mut h = harness(MemoryBackend::seeded());
        let unit = UnitId::new("U1");
        let timer = h.pool.run_until(h.app.timers.start(unit, 1)).unwrap();
        workshop_views(&mut h.pool, &h.app);

        let mut moved = h
            .pool
            .run_until(h.app.container.future(&h.app.providers.macros.all_macros))
            .unwrap()
            .remove(0);
        moved.machine_type = MachineType::Laser;
        h.pool.run_until(h.app.macros.update(moved)).unwrap();
        assert_no_stale_views(&mut h);

        h.pool.run_until(h.app.macros.delete(2)).unwrap();
        assert_no_stale_views(&mut h);

        h.pool
            .run_until(h.app.macros.reorder(MachineType::Laser, vec![1, 3]))
            .unwrap();
        assert_no_stale_views(&mut h);

        let pack = h
            .pool
            .run_until(h.app.steps.create(NewProductionStep {
                product_id: 1,
                name: "Pack".into(),
                estimated_minutes: 5,
            }))
            .unwrap();
        assert_no_stale_views(&mut h);

        let mut cut = load(&mut h.pool, &h.app.container, &h.app.providers.production.step_by_id.of(1))
            .unwrap();
        cut.name = "Rough cut".into();
        h.pool.run_until(h.app.steps.update(cut)).unwrap();
        assert_no_stale_views(&mut h);

        h.pool.run_until(h.app.steps.reorder(1, vec![3, 2, 1, pack.id])).unwrap();
        assert_no_stale_views(&mut h);

        h.pool.run_until(h.app.steps.delete(2)).unwrap();
        assert_no_stale_views(&mut h);

        h.pool.run_until(h.app.timers.stop(timer.id)).unwrap();
        assert_no_stale_views(&mut h);
    }

    #[test]
    fn test_lookup_before_create_sees_the_new_step() {
        let Harness {
            mut pool,
            app,
            backend,
            ..
        } = harness(MemoryBackend::seeded());
        let (c, p) = (&app.container, &app.providers.production);
        let next = p.step_by_id.of(1001);
        assert_eq!(load(&mut pool, c, &next), None);

        let pack = pool
            .run_until(app.steps.create(NewProductionStep {
                product_id: 1,
                name: "Pack".into(),
                estimated_minutes: 5,
            }))
            .unwrap();
        assert_eq!(pack.id, 1001);
        assert!(c.is_dirty(&next) || c.status(&next) == Some(NodeStatus::Uninitialized));
        assert_eq!(load(&mut pool, c, &next), Some(pack));
        assert_eq!(backend.calls("step"), 2);
    }

    #[test]
    fn test_step_update_reaches_hidden_dependents() {
        let Harness { mut pool, app, .. } = harness(MemoryBackend::seeded());
        let (c, p) = (&app.container, &app.providers);
        let unit = UnitId::new("U7");
        pool.run_until(app.timers.start(unit.clone(), 3)).unwrap();
        let details = p.timers.active_unit_timers_with_details.of(unit);
        assert_eq!(load(&mut pool, c, &details)[0].step_name.as_deref(), Some("Finish"));

        // recorded by watching, not listed anywhere near the step
        let step = p.production.step_by_id.of(3);
        let dependents = c.dependents_of(&step);
        assert!(dependents.contains(details.key()));

        let mut finish = load(&mut pool, c, &step).unwrap();
        finish.name = "Varnish".into();
        pool.run_until(app.steps.update(finish)).unwrap();

        let snapshot = c.snapshot();
        for key in &dependents {
            let node = snapshot.iter().find(|n| &n.key == key).unwrap();
            assert!(
                node.dirty || node.status == NodeStatus::Uninitialized,
                "`{key}` survived the update"
            );
        }
        assert_eq!(load(&mut pool, c, &details)[0].step_name.as_deref(), Some("Varnish"));
    }

    #[test]
    fn test_session_check_refreshes_until_shutdown() {
        let Harness {
            mut pool,
            app,
            backend,
            clock,
            ticker,
        } = harness_with(
            MemoryBackend::seeded().with_session(Some(Session {
                user_id: "u-1".into(),
                display_name: "Ada".into(),
                expires_at: 1_100,
            })),
            AppConfig {
                session_check_secs: 60,
                ..AppConfig::default()
            },
        );
        let (c, p) = (&app.container, &app.providers.session);

        assert!(!c.read(&p.is_signed_in));
        pool.run_until_stalled();
        assert!(c.read(&p.is_signed_in));
        assert_eq!(ticker.active(), 1);
        assert_eq!(backend.calls("current_session"), 1);

        clock.advance(Duration::from_secs(150));
        assert_eq!(ticker.advance(Duration::from_secs(60)), 1);
        assert!(c.is_dirty(&p.is_signed_in));
        c.read(&p.is_signed_in);
        pool.run_until_stalled();
        assert!(!c.read(&p.is_signed_in), "session expired");
        assert_eq!(backend.calls("current_session"), 2);
        assert_eq!(ticker.active(), 1);

        app.shutdown();
        assert_eq!(ticker.active(), 0);
        ticker.advance(Duration::from_secs(600));
        assert_eq!(backend.calls("current_session"), 2);
    }

    #[test]
    fn test_sign_out() {
        let Harness { mut pool, app, .. } = harness(MemoryBackend::seeded());
        let (c, p) = (&app.container, &app.providers.session);
        load(&mut pool, c, &p.current_session);
        assert!(c.read(&p.is_signed_in));

        pool.run_until(app.session.sign_out()).unwrap();
        assert_eq!(load(&mut pool, c, &p.current_session), None);
        assert!(!c.read(&p.is_signed_in));
    }
}
