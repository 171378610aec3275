use std::rc::Rc;
use std::time::Duration;

use futures::executor::LocalPool;
use strand_app::model::{AlbumSort, MachineType, NewMacro, UnitId};
use strand_app::{App, AppConfig, MemoryBackend, Repositories, logging};
use strand_core::{ManualTicker, ProviderContainer, SystemClock};
use strand_devtools::GraphInspector;

fn main() -> anyhow::Result<()> {
    let config = AppConfig::default().from_env()?;
    logging::init(&config);

    let mut pool = LocalPool::new();
    let ticker = ManualTicker::new();
    let app = App::new(
        ProviderContainer::new(pool.spawner()),
        &Repositories::from_backend(Rc::new(MemoryBackend::seeded())),
        &config,
        Rc::new(SystemClock),
        Rc::new(ticker.clone()),
    );
    let (c, p) = (&app.container, &app.providers);

    let _redraw = c.listen(&p.albums.visible_albums, || log::info!("library changed"));
    c.read(&p.albums.visible_albums);
    pool.run_until_stalled();
    c.set_state(&p.albums.album_sort, AlbumSort::YearDesc);
    for album in c.read(&p.albums.visible_albums) {
        println!("{} ({}) - {}", album.title, album.year, album.artist);
    }

    pool.run_until(app.macros.create(NewMacro {
        name: "Park".into(),
        machine_type: MachineType::Cnc,
        gcode: "G0 Z20\nG28 X Y".into(),
    }))?;
    let cnc = pool.run_until(c.future(&p.macros.cnc_macros))?;
    println!("{} CNC macros", cnc.len());

    let unit = UnitId::new("SN-0042");
    pool.run_until(app.timers.start(unit.clone(), 1))?;
    for d in pool.run_until(c.future(&p.timers.active_unit_timers_with_details.of(unit)))? {
        println!(
            "{}: {} running for {}s",
            d.timer.unit_id,
            d.step_name.as_deref().unwrap_or("?"),
            d.elapsed_secs
        );
    }

    c.read(&p.session.is_signed_in);
    pool.run_until_stalled();
    println!("signed in: {}", c.read(&p.session.is_signed_in));
    // one session check; the value is re-fetched on the next read
    ticker.advance(config.session_check_interval() + Duration::from_secs(1));
    c.read(&p.session.is_signed_in);
    pool.run_until_stalled();
    println!("signed in: {}", c.read(&p.session.is_signed_in));

    let mut inspector = GraphInspector::new();
    inspector.toggle();
    if let Some(lines) = inspector.capture(c) {
        for line in lines {
            println!("{line}");
        }
    }

    app.shutdown();
    Ok(())
}
