use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use web_time::{SystemTime, UNIX_EPOCH};

/// Wall-clock source. The app uses `SystemClock`; tests drive a `ManualClock`.
pub trait Clock: 'static {
    fn now(&self) -> SystemTime;

    fn unix_secs(&self) -> u64 {
        self.now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock you can drive deterministically.
#[derive(Clone)]
pub struct ManualClock {
    now: Rc<Cell<SystemTime>>,
}

impl ManualClock {
    pub fn at_unix_secs(secs: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(UNIX_EPOCH + Duration::from_secs(secs))),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        self.now.get()
    }
}

/// Source of periodic wakeups for timer-driven providers.
pub trait Ticker: 'static {
    fn every(&self, period: Duration, tick: Rc<dyn Fn()>) -> TickerHandle;
}

/// Cancels its periodic callback when `cancel` is called.
///
/// Providers hand `cancel` to `Ref::on_dispose` so the wakeup stops with the node.
#[derive(Clone)]
pub struct TickerHandle {
    cancelled: Rc<Cell<bool>>,
}

impl TickerHandle {
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

struct Tick {
    period: Duration,
    due: Duration,
    tick: Rc<dyn Fn()>,
    cancelled: Rc<Cell<bool>>,
}

#[derive(Default)]
struct TickerState {
    elapsed: Duration,
    ticks: Vec<Tick>,
}

/// Ticker advanced explicitly by the host loop or a test.
#[derive(Clone, Default)]
pub struct ManualTicker {
    state: Rc<RefCell<TickerState>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward, firing every callback that falls due in order.
    /// Returns how many callbacks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.borrow().elapsed + by;
        let mut fired = 0;
        loop {
            let next = {
                let mut st = self.state.borrow_mut();
                st.ticks.retain(|t| !t.cancelled.get());
                let Some(t) = st
                    .ticks
                    .iter_mut()
                    .filter(|t| t.due <= target)
                    .min_by_key(|t| t.due)
                else {
                    break;
                };
                let due = t.due;
                t.due += t.period;
                let tick = t.tick.clone();
                st.elapsed = due;
                tick
            };
            // callbacks may register or cancel ticks
            next();
            fired += 1;
        }
        self.state.borrow_mut().elapsed = target;
        fired
    }

    /// Callbacks still registered and not cancelled.
    pub fn active(&self) -> usize {
        self.state
            .borrow()
            .ticks
            .iter()
            .filter(|t| !t.cancelled.get())
            .count()
    }
}

impl Ticker for ManualTicker {
    fn every(&self, period: Duration, tick: Rc<dyn Fn()>) -> TickerHandle {
        let period = if period.is_zero() {
            log::warn!("ticker period of zero; using 1ms");
            Duration::from_millis(1)
        } else {
            period
        };
        let cancelled = Rc::new(Cell::new(false));
        let mut st = self.state.borrow_mut();
        let due = st.elapsed + period;
        st.ticks.push(Tick {
            period,
            due,
            tick,
            cancelled: cancelled.clone(),
        });
        TickerHandle { cancelled }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_ticker_fires_each_period() {
        let ticker = ManualTicker::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let _h = ticker.every(Duration::from_secs(10), Rc::new(move || c.set(c.get() + 1)));

        assert_eq!(ticker.advance(Duration::from_secs(9)), 0);
        assert_eq!(ticker.advance(Duration::from_secs(1)), 1);
        assert_eq!(ticker.advance(Duration::from_secs(25)), 2);
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_cancelled_tick_stops() {
        let ticker = ManualTicker::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let h = ticker.every(Duration::from_secs(1), Rc::new(move || c.set(c.get() + 1)));
        ticker.advance(Duration::from_secs(2));
        h.cancel();
        ticker.advance(Duration::from_secs(5));
        assert_eq!(count.get(), 2);
        assert_eq!(ticker.active(), 0);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::at_unix_secs(1_000);
        assert_eq!(clock.unix_secs(), 1_000);
        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.unix_secs(), 1_090);
    }
}
