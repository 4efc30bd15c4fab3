use std::{cell::RefCell, ffi::OsStr, str::FromStr, time::Duration};

const DEFAULT_TICK_MS: u64 = 10;
const DEFAULT_RUN_LIMIT: u64 = 100_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Env {
    /// Delay between `run` ticks
    tick_ms: u64,
    /// Ticks per `run` before pausing, 0 for no limit
    run_limit: u64,
}

impl Default for Env {
    fn default() -> Self {
        Env {
            tick_ms: DEFAULT_TICK_MS,
            run_limit: DEFAULT_RUN_LIMIT,
        }
    }
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

/// Read `CHASM_TICK_MS` and `CHASM_RUN_LIMIT`. Invalid values fall back to the defaults.
pub fn init() {
    let defaults = Env::default();
    let value = Env {
        tick_ms: var_or("CHASM_TICK_MS", defaults.tick_ms),
        run_limit: var_or("CHASM_RUN_LIMIT", defaults.run_limit),
    };
    set_env(value);
}

pub fn tick_interval() -> Duration {
    Duration::from_millis(with_env(|env| env.tick_ms))
}

pub fn run_limit() -> u64 {
    with_env(|env| env.run_limit)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

/// Defaults are used when [`init`] was never called, e.g. from library users.
fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| callback(&env.borrow().unwrap_or_default()))
}

fn var_or<T: FromStr>(name: impl AsRef<OsStr>, default: T) -> T {
    std::env::var(name.as_ref())
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
