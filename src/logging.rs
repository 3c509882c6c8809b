use std::panic;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging once. `RUST_LOG` still wins; without it the default
/// level is `info`, or `error` when quiet output was requested.
pub fn init(quiet: bool) {
    INIT.call_once(|| {
        let default_level = if quiet { "error" } else { "info" };
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(default_level),
        )
        .init();

        set_panic_hook();
    });
}

/// Route panic details through the logger so a crash on the producer or
/// audio thread leaves a usable record, then chain to the default hook.
fn set_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            *s
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.as_str()
        } else {
            "non-string panic payload"
        };
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        log::error!(
            "panic at {location}: {message}\n{:?}",
            backtrace::Backtrace::new()
        );

        default_hook(info);
    }));
}
