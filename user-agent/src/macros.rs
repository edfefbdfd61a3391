/// Capture-pipeline log line. The message is prefixed with the wall-clock
/// time, the level, a component tag (`session`, `collector`, `decoder`, ...)
/// and the pid/tid of the emitting thread, so lines from the pump, the drain
/// and the controller can be told apart in the same `persistmon.log`.
///
/// ```rust,ignore
/// agent_log!(Level::Warn, "session", "pump did not exit; leaking record sink");
/// // [2026-03-02T09:14:55+01:00][WARN][session][pid=4568][tid=ThreadId(7)] pump did not exit; ...
/// ```
#[macro_export]
macro_rules! agent_log {
    ($level:expr, $component:expr, $fmt:expr $(, $($arg:tt)+)?) => {
        log::log!(
            $level,
            concat!("[{}][{}][", $component, "][pid={}][tid={:?}] ", $fmt),
            chrono::Local::now().to_rfc3339(),
            $level,
            std::process::id(),
            std::thread::current().id()
            $(, $($arg)+)?
        );
    };
}
