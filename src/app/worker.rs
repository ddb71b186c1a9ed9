use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

use gtk4::glib;

const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(24);

/// Runs `work` on its own thread and hands the result to `on_result` on the main loop.
pub(super) fn spawn_worker_action<T, W, H>(work: W, on_result: H)
where
    T: Send + 'static,
    W: FnOnce() -> T + Send + 'static,
    H: FnOnce(T) + 'static,
{
    let (tx, rx) = mpsc::channel::<T>();
    std::thread::spawn(move || {
        let _ = tx.send(work());
    });
    deliver_on_main_loop(rx, on_result);
}

/// Polls `rx` from the main loop until its single value arrives. A dropped
/// sender ends polling without calling `on_result`.
pub(super) fn deliver_on_main_loop<T, H>(rx: Receiver<T>, on_result: H)
where
    T: 'static,
    H: FnOnce(T) + 'static,
{
    let mut on_result = Some(on_result);
    glib::timeout_add_local(RESULT_POLL_INTERVAL, move || match rx.try_recv() {
        Ok(result) => {
            if let Some(handler) = on_result.take() {
                handler(result);
            }
            glib::ControlFlow::Break
        }
        Err(TryRecvError::Empty) => glib::ControlFlow::Continue,
        Err(TryRecvError::Disconnected) => {
            tracing::debug!("worker finished without a result");
            glib::ControlFlow::Break
        }
    });
}
