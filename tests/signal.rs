use azure_debug_info::signal::{SignalWaiter, TERMINATION_SIGNALS, signal_name};
use signal_hook::consts::SIGTERM;
use signal_hook::low_level::raise;

#[test]
fn signal_raised_before_waiting_is_delivered() {
    let waiter = SignalWaiter::register(&TERMINATION_SIGNALS).unwrap();

    raise(SIGTERM).unwrap();

    let signal = waiter.wait().unwrap();
    assert_eq!(signal, SIGTERM);
    assert_eq!(signal_name(signal), "terminated");
}
