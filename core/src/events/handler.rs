use super::GameSignal;

/// Observer for [`GameSignal`]s. Called on the worker that produced them,
/// in the order they were produced for a given file.
pub trait SignalHandler {
    fn handle_signal(&mut self, signal: &GameSignal);

    fn handle_signals(&mut self, signals: &[GameSignal]) {
        for signal in signals {
            self.handle_signal(signal);
        }
    }
}
