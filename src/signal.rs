use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// A broadcast, one-shot stop notification shared by the pool, its workers,
/// and every submitter.
///
/// The transition is `unset -> set`, irreversible, and idempotent: setting an
/// already-set signal is a no-op. Once set, [`cancelled`](Self::cancelled) is
/// immediately ready forever after.
#[derive(Debug, Clone)]
pub(crate) struct StopSignal {
  token: CancellationToken,
}

impl StopSignal {
  pub(crate) fn new() -> Self {
    Self {
      token: CancellationToken::new(),
    }
  }

  /// Sets the signal. Safe to call any number of times.
  pub(crate) fn set(&self) {
    self.token.cancel();
  }

  pub(crate) fn is_set(&self) -> bool {
    self.token.is_cancelled()
  }

  /// Resolves once the signal is set; usable inside `tokio::select!` alongside
  /// queue receives. Never resolves while the signal is unset.
  pub(crate) fn cancelled(&self) -> WaitForCancellationFuture<'_> {
    self.token.cancelled()
  }
}
