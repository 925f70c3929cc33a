//! Session phase tracking shared with subscribers through a watch channel.

// crates.io
use tokio::sync::watch;
// self
use crate::{_prelude::*, auth::TokenSource};

/// Coarse session phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
	/// No check has resolved yet, or a re-check is running.
	#[default]
	Pending,
	/// A valid record exists.
	Authenticated,
	/// No provider can produce a token without user interaction.
	Unauthenticated,
	/// Unrecoverable failure; only an explicit re-login leaves this phase.
	Error,
}
impl AuthPhase {
	/// Returns a stable label suitable for span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthPhase::Pending => "pending",
			AuthPhase::Authenticated => "authenticated",
			AuthPhase::Unauthenticated => "unauthenticated",
			AuthPhase::Error => "error",
		}
	}
}
impl Display for AuthPhase {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Mechanism behind the current session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
	/// Federated identity provider.
	Federated,
	/// Legacy username/password JWT.
	Legacy,
	/// No session.
	#[default]
	None,
}
impl From<TokenSource> for AuthMethod {
	fn from(source: TokenSource) -> Self {
		match source {
			TokenSource::Federated => AuthMethod::Federated,
			TokenSource::Legacy => AuthMethod::Legacy,
		}
	}
}

/// Observable session state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
	/// Current phase.
	pub phase: AuthPhase,
	/// Mechanism of the current session.
	pub method: AuthMethod,
	/// Rendered cause of the latest failure transition.
	pub last_error: Option<String>,
}
impl AuthState {
	/// Returns `true` while a valid record exists.
	pub fn is_authenticated(&self) -> bool {
		self.phase == AuthPhase::Authenticated
	}

	/// Computes the state that follows `event`.
	///
	/// The error phase absorbs every event except [`AuthEvent::ReloginRequested`]. Failures only
	/// reach the error phase from an authenticated session or through budget exhaustion; without a
	/// session any other failure leaves the user unauthenticated.
	pub fn next(&self, event: &AuthEvent) -> AuthState {
		if self.phase == AuthPhase::Error {
			return match event {
				AuthEvent::ReloginRequested => AuthState::default(),
				_ => self.clone(),
			};
		}

		match event {
			AuthEvent::Authenticated(source) => AuthState {
				phase: AuthPhase::Authenticated,
				method: (*source).into(),
				last_error: None,
			},
			AuthEvent::Failed(error) => AuthState {
				phase: if matches!(error.root_cause(), Error::RetryBudgetExhausted { .. })
					|| (self.phase == AuthPhase::Authenticated && !error.requires_login())
				{
					AuthPhase::Error
				} else {
					AuthPhase::Unauthenticated
				},
				method: AuthMethod::None,
				last_error: Some(error.root_cause().to_string()),
			},
			AuthEvent::Cleared => AuthState { phase: AuthPhase::Unauthenticated, ..AuthState::default() },
			AuthEvent::Invalidated => AuthState::default(),
			AuthEvent::ReloginRequested => self.clone(),
		}
	}
}

/// Inputs driving [`AuthState::next`].
#[derive(Clone, Debug)]
pub enum AuthEvent {
	/// A record from this source was installed.
	Authenticated(TokenSource),
	/// A refresh or login failed with this classified error.
	Failed(Error),
	/// The session was cleared locally.
	Cleared,
	/// Another handle changed the persisted session; a re-check follows.
	Invalidated,
	/// The user asked to log in again.
	ReloginRequested,
}

/// Owner of the session state; subscribers observe it through [`watch`] receivers.
#[derive(Debug)]
pub struct AuthStateMachine(watch::Sender<AuthState>);
impl AuthStateMachine {
	/// Creates a machine in the pending phase.
	pub fn new() -> Self {
		Self(watch::Sender::new(AuthState::default()))
	}

	/// Returns a copy of the current state.
	pub fn current(&self) -> AuthState {
		self.0.borrow().clone()
	}

	/// Returns the current phase.
	pub fn phase(&self) -> AuthPhase {
		self.0.borrow().phase
	}

	/// Subscribes to state changes.
	pub fn subscribe(&self) -> watch::Receiver<AuthState> {
		self.0.subscribe()
	}

	/// Applies `event`, notifying subscribers only when the state changed.
	///
	/// Returns the resulting state.
	pub fn apply(&self, event: AuthEvent) -> AuthState {
		let mut from = AuthPhase::Pending;
		let changed = self.0.send_if_modified(|state| {
			let next = state.next(&event);

			from = state.phase;

			if next == *state {
				false
			} else {
				*state = next;

				true
			}
		});
		let current = self.current();

		if changed && from != current.phase {
			tracing::info!(from = from.as_str(), to = current.phase.as_str(), "Auth phase changed.");
		}

		current
	}
}
impl Default for AuthStateMachine {
	fn default() -> Self {
		Self::new()
	}
}
