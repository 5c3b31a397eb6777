//! Presentation-surface boundary.
//!
//! The core never renders; it announces state through this interface and a
//! host (modal, terminal, test recorder) decides what to show. All calls are
//! fire-and-forget notifications.

use crate::api::types::MethodAvailability;
use crate::method::Method;

pub trait UiSurface: Send + Sync {
    /// Offer the method choices (with any enrollment hints from the trust check).
    fn show_method_selection(&self, update_mode: bool, availability: MethodAvailability);

    /// A method's protocol is starting.
    fn method_activated(&self, method: Method, update_mode: bool);

    /// Display a QR-encodable provisioning payload (TOTP enrollment).
    fn show_provisioning(&self, qr_code_data_url: &str);

    /// Reveal the code-entry input. `destination` carries the masked
    /// trusted-party destination when one is known.
    fn prompt_code(&self, method: Method, destination: Option<&str>);

    /// Surface an error near the relevant method, verbatim when it came from
    /// the server.
    fn show_error(&self, method: Option<Method>, message: &str);

    /// A method completed successfully.
    fn show_success(&self, method: Method, update_mode: bool);

    /// The session reached its terminal state.
    fn session_complete(&self);
}

/// Surface that renders nothing. Suits fully headless drivers.
pub struct NullUi;

impl UiSurface for NullUi {
    fn show_method_selection(&self, _update_mode: bool, _availability: MethodAvailability) {}
    fn method_activated(&self, _method: Method, _update_mode: bool) {}
    fn show_provisioning(&self, _qr_code_data_url: &str) {}
    fn prompt_code(&self, _method: Method, _destination: Option<&str>) {}
    fn show_error(&self, _method: Option<Method>, _message: &str) {}
    fn show_success(&self, _method: Method, _update_mode: bool) {}
    fn session_complete(&self) {}
}
