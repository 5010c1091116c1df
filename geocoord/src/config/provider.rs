//! Provider selection.

use crate::position::{Provider, ProviderAvailability};

/// Pick the provider a session should run on.
///
/// GPS is preferred for high accuracy, the network provider otherwise. If
/// the preferred provider is unavailable the other one is used. Returns
/// `None` when neither can be used.
pub fn select_provider(
    want_high_accuracy: bool,
    availability: ProviderAvailability,
) -> Option<Provider> {
    let preferred = if want_high_accuracy {
        Provider::Gps
    } else {
        Provider::Network
    };

    [preferred, preferred.fallback()]
        .into_iter()
        .find(|p| availability.is_available(*p))
}
