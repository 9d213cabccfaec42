//! Display forms for the connected wallet

use crate::models::WalletIdentity;

/// Shown wherever a wallet would be displayed but none is connected
pub const NOT_CONNECTED: &str = "Not connected";

const HEAD_CHARS: usize = 6;
const TAIL_CHARS: usize = 4;

/// Shortened display form of the session wallet, e.g. `0x71C7...d8e4`.
pub fn shorten(identity: Option<&WalletIdentity>) -> String {
    match identity {
        Some(wallet) => shorten_address(wallet.as_str()),
        None => NOT_CONNECTED.to_string(),
    }
}

/// First 6 and last 4 characters joined by `...`.
///
/// Addresses too short to lose anything are returned unchanged.
pub fn shorten_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= HEAD_CHARS + TAIL_CHARS {
        return address.to_string();
    }
    let head: String = chars[..HEAD_CHARS].iter().collect();
    let tail: String = chars[chars.len() - TAIL_CHARS..].iter().collect();
    format!("{}...{}", head, tail)
}
