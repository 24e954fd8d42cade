use crate::host::Host;
use crate::message::Message;
use tracing::info;

/// Kicks all players from the server with the given reason, then asks the
/// host to halt. Does nothing once the host is gone.
pub fn shutdown(host: Option<&dyn Host>, message: &Message) {
    let Some(host) = host else {
        return;
    };

    for player in host.players() {
        player.disconnect(message);
    }

    info!("Shutdown initiated because: {}", message.text());
    host.halt(false);
}

/// Checks if any non-automated player is present on the server
pub fn has_real_players(host: Option<&dyn Host>) -> bool {
    real_player_count(host) > 0
}

pub fn real_player_count(host: Option<&dyn Host>) -> usize {
    host.map(|host| host.players().iter().filter(|p| p.is_real()).count())
        .unwrap_or(0)
}
